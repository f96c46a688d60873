use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    CartItem, CartLine, NewOrder, NewProduct, Order, Product, Result, StoreError,
    store::{Session, Store},
};

#[derive(Debug, Clone, Copy)]
struct StoredLine {
    quantity: i64,
    seq: u64,
}

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    cart: BTreeMap<(UserId, ProductId), StoredLine>,
    orders: HashMap<OrderId, Order>,
    row_locks: HashMap<ProductId, Arc<Mutex<()>>>,
    next_seq: u64,
}

/// In-memory store for testing and local runs.
///
/// Sessions stage their writes and apply them in one step on commit, so
/// other sessions never observe uncommitted data. Each product has its own
/// async mutex standing in for the exclusive row lock.
///
/// There is no deadlock detection: two sessions locking overlapping
/// products in opposite order wait on each other forever, where Postgres
/// would abort one of them.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed stock of a product.
    pub async fn stock(&self, id: ProductId) -> Option<i64> {
        self.tables.read().await.products.get(&id).map(|p| p.stock)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of committed cart lines of a user.
    pub async fn cart_len(&self, user_id: UserId) -> usize {
        self.tables
            .read()
            .await
            .cart
            .keys()
            .filter(|(user, _)| *user == user_id)
            .count()
    }

    /// Overwrites a product's price outside any session, as catalog
    /// maintenance would.
    pub async fn set_price(&self, id: ProductId, price: common::Money) {
        if let Some(product) = self.tables.write().await.products.get_mut(&id) {
            product.price = price;
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Session = InMemorySession;

    async fn begin(&self) -> Result<InMemorySession> {
        Ok(InMemorySession {
            tables: self.tables.clone(),
            locks: HashMap::new(),
            staged: Staged::default(),
        })
    }
}

/// Writes made by a session that are not yet committed.
///
/// A `None` cart entry is a staged deletion.
#[derive(Debug, Default)]
struct Staged {
    products: HashMap<ProductId, Product>,
    cleared_carts: HashSet<UserId>,
    cart: HashMap<(UserId, ProductId), Option<StoredLine>>,
    orders: Vec<Order>,
}

/// Session over an [`InMemoryStore`].
pub struct InMemorySession {
    tables: Arc<RwLock<Tables>>,
    locks: HashMap<ProductId, OwnedMutexGuard<()>>,
    staged: Staged,
}

impl InMemorySession {
    fn visible_product(&self, tables: &Tables, id: ProductId) -> Option<Product> {
        self.staged
            .products
            .get(&id)
            .or_else(|| tables.products.get(&id))
            .cloned()
    }

    fn visible_line(&self, tables: &Tables, key: (UserId, ProductId)) -> Option<StoredLine> {
        if let Some(staged) = self.staged.cart.get(&key) {
            return *staged;
        }
        if self.staged.cleared_carts.contains(&key.0) {
            return None;
        }
        tables.cart.get(&key).copied()
    }

    fn visible_lines(&self, tables: &Tables, user_id: UserId) -> Vec<(ProductId, StoredLine)> {
        let mut product_ids: HashSet<ProductId> = HashSet::new();
        if !self.staged.cleared_carts.contains(&user_id) {
            product_ids.extend(
                tables
                    .cart
                    .keys()
                    .filter(|(user, _)| *user == user_id)
                    .map(|(_, product)| *product),
            );
        }
        product_ids.extend(
            self.staged
                .cart
                .keys()
                .filter(|(user, _)| *user == user_id)
                .map(|(_, product)| *product),
        );

        let mut lines: Vec<(ProductId, StoredLine)> = product_ids
            .into_iter()
            .filter_map(|product_id| {
                self.visible_line(tables, (user_id, product_id))
                    .map(|line| (product_id, line))
            })
            .collect();
        lines.sort_by_key(|(_, line)| line.seq);
        lines
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(self.visible_product(&tables, id))
    }

    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>> {
        if !self.locks.contains_key(&id) {
            let row_lock = {
                let mut tables = self.tables.write().await;
                if self.visible_product(&tables, id).is_none() {
                    return Ok(None);
                }
                tables.row_locks.entry(id).or_default().clone()
            };

            // Wait outside the table guard so the holder can still commit.
            let guard = row_lock.lock_owned().await;
            self.locks.insert(id, guard);
        }

        let tables = self.tables.read().await;
        Ok(self.visible_product(&tables, id))
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let tables = self.tables.read().await;
        let duplicate = tables
            .products
            .values()
            .chain(self.staged.products.values())
            .any(|p| p.sku == product.sku);
        if duplicate {
            return Err(StoreError::Constraint("products_sku_key".to_string()));
        }
        if product.stock < 0 {
            return Err(StoreError::Constraint(
                "products_stock_non_negative".to_string(),
            ));
        }
        drop(tables);

        let row = Product {
            id: ProductId::new(),
            sku: product.sku,
            name: product.name,
            price: product.price,
            stock: product.stock,
        };
        self.staged.products.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_stock(&mut self, id: ProductId, stock: i64) -> Result<()> {
        if !self.locks.contains_key(&id) {
            return Err(StoreError::LockNotHeld(id));
        }
        if stock < 0 {
            return Err(StoreError::Constraint(
                "products_stock_non_negative".to_string(),
            ));
        }

        let tables = self.tables.read().await;
        let mut product =
            self.visible_product(&tables, id)
                .ok_or_else(|| StoreError::RowNotFound {
                    table: "products",
                    id: id.to_string(),
                })?;
        drop(tables);

        product.stock = stock;
        self.staged.products.insert(id, product);
        Ok(())
    }

    async fn cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>> {
        let tables = self.tables.read().await;
        Ok(self
            .visible_line(&tables, (user_id, product_id))
            .map(|line| CartLine {
                user_id,
                product_id,
                quantity: line.quantity,
            }))
    }

    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItem>> {
        let tables = self.tables.read().await;
        Ok(self
            .visible_lines(&tables, user_id)
            .into_iter()
            .filter_map(|(product_id, line)| {
                self.visible_product(&tables, product_id)
                    .map(|product| CartItem {
                        quantity: line.quantity,
                        product,
                    })
            })
            .collect())
    }

    async fn upsert_cart_line(&mut self, line: CartLine) -> Result<()> {
        if line.quantity <= 0 {
            return Err(StoreError::Constraint(
                "cart_lines_quantity_positive".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        if self.visible_product(&tables, line.product_id).is_none() {
            return Err(StoreError::Constraint(
                "cart_lines_product_id_fkey".to_string(),
            ));
        }

        let key = (line.user_id, line.product_id);
        let seq = match self.visible_line(&tables, key) {
            Some(existing) => existing.seq,
            None => {
                tables.next_seq += 1;
                tables.next_seq
            }
        };
        drop(tables);

        self.staged.cart.insert(
            key,
            Some(StoredLine {
                quantity: line.quantity,
                seq,
            }),
        );
        Ok(())
    }

    async fn delete_cart_line(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let key = (user_id, product_id);
        let tables = self.tables.read().await;
        let existed = self.visible_line(&tables, key).is_some();
        drop(tables);

        if existed {
            self.staged.cart.insert(key, None);
        }
        Ok(existed)
    }

    async fn delete_cart(&mut self, user_id: UserId) -> Result<u64> {
        let tables = self.tables.read().await;
        let removed = self.visible_lines(&tables, user_id).len() as u64;
        drop(tables);

        self.staged.cart.retain(|(user, _), _| *user != user_id);
        self.staged.cleared_carts.insert(user_id);
        Ok(removed)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let tables = self.tables.read().await;
        if let Some(missing) = order
            .lines
            .iter()
            .find(|line| self.visible_product(&tables, line.product_id).is_none())
        {
            return Err(StoreError::Constraint(format!(
                "order_lines_product_id_fkey ({})",
                missing.product_id
            )));
        }
        drop(tables);

        let row = order.into_order(OrderId::new(), Utc::now());
        self.staged.orders.push(row.clone());
        Ok(row)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        if let Some(order) = self.staged.orders.iter().find(|o| o.id == id) {
            return Ok(Some(order.clone()));
        }
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn commit(self) -> Result<()> {
        let InMemorySession {
            tables,
            locks,
            staged,
        } = self;

        let mut tables = tables.write().await;
        tables.products.extend(staged.products);
        for user_id in &staged.cleared_carts {
            tables.cart.retain(|(user, _), _| user != user_id);
        }
        for (key, line) in staged.cart {
            match line {
                Some(line) => {
                    tables.cart.insert(key, line);
                }
                None => {
                    tables.cart.remove(&key);
                }
            }
        }
        for order in staged.orders {
            tables.orders.insert(order.id, order);
        }
        drop(tables);

        // Row locks are released only once the writes are visible.
        drop(locks);
        metrics::counter!("store_commits_total").increment(1);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        tracing::debug!(locks = self.locks.len(), "rolling back in-memory session");
        metrics::counter!("store_rollbacks_total").increment(1);
        Ok(())
    }
}
