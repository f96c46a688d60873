use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};

use crate::{CartItem, CartLine, NewOrder, NewProduct, Order, Product, Result};

/// Source of atomic units over the storefront tables.
///
/// All implementations must be thread-safe (Send + Sync); every request
/// opens its own session rather than sharing process-wide state.
#[async_trait]
pub trait Store: Send + Sync {
    type Session: Session;

    /// Opens a new atomic unit.
    async fn begin(&self) -> Result<Self::Session>;
}

/// One atomic unit: every write made through a session is committed together
/// or discarded together.
///
/// Dropping a session without calling [`Session::commit`] rolls it back and
/// releases every row lock it holds.
#[async_trait]
pub trait Session: Send {
    /// Reads a product without locking it.
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Reads a product and takes its exclusive row lock for the rest of the
    /// session.
    ///
    /// Blocks while another session holds the lock. Concurrent decrements of
    /// the same product are serialized here.
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Inserts a new product. Fails with `Constraint` on a duplicate SKU.
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    /// Persists a new stock count. The row lock must already be held.
    async fn update_stock(&mut self, id: ProductId, stock: i64) -> Result<()>;

    /// Reads one cart line.
    async fn cart_line(&mut self, user_id: UserId, product_id: ProductId)
    -> Result<Option<CartLine>>;

    /// Reads a user's cart lines joined with current product data, in the
    /// cart's stored order.
    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItem>>;

    /// Creates or replaces a cart line. `quantity` must be positive.
    async fn upsert_cart_line(&mut self, line: CartLine) -> Result<()>;

    /// Deletes one cart line; returns whether it existed.
    async fn delete_cart_line(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    /// Deletes every cart line of a user; returns how many were removed.
    async fn delete_cart(&mut self, user_id: UserId) -> Result<u64>;

    /// Writes an order and all of its lines.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Reads an order with its lines.
    async fn order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Makes every write of this session visible and releases its locks.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this session and releases its locks.
    async fn rollback(self) -> Result<()>;
}
