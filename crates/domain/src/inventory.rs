//! Inventory ledger.

use common::ProductId;
use store::{Product, Session};

use crate::error::LedgerError;

/// Rule deciding whether a purchase may take `requested` units out of
/// `stock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StockPolicy {
    /// `stock >= requested`: the last units on hand can be sold.
    #[default]
    AllowExhaustion,

    /// `stock > requested`: a purchase may never leave zero behind.
    KeepLastUnit,
}

impl StockPolicy {
    /// Returns true if taking `requested` units out of `stock` is legal.
    pub fn permits(&self, stock: i64, requested: i64) -> bool {
        match self {
            StockPolicy::AllowExhaustion => stock >= requested,
            StockPolicy::KeepLastUnit => stock > requested,
        }
    }
}

/// The stock rule applied by every checkout.
pub const STOCK_POLICY: StockPolicy = StockPolicy::AllowExhaustion;

/// Owns per-product stock counts.
///
/// Stock is only written through [`InventoryLedger::decrement`], on a row
/// locked by [`InventoryLedger::get_for_exclusive_read`] in the same session.
#[derive(Debug, Clone, Copy)]
pub struct InventoryLedger {
    policy: StockPolicy,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryLedger {
    /// Creates a ledger applying [`STOCK_POLICY`].
    pub fn new() -> Self {
        Self::with_policy(STOCK_POLICY)
    }

    pub fn with_policy(policy: StockPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StockPolicy {
        self.policy
    }

    /// Reads a product under its exclusive row lock, held until the session
    /// ends.
    #[tracing::instrument(skip(self, session))]
    pub async fn get_for_exclusive_read<S: Session>(
        &self,
        session: &mut S,
        product_id: ProductId,
    ) -> Result<Product, LedgerError> {
        session
            .product_for_update(product_id)
            .await?
            .ok_or(LedgerError::ProductNotFound(product_id))
    }

    /// Takes `quantity` units out of a locked product.
    ///
    /// Fails with [`LedgerError::InsufficientStock`] when the policy refuses;
    /// callers must then discard the whole session. Returns the product with
    /// its new stock.
    #[tracing::instrument(skip(self, session, product), fields(product_id = %product.id, stock = product.stock))]
    pub async fn decrement<S: Session>(
        &self,
        session: &mut S,
        product: &Product,
        quantity: i64,
    ) -> Result<Product, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(quantity));
        }

        if !self.policy.permits(product.stock, quantity) {
            metrics::counter!("inventory_insufficient_stock_total").increment(1);
            return Err(LedgerError::InsufficientStock {
                product_id: product.id,
                name: product.name.clone(),
                requested: quantity,
                available: product.stock,
            });
        }

        let stock = product.stock - quantity;
        session.update_stock(product.id, stock).await?;
        metrics::counter!("inventory_decrements_total").increment(1);

        Ok(Product {
            stock,
            ..product.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use store::{InMemoryStore, NewProduct, Store, StoreError};

    use super::*;

    async fn seed(stock: i64) -> (InMemoryStore, ProductId) {
        let store = InMemoryStore::new();
        let mut session = store.begin().await.unwrap();
        let product = session
            .insert_product(NewProduct::new("SKU-001", "Widget", Money::from_cents(1000), stock))
            .await
            .unwrap();
        session.commit().await.unwrap();
        (store, product.id)
    }

    #[test]
    fn test_policy_boundaries() {
        assert!(StockPolicy::AllowExhaustion.permits(1, 1));
        assert!(!StockPolicy::AllowExhaustion.permits(0, 1));
        assert!(!StockPolicy::KeepLastUnit.permits(1, 1));
        assert!(StockPolicy::KeepLastUnit.permits(2, 1));
    }

    #[test]
    fn test_default_ledger_uses_crate_policy() {
        assert_eq!(InventoryLedger::default().policy(), STOCK_POLICY);
    }

    #[tokio::test]
    async fn test_decrement_persists_on_commit() {
        let (store, product_id) = seed(10).await;
        let ledger = InventoryLedger::new();

        let mut session = store.begin().await.unwrap();
        let product = ledger
            .get_for_exclusive_read(&mut session, product_id)
            .await
            .unwrap();
        let updated = ledger.decrement(&mut session, &product, 2).await.unwrap();
        assert_eq!(updated.stock, 8);
        session.commit().await.unwrap();

        assert_eq!(store.stock(product_id).await, Some(8));
    }

    #[tokio::test]
    async fn test_exact_exhaustion_depends_on_policy() {
        let (store, product_id) = seed(1).await;

        let strict = InventoryLedger::with_policy(StockPolicy::KeepLastUnit);
        let mut session = store.begin().await.unwrap();
        let product = strict
            .get_for_exclusive_read(&mut session, product_id)
            .await
            .unwrap();
        let result = strict.decrement(&mut session, &product, 1).await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientStock {
                requested: 1,
                available: 1,
                ..
            })
        ));
        drop(session);

        let lenient = InventoryLedger::with_policy(StockPolicy::AllowExhaustion);
        let mut session = store.begin().await.unwrap();
        let product = lenient
            .get_for_exclusive_read(&mut session, product_id)
            .await
            .unwrap();
        let updated = lenient.decrement(&mut session, &product, 1).await.unwrap();
        assert_eq!(updated.stock, 0);
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let (store, _) = seed(1).await;
        let ledger = InventoryLedger::new();
        let missing = ProductId::new();

        let mut session = store.begin().await.unwrap();
        let result = ledger.get_for_exclusive_read(&mut session, missing).await;
        assert!(matches!(result, Err(LedgerError::ProductNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_decrement_without_lock_is_refused_by_store() {
        let (store, product_id) = seed(5).await;
        let ledger = InventoryLedger::new();

        let mut session = store.begin().await.unwrap();
        let product = session.product(product_id).await.unwrap().unwrap();
        let result = ledger.decrement(&mut session, &product, 1).await;
        assert!(matches!(
            result,
            Err(LedgerError::Store(StoreError::LockNotHeld(_)))
        ));
    }

    #[tokio::test]
    async fn test_non_positive_quantity_is_rejected() {
        let (store, product_id) = seed(5).await;
        let ledger = InventoryLedger::new();

        let mut session = store.begin().await.unwrap();
        let product = ledger
            .get_for_exclusive_read(&mut session, product_id)
            .await
            .unwrap();
        let result = ledger.decrement(&mut session, &product, 0).await;
        assert!(matches!(result, Err(LedgerError::InvalidQuantity(0))));
    }
}
