//! Order ledger.

use common::OrderId;
use store::{NewOrder, Order, Session};

use crate::error::LedgerError;

/// Writes orders and reads them back. Orders are never updated.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderLedger;

impl OrderLedger {
    pub fn new() -> Self {
        Self
    }

    /// Writes the order and its line snapshots in the caller's session.
    #[tracing::instrument(skip(self, session, order), fields(user_id = %order.user_id, lines = order.lines.len()))]
    pub async fn create<S: Session>(
        &self,
        session: &mut S,
        order: NewOrder,
    ) -> Result<Order, LedgerError> {
        Ok(session.insert_order(order).await?)
    }

    pub async fn get<S: Session>(
        &self,
        session: &mut S,
        order_id: OrderId,
    ) -> Result<Order, LedgerError> {
        session
            .order(order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(order_id))
    }
}
