//! Cart ledger.

use common::{ProductId, UserId};
use store::{CartItem, CartLine, Session};

use crate::error::LedgerError;

/// Owns per-user cart lines.
///
/// A line exists only while its quantity is positive: adjustments that bring
/// it to zero or below delete it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartLedger;

impl CartLedger {
    pub fn new() -> Self {
        Self
    }

    /// Adds `delta` to the user's line for `product_id`.
    ///
    /// - existing line: the sum is persisted, or the line is deleted when the
    ///   sum is not positive;
    /// - no line: a line is created only for a positive delta, otherwise this
    ///   is a no-op.
    ///
    /// Returns the resulting line, or `None` when no line remains.
    #[tracing::instrument(skip(self, session))]
    pub async fn add_or_adjust<S: Session>(
        &self,
        session: &mut S,
        user_id: UserId,
        product_id: ProductId,
        delta: i64,
    ) -> Result<Option<CartLine>, LedgerError> {
        if session.product(product_id).await?.is_none() {
            return Err(LedgerError::ProductNotFound(product_id));
        }

        let Some(existing) = session.cart_line(user_id, product_id).await? else {
            if delta <= 0 {
                tracing::debug!("non-positive delta on absent line, nothing to do");
                return Ok(None);
            }
            let line = CartLine {
                user_id,
                product_id,
                quantity: delta,
            };
            session.upsert_cart_line(line).await?;
            return Ok(Some(line));
        };

        let quantity = existing
            .quantity
            .checked_add(delta)
            .ok_or(LedgerError::InvalidQuantity(delta))?;

        if quantity <= 0 {
            session.delete_cart_line(user_id, product_id).await?;
            return Ok(None);
        }

        let line = CartLine {
            quantity,
            ..existing
        };
        session.upsert_cart_line(line).await?;
        Ok(Some(line))
    }

    /// Returns the user's lines with their products' current name, price and
    /// stock, in cart order.
    pub async fn get<S: Session>(
        &self,
        session: &mut S,
        user_id: UserId,
    ) -> Result<Vec<CartItem>, LedgerError> {
        Ok(session.cart_items(user_id).await?)
    }

    /// Deletes one line.
    #[tracing::instrument(skip(self, session))]
    pub async fn remove_line<S: Session>(
        &self,
        session: &mut S,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), LedgerError> {
        if session.delete_cart_line(user_id, product_id).await? {
            Ok(())
        } else {
            Err(LedgerError::CartLineNotFound(product_id))
        }
    }

    /// Deletes every line of the user's cart.
    pub async fn clear<S: Session>(
        &self,
        session: &mut S,
        user_id: UserId,
    ) -> Result<u64, LedgerError> {
        Ok(session.delete_cart(user_id).await?)
    }
}
