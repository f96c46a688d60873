//! Row models.
//!
//! Plain value structs with explicit foreign-key fields. Cross-entity reads
//! (a cart line with its product, an order with its lines) are resolved by
//! [`Session`](crate::Session) read methods.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A catalog product with its current price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    /// Current unit price. Not authoritative for orders already placed.
    pub price: Money,
    /// Units on hand, never negative.
    pub stock: i64,
}

/// A product to be inserted; the store assigns the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub stock: i64,
}

impl NewProduct {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: Money, stock: i64) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            price,
            stock,
        }
    }
}

/// One (user, product) entry in a cart. `quantity > 0` while the line exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A cart line resolved against its product's current data.
///
/// The resolved price is for display and estimates only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub quantity: i64,
    pub product: Product,
}

impl CartItem {
    /// Returns quantity times the product's current price, `None` on overflow.
    pub fn subtotal(&self) -> Option<Money> {
        self.product.price.checked_mul(self.quantity)
    }
}

/// Lifecycle status of an order. Orders are created paid; nothing else exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Paid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "paid" => Ok(OrderStatus::Paid),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// Price snapshot of one purchased product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Unit price at purchase time; the billing source of truth.
    pub unit_price: Money,
}

impl OrderLine {
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// An immutable order with its line snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    /// Payment gateway reference for the authorized charge.
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

/// Line snapshot for an order that has not been written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// An order to be written together with its lines in a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub transaction_id: String,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    /// Materializes the order under the given identifier and creation time.
    pub(crate) fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            user_id: self.user_id,
            total: self.total,
            status: self.status,
            transaction_id: self.transaction_id,
            created_at,
            lines: self
                .lines
                .into_iter()
                .map(|line| OrderLine {
                    order_id: id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_round_trips_through_str() {
        assert_eq!(OrderStatus::Paid.to_string(), "paid");
        assert_eq!("paid".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_cart_item_subtotal_uses_current_price() {
        let item = CartItem {
            quantity: 2,
            product: Product {
                id: ProductId::new(),
                sku: "ZEL-1".to_string(),
                name: "Zelda".to_string(),
                price: Money::from_cents(6000),
                stock: 10,
            },
        };
        assert_eq!(item.subtotal(), Some(Money::from_cents(12000)));
    }

    #[test]
    fn test_into_order_stamps_order_id_on_lines() {
        let product_id = ProductId::new();
        let new_order = NewOrder {
            user_id: UserId::new(),
            total: Money::from_cents(300),
            status: OrderStatus::Paid,
            transaction_id: "TX-1".to_string(),
            lines: vec![NewOrderLine {
                product_id,
                quantity: 3,
                unit_price: Money::from_cents(100),
            }],
        };

        let id = OrderId::new();
        let order = new_order.into_order(id, Utc::now());
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].order_id, id);
        assert_eq!(order.lines[0].total_price(), Some(Money::from_cents(300)));
    }
}
