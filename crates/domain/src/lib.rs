//! Ledgers of the storefront checkout core.
//!
//! Each ledger owns the rules for one kind of row and operates on an explicit
//! [`store::Session`] handed in by the caller, so several ledger calls can
//! share one atomic unit:
//! - [`CartLedger`] merges quantity deltas into cart lines
//! - [`InventoryLedger`] locks products and applies conditional decrements
//! - [`OrderLedger`] writes immutable orders with their line snapshots

pub mod cart;
pub mod error;
pub mod inventory;
pub mod orders;

pub use cart::CartLedger;
pub use error::LedgerError;
pub use inventory::{InventoryLedger, STOCK_POLICY, StockPolicy};
pub use orders::OrderLedger;
