//! Shared types for the storefront backend.
//!
//! Identifiers are UUID newtypes so that user, product and order ids cannot be
//! mixed up; monetary amounts are integer minor-currency units.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{OrderId, ProductId, UserId};
