//! Relational store for the storefront.
//!
//! A [`Store`] hands out [`Session`]s; each session is one atomic unit over
//! products, cart lines and orders. Two implementations share the contract:
//! [`InMemoryStore`] for tests and local runs, [`PostgresStore`] for
//! production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemorySession, InMemoryStore};
pub use model::{
    CartItem, CartLine, NewOrder, NewOrderLine, NewProduct, Order, OrderLine, OrderStatus,
    Product,
};
pub use postgres::{PostgresSession, PostgresStore};
pub use store::{Session, Store};
