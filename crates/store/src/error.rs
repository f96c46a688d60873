use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A unique, check or foreign-key constraint rejected the write.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// A product row was written without holding its exclusive lock.
    #[error("Row lock not held for product {0}")]
    LockNotHeld(ProductId),

    /// A row that must exist for the write was missing.
    #[error("{table} row not found: {id}")]
    RowNotFound { table: &'static str, id: String },

    /// A stored row could not be decoded into its model.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
