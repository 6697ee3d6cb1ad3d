//! Database error types.

use thiserror::Error;

/// Errors that can occur when using the row store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// A row or journal lock was poisoned by a panicking writer.
    #[error("Lock poisoned on {0}")]
    Poisoned(String),

    /// The row lock could not be acquired within the retry budget.
    #[error("Lock on {table}/{key} not acquired after {attempts} attempts")]
    LockTimeout {
        table: String,
        key: String,
        attempts: u32,
    },

    /// No row exists for the key.
    #[error("Row not found: {table}/{key}")]
    NotFound { table: String, key: String },

    /// A row already exists for the key.
    #[error("Duplicate key: {table}/{key}")]
    DuplicateKey { table: String, key: String },
}

impl DbError {
    /// Whether the error is transient lock contention rather than a fault.
    pub fn is_contention(&self) -> bool {
        matches!(self, DbError::LockTimeout { .. })
    }
}
