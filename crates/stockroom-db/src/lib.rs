//! In-memory row store for Stockroom.
//!
//! Provides the two storage shapes the inventory core relies on:
//!
//! - [`Table`] - keyed rows, each behind its own exclusive lock, with
//!   staged updates that are discarded when the update fails
//! - [`Journal`] - append-only entries with monotonically increasing
//!   sequence numbers
//!
//! # Example
//!
//! ```rust
//! use stockroom_db::{DbError, LockPolicy, Table};
//!
//! let stock: Table<String, u32> = Table::new("stock", LockPolicy::default());
//! stock.insert("SKU-1".to_string(), 10).unwrap();
//!
//! let left: Result<u32, DbError> = stock.update(&"SKU-1".to_string(), |units| {
//!     *units -= 3;
//!     Ok(*units)
//! });
//! assert_eq!(left.unwrap(), 7);
//! ```

mod error;
mod journal;
mod lock;
mod table;

pub use error::DbError;
pub use journal::Journal;
pub use lock::{LockPolicy, DEFAULT_BACKOFF, DEFAULT_RETRY_BUDGET};
pub use table::Table;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{DbError, Journal, LockPolicy, Table};
}
