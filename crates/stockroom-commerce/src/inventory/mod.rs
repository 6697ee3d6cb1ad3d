//! Stock accounting: the variant ledger and its transaction log.

mod ledger;
mod log;
mod reconcile;
mod transaction;

pub use ledger::VariantLedger;
pub use log::InventoryTransactionLog;
pub use reconcile::{Reconciliation, StockLevels};
pub use transaction::{InventoryTransaction, NewTransaction, TransactionType};
