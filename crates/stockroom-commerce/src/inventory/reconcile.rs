//! Rebuilding stock levels from the ledger.

use serde::{Deserialize, Serialize};

use crate::catalog::ProductVariant;
use crate::ids::VariantId;
use crate::inventory::InventoryTransaction;

/// Stock counters, signed so that a corrupt history shows up as negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub stock: i64,
    pub reserved: i64,
}

impl StockLevels {
    /// Fold entries, oldest first, starting from zero.
    pub fn fold<'a>(entries: impl IntoIterator<Item = &'a InventoryTransaction>) -> Self {
        entries.into_iter().fold(Self::default(), |mut levels, entry| {
            let quantity = i64::from(entry.quantity);
            levels.stock += entry.transaction_type.stock_direction() * quantity;
            levels.reserved += entry.transaction_type.reserved_direction() * quantity;
            levels
        })
    }

    /// Current counters of a live variant.
    pub fn of(variant: &ProductVariant) -> Self {
        Self {
            stock: i64::from(variant.stock),
            reserved: i64::from(variant.reserved),
        }
    }
}

/// Comparison of a variant's live counters with its replayed history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub variant_id: VariantId,
    pub live: StockLevels,
    pub replayed: StockLevels,
    pub entries: usize,
}

impl Reconciliation {
    /// Whether the ledger fully explains the live counters.
    pub fn is_balanced(&self) -> bool {
        self.live == self.replayed
    }

    /// Units of stock the ledger does not account for (live minus replayed).
    pub fn stock_drift(&self) -> i64 {
        self.live.stock - self.replayed.stock
    }
}
