//! The append-only inventory transaction log.

use chrono::Utc;
use stockroom_db::Journal;

use crate::error::CommerceError;
use crate::ids::{OrderId, VariantId};
use crate::inventory::{InventoryTransaction, NewTransaction, StockLevels};

/// Durable, ordered history of every stock movement.
///
/// [`InventoryTransactionLog::append`] is the only mutator. Entries are
/// never changed or removed once written.
#[derive(Debug)]
pub struct InventoryTransactionLog {
    journal: Journal<InventoryTransaction>,
}

impl InventoryTransactionLog {
    pub fn new() -> Self {
        Self {
            journal: Journal::new("inventory_transactions"),
        }
    }

    /// Append an entry. The quantity must be positive.
    pub fn append(&self, entry: NewTransaction) -> Result<InventoryTransaction, CommerceError> {
        if entry.quantity == 0 {
            return Err(CommerceError::InvalidQuantity(0));
        }
        let written = self
            .journal
            .append(|seq| entry.into_transaction(seq, Utc::now()))?;
        Ok(written)
    }

    /// Entries for a variant, newest first.
    pub fn find_by_variant(
        &self,
        variant_id: &VariantId,
    ) -> Result<Vec<InventoryTransaction>, CommerceError> {
        let mut entries = self.journal.scan(|e| &e.variant_id == variant_id)?;
        newest_first(&mut entries);
        Ok(entries)
    }

    /// Entries tagged with an order, newest first.
    pub fn find_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<InventoryTransaction>, CommerceError> {
        let mut entries = self
            .journal
            .scan(|e| e.order_id.as_ref() == Some(order_id))?;
        newest_first(&mut entries);
        Ok(entries)
    }

    /// Rebuild a variant's counters by folding its entries in ledger order.
    pub fn replay(&self, variant_id: &VariantId) -> Result<StockLevels, CommerceError> {
        let entries = self.journal.scan(|e| &e.variant_id == variant_id)?;
        Ok(StockLevels::fold(&entries))
    }

    /// Every entry, oldest first.
    pub fn all(&self) -> Result<Vec<InventoryTransaction>, CommerceError> {
        Ok(self.journal.all()?)
    }

    pub fn len(&self) -> Result<usize, CommerceError> {
        Ok(self.journal.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, CommerceError> {
        Ok(self.journal.is_empty()?)
    }
}

impl Default for InventoryTransactionLog {
    fn default() -> Self {
        Self::new()
    }
}

// Ledger ids follow append order; timestamps can go backwards.
fn newest_first(entries: &mut [InventoryTransaction]) {
    entries.sort_by(|a, b| b.id.cmp(&a.id));
}
