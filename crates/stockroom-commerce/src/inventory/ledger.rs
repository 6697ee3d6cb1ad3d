//! Per-variant stock/reservation ledger.

use std::sync::Arc;

use chrono::Utc;
use stockroom_db::{DbError, LockPolicy, Table};

use crate::catalog::{Catalog, NewVariant, ProductVariant};
use crate::error::CommerceError;
use crate::ids::{OrderId, VariantId};
use crate::inventory::{
    InventoryTransaction, InventoryTransactionLog, NewTransaction, Reconciliation, StockLevels,
    TransactionType,
};
use crate::money::Money;

/// How long a mutation may wait for a variant row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    /// Give up after the table's retry budget.
    Bounded,
    /// Wait as long as it takes; used for compensating writes.
    Blocking,
}

/// Owner of every variant's `stock`/`reserved` pair.
///
/// Each mutation locks one variant row, checks and updates the counters on
/// a staged copy, appends exactly one ledger entry, and only then writes
/// the row back. If the append fails the row is left untouched, so a
/// counter change is never visible without its entry.
#[derive(Debug)]
pub struct VariantLedger {
    variants: Table<VariantId, ProductVariant>,
    skus: Table<String, VariantId>,
    log: Arc<InventoryTransactionLog>,
}

impl VariantLedger {
    /// Create an empty ledger with its own transaction log.
    pub fn new(policy: LockPolicy) -> Self {
        Self::with_log(policy, Arc::new(InventoryTransactionLog::new()))
    }

    /// Create an empty ledger writing to `log`.
    pub fn with_log(policy: LockPolicy, log: Arc<InventoryTransactionLog>) -> Self {
        Self {
            variants: Table::new("product_variants", policy),
            skus: Table::new("variant_skus", policy),
            log,
        }
    }

    /// The transaction log this ledger appends to.
    pub fn log(&self) -> &Arc<InventoryTransactionLog> {
        &self.log
    }

    /// Register a variant. Opening stock is journalled as `STOCK_IN`.
    pub fn register_variant(&self, new: NewVariant) -> Result<ProductVariant, CommerceError> {
        let initial_stock = new.initial_stock;
        let variant = new.into_variant(Utc::now())?;
        let id = variant.id.clone();
        let sku = variant.sku.clone();

        self.skus.insert(sku.clone(), id.clone()).map_err(|e| match e {
            DbError::DuplicateKey { .. } => CommerceError::DuplicateSku(sku.clone()),
            other => CommerceError::Storage(other),
        })?;
        if let Err(e) = self.variants.insert(id.clone(), variant) {
            self.skus.remove(&sku)?;
            return Err(e.into());
        }

        if initial_stock > 0 {
            self.mutate(&id, Wait::Blocking, |v| {
                v.stock = initial_stock;
                Ok(Some(
                    NewTransaction::new(TransactionType::StockIn, initial_stock, v.id.clone())
                        .with_note("opening stock"),
                ))
            })?;
        }

        let variant = self.get(&id)?;
        tracing::info!(
            variant_id = %variant.id,
            sku = %variant.sku,
            stock = variant.stock,
            "variant registered"
        );
        Ok(variant)
    }

    /// Look up a variant.
    pub fn get(&self, id: &VariantId) -> Result<ProductVariant, CommerceError> {
        self.variants
            .get(id)?
            .ok_or_else(|| CommerceError::VariantNotFound(id.clone()))
    }

    /// Look up a variant by SKU.
    pub fn get_by_sku(&self, sku: &str) -> Result<ProductVariant, CommerceError> {
        let id = self
            .skus
            .get(&sku.to_string())?
            .ok_or_else(|| CommerceError::VariantNotFound(VariantId::new(sku)))?;
        self.get(&id)
    }

    /// All variant IDs, ascending.
    pub fn variant_ids(&self) -> Result<Vec<VariantId>, CommerceError> {
        let mut ids = self.variants.keys()?;
        ids.sort();
        Ok(ids)
    }

    /// Change the live price. Existing cart snapshots and order lines keep
    /// their prices.
    pub fn set_price(&self, id: &VariantId, price: Money) -> Result<ProductVariant, CommerceError> {
        if price.is_negative() {
            return Err(CommerceError::InvalidPrice(price.display()));
        }
        self.edit(id, |v| {
            if v.price.currency != price.currency {
                return Err(CommerceError::CurrencyMismatch {
                    expected: v.price.currency,
                    got: price.currency,
                });
            }
            v.price = price;
            Ok(())
        })
    }

    /// Activate or deactivate a variant. Inactive variants cannot be
    /// reserved; existing reservations can still be released or committed.
    pub fn set_active(&self, id: &VariantId, active: bool) -> Result<ProductVariant, CommerceError> {
        self.edit(id, |v| {
            v.is_active = active;
            Ok(())
        })
    }

    /// Hold `quantity` units for a checkout.
    pub fn reserve(
        &self,
        id: &VariantId,
        quantity: u32,
    ) -> Result<InventoryTransaction, CommerceError> {
        if quantity == 0 {
            return Err(CommerceError::InvalidQuantity(0));
        }

        let result = self
            .mutate(id, Wait::Bounded, |v| {
                if !v.is_active {
                    return Err(CommerceError::VariantInactive(v.id.clone()));
                }
                if !v.can_fulfill(quantity) {
                    return Err(CommerceError::InsufficientStock {
                        variant_id: v.id.clone(),
                        requested: quantity,
                        available: Some(v.available()),
                    });
                }
                v.reserved += quantity;
                Ok(Some(NewTransaction::new(
                    TransactionType::Reserved,
                    quantity,
                    v.id.clone(),
                )))
            })
            .map_err(|e| match e {
                CommerceError::Storage(DbError::LockTimeout { .. }) => {
                    CommerceError::InsufficientStock {
                        variant_id: id.clone(),
                        requested: quantity,
                        available: None,
                    }
                }
                other => other,
            });

        traced("reserve", result).and_then(|entry| expect_entry(id, entry))
    }

    /// Return up to `quantity` reserved units. Reserved never goes below
    /// zero; `None` means there was nothing to release.
    pub fn release(
        &self,
        id: &VariantId,
        quantity: u32,
    ) -> Result<Option<InventoryTransaction>, CommerceError> {
        self.release_for(id, quantity, None, None)
    }

    pub(crate) fn release_for(
        &self,
        id: &VariantId,
        quantity: u32,
        order_id: Option<&OrderId>,
        note: Option<&str>,
    ) -> Result<Option<InventoryTransaction>, CommerceError> {
        if quantity == 0 {
            return Err(CommerceError::InvalidQuantity(0));
        }

        let result = self.mutate(id, Wait::Blocking, |v| {
            let released = quantity.min(v.reserved);
            if released == 0 {
                return Ok(None);
            }
            v.reserved -= released;
            let mut entry = NewTransaction::new(TransactionType::Released, released, v.id.clone())
                .with_order(order_id.cloned());
            if let Some(note) = note {
                entry = entry.with_note(note);
            }
            Ok(Some(entry))
        });
        traced("release", result)
    }

    /// Turn a reservation into a permanent deduction for `order_id`.
    pub fn commit(
        &self,
        id: &VariantId,
        quantity: u32,
        order_id: &OrderId,
    ) -> Result<InventoryTransaction, CommerceError> {
        if quantity == 0 {
            return Err(CommerceError::InvalidQuantity(0));
        }

        let result = self.mutate(id, Wait::Blocking, |v| {
            if v.reserved < quantity {
                return Err(CommerceError::ReservationUnderflow {
                    variant_id: v.id.clone(),
                    reserved: v.reserved,
                    requested: quantity,
                });
            }
            v.reserved -= quantity;
            v.stock -= quantity;
            Ok(Some(
                NewTransaction::new(TransactionType::Sale, quantity, v.id.clone())
                    .with_order(Some(order_id.clone())),
            ))
        });
        traced("commit", result).and_then(|entry| expect_entry(id, entry))
    }

    /// Administrative stock change bypassing reservations.
    ///
    /// Positive deltas are journalled as `STOCK_IN`, negative ones as
    /// `ADJUSTMENT`. Stock may never drop below `reserved`.
    pub fn adjust_stock(
        &self,
        id: &VariantId,
        delta: i64,
        note: &str,
    ) -> Result<InventoryTransaction, CommerceError> {
        if delta == 0 {
            return Err(CommerceError::InvalidQuantity(0));
        }
        let magnitude = u32::try_from(delta.unsigned_abs()).map_err(|_| CommerceError::Overflow)?;

        let result = self.mutate(id, Wait::Bounded, |v| {
            let kind = if delta > 0 {
                v.stock = v.stock.checked_add(magnitude).ok_or(CommerceError::Overflow)?;
                TransactionType::StockIn
            } else {
                match v.stock.checked_sub(magnitude) {
                    Some(stock) if stock >= v.reserved => v.stock = stock,
                    _ => {
                        return Err(CommerceError::StockUnderflow {
                            variant_id: v.id.clone(),
                            stock: v.stock,
                            reserved: v.reserved,
                            delta,
                        })
                    }
                }
                TransactionType::Adjustment
            };
            Ok(Some(
                NewTransaction::new(kind, magnitude, v.id.clone()).with_note(note),
            ))
        });

        let entry = traced("adjust_stock", result).and_then(|entry| expect_entry(id, entry))?;
        tracing::info!(
            variant_id = %id,
            delta,
            note,
            transaction_id = %entry.id,
            "stock adjusted"
        );
        Ok(entry)
    }

    /// Put committed units back into stock for a cancelled order.
    pub fn return_stock(
        &self,
        id: &VariantId,
        quantity: u32,
        order_id: &OrderId,
    ) -> Result<InventoryTransaction, CommerceError> {
        if quantity == 0 {
            return Err(CommerceError::InvalidQuantity(0));
        }

        let result = self.mutate(id, Wait::Blocking, |v| {
            v.stock = v.stock.checked_add(quantity).ok_or(CommerceError::Overflow)?;
            Ok(Some(
                NewTransaction::new(TransactionType::Return, quantity, v.id.clone())
                    .with_order(Some(order_id.clone())),
            ))
        });
        traced("return_stock", result).and_then(|entry| expect_entry(id, entry))
    }

    /// Compare a variant's live counters with its replayed ledger.
    ///
    /// The row lock is held while the ledger is read, so no mutation can
    /// land between the two reads.
    pub fn reconcile(&self, id: &VariantId) -> Result<Reconciliation, CommerceError> {
        let (variant, replayed, entries) = self
            .variants
            .read(id, |v| {
                let replayed = self.log.replay(id);
                let entries = self.log.find_by_variant(id).map(|e| e.len());
                (v.clone(), replayed, entries)
            })?
            .ok_or_else(|| CommerceError::VariantNotFound(id.clone()))?;

        let reconciliation = Reconciliation {
            variant_id: id.clone(),
            live: StockLevels::of(&variant),
            replayed: replayed?,
            entries: entries?,
        };
        if !reconciliation.is_balanced() {
            tracing::error!(
                variant_id = %id,
                live_stock = reconciliation.live.stock,
                replayed_stock = reconciliation.replayed.stock,
                live_reserved = reconciliation.live.reserved,
                replayed_reserved = reconciliation.replayed.reserved,
                "ledger does not reconcile with variant counters"
            );
        }
        Ok(reconciliation)
    }

    /// Run a counter mutation and its ledger append as one unit.
    fn mutate(
        &self,
        id: &VariantId,
        wait: Wait,
        f: impl FnOnce(&mut ProductVariant) -> Result<Option<NewTransaction>, CommerceError>,
    ) -> Result<Option<InventoryTransaction>, CommerceError> {
        let op = |variant: &mut ProductVariant| -> Result<Option<InventoryTransaction>, CommerceError> {
            let Some(pending) = f(variant)? else {
                return Ok(None);
            };
            if !variant.is_consistent() {
                return Err(CommerceError::StockUnderflow {
                    variant_id: variant.id.clone(),
                    stock: variant.stock,
                    reserved: variant.reserved,
                    delta: 0,
                });
            }
            variant.updated_at = Utc::now();
            let entry = self.log.append(pending)?;
            tracing::debug!(
                variant_id = %variant.id,
                kind = %entry.transaction_type,
                quantity = entry.quantity,
                stock = variant.stock,
                reserved = variant.reserved,
                "inventory mutation"
            );
            Ok(Some(entry))
        };

        let result = match wait {
            Wait::Bounded => self.variants.update(id, op),
            Wait::Blocking => self.variants.update_blocking(id, op),
        };
        result.map_err(|e| not_found_as_variant(e, id))
    }

    /// Catalog edits that do not touch stock and write no ledger entry.
    fn edit(
        &self,
        id: &VariantId,
        f: impl FnOnce(&mut ProductVariant) -> Result<(), CommerceError>,
    ) -> Result<ProductVariant, CommerceError> {
        self.variants
            .update(id, |v| -> Result<ProductVariant, CommerceError> {
                f(v)?;
                v.updated_at = Utc::now();
                Ok(v.clone())
            })
            .map_err(|e| not_found_as_variant(e, id))
    }
}

impl Catalog for VariantLedger {
    fn variant(&self, id: &VariantId) -> Result<ProductVariant, CommerceError> {
        self.get(id)
    }
}

fn not_found_as_variant(e: CommerceError, id: &VariantId) -> CommerceError {
    match e {
        CommerceError::Storage(DbError::NotFound { .. }) => {
            CommerceError::VariantNotFound(id.clone())
        }
        other => other,
    }
}

fn expect_entry(
    id: &VariantId,
    entry: Option<InventoryTransaction>,
) -> Result<InventoryTransaction, CommerceError> {
    entry.ok_or_else(|| CommerceError::VariantNotFound(id.clone()))
}

fn traced<T>(operation: &'static str, result: Result<T, CommerceError>) -> Result<T, CommerceError> {
    if let Err(e) = &result {
        e.trace(operation);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn ledger_with(stock: u32) -> (VariantLedger, VariantId) {
        let ledger = VariantLedger::new(LockPolicy::default());
        let variant = ledger
            .register_variant(
                NewVariant::new("SKU-1", "Mug", Money::new(1200, Currency::USD))
                    .with_id("V1")
                    .with_stock(stock),
            )
            .unwrap();
        (ledger, variant.id)
    }

    #[test]
    fn test_opening_stock_is_journalled() {
        let (ledger, id) = ledger_with(10);
        let entries = ledger.log().find_by_variant(&id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transaction_type, TransactionType::StockIn);
        assert_eq!(entries[0].quantity, 10);
        assert!(ledger.reconcile(&id).unwrap().is_balanced());
    }

    #[test]
    fn test_duplicate_sku_rejected() {
        let (ledger, _) = ledger_with(1);
        let result = ledger.register_variant(NewVariant::new(
            "SKU-1",
            "Other mug",
            Money::new(100, Currency::USD),
        ));
        assert_eq!(result.unwrap_err(), CommerceError::DuplicateSku("SKU-1".into()));
        assert_eq!(ledger.variant_ids().unwrap().len(), 1);
    }

    #[test]
    fn test_reserve_refuses_oversell() {
        let (ledger, id) = ledger_with(10);
        ledger.reserve(&id, 7).unwrap();

        let err = ledger.reserve(&id, 5).unwrap_err();
        assert_eq!(
            err,
            CommerceError::InsufficientStock {
                variant_id: id.clone(),
                requested: 5,
                available: Some(3),
            }
        );
        let v = ledger.get(&id).unwrap();
        assert_eq!((v.stock, v.reserved), (10, 7));
        // STOCK_IN + one RESERVED; the refused request wrote nothing.
        assert_eq!(ledger.log().len().unwrap(), 2);
    }

    #[test]
    fn test_reserve_validation() {
        let (ledger, id) = ledger_with(3);
        assert_eq!(ledger.reserve(&id, 0).unwrap_err(), CommerceError::InvalidQuantity(0));
        assert!(matches!(
            ledger.reserve(&VariantId::new("nope"), 1),
            Err(CommerceError::VariantNotFound(_))
        ));

        ledger.set_active(&id, false).unwrap();
        assert_eq!(
            ledger.reserve(&id, 1).unwrap_err(),
            CommerceError::VariantInactive(id.clone())
        );
    }

    #[test]
    fn test_release_clamps_at_zero() {
        let (ledger, id) = ledger_with(5);
        ledger.reserve(&id, 2).unwrap();

        let entry = ledger.release(&id, 5).unwrap().unwrap();
        assert_eq!(entry.quantity, 2);
        assert_eq!(ledger.get(&id).unwrap().reserved, 0);

        assert!(ledger.release(&id, 1).unwrap().is_none());
        assert!(ledger.reconcile(&id).unwrap().is_balanced());
    }

    #[test]
    fn test_commit_moves_stock() {
        let (ledger, id) = ledger_with(5);
        let order = OrderId::new("O1");
        ledger.reserve(&id, 3).unwrap();

        let sale = ledger.commit(&id, 3, &order).unwrap();
        assert_eq!(sale.transaction_type, TransactionType::Sale);
        assert_eq!(sale.order_id, Some(order.clone()));

        let v = ledger.get(&id).unwrap();
        assert_eq!((v.stock, v.reserved), (2, 0));
        assert!(matches!(
            ledger.commit(&id, 1, &order),
            Err(CommerceError::ReservationUnderflow { reserved: 0, requested: 1, .. })
        ));
    }

    #[test]
    fn test_adjust_stock_cannot_undercut_reservations() {
        let (ledger, id) = ledger_with(5);
        ledger.reserve(&id, 3).unwrap();

        let err = ledger.adjust_stock(&id, -5, "damaged").unwrap_err();
        assert_eq!(
            err,
            CommerceError::StockUnderflow {
                variant_id: id.clone(),
                stock: 5,
                reserved: 3,
                delta: -5,
            }
        );
        let v = ledger.get(&id).unwrap();
        assert_eq!((v.stock, v.reserved), (5, 3));

        let entry = ledger.adjust_stock(&id, -2, "damaged").unwrap();
        assert_eq!(entry.transaction_type, TransactionType::Adjustment);
        assert_eq!(entry.note.as_deref(), Some("damaged"));
        assert_eq!(ledger.get(&id).unwrap().stock, 3);

        let entry = ledger.adjust_stock(&id, 4, "restock").unwrap();
        assert_eq!(entry.transaction_type, TransactionType::StockIn);
        assert_eq!(ledger.get(&id).unwrap().stock, 7);
        assert!(ledger.reconcile(&id).unwrap().is_balanced());
    }

    #[test]
    fn test_return_stock() {
        let (ledger, id) = ledger_with(4);
        let order = OrderId::new("O1");
        ledger.reserve(&id, 4).unwrap();
        ledger.commit(&id, 4, &order).unwrap();
        ledger.return_stock(&id, 4, &order).unwrap();

        assert_eq!(ledger.get(&id).unwrap().stock, 4);
        let kinds: Vec<_> = ledger
            .log()
            .find_by_order(&order)
            .unwrap()
            .into_iter()
            .map(|e| e.transaction_type)
            .collect();
        assert_eq!(kinds, vec![TransactionType::Return, TransactionType::Sale]);
    }

    #[test]
    fn test_set_price_checks_currency() {
        let (ledger, id) = ledger_with(1);
        assert!(matches!(
            ledger.set_price(&id, Money::new(900, Currency::EUR)),
            Err(CommerceError::CurrencyMismatch { .. })
        ));
        let v = ledger.set_price(&id, Money::new(900, Currency::USD)).unwrap();
        assert_eq!(v.price.amount_cents, 900);
        assert_eq!(ledger.get_by_sku("SKU-1").unwrap().price.amount_cents, 900);
    }

    #[test]
    fn test_busy_row_reports_insufficient_stock() {
        let ledger = VariantLedger::new(LockPolicy::fail_fast());
        let id = ledger
            .register_variant(
                NewVariant::new("SKU-9", "Lamp", Money::new(5000, Currency::USD))
                    .with_id("V9")
                    .with_stock(2),
            )
            .unwrap()
            .id;

        // Hold the row lock from inside another mutation.
        let err = ledger
            .edit(&id, |_| Err(ledger.reserve(&id, 1).unwrap_err()))
            .unwrap_err();
        assert!(matches!(err, CommerceError::InsufficientStock { available: None, .. }));
        assert_eq!(ledger.get(&id).unwrap().reserved, 0);
    }
}
