#![allow(dead_code)]

use stockroom_commerce::prelude::*;

pub fn usd(cents: i64) -> Money {
    Money::new(cents, Currency::USD)
}

/// Register a variant with a fixed id, price and opening stock.
pub fn variant(shop: &Shop, id: &str, cents: i64, stock: u32) -> VariantId {
    shop.ledger
        .register_variant(
            NewVariant::new(format!("SKU-{id}"), id, usd(cents))
                .with_id(id)
                .with_stock(stock),
        )
        .unwrap()
        .id
}

pub fn levels(shop: &Shop, id: &VariantId) -> (u32, u32) {
    let v = shop.ledger.get(id).unwrap();
    (v.stock, v.reserved)
}

/// Kinds of a variant's ledger entries, oldest first.
pub fn entry_kinds(shop: &Shop, id: &VariantId) -> Vec<TransactionType> {
    let mut entries = shop.log.find_by_variant(id).unwrap();
    entries.reverse();
    entries.into_iter().map(|e| e.transaction_type).collect()
}

pub fn assert_balanced(shop: &Shop) {
    for id in shop.ledger.variant_ids().unwrap() {
        let r = shop.ledger.reconcile(&id).unwrap();
        assert!(r.is_balanced(), "{id} does not reconcile: {r:?}");
    }
}

pub fn card() -> PaymentResult {
    PaymentResult::pending(PaymentMethod::Card)
}
