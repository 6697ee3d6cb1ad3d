//! Inventory transaction records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, TransactionId, VariantId};

/// Kind of stock movement.
///
/// Quantities on transactions are always positive; the kind carries the
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Units received (restock, opening stock, positive correction).
    StockIn,
    /// Reservation committed on checkout. `STOCK_OUT` is read as this.
    #[serde(alias = "STOCK_OUT")]
    Sale,
    /// Reservation taken.
    Reserved,
    /// Reservation returned.
    Released,
    /// Units written off by a manual correction.
    Adjustment,
    /// Units returned from a cancelled order.
    Return,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::StockIn => "STOCK_IN",
            TransactionType::Sale => "SALE",
            TransactionType::Reserved => "RESERVED",
            TransactionType::Released => "RELEASED",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Return => "RETURN",
        }
    }

    /// Parse the wire name (e.g., "SALE").
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "STOCK_IN" => Some(TransactionType::StockIn),
            "SALE" | "STOCK_OUT" => Some(TransactionType::Sale),
            "RESERVED" => Some(TransactionType::Reserved),
            "RELEASED" => Some(TransactionType::Released),
            "ADJUSTMENT" => Some(TransactionType::Adjustment),
            "RETURN" => Some(TransactionType::Return),
            _ => None,
        }
    }

    /// Sign applied to `quantity` when folding into `stock`.
    pub fn stock_direction(&self) -> i64 {
        match self {
            TransactionType::StockIn | TransactionType::Return => 1,
            TransactionType::Sale | TransactionType::Adjustment => -1,
            TransactionType::Reserved | TransactionType::Released => 0,
        }
    }

    /// Sign applied to `quantity` when folding into `reserved`.
    pub fn reserved_direction(&self) -> i64 {
        match self {
            TransactionType::Reserved => 1,
            TransactionType::Released | TransactionType::Sale => -1,
            TransactionType::StockIn | TransactionType::Adjustment | TransactionType::Return => 0,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryTransaction {
    /// Position in the ledger.
    pub id: TransactionId,
    /// Kind of movement.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Units moved (always positive).
    pub quantity: u32,
    /// Free-form note (e.g., "damaged in transit").
    pub note: Option<String>,
    /// When the movement was recorded.
    pub created_at: DateTime<Utc>,
    /// Variant affected.
    pub variant_id: VariantId,
    /// Order responsible, if any.
    pub order_id: Option<OrderId>,
}

/// An entry waiting to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub quantity: u32,
    pub variant_id: VariantId,
    pub order_id: Option<OrderId>,
    pub note: Option<String>,
}

impl NewTransaction {
    pub fn new(transaction_type: TransactionType, quantity: u32, variant_id: VariantId) -> Self {
        Self {
            transaction_type,
            quantity,
            variant_id,
            order_id: None,
            note: None,
        }
    }

    pub fn with_order(mut self, order_id: Option<OrderId>) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub(crate) fn into_transaction(self, seq: u64, created_at: DateTime<Utc>) -> InventoryTransaction {
        InventoryTransaction {
            id: TransactionId(seq),
            transaction_type: self.transaction_type,
            quantity: self.quantity,
            note: self.note,
            created_at,
            variant_id: self.variant_id,
            order_id: self.order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for kind in [
            TransactionType::StockIn,
            TransactionType::Sale,
            TransactionType::Reserved,
            TransactionType::Released,
            TransactionType::Adjustment,
            TransactionType::Return,
        ] {
            assert_eq!(TransactionType::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionType::from_str("bogus"), None);
    }

    #[test]
    fn test_stock_out_reads_as_sale() {
        assert_eq!(TransactionType::from_str("stock_out"), Some(TransactionType::Sale));
        let kind: TransactionType = serde_json::from_str(r#""STOCK_OUT""#).unwrap();
        assert_eq!(kind, TransactionType::Sale);
        assert_eq!(serde_json::to_string(&kind).unwrap(), r#""SALE""#);
    }

    #[test]
    fn test_sale_moves_stock_and_reserved() {
        assert_eq!(TransactionType::Sale.stock_direction(), -1);
        assert_eq!(TransactionType::Sale.reserved_direction(), -1);
        assert_eq!(TransactionType::Return.stock_direction(), 1);
        assert_eq!(TransactionType::Return.reserved_direction(), 0);
        assert_eq!(TransactionType::Reserved.stock_direction(), 0);
    }

    #[test]
    fn test_serializes_type_field() {
        let entry = NewTransaction::new(TransactionType::Sale, 2, VariantId::new("V1"))
            .with_order(Some(OrderId::new("O1")))
            .into_transaction(1, Utc::now());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "SALE");
        assert_eq!(json["order_id"], "O1");
        assert_eq!(json["id"], 1);
    }
}
