//! Product variants: the reservable unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;
use crate::ids::VariantId;
use crate::money::Money;

/// A purchasable SKU with its stock counters.
///
/// `reserved <= stock` always holds for a variant stored in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductVariant {
    /// Unique variant identifier.
    pub id: VariantId,
    /// Stock keeping unit (unique, immutable).
    pub sku: String,
    /// Display name (e.g., "T-Shirt / Large / Blue").
    pub name: String,
    /// Current selling price.
    pub price: Money,
    /// Purchase cost.
    pub cost_price: Money,
    /// Total units owned.
    pub stock: u32,
    /// Units held by in-flight checkouts.
    pub reserved: u32,
    /// Whether the variant can be sold.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Units that can still be reserved.
    pub fn available(&self) -> u32 {
        self.stock.saturating_sub(self.reserved)
    }

    /// Check if a specific quantity could be reserved right now.
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        self.available() >= quantity
    }

    /// Check if out of stock.
    pub fn is_out_of_stock(&self) -> bool {
        self.available() == 0
    }

    /// Check the stock/reserved invariant.
    pub fn is_consistent(&self) -> bool {
        self.reserved <= self.stock
    }
}

/// Input for registering a variant with the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewVariant {
    /// Explicit ID; generated when absent.
    pub id: Option<VariantId>,
    /// Stock keeping unit.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Selling price.
    pub price: Money,
    /// Purchase cost; defaults to zero.
    pub cost_price: Option<Money>,
    /// Opening stock, recorded as a restock.
    pub initial_stock: u32,
    /// Whether the variant starts active.
    pub is_active: bool,
}

impl NewVariant {
    /// Describe an active variant with no opening stock.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: None,
            sku: sku.into(),
            name: name.into(),
            price,
            cost_price: None,
            initial_stock: 0,
            is_active: true,
        }
    }

    /// Use a fixed ID.
    pub fn with_id(mut self, id: impl Into<VariantId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the opening stock.
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.initial_stock = stock;
        self
    }

    /// Set the purchase cost.
    pub fn with_cost_price(mut self, cost_price: Money) -> Self {
        self.cost_price = Some(cost_price);
        self
    }

    /// Start inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Validate prices and build the stored row, with zero stock.
    ///
    /// Opening stock is applied by the ledger so that it is journalled.
    pub(crate) fn into_variant(self, now: DateTime<Utc>) -> Result<ProductVariant, CommerceError> {
        let cost_price = self.cost_price.unwrap_or(Money::zero(self.price.currency));
        if self.price.is_negative() || cost_price.is_negative() {
            return Err(CommerceError::InvalidPrice(format!(
                "{}: prices must be non-negative",
                self.sku
            )));
        }
        if cost_price.currency != self.price.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.price.currency,
                got: cost_price.currency,
            });
        }
        if self.sku.trim().is_empty() {
            return Err(CommerceError::InvalidSku(self.sku));
        }

        Ok(ProductVariant {
            id: self.id.unwrap_or_else(VariantId::generate),
            sku: self.sku,
            name: self.name,
            price: self.price,
            cost_price,
            stock: 0,
            reserved: 0,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn variant(stock: u32, reserved: u32) -> ProductVariant {
        let mut v = NewVariant::new("SKU-1", "Shirt", Money::new(1000, Currency::USD))
            .into_variant(Utc::now())
            .unwrap();
        v.stock = stock;
        v.reserved = reserved;
        v
    }

    #[test]
    fn test_availability() {
        let v = variant(10, 7);
        assert_eq!(v.available(), 3);
        assert!(v.can_fulfill(3));
        assert!(!v.can_fulfill(4));
        assert!(v.is_consistent());
    }

    #[test]
    fn test_out_of_stock() {
        assert!(variant(5, 5).is_out_of_stock());
        assert!(!variant(5, 4).is_out_of_stock());
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = NewVariant::new("SKU-1", "Shirt", Money::new(-1, Currency::USD))
            .into_variant(Utc::now());
        assert!(matches!(result, Err(CommerceError::InvalidPrice(_))));
    }

    #[test]
    fn test_cost_price_currency_must_match() {
        let result = NewVariant::new("SKU-1", "Shirt", Money::new(100, Currency::USD))
            .with_cost_price(Money::new(50, Currency::EUR))
            .into_variant(Utc::now());
        assert!(matches!(result, Err(CommerceError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_registration_starts_with_zero_stock() {
        let v = NewVariant::new("SKU-1", "Shirt", Money::new(100, Currency::USD))
            .with_stock(12)
            .with_id("V1")
            .into_variant(Utc::now())
            .unwrap();
        assert_eq!(v.id, VariantId::new("V1"));
        assert_eq!(v.stock, 0);
        assert_eq!(v.cost_price, Money::zero(Currency::USD));
    }
}
