//! Cart and cart line types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PriceSnapshotPolicy;
use crate::error::CommerceError;
use crate::ids::{CartId, CartItemId, UserId, VariantId};
use crate::money::{Currency, Money};

/// A user's shopping cart.
///
/// Carts never touch stock; availability is only checked at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    /// Unique cart identifier.
    pub id: CartId,
    /// Owner. Each user has at most one cart.
    pub user_id: UserId,
    /// Lines in insertion order.
    pub items: Vec<CartItem>,
    /// Currency of every snapshot in the cart.
    pub currency: Currency,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart for a user.
    pub fn new(user_id: UserId, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::generate(),
            user_id,
            items: Vec::new(),
            currency,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `quantity` units of a variant at `current_price`.
    ///
    /// An existing line for the variant grows; its snapshot follows
    /// `policy`. A new line snapshots `current_price`.
    pub fn add_line(
        &mut self,
        variant_id: VariantId,
        quantity: i64,
        current_price: Money,
        policy: PriceSnapshotPolicy,
        max_quantity: u32,
    ) -> Result<CartItemId, CommerceError> {
        let quantity = validate_quantity(quantity, max_quantity)?;
        if current_price.currency != self.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.currency,
                got: current_price.currency,
            });
        }

        if let Some(existing) = self.items.iter_mut().find(|i| i.variant_id == variant_id) {
            let new_quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or(CommerceError::Overflow)?;
            if new_quantity > max_quantity {
                return Err(CommerceError::QuantityExceedsLimit(
                    u64::from(new_quantity),
                    max_quantity,
                ));
            }

            existing.quantity = new_quantity;
            if policy == PriceSnapshotPolicy::RefreshOnAdd {
                existing.price_snapshot = current_price;
            }
            let id = existing.id.clone();
            self.touch();
            return Ok(id);
        }

        let item = CartItem::new(self.id.clone(), variant_id, quantity, current_price);
        let id = item.id.clone();
        self.items.push(item);
        self.touch();
        Ok(id)
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// Returns `false` if the line does not exist.
    pub fn update_quantity(
        &mut self,
        item_id: &CartItemId,
        quantity: i64,
        max_quantity: u32,
    ) -> Result<bool, CommerceError> {
        if quantity <= 0 {
            return Ok(self.remove_item(item_id));
        }
        let quantity = validate_quantity(quantity, max_quantity)?;

        if let Some(item) = self.items.iter_mut().find(|i| &i.id == item_id) {
            item.quantity = quantity;
            self.touch();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Remove a line.
    pub fn remove_item(&mut self, item_id: &CartItemId) -> bool {
        let len_before = self.items.len();
        self.items.retain(|i| &i.id != item_id);
        let removed = self.items.len() < len_before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Remove every line in `item_ids`; ids no longer present are skipped.
    ///
    /// Returns the number of lines removed.
    pub fn remove_items(&mut self, item_ids: &[CartItemId]) -> usize {
        let len_before = self.items.len();
        self.items.retain(|i| !item_ids.contains(&i.id));
        let removed = len_before - self.items.len();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    /// Remove all lines. The cart itself stays.
    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    /// Total units across lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Check if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get a line by ID.
    pub fn get_item(&self, item_id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.id == item_id)
    }

    /// Get the line for a variant.
    pub fn get_item_by_variant(&self, variant_id: &VariantId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.variant_id == variant_id)
    }

    /// Sum of snapshot price times quantity.
    pub fn subtotal(&self) -> Result<Money, CommerceError> {
        let totals = self
            .items
            .iter()
            .map(CartItem::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        Money::try_sum(totals.iter(), self.currency).ok_or(CommerceError::Overflow)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A line in a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    /// Unique line identifier.
    pub id: CartItemId,
    /// Owning cart.
    pub cart_id: CartId,
    /// Variant being purchased.
    pub variant_id: VariantId,
    /// Units (at least one).
    pub quantity: u32,
    /// Unit price captured when the line was created.
    pub price_snapshot: Money,
    /// When the line was created.
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    fn new(cart_id: CartId, variant_id: VariantId, quantity: u32, price_snapshot: Money) -> Self {
        Self {
            id: CartItemId::generate(),
            cart_id,
            variant_id,
            quantity,
            price_snapshot,
            added_at: Utc::now(),
        }
    }

    /// Snapshot price times quantity.
    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.price_snapshot
            .try_multiply(i64::from(self.quantity))
            .ok_or(CommerceError::Overflow)
    }
}

pub(crate) fn validate_quantity(quantity: i64, max_quantity: u32) -> Result<u32, CommerceError> {
    if quantity <= 0 {
        return Err(CommerceError::InvalidQuantity(quantity));
    }
    match u32::try_from(quantity) {
        Ok(q) if q <= max_quantity => Ok(q),
        _ => Err(CommerceError::QuantityExceedsLimit(
            quantity.unsigned_abs(),
            max_quantity,
        )),
    }
}
