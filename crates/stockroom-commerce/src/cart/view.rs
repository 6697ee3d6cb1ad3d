//! Read model returned by cart operations.

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::error::CommerceError;
use crate::ids::{CartId, CartItemId, UserId, VariantId};
use crate::money::{Currency, Money};

/// A cart with per-line totals.
///
/// A user without a cart gets an empty view with no `cart_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartView {
    pub cart_id: Option<CartId>,
    pub user_id: UserId,
    pub items: Vec<CartLineView>,
    /// Sum of quantities.
    pub item_count: u64,
    /// Sum of line totals at snapshot prices.
    pub subtotal: Money,
}

/// One cart line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLineView {
    pub item_id: CartItemId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub price_snapshot: Money,
    /// `price_snapshot * quantity`.
    pub line_total: Money,
}

impl CartView {
    /// View for a user who has no cart.
    pub fn empty(user_id: UserId, currency: Currency) -> Self {
        Self {
            cart_id: None,
            user_id,
            items: Vec::new(),
            item_count: 0,
            subtotal: Money::zero(currency),
        }
    }

    /// Build the view of a stored cart.
    pub fn of(cart: &Cart) -> Result<Self, CommerceError> {
        let items = cart
            .items
            .iter()
            .map(|item| -> Result<CartLineView, CommerceError> {
                Ok(CartLineView {
                    item_id: item.id.clone(),
                    variant_id: item.variant_id.clone(),
                    quantity: item.quantity,
                    price_snapshot: item.price_snapshot,
                    line_total: item.line_total()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            cart_id: Some(cart.id.clone()),
            user_id: cart.user_id.clone(),
            items,
            item_count: cart.item_count(),
            subtotal: cart.subtotal()?,
        })
    }

    /// Check if the view has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find the line for a variant.
    pub fn line_for(&self, variant_id: &VariantId) -> Option<&CartLineView> {
        self.items.iter().find(|l| &l.variant_id == variant_id)
    }
}
