//! Per-user cart storage.

use std::sync::Arc;

use stockroom_db::{DbError, Table};

use super::cart::validate_quantity;
use crate::cart::{Cart, CartItem, CartView};
use crate::catalog::Catalog;
use crate::config::CommerceConfig;
use crate::error::CommerceError;
use crate::ids::{CartItemId, UserId, VariantId};

/// Holds one cart per user and applies line edits.
///
/// Cart rows are locked per user, so edits to one user's cart never wait on
/// another's. Concurrent edits to the same line are last-write-wins.
pub struct CartService {
    carts: Table<UserId, Cart>,
    catalog: Arc<dyn Catalog>,
    config: CommerceConfig,
}

impl CartService {
    pub fn new(catalog: Arc<dyn Catalog>, config: CommerceConfig) -> Self {
        Self {
            carts: Table::new("carts", config.lock_policy()),
            catalog,
            config,
        }
    }

    /// Add units of a variant to the user's cart, creating the cart first
    /// if needed.
    pub fn add_item(
        &self,
        user_id: &UserId,
        variant_id: &VariantId,
        quantity: i64,
    ) -> Result<CartView, CommerceError> {
        let max = self.config.max_quantity_per_line;
        validate_quantity(quantity, max)?;
        let variant = self.catalog.variant(variant_id)?;
        if !variant.is_active {
            return Err(CommerceError::VariantInactive(variant.id));
        }
        // Rejected before the cart row exists, so a failed first add
        // leaves the user without a cart.
        if variant.price.currency != self.config.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.config.currency,
                got: variant.price.currency,
            });
        }

        let policy = self.config.price_snapshot;
        let cart = self.carts.upsert(
            user_id.clone(),
            || Cart::new(user_id.clone(), self.config.currency),
            |cart| -> Result<Cart, CommerceError> {
                cart.add_line(variant.id.clone(), quantity, variant.price, policy, max)?;
                Ok(cart.clone())
            },
        )?;

        tracing::debug!(
            user_id = %user_id,
            variant_id = %variant_id,
            quantity,
            "cart line added"
        );
        CartView::of(&cart)
    }

    /// Set a line's quantity; zero removes the line.
    pub fn update_quantity(
        &self,
        user_id: &UserId,
        item_id: &CartItemId,
        quantity: i64,
    ) -> Result<CartView, CommerceError> {
        let max = self.config.max_quantity_per_line;
        let cart = self.edit(user_id, item_id, |cart| {
            cart.update_quantity(item_id, quantity, max)
        })?;
        CartView::of(&cart)
    }

    /// Remove a line.
    pub fn remove_item(
        &self,
        user_id: &UserId,
        item_id: &CartItemId,
    ) -> Result<CartView, CommerceError> {
        let cart = self.edit(user_id, item_id, |cart| Ok(cart.remove_item(item_id)))?;
        CartView::of(&cart)
    }

    /// Remove every line. A user with no cart gets an empty view.
    pub fn clear(&self, user_id: &UserId) -> Result<CartView, CommerceError> {
        let result = self
            .carts
            .update(user_id, |cart| -> Result<Cart, CommerceError> {
                cart.clear();
                Ok(cart.clone())
            });
        match result {
            Ok(cart) => CartView::of(&cart),
            Err(CommerceError::Storage(DbError::NotFound { .. })) => Ok(self.empty(user_id)),
            Err(e) => Err(e),
        }
    }

    /// Sum of quantities in the user's cart; 0 when there is no cart.
    pub fn item_count(&self, user_id: &UserId) -> Result<u64, CommerceError> {
        Ok(self
            .carts
            .read(user_id, Cart::item_count)?
            .unwrap_or(0))
    }

    /// The user's cart with line totals; empty when there is no cart.
    pub fn get_with_items(&self, user_id: &UserId) -> Result<CartView, CommerceError> {
        match self.carts.get(user_id)? {
            Some(cart) => CartView::of(&cart),
            None => Ok(self.empty(user_id)),
        }
    }

    /// Copy the lines a checkout will operate on.
    ///
    /// `selected` restricts the copy to the given line ids, each of which
    /// must be in the cart. The copy is taken once; later cart edits do not
    /// affect it.
    pub(crate) fn snapshot_lines(
        &self,
        user_id: &UserId,
        selected: Option<&[CartItemId]>,
    ) -> Result<Vec<CartItem>, CommerceError> {
        let cart = self.carts.get(user_id)?.ok_or(CommerceError::EmptyCart)?;

        let lines = match selected {
            None => cart.items,
            Some(ids) => {
                let mut lines: Vec<CartItem> = Vec::with_capacity(ids.len());
                for id in ids {
                    if lines.iter().any(|l| &l.id == id) {
                        continue;
                    }
                    let line = cart
                        .get_item(id)
                        .ok_or_else(|| CommerceError::ItemNotInCart(id.clone()))?;
                    lines.push(line.clone());
                }
                lines
            }
        };

        if lines.is_empty() {
            return Err(CommerceError::EmptyCart);
        }
        Ok(lines)
    }

    /// Drop checked-out lines. Lines already removed by a concurrent edit
    /// are skipped.
    pub(crate) fn remove_lines(
        &self,
        user_id: &UserId,
        item_ids: &[CartItemId],
    ) -> Result<usize, CommerceError> {
        let result = self
            .carts
            .update_blocking(user_id, |cart| -> Result<usize, CommerceError> {
                Ok(cart.remove_items(item_ids))
            });
        match result {
            Ok(removed) => Ok(removed),
            Err(CommerceError::Storage(DbError::NotFound { .. })) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn edit(
        &self,
        user_id: &UserId,
        item_id: &CartItemId,
        f: impl FnOnce(&mut Cart) -> Result<bool, CommerceError>,
    ) -> Result<Cart, CommerceError> {
        self.carts
            .update(user_id, |cart| -> Result<Cart, CommerceError> {
                if !f(cart)? {
                    return Err(CommerceError::ItemNotInCart(item_id.clone()));
                }
                Ok(cart.clone())
            })
            .map_err(|e| match e {
                CommerceError::Storage(DbError::NotFound { .. }) => {
                    CommerceError::ItemNotInCart(item_id.clone())
                }
                other => other,
            })
    }

    fn empty(&self, user_id: &UserId) -> CartView {
        CartView::empty(user_id.clone(), self.config.currency)
    }
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("carts", &self.carts)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
