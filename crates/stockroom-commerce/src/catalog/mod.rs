//! Product catalog module.
//!
//! Contains the variant type and the read-only lookup used by carts and
//! checkout.

mod variant;

pub use variant::{NewVariant, ProductVariant};

use crate::error::CommerceError;
use crate::ids::VariantId;

/// Read-only variant lookup.
pub trait Catalog: Send + Sync {
    /// Fetch a variant by ID.
    ///
    /// Returns [`CommerceError::VariantNotFound`] for unknown IDs.
    fn variant(&self, id: &VariantId) -> Result<ProductVariant, CommerceError>;
}
