//! Commerce error types.

use stockroom_db::DbError;
use thiserror::Error;

use crate::checkout::{OrderEvent, OrderStatus};
use crate::ids::{CartItemId, OrderId, VariantId};
use crate::money::Currency;

/// Errors that can occur in inventory, cart and checkout operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommerceError {
    /// Variant not found.
    #[error("Variant not found: {0}")]
    VariantNotFound(VariantId),

    /// Variant exists but is not for sale.
    #[error("Variant inactive: {0}")]
    VariantInactive(VariantId),

    /// SKU is empty or malformed.
    #[error("Invalid SKU: {0:?}")]
    InvalidSku(String),

    /// Another variant already uses this SKU.
    #[error("Duplicate SKU: {0}")]
    DuplicateSku(String),

    /// Invalid quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Quantity exceeds maximum allowed per cart line.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(u64, u32),

    /// Invalid price.
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in stock or money calculation")]
    Overflow,

    /// Item not in cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(CartItemId),

    /// Nothing to check out.
    #[error("Cart is empty")]
    EmptyCart,

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Available stock cannot cover the requested quantity.
    #[error(
        "Insufficient stock for {variant_id}: requested {requested}, {}",
        available_label(.available)
    )]
    InsufficientStock {
        variant_id: VariantId,
        requested: u32,
        /// Units available when the request was refused; `None` when the
        /// variant row could not be locked within the retry budget.
        available: Option<u32>,
    },

    /// Commit requested more units than are reserved.
    #[error("Reservation underflow on {variant_id}: reserved {reserved}, requested {requested}")]
    ReservationUnderflow {
        variant_id: VariantId,
        reserved: u32,
        requested: u32,
    },

    /// Stock adjustment would push stock below zero or below reserved.
    #[error("Stock underflow on {variant_id}: stock {stock}, reserved {reserved}, delta {delta}")]
    StockUnderflow {
        variant_id: VariantId,
        stock: u32,
        reserved: u32,
        delta: i64,
    },

    /// Order state machine rejected the event.
    #[error("Invalid order transition: cannot {event} from {from}")]
    InvalidStateTransition { from: OrderStatus, event: OrderEvent },

    /// A failed checkout left lines holding stock. The order stays
    /// `PENDING` so cancelling it finishes the unwind.
    #[error("Order {order_id} still holds stock on {remaining} line(s) after a failed checkout")]
    UnwindIncomplete { order_id: OrderId, remaining: usize },

    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

fn available_label(available: &Option<u32>) -> String {
    match available {
        Some(units) => format!("available {units}"),
        None => "variant busy".to_string(),
    }
}

/// Broad classification of a [`CommerceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input, rejected before any mutation.
    Validation,
    /// Expected refusal to admit a request (not enough stock).
    Admission,
    /// A broken invariant: a bug or corrupted data.
    Invariant,
    /// The store failed.
    Storage,
}

impl CommerceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommerceError::InsufficientStock { .. } => ErrorKind::Admission,
            CommerceError::ReservationUnderflow { .. }
            | CommerceError::StockUnderflow { .. }
            | CommerceError::InvalidStateTransition { .. }
            | CommerceError::UnwindIncomplete { .. }
            | CommerceError::Overflow => ErrorKind::Invariant,
            CommerceError::Storage(_) => ErrorKind::Storage,
            _ => ErrorKind::Validation,
        }
    }

    /// Message safe to show to end users.
    ///
    /// Validation and admission errors are returned verbatim; invariant and
    /// storage failures collapse to a generic message.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Admission => self.to_string(),
            ErrorKind::Invariant | ErrorKind::Storage => {
                "The request could not be completed. Please try again later.".to_string()
            }
        }
    }

    /// Log this error at a level matching its kind.
    pub(crate) fn trace(&self, operation: &'static str) {
        match self.kind() {
            ErrorKind::Validation => tracing::debug!(operation, error = %self, "request rejected"),
            ErrorKind::Admission => tracing::warn!(operation, error = %self, "request not admitted"),
            ErrorKind::Invariant | ErrorKind::Storage => {
                tracing::error!(operation, error = %self, "internal failure")
            }
        }
    }
}
