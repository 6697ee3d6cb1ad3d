//! Order types and the order status state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkout::Payment;
use crate::error::CommerceError;
use crate::ids::{OrderId, OrderItemId, UserId, VariantId};
use crate::money::Money;

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, stock committed, awaiting payment.
    #[default]
    Pending,
    /// Payment captured.
    Paid,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Cancelled; any committed stock has been returned.
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Check if order can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// The status reached by applying `event`, or
    /// [`CommerceError::InvalidStateTransition`].
    pub fn transition(self, event: OrderEvent) -> Result<OrderStatus, CommerceError> {
        use OrderEvent::*;
        use OrderStatus::*;

        match (self, event) {
            (Pending, Pay) => Ok(Paid),
            (Paid, Ship) => Ok(Shipped),
            (Shipped, Deliver) => Ok(Delivered),
            (Pending | Paid, Cancel) => Ok(Cancelled),
            (from, event) => Err(CommerceError::InvalidStateTransition { from, event }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event driving an order between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    Pay,
    Ship,
    Deliver,
    Cancel,
}

impl OrderEvent {
    pub const ALL: [OrderEvent; 4] = [
        OrderEvent::Pay,
        OrderEvent::Ship,
        OrderEvent::Deliver,
        OrderEvent::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEvent::Pay => "pay",
            OrderEvent::Ship => "ship",
            OrderEvent::Deliver => "deliver",
            OrderEvent::Cancel => "cancel",
        }
    }
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an order line's units currently sit in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockState {
    /// Held by a reservation.
    Reserved,
    /// Deducted from stock by a sale.
    Committed,
    /// Reservation given back.
    Released,
    /// Sale reversed; units back in stock.
    Returned,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopOrder {
    /// Unique order identifier.
    pub id: OrderId,
    /// Customer.
    pub user_id: UserId,
    /// Current status.
    pub status: OrderStatus,
    /// Frozen lines.
    pub items: Vec<OrderItem>,
    /// Sum of `unit_price * quantity` at creation.
    pub total: Money,
    /// Free-form shipping address.
    pub shipping_address: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl ShopOrder {
    /// Get total item count.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Apply `event`, updating `status` and `updated_at`.
    pub fn apply(&mut self, event: OrderEvent) -> Result<OrderStatus, CommerceError> {
        self.status = self.status.transition(event)?;
        self.updated_at = Utc::now();
        Ok(self.status)
    }
}

/// A line of an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Unique line identifier.
    pub id: OrderItemId,
    /// Variant ordered.
    pub variant_id: VariantId,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price at time of order.
    pub unit_price: Money,
    /// Ledger position of this line's units.
    pub stock_state: StockState,
}

impl OrderItem {
    /// Unit price times quantity.
    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.unit_price
            .try_multiply(i64::from(self.quantity))
            .ok_or(CommerceError::Overflow)
    }
}

/// An order together with its payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderView {
    pub order: ShopOrder,
    pub payment: Option<Payment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUSES: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn test_only_listed_transitions_succeed() {
        let allowed = [
            (OrderStatus::Pending, OrderEvent::Pay, OrderStatus::Paid),
            (OrderStatus::Paid, OrderEvent::Ship, OrderStatus::Shipped),
            (OrderStatus::Shipped, OrderEvent::Deliver, OrderStatus::Delivered),
            (OrderStatus::Pending, OrderEvent::Cancel, OrderStatus::Cancelled),
            (OrderStatus::Paid, OrderEvent::Cancel, OrderStatus::Cancelled),
        ];

        for from in STATUSES {
            for event in OrderEvent::ALL {
                let expected = allowed
                    .iter()
                    .find(|(f, e, _)| *f == from && *e == event)
                    .map(|(_, _, to)| *to);
                match (from.transition(event), expected) {
                    (Ok(to), Some(want)) => assert_eq!(to, want),
                    (Err(err), None) => assert_eq!(
                        err,
                        CommerceError::InvalidStateTransition { from, event }
                    ),
                    (got, want) => panic!("{from} --{event}--> {got:?}, expected {want:?}"),
                }
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(OrderStatus::Paid.can_cancel());
    }

    #[test]
    fn test_transition_message() {
        let err = OrderStatus::Shipped.transition(OrderEvent::Cancel).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid order transition: cannot cancel from SHIPPED"
        );
    }
}
