//! Payments attached to orders.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkout::OrderStatus;
use crate::ids::{OrderId, PaymentId};
use crate::money::Money;

/// How the customer paid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Wallet,
    CashOnDelivery,
    Other(String),
}

impl PaymentMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Other(name) => name,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Not settled yet.
    #[default]
    Pending,
    /// Funds taken.
    Captured,
    /// Refused by the provider.
    Declined,
    /// Funds given back after capture.
    Refunded,
    /// Cancelled before capture.
    Voided,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Captured => "CAPTURED",
            PaymentStatus::Declined => "DECLINED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Voided => "VOIDED",
        }
    }

    /// The payment status implied by an order entering `order_status`.
    ///
    /// Declined payments stay declined.
    pub fn following(self, order_status: OrderStatus) -> PaymentStatus {
        match (self, order_status) {
            (PaymentStatus::Declined, _) => PaymentStatus::Declined,
            (_, OrderStatus::Paid) => PaymentStatus::Captured,
            (PaymentStatus::Captured, OrderStatus::Cancelled) => PaymentStatus::Refunded,
            (_, OrderStatus::Cancelled) => PaymentStatus::Voided,
            (current, _) => current,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome reported by the payment provider at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Provider reference, if one was issued.
    pub transaction_id: Option<String>,
}

impl PaymentResult {
    /// A captured payment.
    pub fn captured(method: PaymentMethod, transaction_id: impl Into<String>) -> Self {
        Self {
            method,
            status: PaymentStatus::Captured,
            transaction_id: Some(transaction_id.into()),
        }
    }

    /// A payment still awaiting settlement.
    pub fn pending(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            transaction_id: None,
        }
    }

    /// A declined payment.
    pub fn declined(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Declined,
            transaction_id: None,
        }
    }
}

/// Payment record; one per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Money,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub(crate) fn new(order_id: OrderId, amount: Money, result: PaymentResult) -> Self {
        Self {
            id: PaymentId::generate(),
            order_id,
            method: result.method,
            status: result.status,
            amount,
            transaction_id: result.transaction_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_follows_order() {
        assert_eq!(
            PaymentStatus::Pending.following(OrderStatus::Paid),
            PaymentStatus::Captured
        );
        assert_eq!(
            PaymentStatus::Captured.following(OrderStatus::Cancelled),
            PaymentStatus::Refunded
        );
        assert_eq!(
            PaymentStatus::Pending.following(OrderStatus::Cancelled),
            PaymentStatus::Voided
        );
        assert_eq!(
            PaymentStatus::Declined.following(OrderStatus::Cancelled),
            PaymentStatus::Declined
        );
        assert_eq!(
            PaymentStatus::Captured.following(OrderStatus::Shipped),
            PaymentStatus::Captured
        );
    }

    #[test]
    fn test_method_wire_names() {
        let json = serde_json::to_value(PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "bank_transfer");
        assert_eq!(PaymentMethod::Other("voucher".into()).to_string(), "voucher");
    }
}
