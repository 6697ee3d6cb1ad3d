//! Checkout module.
//!
//! Contains the checkout saga, orders, payments, and the order lifecycle.

mod coordinator;
mod lifecycle;
mod order;
mod payment;

pub use coordinator::CheckoutCoordinator;
pub use lifecycle::OrderService;
pub use order::{OrderEvent, OrderItem, OrderStatus, OrderView, ShopOrder, StockState};
pub use payment::{Payment, PaymentMethod, PaymentResult, PaymentStatus};
