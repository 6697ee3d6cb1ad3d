//! Inventory reservation and checkout consistency for Stockroom.
//!
//! This crate provides the stock-keeping core of a storefront backend:
//!
//! - **Inventory**: per-variant `stock`/`reserved` counters guarded by the
//!   [`VariantLedger`](inventory::VariantLedger), with every movement
//!   recorded in an append-only transaction log
//! - **Cart**: per-user carts with price snapshots, independent of stock
//! - **Checkout**: the reservation saga that turns cart lines into an
//!   order, and the order/payment lifecycle
//!
//! # Example
//!
//! ```rust
//! use stockroom_commerce::prelude::*;
//!
//! let shop = Shop::default();
//! let mug = shop
//!     .ledger
//!     .register_variant(
//!         NewVariant::new("MUG-01", "Mug", Money::new(1200, Currency::USD)).with_stock(10),
//!     )
//!     .unwrap();
//!
//! let user = UserId::new("alice");
//! shop.carts.add_item(&user, &mug.id, 2).unwrap();
//!
//! let placed = shop
//!     .checkout
//!     .checkout(&user, "1 Main St", PaymentResult::pending(PaymentMethod::Card), None)
//!     .unwrap();
//! assert_eq!(placed.order.status, OrderStatus::Pending);
//! assert_eq!(shop.ledger.get(&mug.id).unwrap().stock, 8);
//! ```

pub mod config;
pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod inventory;

mod shop;

pub use config::CommerceConfig;
pub use error::{CommerceError, ErrorKind};
pub use ids::*;
pub use money::{Currency, Money};
pub use shop::Shop;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{CommerceConfig, LockConfig, PriceSnapshotPolicy};
    pub use crate::error::{CommerceError, ErrorKind};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};
    pub use crate::shop::Shop;

    // Catalog
    pub use crate::catalog::{Catalog, NewVariant, ProductVariant};

    // Inventory
    pub use crate::inventory::{
        InventoryTransaction, InventoryTransactionLog, Reconciliation, StockLevels,
        TransactionType, VariantLedger,
    };

    // Cart
    pub use crate::cart::{Cart, CartItem, CartLineView, CartService, CartView};

    // Checkout
    pub use crate::checkout::{
        CheckoutCoordinator, OrderEvent, OrderItem, OrderService, OrderStatus, OrderView,
        Payment, PaymentMethod, PaymentResult, PaymentStatus, ShopOrder, StockState,
    };
}
