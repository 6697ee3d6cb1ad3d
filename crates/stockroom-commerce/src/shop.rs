//! Wiring of the ledger, cart, order and checkout services.

use std::sync::Arc;

use crate::cart::CartService;
use crate::checkout::{CheckoutCoordinator, OrderService};
use crate::config::CommerceConfig;
use crate::inventory::{InventoryTransactionLog, VariantLedger};

/// All services sharing one ledger, built from a [`CommerceConfig`].
#[derive(Debug, Clone)]
pub struct Shop {
    pub config: CommerceConfig,
    pub log: Arc<InventoryTransactionLog>,
    pub ledger: Arc<VariantLedger>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutCoordinator>,
}

impl Shop {
    pub fn new(config: CommerceConfig) -> Self {
        let policy = config.lock_policy();
        let log = Arc::new(InventoryTransactionLog::new());
        let ledger = Arc::new(VariantLedger::with_log(policy, log.clone()));
        let carts = Arc::new(CartService::new(ledger.clone(), config.clone()));
        let orders = Arc::new(OrderService::new(ledger.clone(), policy));
        let checkout = Arc::new(CheckoutCoordinator::new(
            ledger.clone(),
            carts.clone(),
            orders.clone(),
            config.clone(),
        ));

        tracing::debug!(
            currency = %config.currency,
            snapshot = ?config.price_snapshot,
            retry_budget = policy.retry_budget,
            "shop services initialised"
        );

        Self {
            config,
            log,
            ledger,
            carts,
            orders,
            checkout,
        }
    }
}

impl Default for Shop {
    fn default() -> Self {
        Self::new(CommerceConfig::default())
    }
}
