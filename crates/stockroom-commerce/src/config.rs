//! Runtime configuration for the inventory and checkout services.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stockroom_db::{LockPolicy, DEFAULT_RETRY_BUDGET};

use crate::money::Currency;

/// Default maximum quantity on a single cart line.
pub const DEFAULT_MAX_QUANTITY_PER_LINE: u32 = 9999;

/// What happens to a cart line's price snapshot when the same variant is
/// added again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceSnapshotPolicy {
    /// Keep the price captured when the line was first created.
    #[default]
    #[serde(alias = "frozen")]
    FrozenAtFirstAdd,
    /// Replace the snapshot with the variant's current price.
    #[serde(alias = "refresh")]
    RefreshOnAdd,
}

/// Row lock retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Attempts to take a variant row lock before a reservation is refused.
    pub retry_budget: u32,
    /// Pause between attempts, in microseconds.
    pub backoff_us: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            backoff_us: 100,
        }
    }
}

impl From<&LockConfig> for LockPolicy {
    fn from(config: &LockConfig) -> Self {
        LockPolicy::new(config.retry_budget, Duration::from_micros(config.backoff_us))
    }
}

/// Settings shared by the ledger, cart and checkout services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommerceConfig {
    /// Currency of every price, snapshot and order total.
    pub currency: Currency,
    /// Re-add behaviour for cart line price snapshots.
    pub price_snapshot: PriceSnapshotPolicy,
    /// Upper bound on a single cart line's quantity.
    pub max_quantity_per_line: u32,
    /// Row lock retry settings.
    pub lock: LockConfig,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            price_snapshot: PriceSnapshotPolicy::default(),
            max_quantity_per_line: DEFAULT_MAX_QUANTITY_PER_LINE,
            lock: LockConfig::default(),
        }
    }
}

impl CommerceConfig {
    /// The row lock policy derived from [`CommerceConfig::lock`].
    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy::from(&self.lock)
    }
}
