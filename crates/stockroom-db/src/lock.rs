//! Row lock acquisition.
//!
//! Every row sits behind its own `Mutex`, so writers on distinct rows never
//! contend. Callers choose between a bounded acquisition, which gives up
//! after [`LockPolicy::retry_budget`] attempts, and a blocking one used for
//! compensating writes that must not be dropped.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use crate::DbError;

/// Default number of `try_lock` attempts before giving up.
pub const DEFAULT_RETRY_BUDGET: u32 = 1_000;

/// Default pause between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_micros(100);

/// Bounded retry policy for row lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Maximum number of `try_lock` attempts (at least one is always made).
    pub retry_budget: u32,
    /// Pause between failed attempts.
    pub backoff: Duration,
}

impl LockPolicy {
    /// Create a policy with the given budget and backoff.
    pub fn new(retry_budget: u32, backoff: Duration) -> Self {
        Self {
            retry_budget,
            backoff,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn fail_fast() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BUDGET, DEFAULT_BACKOFF)
    }
}

/// Acquire `mutex` within the policy's retry budget.
pub(crate) fn acquire_bounded<'a, T>(
    mutex: &'a Mutex<T>,
    policy: LockPolicy,
    table: &str,
    key: &str,
) -> Result<MutexGuard<'a, T>, DbError> {
    let attempts = policy.retry_budget.max(1);
    for attempt in 1..=attempts {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(_)) => {
                return Err(DbError::Poisoned(format!("{table}/{key}")));
            }
            Err(TryLockError::WouldBlock) => {
                if attempt < attempts {
                    if policy.backoff.is_zero() {
                        std::thread::yield_now();
                    } else {
                        std::thread::sleep(policy.backoff);
                    }
                }
            }
        }
    }

    tracing::debug!(table, key, attempts, "row lock retry budget exhausted");
    Err(DbError::LockTimeout {
        table: table.to_string(),
        key: key.to_string(),
        attempts,
    })
}

/// Acquire `mutex`, waiting as long as necessary.
pub(crate) fn acquire_blocking<'a, T>(
    mutex: &'a Mutex<T>,
    table: &str,
    key: &str,
) -> Result<MutexGuard<'a, T>, DbError> {
    mutex
        .lock()
        .map_err(|_| DbError::Poisoned(format!("{table}/{key}")))
}
