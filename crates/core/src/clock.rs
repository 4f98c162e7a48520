// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock source for record timestamps.
//!
//! Only epoch milliseconds are needed: the provisioner stamps when a task
//! was requested, and nothing measures elapsed time through this trait.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Clone + Send + Sync + 'static {
    fn epoch_ms(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::Clock;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    /// Settable clock shared across clones
    #[derive(Clone)]
    pub struct FakeClock {
        epoch_ms: Arc<Mutex<u64>>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self::at(1_000_000)
        }

        /// A clock frozen at `epoch_ms` until advanced
        pub fn at(epoch_ms: u64) -> Self {
            Self { epoch_ms: Arc::new(Mutex::new(epoch_ms)) }
        }

        /// Advance the clock by the given duration
        pub fn advance(&self, duration: Duration) {
            *self.epoch_ms.lock() += duration.as_millis() as u64;
        }

        pub fn set_epoch_ms(&self, ms: u64) {
            *self.epoch_ms.lock() = ms;
        }
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for FakeClock {
        fn epoch_ms(&self) -> u64 {
            *self.epoch_ms.lock()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClock;

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
