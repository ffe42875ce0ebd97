// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::sync::Arc;

/// Source of the current time in unix seconds. The cooldown limiter reads
/// time through this seam so tests can advance it manually.
pub trait Clock {
    fn now(&self) -> u64;
}

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use sim::SimClock;

#[cfg(any(test, feature = "test-helpers"))]
mod sim {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Manually driven clock for tests.
    #[derive(Debug, Default)]
    pub struct SimClock {
        now: AtomicU64,
    }

    impl SimClock {
        pub fn new(now: u64) -> Self {
            Self {
                now: AtomicU64::new(now),
            }
        }

        pub fn advance(&self, secs: u64) {
            self.now.fetch_add(secs, Ordering::SeqCst);
        }

        pub fn set(&self, now: u64) {
            self.now.store(now, Ordering::SeqCst);
        }
    }

    impl Clock for SimClock {
        fn now(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }
    }
}
