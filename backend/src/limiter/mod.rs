//! Admission limiter
//!
//! Bounds the number of requests each client address may make per window.
//! It runs in front of everything else under `/api`, so a rejected request
//! never reaches the auth gate or a handler.
//!
//! # Algorithm
//!
//! Each address owns a [`RateWindow`] `(window_start, count)`. On every
//! request:
//!
//! 1. if `now - window_start >= window`, start a new window at `now`
//! 2. increment `count`
//! 3. reject if `count > max_requests`
//!
//! All three steps happen under one lock, so concurrent requests from the
//! same address cannot both squeeze under the ceiling.
//!
//! # Memory
//!
//! Whenever a full window has passed since the last sweep, the next check
//! drops every entry idle for at least one window. Such an entry would
//! have been reset on its next access anyway, so eviction never changes a
//! decision.

mod clock;
mod middleware;

pub use clock::{Clock, ManualClock, SystemClock};
pub use middleware::{admit, client_addr};

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Request counter for one client address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub window_start: Instant,
    pub count: u32,
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed {
        /// Requests left in the current window
        remaining: u32,
    },
    Rejected {
        /// Time until the current window closes
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

struct Windows {
    by_addr: HashMap<IpAddr, RateWindow>,
    last_sweep: Instant,
}

/// Process-wide rate window table
pub struct RateWindowStore {
    inner: Mutex<Windows>,
}

impl RateWindowStore {
    pub fn new(now: Instant) -> Self {
        Self {
            inner: Mutex::new(Windows {
                by_addr: HashMap::new(),
                last_sweep: now,
            }),
        }
    }

    /// Number of tracked addresses
    pub fn len(&self) -> usize {
        self.inner.lock().by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, addr: IpAddr) -> Option<RateWindow> {
        self.inner.lock().by_addr.get(&addr).copied()
    }

    /// Count one request from `addr` and decide whether to admit it
    pub fn hit(&self, addr: IpAddr, now: Instant, window: Duration, ceiling: u32) -> Admission {
        let mut inner = self.inner.lock();

        if now.duration_since(inner.last_sweep) >= window {
            inner
                .by_addr
                .retain(|_, w| now.duration_since(w.window_start) < window);
            inner.last_sweep = now;
        }

        let entry = inner.by_addr.entry(addr).or_insert(RateWindow {
            window_start: now,
            count: 0,
        });

        let elapsed = now.duration_since(entry.window_start);
        if elapsed >= window {
            *entry = RateWindow {
                window_start: now,
                count: 0,
            };
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count > ceiling {
            Admission::Rejected {
                retry_after: window.saturating_sub(now.duration_since(entry.window_start)),
            }
        } else {
            Admission::Allowed {
                remaining: ceiling - entry.count,
            }
        }
    }
}

/// Per-address fixed-window limiter
#[derive(Clone)]
pub struct AdmissionLimiter {
    windows: Arc<RateWindowStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
    ceiling: u32,
    trust_forwarded_for: bool,
}

impl AdmissionLimiter {
    pub fn new(
        config: &RateLimitConfig,
        windows: Arc<RateWindowStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            windows,
            clock,
            window: Duration::from_millis(config.window_ms),
            ceiling: config.max_requests,
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }

    /// Limiter on the system clock with a fresh window table
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let windows = Arc::new(RateWindowStore::new(clock.now()));
        Self::new(config, windows, clock)
    }

    pub fn check(&self, addr: IpAddr) -> Admission {
        self.windows
            .hit(addr, self.clock.now(), self.window, self.ceiling)
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    pub fn windows(&self) -> &RateWindowStore {
        &self.windows
    }
}
