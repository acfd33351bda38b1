//! # Restart splay: randomized respawn delay.
//!
//! When many workers recycle at once (a broker outage, a fleet-wide
//! lifetime expiry), respawning them all immediately produces a thundering
//! herd against the job servers. [`SplayPolicy`] spreads respawns by
//! drawing each delay uniformly from `[0, max]`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use gearvisor::SplayPolicy;
//!
//! let splay = SplayPolicy::new(Duration::from_secs(300));
//! let delay = splay.delay();
//! assert!(delay <= Duration::from_secs(300));
//!
//! // zero splay means immediate respawn
//! assert_eq!(SplayPolicy::new(Duration::ZERO).delay(), Duration::ZERO);
//! ```

use std::time::Duration;

use rand::Rng;

/// Uniform random respawn delay in `[0, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplayPolicy {
    /// Upper bound of the draw.
    pub max: Duration,
}

impl SplayPolicy {
    /// Creates a policy with the given upper bound.
    pub fn new(max: Duration) -> Self {
        Self { max }
    }

    /// Draws one respawn delay.
    ///
    /// Millisecond granularity; a zero bound always yields
    /// [`Duration::ZERO`].
    pub fn delay(&self) -> Duration {
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(0..=max_ms))
    }
}

impl Default for SplayPolicy {
    /// No splay: respawn immediately.
    fn default() -> Self {
        Self { max: Duration::ZERO }
    }
}
