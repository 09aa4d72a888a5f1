//! Lamport-style logical clock producing the per-node `db_version` order.
//!
//! Every local mutation takes a [`LogicalClock::tick`], and every remote
//! change advances the clock past the writer's `db_version` via
//! [`LogicalClock::observe`]. Together these guarantee that a node never
//! mints a `db_version` at or below anything it has produced or seen.
//!
//! There is deliberately no global singleton: a clock is created once per
//! node process with an explicit seed (the highest `db_version` recovered
//! from durable storage on startup) and a handle is passed to the components
//! that need it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic counter for one node.
///
/// All operations are lock-free single-word atomics; `tick` is safe to call
/// from any number of threads and never blocks.
#[derive(Debug)]
pub struct LogicalClock {
    counter: AtomicU64,
}

impl LogicalClock {
    /// Create a clock seeded at `seed`. The first `tick()` returns
    /// `seed + 1`.
    ///
    /// On startup the seed must be the highest `db_version` this node has
    /// ever produced or observed, recovered from durable storage, so that
    /// versions are never reused across restarts.
    pub fn new(seed: u64) -> Self {
        Self {
            counter: AtomicU64::new(seed),
        }
    }

    /// Mint a fresh `db_version`, strictly greater than every value this
    /// clock has returned or observed.
    ///
    /// Saturation at `u64::MAX` is not guarded; at one tick per nanosecond
    /// the counter outlives the deployment by centuries.
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Advance the clock to at least `db_version` (Lamport receipt rule).
    ///
    /// Called for every incoming remote change, applied or not, so that
    /// subsequent local writes are ordered after everything this node has
    /// seen.
    pub fn observe(&self, db_version: u64) {
        self.counter.fetch_max(db_version, Ordering::SeqCst);
    }

    /// The highest value minted or observed so far.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}
