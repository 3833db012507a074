//! Time sources driving phase expiry.
//!
//! The engine never reads global time: it asks its [`Clock`] for `now()` and
//! for the length of a phase. [`WallClock`] follows `std::time::Instant`,
//! [`SimulationClock`] is a logical tick counter advanced by the caller.
//!
//! # Phase duration
//!
//! A phase lasts `target_size * interval`, where `interval` is the time the
//! sink needs to absorb a single entry. A phase therefore spans exactly the
//! time the sink needs to drain one full bucket.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait Clock {
    type Instant: Copy + Debug;
    type Interval: Copy + Ord + Debug;

    fn now(&self) -> Self::Instant;

    /// Time passed since `since`, saturating at zero.
    fn elapsed(&self, since: Self::Instant) -> Self::Interval;

    /// Length of a phase for a sink absorbing `target_size` entries, one
    /// every `interval`.
    fn phase_duration(
        &self,
        target_size: usize,
        interval: Self::Interval,
    ) -> Self::Interval;
}

impl<C: Clock + ?Sized> Clock for &C {
    type Instant = C::Instant;
    type Interval = C::Interval;

    fn now(&self) -> Self::Instant {
        (**self).now()
    }

    fn elapsed(&self, since: Self::Instant) -> Self::Interval {
        (**self).elapsed(since)
    }

    fn phase_duration(
        &self,
        target_size: usize,
        interval: Self::Interval,
    ) -> Self::Interval {
        (**self).phase_duration(target_size, interval)
    }
}

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl WallClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for WallClock {
    type Instant = Instant;
    type Interval = Duration;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: Instant) -> Duration {
        Instant::now().saturating_duration_since(since)
    }

    fn phase_duration(
        &self,
        target_size: usize,
        interval: Duration,
    ) -> Duration {
        let periods = u32::try_from(target_size).unwrap_or(u32::MAX);
        interval.saturating_mul(periods)
    }
}

/// Logical clock counting ticks.
///
/// Clones share the same counter, so a test can keep one handle and hand
/// another to the engine. Only meant to be advanced from the thread that
/// drives the engine, between calls.
#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    tick: Arc<AtomicU64>,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) {
        self.advance(1);
    }

    pub fn advance(&self, ticks: u64) {
        self.tick.fetch_add(ticks, Ordering::Relaxed);
    }

    pub fn set(&self, tick: u64) {
        self.tick.store(tick, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.set(0);
    }
}

impl Clock for SimulationClock {
    type Instant = u64;
    type Interval = u64;

    fn now(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    fn elapsed(&self, since: u64) -> u64 {
        self.now().saturating_sub(since)
    }

    fn phase_duration(&self, target_size: usize, interval: u64) -> u64 {
        (target_size as u64).saturating_mul(interval)
    }
}
