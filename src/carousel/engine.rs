use super::{CarouselConfig, Sink};
use crate::bloom::{BloomFilter, FilterStats, MembershipFilter};
use crate::clock::Clock;
use crate::error::Result;
use crate::hash::FINGERPRINT_BITS;
use serde::Serialize;
use tracing::{debug, trace, warn};

/// What [`Carousel::log`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    /// Handed to the sink
    Forwarded,
    /// Key already forwarded during this phase
    Duplicate,
    /// Key belongs to a bucket that is not active this phase
    OutOfBucket,
}

/// Snapshot of engine state and counters since construction or the last
/// [`Carousel::reset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CarouselStats {
    pub depth: u32,
    pub phase: u64,
    pub active_bucket: u64,
    pub matching_this_phase: usize,
    pub forwarded: u64,
    pub duplicates: u64,
    pub out_of_bucket: u64,
    pub phases_completed: u64,
    pub overflows: u64,
    pub underflows: u64,
    pub filter_fpr: f64,
}

#[derive(Debug, Default)]
struct Counters {
    forwarded: u64,
    duplicates: u64,
    out_of_bucket: u64,
    phases_completed: u64,
    overflows: u64,
    underflows: u64,
}

fn mask_for_depth(depth: u32) -> u64 {
    if depth >= FINGERPRINT_BITS {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}

/// Adaptive phase engine deciding which events reach the sink.
///
/// Not synchronised: callers on several threads must serialise access
/// to `log` themselves.
pub struct Carousel<C: Clock, S: Sink> {
    config: CarouselConfig,
    clock: C,
    sink: S,
    filter: BloomFilter,
    shrink_threshold: f64,

    phase_duration: C::Interval,
    phase_start: C::Instant,

    depth: u32,
    mask: u64,
    phase: u64,
    matching_this_phase: usize,

    counters: Counters,
}

impl<C: Clock, S: Sink> Carousel<C, S> {
    /// Build an engine forwarding to `sink`.
    ///
    /// `interval` is the time the sink needs per entry; together with the
    /// target size it fixes the phase length through
    /// [`Clock::phase_duration`].
    pub fn new(
        config: CarouselConfig,
        clock: C,
        interval: C::Interval,
        sink: S,
    ) -> Result<Self> {
        config.validate()?;

        let filter = BloomFilter::new(config.filter.clone())?;
        let phase_duration = clock.phase_duration(config.target_size, interval);
        let phase_start = clock.now();
        let shrink_threshold = config.shrink_threshold();

        debug!(
            target_size = config.target_size,
            hysteresis_ratio = config.hysteresis_ratio,
            filter_bits = config.filter.num_bits,
            ?phase_duration,
            "carousel created"
        );

        Ok(Self {
            config,
            clock,
            sink,
            filter,
            shrink_threshold,
            phase_duration,
            phase_start,
            depth: 0,
            mask: 0,
            phase: 0,
            matching_this_phase: 0,
            counters: Counters::default(),
        })
    }

    /// Submit one event.
    ///
    /// Starts a new phase first if the current one has expired. The event
    /// is forwarded only if its key falls into the active bucket and was
    /// not forwarded earlier in this phase.
    pub fn log(&mut self, key: &str, entry: &str) -> LogOutcome {
        self.poll();

        if !self.is_eligible(key) {
            self.counters.out_of_bucket += 1;
            return LogOutcome::OutOfBucket;
        }

        if self.filter.probably_contains(key.as_bytes()) {
            self.counters.duplicates += 1;
            return LogOutcome::Duplicate;
        }

        self.filter.add(key.as_bytes());
        self.matching_this_phase += 1;
        self.counters.forwarded += 1;
        self.sink.forward(key, entry);

        if self.matching_this_phase > self.config.target_size {
            self.repartition_overflow();
        }

        LogOutcome::Forwarded
    }

    /// Start the next phase if the current one has run its full duration.
    /// Returns `true` when a new phase was started.
    pub fn poll(&mut self) -> bool {
        if self.clock.elapsed(self.phase_start) >= self.phase_duration {
            self.start_next_phase();
            true
        } else {
            false
        }
    }

    /// Return to depth 0, phase 0 with an empty filter and a fresh phase
    /// clock. Counters are cleared too.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.depth = 0;
        self.mask = 0;
        self.phase = 0;
        self.matching_this_phase = 0;
        self.phase_start = self.clock.now();
        self.counters = Counters::default();
    }

    fn start_next_phase(&mut self) {
        // The bucket we are leaving decides whether to coarsen
        if (self.matching_this_phase as f64) < self.shrink_threshold {
            self.repartition_underflow();
        }

        trace!(
            phase = self.phase,
            matched = self.matching_this_phase,
            depth = self.depth,
            "phase expired"
        );

        self.filter.reset();
        self.matching_this_phase = 0;
        self.phase = self.phase.wrapping_add(1);
        self.phase_start = self.clock.now();
        self.counters.phases_completed += 1;
    }

    fn repartition_overflow(&mut self) {
        self.filter.reset();
        self.matching_this_phase = 0;

        if self.depth < FINGERPRINT_BITS {
            self.set_depth(self.depth + 1);
            debug!(depth = self.depth, phase = self.phase, "bucket overflow");
        } else {
            warn!(
                depth = self.depth,
                "bucket overflow at maximum depth, keeping partition"
            );
        }

        self.phase = self.phase.wrapping_add(1);
        self.phase_start = self.clock.now();
        self.counters.overflows += 1;
    }

    fn repartition_underflow(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.set_depth(self.depth - 1);
        self.counters.underflows += 1;
        debug!(
            depth = self.depth,
            matched = self.matching_this_phase,
            "bucket underflow"
        );
    }

    fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
        self.mask = mask_for_depth(depth);
    }

    /// Whether `key` belongs to the bucket active in this phase.
    pub fn is_eligible(&self, key: &str) -> bool {
        let fingerprint = (self.config.fingerprint)(key.as_bytes());
        fingerprint & self.mask == self.active_bucket()
    }

    /// Partition depth `k`; there are `2^k` buckets.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// `2^k - 1`
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Phase counter `v`.
    pub fn phase(&self) -> u64 {
        self.phase
    }

    pub fn active_bucket(&self) -> u64 {
        self.phase & self.mask
    }

    pub fn matching_this_phase(&self) -> usize {
        self.matching_this_phase
    }

    pub fn phase_duration(&self) -> C::Interval {
        self.phase_duration
    }

    pub fn grow_threshold(&self) -> usize {
        self.config.target_size
    }

    pub fn shrink_threshold(&self) -> f64 {
        self.shrink_threshold
    }

    pub fn config(&self) -> &CarouselConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn filter(&self) -> &BloomFilter {
        &self.filter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn stats(&self) -> CarouselStats {
        CarouselStats {
            depth: self.depth,
            phase: self.phase,
            active_bucket: self.active_bucket(),
            matching_this_phase: self.matching_this_phase,
            forwarded: self.counters.forwarded,
            duplicates: self.counters.duplicates,
            out_of_bucket: self.counters.out_of_bucket,
            phases_completed: self.counters.phases_completed,
            overflows: self.counters.overflows,
            underflows: self.counters.underflows,
            filter_fpr: self.filter.estimated_false_positive_rate(),
        }
    }
}

impl<C: Clock, S: Sink> std::fmt::Debug for Carousel<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Carousel {{ target_size: {}, depth: {}, phase: {}, matching_this_phase: {}, phase_duration: {:?} }}",
            self.config.target_size,
            self.depth,
            self.phase,
            self.matching_this_phase,
            self.phase_duration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carousel::{CarouselConfigBuilder, MemorySink};
    use crate::clock::SimulationClock;

    // Keys are decimal numbers and fingerprint to their own value, which
    // makes bucket membership easy to reason about.
    fn numeric(key: &[u8]) -> u64 {
        std::str::from_utf8(key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    fn engine(
        target_size: usize,
        clock: &SimulationClock,
    ) -> Carousel<SimulationClock, MemorySink> {
        let config = CarouselConfigBuilder::default()
            .target_size(target_size)
            .fingerprint(numeric)
            .build()
            .expect("Unable to build CarouselConfig");
        Carousel::new(config, clock.clone(), 10, MemorySink::new())
            .expect("Failed to create Carousel")
    }

    #[test]
    fn test_mask_for_depth() {
        assert_eq!(mask_for_depth(0), 0);
        assert_eq!(mask_for_depth(1), 1);
        assert_eq!(mask_for_depth(3), 0b111);
        assert_eq!(mask_for_depth(63), u64::MAX >> 1);
        assert_eq!(mask_for_depth(64), u64::MAX);
    }

    #[test]
    fn test_initial_state() {
        let clock = SimulationClock::new();
        let carousel = engine(10, &clock);
        assert_eq!(carousel.depth(), 0);
        assert_eq!(carousel.mask(), 0);
        assert_eq!(carousel.phase(), 0);
        assert_eq!(carousel.phase_duration(), 100);
        assert_eq!(carousel.grow_threshold(), 10);
        assert!(carousel.is_eligible("12345"));
    }

    #[test]
    fn test_poll_waits_for_full_phase() {
        let clock = SimulationClock::new();
        let mut carousel = engine(10, &clock);

        clock.advance(99);
        assert!(!carousel.poll());
        assert_eq!(carousel.phase(), 0);

        clock.tick();
        assert!(carousel.poll());
        assert_eq!(carousel.phase(), 1);
        assert_eq!(carousel.stats().phases_completed, 1);
    }

    #[test]
    fn test_underflow_floored_at_zero() {
        let clock = SimulationClock::new();
        let mut carousel = engine(10, &clock);

        for _ in 0..5 {
            clock.advance(100);
            carousel.poll();
        }
        assert_eq!(carousel.depth(), 0);
        assert_eq!(carousel.stats().underflows, 0);
        assert_eq!(carousel.phase(), 5);
    }

    #[test]
    fn test_overflow_at_max_depth_keeps_mask() {
        let clock = SimulationClock::new();
        let mut carousel = engine(1, &clock);
        carousel.set_depth(FINGERPRINT_BITS);
        let phase = carousel.phase();

        carousel.repartition_overflow();

        assert_eq!(carousel.depth(), FINGERPRINT_BITS);
        assert_eq!(carousel.mask(), u64::MAX);
        assert_eq!(carousel.phase(), phase + 1);
        assert_eq!(carousel.matching_this_phase(), 0);
    }

    #[test]
    fn test_stats_count_outcomes() {
        let clock = SimulationClock::new();
        let mut carousel = engine(10, &clock);

        assert_eq!(carousel.log("1", "a"), LogOutcome::Forwarded);
        assert_eq!(carousel.log("1", "b"), LogOutcome::Duplicate);
        assert_eq!(carousel.log("2", "c"), LogOutcome::Forwarded);

        let stats = carousel.stats();
        assert_eq!(stats.forwarded, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.out_of_bucket, 0);
        assert_eq!(stats.matching_this_phase, 2);
        assert!(stats.filter_fpr > 0.0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let clock = SimulationClock::new();
        let mut carousel = engine(1, &clock);
        carousel.log("1", "");
        carousel.log("2", "");
        assert_eq!(carousel.depth(), 1);

        clock.advance(3);
        carousel.reset();

        assert_eq!(carousel.depth(), 0);
        assert_eq!(carousel.mask(), 0);
        assert_eq!(carousel.phase(), 0);
        assert_eq!(carousel.matching_this_phase(), 0);
        assert_eq!(carousel.stats(), CarouselStats::default());
        // Phase clock re-anchored at reset time
        clock.advance(9);
        assert!(!carousel.poll());
        clock.tick();
        assert!(carousel.poll());
    }
}
