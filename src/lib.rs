//! Flow control for high-volume event logging, built on the Carousel algorithm.
//!
//! A downstream sink (a bounded buffer, a fixed-rate store, a human reading
//! output) can only take so many distinct keys per unit of time. Carousel
//! decides which `(key, entry)` events to forward so the sink receives at most
//! `target_size` distinct keys per phase, while every key still gets its turn
//! as the load shifts.
//!
//! HowTo:
//!    * Buckets: the key space is split into `2^k` buckets by the low `k` bits
//!      of a 64-bit key fingerprint.
//!    * Phases: each phase admits one bucket, `v & (2^k - 1)`, and `v`
//!      increments every phase so buckets take turns.
//!    * Dedup: a Bloom filter, cleared at every phase change, lets each key
//!      through at most once per phase.
//!
//! Repartitioning:
//!     * More than `target_size` distinct keys in a phase: `k` grows at once
//!       and a new phase starts (buckets halve).
//!     * Fewer than `target_size / ratio` keys in a finished phase: `k`
//!       shrinks (buckets double). With `ratio > 1` the engine does not
//!       flip-flop on noisy counts.
//!
//! Obvious problems:
//!     * A Bloom filter false positive silently drops a new key for the rest
//!       of the phase; see [`expected_false_positive_rate`] to size the filter.
//!     * The engine is single-writer; serialise `log` calls across threads.
//!
//! ```
//! use carousel_rs::{Carousel, CarouselConfigBuilder, MemorySink, SimulationClock};
//!
//! let clock = SimulationClock::new();
//! let config = CarouselConfigBuilder::default()
//!     .target_size(10)
//!     .build()
//!     .unwrap();
//! let mut carousel =
//!     Carousel::new(config, clock.clone(), 5, MemorySink::new()).unwrap();
//!
//! for _ in 0..1000 {
//!     carousel.log("same-key", "entry");
//! }
//! assert_eq!(carousel.sink().len(), 1);
//! ```

pub mod bloom;
pub mod carousel;
pub mod clock;
pub mod drain;
mod error;
mod hash;
#[cfg(feature = "cli")]
pub mod sim;

pub use bloom::{
    BloomConfig, BloomConfigBuilder, BloomFilter, FilterStats, MembershipFilter,
};
pub use carousel::{
    Carousel, CarouselConfig, CarouselConfigBuilder, CarouselConfigBuilderError,
    CarouselStats, DEFAULT_HYSTERESIS_RATIO, LogOutcome, MemorySink, Sink,
};
pub use clock::{Clock, SimulationClock, WallClock};
pub use drain::{DrainReport, DrainWorker, QueueSink, spawn_drain};
pub use error::{CarouselError, Result};
pub use hash::{
    FINGERPRINT_BITS, Fingerprint, HashFunction, default_fingerprint,
    default_hash_function, expected_false_positive_rate,
    optimal_bit_vector_size, optimal_num_hashes, partow_hash_function,
};
