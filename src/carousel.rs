//! Carousel: adaptive phase partitioning of a key space.
//!
//! Keys are split into `2^k` buckets by the low `k` bits of their
//! fingerprint. Each phase admits a single bucket (`v & (2^k - 1)`) and
//! forwards every distinct key of that bucket once. Over consecutive phases
//! the active bucket rotates, so the whole key space gets covered.
//!
//! The depth `k` follows the load:
//!     * Overflow: a phase forwarding more than `target_size` distinct keys
//!       grows `k` right away and starts a fresh phase.
//!     * Underflow: a phase ending with fewer than
//!       `target_size / hysteresis_ratio` distinct keys shrinks `k` (never
//!       below zero) before the next phase starts.
pub mod config;
pub mod engine;
pub mod sink;

pub use config::{
    CarouselConfig, CarouselConfigBuilder, CarouselConfigBuilderError,
    DEFAULT_HYSTERESIS_RATIO,
};
pub use engine::{Carousel, CarouselStats, LogOutcome};
pub use sink::{MemorySink, Sink};
