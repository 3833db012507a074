//! Resettable Bloom filter used for per-phase deduplication.
//!
//! The filter only ever grows between resets: bits are set by `add` and
//! cleared all at once by `reset`. There is no per-key removal.
pub mod config;
pub mod filter;
pub mod traits;

pub use config::{BloomConfig, BloomConfigBuilder, BloomConfigBuilderError};
pub use filter::BloomFilter;
pub use traits::{FilterStats, MembershipFilter};
