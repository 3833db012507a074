use crate::bloom::BloomConfig;
use crate::error::{CarouselError, Result};
use crate::hash::{Fingerprint, default_fingerprint};
use derive_builder::Builder;

/// Ratio between the grow and shrink thresholds.
pub const DEFAULT_HYSTERESIS_RATIO: f64 = 2.3;

/// Configuration for [`Carousel`](super::Carousel)
#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct CarouselConfig {
    /// Distinct keys the sink can take per phase. A phase forwarding more
    /// than this many keys grows the partition depth.
    #[builder(default = "200")]
    pub target_size: usize,

    /// A completed phase that forwarded fewer than
    /// `target_size / hysteresis_ratio` keys shrinks the partition depth.
    /// Must be greater than 1.
    #[builder(default = "DEFAULT_HYSTERESIS_RATIO")]
    pub hysteresis_ratio: f64,

    /// Per-phase deduplication filter
    #[builder(default)]
    pub filter: BloomConfig,

    /// Key fingerprint used for bucket selection
    #[builder(default = "default_fingerprint")]
    pub fingerprint: Fingerprint,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            target_size: 200,
            hysteresis_ratio: DEFAULT_HYSTERESIS_RATIO,
            filter: BloomConfig::default(),
            fingerprint: default_fingerprint,
        }
    }
}

impl CarouselConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(CarouselError::ZeroTargetSize);
        }
        if !self.hysteresis_ratio.is_finite() || self.hysteresis_ratio <= 1.0 {
            return Err(CarouselError::InvalidHysteresisRatio {
                ratio: self.hysteresis_ratio,
            });
        }
        self.filter.validate()
    }

    pub fn grow_threshold(&self) -> usize {
        self.target_size
    }

    pub fn shrink_threshold(&self) -> f64 {
        self.target_size as f64 / self.hysteresis_ratio
    }
}
