use crate::error::{CarouselError, Result};
use crate::hash::{
    HashFunction, default_hash_function, optimal_bit_vector_size,
    optimal_num_hashes,
};
use derive_builder::Builder;

#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct BloomConfig {
    /// Size of the bit array
    #[builder(default = "128")]
    pub num_bits: usize,

    /// Number of probe positions per key
    #[builder(default = "5")]
    pub num_hashes: usize,

    /// Hash function producing the probe positions
    #[builder(default = "default_hash_function")]
    pub hash_function: HashFunction,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            num_bits: 128,
            num_hashes: 5,
            hash_function: default_hash_function,
        }
    }
}

impl BloomConfig {
    /// Size the filter so that holding `expected_items` distinct keys
    /// keeps the false positive rate near `false_positive_rate`.
    pub fn for_capacity(
        expected_items: usize,
        false_positive_rate: f64,
    ) -> Result<Self> {
        if expected_items == 0 {
            return Err(CarouselError::InvalidConfig(
                "Expected items must be > 0".into(),
            ));
        }
        if false_positive_rate <= 0.0 || false_positive_rate >= 1.0 {
            return Err(CarouselError::InvalidConfig(
                "FPR must be between 0 and 1".into(),
            ));
        }

        let num_bits =
            optimal_bit_vector_size(expected_items, false_positive_rate).max(1);
        let num_hashes = optimal_num_hashes(expected_items, num_bits).max(1);

        Ok(Self {
            num_bits,
            num_hashes,
            hash_function: default_hash_function,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_bits == 0 {
            return Err(CarouselError::ZeroFilterBits);
        }
        if self.num_hashes == 0 {
            return Err(CarouselError::ZeroHashFunctions);
        }
        Ok(())
    }
}
