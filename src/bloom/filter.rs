use super::{BloomConfig, FilterStats, MembershipFilter};
use crate::error::Result;
use crate::hash::expected_false_positive_rate;
use bitvec::{bitvec, order::Lsb0, vec::BitVec};

pub struct BloomFilter {
    config: BloomConfig,
    bits: BitVec<usize, Lsb0>,
    insert_count: usize,
}

impl BloomFilter {
    pub fn new(config: BloomConfig) -> Result<Self> {
        config.validate()?;

        let bits = bitvec![0; config.num_bits];

        Ok(Self {
            config,
            bits,
            insert_count: 0,
        })
    }

    pub fn config(&self) -> &BloomConfig {
        &self.config
    }

    fn probes(&self, item: &[u8]) -> impl Iterator<Item = usize> + use<> {
        let num_bits = self.config.num_bits;
        (self.config.hash_function)(item, self.config.num_hashes, num_bits)
            .into_iter()
            // Custom hash functions are not trusted to reduce their output
            .map(move |h| h as usize % num_bits)
    }
}

impl MembershipFilter for BloomFilter {
    fn add(&mut self, item: &[u8]) {
        for idx in self.probes(item) {
            self.bits.set(idx, true);
        }
        self.insert_count += 1;
    }

    fn probably_contains(&self, item: &[u8]) -> bool {
        self.probes(item).all(|idx| self.bits[idx])
    }

    fn reset(&mut self) {
        self.bits.fill(false);
        self.insert_count = 0;
    }
}

impl FilterStats for BloomFilter {
    fn num_bits(&self) -> usize {
        self.config.num_bits
    }

    fn num_hashes(&self) -> usize {
        self.config.num_hashes
    }

    fn insert_count(&self) -> usize {
        self.insert_count
    }

    fn set_bits(&self) -> usize {
        self.bits.count_ones()
    }

    fn estimated_false_positive_rate(&self) -> f64 {
        expected_false_positive_rate(
            self.config.num_bits,
            self.config.num_hashes,
            self.insert_count,
        )
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BloomFilter {{ num_bits: {}, num_hashes: {}, insert_count: {}, set_bits: {} }}",
            self.config.num_bits,
            self.config.num_hashes,
            self.insert_count,
            self.bits.count_ones()
        )
    }
}
