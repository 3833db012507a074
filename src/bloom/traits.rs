/// Approximate set over byte keys with no false negatives.
pub trait MembershipFilter {
    /// Record `item` as a member.
    fn add(&mut self, item: &[u8]);

    /// `true` if every probe bit for `item` is set. Never `false` for an
    /// item added since the last reset.
    fn probably_contains(&self, item: &[u8]) -> bool;

    /// Clear every bit.
    fn reset(&mut self);
}

pub trait FilterStats {
    fn num_bits(&self) -> usize;
    fn num_hashes(&self) -> usize;
    /// Number of `add` calls since the last reset
    fn insert_count(&self) -> usize;
    /// Number of bits currently set
    fn set_bits(&self) -> usize;
    /// Predicted false positive rate for the current insert count
    fn estimated_false_positive_rate(&self) -> f64;
}
