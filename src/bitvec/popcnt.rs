//! Population counts over word slices.

/// Number of set bits in a slice of words.
#[inline]
pub fn popcnt_words(words: &[u64]) -> u32 {
    words.iter().map(|w| w.count_ones()).sum()
}

/// Number of bits set in both `x` and `y`.
#[inline]
pub fn popcnt_and(x: &[u64], y: &[u64]) -> u32 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y).map(|(a, b)| (a & b).count_ones()).sum()
}
