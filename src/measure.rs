//! Set-similarity measures over the four bit-count statistics of two fingerprints.
//!
//! For fingerprints `A` and `B` of equal length the statistics are
//! `only_a = |A| - |A & B|`, `only_b = |B| - |A & B|`, `both = |A & B|` and
//! `neither = length - (only_a + only_b + both)`.

/// A similarity measure together with an upper bound that depends only on popcounts.
///
/// `bound(q, t)` must never be smaller than `compute` for any pair of
/// fingerprints with popcounts `q` and `t`, and must be non-increasing as `t`
/// moves away from `q` in either direction. The index relies on both
/// properties to skip whole popcount buckets.
pub trait Measure {
    fn compute(&self, only_a: u32, only_b: u32, both: u32, neither: u32) -> f64;

    fn bound(&self, q: u32, t: u32) -> f64;
}

/// The built-in measures.
///
/// All of them return `0.0` when their denominator is zero (e.g. Tanimoto of
/// two empty fingerprints).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Similarity {
    /// `|A & B| / |A | B|`.
    Tanimoto,
    /// `2|A & B| / (|A| + |B|)`.
    Dice,
    /// `|A & B| / sqrt(|A| |B|)`.
    Cosine,
    /// Fraction of differing bits, `|A ^ B| / length`. Larger means less alike.
    Manhattan,
}

impl Similarity {
    pub const ALL: [Similarity; 4] = [
        Similarity::Tanimoto,
        Similarity::Dice,
        Similarity::Cosine,
        Similarity::Manhattan,
    ];
}

impl Measure for Similarity {
    fn compute(&self, only_a: u32, only_b: u32, both: u32, neither: u32) -> f64 {
        let (a, b, c, d) = (
            only_a as u64,
            only_b as u64,
            both as u64,
            neither as u64,
        );
        match self {
            Similarity::Tanimoto => ratio(c, a + b + c),
            Similarity::Dice => ratio(2 * c, a + b + 2 * c),
            Similarity::Cosine => {
                let denom = (a + c) * (b + c);
                if denom == 0 {
                    0.0
                } else {
                    c as f64 / (denom as f64).sqrt()
                }
            }
            Similarity::Manhattan => ratio(a + b, a + b + c + d),
        }
    }

    // The Tanimoto, Dice and Cosine bounds are attained when the smaller set
    // is a subset of the larger one, and are evaluated with the same
    // arithmetic as `compute` so that the bound equals the best score exactly.
    fn bound(&self, q: u32, t: u32) -> f64 {
        let lo = q.min(t) as u64;
        let hi = q.max(t) as u64;
        match self {
            Similarity::Tanimoto => ratio(lo, hi),
            Similarity::Dice => ratio(2 * lo, lo + hi),
            Similarity::Cosine => {
                let denom = lo * hi;
                if denom == 0 {
                    0.0
                } else {
                    lo as f64 / (denom as f64).sqrt()
                }
            }
            // The distance grows away from q, so no popcount-only pruning applies.
            Similarity::Manhattan => 1.0,
        }
    }
}

#[inline]
fn ratio(num: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LENGTH: u32 = 64;

    /// Best score reachable by any pair of LENGTH-bit vectors with popcounts q and t.
    fn true_max(m: Similarity, q: u32, t: u32) -> f64 {
        let lo = (q + t).saturating_sub(LENGTH);
        let hi = q.min(t);
        let mut best = f64::NEG_INFINITY;
        for both in lo..=hi {
            let only_a = q - both;
            let only_b = t - both;
            let neither = LENGTH - (only_a + only_b + both);
            best = best.max(m.compute(only_a, only_b, both, neither));
        }
        best
    }

    #[test]
    fn tanimoto_works() {
        let m = Similarity::Tanimoto;
        assert_eq!(m.compute(0, 0, 4, 60), 1.0);
        assert_eq!(m.compute(2, 2, 4, 56), 0.5);
        assert_eq!(m.compute(3, 5, 0, 56), 0.0);
    }

    #[test]
    fn zero_denominator_is_zero() {
        for m in &Similarity::ALL {
            if *m != Similarity::Manhattan {
                assert_eq!(m.compute(0, 0, 0, 64), 0.0, "{:?}", m);
                assert_eq!(m.bound(0, 0), 0.0, "{:?}", m);
            }
        }
        assert_eq!(Similarity::Cosine.compute(3, 0, 0, 61), 0.0);
        assert_eq!(Similarity::Manhattan.compute(0, 0, 0, 64), 0.0);
    }

    #[test]
    fn other_measures_work() {
        assert_eq!(Similarity::Dice.compute(2, 2, 4, 56), 2.0 / 3.0);
        assert_eq!(Similarity::Cosine.compute(0, 12, 4, 48), 0.5);
        assert_eq!(Similarity::Manhattan.compute(16, 16, 0, 32), 0.5);
    }

    #[test]
    fn tanimoto_bound_is_exact() {
        for q in 0..=LENGTH {
            for t in 0..=LENGTH {
                let expected = true_max(Similarity::Tanimoto, q, t);
                assert_eq!(Similarity::Tanimoto.bound(q, t), expected, "q={} t={}", q, t);
            }
        }
    }

    #[test]
    fn bounds_are_sound() {
        for m in &Similarity::ALL {
            for q in 0..=LENGTH {
                for t in 0..=LENGTH {
                    assert!(
                        m.bound(q, t) >= true_max(*m, q, t),
                        "{:?} q={} t={}",
                        m,
                        q,
                        t
                    );
                }
            }
        }
    }

    #[test]
    fn bounds_shrink_away_from_query() {
        for m in &Similarity::ALL {
            for q in 0..=LENGTH {
                for t in q..LENGTH {
                    assert!(m.bound(q, t + 1) <= m.bound(q, t), "{:?} q={} t={}", m, q, t);
                }
                for t in 1..=q {
                    assert!(m.bound(q, t - 1) <= m.bound(q, t), "{:?} q={} t={}", m, q, t);
                }
            }
        }
    }
}
