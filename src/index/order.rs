use crate::measure::Measure;

/// Generator of popcount buckets in visiting order for a query of popcount `q`.
///
/// Starts at `q` and walks outward in both directions, always taking the
/// side whose next bucket has the larger bound (the nearer one on ties, the
/// upper one when equally near). Yielded bounds are therefore non-increasing,
/// so the first bucket that cannot contribute ends the search.
pub struct BucketOrder<'m, M: Measure + ?Sized> {
    measure: &'m M,
    q: u32,
    max: u32,
    first: bool,
    up: Option<u32>,
    down: Option<u32>,
}

impl<'m, M: Measure + ?Sized> BucketOrder<'m, M> {
    /// Buckets `0..=max` for a query of popcount `q`.
    pub fn new(measure: &'m M, q: u32, max: u32) -> Self {
        debug_assert!(q <= max);
        Self {
            measure,
            q,
            max,
            first: true,
            up: None,
            down: None,
        }
    }
}

impl<M: Measure + ?Sized> Iterator for BucketOrder<'_, M> {
    type Item = (u32, f64);

    fn next(&mut self) -> Option<(u32, f64)> {
        let q = self.q;
        if self.first {
            self.first = false;
            self.up = if q < self.max { Some(q + 1) } else { None };
            self.down = if q > 0 { Some(q - 1) } else { None };
            return Some((q, self.measure.bound(q, q)));
        }

        let take_up = match (self.up, self.down) {
            (None, None) => return None,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(u), Some(d)) => {
                let bu = self.measure.bound(q, u);
                let bd = self.measure.bound(q, d);
                bu > bd || (bu == bd && u - q <= q - d)
            }
        };

        if take_up {
            let u = self.up?;
            self.up = if u < self.max { Some(u + 1) } else { None };
            Some((u, self.measure.bound(q, u)))
        } else {
            let d = self.down?;
            self.down = if d > 0 { Some(d - 1) } else { None };
            Some((d, self.measure.bound(q, d)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::Similarity;

    #[test]
    fn constant_bound_alternates() {
        let order: Vec<u32> = BucketOrder::new(&Similarity::Manhattan, 3, 6)
            .map(|(b, _)| b)
            .collect();
        assert_eq!(order, vec![3, 4, 2, 5, 1, 6, 0]);
    }

    #[test]
    fn edges() {
        let order: Vec<u32> = BucketOrder::new(&Similarity::Manhattan, 0, 3)
            .map(|(b, _)| b)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3]);

        let order: Vec<u32> = BucketOrder::new(&Similarity::Manhattan, 3, 3)
            .map(|(b, _)| b)
            .collect();
        assert_eq!(order, vec![3, 2, 1, 0]);
    }

    #[test]
    fn bounds_never_increase() {
        for m in &Similarity::ALL {
            for q in 0..=64 {
                let visited: Vec<(u32, f64)> = BucketOrder::new(m, q, 64).collect();
                assert_eq!(visited.len(), 65);

                let mut seen: Vec<u32> = visited.iter().map(|v| v.0).collect();
                seen.sort_unstable();
                assert_eq!(seen, (0..=64).collect::<Vec<u32>>());

                for w in visited.windows(2) {
                    assert!(w[1].1 <= w[0].1, "{:?} q={} {:?}", m, q, w);
                }
            }
        }
    }

    #[test]
    fn tanimoto_prefers_higher_bound() {
        // below q = 10 the bound drops faster than above it
        let order: Vec<u32> = BucketOrder::new(&Similarity::Tanimoto, 10, 20)
            .map(|(b, _)| b)
            .take(9)
            .collect();
        assert_eq!(order, vec![10, 11, 9, 12, 8, 13, 14, 7, 15]);
    }
}
