//! Bounded heap keeping the `k` best scored ids seen so far.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// An index-space id together with its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub id: u32,
    pub score: f64,
}

impl Hit {
    /// Ranking order: higher score first, then lower id.
    pub fn rank(&self, other: &Hit) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.id.cmp(&other.id))
    }
}

impl fmt::Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.id, self.score)
    }
}

/// Heap entry ordered so that the worst-ranked hit is the maximum.
struct Worst(Hit);

impl PartialEq for Worst {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Worst {}

impl PartialOrd for Worst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Worst {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank(&other.0)
    }
}

/// A fixed-capacity min-heap on score.
///
/// Once `k` hits are held, a new hit only gets in by beating the current
/// worst one, which it then replaces.
pub struct BoundedTopK {
    heap: BinaryHeap<Worst>,
    k: usize,
}

impl BoundedTopK {
    /// The heap grows as hits arrive, so `k` may exceed any realistic count.
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            k,
        }
    }

    /// Offers a hit; returns true if it was kept.
    #[inline]
    pub fn offer(&mut self, id: u32, score: f64) -> bool {
        let entry = Worst(Hit { id, score });
        if self.heap.len() < self.k {
            self.heap.push(entry);
            return true;
        }
        if let Some(mut worst) = self.heap.peek_mut() {
            if entry < *worst {
                *worst = entry;
                return true;
            }
        }
        false
    }

    /// Lowest score currently kept.
    pub fn min(&self) -> Option<f64> {
        self.heap.peek().map(|w| w.0.score)
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.k
    }

    /// Consumes the heap, returning hits by descending score, ties by ascending id.
    pub fn into_sorted_vec(self) -> Vec<Hit> {
        self.heap.into_sorted_vec().into_iter().map(|w| w.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_largest() {
        let mut heap = BoundedTopK::new(5);
        for (id, s) in [1, 5, 3, 8, 2, 9, 4, 7, 6, 10].iter().enumerate() {
            heap.offer(id as u32, *s as f64);
        }
        assert_eq!(heap.len(), 5);
        assert_eq!(heap.min(), Some(6.0));
        let scores: Vec<f64> = heap.into_sorted_vec().iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![10.0, 9.0, 8.0, 7.0, 6.0]);
    }

    #[test]
    fn fewer_than_k() {
        let mut heap = BoundedTopK::new(10);
        assert!(heap.is_empty());
        assert_eq!(heap.min(), None);
        heap.offer(3, 0.5);
        heap.offer(1, 0.75);
        assert!(!heap.is_full());
        let hits = heap.into_sorted_vec();
        assert_eq!(hits, vec![Hit { id: 1, score: 0.75 }, Hit { id: 3, score: 0.5 }]);
    }

    #[test]
    fn ties_prefer_lower_id() {
        let mut heap = BoundedTopK::new(2);
        assert!(heap.offer(7, 0.5));
        assert!(heap.offer(9, 0.5));
        assert!(heap.offer(2, 0.5));
        assert!(!heap.offer(8, 0.5));
        let ids: Vec<u32> = heap.into_sorted_vec().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 7]);
    }

    #[test]
    fn rejects_worse_when_full() {
        let mut heap = BoundedTopK::new(2);
        heap.offer(0, 0.9);
        heap.offer(1, 0.8);
        assert!(heap.is_full());
        assert!(!heap.offer(2, 0.1));
        assert!(heap.offer(3, 0.85));
        assert_eq!(heap.min(), Some(0.85));
    }

    #[test]
    fn unbounded_capacity() {
        let mut heap = BoundedTopK::new(usize::MAX);
        assert_eq!(heap.capacity(), usize::MAX);
        heap.offer(0, 0.25);
        heap.offer(1, 0.5);
        assert!(!heap.is_full());
        let ids: Vec<u32> = heap.into_sorted_vec().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn zero_capacity() {
        let mut heap = BoundedTopK::new(0);
        assert!(heap.is_full());
        assert!(!heap.offer(0, 1.0));
        assert!(heap.into_sorted_vec().is_empty());
    }
}
