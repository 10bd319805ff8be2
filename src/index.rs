mod ops;
mod order;
pub mod source;

use std::sync::atomic::AtomicU32;

pub use order::BucketOrder;
use source::PayloadSource;

/// Where a loaded index reads its fingerprints from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// Map the whole file read-only.
    Mmap,
    /// Map bucket ranges on demand, keeping up to `capacity` of them.
    Chunked { capacity: usize },
    /// Read the whole file into memory.
    Memory,
}

impl Default for Backing {
    fn default() -> Self {
        Backing::Mmap
    }
}

/// Options for [`SimilarityIndex::load_with`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub backing: Backing,
}

/// Work done by a single query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Fingerprints scored.
    pub checked: u32,
    /// Non-empty buckets scanned.
    pub buckets: u32,
}

/// Read-only similarity index over popcount-bucketed fingerprints.
///
/// Queries take `&self` and may run concurrently from several threads.
pub struct SimilarityIndex {
    length: usize,
    /// `offsets[p]..offsets[p + 1]` are the ids of popcount `p`.
    offsets: Vec<u32>,
    source: Option<Box<dyn PayloadSource>>,
    last_checked: AtomicU32,
}
