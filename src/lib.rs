//! # fpsim-rs
//!
//! Similarity search over fixed-length binary fingerprints (e.g. chemical structure
//! fingerprints) using the Tanimoto coefficient and related set-similarity measures.
//!
//! ## Features
//!
//! - **Two types of searches:** fpsim-rs provides the two search operations:
//!   - *Threshold search* finds all fingerprints whose similarity to a query is at least a threshold.
//!   - *Top-K search* finds the K fingerprints most similar to a query.
//!
//! - **Popcount bucketing:** Fingerprints are counting-sorted by population count into an
//!   on-disk index. A query visits buckets outward from its own popcount and stops as soon
//!   as the measure's popcount-only bound shows that no remaining bucket can qualify.
//!
//! - **Memory-mapped, read-only index:** A built index is loaded with a memory map (or an
//!   LRU of per-bucket maps, or fully into memory) and can serve queries from many threads.
//!
//! ## Example
//!
//! ```rust
//! use fpsim_rs::{BitVector, IndexBuilder, Similarity, SimilarityIndex};
//!
//! fn main() -> fpsim_rs::Result<()> {
//!     let mut builder = IndexBuilder::new(64)?;
//!     for word in &[0b1111u64, 0b0011, 0b1100_0000, 0b0111] {
//!         builder.push(BitVector::from_words(&[*word], 64)?)?;
//!     }
//!     let index = SimilarityIndex::from_bytes(builder.build().bytes)?;
//!
//!     // Query fingerprint
//!     let query = BitVector::from_words(&[0b0111], 64)?;
//!
//!     // Ids of the fingerprints with a Tanimoto similarity of at least 0.7
//!     let answers = index.find_all(&query, 0.7, &Similarity::Tanimoto)?;
//!     assert_eq!(answers.len(), 2);
//!
//!     // The two most similar fingerprints
//!     let answers = index.top_k(&query, 2, &Similarity::Tanimoto)?;
//!     assert_eq!(answers[0].score, 1.0);
//!     assert_eq!(answers[1].score, 0.75);
//!     Ok(())
//! }
//! ```
//!
//! ## Index ids
//!
//! Ids returned by a query are slots in popcount order, not input positions. The
//! permutation returned by [`IndexBuilder::build`] (or the companion id file written
//! by [`IndexBuilder::write`]) maps them back.

mod error;

/// Fixed-length bit vectors.
pub mod bitvec;

/// Similarity measures and their pruning bounds.
pub mod measure;

/// Bounded top-k heap.
pub mod topk;

/// Construction of the on-disk index.
pub mod builder;

/// Companion id files.
pub mod idmap;

/// The popcount-bucketed similarity index.
pub mod index;

/// Exhaustive search functions.
pub mod ls;

pub use bitvec::BitVector;
pub use builder::{BuiltIndex, IndexBuilder};
pub use error::{Error, Result};
pub use idmap::IdMap;
pub use index::{Backing, LoadOptions, SearchStats, SimilarityIndex};
pub use measure::{Measure, Similarity};
pub use topk::{BoundedTopK, Hit};

/// Gets the Tanimoto similarity between two fingerprints.
pub fn tanimoto(x: &BitVector, y: &BitVector) -> Result<f64> {
    x.similarity(y, &Similarity::Tanimoto)
}
