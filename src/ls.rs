//! Implements a simple exhaustive search for comparison with the index.

use crate::bitvec::BitVector;
use crate::error::Result;
use crate::measure::Measure;

/// Finds the fingerprints in fps whose similarity to query is at least threshold.
/// Returns their positions in fps.
pub fn threshold_search<M: Measure + ?Sized>(
    fps: &[BitVector],
    query: &BitVector,
    threshold: f64,
    measure: &M,
) -> Result<Vec<u32>> {
    let mut answers = Vec::<u32>::with_capacity(1 << 8);
    threshold_search_with_buf(fps, query, threshold, measure, &mut answers)?;
    Ok(answers)
}

/// Finds the fingerprints in fps whose similarity to query is at least threshold.
/// Their positions are stored in answers.
pub fn threshold_search_with_buf<M: Measure + ?Sized>(
    fps: &[BitVector],
    query: &BitVector,
    threshold: f64,
    measure: &M,
    answers: &mut Vec<u32>,
) -> Result<()> {
    answers.clear();
    for (i, fp) in fps.iter().enumerate() {
        if query.similarity(fp, measure)? >= threshold {
            answers.push(i as u32);
        }
    }
    Ok(())
}

/// Computes all the similarities between fps and query.
/// Returns the tuples of position and score.
pub fn exhaustive_search<M: Measure + ?Sized>(
    fps: &[BitVector],
    query: &BitVector,
    measure: &M,
) -> Result<Vec<(u32, f64)>> {
    let mut answers = Vec::new();
    exhaustive_search_with_buf(fps, query, measure, &mut answers)?;
    Ok(answers)
}

/// Computes all the similarities between fps and query.
/// The tuples of position and score are stored in answers.
pub fn exhaustive_search_with_buf<M: Measure + ?Sized>(
    fps: &[BitVector],
    query: &BitVector,
    measure: &M,
    answers: &mut Vec<(u32, f64)>,
) -> Result<()> {
    answers.clear();
    answers.reserve(fps.len());
    for (i, fp) in fps.iter().enumerate() {
        answers.push((i as u32, query.similarity(fp, measure)?));
    }
    Ok(())
}

/// Top-k by exhaustive scoring: descending score, ties by ascending position.
pub fn top_k_search<M: Measure + ?Sized>(
    fps: &[BitVector],
    query: &BitVector,
    k: usize,
    measure: &M,
) -> Result<Vec<(u32, f64)>> {
    let mut answers = exhaustive_search(fps, query, measure)?;
    answers.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    answers.truncate(k);
    Ok(answers)
}
