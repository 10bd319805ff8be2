//! Provides the benchmark of top-K and threshold search for the popcount index and LinearSearch.
use fpsim_rs::builder::sort_by_popcount;
use fpsim_rs::{ls, BitVector, IndexBuilder, Similarity, SimilarityIndex};
use rand::{thread_rng, Rng};
use std::time;

const LENGTH: usize = 1024;
const SIZES: [usize; 3] = [10_000, 100_000, 1_000_000];
const TOPKS: [usize; 3] = [1, 10, 100];
const THRESHOLDS: [f64; 3] = [0.9, 0.8, 0.7];

fn main() -> anyhow::Result<()> {
    env_logger::init();

    #[cfg(debug_assertions)]
    println!("Debugging enabled");

    let fps = gen_random_fingerprints(SIZES[SIZES.len() - 1])?;
    let queries: Vec<BitVector> = fps.iter().step_by(fps.len() / 100).cloned().collect();
    let path = std::env::temp_dir().join("fpsim_timeperf.idx");

    for &size in &SIZES {
        println!("-- N={} --", size);

        let sorted = sort_by_popcount(&fps[0..size]);
        if let (Some(lo), Some(hi)) = (sorted.first(), sorted.last()) {
            println!("Popcounts: {}..={}", lo.popcount(), hi.popcount());
        }

        let ins = time::Instant::now();
        IndexBuilder::from_fingerprints(LENGTH, fps[0..size].to_vec())?.write(&path)?;
        let index = SimilarityIndex::load(&path)?;
        let elapsed_sec = ins.elapsed().as_secs_f64();
        println!("Constr time: {} sec", elapsed_sec);

        let queries = &queries[..queries.len().min(size)];

        for &topk in &TOPKS {
            let ins = time::Instant::now();
            let mut checked = 0u64;
            for query in queries {
                let (answers, stats) = index.top_k_with_stats(query, topk, &Similarity::Tanimoto)?;
                assert_eq!(answers.len(), topk);
                checked += stats.checked as u64;
            }
            let elapsed_ms = ins.elapsed().as_millis() as f64;
            println!(
                "Index (K={}):\t{} ms/query\t{} checked/query",
                topk,
                elapsed_ms / queries.len() as f64,
                checked / queries.len() as u64
            );
        }

        for &threshold in &THRESHOLDS {
            let ins = time::Instant::now();
            let mut checked = 0u64;
            for query in queries {
                let stats = index.find_all_with(query, threshold, &Similarity::Tanimoto, |_, _| {})?;
                checked += stats.checked as u64;
            }
            let elapsed_ms = ins.elapsed().as_millis() as f64;
            println!(
                "Index (T={}):\t{} ms/query\t{} checked/query",
                threshold,
                elapsed_ms / queries.len() as f64,
                checked / queries.len() as u64
            );
        }

        let ins = time::Instant::now();
        for query in queries {
            let mut answers = ls::exhaustive_search(&fps[0..size], query, &Similarity::Tanimoto)?;
            answers.sort_by(|a, b| b.1.total_cmp(&a.1));
            assert_eq!(answers.len(), size);
        }
        let elapsed_ms = ins.elapsed().as_millis() as f64;
        println!(
            "LinearSearch:\t{} ms/query",
            elapsed_ms / queries.len() as f64
        );
    }

    std::fs::remove_file(&path)?;
    Ok(())
}

/// Sparse random fingerprints, roughly like circular fingerprints of drug-like molecules.
pub fn gen_random_fingerprints(size: usize) -> anyhow::Result<Vec<BitVector>> {
    let mut rng = thread_rng();
    let mut fps = Vec::with_capacity(size);
    for _ in 0..size {
        let bits = rng.gen_range(10..80);
        let mut words = vec![0u64; LENGTH / 64];
        for _ in 0..bits {
            let b = rng.gen_range(0..LENGTH);
            words[b / 64] |= 1 << (b % 64);
        }
        fps.push(BitVector::from_words(&words, LENGTH)?);
    }
    Ok(fps)
}
