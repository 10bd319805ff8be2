use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use log::{debug, info, warn};

use crate::bitvec::popcnt::{popcnt_and, popcnt_words};
use crate::bitvec::{check_length, score, BitVector, WORD_BITS};
use crate::builder::header_len;
use crate::error::{Error, Result};
use crate::index::order::BucketOrder;
use crate::index::source::{ChunkedSource, MemorySource, MmapSource, PayloadSource};
use crate::index::{Backing, LoadOptions, SearchStats, SimilarityIndex};
use crate::measure::Measure;
use crate::topk::{BoundedTopK, Hit};

fn corrupt<T>(msg: String) -> Result<T> {
    Err(Error::CorruptIndex(msg))
}

/// Reads and validates the header of an index of `file_len` bytes.
/// Returns the fingerprint length and the bucket offsets.
fn read_header<R: Read>(rdr: &mut R, file_len: u64) -> Result<(usize, Vec<u32>)> {
    if file_len < 4 {
        return corrupt(format!("{} bytes is too short for a header", file_len));
    }
    let buckets = rdr.read_u32::<LittleEndian>()? as usize;
    if buckets < 2 || check_length(buckets - 1).is_err() {
        return corrupt(format!(
            "{} buckets do not match a valid fingerprint length",
            buckets
        ));
    }
    let length = buckets - 1;

    let header = header_len(buckets) as u64;
    if header > file_len {
        return corrupt(format!(
            "header needs {} bytes but the file has {}",
            header, file_len
        ));
    }

    let mut offsets = vec![0u32; buckets + 1];
    rdr.read_u32_into::<LittleEndian>(&mut offsets)?;
    if offsets[0] != 0 {
        return corrupt(format!("first bucket offset is {}", offsets[0]));
    }
    if let Some(p) = offsets.windows(2).position(|w| w[0] > w[1]) {
        return corrupt(format!("bucket offsets decrease at popcount {}", p + 1));
    }

    let total = offsets[buckets] as u64;
    let expected = header + total * (length / 8) as u64;
    if expected != file_len {
        return corrupt(format!(
            "header declares {} fingerprints ({} bytes) but the file has {} bytes",
            total, expected, file_len
        ));
    }
    Ok((length, offsets))
}

fn check_cancel(cancel: Option<&AtomicBool>) -> Result<()> {
    match cancel {
        Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

impl SimilarityIndex {
    /// Loads an index file, mapping its payload read-only.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, LoadOptions::default())
    }

    /// Loads an index file with an explicit backing strategy.
    /// Fails with `CorruptIndex` if the header disagrees with the file size.
    pub fn load_with<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let (length, offsets) = read_header(&mut BufReader::new(&file), file_len)?;
        let header = header_len(length + 1);
        let payload_len = file_len as usize - header;

        let source: Box<dyn PayloadSource> = match options.backing {
            Backing::Mmap => Box::new(MmapSource::new(&file, header)?),
            Backing::Chunked { capacity } => {
                Box::new(ChunkedSource::new(file, header, payload_len, capacity)?)
            }
            Backing::Memory => {
                let data = fs::read(path)?;
                if data.len() as u64 != file_len {
                    return corrupt(format!("{} changed while loading", path.display()));
                }
                Box::new(MemorySource::new(data, header))
            }
        };

        let index = Self::with_source(length, offsets, source);
        info!(
            "Loaded index of {} fingerprints ({} bits) from {} [{}]",
            index.size(),
            length,
            path.display(),
            index.backing_name().unwrap_or("closed")
        );
        Ok(index)
    }

    /// Wraps serialized index bytes, e.g. from [`crate::IndexBuilder::build`].
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut rdr = &bytes[..];
        let (length, offsets) = read_header(&mut rdr, bytes.len() as u64)?;
        let header = header_len(length + 1);
        Ok(Self::with_source(
            length,
            offsets,
            Box::new(MemorySource::new(bytes, header)),
        ))
    }

    fn with_source(length: usize, offsets: Vec<u32>, source: Box<dyn PayloadSource>) -> Self {
        Self {
            length,
            offsets,
            source: Some(source),
            last_checked: AtomicU32::new(0),
        }
    }

    /// Number of fingerprints in the index.
    pub fn size(&self) -> u32 {
        self.offsets[self.offsets.len() - 1]
    }

    /// Fingerprint length in bits.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Fingerprints scored by the most recently finished query.
    pub fn checked_count(&self) -> u32 {
        self.last_checked.load(Ordering::Relaxed)
    }

    /// Ids of the fingerprints with popcount `popcount`.
    pub fn bucket_range(&self, popcount: u32) -> Range<u32> {
        let p = popcount as usize;
        if p >= self.offsets.len() - 1 {
            let n = self.size();
            return n..n;
        }
        self.offsets[p]..self.offsets[p + 1]
    }

    pub fn backing_name(&self) -> Option<&'static str> {
        self.source.as_ref().map(|s| s.name())
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Releases the payload; later reads and queries fail with `UseAfterClose`.
    pub fn close(&mut self) {
        match self.source.take() {
            Some(src) => debug!("Closed {} index of {} fingerprints", src.name(), self.size()),
            None => warn!("Index closed twice"),
        }
    }

    /// Reads back the fingerprint stored under `id`.
    pub fn fingerprint(&self, id: u32) -> Result<BitVector> {
        let src = self.source()?;
        if id >= self.size() {
            return Err(Error::OutOfRange {
                index: id as usize,
                length: self.size() as usize,
            });
        }
        let step = self.length / 8;
        let beg = id as usize * step;
        let bytes = src.read(beg, beg + step)?;
        BitVector::from_bytes(&bytes)
    }

    /// The `k` ids most similar to `query`, by descending score then ascending id.
    pub fn top_k<M: Measure + ?Sized>(
        &self,
        query: &BitVector,
        k: usize,
        measure: &M,
    ) -> Result<Vec<Hit>> {
        Ok(self.search_top_k(query, k, measure)?.0)
    }

    pub fn top_k_with_stats<M: Measure + ?Sized>(
        &self,
        query: &BitVector,
        k: usize,
        measure: &M,
    ) -> Result<(Vec<Hit>, SearchStats)> {
        self.search_top_k(query, k, measure)
    }

    /// Like [`SimilarityIndex::top_k`], handing each ranked hit to `emit`.
    pub fn top_k_with<M, F>(
        &self,
        query: &BitVector,
        k: usize,
        measure: &M,
        mut emit: F,
    ) -> Result<SearchStats>
    where
        M: Measure + ?Sized,
        F: FnMut(u32, f64),
    {
        let (hits, stats) = self.search_top_k(query, k, measure)?;
        for hit in hits {
            emit(hit.id, hit.score);
        }
        Ok(stats)
    }

    /// Every id whose similarity to `query` is at least `threshold`, in visiting order.
    pub fn find_all<M: Measure + ?Sized>(
        &self,
        query: &BitVector,
        threshold: f64,
        measure: &M,
    ) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        self.search_threshold(query, threshold, measure, None, &mut |id, _| ids.push(id))?;
        Ok(ids)
    }

    pub fn find_all_scored<M: Measure + ?Sized>(
        &self,
        query: &BitVector,
        threshold: f64,
        measure: &M,
    ) -> Result<Vec<Hit>> {
        let mut hits = Vec::new();
        self.search_threshold(query, threshold, measure, None, &mut |id, score| {
            hits.push(Hit { id, score })
        })?;
        Ok(hits)
    }

    pub fn find_all_with<M, F>(
        &self,
        query: &BitVector,
        threshold: f64,
        measure: &M,
        mut emit: F,
    ) -> Result<SearchStats>
    where
        M: Measure + ?Sized,
        F: FnMut(u32, f64),
    {
        self.search_threshold(query, threshold, measure, None, &mut emit)
    }

    /// Like [`SimilarityIndex::find_all`], giving up with `Cancelled` once
    /// `cancel` is set. The flag is checked before each bucket.
    pub fn find_all_cancellable<M: Measure + ?Sized>(
        &self,
        query: &BitVector,
        threshold: f64,
        measure: &M,
        cancel: &AtomicBool,
    ) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        self.search_threshold(query, threshold, measure, Some(cancel), &mut |id, _| {
            ids.push(id)
        })?;
        Ok(ids)
    }

    fn source(&self) -> Result<&dyn PayloadSource> {
        self.source.as_deref().ok_or(Error::UseAfterClose)
    }

    fn check_query(&self, query: &BitVector) -> Result<()> {
        if query.len() != self.length {
            return Err(Error::LengthMismatch {
                expected: self.length,
                found: query.len(),
            });
        }
        Ok(())
    }

    fn search_top_k<M: Measure + ?Sized>(
        &self,
        query: &BitVector,
        k: usize,
        measure: &M,
    ) -> Result<(Vec<Hit>, SearchStats)> {
        let src = self.source()?;
        self.check_query(query)?;

        let ins = time::Instant::now();
        let q = query.popcount();
        let mut heap = BoundedTopK::new(k.min(self.size() as usize));
        let mut stats = SearchStats::default();
        let mut scratch = vec![0u64; self.length / WORD_BITS];

        if k > 0 {
            for (bucket, bound) in BucketOrder::new(measure, q, self.length as u32) {
                if heap.is_full() && heap.min().map_or(false, |min| bound <= min) {
                    break;
                }
                let n = self.scan_bucket(src, bucket, query, q, measure, &mut scratch, &mut |id, s| {
                    heap.offer(id, s);
                })?;
                if n > 0 {
                    stats.checked += n;
                    stats.buckets += 1;
                }
            }
        }

        self.last_checked.store(stats.checked, Ordering::Relaxed);
        debug!(
            "top-{} (popcount {}): checked {}/{} fingerprints in {} buckets, {} us",
            k,
            q,
            stats.checked,
            self.size(),
            stats.buckets,
            ins.elapsed().as_micros()
        );
        Ok((heap.into_sorted_vec(), stats))
    }

    fn search_threshold<M, F>(
        &self,
        query: &BitVector,
        threshold: f64,
        measure: &M,
        cancel: Option<&AtomicBool>,
        emit: &mut F,
    ) -> Result<SearchStats>
    where
        M: Measure + ?Sized,
        F: FnMut(u32, f64),
    {
        let src = self.source()?;
        self.check_query(query)?;

        let ins = time::Instant::now();
        let q = query.popcount();
        let mut stats = SearchStats::default();
        let mut scratch = vec![0u64; self.length / WORD_BITS];

        for (bucket, bound) in BucketOrder::new(measure, q, self.length as u32) {
            if bound < threshold {
                break;
            }
            check_cancel(cancel)?;
            let n = self.scan_bucket(src, bucket, query, q, measure, &mut scratch, &mut |id, s| {
                if s >= threshold {
                    emit(id, s);
                }
            })?;
            if n > 0 {
                stats.checked += n;
                stats.buckets += 1;
            }
        }

        self.last_checked.store(stats.checked, Ordering::Relaxed);
        debug!(
            "threshold {} (popcount {}): checked {}/{} fingerprints in {} buckets, {} us",
            threshold,
            q,
            stats.checked,
            self.size(),
            stats.buckets,
            ins.elapsed().as_micros()
        );
        Ok(stats)
    }

    /// Scores every fingerprint of popcount `bucket` against the query.
    /// Returns the number scored, or `CorruptIndex` if a stored fingerprint
    /// does not belong to the bucket.
    #[allow(clippy::too_many_arguments)]
    fn scan_bucket<M, F>(
        &self,
        src: &dyn PayloadSource,
        bucket: u32,
        query: &BitVector,
        q: u32,
        measure: &M,
        scratch: &mut [u64],
        f: &mut F,
    ) -> Result<u32>
    where
        M: Measure + ?Sized,
        F: FnMut(u32, f64),
    {
        let beg = self.offsets[bucket as usize];
        let end = self.offsets[bucket as usize + 1];
        if beg == end {
            return Ok(0);
        }

        let step = self.length / 8;
        let data = src.read(beg as usize * step, end as usize * step)?;
        for (i, chunk) in data.chunks_exact(step).enumerate() {
            let id = beg + i as u32;
            LittleEndian::read_u64_into(chunk, scratch);
            if popcnt_words(scratch) != bucket {
                return corrupt(format!(
                    "fingerprint {} is stored under popcount {}",
                    id, bucket
                ));
            }
            let both = popcnt_and(query.words(), scratch);
            f(id, score(measure, self.length, q, bucket, both));
        }
        Ok(end - beg)
    }
}
