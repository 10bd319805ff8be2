//! Builds the on-disk index by counting-sorting fingerprints on popcount.
//!
//! ```text
//! u32            B = length + 1           number of popcount buckets
//! u32 x (B + 1)  offsets                  offsets[p] = #fingerprints with popcount < p
//! [u8; length/8] x offsets[B]             fingerprints, ascending popcount
//! ```
//!
//! Integers are little-endian, as are the words of each fingerprint. Within a
//! bucket, fingerprints keep their input order; a fingerprint's slot in the
//! payload is its index-space id.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

use crate::bitvec::{check_length, BitVector};
use crate::error::{Error, Result};
use crate::idmap::{id_path, IdMap};

/// Byte size of the header for `buckets` popcount buckets.
pub(crate) fn header_len(buckets: usize) -> usize {
    4 * (buckets + 2)
}

/// A serialized index and the input position of each slot.
pub struct BuiltIndex {
    pub bytes: Vec<u8>,
    /// `permutation[slot]` is the input position of the fingerprint stored in `slot`.
    pub permutation: Vec<u32>,
}

/// Collects fingerprints of one length and serializes them as an index.
pub struct IndexBuilder {
    length: usize,
    fingerprints: Vec<BitVector>,
    names: Vec<Option<String>>,
}

impl IndexBuilder {
    pub fn new(length: usize) -> Result<Self> {
        check_length(length)?;
        Ok(Self {
            length,
            fingerprints: Vec::new(),
            names: Vec::new(),
        })
    }

    pub fn from_fingerprints<I>(length: usize, fingerprints: I) -> Result<Self>
    where
        I: IntoIterator<Item = BitVector>,
    {
        let mut builder = Self::new(length)?;
        for fp in fingerprints {
            builder.push(fp)?;
        }
        Ok(builder)
    }

    pub fn push(&mut self, fp: BitVector) -> Result<()> {
        self.add(fp, None)
    }

    /// Adds a fingerprint labelled with an external identifier.
    pub fn push_with_id<S: Into<String>>(&mut self, fp: BitVector, name: S) -> Result<()> {
        self.add(fp, Some(name.into()))
    }

    fn add(&mut self, fp: BitVector, name: Option<String>) -> Result<()> {
        if fp.len() != self.length {
            return Err(Error::LengthMismatch {
                expected: self.length,
                found: fp.len(),
            });
        }
        if self.fingerprints.len() == u32::MAX as usize {
            let e = io::Error::new(
                io::ErrorKind::InvalidInput,
                "an index holds at most 2^32 - 1 fingerprints",
            );
            return Err(e.into());
        }
        self.fingerprints.push(fp);
        self.names.push(name);
        Ok(())
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Serializes the index. An empty builder gives a valid empty index.
    pub fn build(&self) -> BuiltIndex {
        let ins = time::Instant::now();

        let buckets = self.length + 1;
        let step = self.length / 8;
        let header = header_len(buckets);

        // Histogram, shifted by one so that offsets[0] stays zero.
        let pops: Vec<u32> = self.fingerprints.iter().map(|fp| fp.popcount()).collect();
        let mut offsets = vec![0u32; buckets + 1];
        for &p in &pops {
            offsets[p as usize + 1] += 1;
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }

        let total = self.fingerprints.len();
        let mut bytes = vec![0u8; header + step * total];
        LittleEndian::write_u32(&mut bytes[0..4], buckets as u32);
        LittleEndian::write_u32_into(&offsets, &mut bytes[4..header]);

        let mut cursor = offsets;
        let mut permutation = vec![0u32; total];
        for (n, (fp, &p)) in self.fingerprints.iter().zip(&pops).enumerate() {
            let slot = cursor[p as usize] as usize;
            cursor[p as usize] += 1;
            let beg = header + slot * step;
            fp.write_bytes(&mut bytes[beg..beg + step]);
            permutation[slot] = n as u32;
        }

        debug!(
            "Sorted {} fingerprints into {} buckets in {} ms",
            total,
            buckets,
            ins.elapsed().as_millis()
        );

        BuiltIndex { bytes, permutation }
    }

    /// Names in index-space order; unlabelled fingerprints get their input position.
    pub fn id_map(&self, permutation: &[u32]) -> Result<IdMap> {
        let names: Vec<String> = self
            .names
            .iter()
            .enumerate()
            .map(|(n, name)| name.clone().unwrap_or_else(|| n.to_string()))
            .collect();
        IdMap::from_permutation(&names, permutation)
    }

    /// Writes the index to `path`, and its id file next to it when any
    /// fingerprint was labelled. Returns the slot permutation.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u32>> {
        let path = path.as_ref();
        let built = self.build();

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&built.bytes)?;
        writer.flush()?;

        if self.names.iter().any(|n| n.is_some()) {
            self.id_map(&built.permutation)?.write(id_path(path))?;
        }

        info!(
            "Wrote index of {} fingerprints ({} bits) to {}",
            self.fingerprints.len(),
            self.length,
            path.display()
        );
        Ok(built.permutation)
    }
}

/// Stable sort of fingerprints by ascending popcount.
pub fn sort_by_popcount(fps: &[BitVector]) -> Vec<&BitVector> {
    let mut sorted: Vec<&BitVector> = fps.iter().collect();
    sorted.sort_by_key(|fp| fp.popcount());
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::io::Cursor;

    fn with_bits(bits: &[usize]) -> BitVector {
        let mut fp = BitVector::new(64).unwrap();
        for &b in bits {
            fp.set(b).unwrap();
        }
        fp
    }

    fn read_header(bytes: &[u8]) -> Vec<u32> {
        let mut rdr = Cursor::new(bytes);
        let buckets = rdr.read_u32::<byteorder::LittleEndian>().unwrap() as usize;
        (0..=buckets)
            .map(|_| rdr.read_u32::<byteorder::LittleEndian>().unwrap())
            .collect()
    }

    #[test]
    fn buckets_by_popcount() {
        let fps = vec![
            with_bits(&[0, 1, 2, 3, 4]),
            with_bits(&[5, 6]),
            with_bits(&[0, 1, 2, 3, 4, 5, 6, 7]),
            with_bits(&[9, 10]),
        ];
        let builder = IndexBuilder::from_fingerprints(64, fps.clone()).unwrap();
        let built = builder.build();

        let offsets = read_header(&built.bytes);
        assert_eq!(offsets.len(), 66);
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[2], 0);
        assert_eq!(offsets[3], 2);
        assert_eq!(offsets[5], 2);
        assert_eq!(offsets[6], 3);
        assert_eq!(offsets[8], 3);
        assert_eq!(offsets[9], 4);
        assert_eq!(offsets[65], 4);

        // popcount-2 fingerprints keep their input order
        assert_eq!(built.permutation, vec![1, 3, 0, 2]);

        let header = header_len(65);
        assert_eq!(built.bytes.len(), header + 4 * 8);
        for (slot, &n) in built.permutation.iter().enumerate() {
            let beg = header + slot * 8;
            assert_eq!(&built.bytes[beg..beg + 8], &fps[n as usize].to_bytes()[..]);
        }
    }

    #[test]
    fn all_ones_has_a_bucket() {
        let full = BitVector::from_words(&[u64::MAX], 64).unwrap();
        let builder = IndexBuilder::from_fingerprints(64, vec![full]).unwrap();
        let offsets = read_header(&builder.build().bytes);
        assert_eq!(offsets[64], 0);
        assert_eq!(offsets[65], 1);
    }

    #[test]
    fn empty_builds_valid_index() {
        let built = IndexBuilder::new(64).unwrap().build();
        assert_eq!(built.bytes.len(), header_len(65));
        assert!(built.permutation.is_empty());
        assert!(read_header(&built.bytes).iter().all(|&c| c == 0));
    }

    #[test]
    fn rejects_mixed_lengths() {
        let mut builder = IndexBuilder::new(64).unwrap();
        builder.push(BitVector::new(64).unwrap()).unwrap();
        assert!(matches!(
            builder.push(BitVector::new(128).unwrap()),
            Err(Error::LengthMismatch { expected: 64, found: 128 })
        ));
        assert_eq!(builder.len(), 1);
        assert!(IndexBuilder::new(65).is_err());
    }

    #[test]
    fn build_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(42);
        let fps: Vec<BitVector> = (0..200)
            .map(|_| BitVector::from_words(&[rng.gen(), rng.gen()], 128).unwrap())
            .collect();
        let a = IndexBuilder::from_fingerprints(128, fps.clone()).unwrap().build();
        let b = IndexBuilder::from_fingerprints(128, fps).unwrap().build();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.permutation, b.permutation);
    }

    #[test]
    fn id_map_follows_permutation() {
        let mut builder = IndexBuilder::new(64).unwrap();
        builder.push_with_id(with_bits(&[1, 2, 3]), "three").unwrap();
        builder.push(with_bits(&[1])).unwrap();
        builder.push_with_id(with_bits(&[1, 2]), "two").unwrap();
        let built = builder.build();
        let map = builder.id_map(&built.permutation).unwrap();
        assert_eq!(map.iter().collect::<Vec<_>>(), vec!["1", "two", "three"]);
    }

    #[test]
    fn sort_is_stable() {
        let fps = vec![with_bits(&[1, 2]), with_bits(&[3]), with_bits(&[4, 5])];
        let sorted = sort_by_popcount(&fps);
        assert_eq!(sorted, vec![&fps[1], &fps[0], &fps[2]]);
    }
}
