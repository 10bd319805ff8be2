//! Backing stores for the fingerprint payload of a loaded index.

use std::fs::File;
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use memmap2::{Mmap, MmapOptions};

use crate::error::{Error, Result};

/// Bytes of a payload range, either borrowed from the source or a shared mapping.
pub enum Payload<'a> {
    Borrowed(&'a [u8]),
    Mapped(Arc<Mmap>),
}

impl Deref for Payload<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Payload::Borrowed(data) => data,
            Payload::Mapped(mmap) => &mmap[..],
        }
    }
}

/// Random-access, read-only byte source over the payload region.
///
/// Offsets are relative to the start of the payload.
pub trait PayloadSource: Send + Sync {
    fn read(&self, beg: usize, end: usize) -> Result<Payload<'_>>;

    fn name(&self) -> &'static str;
}

fn check_range(beg: usize, end: usize, len: usize) -> Result<()> {
    if beg > end || end > len {
        return Err(Error::CorruptIndex(format!(
            "payload range {}..{} outside of {} bytes",
            beg, end, len
        )));
    }
    Ok(())
}

/// Payload held in memory.
pub struct MemorySource {
    data: Vec<u8>,
    offset: usize,
}

impl MemorySource {
    /// `data` is the whole index; the payload starts at `offset`.
    pub fn new(data: Vec<u8>, offset: usize) -> Self {
        Self { data, offset }
    }
}

impl PayloadSource for MemorySource {
    fn read(&self, beg: usize, end: usize) -> Result<Payload<'_>> {
        let payload = &self.data[self.offset..];
        check_range(beg, end, payload.len())?;
        Ok(Payload::Borrowed(&payload[beg..end]))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// The whole index file mapped read-only once.
pub struct MmapSource {
    mmap: Mmap,
    offset: usize,
}

impl MmapSource {
    pub fn new(file: &File, offset: usize) -> Result<Self> {
        let mmap = unsafe { MmapOptions::new().map(file)? };
        Ok(Self { mmap, offset })
    }
}

impl PayloadSource for MmapSource {
    fn read(&self, beg: usize, end: usize) -> Result<Payload<'_>> {
        let payload = &self.mmap[self.offset..];
        check_range(beg, end, payload.len())?;
        Ok(Payload::Borrowed(&payload[beg..end]))
    }

    fn name(&self) -> &'static str {
        "mmap"
    }
}

/// Maps payload ranges on first use and keeps the most recent ones in an LRU cache.
///
/// Meant for indices too large to map in one piece.
pub struct ChunkedSource {
    file: File,
    offset: u64,
    len: usize,
    cache: Mutex<LruCache<(usize, usize), Arc<Mmap>>>,
}

impl ChunkedSource {
    pub fn new(file: File, offset: usize, len: usize, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            Error::InvalidOptions("chunk cache capacity must be positive".to_string())
        })?;
        Ok(Self {
            file,
            offset: offset as u64,
            len,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }
}

impl PayloadSource for ChunkedSource {
    fn read(&self, beg: usize, end: usize) -> Result<Payload<'_>> {
        check_range(beg, end, self.len)?;
        if beg == end {
            return Ok(Payload::Borrowed(&[]));
        }

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mmap) = cache.get(&(beg, end)) {
            return Ok(Payload::Mapped(Arc::clone(mmap)));
        }
        let mmap = unsafe {
            MmapOptions::new()
                .offset(self.offset + beg as u64)
                .len(end - beg)
                .map(&self.file)?
        };
        let mmap = Arc::new(mmap);
        cache.put((beg, end), Arc::clone(&mmap));
        Ok(Payload::Mapped(mmap))
    }

    fn name(&self) -> &'static str {
        "chunked"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(data: &[u8]) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(data).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn sources_agree() {
        let data: Vec<u8> = (0..=255u8).collect();
        let tmp = temp_file(&data);

        let sources: Vec<Box<dyn PayloadSource>> = vec![
            Box::new(MemorySource::new(data.clone(), 16)),
            Box::new(MmapSource::new(tmp.as_file(), 16).unwrap()),
            Box::new(ChunkedSource::new(tmp.reopen().unwrap(), 16, 240, 2).unwrap()),
        ];
        for src in &sources {
            for &(beg, end) in &[(0, 8), (8, 40), (100, 240), (5, 5), (0, 8)] {
                let got = src.read(beg, end).unwrap();
                assert_eq!(&got[..], &data[16 + beg..16 + end], "{}", src.name());
            }
            assert!(matches!(src.read(0, 241), Err(Error::CorruptIndex(_))));
        }
    }

    #[test]
    fn chunked_rejects_zero_capacity() {
        let tmp = temp_file(&[0; 8]);
        assert!(matches!(
            ChunkedSource::new(tmp.reopen().unwrap(), 0, 8, 0),
            Err(Error::InvalidOptions(_))
        ));
    }
}
