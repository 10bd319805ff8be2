//! Companion file mapping index-space ids back to external identifiers.
//!
//! One line per id, in id order. Lines are written as `id\tname`; on read a
//! bare `name` line is accepted too.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

/// External identifiers ordered by index-space id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    names: Vec<String>,
}

/// Path of the id file that accompanies the index at `index_path`.
pub fn id_path<P: AsRef<Path>>(index_path: P) -> PathBuf {
    let mut s = index_path.as_ref().as_os_str().to_owned();
    s.push(".id");
    PathBuf::from(s)
}

impl IdMap {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Reorders `names`, given in input order, into index-space order.
    /// `permutation[slot]` is the input position that landed in `slot`.
    pub fn from_permutation(names: &[String], permutation: &[u32]) -> Result<Self> {
        let names = permutation
            .iter()
            .map(|&n| {
                names.get(n as usize).cloned().ok_or(Error::OutOfRange {
                    index: n as usize,
                    length: names.len(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut names = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let name = match line.split_once('\t') {
                Some((slot, name)) => {
                    if slot.parse::<usize>().ok() != Some(names.len()) {
                        return Err(Error::CorruptIndex(format!(
                            "id file line {} is labelled {:?}",
                            names.len(),
                            slot
                        )));
                    }
                    name.to_string()
                }
                None => line,
            };
            names.push(name);
        }
        info!("Loaded {} ids from {}", names.len(), path.as_ref().display());
        Ok(Self { names })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for (slot, name) in self.names.iter().enumerate() {
            writeln!(writer, "{}\t{}", slot, name)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn permutation_reorders() {
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let map = IdMap::from_permutation(&names, &[2, 0, 1]).unwrap();
        assert_eq!(map.iter().collect::<Vec<_>>(), vec!["c", "a", "b"]);
        assert_eq!(map.get(1), Some("a"));
        assert_eq!(map.get(3), None);
    }

    #[test]
    fn permutation_out_of_range() {
        let names: Vec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert!(matches!(
            IdMap::from_permutation(&names, &[1, 2]),
            Err(Error::OutOfRange { index: 2, length: 2 })
        ));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fps.idx.id");
        let map = IdMap::new(vec!["CHEMBL25".to_string(), "with space".to_string()]);
        map.write(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\tCHEMBL25\n1\twith space\n");
        assert_eq!(IdMap::load(&path).unwrap(), map);
    }

    #[test]
    fn accepts_bare_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names");
        fs::write(&path, "x\ny\n").unwrap();
        let map = IdMap::load(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1), Some("y"));
    }

    #[test]
    fn rejects_misnumbered_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad");
        fs::write(&path, "0\tx\n2\ty\n").unwrap();
        assert!(matches!(IdMap::load(&path), Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn id_path_appends_suffix() {
        assert_eq!(id_path("/tmp/fps.idx"), PathBuf::from("/tmp/fps.idx.id"));
    }
}
