//! Searchable subject indexes and their on-disk layout.

pub mod bidirectional;
pub mod builder;
pub mod fm_index;
pub mod manifest;
pub mod suffix_array;
pub mod text;

pub use bidirectional::BiFmIndex;
pub use builder::{build_index, IndexSummary};
pub use fm_index::{FmIndex, FmSampling};
pub use manifest::Manifest;
pub use suffix_array::{SaAlgorithm, SaIndex};
pub use text::check_index_size;

use crate::{LambdaError, Result, INDEX_GENERATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

pub const SEQ_IDS_FILE: &str = "seq_ids";
pub const SEQS_FILE: &str = "seqs";
pub const UNTRANSLATED_LENGTHS_FILE: &str = "untranslated_seq_lengths";
pub const SA_FILE: &str = "index.sa";
pub const FM_FILE: &str = "index.fm";
pub const REV_FM_FILE: &str = "index.rev.fm";
pub const FWD_FM_FILE: &str = "index.fwd.fm";
pub const STAXIDS_FILE: &str = "staxids";
pub const TAX_TREE_FILE: &str = "tax_tree";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    Sa = 0,
    Fm = 1,
    BiFm = 2,
}

impl IndexKind {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(IndexKind::Sa),
            1 => Some(IndexKind::Fm),
            2 => Some(IndexKind::BiFm),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Sa => "sa",
            IndexKind::Fm => "fm",
            IndexKind::BiFm => "bifm",
        }
    }

    /// Whether the index keeps a plain copy of the text it was built from.
    pub fn stores_text(&self) -> bool {
        matches!(self, IndexKind::Sa)
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = LambdaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sa" => Ok(IndexKind::Sa),
            "fm" => Ok(IndexKind::Fm),
            "bifm" | "bi_fm" => Ok(IndexKind::BiFm),
            other => Err(LambdaError::Config(format!(
                "unknown index type '{}' (expected sa, fm or bifm)",
                other
            ))),
        }
    }
}

/// Order in which an index consumes the symbols of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// First symbol first
    Forward,
    /// Last symbol first
    Backward,
}

/// A range of index rows matching the pattern consumed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub lo: usize,
    pub hi: usize,
    /// Start of the same interval in the mirrored sub-index (bidirectional only)
    pub mirror_lo: usize,
    pub depth: usize,
}

impl Cursor {
    pub fn new(lo: usize, hi: usize) -> Self {
        Self {
            lo,
            hi,
            mirror_lo: 0,
            depth: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.hi - self.lo
    }
}

/// Occurrence of a pattern: subject rank and offset of the pattern start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hit {
    pub subject: usize,
    pub offset: usize,
}

/// Common search interface of the three index variants.
pub trait DbIndex: Send + Sync {
    fn kind(&self) -> IndexKind;
    fn direction(&self) -> SearchDirection;
    fn root(&self) -> Cursor;
    /// Consume one more pattern symbol in [`DbIndex::direction`] order.
    fn extend(&self, cursor: &Cursor, symbol: u8) -> Option<Cursor>;
    fn locate(&self, cursor: &Cursor) -> Vec<Hit>;
    fn num_sequences(&self) -> usize;
    fn text_len(&self) -> usize;
}

/// Write `value` with a leading generation tag.
pub fn save_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &INDEX_GENERATION)?;
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

pub fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        LambdaError::Index(format!("cannot open {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);
    let generation: u64 = bincode::deserialize_from(&mut reader)?;
    if generation != INDEX_GENERATION {
        return Err(LambdaError::IncompatibleIndex(format!(
            "{} was written by index generation {}, this build reads generation {}",
            path.display(),
            generation,
            INDEX_GENERATION
        )));
    }
    Ok(bincode::deserialize_from(&mut reader)?)
}

/// Load the index structure named by `kind` from an index directory.
pub fn load_index(dir: &Path, kind: IndexKind) -> Result<Box<dyn DbIndex>> {
    Ok(match kind {
        IndexKind::Sa => Box::new(load_bincode::<SaIndex>(&dir.join(SA_FILE))?),
        IndexKind::Fm => Box::new(load_bincode::<FmIndex>(&dir.join(FM_FILE))?),
        IndexKind::BiFm => {
            let rev = load_bincode::<FmIndex>(&dir.join(REV_FM_FILE))?;
            let fwd = load_bincode::<FmIndex>(&dir.join(FWD_FM_FILE))?;
            Box::new(BiFmIndex::from_parts(rev, fwd)?)
        }
    })
}

/// Files of `kind` inside an index directory.
pub fn index_files(kind: IndexKind) -> &'static [&'static str] {
    match kind {
        IndexKind::Sa => &[SA_FILE],
        IndexKind::Fm => &[FM_FILE],
        IndexKind::BiFm => &[REV_FM_FILE, FWD_FM_FILE],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_index_kind_codes() {
        for kind in [IndexKind::Sa, IndexKind::Fm, IndexKind::BiFm] {
            assert_eq!(IndexKind::from_code(kind.code()), Some(kind));
            assert_eq!(kind.name().parse::<IndexKind>().unwrap(), kind);
        }
        assert_eq!(IndexKind::from_code(3), None);
        assert!("bwt".parse::<IndexKind>().is_err());
    }

    #[test]
    fn test_bincode_generation_checked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("values");
        save_bincode(&path, &vec![1u64, 2, 3]).unwrap();
        let back: Vec<u64> = load_bincode(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);

        let mut writer = File::create(&path).unwrap();
        bincode::serialize_into(&mut writer, &(INDEX_GENERATION + 1)).unwrap();
        bincode::serialize_into(&mut writer, &vec![1u64]).unwrap();
        drop(writer);
        assert!(matches!(
            load_bincode::<Vec<u64>>(&path),
            Err(LambdaError::IncompatibleIndex(_))
        ));
    }
}
