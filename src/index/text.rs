//! Concatenated index text and fixed-width position storage.

use crate::bio::sequence::SequenceCollection;
use crate::{LambdaError, Result};
use serde::{Deserialize, Serialize};

/// Terminates every sequence in the index text; sorts below all residues.
pub const SENTINEL: u8 = b'$';

/// Fail iff a text of `length` symbols cannot be addressed with `width`-bit positions.
pub fn check_index_size(length: u64, width: u32) -> Result<()> {
    let max = if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    if length > max {
        return Err(LambdaError::IndexTooLarge { length, width });
    }
    Ok(())
}

/// Sorted symbol set of an index over `residues`, sentinel included.
pub fn index_symbols(residues: &[u8]) -> Vec<u8> {
    let mut symbols = vec![SENTINEL];
    symbols.extend_from_slice(residues);
    symbols.sort_unstable();
    symbols.dedup();
    symbols
}

/// Reject any residue outside `symbols`. Must run before suffix sorting, which relies on
/// the sentinel being the smallest symbol of the text.
pub fn check_symbols(sequences: &SequenceCollection, symbols: &[u8]) -> Result<()> {
    for (i, seq) in sequences.iter().enumerate() {
        if let Some(&c) = seq
            .iter()
            .find(|&&c| c == SENTINEL || symbols.binary_search(&c).is_err())
        {
            return Err(LambdaError::Index(format!(
                "symbol '{}' of sequence {} is not part of the index alphabet",
                c.escape_ascii(),
                i
            )));
        }
    }
    Ok(())
}

/// Number of symbols in the index text of a collection (residues plus one sentinel each).
pub fn text_length(sequences: &SequenceCollection) -> u64 {
    (sequences.total_len() + sequences.len()) as u64
}

/// Concatenate all sequences, each followed by [`SENTINEL`]. With `reverse_each` every
/// sequence is reversed in place while the sequence order is kept.
pub fn build_text(sequences: &SequenceCollection, reverse_each: bool) -> Result<Vec<u8>> {
    let mut text = Vec::new();
    text.try_reserve_exact(sequences.total_len() + sequences.len())
        .map_err(|_| LambdaError::OutOfMemory("building the index text".to_string()))?;
    for seq in sequences.iter() {
        if reverse_each {
            text.extend(seq.iter().rev());
        } else {
            text.extend_from_slice(seq);
        }
        text.push(SENTINEL);
    }
    Ok(text)
}

/// Start offset of every sequence inside the index text.
pub fn sequence_starts(sequences: &SequenceCollection) -> Vec<u64> {
    sequences
        .offsets()
        .iter()
        .take(sequences.len())
        .enumerate()
        .map(|(i, &o)| (o + i) as u64)
        .collect()
}

/// Map a text position to `(sequence, offset)` given the sequence starts.
#[inline]
pub fn resolve_position(starts: &[u64], pos: u64) -> (usize, usize) {
    let seq = starts.partition_point(|&s| s <= pos) - 1;
    (seq, (pos - starts[seq]) as usize)
}

/// Suffix array or sample positions stored at the index's position width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Positions {
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl Positions {
    pub fn with_width(width: u32, capacity: usize) -> Result<Self> {
        let err = |_| LambdaError::OutOfMemory("allocating suffix array positions".to_string());
        Ok(match width {
            32 => {
                let mut v = Vec::new();
                v.try_reserve_exact(capacity).map_err(err)?;
                Positions::U32(v)
            }
            64 => {
                let mut v = Vec::new();
                v.try_reserve_exact(capacity).map_err(err)?;
                Positions::U64(v)
            }
            other => {
                return Err(LambdaError::Index(format!(
                    "unsupported position width {}",
                    other
                )))
            }
        })
    }

    pub fn from_slice(width: u32, values: &[usize]) -> Result<Self> {
        let mut positions = Self::with_width(width, values.len())?;
        for &v in values {
            positions.push(v as u64)?;
        }
        Ok(positions)
    }

    pub fn push(&mut self, value: u64) -> Result<()> {
        match self {
            Positions::U32(v) => {
                let value = u32::try_from(value)
                    .map_err(|_| LambdaError::IndexTooLarge { length: value, width: 32 })?;
                v.push(value);
            }
            Positions::U64(v) => v.push(value),
        }
        Ok(())
    }

    #[inline]
    pub fn get(&self, i: usize) -> u64 {
        match self {
            Positions::U32(v) => v[i] as u64,
            Positions::U64(v) => v[i],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Positions::U32(v) => v.len(),
            Positions::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> u32 {
        match self {
            Positions::U32(_) => 32,
            Positions::U64(_) => 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_index_size_boundary() {
        assert!(check_index_size((1u64 << 32) - 1, 32).is_ok());
        assert!(matches!(
            check_index_size(1u64 << 32, 32),
            Err(LambdaError::IndexTooLarge { width: 32, .. })
        ));
        assert!(check_index_size(255, 8).is_ok());
        assert!(check_index_size(256, 8).is_err());
        assert!(check_index_size(u64::MAX, 64).is_ok());
    }

    #[test]
    fn test_build_text() {
        let seqs: SequenceCollection = [&b"ACG"[..], &b"TT"[..]].into_iter().collect();
        assert_eq!(build_text(&seqs, false).unwrap(), b"ACG$TT$");
        assert_eq!(build_text(&seqs, true).unwrap(), b"GCA$TT$");
        assert_eq!(text_length(&seqs), 7);
        assert_eq!(sequence_starts(&seqs), vec![0, 4]);
    }

    #[test]
    fn test_check_symbols() {
        let symbols = index_symbols(b"TGCA");
        assert_eq!(symbols, b"$ACGT");
        let seqs: SequenceCollection = [&b"ACG"[..], &b"TT"[..]].into_iter().collect();
        assert!(check_symbols(&seqs, &symbols).is_ok());
        for bad in [&b"AC#T"[..], &b"AC$T"[..], &b"ACNT"[..]] {
            let seqs: SequenceCollection = [&b"GG"[..], bad].into_iter().collect();
            assert!(matches!(check_symbols(&seqs, &symbols), Err(LambdaError::Index(_))));
        }
    }

    #[test]
    fn test_resolve_position() {
        let starts = vec![0, 4, 5, 9];
        assert_eq!(resolve_position(&starts, 0), (0, 0));
        assert_eq!(resolve_position(&starts, 3), (0, 3));
        assert_eq!(resolve_position(&starts, 4), (1, 0));
        // sequence 1 is empty, only its sentinel sits at 4
        assert_eq!(resolve_position(&starts, 6), (2, 1));
        assert_eq!(resolve_position(&starts, 9), (3, 0));
    }

    #[test]
    fn test_positions_width() {
        let mut p = Positions::with_width(32, 2).unwrap();
        p.push(7).unwrap();
        assert!(p.push(u64::from(u32::MAX) + 1).is_err());
        assert_eq!(p.get(0), 7);
        assert_eq!(p.width(), 32);
        assert!(Positions::with_width(16, 0).is_err());
    }
}
