//! Bidirectional FM index: one FM index over the per-sequence reversed text and one over the
//! forward text, kept in sync so that seeds can be extended to the right.

use super::fm_index::FmIndex;
use super::{Cursor, DbIndex, Hit, IndexKind, SearchDirection};
use crate::{LambdaError, Result};

#[derive(Debug)]
pub struct BiFmIndex {
    rev: FmIndex,
    fwd: FmIndex,
}

impl BiFmIndex {
    /// Pair two independently built sub-indexes, checking that they describe the same text.
    pub fn from_parts(rev: FmIndex, fwd: FmIndex) -> Result<Self> {
        if rev.len() != fwd.len() || rev.starts() != fwd.starts() || rev.symbols() != fwd.symbols() {
            return Err(LambdaError::Index(
                "the reverse and forward sub-indexes do not belong together".to_string(),
            ));
        }
        Ok(Self { rev, fwd })
    }

    pub fn reverse(&self) -> &FmIndex {
        &self.rev
    }

    pub fn forward(&self) -> &FmIndex {
        &self.fwd
    }
}

impl DbIndex for BiFmIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::BiFm
    }

    fn direction(&self) -> SearchDirection {
        SearchDirection::Forward
    }

    fn root(&self) -> Cursor {
        Cursor::new(0, self.rev.len())
    }

    /// Append `symbol` to the right of the current pattern.
    ///
    /// The reversed pattern is extended backwards in the reverse index; the forward interval
    /// moves by the number of occurrences followed by a smaller symbol.
    fn extend(&self, cursor: &Cursor, symbol: u8) -> Option<Cursor> {
        let (lo, hi) = self.rev.backward(cursor.lo, cursor.hi, symbol)?;
        let mirror_lo = cursor.mirror_lo + self.rev.smaller_in(cursor.lo, cursor.hi, symbol);
        Some(Cursor {
            lo,
            hi,
            mirror_lo,
            depth: cursor.depth + 1,
        })
    }

    fn locate(&self, cursor: &Cursor) -> Vec<Hit> {
        self.fwd
            .locate_rows(cursor.mirror_lo, cursor.mirror_lo + (cursor.hi - cursor.lo))
    }

    fn num_sequences(&self) -> usize {
        self.fwd.starts().len()
    }

    fn text_len(&self) -> usize {
        self.fwd.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::alphabet::DNA5_SYMBOLS;
    use crate::bio::sequence::SequenceCollection;
    use crate::index::fm_index::FmSampling;

    fn build(seqs: &SequenceCollection) -> BiFmIndex {
        let sampling = FmSampling { occ: 4, sa: 3 };
        let rev = FmIndex::build(seqs, DNA5_SYMBOLS, 64, sampling, true).unwrap();
        let fwd = FmIndex::build(seqs, DNA5_SYMBOLS, 64, sampling, false).unwrap();
        BiFmIndex::from_parts(rev, fwd).unwrap()
    }

    fn find(index: &BiFmIndex, pattern: &[u8]) -> Vec<(usize, usize)> {
        let mut cursor = index.root();
        for &c in pattern {
            match index.extend(&cursor, c) {
                Some(next) => cursor = next,
                None => return Vec::new(),
            }
        }
        let mut hits: Vec<_> = index.locate(&cursor).into_iter().map(|h| (h.subject, h.offset)).collect();
        hits.sort_unstable();
        hits
    }

    #[test]
    fn test_forward_extension_locates_pattern_starts() {
        let seqs: SequenceCollection = [&b"ACGTACGTTG"[..], &b"GTACG"[..], &b"TTGAC"[..]]
            .into_iter()
            .collect();
        let index = build(&seqs);
        assert_eq!(find(&index, b"ACG"), vec![(0, 0), (0, 4), (1, 2)]);
        assert_eq!(find(&index, b"TTG"), vec![(0, 7), (2, 0)]);
        assert_eq!(find(&index, b"GTACG"), vec![(0, 2), (1, 0)]);
        assert_eq!(find(&index, b"G"), vec![(0, 2), (0, 6), (0, 9), (1, 0), (1, 4), (2, 2)]);
        assert!(find(&index, b"CC").is_empty());
    }

    #[test]
    fn test_reverse_hits_agree_with_forward() {
        let seqs: SequenceCollection = [&b"ACGTACGTTG"[..], &b"GTACG"[..]].into_iter().collect();
        let index = build(&seqs);
        let pattern = b"TACG";
        let mut cursor = index.root();
        for &c in pattern {
            cursor = index.extend(&cursor, c).unwrap();
        }
        let mut from_rev: Vec<(usize, usize)> = index
            .reverse()
            .locate_rows(cursor.lo, cursor.hi)
            .into_iter()
            .map(|h| (h.subject, seqs.seq_len(h.subject) - h.offset - pattern.len()))
            .collect();
        from_rev.sort_unstable();
        assert_eq!(from_rev, find(&index, pattern));
    }

    #[test]
    fn test_mismatched_parts_rejected() {
        let a: SequenceCollection = [&b"ACGT"[..]].into_iter().collect();
        let b: SequenceCollection = [&b"ACGTA"[..]].into_iter().collect();
        let sampling = FmSampling::default();
        let rev = FmIndex::build(&a, DNA5_SYMBOLS, 64, sampling, true).unwrap();
        let fwd = FmIndex::build(&b, DNA5_SYMBOLS, 64, sampling, false).unwrap();
        assert!(BiFmIndex::from_parts(rev, fwd).is_err());
    }
}
