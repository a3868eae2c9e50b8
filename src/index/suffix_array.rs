//! Plain suffix array index over the concatenated text.

use super::text::{
    build_text, check_symbols, index_symbols, resolve_position, sequence_starts, Positions, SENTINEL,
};
use super::{Cursor, DbIndex, Hit, IndexKind, SearchDirection};
use crate::bio::sequence::SequenceCollection;
use crate::{LambdaError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Suffix array construction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaAlgorithm {
    /// rust-bio's SA-IS construction
    #[default]
    Default,
    /// Prefix doubling with radix sorted rank pairs
    RadixSort,
}

impl FromStr for SaAlgorithm {
    type Err = LambdaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(SaAlgorithm::Default),
            "radixsort" => Ok(SaAlgorithm::RadixSort),
            other => Err(LambdaError::Config(format!(
                "unknown suffix array algorithm '{}' (expected default or radixsort)",
                other
            ))),
        }
    }
}

/// Build the suffix array of a sentinel separated text.
///
/// Every sentinel is a distinct symbol ordered by its position, so suffixes never compare
/// across sequence boundaries.
pub fn build_suffix_array(text: &[u8], algorithm: SaAlgorithm) -> Result<Vec<usize>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    match algorithm {
        SaAlgorithm::Default => Ok(::bio::data_structures::suffix_array::suffix_array(text)),
        SaAlgorithm::RadixSort => radix_sort_suffix_array(text),
    }
}

fn counting_sort(input: &[usize], keys: &[usize], buckets: usize, output: &mut [usize]) {
    let mut counts = vec![0usize; buckets + 1];
    for &i in input {
        counts[keys[i] + 1] += 1;
    }
    for b in 1..counts.len() {
        counts[b] += counts[b - 1];
    }
    for &i in input {
        let k = keys[i];
        output[counts[k]] = i;
        counts[k] += 1;
    }
}

fn radix_sort_suffix_array(text: &[u8]) -> Result<Vec<usize>> {
    let n = text.len();
    let oom = |_| LambdaError::OutOfMemory("sorting suffixes".to_string());
    let mut rank = Vec::new();
    rank.try_reserve_exact(n).map_err(oom)?;

    // sentinels rank below residues and among themselves by position
    let sentinels = text.iter().filter(|&&c| c == SENTINEL).count();
    let mut seen = 0;
    for &c in text {
        if c == SENTINEL {
            seen += 1;
            rank.push(seen);
        } else {
            rank.push(sentinels + 1 + c as usize);
        }
    }

    let mut sa: Vec<usize> = (0..n).collect();
    let mut tmp = vec![0usize; n];
    let mut second = vec![0usize; n];
    let mut next_rank = vec![0usize; n];
    let mut buckets = sentinels + 257;
    let mut k = 1;

    loop {
        for i in 0..n {
            second[i] = if i + k < n { rank[i + k] } else { 0 };
        }
        counting_sort(&sa, &second, buckets, &mut tmp);
        counting_sort(&tmp, &rank, buckets, &mut sa);

        next_rank[sa[0]] = 1;
        for w in 1..n {
            let (a, b) = (sa[w - 1], sa[w]);
            let same = rank[a] == rank[b] && second[a] == second[b];
            next_rank[b] = next_rank[a] + usize::from(!same);
        }
        std::mem::swap(&mut rank, &mut next_rank);
        if rank[sa[n - 1]] == n {
            break;
        }
        buckets = n + 1;
        k *= 2;
    }
    Ok(sa)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaIndex {
    text: Vec<u8>,
    sa: Positions,
    starts: Vec<u64>,
}

impl SaIndex {
    pub fn build(
        sequences: &SequenceCollection,
        residues: &[u8],
        width: u32,
        algorithm: SaAlgorithm,
    ) -> Result<Self> {
        check_symbols(sequences, &index_symbols(residues))?;
        let text = build_text(sequences, false)?;
        let raw = build_suffix_array(&text, algorithm)?;
        let sa = Positions::from_slice(width, &raw)?;
        Ok(Self {
            text,
            sa,
            starts: sequence_starts(sequences),
        })
    }

    pub fn positions(&self) -> &Positions {
        &self.sa
    }

    /// Split the stored text back into the indexed sequences.
    pub fn sequences(&self) -> Result<SequenceCollection> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(self.text.len() - self.starts.len())?;
        let mut offsets = Vec::with_capacity(self.starts.len() + 1);
        offsets.push(0);
        for part in self.text.split(|&c| c == SENTINEL).take(self.starts.len()) {
            buffer.extend_from_slice(part);
            offsets.push(buffer.len());
        }
        SequenceCollection::from_parts(buffer, offsets)
    }

    #[inline]
    fn symbol_at(&self, row: usize, depth: usize) -> u8 {
        let pos = self.sa.get(row) as usize + depth;
        // a suffix always ends in a sentinel before running off the text
        self.text.get(pos).copied().unwrap_or(SENTINEL)
    }
}

impl DbIndex for SaIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Sa
    }

    fn direction(&self) -> SearchDirection {
        SearchDirection::Forward
    }

    fn root(&self) -> Cursor {
        Cursor::new(0, self.sa.len())
    }

    fn extend(&self, cursor: &Cursor, symbol: u8) -> Option<Cursor> {
        if symbol == SENTINEL {
            return None;
        }
        let d = cursor.depth;
        let rows = cursor.lo..cursor.hi;
        // rows share the first `d` symbols and are sorted by the symbol at depth `d`
        let lo = cursor.lo + partition(rows.clone(), |r| self.symbol_at(r, d) < symbol);
        let hi = cursor.lo + partition(rows, |r| self.symbol_at(r, d) <= symbol);
        (lo < hi).then(|| Cursor {
            lo,
            hi,
            mirror_lo: 0,
            depth: d + 1,
        })
    }

    fn locate(&self, cursor: &Cursor) -> Vec<Hit> {
        (cursor.lo..cursor.hi)
            .map(|row| {
                let (subject, offset) = resolve_position(&self.starts, self.sa.get(row));
                Hit { subject, offset }
            })
            .collect()
    }

    fn num_sequences(&self) -> usize {
        self.starts.len()
    }

    fn text_len(&self) -> usize {
        self.text.len()
    }
}

/// Number of leading rows in `range` for which `pred` holds.
fn partition<F: Fn(usize) -> bool>(range: std::ops::Range<usize>, pred: F) -> usize {
    let (mut lo, mut hi) = (range.start, range.end);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo - range.start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::alphabet::{AMINO_ACID_SYMBOLS, DNA5_SYMBOLS};

    fn naive_suffix_array(text: &[u8]) -> Vec<usize> {
        // sentinel at position p compares as (0, p), residues as (1, byte)
        let key = |i: usize| -> Vec<(u8, usize)> {
            text[i..]
                .iter()
                .enumerate()
                .map(|(k, &c)| if c == SENTINEL { (0, i + k) } else { (1, c as usize) })
                .collect()
        };
        let mut sa: Vec<usize> = (0..text.len()).collect();
        sa.sort_by_key(|&i| key(i));
        sa
    }

    #[test]
    fn test_radixsort_matches_naive_order() {
        let text = b"ACGTACGA$GGA$A$CCCC$";
        assert_eq!(radix_sort_suffix_array(text).unwrap(), naive_suffix_array(text));
        let text = b"MKVLAAGHWQERT$AAGHW$";
        assert_eq!(radix_sort_suffix_array(text).unwrap(), naive_suffix_array(text));
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!("radixsort".parse::<SaAlgorithm>().unwrap(), SaAlgorithm::RadixSort);
        assert_eq!("Default".parse::<SaAlgorithm>().unwrap(), SaAlgorithm::Default);
        assert!("skew7".parse::<SaAlgorithm>().is_err());
    }

    fn find(index: &SaIndex, pattern: &[u8]) -> Vec<(usize, usize)> {
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
    fn test_both_algorithms_locate_the_same_hits() {
        let seqs: SequenceCollection = [&b"MKVLAAGHWQ"[..], &b"AAGHW"[..], &b"WQAAG"[..]]
            .into_iter()
            .collect();
        for algorithm in [SaAlgorithm::Default, SaAlgorithm::RadixSort] {
            let index = SaIndex::build(&seqs, AMINO_ACID_SYMBOLS, 32, algorithm).unwrap();
            assert_eq!(find(&index, b"AAG"), vec![(0, 4), (1, 0), (2, 2)]);
            assert_eq!(find(&index, b"WQ"), vec![(0, 8), (2, 0)]);
            assert_eq!(find(&index, b"GHWQ"), vec![(0, 6)]);
            assert!(find(&index, b"QA$").is_empty());
            assert!(find(&index, b"KK").is_empty());
        }
    }

    #[test]
    fn test_foreign_symbol_rejected() {
        let seqs: SequenceCollection = [&b"ACGT"[..], &b"A C"[..]].into_iter().collect();
        for algorithm in [SaAlgorithm::Default, SaAlgorithm::RadixSort] {
            assert!(matches!(
                SaIndex::build(&seqs, DNA5_SYMBOLS, 64, algorithm),
                Err(LambdaError::Index(_))
            ));
        }
    }

    #[test]
    fn test_sequences_round_trip() {
        let seqs: SequenceCollection = [&b"ACGT"[..], &b""[..], &b"GG"[..]].into_iter().collect();
        let index = SaIndex::build(&seqs, DNA5_SYMBOLS, 64, SaAlgorithm::RadixSort).unwrap();
        assert_eq!(index.sequences().unwrap(), seqs);
        assert_eq!(index.positions().width(), 64);
    }
}
