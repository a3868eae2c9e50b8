//! Seed extraction from query blocks and backtracking search of single seeds.

use crate::bio::sequence::SequenceCollection;
use crate::index::{Cursor, DbIndex, SearchDirection};
use crate::Result;
use std::ops::Range;

/// A seed: query slot and start position inside that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Seed {
    pub slot: u32,
    pub pos: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SeedShape {
    pub length: usize,
    pub offset: usize,
    /// Seeds containing this symbol are not generated
    pub wildcard: Option<u8>,
}

/// Seeds every `offset` positions in the given query slots.
pub fn generate_seeds(
    queries: &SequenceCollection,
    slots: Range<usize>,
    shape: &SeedShape,
    out: &mut Vec<Seed>,
) -> Result<()> {
    let estimate: usize = slots
        .clone()
        .map(|s| queries.seq_len(s).saturating_sub(shape.length) / shape.offset + 1)
        .sum();
    out.try_reserve(estimate)?;

    for slot in slots {
        let seq = queries.get(slot);
        if seq.len() < shape.length {
            continue;
        }
        let mut pos = 0;
        while pos + shape.length <= seq.len() {
            let window = &seq[pos..pos + shape.length];
            if shape.wildcard.map_or(true, |w| !window.contains(&w)) {
                out.push(Seed {
                    slot: slot as u32,
                    pos: pos as u32,
                });
            }
            pos += shape.offset;
        }
    }
    Ok(())
}

/// Seed symbols in the order the index consumes them.
pub fn oriented(window: &[u8], direction: SearchDirection) -> Vec<u8> {
    match direction {
        SearchDirection::Forward => window.to_vec(),
        SearchDirection::Backward => window.iter().rev().copied().collect(),
    }
}

/// Search `pattern` (already oriented) allowing up to `delta` substitutions from `alphabet`.
///
/// Every complete match interval is passed to `found`.
pub fn search_pattern<F: FnMut(&Cursor)>(
    index: &dyn DbIndex,
    pattern: &[u8],
    alphabet: &[u8],
    delta: usize,
    found: &mut F,
) {
    descend(index, pattern, alphabet, delta, index.root(), 0, found);
}

fn descend<F: FnMut(&Cursor)>(
    index: &dyn DbIndex,
    pattern: &[u8],
    alphabet: &[u8],
    delta: usize,
    cursor: Cursor,
    errors: usize,
    found: &mut F,
) {
    let depth = cursor.depth;
    if depth == pattern.len() {
        found(&cursor);
        return;
    }
    let expected = pattern[depth];
    if let Some(next) = index.extend(&cursor, expected) {
        descend(index, pattern, alphabet, delta, next, errors, found);
    }
    if errors < delta {
        for &c in alphabet.iter().filter(|&&c| c != expected) {
            if let Some(next) = index.extend(&cursor, c) {
                descend(index, pattern, alphabet, delta, next, errors + 1, found);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::alphabet::DNA5_SYMBOLS;
    use crate::index::{FmIndex, FmSampling, SaAlgorithm, SaIndex};

    fn queries() -> SequenceCollection {
        [&b"ACGTACGTAC"[..], &b"ACG"[..], &b"NNACGTA"[..]].into_iter().collect()
    }

    #[test]
    fn test_seed_positions() {
        let shape = SeedShape {
            length: 4,
            offset: 3,
            wildcard: Some(b'N'),
        };
        let mut seeds = Vec::new();
        generate_seeds(&queries(), 0..3, &shape, &mut seeds).unwrap();
        let got: Vec<(u32, u32)> = seeds.iter().map(|s| (s.slot, s.pos)).collect();
        // slot 1 is too short, slot 2 loses the seeds overlapping N
        assert_eq!(got, vec![(0, 0), (0, 3), (0, 6), (2, 3)]);
    }

    #[test]
    fn test_backtracking_finds_substitutions() {
        let subjects: SequenceCollection = [&b"ACGTTGCA"[..]].into_iter().collect();
        let sa = SaIndex::build(&subjects, DNA5_SYMBOLS, 64, SaAlgorithm::Default).unwrap();
        let fm = FmIndex::build(&subjects, DNA5_SYMBOLS, 64, FmSampling::default(), false).unwrap();

        for index in [&sa as &dyn DbIndex, &fm as &dyn DbIndex] {
            let pattern = oriented(b"ACCT", index.direction());
            let mut exact = Vec::new();
            search_pattern(index, &pattern, DNA5_SYMBOLS, 0, &mut |c| exact.extend(index.locate(c)));
            assert!(exact.is_empty());

            let mut fuzzy = Vec::new();
            search_pattern(index, &pattern, DNA5_SYMBOLS, 1, &mut |c| fuzzy.extend(index.locate(c)));
            assert_eq!(fuzzy.len(), 1);
            assert_eq!((fuzzy[0].subject, fuzzy[0].offset), (0, 0));
        }
    }
}
