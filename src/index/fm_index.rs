//! FM self-index over the concatenated text, with a sampled suffix array for locating.

use super::suffix_array::{build_suffix_array, SaAlgorithm};
use super::text::{
    build_text, check_symbols, index_symbols, resolve_position, sequence_starts, Positions, SENTINEL,
};
use super::{Cursor, DbIndex, Hit, IndexKind, SearchDirection};
use crate::bio::sequence::SequenceCollection;
use crate::{LambdaError, Result};
use ::bio::alphabets::Alphabet as SymbolSet;
use ::bio::data_structures::bwt::{bwt, less, Occ};
use bit_vec::BitVec;
use serde::{Deserialize, Serialize};

/// Sampling rates of the FM index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmSampling {
    /// Every `occ`-th BWT row keeps an occurrence checkpoint
    pub occ: u32,
    /// Every `sa`-th text position keeps its suffix array value
    pub sa: usize,
}

impl Default for FmSampling {
    fn default() -> Self {
        Self { occ: 32, sa: 10 }
    }
}

#[derive(Serialize, Deserialize)]
pub struct FmIndex {
    bwt: Vec<u8>,
    less: Vec<usize>,
    occ: Occ,
    symbols: Vec<u8>,
    /// Rows whose suffix array value is kept in `samples`
    sampled: BitVec,
    /// Number of sampled rows before each 32-row block
    block_ranks: Vec<u64>,
    samples: Positions,
    starts: Vec<u64>,
}

impl std::fmt::Debug for FmIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmIndex")
            .field("len", &self.bwt.len())
            .field("sequences", &self.starts.len())
            .field("samples", &self.samples.len())
            .finish()
    }
}

impl FmIndex {
    /// Build over `sequences`, reversing each one first when `reverse_each` is set.
    pub fn build(
        sequences: &SequenceCollection,
        residues: &[u8],
        width: u32,
        sampling: FmSampling,
        reverse_each: bool,
    ) -> Result<Self> {
        if sampling.occ == 0 || sampling.sa == 0 {
            return Err(LambdaError::Config("FM index sampling rates must be positive".to_string()));
        }
        let symbols = index_symbols(residues);
        check_symbols(sequences, &symbols)?;
        let text = build_text(sequences, reverse_each)?;
        let sa = build_suffix_array(&text, SaAlgorithm::Default)?;
        let symbol_set = SymbolSet::new(symbols.iter());

        let bwt = bwt(&text, &sa);
        let less = less(&bwt, &symbol_set);
        let occ = Occ::new(&bwt, sampling.occ, &symbol_set);

        let mut sampled = BitVec::from_elem(sa.len(), false);
        let mut count = 0usize;
        for (row, &pos) in sa.iter().enumerate() {
            // sequence starts are sampled so the LF walk never crosses a sentinel
            if pos % sampling.sa == 0 || bwt[row] == SENTINEL {
                sampled.set(row, true);
                count += 1;
            }
        }
        let mut samples = Positions::with_width(width, count)?;
        for (row, &pos) in sa.iter().enumerate() {
            if sampled[row] {
                samples.push(pos as u64)?;
            }
        }
        let block_ranks = block_ranks(&sampled);

        Ok(Self {
            bwt,
            less,
            occ,
            symbols,
            sampled,
            block_ranks,
            samples,
            starts: sequence_starts(sequences),
        })
    }

    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    pub fn starts(&self) -> &[u64] {
        &self.starts
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    #[inline]
    fn has_symbol(&self, c: u8) -> bool {
        c != SENTINEL && self.symbols.binary_search(&c).is_ok()
    }

    /// Occurrences of `c` in `bwt[..row]`.
    #[inline]
    pub(crate) fn occ_before(&self, row: usize, c: u8) -> usize {
        if row == 0 {
            0
        } else {
            self.occ.get(&self.bwt, row - 1, c)
        }
    }

    /// Backward extension of the row interval `[lo, hi)` by `c`.
    #[inline]
    pub(crate) fn backward(&self, lo: usize, hi: usize, c: u8) -> Option<(usize, usize)> {
        if !self.has_symbol(c) {
            return None;
        }
        let nl = self.less[c as usize] + self.occ_before(lo, c);
        let nr = self.less[c as usize] + self.occ_before(hi, c);
        (nl < nr).then_some((nl, nr))
    }

    /// Occurrences of symbols smaller than `c` (sentinel included) in `bwt[lo..hi]`.
    pub(crate) fn smaller_in(&self, lo: usize, hi: usize, c: u8) -> usize {
        self.symbols
            .iter()
            .take_while(|&&s| s < c)
            .map(|&s| self.occ_before(hi, s) - self.occ_before(lo, s))
            .sum()
    }

    #[inline]
    fn sampled_rank(&self, row: usize) -> usize {
        let block = row / 32;
        let bits = self.sampled.storage()[block];
        let mask = (1u32 << (row % 32)).wrapping_sub(1);
        self.block_ranks[block] as usize + (bits & mask).count_ones() as usize
    }

    /// Suffix array value of `row`, walking LF until a sampled row.
    pub fn sa_value(&self, mut row: usize) -> u64 {
        let mut steps = 0u64;
        while !self.sampled[row] {
            let c = self.bwt[row];
            row = self.less[c as usize] + self.occ.get(&self.bwt, row, c) - 1;
            steps += 1;
        }
        self.samples.get(self.sampled_rank(row)) + steps
    }

    pub fn locate_rows(&self, lo: usize, hi: usize) -> Vec<Hit> {
        (lo..hi)
            .map(|row| {
                let (subject, offset) = resolve_position(&self.starts, self.sa_value(row));
                Hit { subject, offset }
            })
            .collect()
    }
}

fn block_ranks(bits: &BitVec) -> Vec<u64> {
    let mut ranks = Vec::with_capacity(bits.storage().len() + 1);
    let mut total = 0u64;
    for block in bits.storage() {
        ranks.push(total);
        total += block.count_ones() as u64;
    }
    ranks.push(total);
    ranks
}

impl DbIndex for FmIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Fm
    }

    fn direction(&self) -> SearchDirection {
        SearchDirection::Backward
    }

    fn root(&self) -> Cursor {
        Cursor::new(0, self.bwt.len())
    }

    fn extend(&self, cursor: &Cursor, symbol: u8) -> Option<Cursor> {
        let (lo, hi) = self.backward(cursor.lo, cursor.hi, symbol)?;
        Some(Cursor {
            lo,
            hi,
            mirror_lo: 0,
            depth: cursor.depth + 1,
        })
    }

    fn locate(&self, cursor: &Cursor) -> Vec<Hit> {
        self.locate_rows(cursor.lo, cursor.hi)
    }

    fn num_sequences(&self) -> usize {
        self.starts.len()
    }

    fn text_len(&self) -> usize {
        self.bwt.len()
    }
}
