//! Six-frame translation and frame coordinate mapping.
//!
//! Frames are numbered `+1..+3` on the forward strand and `-1..-3` on the reverse
//! complement. In a translated collection the frames of input sequence `i` occupy slots
//! `i * 6 .. i * 6 + 6` in the order `+1, +2, +3, -1, -2, -3`.

use crate::{LambdaError, Result};
use crate::bio::sequence::SequenceCollection;
use ::bio::alphabets::dna;

pub const FRAMES: usize = 6;

/// NCBI genetic code tables, amino acids in TCAG codon order.
const GENETIC_CODES: &[(u8, &[u8; 64])] = &[
    (1, b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (2, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG"),
    (3, b"FFLLSSSSYY**CCWWTTTTPPPPHHQQRRRRIIMMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (4, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (5, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSSSVVVVAAAADDEEGGGG"),
    (6, b"FFLLSSSSYYQQCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (9, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNNKSSSSVVVVAAAADDEEGGGG"),
    (10, b"FFLLSSSSYY**CCCWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (11, b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (12, b"FFLLSSSSYY**CC*WLLLSPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (13, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSGGVVVVAAAADDEEGGGG"),
    (14, b"FFLLSSSSYYY*CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNNKSSSSVVVVAAAADDEEGGGG"),
    (15, b"FFLLSSSSYY*QCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (16, b"FFLLSSSSYY*LCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (21, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNNKSSSSVVVVAAAADDEEGGGG"),
    (22, b"FFLLSS*SYY*LCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (23, b"FF*LSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (24, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSSKVVVVAAAADDEEGGGG"),
    (25, b"FFLLSSSSYY**CCGWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
];

#[inline]
fn nucleotide_rank(c: u8) -> Option<usize> {
    match c {
        b'T' => Some(0),
        b'C' => Some(1),
        b'A' => Some(2),
        b'G' => Some(3),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneticCode {
    id: u8,
    table: &'static [u8; 64],
}

impl GeneticCode {
    pub fn new(id: u8) -> Result<Self> {
        GENETIC_CODES
            .iter()
            .find(|(code, _)| *code == id)
            .map(|(code, table)| GeneticCode { id: *code, table })
            .ok_or_else(|| {
                LambdaError::Config(format!(
                    "unknown genetic code {}; supported: {}",
                    id,
                    GENETIC_CODES
                        .iter()
                        .map(|(c, _)| c.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    #[inline]
    pub fn translate_codon(&self, codon: &[u8]) -> u8 {
        match (
            nucleotide_rank(codon[0]),
            nucleotide_rank(codon[1]),
            nucleotide_rank(codon[2]),
        ) {
            (Some(a), Some(b), Some(c)) => self.table[a * 16 + b * 4 + c],
            _ => b'X',
        }
    }

    pub fn translate<'a>(&'a self, nucleotides: &'a [u8]) -> impl Iterator<Item = u8> + 'a {
        nucleotides
            .chunks_exact(3)
            .map(move |codon| self.translate_codon(codon))
    }
}

/// Frame label (`+1..+3`, `-1..-3`) for slot `0..6`.
pub fn frame_label(slot: usize) -> i8 {
    let f = (slot % 3) as i8 + 1;
    if slot < 3 {
        f
    } else {
        -f
    }
}

/// Append the six translated frames of every sequence to a new collection.
pub fn translate_six_frames(
    sequences: &SequenceCollection,
    code: &GeneticCode,
) -> Result<SequenceCollection> {
    let mut out = SequenceCollection::try_with_capacity(
        sequences.len() * FRAMES,
        sequences.total_len() * 2 + FRAMES,
    )?;
    for seq in sequences.iter() {
        let rc = dna::revcomp(seq);
        for strand in [seq, rc.as_slice()] {
            for shift in 0..3 {
                let frame = strand.get(shift..).unwrap_or(&[]);
                out.push_iter(code.translate(frame));
            }
        }
    }
    Ok(out)
}

/// Forward strand and reverse complement of every sequence (slots `i * 2`, `i * 2 + 1`).
pub fn both_strands(sequences: &SequenceCollection) -> Result<SequenceCollection> {
    let mut out =
        SequenceCollection::try_with_capacity(sequences.len() * 2, sequences.total_len() * 2)?;
    for seq in sequences.iter() {
        out.push(seq);
        out.push(&dna::revcomp(seq));
    }
    Ok(out)
}

/// Map a half-open range of a translated frame back to 1-based nucleotide coordinates.
///
/// Plus-strand ranges come back as `start <= end`; minus-strand ranges are reported on the
/// forward strand with `start > end`, as BLAST does. Coordinates never exceed `orig_len`.
pub fn frame_to_nucleotide(begin: usize, end: usize, frame: i8, orig_len: usize) -> (usize, usize) {
    let shift = (frame.unsigned_abs() as usize).saturating_sub(1);
    let nt_begin = shift + begin * 3;
    let nt_end = (shift + end * 3).min(orig_len);
    if frame > 0 {
        (nt_begin + 1, nt_end)
    } else {
        (orig_len - nt_begin, orig_len - nt_end + 1)
    }
}

/// Map a half-open range on the reverse complement strand back to forward coordinates.
pub fn strand_to_nucleotide(begin: usize, end: usize, reverse: bool, len: usize) -> (usize, usize) {
    if reverse {
        (len - begin, len - end + 1)
    } else {
        (begin + 1, end)
    }
}
