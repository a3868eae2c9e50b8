/// Scoring schemes and Karlin-Altschul statistics for local alignment

use crate::bio::alphabet::Alphabet;
use crate::{LambdaError, Result};

pub trait ScoringMatrix {
    fn score(&self, a: u8, b: u8) -> i32;
    fn gap_open(&self) -> i32;
    fn gap_extend(&self) -> i32;
}

/// Karlin-Altschul parameters of a scoring scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KarlinParams {
    pub lambda: f64,
    pub k: f64,
}

/// (gap_open, gap_extend, lambda, k); `i32::MAX` marks the ungapped entry
type ParamEntry = (i32, i32, f64, f64);

const BLOSUM62_PARAMS: &[ParamEntry] = &[
    (i32::MAX, i32::MAX, 0.3176, 0.134),
    (11, 2, 0.297, 0.082),
    (10, 2, 0.291, 0.075),
    (9, 2, 0.279, 0.058),
    (8, 2, 0.264, 0.045),
    (7, 2, 0.239, 0.027),
    (6, 2, 0.201, 0.012),
    (13, 1, 0.292, 0.071),
    (12, 1, 0.283, 0.059),
    (11, 1, 0.267, 0.041),
    (10, 1, 0.243, 0.024),
    (9, 1, 0.206, 0.010),
];

// Nucleotide tables from NCBI blast_stat.c, keyed by (reward, penalty)
const BLASTN_1_1: &[ParamEntry] = &[
    (i32::MAX, i32::MAX, 1.09, 0.31),
    (3, 2, 1.09, 0.31),
    (2, 2, 1.07, 0.27),
    (1, 2, 1.02, 0.21),
    (0, 2, 0.80, 0.064),
    (4, 1, 1.08, 0.28),
    (3, 1, 1.06, 0.25),
    (2, 1, 0.99, 0.17),
];

const BLASTN_1_2: &[ParamEntry] = &[
    (i32::MAX, i32::MAX, 1.28, 0.46),
    (2, 2, 1.33, 0.62),
    (1, 2, 1.30, 0.52),
    (0, 2, 1.19, 0.34),
    (3, 1, 1.32, 0.57),
    (2, 1, 1.29, 0.49),
    (1, 1, 1.14, 0.26),
];

const BLASTN_1_3: &[ParamEntry] = &[
    (i32::MAX, i32::MAX, 1.374, 0.711),
    (2, 2, 1.37, 0.70),
    (1, 2, 1.35, 0.64),
    (0, 2, 1.25, 0.42),
    (2, 1, 1.34, 0.60),
    (1, 1, 1.21, 0.34),
];

const BLASTN_2_3: &[ParamEntry] = &[
    (i32::MAX, i32::MAX, 0.55, 0.21),
    (4, 4, 0.63, 0.42),
    (2, 4, 0.615, 0.37),
    (0, 4, 0.55, 0.21),
    (3, 3, 0.615, 0.37),
    (6, 2, 0.63, 0.42),
    (5, 2, 0.625, 0.41),
    (4, 2, 0.61, 0.35),
    (2, 2, 0.515, 0.14),
];

fn lookup(table: &[ParamEntry], gap_open: i32, gap_extend: i32) -> KarlinParams {
    let entry = table
        .iter()
        .find(|(o, e, _, _)| *o == gap_open && *e == gap_extend)
        .unwrap_or(&table[0]);
    KarlinParams {
        lambda: entry.2,
        k: entry.3,
    }
}

/// Ungapped lambda for a match/mismatch scheme under uniform background frequencies.
///
/// Returns `None` when the expected score is not negative, in which case no positive lambda
/// exists.
pub fn estimate_lambda(p_match: f64, reward: i32, penalty: i32) -> Option<f64> {
    let (r, m) = (reward as f64, -(penalty.abs() as f64));
    let expected = p_match * r + (1.0 - p_match) * m;
    if reward <= 0 || expected >= 0.0 {
        return None;
    }
    let f = |lambda: f64| p_match * (lambda * r).exp() + (1.0 - p_match) * (lambda * m).exp() - 1.0;

    let mut hi = 0.5;
    while f(hi) <= 0.0 {
        hi *= 2.0;
        if hi > 1e3 {
            return None;
        }
    }
    let mut lo = 1e-9;
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if f(mid) > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeKind {
    Blosum62,
    MatchMismatch { reward: i32, penalty: i32 },
}

/// Residue scoring with gap costs; penalties are stored as positive numbers.
///
/// A gap of length `k` costs `gap_open + k * gap_extend`; `gap_open == 0` is the linear model.
#[derive(Debug, Clone)]
pub struct ScoringScheme {
    kind: SchemeKind,
    table: Vec<i32>,
    gap_open: i32,
    gap_extend: i32,
    karlin: Option<KarlinParams>,
}

const BLOSUM62_ORDER: &[u8] = b"ARNDCQEGHILKMFPSTWYVBZX*";

#[rustfmt::skip]
const BLOSUM62: [[i32; 24]; 24] = [
    [ 4, -1, -2, -2,  0, -1, -1,  0, -2, -1, -1, -1, -1, -2, -1,  1,  0, -3, -2,  0, -2, -1,  0, -4],
    [-1,  5,  0, -2, -3,  1,  0, -2,  0, -3, -2,  2, -1, -3, -2, -1, -1, -3, -2, -3, -1,  0, -1, -4],
    [-2,  0,  6,  1, -3,  0,  0,  0,  1, -3, -3,  0, -2, -3, -2,  1,  0, -4, -2, -3,  3,  0, -1, -4],
    [-2, -2,  1,  6, -3,  0,  2, -1, -1, -3, -4, -1, -3, -3, -1,  0, -1, -4, -3, -3,  4,  1, -1, -4],
    [ 0, -3, -3, -3,  9, -3, -4, -3, -3, -1, -1, -3, -1, -2, -3, -1, -1, -2, -2, -1, -3, -3, -2, -4],
    [-1,  1,  0,  0, -3,  5,  2, -2,  0, -3, -2,  1,  0, -3, -1,  0, -1, -2, -1, -2,  0,  3, -1, -4],
    [-1,  0,  0,  2, -4,  2,  5, -2,  0, -3, -3,  1, -2, -3, -1,  0, -1, -3, -2, -2,  1,  4, -1, -4],
    [ 0, -2,  0, -1, -3, -2, -2,  6, -2, -4, -4, -2, -3, -3, -2,  0, -2, -2, -3, -3, -1, -2, -1, -4],
    [-2,  0,  1, -1, -3,  0,  0, -2,  8, -3, -3, -1, -2, -1, -2, -1, -2, -2,  2, -3,  0,  0, -1, -4],
    [-1, -3, -3, -3, -1, -3, -3, -4, -3,  4,  2, -3,  1,  0, -3, -2, -1, -3, -1,  3, -3, -3, -1, -4],
    [-1, -2, -3, -4, -1, -2, -3, -4, -3,  2,  4, -2,  2,  0, -3, -2, -1, -2, -1,  1, -4, -3, -1, -4],
    [-1,  2,  0, -1, -3,  1,  1, -2, -1, -3, -2,  5, -1, -3, -1,  0, -1, -3, -2, -2,  0,  1, -1, -4],
    [-1, -1, -2, -3, -1,  0, -2, -3, -2,  1,  2, -1,  5,  0, -2, -1, -1, -1, -1,  1, -3, -1, -1, -4],
    [-2, -3, -3, -3, -2, -3, -3, -3, -1,  0,  0, -3,  0,  6, -4, -2, -2,  1,  3, -1, -3, -3, -1, -4],
    [-1, -2, -2, -1, -3, -1, -1, -2, -2, -3, -3, -1, -2, -4,  7, -1, -1, -4, -3, -2, -2, -1, -2, -4],
    [ 1, -1,  1,  0, -1,  0,  0,  0, -1, -2, -2,  0, -1, -2, -1,  4,  1, -3, -2, -2,  0,  0,  0, -4],
    [ 0, -1,  0, -1, -1, -1, -1, -2, -2, -1, -1, -1, -1, -2, -1,  1,  5, -2, -2,  0, -1, -1,  0, -4],
    [-3, -3, -4, -4, -2, -2, -3, -2, -2, -3, -2, -3, -1,  1, -4, -3, -2, 11,  2, -3, -4, -3, -2, -4],
    [-2, -2, -2, -3, -2, -1, -2, -3,  2, -1, -1, -2, -1,  3, -3, -2, -2,  2,  7, -1, -3, -2, -1, -4],
    [ 0, -3, -3, -3, -1, -2, -2, -3, -3,  3,  1, -2,  1, -1, -2, -2,  0, -3, -1,  4, -3, -2, -1, -4],
    [-2, -1,  3,  4, -3,  0,  1, -1,  0, -3, -4,  0, -3, -3, -2,  0, -1, -4, -3, -3,  4,  1, -1, -4],
    [-1,  0,  0,  1, -3,  3,  4, -2,  0, -3, -3,  1, -1, -3, -1,  0, -1, -3, -2, -2,  1,  4, -1, -4],
    [ 0, -1, -1, -1, -2, -1, -1, -1, -1, -1, -1, -1, -1, -1, -2,  0,  0, -2, -1, -1, -1, -1, -1, -4],
    [-4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4,  1],
];

#[inline]
fn cell(a: u8, b: u8) -> usize {
    (((a & 0x7f) as usize) << 7) | (b & 0x7f) as usize
}

impl ScoringScheme {
    pub fn blosum62(gap_open: i32, gap_extend: i32) -> Result<Self> {
        check_gaps(gap_open, gap_extend)?;
        let index_of = |c: u8| BLOSUM62_ORDER.iter().position(|&x| x == c).unwrap_or(22);
        let mut table = vec![0i32; 128 * 128];
        for a in 0u8..128 {
            for b in 0u8..128 {
                table[cell(a, b)] = BLOSUM62[index_of(a)][index_of(b)];
            }
        }
        Ok(Self {
            kind: SchemeKind::Blosum62,
            table,
            gap_open,
            gap_extend,
            karlin: Some(lookup(BLOSUM62_PARAMS, gap_open, gap_extend)),
        })
    }

    /// Uniform match/mismatch scores. The wildcard (`N` / `X`) always scores as a mismatch.
    pub fn match_mismatch(
        reward: i32,
        penalty: i32,
        gap_open: i32,
        gap_extend: i32,
        alphabet: Alphabet,
    ) -> Result<Self> {
        check_gaps(gap_open, gap_extend)?;
        let penalty = -penalty.abs();
        let wildcard = if alphabet.is_nucleotide() { b'N' } else { b'X' };
        let mut table = vec![penalty; 128 * 128];
        for a in 0u8..128 {
            if a != wildcard {
                table[cell(a, a)] = reward;
            }
        }

        let karlin = if alphabet.is_nucleotide() {
            let params = match (reward, -penalty) {
                (1, 1) => Some(BLASTN_1_1),
                (1, 2) => Some(BLASTN_1_2),
                (1, 3) => Some(BLASTN_1_3),
                (2, 3) => Some(BLASTN_2_3),
                _ => None,
            };
            match params {
                Some(table) => Some(lookup(table, gap_open, gap_extend)),
                None => estimate_lambda(0.25, reward, penalty).map(|lambda| KarlinParams { lambda, k: 0.1 }),
            }
        } else {
            estimate_lambda(0.05, reward, penalty).map(|lambda| KarlinParams { lambda, k: 0.1 })
        };
        if karlin.is_none() {
            tracing::warn!(
                "Scoring scheme {}/{} has no positive lambda; bit scores equal raw scores and e-values are 0",
                reward,
                penalty
            );
        }

        Ok(Self {
            kind: SchemeKind::MatchMismatch { reward, penalty },
            table,
            gap_open,
            gap_extend,
            karlin,
        })
    }

    pub fn kind(&self) -> SchemeKind {
        self.kind
    }

    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.table[cell(a, b)]
    }

    pub fn karlin(&self) -> Option<KarlinParams> {
        self.karlin
    }

    pub fn is_linear(&self) -> bool {
        self.gap_open == 0
    }

    pub fn bit_score(&self, raw: i32) -> f64 {
        match self.karlin {
            Some(p) => (p.lambda * raw as f64 - p.k.ln()) / std::f64::consts::LN_2,
            None => raw as f64,
        }
    }

    /// E-value of a raw score over a `query_len` x `db_len` search space.
    pub fn evalue(&self, raw: i32, query_len: u64, db_len: u64) -> f64 {
        match self.karlin {
            Some(_) => (query_len as f64) * (db_len as f64) * 2f64.powf(-self.bit_score(raw)),
            None => 0.0,
        }
    }
}

fn check_gaps(gap_open: i32, gap_extend: i32) -> Result<()> {
    if gap_open < 0 || gap_extend <= 0 {
        return Err(LambdaError::Config(format!(
            "gap costs must be given as positive penalties (open {}, extend {})",
            gap_open, gap_extend
        )));
    }
    Ok(())
}

impl ScoringMatrix for ScoringScheme {
    fn score(&self, a: u8, b: u8) -> i32 {
        ScoringScheme::score(self, a, b)
    }

    fn gap_open(&self) -> i32 {
        self.gap_open
    }

    fn gap_extend(&self) -> i32 {
        self.gap_extend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blosum62_scores() {
        let s = ScoringScheme::blosum62(11, 1).unwrap();
        assert_eq!(s.score(b'A', b'A'), 4);
        assert_eq!(s.score(b'W', b'W'), 11);
        assert_eq!(s.score(b'A', b'R'), -1);
        assert_eq!(s.score(b'W', b'C'), -2);
        // unknown letters score as X
        assert_eq!(s.score(b'J', b'A'), 0);
        assert_eq!(s.karlin().unwrap().lambda, 0.267);
    }

    #[test]
    fn test_blosum62_unknown_gaps_use_ungapped_params() {
        let s = ScoringScheme::blosum62(0, 3).unwrap();
        assert!(s.is_linear());
        assert_eq!(s.karlin().unwrap().lambda, 0.3176);
    }

    #[test]
    fn test_match_mismatch_nucleotide() {
        let s = ScoringScheme::match_mismatch(2, -3, 5, 2, Alphabet::Dna5).unwrap();
        assert_eq!(s.score(b'A', b'A'), 2);
        assert_eq!(s.score(b'A', b'C'), -3);
        assert_eq!(s.score(b'N', b'N'), -3);
        assert_eq!(s.karlin().unwrap().lambda, 0.625);
    }

    #[test]
    fn test_estimated_lambda_solves_equation() {
        let lambda = estimate_lambda(0.25, 1, -2).unwrap();
        let sum = 0.25 * lambda.exp() + 0.75 * (-2.0 * lambda).exp();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(estimate_lambda(0.05, 1, 0).is_none());
    }

    #[test]
    fn test_non_negative_expectation_uses_raw_scores() {
        let s = ScoringScheme::match_mismatch(1, 0, 11, 1, Alphabet::AminoAcid).unwrap();
        assert!(s.karlin().is_none());
        assert_eq!(s.bit_score(17), 17.0);
        assert_eq!(s.evalue(17, 100, 1_000_000), 0.0);
    }

    #[test]
    fn test_evalue_decreases_with_score() {
        let s = ScoringScheme::blosum62(11, 1).unwrap();
        assert!(s.evalue(50, 300, 1_000_000) < s.evalue(30, 300, 1_000_000));
        assert!(s.bit_score(50) > 20.0);
    }

    #[test]
    fn test_invalid_gaps_rejected() {
        assert!(ScoringScheme::blosum62(-1, 1).is_err());
        assert!(ScoringScheme::blosum62(11, 0).is_err());
    }
}
