//! Seed extension: ungapped X-drop followed by a banded local alignment with traceback.
//!
//! The banded kernel is generic over the gap model so that the linear case compiles without
//! the affine extension bookkeeping.

use super::scoring::{ScoringMatrix, ScoringScheme};
use serde::{Deserialize, Serialize};

pub trait GapCosts: Send + Sync + 'static {
    const AFFINE: bool;
    const NAME: &'static str;
}

/// Gotoh affine gaps: `open + k * extend`.
pub struct AffineGaps;

/// Linear gaps: `k * extend`.
pub struct LinearGaps;

impl GapCosts for AffineGaps {
    const AFFINE: bool = true;
    const NAME: &'static str = "affine";
}

impl GapCosts for LinearGaps {
    const AFFINE: bool = false;
    const NAME: &'static str = "linear";
}

/// Alignment column kinds, named as in SAM (reference = subject).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlignOp {
    /// Aligned pair, match or mismatch
    Match,
    /// Query residue against a gap in the subject
    Insertion,
    /// Subject residue against a gap in the query
    Deletion,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignmentStats {
    pub length: u32,
    pub identities: u32,
    pub positives: u32,
    pub mismatches: u32,
    pub gap_opens: u32,
    pub gaps: u32,
}

impl AlignmentStats {
    pub fn percent_identity(&self) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            100.0 * self.identities as f64 / self.length as f64
        }
    }
}

/// A finished local alignment; coordinates are half-open in the searched sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalAlignment {
    pub query_begin: usize,
    pub query_end: usize,
    pub subject_begin: usize,
    pub subject_end: usize,
    pub score: i32,
    pub ops: Vec<(AlignOp, u32)>,
    pub stats: AlignmentStats,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtensionParams {
    pub x_drop: i32,
    /// Half width of the diagonal band; `None` aligns the full window
    pub band: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UngappedHit {
    pub query_begin: usize,
    pub query_end: usize,
    pub subject_begin: usize,
    pub subject_end: usize,
    pub score: i32,
}

/// Extend an exact or near-exact seed in both directions without gaps until the running
/// score falls more than `x_drop` below the best seen.
pub fn ungapped_extend(
    query: &[u8],
    subject: &[u8],
    qpos: usize,
    spos: usize,
    len: usize,
    scheme: &ScoringScheme,
    x_drop: i32,
) -> UngappedHit {
    let len = len.min(query.len() - qpos).min(subject.len() - spos);
    let seed: i32 = (0..len).map(|k| scheme.score(query[qpos + k], subject[spos + k])).sum();

    let (mut run, mut best, mut right) = (0i32, 0i32, 0usize);
    let mut k = 0;
    while qpos + len + k < query.len() && spos + len + k < subject.len() {
        run += scheme.score(query[qpos + len + k], subject[spos + len + k]);
        k += 1;
        if run > best {
            best = run;
            right = k;
        } else if best - run > x_drop {
            break;
        }
    }
    let right_score = best;

    let (mut run, mut best, mut left) = (0i32, 0i32, 0usize);
    let mut k = 0;
    while k < qpos && k < spos {
        run += scheme.score(query[qpos - k - 1], subject[spos - k - 1]);
        k += 1;
        if run > best {
            best = run;
            left = k;
        } else if best - run > x_drop {
            break;
        }
    }

    UngappedHit {
        query_begin: qpos - left,
        query_end: qpos + len + right,
        subject_begin: spos - left,
        subject_end: spos + len + right,
        score: seed + right_score + best,
    }
}

const NEG: i32 = i32::MIN / 4;

const FROM_DIAG: u8 = 1;
const FROM_E: u8 = 2;
const FROM_F: u8 = 3;
const E_EXTENDED: u8 = 4;
const F_EXTENDED: u8 = 8;

/// Extend a seed into a gapped local alignment.
///
/// Returns `None` when the ungapped core does not score positively.
pub fn extend_seed<G: GapCosts>(
    query: &[u8],
    subject: &[u8],
    qpos: usize,
    spos: usize,
    len: usize,
    scheme: &ScoringScheme,
    params: &ExtensionParams,
) -> Option<LocalAlignment> {
    if qpos >= query.len() || spos >= subject.len() {
        return None;
    }
    let core = ungapped_extend(query, subject, qpos, spos, len, scheme, params.x_drop);
    if core.score <= 0 {
        return None;
    }

    let pad = params.band.unwrap_or(query.len().max(subject.len()));
    let qa = core.query_begin.saturating_sub(pad);
    let qb = (core.query_end + pad).min(query.len());
    let sa = core.subject_begin.saturating_sub(pad);
    let sb = (core.subject_end + pad).min(subject.len());
    let q = &query[qa..qb];
    let s = &subject[sa..sb];
    let (n, m) = (q.len(), s.len());
    let d0 = (core.subject_begin - sa) as isize - (core.query_begin - qa) as isize;

    let open_ext = scheme.gap_open() + scheme.gap_extend();
    let ext = scheme.gap_extend();
    let width = m + 1;
    let mut trace = vec![0u8; (n + 1) * width];
    let mut h_prev = vec![0i32; width];
    let mut h_cur = vec![0i32; width];
    let mut f = vec![NEG; width];
    let mut best = (0i32, 0usize, 0usize);

    for i in 1..=n {
        h_cur[0] = 0;
        let mut e = NEG;
        let qc = q[i - 1];
        for j in 1..=m {
            let in_band = match params.band {
                Some(b) => ((j as isize - i as isize) - d0).unsigned_abs() <= b,
                None => true,
            };
            if !in_band {
                h_cur[j] = 0;
                f[j] = NEG;
                e = NEG;
                continue;
            }

            let mut bits = 0u8;
            let e_open = h_cur[j - 1] - open_ext;
            if G::AFFINE && e - ext > e_open {
                e -= ext;
                bits |= E_EXTENDED;
            } else {
                e = e_open;
            }
            let f_open = h_prev[j] - open_ext;
            if G::AFFINE && f[j] - ext > f_open {
                f[j] -= ext;
                bits |= F_EXTENDED;
            } else {
                f[j] = f_open;
            }

            let diag = h_prev[j - 1] + scheme.score(qc, s[j - 1]);
            let mut h = 0;
            let mut source = 0;
            if diag > h {
                h = diag;
                source = FROM_DIAG;
            }
            if e > h {
                h = e;
                source = FROM_E;
            }
            if f[j] > h {
                h = f[j];
                source = FROM_F;
            }
            h_cur[j] = h;
            trace[i * width + j] = bits | source;
            if h > best.0 {
                best = (h, i, j);
            }
        }
        std::mem::swap(&mut h_prev, &mut h_cur);
    }

    if best.0 <= 0 {
        return None;
    }

    #[derive(PartialEq)]
    enum State {
        H,
        E,
        F,
    }
    let (mut i, mut j) = (best.1, best.2);
    let mut state = State::H;
    let mut columns = Vec::new();
    loop {
        let t = trace[i * width + j];
        match state {
            State::H => match t & 3 {
                FROM_DIAG => {
                    columns.push(AlignOp::Match);
                    i -= 1;
                    j -= 1;
                }
                FROM_E => state = State::E,
                FROM_F => state = State::F,
                _ => break,
            },
            State::E => {
                columns.push(AlignOp::Deletion);
                if t & E_EXTENDED == 0 {
                    state = State::H;
                }
                j -= 1;
            }
            State::F => {
                columns.push(AlignOp::Insertion);
                if t & F_EXTENDED == 0 {
                    state = State::H;
                }
                i -= 1;
            }
        }
    }
    columns.reverse();

    let alignment = LocalAlignment {
        query_begin: qa + i,
        query_end: qa + best.1,
        subject_begin: sa + j,
        subject_end: sa + best.2,
        score: best.0,
        stats: column_stats(&columns, &q[i..], &s[j..], scheme),
        ops: run_length(&columns),
    };
    Some(alignment)
}

fn run_length(columns: &[AlignOp]) -> Vec<(AlignOp, u32)> {
    let mut ops: Vec<(AlignOp, u32)> = Vec::new();
    for &op in columns {
        match ops.last_mut() {
            Some((last, count)) if *last == op => *count += 1,
            _ => ops.push((op, 1)),
        }
    }
    ops
}

fn column_stats(columns: &[AlignOp], q: &[u8], s: &[u8], scheme: &ScoringScheme) -> AlignmentStats {
    let mut stats = AlignmentStats::default();
    let (mut qi, mut si) = (0usize, 0usize);
    let mut previous = None;
    for &op in columns {
        stats.length += 1;
        match op {
            AlignOp::Match => {
                let (a, b) = (q[qi], s[si]);
                if a == b {
                    stats.identities += 1;
                } else {
                    stats.mismatches += 1;
                }
                if scheme.score(a, b) > 0 {
                    stats.positives += 1;
                }
                qi += 1;
                si += 1;
            }
            AlignOp::Insertion | AlignOp::Deletion => {
                stats.gaps += 1;
                if previous != Some(op) {
                    stats.gap_opens += 1;
                }
                if op == AlignOp::Insertion {
                    qi += 1;
                } else {
                    si += 1;
                }
            }
        }
        previous = Some(op);
    }
    stats
}

/// Render the aligned rows of both sequences with `-` for gaps.
pub fn aligned_rows(alignment: &LocalAlignment, query: &[u8], subject: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut q_row = Vec::with_capacity(alignment.stats.length as usize);
    let mut s_row = Vec::with_capacity(alignment.stats.length as usize);
    let (mut qi, mut si) = (alignment.query_begin, alignment.subject_begin);
    for &(op, count) in &alignment.ops {
        for _ in 0..count {
            match op {
                AlignOp::Match => {
                    q_row.push(query[qi]);
                    s_row.push(subject[si]);
                    qi += 1;
                    si += 1;
                }
                AlignOp::Insertion => {
                    q_row.push(query[qi]);
                    s_row.push(b'-');
                    qi += 1;
                }
                AlignOp::Deletion => {
                    q_row.push(b'-');
                    s_row.push(subject[si]);
                    si += 1;
                }
            }
        }
    }
    (q_row, s_row)
}
