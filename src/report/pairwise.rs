//! BLAST-like pairwise report (`.m0`).

use super::tabular::{format_bit_score, format_evalue};
use super::{output_error, FinishWrite, OutputRecord, OutputWriter, QueryResult, RunInfo};
use crate::core::resolver::Program;
use crate::search::stats::SearchStats;
use crate::Result;
use std::io;

const LINE_WIDTH: usize = 60;

pub struct PairwiseWriter<W: FinishWrite> {
    out: W,
    program: Program,
}

impl<W: FinishWrite> PairwiseWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            program: Program::BlastP,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Residues per alignment column on the (query, subject) axis.
    fn steps(&self) -> (u64, u64) {
        let q = if self.program.translates_queries() { 3 } else { 1 };
        let s = if self.program.translates_subjects() { 3 } else { 1 };
        (q, s)
    }

    fn write_record(&mut self, r: &OutputRecord) -> io::Result<()> {
        writeln!(self.out, "> {}", r.subject_id)?;
        writeln!(self.out, "Length={}", r.subject_len)?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            " Score = {} bits ({}),  Expect = {}",
            format_bit_score(r.bit_score),
            r.score,
            format_evalue(r.evalue)
        )?;
        let len = r.stats.length.max(1);
        let pct = |n: u32| (100.0 * n as f64 / len as f64).round() as u32;
        writeln!(
            self.out,
            " Identities = {}/{} ({}%), Positives = {}/{} ({}%), Gaps = {}/{} ({}%)",
            r.stats.identities,
            r.stats.length,
            pct(r.stats.identities),
            r.stats.positives,
            r.stats.length,
            pct(r.stats.positives),
            r.stats.gaps,
            r.stats.length,
            pct(r.stats.gaps)
        )?;
        match self.program {
            Program::BlastN => writeln!(
                self.out,
                " Strand=Plus/{}",
                if r.subject_frame < 0 { "Minus" } else { "Plus" }
            )?,
            Program::BlastP => {}
            Program::BlastX => writeln!(self.out, " Frame = {:+}", r.query_frame)?,
            Program::TBlastN => writeln!(self.out, " Frame = {:+}", r.subject_frame)?,
            Program::TBlastX => {
                writeln!(self.out, " Frame = {:+}/{:+}", r.query_frame, r.subject_frame)?
            }
        }
        writeln!(self.out)?;

        let (q_step, s_step) = self.steps();
        let mut q_pos = RowCursor::new(r.query_start, r.query_end, q_step);
        let mut s_pos = RowCursor::new(r.subject_start, r.subject_end, s_step);
        for (q_chunk, s_chunk) in r
            .query_row
            .chunks(LINE_WIDTH)
            .zip(r.subject_row.chunks(LINE_WIDTH))
        {
            let (q_from, q_to) = q_pos.advance(q_chunk);
            let (s_from, s_to) = s_pos.advance(s_chunk);
            let width = q_from.to_string().len().max(s_from.to_string().len());
            let midline: String = q_chunk
                .iter()
                .zip(s_chunk)
                .map(|(&a, &b)| midline_symbol(a, b))
                .collect();
            writeln!(self.out, "Query  {:<w$}  {}  {}", q_from, String::from_utf8_lossy(q_chunk), q_to, w = width)?;
            writeln!(self.out, "       {:<w$}  {}", "", midline, w = width)?;
            writeln!(self.out, "Sbjct  {:<w$}  {}  {}", s_from, String::from_utf8_lossy(s_chunk), s_to, w = width)?;
            writeln!(self.out)?;
        }
        Ok(())
    }
}

fn midline_symbol(a: u8, b: u8) -> char {
    if a == b && a != b'-' {
        '|'
    } else {
        ' '
    }
}

/// Row coordinate tracking on one sequence axis.
struct RowCursor {
    next: i64,
    dir: i64,
    step: i64,
}

impl RowCursor {
    fn new(start: u64, end: u64, step: u64) -> Self {
        Self {
            next: start as i64,
            dir: if end >= start { 1 } else { -1 },
            step: step as i64,
        }
    }

    /// First and last coordinate covered by `chunk`.
    fn advance(&mut self, chunk: &[u8]) -> (i64, i64) {
        let residues = chunk.iter().filter(|&&c| c != b'-').count() as i64;
        let from = self.next;
        if residues == 0 {
            return (from, from - self.dir);
        }
        let to = from + self.dir * (residues * self.step - 1);
        self.next = to + self.dir;
        (from, to)
    }
}

impl<W: FinishWrite> OutputWriter for PairwiseWriter<W> {
    fn write_header(&mut self, info: &RunInfo<'_>) -> Result<()> {
        self.program = info.program;
        let name = info.program.name().to_uppercase();
        writeln!(self.out, "{} LAMBDA {}\n", name, env!("CARGO_PKG_VERSION")).map_err(output_error)?;
        writeln!(
            self.out,
            "Database: {}\n           {} sequences; {} total letters\n",
            info.index_dir.display(),
            info.subject_ids.len(),
            info.db_length
        )
        .map_err(output_error)
    }

    fn write_block(&mut self, results: &[QueryResult]) -> Result<()> {
        for query in results {
            writeln!(self.out, "Query= {}\n\nLength={}\n", query.query_id, query.query_len)
                .map_err(output_error)?;
            if query.records.is_empty() {
                writeln!(self.out, "***** No hits found *****\n").map_err(output_error)?;
                continue;
            }
            if let Some(lca) = &query.lca {
                writeln!(
                    self.out,
                    "Lowest common ancestor: {} ({})\n",
                    lca.taxid,
                    lca.name.as_deref().unwrap_or(&lca.rank)
                )
                .map_err(output_error)?;
            }
            for record in &query.records {
                self.write_record(record).map_err(output_error)?;
            }
        }
        Ok(())
    }

    fn write_footer(&mut self, stats: &SearchStats) -> Result<()> {
        writeln!(
            self.out,
            "Processed {} queries, {} matches reported.",
            stats.queries, stats.matches
        )
        .map_err(output_error)
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.out.flush().map_err(output_error)?;
        self.out.finish_write().map_err(output_error)
    }
}
