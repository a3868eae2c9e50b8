//! BLAST tabular output (`.m8`, and `.m9` with a comment block per query).

use super::{output_error, FinishWrite, OutputRecord, OutputWriter, QueryResult, RunInfo};
use crate::search::stats::SearchStats;
use crate::{LambdaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    QSeqId,
    SSeqId,
    PIdent,
    Length,
    Mismatch,
    GapOpen,
    QStart,
    QEnd,
    SStart,
    SEnd,
    EValue,
    BitScore,
    Score,
    NIdent,
    Positive,
    PPos,
    Gaps,
    QLen,
    SLen,
    QFrame,
    SFrame,
    QSeq,
    SSeq,
    STaxIds,
}

pub const STANDARD_COLUMNS: [Column; 12] = [
    Column::QSeqId,
    Column::SSeqId,
    Column::PIdent,
    Column::Length,
    Column::Mismatch,
    Column::GapOpen,
    Column::QStart,
    Column::QEnd,
    Column::SStart,
    Column::SEnd,
    Column::EValue,
    Column::BitScore,
];

impl Column {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "qseqid" => Column::QSeqId,
            "sseqid" => Column::SSeqId,
            "pident" => Column::PIdent,
            "length" => Column::Length,
            "mismatch" => Column::Mismatch,
            "gapopen" => Column::GapOpen,
            "qstart" => Column::QStart,
            "qend" => Column::QEnd,
            "sstart" => Column::SStart,
            "send" => Column::SEnd,
            "evalue" => Column::EValue,
            "bitscore" => Column::BitScore,
            "score" => Column::Score,
            "nident" => Column::NIdent,
            "positive" => Column::Positive,
            "ppos" => Column::PPos,
            "gaps" => Column::Gaps,
            "qlen" => Column::QLen,
            "slen" => Column::SLen,
            "qframe" => Column::QFrame,
            "sframe" => Column::SFrame,
            "qseq" => Column::QSeq,
            "sseq" => Column::SSeq,
            "staxids" => Column::STaxIds,
            _ => return None,
        })
    }

    /// Field description used in the `# Fields:` comment.
    pub fn description(&self) -> &'static str {
        match self {
            Column::QSeqId => "query id",
            Column::SSeqId => "subject id",
            Column::PIdent => "% identity",
            Column::Length => "alignment length",
            Column::Mismatch => "mismatches",
            Column::GapOpen => "gap opens",
            Column::QStart => "q. start",
            Column::QEnd => "q. end",
            Column::SStart => "s. start",
            Column::SEnd => "s. end",
            Column::EValue => "evalue",
            Column::BitScore => "bit score",
            Column::Score => "score",
            Column::NIdent => "identical",
            Column::Positive => "positives",
            Column::PPos => "% positives",
            Column::Gaps => "gaps",
            Column::QLen => "query length",
            Column::SLen => "subject length",
            Column::QFrame => "query frame",
            Column::SFrame => "sbjct frame",
            Column::QSeq => "query seq",
            Column::SSeq => "subject seq",
            Column::STaxIds => "subject tax ids",
        }
    }
}

/// Parse a space or comma separated column list; `std` expands to the twelve defaults.
pub fn parse_columns(spec: &str) -> Result<Vec<Column>> {
    let mut columns = Vec::new();
    for name in spec.split(|c: char| c == ' ' || c == ',').filter(|s| !s.is_empty()) {
        if name == "std" {
            columns.extend_from_slice(&STANDARD_COLUMNS);
        } else {
            columns.push(Column::from_name(name).ok_or_else(|| {
                LambdaError::Config(format!("unknown output column '{}'", name))
            })?);
        }
    }
    if columns.is_empty() {
        columns.extend_from_slice(&STANDARD_COLUMNS);
    }
    Ok(columns)
}

/// E-value with BLAST's precision steps.
pub fn format_evalue(evalue: f64) -> String {
    if evalue < 1.0e-180 {
        "0.0".to_string()
    } else if evalue < 0.0009 {
        c_exponent(format!("{:.0e}", evalue))
    } else if evalue < 0.1 {
        format!("{:.3}", evalue)
    } else if evalue < 1.0 {
        format!("{:.2}", evalue)
    } else if evalue < 10.0 {
        format!("{:.1}", evalue)
    } else {
        format!("{:.0}", evalue)
    }
}

pub fn format_bit_score(bits: f64) -> String {
    if bits > 9999.0 {
        c_exponent(format!("{:.3e}", bits))
    } else if bits > 99.9 {
        format!("{:.0}", bits)
    } else {
        format!("{:.1}", bits)
    }
}

/// Rewrite Rust's `1e-7` exponent as C's `1e-07`.
fn c_exponent(s: String) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ("-", d),
                None => ("+", exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

fn percent(part: u32, whole: u32) -> String {
    if whole == 0 {
        "0.00".to_string()
    } else {
        format!("{:.2}", 100.0 * part as f64 / whole as f64)
    }
}

pub struct TabularWriter<W: FinishWrite> {
    out: W,
    columns: Vec<Column>,
    comments: bool,
    database: String,
    program: String,
}

impl<W: FinishWrite> TabularWriter<W> {
    pub fn new(out: W, columns: Vec<Column>, comments: bool) -> Self {
        Self {
            out,
            columns,
            comments,
            database: String::new(),
            program: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn field(&self, column: Column, query: &QueryResult, r: &OutputRecord) -> String {
        match column {
            Column::QSeqId => query.query_id.clone(),
            Column::SSeqId => r.subject_id.clone(),
            Column::PIdent => percent(r.stats.identities, r.stats.length),
            Column::Length => r.stats.length.to_string(),
            Column::Mismatch => r.stats.mismatches.to_string(),
            Column::GapOpen => r.stats.gap_opens.to_string(),
            Column::QStart => r.query_start.to_string(),
            Column::QEnd => r.query_end.to_string(),
            Column::SStart => r.subject_start.to_string(),
            Column::SEnd => r.subject_end.to_string(),
            Column::EValue => format_evalue(r.evalue),
            Column::BitScore => format_bit_score(r.bit_score),
            Column::Score => r.score.to_string(),
            Column::NIdent => r.stats.identities.to_string(),
            Column::Positive => r.stats.positives.to_string(),
            Column::PPos => percent(r.stats.positives, r.stats.length),
            Column::Gaps => r.stats.gaps.to_string(),
            Column::QLen => query.query_len.to_string(),
            Column::SLen => r.subject_len.to_string(),
            Column::QFrame => r.query_frame.to_string(),
            Column::SFrame => r.subject_frame.to_string(),
            Column::QSeq => String::from_utf8_lossy(&r.query_row).into_owned(),
            Column::SSeq => String::from_utf8_lossy(&r.subject_row).into_owned(),
            Column::STaxIds => {
                if r.staxids.is_empty() {
                    "N/A".to_string()
                } else {
                    r.staxids
                        .iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join(";")
                }
            }
        }
    }

    fn write_comments(&mut self, query: &QueryResult) -> std::io::Result<()> {
        writeln!(self.out, "# LAMBDA {} {}", self.program, env!("CARGO_PKG_VERSION"))?;
        writeln!(self.out, "# Query: {}", query.query_id)?;
        writeln!(self.out, "# Database: {}", self.database)?;
        if let Some(lca) = &query.lca {
            match &lca.name {
                Some(name) => writeln!(self.out, "# LCA: {} ({}, {})", lca.taxid, name, lca.rank)?,
                None => writeln!(self.out, "# LCA: {} ({})", lca.taxid, lca.rank)?,
            }
        }
        if !query.records.is_empty() {
            let fields: Vec<&str> = self.columns.iter().map(Column::description).collect();
            writeln!(self.out, "# Fields: {}", fields.join(", "))?;
        }
        writeln!(self.out, "# {} hits found", query.records.len())
    }
}

impl<W: FinishWrite> OutputWriter for TabularWriter<W> {
    fn write_header(&mut self, info: &RunInfo<'_>) -> Result<()> {
        self.database = info.index_dir.display().to_string();
        self.program = info.program.name().to_string();
        Ok(())
    }

    fn write_block(&mut self, results: &[QueryResult]) -> Result<()> {
        for query in results {
            if self.comments {
                self.write_comments(query).map_err(output_error)?;
            }
            for record in &query.records {
                let line: Vec<String> = self
                    .columns
                    .iter()
                    .map(|&c| self.field(c, query, record))
                    .collect();
                writeln!(self.out, "{}", line.join("\t")).map_err(output_error)?;
            }
        }
        Ok(())
    }

    fn write_footer(&mut self, stats: &SearchStats) -> Result<()> {
        if self.comments {
            writeln!(self.out, "# LAMBDA processed {} queries", stats.queries).map_err(output_error)?;
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.out.flush().map_err(output_error)?;
        self.out.finish_write().map_err(output_error)
    }
}
