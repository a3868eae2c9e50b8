//! Output writers for the four supported formats.
//!
//! Records arrive fully resolved (original coordinates, scores, aligned rows); writers only
//! encode them. A writer receives one block of query results per call.

pub mod pairwise;
pub mod sam;
pub mod tabular;

pub use tabular::Column;

use crate::bio::alignment::{AlignOp, AlignmentStats};
use crate::bio::taxonomy::SubjectTaxIds;
use crate::core::resolver::{Compression, OutputFormat, Program};
use crate::search::stats::SearchStats;
use crate::{LambdaError, Result};
use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Facts about the run needed by headers and footers.
#[derive(Debug, Clone, Copy)]
pub struct RunInfo<'a> {
    pub program: Program,
    pub query_file: &'a Path,
    pub index_dir: &'a Path,
    pub subject_ids: &'a [String],
    /// Original (untranslated) subject lengths
    pub subject_lengths: &'a [u64],
    pub db_length: u64,
}

/// One reported alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub subject_id: String,
    pub subject_len: u64,
    pub query_frame: i8,
    pub subject_frame: i8,
    /// 1-based inclusive; minus-strand ranges run from high to low
    pub query_start: u64,
    pub query_end: u64,
    pub subject_start: u64,
    pub subject_end: u64,
    pub score: i32,
    pub bit_score: f64,
    pub evalue: f64,
    pub stats: AlignmentStats,
    /// Columns against the forward subject strand
    pub ops: Vec<(AlignOp, u32)>,
    pub query_row: Vec<u8>,
    pub subject_row: Vec<u8>,
    pub staxids: SubjectTaxIds,
}

impl OutputRecord {
    pub fn is_reverse(&self) -> bool {
        self.query_frame < 0 || self.subject_frame < 0
    }
}

/// Lowest common ancestor of the subjects a query matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lca {
    pub taxid: u32,
    pub name: Option<String>,
    pub rank: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub query_id: String,
    pub query_len: u64,
    pub records: Vec<OutputRecord>,
    pub lca: Option<Lca>,
}

pub trait OutputWriter: Send {
    fn write_header(&mut self, info: &RunInfo<'_>) -> Result<()>;
    /// Append the results of one query block; called under the output lock.
    fn write_block(&mut self, results: &[QueryResult]) -> Result<()>;
    fn write_footer(&mut self, stats: &SearchStats) -> Result<()>;
    /// Flush and close the underlying stream, finishing any compression trailer.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// A byte stream that needs an explicit end, such as a compressor.
pub trait FinishWrite: Write + Send {
    fn finish_write(self) -> io::Result<()>;
}

pub enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Bzip2(BzEncoder<BufWriter<File>>),
}

impl Sink {
    pub fn create(path: &Path, compression: Compression) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            LambdaError::Output(format!("cannot create {}: {}", path.display(), e))
        })?;
        let inner = BufWriter::new(file);
        Ok(match compression {
            Compression::None => Sink::Plain(inner),
            Compression::Gzip => Sink::Gzip(GzEncoder::new(inner, flate2::Compression::default())),
            Compression::Bzip2 => Sink::Bzip2(BzEncoder::new(inner, bzip2::Compression::default())),
        })
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
            Sink::Bzip2(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
            Sink::Bzip2(w) => w.flush(),
        }
    }
}

impl FinishWrite for Sink {
    fn finish_write(self) -> io::Result<()> {
        let mut inner = match self {
            Sink::Plain(w) => w,
            Sink::Gzip(w) => w.finish()?,
            Sink::Bzip2(w) => w.finish()?,
        };
        inner.flush()
    }
}

impl FinishWrite for Vec<u8> {
    fn finish_write(self) -> io::Result<()> {
        Ok(())
    }
}

/// Open the writer for a resolved output format.
pub fn open_writer(
    path: &Path,
    format: OutputFormat,
    compression: Compression,
    columns: &str,
) -> Result<Box<dyn OutputWriter>> {
    let sink = Sink::create(path, compression)?;
    Ok(match format {
        OutputFormat::Tabular { comments } => Box::new(tabular::TabularWriter::new(
            sink,
            tabular::parse_columns(columns)?,
            comments,
        )),
        OutputFormat::Pairwise => Box::new(pairwise::PairwiseWriter::new(sink)),
        OutputFormat::Sam => Box::new(sam::SamWriter::new(sink)),
    })
}

pub(crate) fn output_error(e: io::Error) -> LambdaError {
    LambdaError::Output(e.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use smallvec::smallvec;

    pub fn record(subject: &str, score: i32) -> OutputRecord {
        OutputRecord {
            subject_id: subject.to_string(),
            subject_len: 12,
            query_frame: 1,
            subject_frame: 1,
            query_start: 1,
            query_end: 5,
            subject_start: 3,
            subject_end: 8,
            score,
            bit_score: 20.45,
            evalue: 3.2e-7,
            stats: AlignmentStats {
                length: 6,
                identities: 4,
                positives: 5,
                mismatches: 1,
                gap_opens: 1,
                gaps: 1,
            },
            ops: vec![(AlignOp::Match, 2), (AlignOp::Deletion, 1), (AlignOp::Match, 3)],
            query_row: b"MK-VLA".to_vec(),
            subject_row: b"MKGVIA".to_vec(),
            staxids: smallvec![9606],
        }
    }

    pub fn result() -> QueryResult {
        QueryResult {
            query_id: "q1".to_string(),
            query_len: 5,
            records: vec![record("s1", 24)],
            lca: Some(Lca {
                taxid: 9606,
                name: Some("Homo sapiens".to_string()),
                rank: "species".to_string(),
            }),
        }
    }

    pub fn info<'a>(ids: &'a [String], lengths: &'a [u64]) -> RunInfo<'a> {
        RunInfo {
            program: Program::BlastP,
            query_file: Path::new("queries.fa"),
            index_dir: Path::new("db.lambda"),
            subject_ids: ids,
            subject_lengths: lengths,
            db_length: lengths.iter().sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_gzip_output_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.m8.gz");
        let mut writer = open_writer(&path, OutputFormat::Tabular { comments: false }, Compression::Gzip, "std").unwrap();
        writer.write_block(&[test_support::result()]).unwrap();
        writer.finish().unwrap();

        let mut text = String::new();
        flate2::read::MultiGzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.starts_with("q1\ts1\t"));
    }

    #[test]
    fn test_bzip2_output_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.m8.bz2");
        let mut writer = open_writer(&path, OutputFormat::Tabular { comments: false }, Compression::Bzip2, "std").unwrap();
        writer.write_block(&[test_support::result()]).unwrap();
        writer.finish().unwrap();

        let mut text = String::new();
        bzip2::read::BzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
