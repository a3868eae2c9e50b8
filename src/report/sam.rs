//! SAM text output. Subjects are the reference sequences.

use super::{output_error, FinishWrite, OutputRecord, OutputWriter, QueryResult, RunInfo};
use crate::bio::alignment::AlignOp;
use crate::search::stats::SearchStats;
use crate::Result;

const FLAG_REVERSE: u16 = 0x10;
const FLAG_SECONDARY: u16 = 0x100;

pub struct SamWriter<W: FinishWrite> {
    out: W,
}

impl<W: FinishWrite> SamWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// CIGAR string of the alignment columns (`M`, `I`, `D`).
pub fn cigar(ops: &[(AlignOp, u32)]) -> String {
    if ops.is_empty() {
        return "*".to_string();
    }
    ops.iter()
        .map(|(op, n)| {
            let code = match op {
                AlignOp::Match => 'M',
                AlignOp::Insertion => 'I',
                AlignOp::Deletion => 'D',
            };
            format!("{}{}", n, code)
        })
        .collect()
}

fn sam_line(query_id: &str, r: &OutputRecord, primary: bool) -> String {
    let mut flag = 0u16;
    if r.is_reverse() {
        flag |= FLAG_REVERSE;
    }
    if !primary {
        flag |= FLAG_SECONDARY;
    }
    let pos = r.subject_start.min(r.subject_end);
    format!(
        "{}\t{}\t{}\t{}\t255\t{}\t*\t0\t0\t*\t*\tAS:i:{}\tNM:i:{}\tZE:f:{:e}\tZB:f:{:.1}",
        query_id,
        flag,
        r.subject_id,
        pos,
        cigar(&r.ops),
        r.score,
        r.stats.mismatches + r.stats.gaps,
        r.evalue,
        r.bit_score
    )
}

impl<W: FinishWrite> OutputWriter for SamWriter<W> {
    fn write_header(&mut self, info: &RunInfo<'_>) -> Result<()> {
        writeln!(self.out, "@HD\tVN:1.6\tSO:unsorted").map_err(output_error)?;
        for (id, len) in info.subject_ids.iter().zip(info.subject_lengths) {
            writeln!(self.out, "@SQ\tSN:{}\tLN:{}", id, len).map_err(output_error)?;
        }
        writeln!(
            self.out,
            "@PG\tID:lambda\tPN:lambda\tVN:{}\tCL:{} -q {} -i {}",
            env!("CARGO_PKG_VERSION"),
            info.program.name(),
            info.query_file.display(),
            info.index_dir.display()
        )
        .map_err(output_error)
    }

    fn write_block(&mut self, results: &[QueryResult]) -> Result<()> {
        for query in results {
            for (i, record) in query.records.iter().enumerate() {
                writeln!(self.out, "{}", sam_line(&query.query_id, record, i == 0))
                    .map_err(output_error)?;
            }
        }
        Ok(())
    }

    fn write_footer(&mut self, _stats: &SearchStats) -> Result<()> {
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.out.flush().map_err(output_error)?;
        self.out.finish_write().map_err(output_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::{info, record, result};

    #[test]
    fn test_header_and_records() {
        let mut writer = SamWriter::new(Vec::new());
        let ids = vec!["s1".to_string(), "s2".to_string()];
        let lengths = vec![12, 40];
        writer.write_header(&info(&ids, &lengths)).unwrap();
        let mut query = result();
        let mut second = record("s2", 10);
        second.subject_frame = -1;
        second.subject_start = 20;
        second.subject_end = 15;
        query.records.push(second);
        writer.write_block(&[query]).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "@HD\tVN:1.6\tSO:unsorted");
        assert_eq!(lines[1], "@SQ\tSN:s1\tLN:12");
        assert_eq!(lines[2], "@SQ\tSN:s2\tLN:40");
        assert!(lines[3].starts_with("@PG\tID:lambda"));

        let first: Vec<&str> = lines[4].split('\t').collect();
        assert_eq!(&first[..6], &["q1", "0", "s1", "3", "255", "2M1D3M"]);
        assert!(first.contains(&"AS:i:24"));
        assert!(first.contains(&"NM:i:2"));

        let other: Vec<&str> = lines[5].split('\t').collect();
        assert_eq!(other[1], (FLAG_REVERSE | FLAG_SECONDARY).to_string());
        assert_eq!(other[3], "15");
    }

    #[test]
    fn test_empty_cigar() {
        assert_eq!(cigar(&[]), "*");
    }
}
