use crate::bio::alphabet::Alphabet;
use crate::bio::sequence::SequenceCollection;
use crate::{LambdaError, Result};
use flate2::read::MultiGzDecoder;
use memmap2::Mmap;
use nom::{
    bytes::complete::{tag, take_till},
    character::complete::line_ending,
    combinator::opt,
    IResult,
};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Sequences loaded from a FASTA/FASTQ file together with their identifiers.
#[derive(Debug, Default)]
pub struct LoadedSequences {
    pub ids: Vec<String>,
    pub sequences: SequenceCollection,
}

/// Parse a header line (`>` or `@` already identified by the caller)
fn parse_header(input: &[u8], marker: u8) -> IResult<&[u8], &[u8]> {
    let (input, _) = tag(&[marker][..])(input)?;
    let (input, header) = take_till(|c: u8| c == b'\n' || c == b'\r')(input)?;
    let (input, _) = opt(line_ending)(input)?;
    Ok((input, header))
}

/// Take one line of residues
fn parse_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, line) = take_till(|c: u8| c == b'\n' || c == b'\r')(input)?;
    let (input, _) = opt(line_ending)(input)?;
    Ok((input, line))
}

fn skip_blank(mut input: &[u8]) -> &[u8] {
    while let Some((&c, rest)) = input.split_first() {
        if c.is_ascii_whitespace() {
            input = rest;
        } else {
            break;
        }
    }
    input
}

fn header_to_id(header: &[u8], truncate: bool) -> String {
    let header = String::from_utf8_lossy(header);
    let header = header.trim();
    if truncate {
        header.split_whitespace().next().unwrap_or("").to_string()
    } else {
        header.to_string()
    }
}

/// Parse FASTA or FASTQ records from a byte buffer, sanitising residues into `alphabet`.
pub fn parse_sequences(data: &[u8], alphabet: Alphabet, truncate_ids: bool) -> Result<LoadedSequences> {
    let mut loaded = LoadedSequences::default();
    let mut input = skip_blank(data);
    let mut residues = Vec::new();
    let mut dropped = 0usize;

    while !input.is_empty() {
        let marker = input[0];
        let (rest, header) = match marker {
            b'>' | b'@' => parse_header(input, marker)
                .map_err(|e| LambdaError::Parse(format!("Failed to parse sequence header: {:?}", e)))?,
            _ => {
                return Err(LambdaError::Parse(format!(
                    "Expected '>' or '@' at the start of a record, found '{}'",
                    marker as char
                )))
            }
        };
        input = rest;
        residues.clear();

        if marker == b'>' {
            while !input.is_empty() && input[0] != b'>' {
                let (rest, line) = parse_line(input)
                    .map_err(|e| LambdaError::Parse(format!("Failed to parse FASTA sequence: {:?}", e)))?;
                residues.extend(
                    line.iter()
                        .filter(|c| !c.is_ascii_whitespace())
                        .map(|&c| alphabet.convert(c)),
                );
                input = rest;
            }
        } else {
            // FASTQ: sequence line, '+' separator, quality line of the same length
            let (rest, line) = parse_line(input)
                .map_err(|e| LambdaError::Parse(format!("Failed to parse FASTQ sequence: {:?}", e)))?;
            residues.extend(line.iter().map(|&c| alphabet.convert(c)));
            let (rest, separator) = parse_line(rest)
                .map_err(|e| LambdaError::Parse(format!("Failed to parse FASTQ separator: {:?}", e)))?;
            if separator.first() != Some(&b'+') {
                return Err(LambdaError::Parse(format!(
                    "FASTQ record '{}' is missing its '+' line",
                    header_to_id(header, true)
                )));
            }
            let (rest, _quality) = parse_line(rest)
                .map_err(|e| LambdaError::Parse(format!("Failed to parse FASTQ quality: {:?}", e)))?;
            input = rest;
        }

        if residues.is_empty() {
            dropped += 1;
        } else {
            loaded.ids.push(header_to_id(header, truncate_ids));
            loaded.sequences.push(&residues);
        }
        input = skip_blank(input);
    }

    if dropped > 0 {
        tracing::warn!("Skipped {} empty sequence record(s)", dropped);
    }
    Ok(loaded)
}

/// Load a sequence file (FASTA or FASTQ, optionally gzip compressed).
pub fn load_sequences<P: AsRef<Path>>(path: P, alphabet: Alphabet, truncate_ids: bool) -> Result<LoadedSequences> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        LambdaError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot open {}: {}", path.display(), e),
        ))
    })?;

    let loaded = if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        let mut decoder = MultiGzDecoder::new(BufReader::new(file));
        let mut buffer = Vec::new();
        decoder.read_to_end(&mut buffer)?;
        parse_sequences(&buffer, alphabet, truncate_ids)?
    } else if file.metadata()?.len() == 0 {
        LoadedSequences::default()
    } else {
        let mmap = unsafe { Mmap::map(&file)? };
        parse_sequences(&mmap[..], alphabet, truncate_ids)?
    };

    tracing::debug!(
        "Loaded {} sequences ({} residues) from {}",
        loaded.sequences.len(),
        loaded.sequences.total_len(),
        path.display()
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fasta_records() {
        let data = b">sp|P12345|PROT_HUMAN Description here\nMKV\nLLA\n\n>seq2\nacgu\n";
        let loaded = parse_sequences(data, Alphabet::AminoAcid, true).unwrap();
        assert_eq!(loaded.ids, vec!["sp|P12345|PROT_HUMAN", "seq2"]);
        assert_eq!(loaded.sequences.get(0), b"MKVLLA");
        assert_eq!(loaded.sequences.get(1), b"ACGU");
    }

    #[test]
    fn test_full_ids_kept_on_request() {
        let data = b">id1 some words\nACGT\n";
        let loaded = parse_sequences(data, Alphabet::Dna5, false).unwrap();
        assert_eq!(loaded.ids, vec!["id1 some words"]);
    }

    #[test]
    fn test_parse_fastq_records() {
        let data = b"@r1\nACGTX\n+\nIIIII\n@r2 extra\nGG\n+r2\n##\n";
        let loaded = parse_sequences(data, Alphabet::Dna5, true).unwrap();
        assert_eq!(loaded.ids, vec!["r1", "r2"]);
        assert_eq!(loaded.sequences.get(0), b"ACGTN");
        assert_eq!(loaded.sequences.get(1), b"GG");
    }

    #[test]
    fn test_empty_records_are_dropped() {
        let data = b">empty\n>full\nMK\n";
        let loaded = parse_sequences(data, Alphabet::AminoAcid, true).unwrap();
        assert_eq!(loaded.ids, vec!["full"]);
        assert_eq!(loaded.sequences.len(), 1);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_sequences(b"ACGT\n", Alphabet::Dna5, true).is_err());
        assert!(parse_sequences(b"@r1\nACGT\nIIII\n", Alphabet::Dna5, true).is_err());
    }

    #[test]
    fn test_windows_line_endings() {
        let data = b">a\r\nMK\r\nVL\r\n";
        let loaded = parse_sequences(data, Alphabet::AminoAcid, true).unwrap();
        assert_eq!(loaded.sequences.get(0), b"MKVL");
    }
}
