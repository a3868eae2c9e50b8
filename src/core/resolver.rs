//! Mapping of runtime options onto a specialised execution path.
//!
//! Every axis is decoded exactly once here; hot code receives the resolved
//! [`Specialization`] (or is monomorphised over it) instead of re-testing options.

use crate::bio::alphabet::Alphabet;
use crate::index::IndexKind;
use crate::{LambdaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Program {
    BlastN,
    BlastP,
    BlastX,
    TBlastN,
    TBlastX,
}

impl Program {
    pub const ALL: [Program; 5] = [
        Program::BlastN,
        Program::BlastP,
        Program::BlastX,
        Program::TBlastN,
        Program::TBlastX,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Program::BlastN => "blastn",
            Program::BlastP => "blastp",
            Program::BlastX => "blastx",
            Program::TBlastN => "tblastn",
            Program::TBlastX => "tblastx",
        }
    }

    pub fn translates_queries(&self) -> bool {
        matches!(self, Program::BlastX | Program::TBlastX)
    }

    pub fn translates_subjects(&self) -> bool {
        matches!(self, Program::TBlastN | Program::TBlastX)
    }

    pub fn is_nucleotide(&self) -> bool {
        matches!(self, Program::BlastN)
    }

    pub fn query_alphabet(&self) -> Alphabet {
        match self {
            Program::BlastN | Program::BlastX | Program::TBlastX => Alphabet::Dna5,
            Program::BlastP | Program::TBlastN => Alphabet::AminoAcid,
        }
    }

    pub fn subject_alphabet(&self) -> Alphabet {
        match self {
            Program::BlastN | Program::TBlastN | Program::TBlastX => Alphabet::Dna5,
            Program::BlastP | Program::BlastX => Alphabet::AminoAcid,
        }
    }

    /// Alphabet after translation (identical to the original when nothing is translated).
    pub fn translated_alphabet(&self) -> Alphabet {
        match self {
            Program::BlastN => Alphabet::Dna5,
            _ => Alphabet::AminoAcid,
        }
    }

    /// Number of searched sequences derived from one query.
    pub fn query_frames(&self) -> usize {
        match self {
            Program::BlastN => 2,
            Program::BlastX | Program::TBlastX => 6,
            Program::BlastP | Program::TBlastN => 1,
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Program {
    type Err = LambdaError;

    fn from_str(s: &str) -> Result<Self> {
        Program::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                LambdaError::Config(format!(
                    "unknown program '{}' (expected blastn, blastp, blastx, tblastn or tblastx)",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reduction {
    None,
    Murphy10,
}

impl Reduction {
    /// Decode the numeric reduction option. Sizes that exist in the option's documentation
    /// but have no implementation are refused instead of falling back to another alphabet.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Reduction::None),
            2 => Ok(Reduction::Murphy10),
            // 1, 8, 10 and 12 are documented cluster sizes without an implementation
            other => Err(LambdaError::UnsupportedReduction(other)),
        }
    }

    pub fn reduced_alphabet(&self, translated: Alphabet) -> Alphabet {
        match self {
            Reduction::None => translated,
            Reduction::Murphy10 => Alphabet::Murphy10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GapModel {
    Linear,
    Affine,
}

impl GapModel {
    pub fn from_gap_open(gap_open: i32) -> Self {
        if gap_open == 0 {
            GapModel::Linear
        } else {
            GapModel::Affine
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// `.m0`
    Pairwise,
    /// `.m8` (no comments) and `.m9` (comment block per query)
    Tabular { comments: bool },
    /// `.sam`
    Sam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

/// Decode the output format from a file name, stripping one compression suffix first.
pub fn resolve_output(path: &Path) -> Result<(OutputFormat, Compression)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LambdaError::Config(format!("invalid output path {}", path.display())))?;

    let (stem, compression) = if let Some(stem) = name.strip_suffix(".gz") {
        (stem, Compression::Gzip)
    } else if let Some(stem) = name.strip_suffix(".bz2") {
        (stem, Compression::Bzip2)
    } else {
        (name, Compression::None)
    };

    let extension = Path::new(stem)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let format = match extension.as_str() {
        "m0" => OutputFormat::Pairwise,
        "m8" => OutputFormat::Tabular { comments: false },
        "m9" => OutputFormat::Tabular { comments: true },
        "sam" => OutputFormat::Sam,
        "bam" => {
            return Err(LambdaError::Config(
                "BAM output is not supported by this build; write .sam and convert with samtools".to_string(),
            ))
        }
        _ => {
            return Err(LambdaError::Config(format!(
                "Cannot handle output extension of {}",
                path.display()
            )))
        }
    };
    Ok((format, compression))
}

/// The resolved combination of all option axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Specialization {
    pub program: Program,
    pub reduction: Reduction,
    pub gap_model: GapModel,
    pub index_kind: IndexKind,
    /// Absent when only an index is being built
    pub output: Option<(OutputFormat, Compression)>,
}

impl Specialization {
    pub fn original_subject_alphabet(&self) -> Alphabet {
        self.program.subject_alphabet()
    }

    pub fn translated_alphabet(&self) -> Alphabet {
        self.program.translated_alphabet()
    }

    pub fn reduced_alphabet(&self) -> Alphabet {
        self.reduction.reduced_alphabet(self.translated_alphabet())
    }

    /// Position width of the index over the reduced subject alphabet.
    pub fn position_width(&self) -> u32 {
        self.reduced_alphabet().position_width()
    }
}

/// Raw option values the resolver decides on.
#[derive(Debug, Clone, Copy)]
pub struct ResolverInput<'a> {
    pub program: Program,
    pub reduction: u8,
    pub gap_open: i32,
    pub index_kind: IndexKind,
    pub output: Option<&'a Path>,
}

pub fn resolve(input: &ResolverInput<'_>) -> Result<Specialization> {
    let reduction = Reduction::from_code(input.reduction)?;
    if input.program.is_nucleotide() && reduction != Reduction::None {
        return Err(LambdaError::Config(
            "alphabet reduction is only available for protein searches".to_string(),
        ));
    }
    if input.gap_open < 0 {
        return Err(LambdaError::Config(format!(
            "gap open cost must not be negative (got {})",
            input.gap_open
        )));
    }
    let output = input.output.map(resolve_output).transpose()?;

    Ok(Specialization {
        program: input.program,
        reduction,
        gap_model: GapModel::from_gap_open(input.gap_open),
        index_kind: input.index_kind,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(program: Program, reduction: u8) -> ResolverInput<'static> {
        ResolverInput {
            program,
            reduction,
            gap_open: 11,
            index_kind: IndexKind::Fm,
            output: Some(Path::new("out.m8")),
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        for program in Program::ALL {
            let reduction = if program.is_nucleotide() { 0 } else { 2 };
            let a = resolve(&input(program, reduction)).unwrap();
            let b = resolve(&input(program, reduction)).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_disabled_reductions_fail() {
        for code in [1u8, 8, 10, 12, 3, 255] {
            assert!(matches!(
                resolve(&input(Program::BlastP, code)),
                Err(LambdaError::UnsupportedReduction(c)) if c == code
            ));
        }
    }

    #[test]
    fn test_reduction_needs_protein() {
        assert!(resolve(&input(Program::BlastN, 2)).is_err());
        let spec = resolve(&input(Program::BlastX, 2)).unwrap();
        assert_eq!(spec.reduced_alphabet(), Alphabet::Murphy10);
        assert_eq!(spec.position_width(), 32);
    }

    #[test]
    fn test_gap_model() {
        let mut i = input(Program::BlastP, 0);
        i.gap_open = 0;
        assert_eq!(resolve(&i).unwrap().gap_model, GapModel::Linear);
        i.gap_open = 11;
        assert_eq!(resolve(&i).unwrap().gap_model, GapModel::Affine);
    }

    #[test]
    fn test_output_extensions() {
        let cases = [
            ("results.m8.gz", OutputFormat::Tabular { comments: false }, Compression::Gzip),
            ("results.m9", OutputFormat::Tabular { comments: true }, Compression::None),
            ("hits.m0.bz2", OutputFormat::Pairwise, Compression::Bzip2),
            ("dir/x.sam", OutputFormat::Sam, Compression::None),
        ];
        for (path, format, compression) in cases {
            assert_eq!(resolve_output(Path::new(path)).unwrap(), (format, compression));
        }
        let err = resolve_output(Path::new("results.txt")).unwrap_err();
        assert!(err.to_string().contains("Cannot handle output extension"));
        assert!(resolve_output(Path::new("results.gz")).is_err());
        assert!(resolve_output(Path::new("results.bam")).is_err());
    }

    #[test]
    fn test_program_alphabets() {
        assert_eq!(Program::TBlastN.subject_alphabet(), Alphabet::Dna5);
        assert_eq!(Program::TBlastN.translated_alphabet(), Alphabet::AminoAcid);
        assert_eq!(Program::BlastN.query_frames(), 2);
        assert_eq!(Program::TBlastX.query_frames(), 6);
        assert_eq!("TBLASTX".parse::<Program>().unwrap(), Program::TBlastX);
        assert!("blastz".parse::<Program>().is_err());
    }
}
