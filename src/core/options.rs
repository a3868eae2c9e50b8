//! Fully resolved options of the two sub-commands.
//!
//! Values come from the configuration file first; the command line overrides them before
//! the structs are handed to the pipelines. Program dependent defaults are filled in here.

use super::config::{IndexConfig, SearchConfig};
use super::resolver::{Program, ResolverInput};
use crate::bio::alignment::{ExtensionParams, ScoringScheme};
use crate::bio::alphabet::Alphabet;
use crate::index::{FmSampling, IndexKind, SaAlgorithm};
use crate::{LambdaError, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub program: Program,
    pub database: PathBuf,
    pub index_dir: PathBuf,
    pub reduction: u8,
    pub index_kind: IndexKind,
    pub algorithm: SaAlgorithm,
    pub genetic_code: u8,
    pub fm_sampling: FmSampling,
    pub acc_tax_map: Option<PathBuf>,
    pub tax_dump_dir: Option<PathBuf>,
    pub truncate_ids: bool,
}

/// `<database>.lambda` next to the database file.
pub fn default_index_dir(database: &Path) -> PathBuf {
    let mut name = database.as_os_str().to_owned();
    name.push(".lambda");
    PathBuf::from(name)
}

impl IndexOptions {
    pub fn from_config(
        program: Program,
        database: PathBuf,
        index_dir: Option<PathBuf>,
        config: &IndexConfig,
    ) -> Result<Self> {
        let index_dir = index_dir.unwrap_or_else(|| default_index_dir(&database));
        Ok(Self {
            program,
            database,
            index_dir,
            reduction: config.alphabet_reduction,
            index_kind: config.db_index_type.parse()?,
            algorithm: config.algorithm.parse()?,
            genetic_code: config.genetic_code,
            fm_sampling: FmSampling {
                occ: config.fm_occ_sampling,
                sa: config.sa_sampling,
            },
            acc_tax_map: None,
            tax_dump_dir: None,
            truncate_ids: config.truncate_ids,
        })
    }

    pub fn resolver_input(&self) -> ResolverInput<'_> {
        ResolverInput {
            program: self.program,
            reduction: self.reduction,
            // no alignment happens while indexing
            gap_open: 0,
            index_kind: self.index_kind,
            output: None,
        }
    }

    pub fn wants_taxonomy(&self) -> bool {
        self.acc_tax_map.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tax_dump_dir.is_some() && self.acc_tax_map.is_none() {
            return Err(LambdaError::Config(
                "--tax-dump-dir requires --acc-tax-map".to_string(),
            ));
        }
        if self.algorithm != SaAlgorithm::Default && self.index_kind != IndexKind::Sa {
            tracing::warn!(
                "--algorithm only affects suffix array indexes, ignoring it for {}",
                self.index_kind
            );
        }
        Ok(())
    }
}

/// Which residue scoring to use before gap costs are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringKind {
    Blosum62,
    MatchMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringOptions {
    pub kind: ScoringKind,
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl ScoringOptions {
    pub fn build(&self, alphabet: Alphabet) -> Result<ScoringScheme> {
        match self.kind {
            ScoringKind::Blosum62 => {
                if alphabet.is_nucleotide() {
                    return Err(LambdaError::Config(
                        "BLOSUM62 cannot score nucleotide alignments".to_string(),
                    ));
                }
                ScoringScheme::blosum62(self.gap_open, self.gap_extend)
            }
            ScoringKind::MatchMismatch => ScoringScheme::match_mismatch(
                self.match_score,
                self.mismatch_score,
                self.gap_open,
                self.gap_extend,
                alphabet,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOptions {
    pub length: usize,
    /// Distance between the starts of consecutive seeds
    pub offset: usize,
    /// Mismatches allowed while searching a seed
    pub delta: usize,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub program: Program,
    pub query: PathBuf,
    pub index_dir: PathBuf,
    pub output: PathBuf,
    pub reduction: u8,
    /// When set, must agree with the index manifest
    pub index_kind: Option<IndexKind>,
    pub genetic_code: Option<u8>,
    pub scoring: ScoringOptions,
    pub seed: SeedOptions,
    pub double_indexing: bool,
    pub query_partitions: usize,
    pub threads: usize,
    pub e_value: f64,
    pub min_bit_score: f64,
    pub num_matches: usize,
    pub max_matches: usize,
    pub x_drop: i32,
    pub band: Option<usize>,
    pub filter_putative_duplicates: bool,
    pub filter_putative_abundant: bool,
    pub merge_putative_siblings: bool,
    pub output_columns: String,
    pub truncate_ids: bool,
    pub stats_json: Option<PathBuf>,
    pub verbosity: u8,
}

impl SearchOptions {
    pub fn from_config(
        program: Program,
        query: PathBuf,
        index_dir: PathBuf,
        output: PathBuf,
        config: &SearchConfig,
    ) -> Result<Self> {
        let nucleotide = program.is_nucleotide();
        let kind = match config.scoring_scheme.as_deref() {
            None if nucleotide => ScoringKind::MatchMismatch,
            None => ScoringKind::Blosum62,
            Some(name) => parse_scoring_kind(name)?,
        };
        let (default_match, default_mismatch) = if nucleotide { (2, -3) } else { (1, -1) };
        let (default_open, default_extend) = if nucleotide { (5, 2) } else { (11, 1) };
        let (default_length, default_offset, default_delta) =
            if nucleotide { (14, 7, 0) } else { (10, 5, 1) };

        Ok(Self {
            program,
            query,
            index_dir,
            output,
            reduction: config.alphabet_reduction,
            index_kind: None,
            genetic_code: None,
            scoring: ScoringOptions {
                kind,
                match_score: config.match_score.unwrap_or(default_match),
                mismatch_score: config.mismatch_score.unwrap_or(default_mismatch),
                gap_open: config.gap_open.unwrap_or(default_open),
                gap_extend: config.gap_extend.unwrap_or(default_extend),
            },
            seed: SeedOptions {
                length: config.seed_length.unwrap_or(default_length),
                offset: config.seed_offset.unwrap_or(default_offset),
                delta: config.seed_delta.unwrap_or(default_delta),
            },
            double_indexing: config.double_indexing,
            query_partitions: config.query_partitions,
            threads: 0,
            e_value: config.e_value,
            min_bit_score: config.min_bit_score,
            num_matches: config.num_matches,
            max_matches: config.max_matches,
            x_drop: config.x_drop,
            band: usize::try_from(config.band).ok(),
            filter_putative_duplicates: config.filter_putative_duplicates,
            filter_putative_abundant: config.filter_putative_abundant,
            merge_putative_siblings: config.merge_putative_siblings,
            output_columns: config.output_columns.clone(),
            truncate_ids: config.truncate_ids,
            stats_json: None,
            verbosity: 0,
        })
    }

    pub fn resolver_input(&self, index_kind: IndexKind) -> ResolverInput<'_> {
        ResolverInput {
            program: self.program,
            reduction: self.reduction,
            gap_open: self.scoring.gap_open,
            index_kind,
            output: Some(self.output.as_path()),
        }
    }

    /// Worker count, with 0 meaning every available core.
    pub fn thread_count(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Query blocks used in double-indexing mode.
    pub fn partitions(&self) -> usize {
        if self.query_partitions == 0 {
            self.thread_count() * 10
        } else {
            self.query_partitions
        }
    }

    pub fn extension_params(&self) -> ExtensionParams {
        ExtensionParams {
            x_drop: self.x_drop,
            band: self.band,
        }
    }

    pub fn any_filter(&self) -> bool {
        self.filter_putative_duplicates || self.filter_putative_abundant || self.merge_putative_siblings
    }

    pub fn validate(&self) -> Result<()> {
        if self.seed.length < 2 {
            return Err(LambdaError::Config(format!(
                "seed length must be at least 2 (got {})",
                self.seed.length
            )));
        }
        if self.seed.offset == 0 {
            return Err(LambdaError::Config("seed offset must be positive".to_string()));
        }
        if self.seed.delta >= self.seed.length {
            return Err(LambdaError::Config(format!(
                "seed delta {} must be smaller than the seed length {}",
                self.seed.delta, self.seed.length
            )));
        }
        if self.num_matches == 0 {
            return Err(LambdaError::Config("num-matches must be positive".to_string()));
        }
        if self.e_value.is_nan() || self.e_value <= 0.0 {
            return Err(LambdaError::Config(format!(
                "e-value cutoff must be positive (got {})",
                self.e_value
            )));
        }
        if self.x_drop < 0 {
            return Err(LambdaError::Config("x-drop must not be negative".to_string()));
        }
        Ok(())
    }
}

fn parse_scoring_kind(name: &str) -> Result<ScoringKind> {
    match name.to_ascii_lowercase().as_str() {
        "blosum62" => Ok(ScoringKind::Blosum62),
        "match" | "match-mismatch" => Ok(ScoringKind::MatchMismatch),
        other => Err(LambdaError::Config(format!(
            "unknown scoring scheme '{}' (expected blosum62 or match)",
            other
        ))),
    }
}
