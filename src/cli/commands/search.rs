use super::RunContext;
use crate::cli::formatter::{group_digits, notice, print_counters, print_settings, Notice};
use crate::core::config::SearchConfig;
use crate::core::options::SearchOptions;
use crate::core::resolver::Program;
use crate::index::{IndexKind, Manifest};
use crate::{pipeline_for, resolve};
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search program (blastn, blastp, blastx, tblastn, tblastx)
    #[arg(short, long)]
    pub program: Program,

    /// Query sequences (FASTA or FASTQ, optionally gzipped)
    #[arg(short, long, value_name = "FILE")]
    pub query: PathBuf,

    /// Index directory built by `lambda index`
    #[arg(short, long, value_name = "DIR")]
    pub index: PathBuf,

    /// Output file; the extension selects the format (.m0, .m8, .m9, .sam, plus .gz/.bz2)
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Alphabet reduction: 0 none, 2 Murphy10 (must match the index)
    #[arg(short = 'r', long)]
    pub alphabet_reduction: Option<u8>,

    /// Expected index structure; read from the index when omitted
    #[arg(long)]
    pub db_index_type: Option<IndexKind>,

    /// Genetic code for translated queries; must match the index for translated subjects
    #[arg(short = 'g', long)]
    pub genetic_code: Option<u8>,

    /// Scoring scheme: blosum62 or match
    #[arg(long)]
    pub scoring_scheme: Option<String>,

    /// Match score of the match/mismatch scheme
    #[arg(long = "match")]
    pub match_score: Option<i32>,

    /// Mismatch score of the match/mismatch scheme
    #[arg(long = "mismatch", allow_negative_numbers = true)]
    pub mismatch_score: Option<i32>,

    /// Gap open penalty; 0 selects linear gap costs
    #[arg(long)]
    pub gap_open: Option<i32>,

    /// Gap extension penalty
    #[arg(long)]
    pub gap_extend: Option<i32>,

    #[arg(long)]
    pub seed_length: Option<usize>,

    #[arg(long)]
    pub seed_offset: Option<usize>,

    /// Substitutions allowed inside a seed
    #[arg(long)]
    pub seed_delta: Option<usize>,

    /// Build a seed trie per query block (true|false)
    #[arg(long, value_name = "BOOL")]
    pub double_indexing: Option<bool>,

    /// Number of query blocks with double indexing (0 = ten per thread)
    #[arg(long)]
    pub query_partitions: Option<usize>,

    #[arg(long, value_name = "BOOL")]
    pub filter_putative_duplicates: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub filter_putative_abundant: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub merge_putative_siblings: Option<bool>,

    /// Maximum E-value of reported matches
    #[arg(short = 'e', long)]
    pub e_value: Option<f64>,

    #[arg(long)]
    pub min_bit_score: Option<f64>,

    /// Matches reported per query
    #[arg(short = 'n', long)]
    pub num_matches: Option<usize>,

    /// Alignments per query after which remaining candidates are skipped
    #[arg(long)]
    pub max_matches: Option<usize>,

    #[arg(long)]
    pub x_drop: Option<i32>,

    /// Half band width of the gapped extension; negative aligns unbanded
    #[arg(long, allow_negative_numbers = true)]
    pub band: Option<i64>,

    /// Tabular columns, e.g. "std staxids" (default: std)
    #[arg(long)]
    pub output_columns: Option<String>,

    /// Keep the whole FASTA header line as query id
    #[arg(long)]
    pub keep_full_ids: bool,

    /// Also write the run statistics as JSON
    #[arg(long, value_name = "FILE")]
    pub stats_json: Option<PathBuf>,
}

impl SearchArgs {
    /// Command line values on top of the configuration file.
    fn apply(&self, config: &SearchConfig) -> SearchConfig {
        let mut config = config.clone();
        if let Some(value) = self.alphabet_reduction {
            config.alphabet_reduction = value;
        }
        if let Some(value) = self.double_indexing {
            config.double_indexing = value;
        }
        if let Some(value) = self.query_partitions {
            config.query_partitions = value;
        }
        if let Some(value) = self.filter_putative_duplicates {
            config.filter_putative_duplicates = value;
        }
        if let Some(value) = self.filter_putative_abundant {
            config.filter_putative_abundant = value;
        }
        if let Some(value) = self.merge_putative_siblings {
            config.merge_putative_siblings = value;
        }
        if let Some(value) = self.e_value {
            config.e_value = value;
        }
        if let Some(value) = self.min_bit_score {
            config.min_bit_score = value;
        }
        if let Some(value) = self.num_matches {
            config.num_matches = value;
        }
        if let Some(value) = self.max_matches {
            config.max_matches = value;
        }
        if let Some(value) = self.x_drop {
            config.x_drop = value;
        }
        if let Some(value) = self.band {
            config.band = value;
        }
        if let Some(columns) = &self.output_columns {
            config.output_columns = columns.clone();
        }
        config.seed_length = self.seed_length.or(config.seed_length);
        config.seed_offset = self.seed_offset.or(config.seed_offset);
        config.seed_delta = self.seed_delta.or(config.seed_delta);
        config.match_score = self.match_score.or(config.match_score);
        config.mismatch_score = self.mismatch_score.or(config.mismatch_score);
        config.gap_open = self.gap_open.or(config.gap_open);
        config.gap_extend = self.gap_extend.or(config.gap_extend);
        config.scoring_scheme = self.scoring_scheme.clone().or(config.scoring_scheme);
        if self.keep_full_ids {
            config.truncate_ids = false;
        }
        config
    }
}

pub fn run(args: SearchArgs, ctx: &RunContext) -> anyhow::Result<()> {
    let config = args.apply(&ctx.config.search);
    let mut options = SearchOptions::from_config(
        args.program,
        args.query.clone(),
        args.index.clone(),
        args.output.clone(),
        &config,
    )?;
    options.index_kind = args.db_index_type;
    options.genetic_code = args.genetic_code;
    options.threads = ctx.threads;
    options.verbosity = ctx.verbosity;
    options.stats_json = args.stats_json;

    let manifest = Manifest::read(&options.index_dir)
        .with_context(|| format!("reading the index at {}", options.index_dir.display()))?;
    let kind = options.index_kind.unwrap_or(manifest.db_index_type);
    let spec = resolve(&options.resolver_input(kind))?;
    tracing::debug!("Resolved search configuration: {:?}", spec);

    if ctx.verbosity > 0 {
        print_settings(
            "Searching",
            &[
                ("Program", spec.program.to_string()),
                ("Queries", options.query.display().to_string()),
                ("Index", format!("{} ({})", options.index_dir.display(), kind)),
                ("Output", options.output.display().to_string()),
                ("Threads", options.thread_count().to_string()),
            ],
        );
    }

    let stats = pipeline_for(spec)
        .search(&options)
        .with_context(|| format!("searching {}", options.query.display()))?;

    if ctx.verbosity > 0 {
        print_counters("Search statistics", stats.rows());
        if stats.is_degraded() {
            notice(
                Notice::Warning,
                &format!(
                    "{} query blocks failed, results are incomplete",
                    stats.blocks_failed
                ),
            );
        }
        notice(
            Notice::Success,
            &format!(
                "{} matches for {} of {} queries written to {}",
                group_digits(stats.matches),
                group_digits(stats.queries_with_matches),
                group_digits(stats.queries),
                options.output.display()
            ),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(extra: &[&str]) -> SearchArgs {
        let mut argv = vec![
            "lambda", "search", "-p", "blastn", "-q", "q.fa", "-i", "db.lambda", "-o", "out.m8",
        ];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Search(args) => args,
            Commands::Index(_) => unreachable!(),
        }
    }

    #[test]
    fn test_command_line_overrides_config() {
        let args = parse(&[
            "--mismatch", "-4", "--band", "-1", "--double-indexing", "false", "-e", "10",
            "--seed-length", "11",
        ]);
        let base = SearchConfig {
            x_drop: 50,
            ..SearchConfig::default()
        };
        let config = args.apply(&base);
        assert_eq!(config.mismatch_score, Some(-4));
        assert_eq!(config.band, -1);
        assert!(!config.double_indexing);
        assert_eq!(config.e_value, 10.0);
        assert_eq!(config.seed_length, Some(11));
        // untouched values come from the file
        assert_eq!(config.x_drop, 50);
        assert_eq!(config.seed_offset, None);
    }
}
