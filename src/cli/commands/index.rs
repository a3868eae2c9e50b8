use super::RunContext;
use crate::cli::formatter::{group_digits, notice, print_counters, print_settings, Notice};
use crate::core::config::IndexConfig;
use crate::core::options::IndexOptions;
use crate::core::resolver::Program;
use crate::index::IndexKind;
use crate::{pipeline_for, resolve};
use anyhow::Context;
use clap::Args;
use humansize::{format_size, BINARY};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Search program the index is built for (blastn, blastp, blastx, tblastn, tblastx)
    #[arg(short, long)]
    pub program: Program,

    /// Subject sequences (FASTA or FASTQ, optionally gzipped)
    #[arg(short, long, value_name = "FILE")]
    pub database: PathBuf,

    /// Index directory to create (default: <DATABASE>.lambda)
    #[arg(short, long, value_name = "DIR")]
    pub index: Option<PathBuf>,

    /// Alphabet reduction: 0 none, 2 Murphy10
    #[arg(short = 'r', long)]
    pub alphabet_reduction: Option<u8>,

    /// Index structure: sa, fm or bifm
    #[arg(long)]
    pub db_index_type: Option<IndexKind>,

    /// Suffix array construction strategy: default or radixsort
    #[arg(long)]
    pub algorithm: Option<String>,

    /// NCBI genetic code used to translate subjects
    #[arg(short = 'g', long)]
    pub genetic_code: Option<u8>,

    /// Accession to taxid mapping (NCBI accession2taxid or UniProt idmapping)
    #[arg(long, value_name = "FILE")]
    pub acc_tax_map: Option<PathBuf>,

    /// Directory containing nodes.dmp and names.dmp
    #[arg(long, value_name = "DIR", requires = "acc_tax_map")]
    pub tax_dump_dir: Option<PathBuf>,

    /// Keep the whole FASTA header line as subject id
    #[arg(long)]
    pub keep_full_ids: bool,
}

impl IndexArgs {
    /// Command line values on top of the configuration file.
    fn apply(&self, config: &IndexConfig) -> IndexConfig {
        let mut config = config.clone();
        if let Some(reduction) = self.alphabet_reduction {
            config.alphabet_reduction = reduction;
        }
        if let Some(kind) = self.db_index_type {
            config.db_index_type = kind.name().to_string();
        }
        if let Some(algorithm) = &self.algorithm {
            config.algorithm = algorithm.clone();
        }
        if let Some(code) = self.genetic_code {
            config.genetic_code = code;
        }
        if self.keep_full_ids {
            config.truncate_ids = false;
        }
        config
    }
}

pub fn run(args: IndexArgs, ctx: &RunContext) -> anyhow::Result<()> {
    let config = args.apply(&ctx.config.index);
    let mut options = IndexOptions::from_config(
        args.program,
        args.database.clone(),
        args.index.clone(),
        &config,
    )?;
    options.acc_tax_map = args.acc_tax_map;
    options.tax_dump_dir = args.tax_dump_dir;

    let spec = resolve(&options.resolver_input())?;
    tracing::debug!("Resolved index configuration: {:?}", spec);

    if ctx.verbosity > 0 {
        print_settings(
            "Building index",
            &[
                ("Program", spec.program.to_string()),
                ("Database", options.database.display().to_string()),
                ("Index", options.index_dir.display().to_string()),
                ("Index type", spec.index_kind.to_string()),
                ("Alphabet", spec.reduced_alphabet().to_string()),
            ],
        );
    }

    let summary = pipeline_for(spec)
        .build_index(&options)
        .with_context(|| format!("building the index for {}", options.database.display()))?;

    if ctx.verbosity > 0 {
        let on_disk: u64 = std::fs::read_dir(&summary.index_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok()?.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0);
        let mut rows = vec![
            ("Sequences", group_digits(summary.sequences as u64)),
            ("Indexed residues", group_digits(summary.text_length)),
            ("Index size", format_size(on_disk, BINARY)),
        ];
        if let Some(nodes) = summary.taxonomy_nodes {
            rows.push(("Taxonomy nodes", group_digits(nodes as u64)));
        }
        print_counters("Index", rows);
        notice(
            Notice::Success,
            &format!("Index written to {}", summary.index_dir.display()),
        );
        if summary.taxonomy_nodes.is_none() && options.acc_tax_map.is_none() {
            notice(
                Notice::Tip,
                "pass --acc-tax-map and --tax-dump-dir to report taxonomy in search results",
            );
        }
    }
    Ok(())
}
