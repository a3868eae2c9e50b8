pub mod commands;
pub mod formatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lambda",
    version,
    about = "Local aligner for massive biological data",
    long_about = "LAMBDA builds a searchable index over a subject database and aligns queries \
                  against it with BLAST-compatible scoring and output. Supports blastn, blastp, \
                  blastx, tblastn and tblastx searches."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Number of threads to use (0 = all available)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    pub threads: usize,

    /// TOML configuration file (default: $LAMBDA_CONFIG)
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Verbosity with `--quiet` folded in: 0 quiet, 1 normal, 2+ debug.
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose.saturating_add(1)
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an index over a subject database
    Index(commands::index::IndexArgs),

    /// Search queries against an index
    Search(commands::search::SearchArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lambda", "search", "-p", "blastp", "-q", "q.fa", "-i", "db.lambda", "-o", "out.m8",
            "-j", "4", "-v",
        ])
        .unwrap();
        assert_eq!(cli.threads, 4);
        assert_eq!(cli.verbosity(), 2);
        assert!(matches!(cli.command, Commands::Search(_)));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["lambda", "--quiet", "-v", "index", "-p", "blastp", "-d", "db.fa"]).is_err());
        let cli = Cli::try_parse_from(["lambda", "--quiet", "index", "-p", "blastp", "-d", "db.fa"]).unwrap();
        assert_eq!(cli.verbosity(), 0);
    }
}
