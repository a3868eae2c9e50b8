/// Shared setup for the integration tests: a scratch directory, FASTA writers and
/// helpers that build an index and run a search through the public pipeline.
use lambda::core::config::{IndexConfig, SearchConfig};
use lambda::core::memory::FixedProbe;
use lambda::core::pipeline::pipeline_with_probe;
use lambda::core::resolver::Program;
use lambda::core::{IndexOptions, SearchOptions};
use lambda::index::{IndexKind, IndexSummary};
use lambda::search::SearchStats;
use lambda::{pipeline_for, resolve};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const AMINO_ACIDS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";
pub const NUCLEOTIDES: &[u8] = b"ACGT";

/// Test environment that owns a temporary directory for inputs, indexes and outputs
pub struct TestEnvironment {
    temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestEnvironment {
    pub fn new() -> Self {
        TestEnvironment {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Get a path within the test environment
    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    pub fn write_fasta(&self, relative: &str, records: &[(String, Vec<u8>)]) -> PathBuf {
        self.write(relative, &fasta(records))
    }

    pub fn index_options(&self, program: Program, database: &Path, kind: IndexKind) -> IndexOptions {
        let config = IndexConfig {
            db_index_type: kind.name().to_string(),
            ..IndexConfig::default()
        };
        IndexOptions::from_config(program, database.to_path_buf(), None, &config)
            .expect("Failed to build index options")
    }

    pub fn build_index(&self, options: &IndexOptions) -> lambda::Result<IndexSummary> {
        let spec = resolve(&options.resolver_input())?;
        pipeline_for(spec).build_index(options)
    }

    /// Search options with default settings and a single worker.
    pub fn search_options(
        &self,
        program: Program,
        query: &Path,
        index_dir: &Path,
        output: &str,
    ) -> SearchOptions {
        let mut options = SearchOptions::from_config(
            program,
            query.to_path_buf(),
            index_dir.to_path_buf(),
            self.path(output),
            &SearchConfig::default(),
        )
        .expect("Failed to build search options");
        options.threads = 1;
        options
    }

    /// Search with the kind recorded in the index and an unlimited memory probe.
    pub fn search(&self, options: &SearchOptions, kind: IndexKind) -> lambda::Result<SearchStats> {
        let spec = resolve(&options.resolver_input(kind))?;
        pipeline_with_probe(spec, Box::new(FixedProbe(u64::MAX))).search(options)
    }
}

pub fn fasta(records: &[(String, Vec<u8>)]) -> String {
    let mut out = String::new();
    for (id, seq) in records {
        out.push('>');
        out.push_str(id);
        out.push('\n');
        for line in seq.chunks(60) {
            out.push_str(std::str::from_utf8(line).expect("ASCII sequence"));
            out.push('\n');
        }
    }
    out
}

#[allow(dead_code)]
pub fn random_sequence(rng: &mut StdRng, symbols: &[u8], len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| symbols[rng.gen_range(0..symbols.len())])
        .collect()
}

#[allow(dead_code)]
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Lines of a tabular result file, without comments, as a set.
#[allow(dead_code)]
pub fn tabular_lines(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Split a tabular line into its fields.
#[allow(dead_code)]
pub fn fields(line: &str) -> Vec<&str> {
    line.split('\t').collect()
}
