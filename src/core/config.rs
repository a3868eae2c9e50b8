use crate::LambdaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a configuration file when `--config` is not given.
pub const CONFIG_ENV: &str = "LAMBDA_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// `sa`, `fm` or `bifm`
    pub db_index_type: String,
    /// Suffix array construction: `default` or `radixsort`
    pub algorithm: String,
    pub genetic_code: u8,
    pub alphabet_reduction: u8,
    pub fm_occ_sampling: u32,
    pub sa_sampling: usize,
    pub truncate_ids: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_index_type: "fm".to_string(),
            algorithm: "default".to_string(),
            genetic_code: 1,
            alphabet_reduction: 0,
            fm_occ_sampling: 32,
            sa_sampling: 10,
            truncate_ids: true,
        }
    }
}

/// Search settings. Unset scoring and seeding values take program specific defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub alphabet_reduction: u8,
    pub seed_length: Option<usize>,
    pub seed_offset: Option<usize>,
    pub seed_delta: Option<usize>,
    pub double_indexing: bool,
    /// Query blocks in double-indexing mode; 0 picks ten per thread
    pub query_partitions: usize,
    pub e_value: f64,
    pub min_bit_score: f64,
    pub num_matches: usize,
    /// Stop extending candidates of a query after this many alignments
    pub max_matches: usize,
    pub x_drop: i32,
    /// Half band width; negative disables banding
    pub band: i64,
    /// `blosum62` or `match`; unset picks blosum62 for protein and match for blastn
    pub scoring_scheme: Option<String>,
    pub match_score: Option<i32>,
    pub mismatch_score: Option<i32>,
    pub gap_open: Option<i32>,
    pub gap_extend: Option<i32>,
    pub filter_putative_duplicates: bool,
    pub filter_putative_abundant: bool,
    pub merge_putative_siblings: bool,
    /// Tabular columns, `std` expands to the twelve BLAST defaults
    pub output_columns: String,
    pub truncate_ids: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            alphabet_reduction: 0,
            seed_length: None,
            seed_offset: None,
            seed_delta: None,
            double_indexing: true,
            query_partitions: 0,
            e_value: 1e-3,
            min_bit_score: 0.0,
            num_matches: 25,
            max_matches: 500,
            x_drop: 30,
            band: 64,
            scoring_scheme: None,
            match_score: None,
            mismatch_score: None,
            gap_open: None,
            gap_extend: None,
            filter_putative_duplicates: true,
            filter_putative_abundant: true,
            merge_putative_siblings: true,
            output_columns: "std".to_string(),
            truncate_ids: true,
        }
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, LambdaError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        LambdaError::Config(format!("Failed to read config {}: {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| LambdaError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), LambdaError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| LambdaError::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Config file to use: the explicit path, then `LAMBDA_CONFIG`, otherwise none.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

/// Load the configuration in lookup order, falling back to built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config, LambdaError> {
    match config_path(explicit) {
        Some(path) => {
            tracing::debug!("Reading configuration from {}", path.display());
            load_config(path)
        }
        None => Ok(default_config()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lambda.toml");
        std::fs::write(&path, "[search]\nseed_length = 8\nband = -1\n[index]\ndb_index_type = \"sa\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.search.seed_length, Some(8));
        assert_eq!(config.search.band, -1);
        assert_eq!(config.search.num_matches, 25);
        assert_eq!(config.index.db_index_type, "sa");
        assert_eq!(config.index.genetic_code, 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lambda.toml");
        let mut config = default_config();
        config.search.gap_open = Some(10);
        config.index.algorithm = "radixsort".to_string();
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[search\n").unwrap();
        assert!(matches!(load_config(&path), Err(LambdaError::Config(_))));
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/tmp/explicit.toml");
        assert_eq!(config_path(Some(explicit)), Some(explicit.to_path_buf()));
    }
}
