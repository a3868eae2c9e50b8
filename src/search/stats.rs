//! Search counters, collected per worker and merged at the end of the parallel region.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub blocks: u64,
    /// Blocks abandoned after a failing stage; their queries are missing from the output
    pub blocks_failed: u64,
    pub queries: u64,
    pub seeds: u64,
    pub hits: u64,
    pub merged_siblings: u64,
    pub duplicates: u64,
    pub abundant: u64,
    pub failed_extensions: u64,
    pub below_threshold: u64,
    pub matches: u64,
    pub queries_with_matches: u64,
    pub queries_with_lca: u64,
    pub timings: StageTimings,
}

/// Wall time spent in every block stage, summed over workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub seeding: Duration,
    pub trie: Duration,
    pub searching: Duration,
    pub sorting: Duration,
    pub extending: Duration,
}

impl StageTimings {
    pub fn merge(&mut self, other: &StageTimings) {
        self.seeding += other.seeding;
        self.trie += other.trie;
        self.searching += other.searching;
        self.sorting += other.sorting;
        self.extending += other.extending;
    }
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.blocks += other.blocks;
        self.blocks_failed += other.blocks_failed;
        self.queries += other.queries;
        self.seeds += other.seeds;
        self.hits += other.hits;
        self.merged_siblings += other.merged_siblings;
        self.duplicates += other.duplicates;
        self.abundant += other.abundant;
        self.failed_extensions += other.failed_extensions;
        self.below_threshold += other.below_threshold;
        self.matches += other.matches;
        self.queries_with_matches += other.queries_with_matches;
        self.queries_with_lca += other.queries_with_lca;
        self.timings.merge(&other.timings);
    }

    /// Whether some blocks were skipped and the output is incomplete.
    pub fn is_degraded(&self) -> bool {
        self.blocks_failed > 0
    }

    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let secs = |d: Duration| format!("{:.3}s", d.as_secs_f64());
        vec![
            ("Query blocks", self.blocks.to_string()),
            ("Failed blocks", self.blocks_failed.to_string()),
            ("Queries", self.queries.to_string()),
            ("Seeds", self.seeds.to_string()),
            ("Hits after seeding", self.hits.to_string()),
            ("Merged siblings", self.merged_siblings.to_string()),
            ("Putative duplicates", self.duplicates.to_string()),
            ("Putative abundant", self.abundant.to_string()),
            ("Failed extensions", self.failed_extensions.to_string()),
            ("Below thresholds", self.below_threshold.to_string()),
            ("Matches", self.matches.to_string()),
            ("Queries with matches", self.queries_with_matches.to_string()),
            ("Queries with LCA", self.queries_with_lca.to_string()),
            ("Seeding", secs(self.timings.seeding)),
            ("Trie building", secs(self.timings.trie)),
            ("Searching", secs(self.timings.searching)),
            ("Sorting", secs(self.timings.sorting)),
            ("Extending", secs(self.timings.extending)),
        ]
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| crate::LambdaError::Output(format!("cannot encode statistics: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_adds_counters() {
        let mut a = SearchStats {
            blocks: 2,
            hits: 10,
            ..Default::default()
        };
        a.timings.extending = Duration::from_millis(5);
        let mut b = SearchStats {
            blocks: 3,
            blocks_failed: 1,
            matches: 4,
            ..Default::default()
        };
        b.timings.extending = Duration::from_millis(7);
        a.merge(&b);
        assert_eq!(a.blocks, 5);
        assert_eq!(a.hits, 10);
        assert_eq!(a.matches, 4);
        assert!(a.is_degraded());
        assert_eq!(a.timings.extending, Duration::from_millis(12));
    }

    #[test]
    fn test_json_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        let stats = SearchStats {
            queries: 3,
            ..Default::default()
        };
        stats.write_json(&path).unwrap();
        let back: SearchStats =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, stats);
    }
}
