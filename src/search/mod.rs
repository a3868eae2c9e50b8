//! Parallel search of query blocks against a persisted index.

pub mod context;
pub mod engine;
pub mod seeds;
pub mod stats;
pub mod trie;

pub use engine::run_search;
pub use stats::SearchStats;
