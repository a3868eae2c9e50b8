/// Available-memory probing and the pre-search resource check
use crate::index::{index_files, IndexKind, SEQS_FILE, TAX_TREE_FILE, STAXIDS_FILE};
use crate::{LambdaError, Result};
use humansize::{format_size, BINARY};
use std::path::Path;
use sysinfo::System;

/// Source of the number of bytes the process may still allocate.
pub trait MemoryProbe: Send + Sync {
    fn available_memory(&self) -> u64;
}

/// Probe backed by the operating system's memory counters
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl MemoryProbe for SysinfoProbe {
    fn available_memory(&self) -> u64 {
        let mut system = System::new();
        system.refresh_memory();
        system.available_memory()
    }
}

/// Fixed value, for tests and for disabling the check
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub u64);

impl MemoryProbe for FixedProbe {
    fn available_memory(&self) -> u64 {
        self.0
    }
}

/// Estimated resident size of a loaded index plus the query file.
///
/// Index files are deserialised one to one, queries grow by their frames.
pub fn estimate_search_memory(
    index_dir: &Path,
    kind: IndexKind,
    query_file: &Path,
    query_frames: usize,
) -> Result<u64> {
    let mut total = 0u64;
    let optional = [SEQS_FILE, STAXIDS_FILE, TAX_TREE_FILE];
    for name in index_files(kind).iter().chain(optional.iter()) {
        if let Ok(meta) = std::fs::metadata(index_dir.join(name)) {
            total += meta.len();
        }
    }
    let query_bytes = std::fs::metadata(query_file)?.len();
    total += query_bytes * query_frames.max(1) as u64;
    Ok(total)
}

/// Fail when the estimate does not fit into the probed memory.
pub fn check_memory(probe: &dyn MemoryProbe, required: u64) -> Result<()> {
    let available = probe.available_memory();
    tracing::debug!(
        "Memory check: {} required, {} available",
        format_size(required, BINARY),
        format_size(available, BINARY)
    );
    if required > available {
        return Err(LambdaError::InsufficientMemory(format!(
            "the search needs about {} but only {} are available",
            format_size(required, BINARY),
            format_size(available, BINARY)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_memory() {
        assert!(check_memory(&FixedProbe(1024), 1000).is_ok());
        let err = check_memory(&FixedProbe(10), 2048).unwrap_err();
        assert!(matches!(err, LambdaError::InsufficientMemory(_)));
        assert!(err.to_string().contains("2 KiB"));
    }

    #[test]
    fn test_estimate_counts_index_and_frames() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(crate::index::FM_FILE), vec![0u8; 100]).unwrap();
        std::fs::write(dir.path().join(SEQS_FILE), vec![0u8; 50]).unwrap();
        let query = dir.path().join("q.fa");
        std::fs::write(&query, vec![b'A'; 10]).unwrap();
        let estimate = estimate_search_memory(dir.path(), IndexKind::Fm, &query, 6).unwrap();
        assert_eq!(estimate, 100 + 50 + 60);
    }
}
