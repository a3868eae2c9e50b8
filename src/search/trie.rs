//! Trie over the seeds of a query block, searched against the index in one traversal.

use crate::index::{Cursor, DbIndex};
use crate::Result;

#[derive(Debug, Default, Clone)]
struct Node {
    /// Sorted by symbol
    children: Vec<(u8, u32)>,
    /// Seeds ending in this node
    seeds: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct SeedTrie {
    nodes: Vec<Node>,
    depth: usize,
}

impl SeedTrie {
    /// Trie for patterns of exactly `depth` symbols.
    pub fn new(depth: usize) -> Self {
        Self {
            nodes: vec![Node::default()],
            depth,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert an oriented seed pattern under the caller's seed id.
    pub fn insert(&mut self, pattern: &[u8], seed: u32) -> Result<()> {
        debug_assert_eq!(pattern.len(), self.depth);
        let mut node = 0usize;
        for &c in pattern {
            let children = &self.nodes[node].children;
            node = match children.binary_search_by_key(&c, |&(s, _)| s) {
                Ok(i) => children[i].1 as usize,
                Err(i) => {
                    self.nodes.try_reserve(1)?;
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children.insert(i, (c, child as u32));
                    child
                }
            };
        }
        self.nodes[node].seeds.push(seed);
        Ok(())
    }

    /// Walk the trie and the index together, allowing up to `delta` substitutions along
    /// every path. `found` receives each matching interval with the seeds of its leaf.
    pub fn search<F: FnMut(&Cursor, &[u32])>(
        &self,
        index: &dyn DbIndex,
        alphabet: &[u8],
        delta: usize,
        found: &mut F,
    ) {
        self.descend(0, index, alphabet, delta, index.root(), 0, found);
    }

    #[allow(clippy::too_many_arguments)]
    fn descend<F: FnMut(&Cursor, &[u32])>(
        &self,
        node: usize,
        index: &dyn DbIndex,
        alphabet: &[u8],
        delta: usize,
        cursor: Cursor,
        errors: usize,
        found: &mut F,
    ) {
        let current = &self.nodes[node];
        if cursor.depth == self.depth {
            if !current.seeds.is_empty() {
                found(&cursor, &current.seeds);
            }
            return;
        }
        for &(label, child) in &current.children {
            if let Some(next) = index.extend(&cursor, label) {
                self.descend(child as usize, index, alphabet, delta, next, errors, found);
            }
            if errors < delta {
                for &c in alphabet.iter().filter(|&&c| c != label) {
                    if let Some(next) = index.extend(&cursor, c) {
                        self.descend(child as usize, index, alphabet, delta, next, errors + 1, found);
                    }
                }
            }
        }
    }
}
