use crate::{LambdaError, Result};
use serde::{Deserialize, Serialize};

/// A set of sequences stored back to back in a single buffer.
///
/// `offsets` always has `len() + 1` entries: `offsets[0] == 0` and the last entry equals the
/// buffer length, so sequence `i` is `buffer[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCollection {
    buffer: Vec<u8>,
    offsets: Vec<usize>,
}

impl Default for SequenceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCollection {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Reserve room for `sequences` records holding `symbols` residues in total.
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn try_with_capacity(sequences: usize, symbols: usize) -> Result<Self> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(symbols)
            .map_err(|_| LambdaError::OutOfMemory("reserving the sequence buffer".to_string()))?;
        let mut offsets = Vec::new();
        offsets
            .try_reserve_exact(sequences + 1)
            .map_err(|_| LambdaError::OutOfMemory("reserving the offset table".to_string()))?;
        offsets.push(0);
        Ok(Self { buffer, offsets })
    }

    pub fn push(&mut self, sequence: &[u8]) {
        self.buffer.extend_from_slice(sequence);
        self.offsets.push(self.buffer.len());
    }

    /// Append a sequence produced symbol by symbol.
    pub fn push_iter<I: IntoIterator<Item = u8>>(&mut self, symbols: I) {
        self.buffer.extend(symbols);
        self.offsets.push(self.buffer.len());
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of residues over all sequences.
    pub fn total_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn get(&self, i: usize) -> &[u8] {
        &self.buffer[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn seq_len(&self, i: usize) -> usize {
        self.offsets[i + 1] - self.offsets[i]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn lengths(&self) -> Vec<u64> {
        self.offsets.windows(2).map(|w| (w[1] - w[0]) as u64).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.buffer[w[0]..w[1]])
    }

    /// Build a derived collection by mapping every symbol, keeping the offset table.
    pub fn map_symbols<F: Fn(u8) -> u8>(&self, f: F) -> Result<Self> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(self.buffer.len())?;
        buffer.extend(self.buffer.iter().map(|&c| f(c)));
        Ok(Self {
            buffer,
            offsets: self.offsets.clone(),
        })
    }

    /// Rebuild a collection from its raw parts, checking the offset invariants.
    pub fn from_parts(buffer: Vec<u8>, offsets: Vec<usize>) -> Result<Self> {
        let valid = offsets.first() == Some(&0)
            && offsets.last() == Some(&buffer.len())
            && offsets.windows(2).all(|w| w[0] <= w[1]);
        if !valid {
            return Err(LambdaError::Parse(
                "sequence offsets are not consistent with the buffer".to_string(),
            ));
        }
        Ok(Self { buffer, offsets })
    }
}

impl<'a> FromIterator<&'a [u8]> for SequenceCollection {
    fn from_iter<T: IntoIterator<Item = &'a [u8]>>(iter: T) -> Self {
        let mut collection = SequenceCollection::new();
        for seq in iter {
            collection.push(seq);
        }
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_collection() {
        let c = SequenceCollection::new();
        assert!(c.is_empty());
        assert_eq!(c.offsets(), &[0]);
        assert_eq!(c.total_len(), 0);
    }

    #[test]
    fn test_push_and_get() {
        let mut c = SequenceCollection::new();
        c.push(b"ACGT");
        c.push(b"GG");
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(0), b"ACGT");
        assert_eq!(c.get(1), b"GG");
        assert_eq!(c.offsets(), &[0, 4, 6]);
        assert_eq!(c.lengths(), vec![4, 2]);
    }

    #[test]
    fn test_from_parts_rejects_bad_offsets() {
        assert!(SequenceCollection::from_parts(b"ACGT".to_vec(), vec![0, 5]).is_err());
        assert!(SequenceCollection::from_parts(b"ACGT".to_vec(), vec![1, 4]).is_err());
        assert!(SequenceCollection::from_parts(b"ACGT".to_vec(), vec![0, 3, 2, 4]).is_err());
        assert!(SequenceCollection::from_parts(b"ACGT".to_vec(), vec![0, 2, 4]).is_ok());
    }

    proptest! {
        #[test]
        fn prop_slices_reproduce_inserted(seqs in proptest::collection::vec(
            proptest::collection::vec(b'A'..=b'Z', 0..40), 0..20)) {
            let mut c = SequenceCollection::new();
            for s in &seqs {
                c.push(s);
            }
            let offsets = c.offsets();
            prop_assert_eq!(offsets[0], 0);
            prop_assert_eq!(*offsets.last().unwrap(), c.total_len());
            prop_assert_eq!(c.len(), seqs.len());
            for (i, s) in seqs.iter().enumerate() {
                prop_assert_eq!(&c.buffer()[offsets[i]..offsets[i + 1]], s.as_slice());
            }
        }
    }
}
