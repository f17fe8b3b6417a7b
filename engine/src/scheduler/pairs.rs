//! Lazy, chunked enumeration of upper-triangular index pairs
//!
//! Pairs are produced in row-major order: `i` ascending, then `j` ascending
//! from `i`. Only the chunk currently being built is ever allocated, so
//! memory stays at O(chunk size) no matter how large `n` gets.

use crate::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// One required computation, identified by its matrix indices (`i <= j`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairTask {
    pub i: usize,
    pub j: usize,
}

impl PairTask {
    /// Create a pair, normalizing so that `i <= j`
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self { i: a, j: b }
        } else {
            Self { i: b, j: a }
        }
    }

    /// Whether this pair lies on the diagonal
    pub fn is_diagonal(&self) -> bool {
        self.i == self.j
    }
}

impl fmt::Display for PairTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

/// Number of pairs `(i, j)` with `0 <= i <= j < n`
pub fn total_pairs(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Number of chunks needed to cover all pairs of `n` items
pub fn chunk_count(n: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    total_pairs(n).div_ceil(chunk_size)
}

/// A bounded, contiguous slice of the pair enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of this chunk in the enumeration
    pub index: usize,

    /// Linear offset of the first pair in this chunk
    pub start_offset: usize,

    /// Pairs in enumeration order
    pub pairs: Vec<PairTask>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Restartable iterator of pair chunks for `n` items
#[derive(Debug, Clone)]
pub struct PairEnumerator {
    n: usize,
    chunk_size: usize,

    /// Cursor: next pair to emit
    next_i: usize,
    next_j: usize,

    /// Linear offset of the cursor
    offset: usize,

    /// Index the next emitted chunk will carry
    next_chunk: usize,
}

impl PairEnumerator {
    /// Create an enumerator over `n` items with chunks of at most `chunk_size` pairs
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if `chunk_size` is zero.
    pub fn new(n: usize, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(EngineError::Config("chunk size must be at least 1".into()));
        }

        Ok(Self {
            n,
            chunk_size,
            next_i: 0,
            next_j: 0,
            offset: 0,
            next_chunk: 0,
        })
    }

    /// Resume enumeration at the start of chunk `chunk_index`
    ///
    /// Chunks before `chunk_index` are skipped without being materialized.
    pub fn starting_at_chunk(mut self, chunk_index: usize) -> Self {
        let offset = chunk_index
            .saturating_mul(self.chunk_size)
            .min(total_pairs(self.n));
        self.seek(offset);
        self.next_chunk = chunk_index.min(self.chunk_count());
        self
    }

    /// Rewind to the first chunk
    pub fn restart(&mut self) {
        self.seek(0);
        self.next_chunk = 0;
    }

    /// Number of items
    pub fn item_count(&self) -> usize {
        self.n
    }

    /// Maximum pairs per chunk
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total pairs across all chunks
    pub fn total_pairs(&self) -> usize {
        total_pairs(self.n)
    }

    /// Total chunks across the whole enumeration
    pub fn chunk_count(&self) -> usize {
        chunk_count(self.n, self.chunk_size)
    }

    /// Pairs not yet emitted
    pub fn remaining_pairs(&self) -> usize {
        self.total_pairs() - self.offset
    }

    /// Move the cursor to linear offset `offset`
    fn seek(&mut self, offset: usize) {
        let mut remaining = offset;
        let mut i = 0;
        while i < self.n && remaining >= self.n - i {
            remaining -= self.n - i;
            i += 1;
        }
        self.next_i = i;
        self.next_j = i + remaining;
        self.offset = offset;
    }

    fn advance(&mut self) {
        self.next_j += 1;
        if self.next_j == self.n {
            self.next_i += 1;
            self.next_j = self.next_i;
        }
        self.offset += 1;
    }
}

impl Iterator for PairEnumerator {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.next_i >= self.n {
            return None;
        }

        let start_offset = self.offset;
        let mut pairs = Vec::with_capacity(self.chunk_size.min(self.remaining_pairs()));

        while pairs.len() < self.chunk_size && self.next_i < self.n {
            pairs.push(PairTask {
                i: self.next_i,
                j: self.next_j,
            });
            self.advance();
        }

        let chunk = Chunk {
            index: self.next_chunk,
            start_offset,
            pairs,
        };
        self.next_chunk += 1;

        debug!(
            chunk = chunk.index,
            pairs = chunk.len(),
            start_offset = start_offset,
            "Chunk enumerated"
        );

        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining_pairs().div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PairEnumerator {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn expected_pairs(n: usize) -> Vec<PairTask> {
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in i..n {
                pairs.push(PairTask { i, j });
            }
        }
        pairs
    }

    #[test]
    fn test_pair_task_normalizes_order() {
        assert_eq!(PairTask::new(7, 2), PairTask { i: 2, j: 7 });
        assert!(PairTask::new(3, 3).is_diagonal());
        assert_eq!(PairTask::new(1, 4).to_string(), "(1, 4)");
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            PairEnumerator::new(10, 0),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_zero_items_yields_no_chunks() {
        let mut enumerator = PairEnumerator::new(0, 4).unwrap();
        assert_eq!(enumerator.chunk_count(), 0);
        assert!(enumerator.next().is_none());
    }

    #[test]
    fn test_single_item_yields_diagonal_pair() {
        let chunks: Vec<Chunk> = PairEnumerator::new(1, 10).unwrap().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].pairs, vec![PairTask { i: 0, j: 0 }]);
    }

    #[test]
    fn test_ten_items_chunk_size_three() {
        let enumerator = PairEnumerator::new(10, 3).unwrap();
        assert_eq!(enumerator.total_pairs(), 55);
        assert_eq!(enumerator.chunk_count(), 19);
        assert_eq!(enumerator.len(), 19);

        let chunks: Vec<Chunk> = enumerator.collect();
        assert_eq!(chunks.len(), 19);
        assert!(chunks.iter().all(|c| c.len() <= 3));
        assert_eq!(chunks.last().unwrap().len(), 1);
    }

    #[test]
    fn test_row_major_order_and_contiguity() {
        let chunks: Vec<Chunk> = PairEnumerator::new(4, 3).unwrap().collect();
        let flat: Vec<PairTask> = chunks.iter().flat_map(|c| c.pairs.clone()).collect();
        assert_eq!(flat, expected_pairs(4));

        let mut offset = 0;
        for (idx, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, idx);
            assert_eq!(chunk.start_offset, offset);
            offset += chunk.len();
        }
    }

    #[test]
    fn test_restart_replays_enumeration() {
        let mut enumerator = PairEnumerator::new(5, 4).unwrap();
        let first: Vec<Chunk> = enumerator.by_ref().collect();
        assert!(enumerator.next().is_none());

        enumerator.restart();
        let second: Vec<Chunk> = enumerator.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_starting_at_chunk_resumes_mid_row() {
        let all: Vec<Chunk> = PairEnumerator::new(6, 4).unwrap().collect();
        let resumed: Vec<Chunk> = PairEnumerator::new(6, 4)
            .unwrap()
            .starting_at_chunk(2)
            .collect();
        assert_eq!(resumed, all[2..].to_vec());
    }

    #[test]
    fn test_starting_past_end_is_empty() {
        let mut enumerator = PairEnumerator::new(3, 2).unwrap().starting_at_chunk(50);
        assert_eq!(enumerator.remaining_pairs(), 0);
        assert!(enumerator.next().is_none());
    }

    proptest! {
        #[test]
        fn enumeration_covers_upper_triangle_exactly_once(n in 0usize..40, chunk_size in 1usize..64) {
            let mut seen = HashSet::new();
            let mut count = 0;
            for chunk in PairEnumerator::new(n, chunk_size).unwrap() {
                prop_assert!(!chunk.is_empty());
                prop_assert!(chunk.len() <= chunk_size);
                for pair in chunk.pairs {
                    prop_assert!(pair.i <= pair.j && pair.j < n);
                    prop_assert!(seen.insert(pair));
                    count += 1;
                }
            }
            prop_assert_eq!(count, total_pairs(n));
        }

        #[test]
        fn chunking_is_grouping_not_filter(n in 0usize..30, c1 in 1usize..50, c2 in 1usize..50) {
            let a: Vec<PairTask> = PairEnumerator::new(n, c1).unwrap().flat_map(|c| c.pairs).collect();
            let b: Vec<PairTask> = PairEnumerator::new(n, c2).unwrap().flat_map(|c| c.pairs).collect();
            prop_assert_eq!(a, b);
        }
    }
}
