//! Pair scheduling
//!
//! Enumerates the upper-triangular (diagonal included) index pairs of an
//! `n x n` kernel matrix and groups them into bounded submission chunks.

mod pairs;

pub use pairs::{chunk_count, total_pairs, Chunk, PairEnumerator, PairTask};
