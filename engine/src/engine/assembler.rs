//! Symmetric kernel matrix ownership
//!
//! `MatrixAssembler` is the only writer of the matrix. Every write goes to
//! both `K[i][j]` and `K[j][i]`, so symmetry holds at every point of a run.

use crate::errors::{EngineError, Result};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

/// Dense row-major `n x n` matrix of kernel values
#[derive(Debug, Clone, PartialEq)]
pub struct KernelMatrix {
    n: usize,
    data: Vec<f64>,
}

impl KernelMatrix {
    /// All-zero matrix of size `n`
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Build from rows, e.g. after reading a persisted matrix
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Serialization` if the rows do not form a square matrix.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(EngineError::Serialization(format!(
                    "row {} has {} columns, expected {}",
                    idx,
                    row.len(),
                    n
                )));
            }
            data.extend(row);
        }
        Ok(Self { n, data })
    }

    /// Matrix dimension
    pub fn size(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.n && j < self.n {
            Some(self.data[i * self.n + j])
        } else {
            None
        }
    }

    /// Iterate over rows
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics, and an empty matrix has no rows anyway
        self.data.chunks(self.n.max(1)).take(self.n)
    }

    /// Copy into nested vectors
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }

    /// Bitwise symmetry check (NaN entries compare by bit pattern)
    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| {
            (i + 1..self.n)
                .all(|j| self.data[i * self.n + j].to_bits() == self.data[j * self.n + i].to_bits())
        })
    }

    /// Number of NaN entries in the upper triangle
    pub fn nan_pairs(&self) -> usize {
        (0..self.n)
            .map(|i| (i..self.n).filter(|&j| self.data[i * self.n + j].is_nan()).count())
            .sum()
    }
}

impl Serialize for KernelMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.n))?;
        for row in self.rows() {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

/// Single owner of the matrix being filled
#[derive(Debug)]
pub struct MatrixAssembler {
    matrix: KernelMatrix,
    recorded: usize,
}

impl MatrixAssembler {
    pub fn new(n: usize) -> Self {
        Self {
            matrix: KernelMatrix::zeros(n),
            recorded: 0,
        }
    }

    /// Set `K[i][j]` and `K[j][i]` to `value`
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Bounds` if either index is outside `[0, n)`.
    /// This signals a corrupted pairing and must abort the run.
    pub fn record(&mut self, i: usize, j: usize, value: f64) -> Result<()> {
        let n = self.matrix.n;
        if i >= n || j >= n {
            return Err(EngineError::Bounds { i, j, n });
        }

        self.matrix.data[i * n + j] = value;
        self.matrix.data[j * n + i] = value;
        self.recorded += 1;
        Ok(())
    }

    /// Number of `record` calls so far
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn size(&self) -> usize {
        self.matrix.n
    }

    /// Hand off the finished matrix
    pub fn finish(self) -> KernelMatrix {
        self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_writes_both_cells() {
        let mut assembler = MatrixAssembler::new(3);
        assembler.record(0, 2, 0.5).unwrap();

        let matrix = assembler.finish();
        assert_eq!(matrix.get(0, 2), Some(0.5));
        assert_eq!(matrix.get(2, 0), Some(0.5));
        assert_eq!(matrix.get(1, 1), Some(0.0));
        assert!(matrix.is_symmetric());
    }

    #[test]
    fn test_record_out_of_bounds_is_error() {
        let mut assembler = MatrixAssembler::new(2);
        let err = assembler.record(1, 2, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::Bounds { i: 1, j: 2, n: 2 }));
        assert_eq!(assembler.recorded(), 0);
    }

    #[test]
    fn test_record_overwrite_is_idempotent() {
        let mut assembler = MatrixAssembler::new(2);
        assembler.record(0, 1, 0.3).unwrap();
        assembler.record(0, 1, 0.3).unwrap();
        let matrix = assembler.finish();
        assert_eq!(matrix.to_rows(), vec![vec![0.0, 0.3], vec![0.3, 0.0]]);
    }

    #[test]
    fn test_serializes_row_major() {
        let mut assembler = MatrixAssembler::new(2);
        assembler.record(0, 0, 1.0).unwrap();
        assembler.record(0, 1, 0.5).unwrap();
        assembler.record(1, 1, 1.0).unwrap();

        let json = serde_json::to_string(&assembler.finish()).unwrap();
        assert_eq!(json, "[[1.0,0.5],[0.5,1.0]]");
    }

    #[test]
    fn test_nan_serializes_as_null() {
        let mut assembler = MatrixAssembler::new(1);
        assembler.record(0, 0, f64::NAN).unwrap();
        let matrix = assembler.finish();
        assert_eq!(matrix.nan_pairs(), 1);
        assert_eq!(serde_json::to_string(&matrix).unwrap(), "[[null]]");
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = KernelMatrix::zeros(0);
        assert_eq!(matrix.rows().count(), 0);
        assert!(matrix.is_symmetric());
        assert_eq!(serde_json::to_string(&matrix).unwrap(), "[]");
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        assert!(KernelMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0]]).is_err());
        let matrix = KernelMatrix::from_rows(vec![vec![1.0, 0.2], vec![0.2, 1.0]]).unwrap();
        assert_eq!(matrix.size(), 2);
        assert!(matrix.is_symmetric());
    }
}
