//! Sparse matrix storage for the constraint Jacobian.
//!
//! The Jacobian transpose `D^T` has a nonzero pattern that only changes with
//! topology or the contact set, while its values change every step. It is
//! therefore built in two phases:
//!
//! 1. Row-by-row registration of the pattern (`append` + `finalize`), rows in
//!    ascending order and columns ascending within each row.
//! 2. Value updates into the locked pattern (`set`), any number of times.
//!
//! [`AssemblyTarget`] abstracts those operations so the engine can write into
//! whatever global system the caller owns. [`SparseRowMatrix`] is the
//! provided implementation, convertible to a nalgebra-sparse CSR matrix.

use crate::error::{Error, Result};
use nalgebra_sparse::csr::CsrMatrix as NalgebraCsr;

/// Compressed Sparse Row matrix.
pub type CsrMatrix = NalgebraCsr<f64>;

/// Destination of sparse-matrix assembly.
///
/// Offsets are always global: the engine is told where its rows and columns
/// start and writes absolute indices.
pub trait AssemblyTarget {
    /// Declare an entry in the currently open row.
    ///
    /// Rows must be opened in ascending order and columns appended in
    /// strictly ascending order within a row.
    fn append(&mut self, row: usize, col: usize, value: f64) -> Result<()>;

    /// Close every row up to and including `row`, locking its pattern.
    fn finalize(&mut self, row: usize) -> Result<()>;

    /// Overwrite the value of an already declared entry.
    fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()>;
}

/// Row-major sparse matrix with a two-phase (declare, then fill) lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRowMatrix {
    n_rows: usize,
    n_cols: usize,
    /// Offsets of finalized rows; `row_offsets.len() - 1` rows are closed.
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseRowMatrix {
    /// Create an empty matrix of the given shape.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self::with_capacity(n_rows, n_cols, 0)
    }

    /// Create with estimated capacity.
    pub fn with_capacity(n_rows: usize, n_cols: usize, nnz_estimate: usize) -> Self {
        let mut row_offsets = Vec::with_capacity(n_rows + 1);
        row_offsets.push(0);
        Self {
            n_rows,
            n_cols,
            row_offsets,
            col_indices: Vec::with_capacity(nnz_estimate),
            values: Vec::with_capacity(nnz_estimate),
        }
    }

    /// Drop the pattern and resize, ready for a new registration pass.
    pub fn reset(&mut self, n_rows: usize, n_cols: usize) {
        self.n_rows = n_rows;
        self.n_cols = n_cols;
        self.row_offsets.clear();
        self.row_offsets.push(0);
        self.col_indices.clear();
        self.values.clear();
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.n_cols
    }

    /// Number of declared entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Number of rows whose pattern is locked.
    pub fn finalized_rows(&self) -> usize {
        self.row_offsets.len() - 1
    }

    fn open_row(&self) -> usize {
        self.finalized_rows()
    }

    /// Columns and values of a finalized row.
    pub fn row(&self, row: usize) -> Option<(&[usize], &[f64])> {
        if row >= self.finalized_rows() {
            return None;
        }
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        Some((&self.col_indices[range.clone()], &self.values[range]))
    }

    /// Value of a declared entry.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        let (cols, values) = self.row(row)?;
        cols.binary_search(&col).ok().map(|k| values[k])
    }

    /// Product with a vector over the column space (`D^T · v`).
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.n_cols);
        (0..self.n_rows)
            .map(|r| match self.row(r) {
                Some((cols, values)) => {
                    cols.iter().zip(values).map(|(&c, &v)| v * x[c]).sum::<f64>()
                }
                None => 0.0,
            })
            .collect()
    }

    /// Transposed product with a vector over the row space (`D · γ`).
    pub fn transpose_mul_vec(&self, y: &[f64]) -> Vec<f64> {
        debug_assert_eq!(y.len(), self.n_rows);
        let mut out = vec![0.0; self.n_cols];
        for r in 0..self.finalized_rows() {
            let range = self.row_offsets[r]..self.row_offsets[r + 1];
            for k in range {
                out[self.col_indices[k]] += self.values[k] * y[r];
            }
        }
        out
    }

    /// Convert to nalgebra-sparse CSR. Rows not yet finalized are empty.
    pub fn to_csr(&self) -> Result<CsrMatrix> {
        // Entries appended to a row that is still open are left out.
        let nnz = *self.row_offsets.last().unwrap_or(&0);
        let mut offsets = self.row_offsets.clone();
        offsets.resize(self.n_rows + 1, nnz);
        CsrMatrix::try_from_csr_data(
            self.n_rows,
            self.n_cols,
            offsets,
            self.col_indices[..nnz].to_vec(),
            self.values[..nnz].to_vec(),
        )
        .map_err(|e| Error::Sparsity(format!("invalid CSR data: {}", e)))
    }
}

impl AssemblyTarget for SparseRowMatrix {
    fn append(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.n_rows || col >= self.n_cols {
            return Err(Error::Sparsity(format!(
                "entry ({}, {}) outside {}x{} matrix",
                row, col, self.n_rows, self.n_cols
            )));
        }
        let open = self.open_row();
        if row < open {
            return Err(Error::Sparsity(format!(
                "append to row {} after it was finalized",
                row
            )));
        }
        // Skipped rows are closed empty.
        let row_start = if row > open {
            if self.col_indices.len() > *self.row_offsets.last().unwrap_or(&0) {
                return Err(Error::Sparsity(format!(
                    "append to row {} while row {} is still open",
                    row, open
                )));
            }
            let end = self.col_indices.len();
            self.row_offsets.resize(row + 1, end);
            end
        } else {
            self.row_offsets[open]
        };

        if let Some(&last) = self.col_indices[row_start..].last() {
            if col <= last {
                return Err(Error::Sparsity(format!(
                    "column {} appended after column {} in row {}",
                    col, last, row
                )));
            }
        }

        self.col_indices.push(col);
        self.values.push(value);
        Ok(())
    }

    fn finalize(&mut self, row: usize) -> Result<()> {
        if row >= self.n_rows {
            return Err(Error::Sparsity(format!(
                "finalize row {} outside matrix with {} rows",
                row, self.n_rows
            )));
        }
        let open = self.open_row();
        if row < open {
            return Err(Error::Sparsity(format!("row {} finalized twice", row)));
        }
        let end = self.col_indices.len();
        // Entries pending belong to `open`; rows after it close empty.
        self.row_offsets.resize(row + 2, end);
        Ok(())
    }

    fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.finalized_rows() {
            return Err(Error::Sparsity(format!(
                "write to row {} before its pattern was finalized",
                row
            )));
        }
        let start = self.row_offsets[row];
        let end = self.row_offsets[row + 1];
        match self.col_indices[start..end].binary_search(&col) {
            Ok(k) => {
                self.values[start + k] = value;
                Ok(())
            }
            Err(_) => Err(Error::Sparsity(format!(
                "column {} was not declared in row {}",
                col, row
            ))),
        }
    }
}
