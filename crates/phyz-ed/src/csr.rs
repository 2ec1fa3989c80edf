//! CSR (Compressed Sparse Row) matrix for explicit Hamiltonian storage.
//!
//! Built from the `(row, col, value)` elements reported by the apply engine,
//! so the matrix can be stored once and reused for many products.

use num_complex::Complex64;

/// Sparse matrix in Compressed Sparse Row format.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    pub nrows: usize,
    pub row_ptr: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<Complex64>,
}

impl CsrMatrix {
    /// Assemble from unordered triplets; duplicates are summed.
    pub fn from_triplets(nrows: usize, triplets: Vec<(usize, usize, Complex64)>) -> Self {
        // Accumulate entries per row: Vec<(col, val)>
        let mut rows: Vec<Vec<(usize, Complex64)>> = vec![Vec::new(); nrows];
        for (row, col, val) in triplets {
            rows[row].push((col, val));
        }

        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();

        row_ptr.push(0);

        for row in &mut rows {
            row.sort_by_key(|&(col, _)| col);

            // Merge duplicates
            let mut merged: Vec<(usize, Complex64)> = Vec::new();
            for &(col, val) in row.iter() {
                if let Some(last) = merged.last_mut() {
                    if last.0 == col {
                        last.1 += val;
                        continue;
                    }
                }
                merged.push((col, val));
            }

            for (col, val) in merged {
                col_indices.push(col);
                values.push(val);
            }
            row_ptr.push(col_indices.len());
        }

        CsrMatrix {
            nrows,
            row_ptr,
            col_indices,
            values,
        }
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Compute y = A * x.
    pub fn matvec(&self, x: &[Complex64]) -> Vec<Complex64> {
        let mut y = vec![Complex64::new(0.0, 0.0); self.nrows];
        for (i, yi) in y.iter_mut().enumerate() {
            let start = self.row_ptr[i];
            let end = self.row_ptr[i + 1];
            let mut sum = Complex64::new(0.0, 0.0);
            for idx in start..end {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            *yi = sum;
        }
        y
    }

    /// Element `(i, j)`, zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        let cols = &self.col_indices[self.row_ptr[i]..self.row_ptr[i + 1]];
        match cols.binary_search(&j) {
            Ok(k) => self.values[self.row_ptr[i] + k],
            Err(_) => Complex64::new(0.0, 0.0),
        }
    }
}
