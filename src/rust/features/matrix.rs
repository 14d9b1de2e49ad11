use ndarray::{Array2, ArrayView2};

use crate::classifier::ClassifierError;

/// Row-major sparse feature matrix (compressed sparse rows).
///
/// Explicit zeros are never stored; absent entries read as `0.0`. Column
/// indices within a row are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Creates an empty matrix with `n_cols` columns and no rows.
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            indptr: vec![0],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn from_dense(dense: ArrayView2<'_, f64>) -> Self {
        let mut matrix = Self::new(dense.ncols());
        for row in dense.rows() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    matrix.indices.push(j);
                    matrix.values.push(v);
                }
            }
            matrix.indptr.push(matrix.indices.len());
        }
        matrix
    }

    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Appends a row given as `(column, value)` pairs in any order.
    pub fn push_row<I>(&mut self, entries: I) -> Result<(), ClassifierError>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut entries: Vec<(usize, f64)> = entries.into_iter().filter(|&(_, v)| v != 0.0).collect();
        entries.sort_by_key(|&(j, _)| j);
        for window in entries.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(ClassifierError::validation(format!(
                    "Duplicate column {} in sparse row",
                    window[0].0
                )));
            }
        }
        if let Some(&(j, _)) = entries.last() {
            if j >= self.n_cols {
                return Err(ClassifierError::validation(format!(
                    "Column {} out of range for matrix with {} columns",
                    j, self.n_cols
                )));
            }
        }
        if let Some(&(j, v)) = entries.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ClassifierError::validation(format!(
                "Non-finite feature value {} in column {}",
                v, j
            )));
        }
        for (j, v) in entries {
            self.indices.push(j);
            self.values.push(v);
        }
        self.indptr.push(self.indices.len());
        Ok(())
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        (&self.indices[start..end], &self.values[start..end])
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (indices, values) = self.row(i);
        match indices.binary_search(&j) {
            Ok(pos) => values[pos],
            Err(_) => 0.0,
        }
    }

    /// Horizontally concatenates `other` to the right of `self`.
    pub fn hstack(&self, other: &FeatureMatrix) -> Result<FeatureMatrix, ClassifierError> {
        if self.n_rows() != other.n_rows() {
            return Err(ClassifierError::configuration(format!(
                "Cannot concatenate feature blocks with {} and {} rows",
                self.n_rows(),
                other.n_rows()
            )));
        }
        let mut stacked = FeatureMatrix::new(self.n_cols + other.n_cols);
        stacked.indices.reserve(self.nnz() + other.nnz());
        stacked.values.reserve(self.nnz() + other.nnz());
        for i in 0..self.n_rows() {
            let (left_idx, left_val) = self.row(i);
            let (right_idx, right_val) = other.row(i);
            stacked.indices.extend_from_slice(left_idx);
            stacked.values.extend_from_slice(left_val);
            stacked.indices.extend(right_idx.iter().map(|&j| j + self.n_cols));
            stacked.values.extend_from_slice(right_val);
            stacked.indptr.push(stacked.indices.len());
        }
        Ok(stacked)
    }

    /// Builds a matrix from the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> FeatureMatrix {
        let mut selected = FeatureMatrix::new(self.n_cols);
        for &i in rows {
            let (indices, values) = self.row(i);
            selected.indices.extend_from_slice(indices);
            selected.values.extend_from_slice(values);
            selected.indptr.push(selected.indices.len());
        }
        selected
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n_rows(), self.n_cols));
        for i in 0..self.n_rows() {
            let (indices, values) = self.row(i);
            for (&j, &v) in indices.iter().zip(values) {
                dense[[i, j]] = v;
            }
        }
        dense
    }
}
