//! Core type definitions for SVM

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Result, SVMError};

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Build from a dense slice, dropping zero entries. Indices start at 1.
    pub fn from_dense(values: &[f64]) -> Self {
        let (indices, values) = values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i + 1, v))
            .unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Compute L2 norm
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Largest feature index, or 0 for an empty vector
    pub fn max_index(&self) -> usize {
        self.indices.last().copied().unwrap_or(0)
    }

    /// True when indices are strictly increasing (no duplicates)
    pub fn is_well_formed(&self) -> bool {
        self.indices.len() == self.values.len()
            && self.indices.windows(2).all(|w| w[0] < w[1])
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Training sample with features and label
#[derive(Clone, Debug)]
pub struct Sample {
    /// Feature vector (sparse representation)
    pub features: SparseVector,
    /// Class identifier for classification, target for regression
    pub label: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: SparseVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// A training problem: feature vectors paired one to one with labels.
///
/// For one-class problems the labels are ignored.
#[derive(Clone, Debug)]
pub struct Problem {
    x: Vec<SparseVector>,
    y: Vec<f64>,
}

impl Problem {
    pub fn new(x: Vec<SparseVector>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SVMError::DimensionMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        if let Some(pos) = x.iter().position(|v| !v.is_well_formed()) {
            return Err(SVMError::InvalidDataset(format!(
                "sample {} has unsorted or duplicate feature indices",
                pos
            )));
        }
        Ok(Self { x, y })
    }

    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        let (x, y) = samples.into_iter().map(|s| (s.features, s.label)).unzip();
        Self::new(x, y)
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn features(&self) -> &[SparseVector] {
        &self.x
    }

    pub fn labels(&self) -> &[f64] {
        &self.y
    }

    /// Borrow every sample
    pub fn view(&self) -> ProblemView<'_> {
        ProblemView {
            x: self.x.iter().collect(),
            y: self.y.clone(),
        }
    }
}

/// Borrowed, possibly reordered subset of a [`Problem`].
///
/// Sub-problems (class pairs, cross-validation folds) are views, so feature
/// vectors are never copied during training.
#[derive(Clone, Debug)]
pub struct ProblemView<'a> {
    pub x: Vec<&'a SparseVector>,
    pub y: Vec<f64>,
}

impl<'a> ProblemView<'a> {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Select samples by position, in the given order
    pub fn subset(&self, indices: &[usize]) -> ProblemView<'a> {
        ProblemView {
            x: indices.iter().map(|&i| self.x[i]).collect(),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }

    pub fn max_feature_index(&self) -> usize {
        self.x.iter().map(|v| v.max_index()).max().unwrap_or(0)
    }
}

/// Cooperative cancellation flag shared between a caller and running solvers.
///
/// The solver polls it once per iteration.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_vector_creation() {
        let sv = SparseVector::new(vec![2, 0, 4], vec![2.0, 1.0, 3.0]);

        assert_eq!(sv.indices, vec![0, 2, 4]);
        assert_eq!(sv.values, vec![1.0, 2.0, 3.0]);
        assert!(sv.is_well_formed());
    }

    #[test]
    fn test_sparse_vector_get() {
        let sv = SparseVector::new(vec![1, 3, 5], vec![1.0, 2.0, 3.0]);

        assert_eq!(sv.get(0), 0.0);
        assert_eq!(sv.get(1), 1.0);
        assert_eq!(sv.get(3), 2.0);
        assert_eq!(sv.get(5), 3.0);
        assert_eq!(sv.get(6), 0.0);
        assert_eq!(sv.max_index(), 5);
    }

    #[test]
    fn test_sparse_vector_norm() {
        let sv = SparseVector::new(vec![0, 1], vec![3.0, 4.0]);
        assert_eq!(sv.norm_squared(), 25.0);
        assert_eq!(sv.norm(), 5.0);
    }

    #[test]
    fn test_from_dense_skips_zeros() {
        let sv = SparseVector::from_dense(&[0.5, 0.0, -1.0]);
        assert_eq!(sv.indices, vec![1, 3]);
        assert_eq!(sv.values, vec![0.5, -1.0]);
    }

    #[test]
    fn test_duplicate_indices_rejected() {
        let bad = SparseVector {
            indices: vec![1, 1],
            values: vec![1.0, 2.0],
        };
        assert!(!bad.is_well_formed());
        assert!(matches!(
            Problem::new(vec![bad], vec![1.0]),
            Err(SVMError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_problem_length_mismatch() {
        let x = vec![SparseVector::from_dense(&[1.0])];
        assert!(matches!(
            Problem::new(x, vec![1.0, 2.0]),
            Err(SVMError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_view_subset() {
        let x = vec![
            SparseVector::from_dense(&[1.0]),
            SparseVector::from_dense(&[2.0, 3.0]),
            SparseVector::from_dense(&[4.0]),
        ];
        let problem = Problem::new(x, vec![1.0, 2.0, 3.0]).unwrap();
        let view = problem.view().subset(&[2, 0]);

        assert_eq!(view.len(), 2);
        assert_eq!(view.y, vec![3.0, 1.0]);
        assert_eq!(view.x[0].get(1), 4.0);
        assert_eq!(problem.view().max_feature_index(), 2);
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    #[should_panic(expected = "Indices and values must have same length")]
    fn test_sparse_vector_length_mismatch() {
        SparseVector::new(vec![0, 1], vec![1.0, 2.0, 3.0]);
    }
}
