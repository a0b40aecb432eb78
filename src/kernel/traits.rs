//! Kernel trait definition and sparse merge-walk helpers

use crate::core::SparseVector;

/// Kernel function trait
///
/// Implementations are pure functions of two vectors plus their own
/// hyperparameters, so one kernel value can be shared across threads.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;

    /// Compute K(x, y) given precomputed squared norms of both vectors.
    ///
    /// Only distance-based kernels (RBF) use the norms.
    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }

    /// True when `compute_with_norms` actually reads the norms
    fn uses_norms(&self) -> bool {
        false
    }
}

/// Sparse dot product over the intersection of both index sets
pub fn dot_product_sparse(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut result = 0.0;
    let mut i = 0;
    let mut j = 0;

    while i < x.indices.len() && j < y.indices.len() {
        let x_idx = x.indices[i];
        let y_idx = y.indices[j];

        if x_idx == y_idx {
            result += x.values[i] * y.values[j];
            i += 1;
            j += 1;
        } else if x_idx < y_idx {
            i += 1;
        } else {
            j += 1;
        }
    }

    result
}

/// ||x - y||² over the union of both index sets
pub fn squared_euclidean_distance(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut distance_sq = 0.0;
    let mut i = 0;
    let mut j = 0;

    while i < x.indices.len() && j < y.indices.len() {
        let x_idx = x.indices[i];
        let y_idx = y.indices[j];

        if x_idx == y_idx {
            let diff = x.values[i] - y.values[j];
            distance_sq += diff * diff;
            i += 1;
            j += 1;
        } else if x_idx < y_idx {
            distance_sq += x.values[i] * x.values[i];
            i += 1;
        } else {
            distance_sq += y.values[j] * y.values[j];
            j += 1;
        }
    }

    distance_sq += x.values[i..].iter().map(|v| v * v).sum::<f64>();
    distance_sq += y.values[j..].iter().map(|v| v * v).sum::<f64>();

    distance_sq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product_sparse() {
        let x = SparseVector::new(vec![0, 2, 5], vec![1.0, 3.0, 2.0]);
        let y = SparseVector::new(vec![2, 3, 5], vec![2.0, 1.0, 4.0]);

        // overlap at 2 and 5: 3*2 + 2*4
        assert_eq!(dot_product_sparse(&x, &y), 14.0);
        assert_eq!(dot_product_sparse(&x, &SparseVector::empty()), 0.0);
    }

    #[test]
    fn test_squared_euclidean_distance() {
        let x = SparseVector::new(vec![0, 2, 5], vec![1.0, 3.0, 2.0]);
        let y = SparseVector::new(vec![2, 3, 5], vec![2.0, 1.0, 4.0]);

        // 1 + 1 + 1 + 4
        assert_eq!(squared_euclidean_distance(&x, &y), 7.0);
        assert_eq!(squared_euclidean_distance(&x, &x), 0.0);
    }

    #[test]
    fn test_squared_euclidean_distance_tails() {
        let x = SparseVector::empty();
        let y = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);

        assert_eq!(squared_euclidean_distance(&x, &y), 5.0);
        assert_eq!(squared_euclidean_distance(&y, &x), 5.0);
    }
}
