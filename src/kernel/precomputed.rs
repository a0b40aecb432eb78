//! Precomputed kernel
//!
//! Each vector stores its row id under feature index 0 and its kernel values
//! against the training rows under indices 1..=l. No arithmetic is done:
//! K(x, y) is the entry of `x` at the column named by `y`'s row id.

use crate::core::SparseVector;
use crate::kernel::traits::Kernel;

#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedKernel;

impl PrecomputedKernel {
    pub fn new() -> Self {
        Self
    }

    /// Row id carried in feature 0
    pub fn row_id(v: &SparseVector) -> usize {
        v.get(0) as usize
    }
}

impl Kernel for PrecomputedKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        x.get(Self::row_id(y))
    }
}
