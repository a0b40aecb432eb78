//! Linear kernel

use crate::core::SparseVector;
use crate::kernel::traits::{dot_product_sparse, Kernel};

/// K(x, y) = <x, y>. Has no hyperparameters, so `gamma` is never resolved
/// for it and the Gram diagonal is just each row's squared norm.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        dot_product_sparse(x, y)
    }
}
