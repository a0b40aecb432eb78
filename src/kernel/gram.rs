//! Kernel evaluation over the (reorderable) training set

use crate::core::{KernelType, SparseVector};
use crate::kernel::traits::Kernel;

/// Evaluates K(x_i, x_j) for training samples addressed by position.
///
/// The solver reorders samples while shrinking; [`GramKernel::swap_index`]
/// swaps the borrowed vectors and their cached squared norms, never the
/// vector data.
#[derive(Debug, Clone)]
pub struct GramKernel<'a> {
    kernel: KernelType,
    x: Vec<&'a SparseVector>,
    x_square: Option<Vec<f64>>,
}

impl<'a> GramKernel<'a> {
    pub fn new(kernel: KernelType, x: &[&'a SparseVector]) -> Self {
        let x_square = kernel
            .uses_norms()
            .then(|| x.iter().map(|v| v.norm_squared()).collect());
        Self {
            kernel,
            x: x.to_vec(),
            x_square,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    #[inline]
    pub fn eval(&self, i: usize, j: usize) -> f64 {
        match &self.x_square {
            Some(sq) => self
                .kernel
                .compute_with_norms(self.x[i], self.x[j], sq[i], sq[j]),
            None => self.kernel.compute(self.x[i], self.x[j]),
        }
    }

    pub fn swap_index(&mut self, i: usize, j: usize) {
        self.x.swap(i, j);
        if let Some(sq) = self.x_square.as_mut() {
            sq.swap(i, j);
        }
    }
}
