//! Kernel functions for SVM

pub mod gram;
pub mod linear;
pub mod polynomial;
pub mod precomputed;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::gram::GramKernel;
pub use self::linear::*;
pub use self::polynomial::*;
pub use self::precomputed::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

use crate::core::{KernelType, SparseVector};

/// The configured kernel family dispatches to its concrete implementation.
impl Kernel for KernelType {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        match *self {
            KernelType::Linear => LinearKernel.compute(x, y),
            KernelType::Polynomial {
                degree,
                gamma,
                coef0,
            } => PolynomialKernel::new(degree, gamma, coef0).compute(x, y),
            KernelType::Rbf { gamma } => RBFKernel::new(gamma).compute(x, y),
            KernelType::Sigmoid { gamma, coef0 } => SigmoidKernel::new(gamma, coef0).compute(x, y),
            KernelType::Precomputed => PrecomputedKernel.compute(x, y),
        }
    }

    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        match *self {
            KernelType::Rbf { gamma } => {
                RBFKernel::new(gamma).compute_with_norms(x, y, x_norm_sq, y_norm_sq)
            }
            _ => self.compute(x, y),
        }
    }

    fn uses_norms(&self) -> bool {
        matches!(self, KernelType::Rbf { .. })
    }
}
