//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial

use crate::core::SparseVector;
use crate::kernel::traits::{dot_product_sparse, Kernel};

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialKernel {
    /// Scaling factor for the dot product
    pub gamma: f64,
    /// Independent term in the polynomial
    pub coef0: f64,
    /// Degree of the polynomial
    pub degree: u32,
}

impl PolynomialKernel {
    /// Creates a new polynomial kernel with the specified parameters
    ///
    /// # Examples
    /// ```
    /// use smosvm::kernel::PolynomialKernel;
    ///
    /// // Quadratic kernel: (x·y + 1)²
    /// let quad = PolynomialKernel::new(2, 1.0, 1.0);
    /// assert_eq!(quad.degree, 2);
    /// ```
    pub fn new(degree: u32, gamma: f64, coef0: f64) -> Self {
        Self {
            gamma,
            coef0,
            degree,
        }
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        let base = self.gamma * dot_product_sparse(x, y) + self.coef0;
        powi(base, self.degree)
    }
}

/// Integer power by repeated squaring
///
/// Degree 0 yields 1 for every base, including 0.
fn powi(base: f64, times: u32) -> f64 {
    let mut result = 1.0;
    let mut tmp = base;
    let mut t = times;
    while t > 0 {
        if t % 2 == 1 {
            result *= tmp;
        }
        tmp *= tmp;
        t /= 2;
    }
    result
}
