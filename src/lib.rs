//! Support Vector Machine training and inference
//!
//! An SMO solver with second-order working-set selection and shrinking,
//! shared by five formulations (C-SVC, nu-SVC, one-class, epsilon-SVR and
//! nu-SVR), one-vs-one multiclass, probability calibration and k-fold
//! cross-validation.
//!
//! Based on "LIBSVM: A Library for Support Vector Machines" by Chih-Chung
//! Chang and Chih-Jen Lin, and "Working Set Selection Using Second Order
//! Information for Training SVM" by Fan, Chen and Lin.

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod model;
pub mod multiclass;
pub mod optimizer;
pub mod persistence;
pub mod probability;
pub mod solver;
pub mod validation;

// Re-export main types for convenience
pub use crate::api::{EvaluationMetrics, RegressionMetrics, SVM};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{Formulation, KernelType, Result, SVMError, SvmParams};
pub use crate::data::LibSVMDataset;
pub use crate::kernel::Kernel;
pub use crate::model::{Calibration, ModelParts, SvmModel};
pub use crate::multiclass::{train, train_with_cancel};
pub use crate::validation::{cross_validate, cross_validate_with_cancel};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
