//! High-level API for Support Vector Machine operations
//!
//! This module provides a builder over [`SvmParams`] plus evaluation
//! helpers for classification and regression results.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use smosvm::api::{evaluate_classification, SVM};
//! use smosvm::core::{Formulation, KernelType};
//! use smosvm::data::LibSVMDataset;
//! use smosvm::Dataset;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = SVM::new(Formulation::CSvc { c: 1.0 })
//!     .with_kernel(KernelType::Rbf { gamma: 0.5 })
//!     .with_epsilon(0.001)
//!     .train_from_file("data.libsvm")?;
//!
//! let test = LibSVMDataset::from_file("test.libsvm")?.to_problem()?;
//! let metrics = evaluate_classification(&model, &test);
//! println!("Accuracy: {:.2}%", metrics.accuracy() * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{
    CancelToken, Dataset, Formulation, KernelType, Problem, Result, SparseVector, SvmParams,
};
use crate::data::LibSVMDataset;
use crate::model::SvmModel;
use crate::multiclass;
use crate::validation;
use std::path::Path;

/// SVM trainer with builder pattern
#[derive(Debug, Clone)]
pub struct SVM {
    params: SvmParams,
    cancel: Option<CancelToken>,
}

impl SVM {
    /// Create a trainer for `formulation` with default settings
    /// (RBF kernel with automatic gamma)
    pub fn new(formulation: Formulation) -> Self {
        Self {
            params: SvmParams {
                formulation,
                ..SvmParams::default()
            },
            cancel: None,
        }
    }

    /// Start from a complete parameter set
    pub fn from_params(params: SvmParams) -> Self {
        Self {
            params,
            cancel: None,
        }
    }

    pub fn with_kernel(mut self, kernel: KernelType) -> Self {
        self.params.kernel = kernel;
        self
    }

    /// Set convergence tolerance
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.params.eps = epsilon;
        self
    }

    /// Set kernel cache size in megabytes
    pub fn with_cache_size(mut self, megabytes: f64) -> Self {
        self.params.cache_size = megabytes;
        self
    }

    pub fn with_shrinking(mut self, shrinking: bool) -> Self {
        self.params.shrinking = shrinking;
        self
    }

    pub fn with_probability(mut self, probability: bool) -> Self {
        self.params.probability = probability;
        self
    }

    /// Multiply C by `weight` for class `label`
    pub fn with_class_weight(mut self, label: i32, weight: f64) -> Self {
        self.params.class_weights.push((label, weight));
        self
    }

    /// Set maximum number of solver iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.params.max_iterations = Some(max_iterations);
        self
    }

    /// Seed for fold shuffling in cross-validation and calibration
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn params(&self) -> &SvmParams {
        &self.params
    }

    pub fn train(&self, problem: &Problem) -> Result<SvmModel> {
        multiclass::train_with_cancel(problem, &self.params, self.cancel.as_ref())
    }

    pub fn train_dataset<D: Dataset>(&self, dataset: &D) -> Result<SvmModel> {
        self.train(&dataset.to_problem()?)
    }

    /// Train from LibSVM format file
    pub fn train_from_file<P: AsRef<Path>>(&self, path: P) -> Result<SvmModel> {
        self.train_dataset(&LibSVMDataset::from_file(path)?)
    }

    /// Out-of-fold prediction for every sample, in sample order
    pub fn cross_validate(&self, problem: &Problem, nr_fold: usize) -> Result<Vec<f64>> {
        validation::cross_validate_with_cancel(problem, &self.params, nr_fold, self.cancel.as_ref())
    }
}

impl Default for SVM {
    fn default() -> Self {
        Self::new(Formulation::CSvc { c: 1.0 })
    }
}

/// Predict every sample of `samples`
pub fn predict_batch(model: &SvmModel, samples: &[SparseVector]) -> Vec<f64> {
    samples.iter().map(|x| model.predict(x)).collect()
}

/// Classification metrics; label > 0 counts as the positive class
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationMetrics {
    pub correct: usize,
    pub total: usize,
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationMetrics {
    pub fn from_predictions(predicted: &[f64], actual: &[f64]) -> Self {
        let mut metrics = Self::default();
        for (&pred, &truth) in predicted.iter().zip(actual) {
            metrics.total += 1;
            if pred == truth {
                metrics.correct += 1;
            }
            match (pred > 0.0, truth > 0.0) {
                (true, true) => metrics.true_positives += 1,
                (false, false) => metrics.true_negatives += 1,
                (true, false) => metrics.false_positives += 1,
                (false, true) => metrics.false_negatives += 1,
            }
        }
        metrics
    }

    /// Fraction of exact label matches (meaningful for any class count)
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// Calculate precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Calculate recall (sensitivity): TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }

    /// Calculate specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(self.true_negatives, self.true_negatives + self.false_positives)
    }
}

/// Regression metrics
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionMetrics {
    pub mean_squared_error: f64,
    /// Squared correlation coefficient between predictions and targets
    pub squared_correlation: f64,
    pub total: usize,
}

impl RegressionMetrics {
    pub fn from_predictions(predicted: &[f64], actual: &[f64]) -> Self {
        let n = predicted.len().min(actual.len());
        let (mut error, mut sum_v, mut sum_y, mut sum_vv, mut sum_yy, mut sum_vy) =
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        for (&v, &y) in predicted.iter().zip(actual) {
            error += (v - y) * (v - y);
            sum_v += v;
            sum_y += y;
            sum_vv += v * v;
            sum_yy += y * y;
            sum_vy += v * y;
        }

        if n == 0 {
            return Self {
                mean_squared_error: 0.0,
                squared_correlation: 0.0,
                total: 0,
            };
        }

        let l = n as f64;
        let numerator = (l * sum_vy - sum_v * sum_y).powi(2);
        let denominator = (l * sum_vv - sum_v * sum_v) * (l * sum_yy - sum_y * sum_y);
        Self {
            mean_squared_error: error / l,
            squared_correlation: if denominator == 0.0 {
                0.0
            } else {
                numerator / denominator
            },
            total: n,
        }
    }
}

pub fn evaluate_classification(model: &SvmModel, problem: &Problem) -> EvaluationMetrics {
    let predicted = predict_batch(model, problem.features());
    EvaluationMetrics::from_predictions(&predicted, problem.labels())
}

pub fn evaluate_regression(model: &SvmModel, problem: &Problem) -> RegressionMetrics {
    let predicted = predict_batch(model, problem.features());
    RegressionMetrics::from_predictions(&predicted, problem.labels())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Convenience functions for quick operations
pub mod quick {
    use super::*;

    /// Train a C-SVC with default parameters on a LibSVM file
    pub fn train_libsvm<P: AsRef<Path>>(path: P) -> Result<SvmModel> {
        SVM::default().train_from_file(path)
    }

    /// Train on one file, report accuracy on another
    pub fn evaluate_split<P1: AsRef<Path>, P2: AsRef<Path>>(
        train_path: P1,
        test_path: P2,
    ) -> Result<f64> {
        let model = train_libsvm(train_path)?;
        let test = LibSVMDataset::from_file(test_path)?.to_problem()?;
        Ok(evaluate_classification(&model, &test).accuracy())
    }
}
