//! Training parameters
//!
//! The problem formulation and the kernel family are tagged enums carrying
//! their own hyperparameters, so an invalid combination (a nu value on a
//! C-SVC, a degree on an RBF kernel) cannot be expressed.

use serde::{Deserialize, Serialize};

use crate::core::{ProblemView, Result, SVMError};

/// The five supported problem formulations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Formulation {
    /// C-support vector classification
    CSvc { c: f64 },
    /// nu-support vector classification
    NuSvc { nu: f64 },
    /// One-class SVM (support estimation)
    OneClass { nu: f64 },
    /// epsilon-support vector regression with tube half-width `p`
    EpsilonSvr { c: f64, p: f64 },
    /// nu-support vector regression
    NuSvr { c: f64, nu: f64 },
}

impl Formulation {
    pub fn name(&self) -> &'static str {
        match self {
            Formulation::CSvc { .. } => "c_svc",
            Formulation::NuSvc { .. } => "nu_svc",
            Formulation::OneClass { .. } => "one_class",
            Formulation::EpsilonSvr { .. } => "epsilon_svr",
            Formulation::NuSvr { .. } => "nu_svr",
        }
    }

    /// C-SVC and nu-SVC: labels are class identifiers
    pub fn is_classification(&self) -> bool {
        matches!(self, Formulation::CSvc { .. } | Formulation::NuSvc { .. })
    }

    pub fn is_regression(&self) -> bool {
        matches!(
            self,
            Formulation::EpsilonSvr { .. } | Formulation::NuSvr { .. }
        )
    }
}

/// Kernel family and its hyperparameters
///
/// A `gamma` of `0.0` is resolved to `1 / max_feature_index` at training time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelType {
    /// K(x, y) = x·y
    Linear,
    /// K(x, y) = (gamma·x·y + coef0)^degree
    Polynomial { degree: u32, gamma: f64, coef0: f64 },
    /// K(x, y) = exp(-gamma·||x - y||²)
    Rbf { gamma: f64 },
    /// K(x, y) = tanh(gamma·x·y + coef0)
    Sigmoid { gamma: f64, coef0: f64 },
    /// Kernel values supplied by the caller; feature 0 carries the row id
    Precomputed,
}

impl KernelType {
    pub fn name(&self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial { .. } => "polynomial",
            KernelType::Rbf { .. } => "rbf",
            KernelType::Sigmoid { .. } => "sigmoid",
            KernelType::Precomputed => "precomputed",
        }
    }

    pub fn gamma(&self) -> Option<f64> {
        match *self {
            KernelType::Polynomial { gamma, .. }
            | KernelType::Rbf { gamma }
            | KernelType::Sigmoid { gamma, .. } => Some(gamma),
            KernelType::Linear | KernelType::Precomputed => None,
        }
    }

    /// Replace an automatic (zero) gamma with `1 / max_feature_index`
    pub fn with_resolved_gamma(self, max_feature_index: usize) -> Self {
        let auto = 1.0 / max_feature_index.max(1) as f64;
        let resolve = |g: f64| if g == 0.0 { auto } else { g };
        match self {
            KernelType::Polynomial {
                degree,
                gamma,
                coef0,
            } => KernelType::Polynomial {
                degree,
                gamma: resolve(gamma),
                coef0,
            },
            KernelType::Rbf { gamma } => KernelType::Rbf {
                gamma: resolve(gamma),
            },
            KernelType::Sigmoid { gamma, coef0 } => KernelType::Sigmoid {
                gamma: resolve(gamma),
                coef0,
            },
            other => other,
        }
    }
}

/// Full training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub formulation: Formulation,
    pub kernel: KernelType,
    /// Stopping tolerance on the maximal KKT violation
    pub eps: f64,
    /// Gram-row cache budget in megabytes
    pub cache_size: f64,
    pub shrinking: bool,
    /// Fit probability calibration after training
    pub probability: bool,
    /// Per-class multipliers on C, as (label, weight)
    #[serde(default)]
    pub class_weights: Vec<(i32, f64)>,
    /// Solver iteration ceiling; `None` means `max(10_000_000, 100 * l)`
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Seed for cross-validation fold shuffling
    #[serde(default)]
    pub seed: u64,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            formulation: Formulation::CSvc { c: 1.0 },
            kernel: KernelType::Rbf { gamma: 0.0 },
            eps: 1e-3,
            cache_size: 100.0,
            shrinking: true,
            probability: false,
            class_weights: Vec::new(),
            max_iterations: None,
            seed: 0,
        }
    }
}

impl SvmParams {
    pub fn new(formulation: Formulation, kernel: KernelType) -> Self {
        Self {
            formulation,
            kernel,
            ..Self::default()
        }
    }

    /// Iteration ceiling for a solver over `l` variables
    pub fn iteration_limit(&self, l: usize) -> usize {
        self.max_iterations
            .unwrap_or_else(|| 10_000_000.max(l.saturating_mul(100)))
    }

    /// Weight applied to C for class `label`, 1 when none is configured
    pub fn weight_for(&self, label: i32) -> f64 {
        self.class_weights
            .iter()
            .rev()
            .find(|(l, _)| *l == label)
            .map_or(1.0, |&(_, w)| w)
    }

    /// Copy with an automatic gamma resolved against `problem`
    pub fn resolved(&self, problem: &ProblemView) -> Self {
        Self {
            kernel: self
                .kernel
                .with_resolved_gamma(problem.max_feature_index()),
            ..self.clone()
        }
    }

    /// Check every precondition before any training work starts.
    pub fn validate(&self, problem: &ProblemView) -> Result<()> {
        if problem.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        if let Some(gamma) = self.kernel.gamma() {
            if !(gamma >= 0.0) {
                return Err(invalid("gamma must be non-negative"));
            }
        }
        if !(self.cache_size > 0.0) {
            return Err(invalid("cache_size must be positive"));
        }
        if !(self.eps > 0.0) {
            return Err(invalid("eps must be positive"));
        }
        if self.max_iterations == Some(0) {
            return Err(invalid("max_iterations must be positive"));
        }

        match self.formulation {
            Formulation::CSvc { c } => check_c(c)?,
            Formulation::NuSvc { nu } | Formulation::OneClass { nu } => check_nu(nu)?,
            Formulation::EpsilonSvr { c, p } => {
                check_c(c)?;
                if !(p >= 0.0) {
                    return Err(invalid("p must be non-negative"));
                }
            }
            Formulation::NuSvr { c, nu } => {
                check_c(c)?;
                check_nu(nu)?;
            }
        }

        if let Some(&(label, w)) = self.class_weights.iter().find(|(_, w)| !(*w > 0.0)) {
            return Err(invalid(&format!(
                "weight for class {} must be positive, got {}",
                label, w
            )));
        }

        if self.probability && matches!(self.formulation, Formulation::OneClass { .. }) {
            return Err(invalid(
                "one-class SVM probability output is not supported",
            ));
        }

        if problem.y.iter().any(|y| !y.is_finite()) {
            return Err(SVMError::InvalidDataset(
                "labels must be finite".to_string(),
            ));
        }

        if let Formulation::NuSvc { nu } = self.formulation {
            let counts = class_counts(&problem.y);
            for (i, &(_, n1)) in counts.iter().enumerate() {
                for &(_, n2) in &counts[i + 1..] {
                    if nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                        return Err(invalid("specified nu is infeasible"));
                    }
                }
            }
        }

        if self.kernel == KernelType::Precomputed {
            for (i, x) in problem.x.iter().enumerate() {
                let id = x.get(0);
                if x.indices.first() != Some(&0) || id < 1.0 || id.fract() != 0.0 {
                    return Err(SVMError::InvalidDataset(format!(
                        "sample {}: precomputed kernel needs feature 0 holding a row id >= 1",
                        i
                    )));
                }
            }
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> SVMError {
    SVMError::InvalidParameter(msg.to_string())
}

fn check_c(c: f64) -> Result<()> {
    if c > 0.0 {
        Ok(())
    } else {
        Err(invalid("C must be positive"))
    }
}

fn check_nu(nu: f64) -> Result<()> {
    if nu > 0.0 && nu <= 1.0 {
        Ok(())
    } else {
        Err(invalid("nu must be in (0, 1]"))
    }
}

/// Per-label sample counts in first-seen order
fn class_counts(y: &[f64]) -> Vec<(i32, usize)> {
    let mut counts: Vec<(i32, usize)> = Vec::new();
    for &label in y {
        let label = label as i32;
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
}
