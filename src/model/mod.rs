//! Trained SVM model
//!
//! A model is built through exactly one path, [`SvmModel::from_parts`],
//! whether it comes out of training or out of a model file. The flat
//! [`ModelParts`] form is what serializers read and write.

use serde::{Deserialize, Serialize};

use crate::core::{Formulation, KernelType, Result, SVMError, SparseVector, SvmParams};
use crate::kernel::Kernel;
use crate::probability::{multiclass_probability, sigmoid_predict};

/// Pairwise probabilities are clamped away from 0 and 1 by this much
const MIN_PROBABILITY: f64 = 1e-7;

/// Probability calibration fitted after training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Calibration {
    /// Platt sigmoid P(y = 1 | f) = 1 / (1 + exp(A f + B)), one (A, B) per class pair
    Platt { prob_a: Vec<f64>, prob_b: Vec<f64> },
    /// Laplace residual scale for regression
    Laplace { sigma: f64 },
}

/// Flat, serializable content of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParts {
    /// Parameters used for training, with gamma resolved
    pub params: SvmParams,
    /// Number of classes; 2 for one-class and regression models
    pub nr_class: usize,
    /// Class labels in pair order (classification only)
    #[serde(default)]
    pub labels: Vec<i32>,
    /// Support vectors per class, aligned with `labels` (classification only)
    #[serde(default)]
    pub n_sv: Vec<usize>,
    /// Support vectors, grouped by class for classification
    pub support_vectors: Vec<SparseVector>,
    /// One coefficient row per class pair (or one row), each spanning all
    /// support vectors, zero where a vector is not used by that pair
    pub sv_coef: Vec<Vec<f64>>,
    /// One bias per row of `sv_coef`
    pub rho: Vec<f64>,
    /// Position of each support vector in the training problem
    #[serde(default)]
    pub sv_indices: Vec<usize>,
    #[serde(default)]
    pub calibration: Option<Calibration>,
}

/// Immutable trained model
#[derive(Debug, Clone, PartialEq)]
pub struct SvmModel {
    parts: ModelParts,
    /// Offset of each class block in `support_vectors`
    class_start: Vec<usize>,
}

impl SvmModel {
    /// Build a model, checking every shape invariant.
    pub fn from_parts(parts: ModelParts) -> Result<Self> {
        let total_sv = parts.support_vectors.len();
        let classification = parts.params.formulation.is_classification();

        let expected_rows = if classification {
            let k = parts.nr_class;
            if k == 0 {
                return Err(invalid_model(
                    "a classifier needs at least one class".to_string(),
                ));
            }
            if parts.labels.len() != k || parts.n_sv.len() != k {
                return Err(invalid_model(format!(
                    "{} classes but {} labels and {} class counts",
                    k,
                    parts.labels.len(),
                    parts.n_sv.len()
                )));
            }
            let counted: usize = parts.n_sv.iter().sum();
            if counted != total_sv {
                return Err(invalid_model(format!(
                    "class counts sum to {} but there are {} support vectors",
                    counted, total_sv
                )));
            }
            k * k.saturating_sub(1) / 2
        } else {
            if parts.nr_class != 2 || !parts.labels.is_empty() || !parts.n_sv.is_empty() {
                return Err(invalid_model(
                    "one-class and regression models carry no class labels".to_string(),
                ));
            }
            1
        };

        if parts.sv_coef.len() != expected_rows {
            return Err(invalid_model(format!(
                "expected {} coefficient rows, found {}",
                expected_rows,
                parts.sv_coef.len()
            )));
        }
        if parts.rho.len() != parts.sv_coef.len() {
            return Err(invalid_model(format!(
                "{} biases for {} coefficient rows",
                parts.rho.len(),
                parts.sv_coef.len()
            )));
        }
        if let Some(row) = parts.sv_coef.iter().find(|row| row.len() != total_sv) {
            return Err(invalid_model(format!(
                "coefficient row of length {} for {} support vectors",
                row.len(),
                total_sv
            )));
        }
        if parts.sv_indices.len() != total_sv {
            return Err(invalid_model(format!(
                "{} support vector indices for {} support vectors",
                parts.sv_indices.len(),
                total_sv
            )));
        }

        match &parts.calibration {
            Some(Calibration::Platt { prob_a, prob_b }) => {
                if !classification || prob_a.len() != expected_rows || prob_b.len() != expected_rows
                {
                    return Err(invalid_model(
                        "Platt parameters need one (A, B) per class pair of a classifier"
                            .to_string(),
                    ));
                }
            }
            Some(Calibration::Laplace { sigma }) => {
                if !parts.params.formulation.is_regression() || !(*sigma >= 0.0) {
                    return Err(invalid_model(
                        "Laplace scale needs a regression model and a non-negative sigma"
                            .to_string(),
                    ));
                }
            }
            None => {}
        }

        let mut class_start = Vec::with_capacity(parts.n_sv.len());
        let mut offset = 0;
        for &n in &parts.n_sv {
            class_start.push(offset);
            offset += n;
        }

        Ok(Self { parts, class_start })
    }

    pub fn parts(&self) -> &ModelParts {
        &self.parts
    }

    pub fn to_parts(&self) -> ModelParts {
        self.parts.clone()
    }

    pub fn into_parts(self) -> ModelParts {
        self.parts
    }

    /// Decision values: one per class pair (i < j, in label order) for
    /// classification, a single value otherwise.
    pub fn predict_values(&self, x: &SparseVector) -> Vec<f64> {
        let kernel = self.parts.params.kernel;
        let kvalue: Vec<f64> = self
            .parts
            .support_vectors
            .iter()
            .map(|sv| kernel.compute(x, sv))
            .collect();

        if !self.is_classification() {
            let sum: f64 = self.parts.sv_coef[0]
                .iter()
                .zip(&kvalue)
                .map(|(c, k)| c * k)
                .sum();
            return vec![sum - self.parts.rho[0]];
        }

        let k = self.parts.nr_class;
        let mut dec_values = Vec::with_capacity(self.parts.rho.len());
        let mut p = 0;
        for i in 0..k {
            for j in i + 1..k {
                let coef = &self.parts.sv_coef[p];
                let block = |c: usize| {
                    let start = self.class_start[c];
                    let end = start + self.parts.n_sv[c];
                    coef[start..end]
                        .iter()
                        .zip(&kvalue[start..end])
                        .map(|(a, kv)| a * kv)
                        .sum::<f64>()
                };
                dec_values.push(block(i) + block(j) - self.parts.rho[p]);
                p += 1;
            }
        }
        dec_values
    }

    /// Predicted label, regression value, or +1 / -1 for one-class.
    pub fn predict(&self, x: &SparseVector) -> f64 {
        let dec_values = self.predict_values(x);
        match self.parts.params.formulation {
            Formulation::OneClass { .. } => {
                if dec_values[0] > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            Formulation::EpsilonSvr { .. } | Formulation::NuSvr { .. } => dec_values[0],
            Formulation::CSvc { .. } | Formulation::NuSvc { .. } => {
                let votes = pairwise_votes(self.parts.nr_class, &dec_values);
                f64::from(self.parts.labels[vote_winner(&votes)])
            }
        }
    }

    /// Label with per-class probabilities (in `labels` order).
    ///
    /// A calibrated regression model returns its value with no
    /// probabilities; the Laplace scale is read through
    /// [`SvmModel::svr_probability`].
    pub fn predict_probability(&self, x: &SparseVector) -> Result<(f64, Vec<f64>)> {
        match &self.parts.calibration {
            Some(Calibration::Platt { prob_a, prob_b }) => {
                let k = self.parts.nr_class;
                let dec_values = self.predict_values(x);

                let mut pairwise = vec![vec![0.0; k]; k];
                let mut p = 0;
                for i in 0..k {
                    for j in i + 1..k {
                        let prob = sigmoid_predict(dec_values[p], prob_a[p], prob_b[p])
                            .clamp(MIN_PROBABILITY, 1.0 - MIN_PROBABILITY);
                        pairwise[i][j] = prob;
                        pairwise[j][i] = 1.0 - prob;
                        p += 1;
                    }
                }

                let probabilities = match k {
                    1 => vec![1.0],
                    2 => vec![pairwise[0][1], pairwise[1][0]],
                    _ => multiclass_probability(k, &pairwise),
                };

                let mut best = 0;
                for (i, &prob) in probabilities.iter().enumerate().skip(1) {
                    if prob > probabilities[best] {
                        best = i;
                    }
                }
                Ok((f64::from(self.parts.labels[best]), probabilities))
            }
            Some(Calibration::Laplace { .. }) => Ok((self.predict(x), Vec::new())),
            None => Err(SVMError::ProbabilityUnavailable(format!(
                "{} model was trained without probability estimates",
                self.parts.params.formulation.name()
            ))),
        }
    }

    pub fn svm_type(&self) -> Formulation {
        self.parts.params.formulation
    }

    pub fn kernel(&self) -> KernelType {
        self.parts.params.kernel
    }

    pub fn params(&self) -> &SvmParams {
        &self.parts.params
    }

    pub fn nr_class(&self) -> usize {
        self.parts.nr_class
    }

    pub fn labels(&self) -> &[i32] {
        &self.parts.labels
    }

    pub fn n_sv(&self) -> &[usize] {
        &self.parts.n_sv
    }

    pub fn sv_indices(&self) -> &[usize] {
        &self.parts.sv_indices
    }

    pub fn total_sv(&self) -> usize {
        self.parts.support_vectors.len()
    }

    pub fn support_vectors(&self) -> &[SparseVector] {
        &self.parts.support_vectors
    }

    pub fn sv_coef(&self) -> &[Vec<f64>] {
        &self.parts.sv_coef
    }

    pub fn rho(&self) -> &[f64] {
        &self.parts.rho
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.parts.calibration.as_ref()
    }

    /// Laplace scale of a calibrated regression model
    pub fn svr_probability(&self) -> Option<f64> {
        match self.parts.calibration {
            Some(Calibration::Laplace { sigma }) => Some(sigma),
            _ => None,
        }
    }

    /// True when [`SvmModel::predict_probability`] can succeed
    pub fn has_probability_model(&self) -> bool {
        self.parts.calibration.is_some()
    }

    fn is_classification(&self) -> bool {
        self.parts.params.formulation.is_classification()
    }
}

/// One-vs-one votes: a positive decision value votes for the first class of
/// the pair, anything else for the second.
pub fn pairwise_votes(nr_class: usize, dec_values: &[f64]) -> Vec<usize> {
    let mut votes = vec![0usize; nr_class];
    let mut p = 0;
    for i in 0..nr_class {
        for j in i + 1..nr_class {
            if dec_values[p] > 0.0 {
                votes[i] += 1;
            } else {
                votes[j] += 1;
            }
            p += 1;
        }
    }
    votes
}

/// Index of the most voted class; ties go to the lowest index.
pub fn vote_winner(votes: &[usize]) -> usize {
    let mut best = 0;
    for (i, &v) in votes.iter().enumerate().skip(1) {
        if v > votes[best] {
            best = i;
        }
    }
    best
}

fn invalid_model(msg: String) -> SVMError {
    SVMError::InvalidModel(msg)
}
