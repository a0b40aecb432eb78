//! One-vs-one training and model assembly
//!
//! Samples are grouped by class, one binary machine is trained per class
//! pair (in parallel), and the support vectors of all pairs are merged into
//! a single pool so each vector is stored once.

use log::{info, warn};
use rayon::prelude::*;

use crate::core::{CancelToken, Formulation, Problem, ProblemView, Result, SVMError, SvmParams};
use crate::model::{Calibration, ModelParts, SvmModel};
use crate::optimizer::{DecisionFunction, SVMOptimizer};
use crate::probability::{binary_svc_probability, svr_probability};

/// Samples grouped by class label
#[derive(Debug, Clone, PartialEq)]
pub struct ClassGroups {
    /// Labels in first-seen order (a {-1, +1} problem always lists +1 first)
    pub labels: Vec<i32>,
    /// Offset of each class block in `perm`
    pub start: Vec<usize>,
    pub count: Vec<usize>,
    /// Original sample positions, ordered class by class
    pub perm: Vec<usize>,
}

impl ClassGroups {
    pub fn nr_class(&self) -> usize {
        self.labels.len()
    }
}

/// Group samples by integral label.
pub fn group_classes(y: &[f64]) -> ClassGroups {
    let mut labels: Vec<i32> = Vec::new();
    let mut count: Vec<usize> = Vec::new();
    let mut data_label = Vec::with_capacity(y.len());

    for &value in y {
        let label = value as i32;
        match labels.iter().position(|&l| l == label) {
            Some(c) => {
                count[c] += 1;
                data_label.push(c);
            }
            None => {
                data_label.push(labels.len());
                labels.push(label);
                count.push(1);
            }
        }
    }

    // binary problems with -1 seen first still put +1 first
    if labels.len() == 2 && labels[0] == -1 && labels[1] == 1 {
        labels.swap(0, 1);
        count.swap(0, 1);
        for c in data_label.iter_mut() {
            *c = 1 - *c;
        }
    }

    let mut start = vec![0usize; labels.len()];
    for c in 1..labels.len() {
        start[c] = start[c - 1] + count[c - 1];
    }

    let mut next = start.clone();
    let mut perm = vec![0usize; y.len()];
    for (i, &c) in data_label.iter().enumerate() {
        perm[next[c]] = i;
        next[c] += 1;
    }

    ClassGroups {
        labels,
        start,
        count,
        perm,
    }
}

/// Train a model on `problem`.
pub fn train(problem: &Problem, params: &SvmParams) -> Result<SvmModel> {
    train_with_cancel(problem, params, None)
}

/// Train a model, aborting with `Cancelled` once `cancel` is set.
pub fn train_with_cancel(
    problem: &Problem,
    params: &SvmParams,
    cancel: Option<&CancelToken>,
) -> Result<SvmModel> {
    let view = problem.view();
    params.validate(&view)?;
    let params = params.resolved(&view);
    train_resolved(&view, &params, cancel)
}

/// Training without parameter validation; used for internal refits on
/// folds of an already validated problem.
pub(crate) fn train_resolved(
    view: &ProblemView,
    params: &SvmParams,
    cancel: Option<&CancelToken>,
) -> Result<SvmModel> {
    if view.is_empty() {
        return Err(SVMError::EmptyDataset);
    }
    if params.formulation.is_classification() {
        train_classifier(view, params, cancel)
    } else {
        train_single(view, params, cancel)
    }
}

/// One-class and regression: a single machine over the whole problem.
fn train_single(
    view: &ProblemView,
    params: &SvmParams,
    cancel: Option<&CancelToken>,
) -> Result<SvmModel> {
    let calibration = if params.probability && params.formulation.is_regression() {
        Some(Calibration::Laplace {
            sigma: svr_probability(view, params, cancel)?,
        })
    } else {
        None
    };

    let df = SVMOptimizer::new(params)
        .with_cancel_token(cancel.cloned())
        .train_one(view, 0.0, 0.0)?;

    let sv_indices = df.support_indices();
    let support_vectors = sv_indices.iter().map(|&i| view.x[i].clone()).collect();
    let coef = sv_indices.iter().map(|&i| df.coef[i]).collect();

    SvmModel::from_parts(ModelParts {
        params: params.clone(),
        nr_class: 2,
        labels: Vec::new(),
        n_sv: Vec::new(),
        support_vectors,
        sv_coef: vec![coef],
        rho: vec![df.rho],
        sv_indices,
        calibration,
    })
}

fn train_classifier(
    view: &ProblemView,
    params: &SvmParams,
    cancel: Option<&CancelToken>,
) -> Result<SvmModel> {
    let groups = group_classes(&view.y);
    let nr_class = groups.nr_class();
    if nr_class == 1 {
        warn!("training data in only one class; every prediction will be that class");
    }

    for &(label, _) in &params.class_weights {
        if !groups.labels.contains(&label) {
            warn!("class label {} specified in weight is not found", label);
        }
    }

    let base_c = match params.formulation {
        Formulation::CSvc { c } => c,
        _ => 1.0,
    };
    let weighted_c: Vec<f64> = groups
        .labels
        .iter()
        .map(|&label| base_c * params.weight_for(label))
        .collect();

    let sorted = view.subset(&groups.perm);

    let pairs: Vec<(usize, usize)> = (0..nr_class)
        .flat_map(|i| (i + 1..nr_class).map(move |j| (i, j)))
        .collect();

    let trained: Vec<(DecisionFunction, Option<(f64, f64)>)> = pairs
        .par_iter()
        .map(|&(i, j)| -> Result<(DecisionFunction, Option<(f64, f64)>)> {
            let sub = pair_view(&sorted, &groups, i, j);
            let sigmoid = if params.probability {
                Some(binary_svc_probability(
                    &sub,
                    params,
                    weighted_c[i],
                    weighted_c[j],
                    cancel,
                )?)
            } else {
                None
            };
            let df = SVMOptimizer::new(params)
                .with_cancel_token(cancel.cloned())
                .train_one(&sub, weighted_c[i], weighted_c[j])?;
            Ok((df, sigmoid))
        })
        .collect::<Result<_>>()?;

    // a sample is kept if any pair uses it
    let l = sorted.len();
    let mut nonzero = vec![false; l];
    for (&(i, j), (df, _)) in pairs.iter().zip(&trained) {
        let (si, ci) = (groups.start[i], groups.count[i]);
        let (sj, cj) = (groups.start[j], groups.count[j]);
        for k in 0..ci {
            if df.coef[k] != 0.0 {
                nonzero[si + k] = true;
            }
        }
        for k in 0..cj {
            if df.coef[ci + k] != 0.0 {
                nonzero[sj + k] = true;
            }
        }
    }

    let n_sv: Vec<usize> = (0..nr_class)
        .map(|c| {
            let start = groups.start[c];
            nonzero[start..start + groups.count[c]]
                .iter()
                .filter(|&&nz| nz)
                .count()
        })
        .collect();

    let mut support_vectors = Vec::new();
    let mut sv_indices = Vec::new();
    for i in (0..l).filter(|&i| nonzero[i]) {
        support_vectors.push(sorted.x[i].clone());
        sv_indices.push(groups.perm[i]);
    }
    let total_sv = support_vectors.len();

    let mut nz_start = vec![0usize; nr_class];
    for c in 1..nr_class {
        nz_start[c] = nz_start[c - 1] + n_sv[c - 1];
    }

    let mut sv_coef = Vec::with_capacity(pairs.len());
    let mut rho = Vec::with_capacity(pairs.len());
    for (&(i, j), (df, _)) in pairs.iter().zip(&trained) {
        let mut row = vec![0.0; total_sv];
        let (si, ci) = (groups.start[i], groups.count[i]);
        let (sj, cj) = (groups.start[j], groups.count[j]);

        let mut q = nz_start[i];
        for k in 0..ci {
            if nonzero[si + k] {
                row[q] = df.coef[k];
                q += 1;
            }
        }
        let mut q = nz_start[j];
        for k in 0..cj {
            if nonzero[sj + k] {
                row[q] = df.coef[ci + k];
                q += 1;
            }
        }

        sv_coef.push(row);
        rho.push(df.rho);
    }

    let calibration = if params.probability {
        let (prob_a, prob_b) = trained
            .iter()
            .map(|(_, sigmoid)| sigmoid.unwrap_or((0.0, 0.0)))
            .unzip();
        Some(Calibration::Platt { prob_a, prob_b })
    } else {
        None
    };

    info!("Total nSV = {}", total_sv);

    SvmModel::from_parts(ModelParts {
        params: params.clone(),
        nr_class,
        labels: groups.labels,
        n_sv,
        support_vectors,
        sv_coef,
        rho,
        sv_indices,
        calibration,
    })
}

/// Class `i` as +1 followed by class `j` as -1
fn pair_view<'a>(
    sorted: &ProblemView<'a>,
    groups: &ClassGroups,
    i: usize,
    j: usize,
) -> ProblemView<'a> {
    let (si, ci) = (groups.start[i], groups.count[i]);
    let (sj, cj) = (groups.start[j], groups.count[j]);
    let positions: Vec<usize> = (si..si + ci).chain(sj..sj + cj).collect();
    let mut sub = sorted.subset(&positions);
    for (k, y) in sub.y.iter_mut().enumerate() {
        *y = if k < ci { 1.0 } else { -1.0 };
    }
    sub
}
