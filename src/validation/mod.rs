//! k-fold cross-validation
//!
//! Classification folds are stratified so each fold keeps the class
//! proportions of the whole problem; everything else is split after a
//! seeded shuffle. Folds are trained in parallel and predictions come back
//! in the problem's sample order.

use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::core::{CancelToken, Problem, ProblemView, Result, SVMError, SvmParams};
use crate::multiclass::{group_classes, train_resolved};

/// Predict every sample with a model trained on the other folds.
pub fn cross_validate(problem: &Problem, params: &SvmParams, nr_fold: usize) -> Result<Vec<f64>> {
    cross_validate_with_cancel(problem, params, nr_fold, None)
}

pub fn cross_validate_with_cancel(
    problem: &Problem,
    params: &SvmParams,
    nr_fold: usize,
    cancel: Option<&CancelToken>,
) -> Result<Vec<f64>> {
    if nr_fold < 2 {
        return Err(SVMError::InvalidParameter(format!(
            "cross-validation needs at least 2 folds, got {}",
            nr_fold
        )));
    }

    let view = problem.view();
    params.validate(&view)?;
    let params = params.resolved(&view);

    let nr_fold = if nr_fold > view.len() {
        warn!(
            "{} folds for {} samples; using leave-one-out cross-validation",
            nr_fold,
            view.len()
        );
        view.len()
    } else {
        nr_fold
    };

    cross_validate_view(&view, &params, nr_fold, cancel)
}

/// Prediction for a fold left with nothing to train on (a single-sample
/// problem): the decision value of a machine with no support vectors.
const UNTRAINED: f64 = 0.0;

/// Cross-validation over an already validated view with resolved parameters
pub(crate) fn cross_validate_view(
    view: &ProblemView,
    params: &SvmParams,
    nr_fold: usize,
    cancel: Option<&CancelToken>,
) -> Result<Vec<f64>> {
    let classification = params.formulation.is_classification();
    let (perm, fold_start) = plan_folds(view, classification, nr_fold, params.seed);
    let with_probability = params.probability && classification;

    let per_fold: Vec<Vec<(usize, f64)>> = (0..nr_fold)
        .into_par_iter()
        .map(|fold| -> Result<Vec<(usize, f64)>> {
            let (begin, end) = (fold_start[fold], fold_start[fold + 1]);
            if begin == end {
                return Ok(Vec::new());
            }
            let train_idx: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
            if train_idx.is_empty() {
                warn!("no training samples outside fold {}; predicting {}", fold, UNTRAINED);
                return Ok(perm[begin..end].iter().map(|&i| (i, UNTRAINED)).collect());
            }
            let model = train_resolved(&view.subset(&train_idx), params, cancel)?;

            perm[begin..end]
                .iter()
                .map(|&i| -> Result<(usize, f64)> {
                    let x = view.x[i];
                    let value = if with_probability {
                        model.predict_probability(x)?.0
                    } else {
                        model.predict(x)
                    };
                    Ok((i, value))
                })
                .collect()
        })
        .collect::<Result<_>>()?;

    let mut target = vec![0.0; view.len()];
    for (i, value) in per_fold.into_iter().flatten() {
        target[i] = value;
    }
    Ok(target)
}

/// Sample order and fold boundaries: fold `f` is
/// `perm[fold_start[f]..fold_start[f + 1]]`.
pub(crate) fn plan_folds(
    view: &ProblemView,
    stratify: bool,
    nr_fold: usize,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let l = view.len();
    let mut rng = StdRng::seed_from_u64(seed);

    if stratify && nr_fold < l {
        let groups = group_classes(&view.y);
        let mut index = groups.perm.clone();
        for c in 0..groups.nr_class() {
            let start = groups.start[c];
            index[start..start + groups.count[c]].shuffle(&mut rng);
        }

        let mut fold_start = vec![0usize; nr_fold + 1];
        for i in 0..nr_fold {
            let fold_count: usize = groups
                .count
                .iter()
                .map(|&n| (i + 1) * n / nr_fold - i * n / nr_fold)
                .sum();
            fold_start[i + 1] = fold_start[i] + fold_count;
        }

        let mut next = fold_start.clone();
        let mut perm = vec![0usize; l];
        for c in 0..groups.nr_class() {
            let (start, n) = (groups.start[c], groups.count[c]);
            for i in 0..nr_fold {
                let begin = start + i * n / nr_fold;
                let end = start + (i + 1) * n / nr_fold;
                for &sample in &index[begin..end] {
                    perm[next[i]] = sample;
                    next[i] += 1;
                }
            }
        }
        (perm, fold_start)
    } else {
        let mut perm: Vec<usize> = (0..l).collect();
        perm.shuffle(&mut rng);
        let fold_start = (0..=nr_fold).map(|i| i * l / nr_fold).collect();
        (perm, fold_start)
    }
}
