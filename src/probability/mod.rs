//! Probability calibration
//!
//! Binary classifiers get a Platt sigmoid fitted on cross-validated
//! decision values; multiclass probabilities couple the pairwise ones
//! (Wu, Lin and Weng, 2004). Regression models get the scale of a Laplace
//! distribution fitted to cross-validated residuals.

use log::{debug, info};
use rayon::prelude::*;

use crate::core::{CancelToken, Formulation, ProblemView, Result, SvmParams};
use crate::multiclass::train_resolved;
use crate::validation::{cross_validate_view, plan_folds};

/// Folds used by internal calibration runs
const CALIBRATION_FOLDS: usize = 5;

/// Fit (A, B) of P(y = 1 | f) = 1 / (1 + exp(A f + B)) by Newton's method
/// with backtracking, on regularized targets.
pub fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        dec_values
            .iter()
            .zip(&t)
            .map(|(&f, &ti)| {
                let f_apb = f * a + b;
                if f_apb >= 0.0 {
                    ti * f_apb + (-f_apb).exp().ln_1p()
                } else {
                    (ti - 1.0) * f_apb + f_apb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    let mut iter = 0;
    while iter < MAX_ITER {
        let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);
        for (&f, &ti) in dec_values.iter().zip(&t) {
            let f_apb = f * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = ti - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * da;
            let new_b = b + step * db;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            info!("line search fails in two-class probability estimates");
            break;
        }
        iter += 1;
    }

    if iter >= MAX_ITER {
        info!("reaching maximal iterations in two-class probability estimates");
    }
    (a, b)
}

/// Evaluate the fitted sigmoid without overflow.
pub fn sigmoid_predict(dec_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = dec_value * a + b;
    if f_apb >= 0.0 {
        let e = (-f_apb).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Couple pairwise probabilities `r[i][j]` ≈ P(i | i or j) into class
/// probabilities that sum to one.
pub fn multiclass_probability(k: usize, r: &[Vec<f64>]) -> Vec<f64> {
    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;

    let mut p = vec![1.0 / k as f64; k];
    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut qp = vec![0.0; k];
    let mut iter = 0;
    while iter < max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - pqp).abs())
            .fold(0.0_f64, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        info!("exceeds max_iter in multiclass_prob");
    }
    p
}

/// Platt parameters for one class pair (+1 / -1 labels), fitted on decision
/// values from a stratified cross-validation of the pair.
pub fn binary_svc_probability(
    view: &ProblemView,
    params: &SvmParams,
    cp: f64,
    cn: f64,
    cancel: Option<&CancelToken>,
) -> Result<(f64, f64)> {
    let (perm, fold_start) = plan_folds(view, true, CALIBRATION_FOLDS, params.seed);

    let mut sub_params = params.clone();
    sub_params.probability = false;
    if let Formulation::CSvc { .. } = sub_params.formulation {
        sub_params.formulation = Formulation::CSvc { c: 1.0 };
    }
    sub_params.class_weights = vec![(1, cp), (-1, cn)];

    let per_fold: Vec<Vec<(usize, f64)>> = (0..CALIBRATION_FOLDS)
        .into_par_iter()
        .map(|fold| -> Result<Vec<(usize, f64)>> {
            let (begin, end) = (fold_start[fold], fold_start[fold + 1]);
            let train_idx: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
            let train = view.subset(&train_idx);

            let positives = train.y.iter().filter(|&&y| y > 0.0).count();
            let negatives = train.len() - positives;

            let fixed = match (positives, negatives) {
                (0, 0) => Some(0.0),
                (_, 0) => Some(1.0),
                (0, _) => Some(-1.0),
                _ => None,
            };
            if let Some(value) = fixed {
                return Ok(perm[begin..end].iter().map(|&i| (i, value)).collect());
            }

            let model = train_resolved(&train, &sub_params, cancel)?;
            let sign = f64::from(model.labels()[0]);
            Ok(perm[begin..end]
                .iter()
                .map(|&i| (i, model.predict_values(view.x[i])[0] * sign))
                .collect())
        })
        .collect::<Result<_>>()?;

    let mut dec_values = vec![0.0; view.len()];
    for (i, value) in per_fold.into_iter().flatten() {
        dec_values[i] = value;
    }

    let (a, b) = sigmoid_train(&dec_values, &view.y);
    debug!("Platt parameters A = {:.6}, B = {:.6}", a, b);
    Ok((a, b))
}

/// Laplace scale of cross-validated regression residuals, ignoring
/// residuals beyond five standard deviations.
pub fn svr_probability(
    view: &ProblemView,
    params: &SvmParams,
    cancel: Option<&CancelToken>,
) -> Result<f64> {
    let mut sub_params = params.clone();
    sub_params.probability = false;

    let predicted = cross_validate_view(view, &sub_params, CALIBRATION_FOLDS, cancel)?;
    let residuals: Vec<f64> = view
        .y
        .iter()
        .zip(&predicted)
        .map(|(y, p)| y - p)
        .collect();

    let l = residuals.len() as f64;
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / l;
    let std = (2.0 * mae * mae).sqrt();

    let kept: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= 5.0 * std)
        .collect();
    let sigma = kept.iter().sum::<f64>() / kept.len() as f64;

    info!(
        "probability model for test data: target = predicted + z, z ~ Laplace with sigma = {:.6}",
        sigma
    );
    Ok(sigma)
}
