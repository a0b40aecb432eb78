//! Binary training for the five SVM formulations
//!
//! Each formulation is mapped onto one SMO solve: a Q matrix, a linear term,
//! label signs, per-variable upper bounds and a feasible starting point.
//! The result is a [`DecisionFunction`] whose coefficients already carry the
//! label sign, so f(x) = Σ coef_i · K(x_i, x) - rho.

use log::debug;

use crate::core::{CancelToken, Formulation, ProblemView, Result, SvmParams};
use crate::solver::{
    Nu, OneClassQ, SMOSolver, Solution, SolutionInfo, SolverInput, Standard, SvcQ, SvrQ,
};

/// Fitted binary decision function over the training view it came from
#[derive(Debug, Clone)]
pub struct DecisionFunction {
    /// Signed coefficient per training sample (zero for non-SVs)
    pub coef: Vec<f64>,
    pub rho: f64,
    pub info: SolutionInfo,
}

impl DecisionFunction {
    /// Positions of samples with non-zero coefficient
    pub fn support_indices(&self) -> Vec<usize> {
        self.coef
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != 0.0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Trains one binary sub-problem with the configured formulation
pub struct SVMOptimizer<'p> {
    params: &'p SvmParams,
    cancel: Option<CancelToken>,
}

impl<'p> SVMOptimizer<'p> {
    /// `params` must already have an automatic gamma resolved
    pub fn new(params: &'p SvmParams) -> Self {
        Self {
            params,
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: Option<CancelToken>) -> Self {
        self.cancel = token;
        self
    }

    fn solver(&self, variables: usize) -> SMOSolver {
        SMOSolver::new(
            self.params.eps,
            self.params.shrinking,
            self.params.iteration_limit(variables),
        )
        .with_cancel_token(self.cancel.clone())
    }

    /// Train on `view`. For classification, labels must be +1 / -1 and
    /// `cp` / `cn` are the upper bounds of the two classes; the other
    /// formulations take their bounds from the parameters.
    pub fn train_one(&self, view: &ProblemView, cp: f64, cn: f64) -> Result<DecisionFunction> {
        let (coef, info, upper) = match self.params.formulation {
            Formulation::CSvc { .. } => {
                let (coef, info) = self.solve_c_svc(view, cp, cn)?;
                let upper: Vec<f64> = view
                    .y
                    .iter()
                    .map(|&y| if y > 0.0 { cp } else { cn })
                    .collect();
                (coef, info, upper)
            }
            Formulation::NuSvc { nu } => {
                let (coef, info) = self.solve_nu_svc(view, nu)?;
                let bound = 1.0 / info.r;
                (coef, info, vec![bound; view.len()])
            }
            Formulation::OneClass { nu } => {
                let (coef, info) = self.solve_one_class(view, nu)?;
                (coef, info, vec![1.0; view.len()])
            }
            Formulation::EpsilonSvr { c, p } => {
                let (coef, info) = self.solve_epsilon_svr(view, c, p)?;
                (coef, info, vec![c; view.len()])
            }
            Formulation::NuSvr { c, nu } => {
                let (coef, info) = self.solve_nu_svr(view, c, nu)?;
                (coef, info, vec![c; view.len()])
            }
        };

        debug!("obj = {:.6}, rho = {:.6}", info.obj, info.rho);

        let n_sv = coef.iter().filter(|c| **c != 0.0).count();
        let n_bsv = coef
            .iter()
            .zip(&upper)
            .filter(|(c, u)| **c != 0.0 && c.abs() >= **u)
            .count();
        debug!("nSV = {}, nBSV = {}", n_sv, n_bsv);

        Ok(DecisionFunction {
            rho: info.rho,
            coef,
            info,
        })
    }

    fn solve_c_svc(&self, view: &ProblemView, cp: f64, cn: f64) -> Result<(Vec<f64>, SolutionInfo)> {
        let l = view.len();
        let y = signs(&view.y);
        let input = SolverInput {
            p: vec![-1.0; l],
            alpha: vec![0.0; l],
            c: y.iter().map(|&s| if s > 0 { cp } else { cn }).collect(),
            y: y.clone(),
        };

        let q = SvcQ::new(self.params.kernel, &view.x, &y, self.params.cache_size);
        let Solution { alpha, info } = self.solver(l).solve(Standard, q, input)?;

        if cp == cn {
            let sum_alpha: f64 = alpha.iter().sum();
            debug!("nu = {:.6}", sum_alpha / (cp * l as f64));
        }

        let coef = alpha
            .iter()
            .zip(&y)
            .map(|(a, &s)| a * f64::from(s))
            .collect();
        Ok((coef, info))
    }

    fn solve_nu_svc(&self, view: &ProblemView, nu: f64) -> Result<(Vec<f64>, SolutionInfo)> {
        let l = view.len();
        let y = signs(&view.y);

        let mut sum_pos = nu * l as f64 / 2.0;
        let mut sum_neg = nu * l as f64 / 2.0;
        let alpha = y
            .iter()
            .map(|&s| {
                let sum = if s > 0 { &mut sum_pos } else { &mut sum_neg };
                let a = sum.min(1.0);
                *sum -= a;
                a
            })
            .collect();

        let input = SolverInput {
            p: vec![0.0; l],
            y: y.clone(),
            alpha,
            c: vec![1.0; l],
        };
        let q = SvcQ::new(self.params.kernel, &view.x, &y, self.params.cache_size);
        let Solution { alpha, mut info } = self.solver(l).solve(Nu, q, input)?;

        let r = info.r;
        debug!("C = {:.6}", 1.0 / r);

        let coef = alpha
            .iter()
            .zip(&y)
            .map(|(a, &s)| a * f64::from(s) / r)
            .collect();
        info.rho /= r;
        info.obj /= r * r;
        Ok((coef, info))
    }

    fn solve_one_class(&self, view: &ProblemView, nu: f64) -> Result<(Vec<f64>, SolutionInfo)> {
        let l = view.len();
        let total = nu * l as f64;
        let n = total as usize;

        let mut alpha = vec![0.0; l];
        for a in alpha.iter_mut().take(n) {
            *a = 1.0;
        }
        if n < l {
            alpha[n] = total - n as f64;
        }

        let input = SolverInput {
            p: vec![0.0; l],
            y: vec![1; l],
            alpha,
            c: vec![1.0; l],
        };
        let q = OneClassQ::new(self.params.kernel, &view.x, self.params.cache_size);
        let Solution { alpha, info } = self.solver(l).solve(Standard, q, input)?;
        Ok((alpha, info))
    }

    fn solve_epsilon_svr(&self, view: &ProblemView, c: f64, p: f64) -> Result<(Vec<f64>, SolutionInfo)> {
        let l = view.len();
        let mut linear = vec![0.0; 2 * l];
        let mut y = vec![1i8; 2 * l];
        for (i, &target) in view.y.iter().enumerate() {
            linear[i] = p - target;
            linear[i + l] = p + target;
            y[i + l] = -1;
        }

        let input = SolverInput {
            p: linear,
            y,
            alpha: vec![0.0; 2 * l],
            c: vec![c; 2 * l],
        };
        let q = SvrQ::new(self.params.kernel, &view.x, self.params.cache_size);
        let Solution { alpha, info } = self.solver(2 * l).solve(Standard, q, input)?;

        let coef: Vec<f64> = (0..l).map(|i| alpha[i] - alpha[i + l]).collect();
        let sum_alpha: f64 = coef.iter().map(|a| a.abs()).sum();
        debug!("nu = {:.6}", sum_alpha / (c * l as f64));
        Ok((coef, info))
    }

    fn solve_nu_svr(&self, view: &ProblemView, c: f64, nu: f64) -> Result<(Vec<f64>, SolutionInfo)> {
        let l = view.len();
        let mut sum = c * nu * l as f64 / 2.0;
        let mut alpha = vec![0.0; 2 * l];
        let mut linear = vec![0.0; 2 * l];
        let mut y = vec![1i8; 2 * l];
        for (i, &target) in view.y.iter().enumerate() {
            let a = sum.min(c);
            alpha[i] = a;
            alpha[i + l] = a;
            sum -= a;

            linear[i] = -target;
            linear[i + l] = target;
            y[i + l] = -1;
        }

        let input = SolverInput {
            p: linear,
            y,
            alpha,
            c: vec![c; 2 * l],
        };
        let q = SvrQ::new(self.params.kernel, &view.x, self.params.cache_size);
        let Solution { alpha, info } = self.solver(2 * l).solve(Nu, q, input)?;

        debug!("epsilon = {:.6}", -info.r);
        let coef = (0..l).map(|i| alpha[i] - alpha[i + l]).collect();
        Ok((coef, info))
    }
}

/// +1 for positive labels, -1 otherwise
fn signs(labels: &[f64]) -> Vec<i8> {
    labels.iter().map(|&y| if y > 0.0 { 1 } else { -1 }).collect()
}
