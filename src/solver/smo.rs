//! Sequential Minimal Optimization (SMO) solver
//!
//! Solves the dual problem
//!
//! ```text
//! min  0.5 αᵀQα + pᵀα
//! s.t. yᵀα = Δ,  0 <= α_k <= C_k
//! ```
//!
//! two variables at a time, picking each pair with second-order working-set
//! selection (Fan, Chen and Lin, JMLR 2005). The pair selection, the
//! shrinking test and the bias computation come from a [`SolverVariant`];
//! the driver loop and the analytic pair update are shared.

use log::{debug, trace, warn};

use crate::core::{CancelToken, Result, SVMError};
use crate::solver::qmatrix::QMatrix;
use crate::solver::variant::SolverVariant;

pub(crate) const TAU: f64 = 1e-12;

/// Where a dual variable sits relative to its box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// Inputs of one solve, all indexed by variable
#[derive(Debug, Clone)]
pub struct SolverInput {
    /// Linear term p
    pub p: Vec<f64>,
    /// +1 / -1 per variable
    pub y: Vec<i8>,
    /// Feasible starting point
    pub alpha: Vec<f64>,
    /// Upper bound C_k per variable
    pub c: Vec<f64>,
}

/// Summary of a finished solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionInfo {
    pub obj: f64,
    pub rho: f64,
    /// Nu variant only: (r1 + r2) / 2, used to rescale the solution
    pub r: f64,
    pub iterations: usize,
    /// False when the iteration ceiling stopped the solver
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct Solution {
    /// Final dual variables in input order
    pub alpha: Vec<f64>,
    pub info: SolutionInfo,
}

/// Mutable optimizer state for one solve.
///
/// Variables are permuted in place while shrinking: positions
/// `0..active_size` are active, `active_set[k]` maps position `k` back to
/// its input index.
pub struct SolverState<Q: QMatrix> {
    pub(crate) l: usize,
    pub(crate) active_size: usize,
    pub(crate) y: Vec<i8>,
    pub(crate) g: Vec<f64>,
    pub(crate) g_bar: Vec<f64>,
    pub(crate) alpha: Vec<f64>,
    pub(crate) alpha_status: Vec<AlphaStatus>,
    pub(crate) p: Vec<f64>,
    pub(crate) c: Vec<f64>,
    pub(crate) active_set: Vec<usize>,
    pub(crate) q: Q,
    pub(crate) qd: Vec<f64>,
    pub(crate) eps: f64,
    pub(crate) unshrink: bool,
}

impl<Q: QMatrix> SolverState<Q> {
    fn new(mut q: Q, input: SolverInput, eps: f64) -> Self {
        let l = input.alpha.len();
        let qd = q.diagonal();
        let mut state = Self {
            l,
            active_size: l,
            y: input.y,
            g: input.p.clone(),
            g_bar: vec![0.0; l],
            alpha: input.alpha,
            alpha_status: vec![AlphaStatus::LowerBound; l],
            p: input.p,
            c: input.c,
            active_set: (0..l).collect(),
            q,
            qd,
            eps,
            unshrink: false,
        };

        for i in 0..l {
            state.update_alpha_status(i);
        }

        for i in 0..l {
            if state.is_lower_bound(i) {
                continue;
            }
            let alpha_i = state.alpha[i];
            let q_i = state.q.get_q(i, l).to_vec();
            for (g, &q) in state.g.iter_mut().zip(&q_i) {
                *g += alpha_i * q;
            }
            if state.is_upper_bound(i) {
                let c_i = state.c[i];
                for (gb, &q) in state.g_bar.iter_mut().zip(&q_i) {
                    *gb += c_i * q;
                }
            }
        }

        state
    }

    #[inline]
    pub(crate) fn update_alpha_status(&mut self, i: usize) {
        self.alpha_status[i] = if self.alpha[i] >= self.c[i] {
            AlphaStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    #[inline]
    pub(crate) fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::UpperBound
    }

    #[inline]
    pub(crate) fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::LowerBound
    }

    #[inline]
    pub(crate) fn is_free(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::Free
    }

    pub(crate) fn swap_index(&mut self, i: usize, j: usize) {
        self.q.swap_index(i, j);
        self.y.swap(i, j);
        self.g.swap(i, j);
        self.alpha_status.swap(i, j);
        self.alpha.swap(i, j);
        self.p.swap(i, j);
        self.c.swap(i, j);
        self.active_set.swap(i, j);
        self.g_bar.swap(i, j);
        self.qd.swap(i, j);
    }

    /// Analytic two-variable update under the box and the equality constraint
    fn update_alpha_pair(&mut self, i: usize, j: usize) {
        let active_size = self.active_size;
        let q_i = self.q.get_q(i, active_size).to_vec();
        let q_j = self.q.get_q(j, active_size).to_vec();

        let c_i = self.c[i];
        let c_j = self.c[j];

        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];

        if self.y[i] != self.y[j] {
            let mut quad_coef = self.qd[i] + self.qd[j] + 2.0 * q_i[j];
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (-self.g[i] - self.g[j]) / quad_coef;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let mut quad_coef = self.qd[i] + self.qd[j] - 2.0 * q_i[j];
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (self.g[i] - self.g[j]) / quad_coef;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_alpha_i = self.alpha[i] - old_alpha_i;
        let delta_alpha_j = self.alpha[j] - old_alpha_j;

        for k in 0..active_size {
            self.g[k] += q_i[k] * delta_alpha_i + q_j[k] * delta_alpha_j;
        }

        // G_bar tracks the gradient contribution of variables at upper bound
        let was_upper_i = self.is_upper_bound(i);
        let was_upper_j = self.is_upper_bound(j);
        self.update_alpha_status(i);
        self.update_alpha_status(j);

        for (k, was_upper, c_k) in [(i, was_upper_i, c_i), (j, was_upper_j, c_j)] {
            if was_upper == self.is_upper_bound(k) {
                continue;
            }
            let l = self.l;
            let q_k = self.q.get_q(k, l).to_vec();
            let sign = if was_upper { -1.0 } else { 1.0 };
            for (gb, &q) in self.g_bar.iter_mut().zip(&q_k) {
                *gb += sign * c_k * q;
            }
        }
    }

    fn objective(&self) -> f64 {
        self.alpha
            .iter()
            .zip(self.g.iter().zip(&self.p))
            .map(|(a, (g, p))| a * (g + p))
            .sum::<f64>()
            / 2.0
    }
}

/// SMO driver
///
/// Holds the stopping and shrinking options; [`SMOSolver::solve`] builds a
/// fresh state (and its cache, through the Q matrix) for every call.
#[derive(Debug, Clone)]
pub struct SMOSolver {
    eps: f64,
    shrinking: bool,
    max_iterations: usize,
    cancel: Option<CancelToken>,
}

impl SMOSolver {
    pub fn new(eps: f64, shrinking: bool, max_iterations: usize) -> Self {
        Self {
            eps,
            shrinking,
            max_iterations,
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: Option<CancelToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Run SMO until the maximal KKT violation drops below `eps`.
    ///
    /// Hitting the iteration ceiling is not an error: a warning is logged and
    /// the best solution so far is returned with `converged == false`.
    pub fn solve<Q: QMatrix, V: SolverVariant>(
        &self,
        variant: V,
        q: Q,
        input: SolverInput,
    ) -> Result<Solution> {
        let l = input.alpha.len();
        if input.p.len() != l || input.y.len() != l || input.c.len() != l {
            return Err(SVMError::DimensionMismatch {
                expected: l,
                actual: input.p.len().min(input.y.len()).min(input.c.len()),
            });
        }

        let mut state = SolverState::new(q, input, self.eps);
        let mut counter = l.min(1000) + 1;
        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < self.max_iterations {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(SVMError::Cancelled);
            }

            counter -= 1;
            if counter == 0 {
                counter = l.min(1000);
                if self.shrinking {
                    variant.shrink(&mut state);
                }
                trace!("iteration {}, active set {}", iterations, state.active_size);
            }

            let (i, j) = match variant.select_working_set(&mut state) {
                Some(pair) => pair,
                None => {
                    // the shrunk problem is optimal; check the whole problem
                    state.reconstruct_gradient();
                    state.active_size = l;
                    match variant.select_working_set(&mut state) {
                        Some(pair) => {
                            counter = 1;
                            pair
                        }
                        None => {
                            converged = true;
                            break;
                        }
                    }
                }
            };

            iterations += 1;
            state.update_alpha_pair(i, j);
        }

        if !converged {
            if state.active_size < l {
                state.reconstruct_gradient();
                state.active_size = l;
            }
            warn!(
                "reached max number of iterations ({}) before convergence",
                self.max_iterations
            );
        }

        let (rho, r) = variant.calculate_rho(&state);
        let obj = state.objective();

        let mut alpha = vec![0.0; l];
        for (k, &original) in state.active_set.iter().enumerate() {
            alpha[original] = state.alpha[k];
        }

        debug!(
            "optimization finished, #iter = {}, cache hit rate {:.3}",
            iterations,
            state.q.cache_hit_rate()
        );

        Ok(Solution {
            alpha,
            info: SolutionInfo {
                obj,
                rho,
                r,
                iterations,
                converged,
            },
        })
    }
}
