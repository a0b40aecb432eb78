//! Working-set selection, shrinking test and bias for the two solver variants
//!
//! [`Standard`] solves problems with the single constraint yᵀα = Δ.
//! [`Nu`] additionally keeps Σα fixed within each label, so a working pair
//! always has equal labels and the two labels get separate violation
//! measures and separate biases.
//!
//! Ties in working-set selection go to the later index (comparisons are
//! `>=` while scanning upward).

use crate::solver::qmatrix::QMatrix;
use crate::solver::smo::{SolverState, TAU};

const INF: f64 = f64::INFINITY;

/// Strategy plugged into the shared SMO driver loop
pub trait SolverVariant {
    /// Pick the maximal violating pair, or `None` when the active problem
    /// is optimal within `eps`.
    fn select_working_set<Q: QMatrix>(&self, s: &mut SolverState<Q>) -> Option<(usize, usize)>;

    /// Shrink the active set, unshrinking first when close to optimal.
    fn shrink<Q: QMatrix>(&self, s: &mut SolverState<Q>);

    /// Bias `rho` and, for the nu variant, the scale `r`
    fn calculate_rho<Q: QMatrix>(&self, s: &SolverState<Q>) -> (f64, f64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Standard;

#[derive(Debug, Clone, Copy, Default)]
pub struct Nu;

/// Second-order estimate of the objective decrease
#[inline]
fn objective_decrease(grad_diff: f64, quad_coef: f64) -> f64 {
    if quad_coef > 0.0 {
        -(grad_diff * grad_diff) / quad_coef
    } else {
        -(grad_diff * grad_diff) / TAU
    }
}

impl SolverVariant for Standard {
    fn select_working_set<Q: QMatrix>(&self, s: &mut SolverState<Q>) -> Option<(usize, usize)> {
        // i maximizes -y_t G_t over I_up
        let mut gmax = -INF;
        let mut gmax_idx = None;
        for t in 0..s.active_size {
            if s.y[t] == 1 {
                if !s.is_upper_bound(t) && -s.g[t] >= gmax {
                    gmax = -s.g[t];
                    gmax_idx = Some(t);
                }
            } else if !s.is_lower_bound(t) && s.g[t] >= gmax {
                gmax = s.g[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let q_i = s.q.get_q(i, s.active_size).to_vec();
        let yi = f64::from(s.y[i]);

        // j minimizes the second-order objective decrease over I_low
        let mut gmax2 = -INF;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;
        for j in 0..s.active_size {
            if s.y[j] == 1 {
                if s.is_lower_bound(j) {
                    continue;
                }
                let grad_diff = gmax + s.g[j];
                if s.g[j] >= gmax2 {
                    gmax2 = s.g[j];
                }
                if grad_diff > 0.0 {
                    let quad_coef = s.qd[i] + s.qd[j] - 2.0 * yi * q_i[j];
                    let obj_diff = objective_decrease(grad_diff, quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            } else {
                if s.is_upper_bound(j) {
                    continue;
                }
                let grad_diff = gmax - s.g[j];
                if -s.g[j] >= gmax2 {
                    gmax2 = -s.g[j];
                }
                if grad_diff > 0.0 {
                    let quad_coef = s.qd[i] + s.qd[j] + 2.0 * yi * q_i[j];
                    let obj_diff = objective_decrease(grad_diff, quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < s.eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    fn shrink<Q: QMatrix>(&self, s: &mut SolverState<Q>) {
        let mut gmax1 = -INF; // max over I_up of -y G
        let mut gmax2 = -INF; // max over I_low of y G

        for i in 0..s.active_size {
            if s.y[i] == 1 {
                if !s.is_upper_bound(i) && -s.g[i] >= gmax1 {
                    gmax1 = -s.g[i];
                }
                if !s.is_lower_bound(i) && s.g[i] >= gmax2 {
                    gmax2 = s.g[i];
                }
            } else {
                if !s.is_upper_bound(i) && -s.g[i] >= gmax2 {
                    gmax2 = -s.g[i];
                }
                if !s.is_lower_bound(i) && s.g[i] >= gmax1 {
                    gmax1 = s.g[i];
                }
            }
        }

        s.unshrink_if_close(gmax1 + gmax2);

        s.shrink_active_set(|s, i| {
            if s.is_upper_bound(i) {
                if s.y[i] == 1 {
                    -s.g[i] > gmax1
                } else {
                    -s.g[i] > gmax2
                }
            } else if s.is_lower_bound(i) {
                if s.y[i] == 1 {
                    s.g[i] > gmax2
                } else {
                    s.g[i] > gmax1
                }
            } else {
                false
            }
        });
    }

    fn calculate_rho<Q: QMatrix>(&self, s: &SolverState<Q>) -> (f64, f64) {
        let mut nr_free = 0usize;
        let mut ub = INF;
        let mut lb = -INF;
        let mut sum_free = 0.0;

        for i in 0..s.active_size {
            let yg = f64::from(s.y[i]) * s.g[i];

            if s.is_upper_bound(i) {
                if s.y[i] == -1 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else if s.is_lower_bound(i) {
                if s.y[i] == 1 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                nr_free += 1;
                sum_free += yg;
            }
        }

        let rho = if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            bound_midpoint(ub, lb)
        };
        (rho, 0.0)
    }
}

/// Midpoint of the feasible rho interval. A side with no bounded variable
/// is open; with both open (no variables at all) rho is 0.
fn bound_midpoint(ub: f64, lb: f64) -> f64 {
    match (ub.is_finite(), lb.is_finite()) {
        (true, true) => (ub + lb) / 2.0,
        (true, false) => ub,
        (false, true) => lb,
        (false, false) => 0.0,
    }
}

impl SolverVariant for Nu {
    fn select_working_set<Q: QMatrix>(&self, s: &mut SolverState<Q>) -> Option<(usize, usize)> {
        let mut gmaxp = -INF;
        let mut gmaxp_idx = None;
        let mut gmaxn = -INF;
        let mut gmaxn_idx = None;

        for t in 0..s.active_size {
            if s.y[t] == 1 {
                if !s.is_upper_bound(t) && -s.g[t] >= gmaxp {
                    gmaxp = -s.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !s.is_lower_bound(t) && s.g[t] >= gmaxn {
                gmaxn = s.g[t];
                gmaxn_idx = Some(t);
            }
        }

        let active_size = s.active_size;
        let q_ip = gmaxp_idx.map(|ip| s.q.get_q(ip, active_size).to_vec());
        let q_in = gmaxn_idx.map(|in_| s.q.get_q(in_, active_size).to_vec());

        let mut gmaxp2 = -INF;
        let mut gmaxn2 = -INF;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for j in 0..active_size {
            if s.y[j] == 1 {
                if s.is_lower_bound(j) {
                    continue;
                }
                let grad_diff = gmaxp + s.g[j];
                if s.g[j] >= gmaxp2 {
                    gmaxp2 = s.g[j];
                }
                if let (true, Some(ip), Some(q_ip)) = (grad_diff > 0.0, gmaxp_idx, &q_ip) {
                    let quad_coef = s.qd[ip] + s.qd[j] - 2.0 * q_ip[j];
                    let obj_diff = objective_decrease(grad_diff, quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            } else {
                if s.is_upper_bound(j) {
                    continue;
                }
                let grad_diff = gmaxn - s.g[j];
                if -s.g[j] >= gmaxn2 {
                    gmaxn2 = -s.g[j];
                }
                if let (true, Some(in_), Some(q_in)) = (grad_diff > 0.0, gmaxn_idx, &q_in) {
                    let quad_coef = s.qd[in_] + s.qd[j] - 2.0 * q_in[j];
                    let obj_diff = objective_decrease(grad_diff, quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if f64::max(gmaxp + gmaxp2, gmaxn + gmaxn2) < s.eps {
            return None;
        }

        let j = gmin_idx?;
        let i = if s.y[j] == 1 { gmaxp_idx? } else { gmaxn_idx? };
        Some((i, j))
    }

    fn shrink<Q: QMatrix>(&self, s: &mut SolverState<Q>) {
        let mut gmax1 = -INF; // max { -y_i G_i | y_i = +1, not upper }
        let mut gmax2 = -INF; // max {  y_i G_i | y_i = +1, not lower }
        let mut gmax3 = -INF; // max { -y_i G_i | y_i = -1, not lower }
        let mut gmax4 = -INF; // max {  y_i G_i | y_i = -1, not upper }

        for i in 0..s.active_size {
            if !s.is_upper_bound(i) {
                if s.y[i] == 1 {
                    gmax1 = gmax1.max(-s.g[i]);
                } else {
                    gmax4 = gmax4.max(-s.g[i]);
                }
            }
            if !s.is_lower_bound(i) {
                if s.y[i] == 1 {
                    gmax2 = gmax2.max(s.g[i]);
                } else {
                    gmax3 = gmax3.max(s.g[i]);
                }
            }
        }

        s.unshrink_if_close(f64::max(gmax1 + gmax2, gmax3 + gmax4));

        s.shrink_active_set(|s, i| {
            if s.is_upper_bound(i) {
                if s.y[i] == 1 {
                    -s.g[i] > gmax1
                } else {
                    -s.g[i] > gmax4
                }
            } else if s.is_lower_bound(i) {
                if s.y[i] == 1 {
                    s.g[i] > gmax2
                } else {
                    s.g[i] > gmax3
                }
            } else {
                false
            }
        });
    }

    fn calculate_rho<Q: QMatrix>(&self, s: &SolverState<Q>) -> (f64, f64) {
        // (count, sum, ub, lb) per label
        let mut pos = (0usize, 0.0, INF, -INF);
        let mut neg = (0usize, 0.0, INF, -INF);

        for i in 0..s.active_size {
            let acc = if s.y[i] == 1 { &mut pos } else { &mut neg };
            if s.is_upper_bound(i) {
                acc.3 = f64::max(acc.3, s.g[i]);
            } else if s.is_lower_bound(i) {
                acc.2 = f64::min(acc.2, s.g[i]);
            } else {
                acc.0 += 1;
                acc.1 += s.g[i];
            }
        }

        let side = |(nr_free, sum_free, ub, lb): (usize, f64, f64, f64)| {
            if nr_free > 0 {
                sum_free / nr_free as f64
            } else {
                bound_midpoint(ub, lb)
            }
        };
        let r1 = side(pos);
        let r2 = side(neg);

        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }
}
