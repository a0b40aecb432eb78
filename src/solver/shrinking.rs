//! Shrinking heuristic
//!
//! Variables stuck at a bound whose gradient says they will stay there are
//! moved past `active_size` and skipped by working-set selection. Their
//! gradients go stale; [`SolverState::reconstruct_gradient`] rebuilds them
//! from `G_bar` (the contribution of upper-bounded variables) plus the free
//! variables' rows, before the solver declares convergence on the full
//! problem.

use log::debug;

use crate::solver::qmatrix::QMatrix;
use crate::solver::smo::SolverState;

impl<Q: QMatrix> SolverState<Q> {
    /// Recompute gradients of inactive variables
    pub(crate) fn reconstruct_gradient(&mut self) {
        if self.active_size == self.l {
            return;
        }

        let active_size = self.active_size;
        let l = self.l;

        for j in active_size..l {
            self.g[j] = self.g_bar[j] + self.p[j];
        }

        let nr_free = (0..active_size).filter(|&j| self.is_free(j)).count();
        if 2 * nr_free < active_size {
            debug!("few free variables at reconstruction; shrinking may not pay off");
        }

        // pick whichever loop touches fewer kernel entries
        if nr_free * l > 2 * active_size * (l - active_size) {
            for i in active_size..l {
                let q_i = self.q.get_q(i, active_size).to_vec();
                for j in 0..active_size {
                    if self.is_free(j) {
                        self.g[i] += self.alpha[j] * q_i[j];
                    }
                }
            }
        } else {
            for i in 0..active_size {
                if !self.is_free(i) {
                    continue;
                }
                let q_i = self.q.get_q(i, l).to_vec();
                let alpha_i = self.alpha[i];
                for j in active_size..l {
                    self.g[j] += alpha_i * q_i[j];
                }
            }
        }
    }

    /// Unshrink once the violation is within ten times the tolerance
    pub(crate) fn unshrink_if_close(&mut self, violation: f64) {
        if !self.unshrink && violation <= self.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.active_size = self.l;
            debug!("unshrinking, full gradient reconstructed");
        }
    }

    /// Move every variable for which `be_shrunk` holds to the inactive tail.
    pub(crate) fn shrink_active_set<F>(&mut self, be_shrunk: F)
    where
        F: Fn(&Self, usize) -> bool,
    {
        let mut i = 0;
        while i < self.active_size {
            if be_shrunk(self, i) {
                self.active_size -= 1;
                while self.active_size > i {
                    if !be_shrunk(self, self.active_size) {
                        self.swap_index(i, self.active_size);
                        break;
                    }
                    self.active_size -= 1;
                }
            }
            i += 1;
        }
    }
}
