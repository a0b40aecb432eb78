//! Q matrices fed to the SMO solver
//!
//! Each formulation sees the Gram matrix through a different lens:
//! classification scales entries by label signs, one-class uses them as is,
//! and regression doubles the variable count so each sample appears once
//! per side of the epsilon tube.

use crate::cache::KernelCache;
use crate::core::{KernelType, SparseVector};
use crate::kernel::GramKernel;

/// Row access to the solver's Hessian
pub trait QMatrix {
    /// First `len` entries of row `i` in the current variable order
    fn get_q(&mut self, i: usize, len: usize) -> &[f64];

    /// Diagonal Q(i, i) in the current variable order
    fn diagonal(&self) -> Vec<f64>;

    /// Exchange variables `i` and `j`
    fn swap_index(&mut self, i: usize, j: usize);

    fn cache_hit_rate(&self) -> f64;
}

/// Q(i, j) = y_i · y_j · K(x_i, x_j)
pub struct SvcQ<'a> {
    gram: GramKernel<'a>,
    y: Vec<i8>,
    cache: KernelCache,
    qd: Vec<f64>,
}

impl<'a> SvcQ<'a> {
    pub fn new(kernel: KernelType, x: &[&'a SparseVector], y: &[i8], cache_mb: f64) -> Self {
        let gram = GramKernel::new(kernel, x);
        let qd = (0..gram.len()).map(|i| gram.eval(i, i)).collect();
        Self {
            gram,
            y: y.to_vec(),
            cache: KernelCache::with_megabytes(cache_mb),
            qd,
        }
    }
}

impl QMatrix for SvcQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[f64] {
        let (row, start) = self.cache.get_data(i, len);
        let yi = f64::from(self.y[i]);
        for (j, entry) in row.iter_mut().enumerate().skip(start) {
            *entry = yi * f64::from(self.y[j]) * self.gram.eval(i, j);
        }
        row
    }

    fn diagonal(&self) -> Vec<f64> {
        self.qd.clone()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.cache.swap_index(i, j);
        self.gram.swap_index(i, j);
        self.y.swap(i, j);
        self.qd.swap(i, j);
    }

    fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}

/// Q(i, j) = K(x_i, x_j)
pub struct OneClassQ<'a> {
    gram: GramKernel<'a>,
    cache: KernelCache,
    qd: Vec<f64>,
}

impl<'a> OneClassQ<'a> {
    pub fn new(kernel: KernelType, x: &[&'a SparseVector], cache_mb: f64) -> Self {
        let gram = GramKernel::new(kernel, x);
        let qd = (0..gram.len()).map(|i| gram.eval(i, i)).collect();
        Self {
            gram,
            cache: KernelCache::with_megabytes(cache_mb),
            qd,
        }
    }
}

impl QMatrix for OneClassQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[f64] {
        let (row, start) = self.cache.get_data(i, len);
        for (j, entry) in row.iter_mut().enumerate().skip(start) {
            *entry = self.gram.eval(i, j);
        }
        row
    }

    fn diagonal(&self) -> Vec<f64> {
        self.qd.clone()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.cache.swap_index(i, j);
        self.gram.swap_index(i, j);
        self.qd.swap(i, j);
    }

    fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}

/// Regression Q over 2l variables.
///
/// Variable `k < l` is the upper-side multiplier of sample `k` (sign +1),
/// variable `k + l` the lower-side one (sign -1). Kernel rows are cached by
/// sample, and never move: swapping two variables only permutes `sign` and
/// `index`.
pub struct SvrQ<'a> {
    gram: GramKernel<'a>,
    cache: KernelCache,
    sign: Vec<i8>,
    index: Vec<usize>,
    qd: Vec<f64>,
    buffer: Vec<f64>,
}

impl<'a> SvrQ<'a> {
    pub fn new(kernel: KernelType, x: &[&'a SparseVector], cache_mb: f64) -> Self {
        let gram = GramKernel::new(kernel, x);
        let l = gram.len();
        let mut sign = vec![1i8; 2 * l];
        let mut index = vec![0usize; 2 * l];
        let mut qd = vec![0.0; 2 * l];
        for k in 0..l {
            sign[k + l] = -1;
            index[k] = k;
            index[k + l] = k;
            qd[k] = gram.eval(k, k);
            qd[k + l] = qd[k];
        }
        Self {
            gram,
            cache: KernelCache::with_megabytes(cache_mb),
            sign,
            index,
            qd,
            buffer: vec![0.0; 2 * l],
        }
    }
}

impl QMatrix for SvrQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[f64] {
        let real_i = self.index[i];
        let l = self.gram.len();
        let (row, start) = self.cache.get_data(real_i, l);
        for (j, entry) in row.iter_mut().enumerate().skip(start) {
            *entry = self.gram.eval(real_i, j);
        }

        let si = f64::from(self.sign[i]);
        for (j, out) in self.buffer[..len].iter_mut().enumerate() {
            *out = si * f64::from(self.sign[j]) * row[self.index[j]];
        }
        &self.buffer[..len]
    }

    fn diagonal(&self) -> Vec<f64> {
        self.qd.clone()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.sign.swap(i, j);
        self.index.swap(i, j);
        self.qd.swap(i, j);
    }

    fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}
