use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{RecError, RecResult};
use crate::sparse::{CsrMatrix, InteractionMatrix};

/// Pivots below `PIVOT_EPS * max(diag)` mean the normal equations are singular.
const PIVOT_EPS: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlsParams {
    pub factors: usize,
    pub regularization: f32,
    pub iterations: usize,
    pub random_seed: u64,
    /// confidence scale, `c = 1 + alpha * weight`
    pub alpha: f32,
}

impl Default for AlsParams {
    fn default() -> Self {
        Self {
            factors: 64,
            regularization: 0.01,
            iterations: 20,
            random_seed: 42,
            alpha: 1.0,
        }
    }
}

impl AlsParams {
    pub fn validate(&self) -> RecResult<()> {
        if self.factors == 0 {
            return Err(RecError::InvalidParam(String::from("factors must be positive")));
        }
        if self.iterations == 0 {
            return Err(RecError::InvalidParam(String::from(
                "iterations must be positive",
            )));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(RecError::InvalidParam(format!(
                "regularization must be finite and non-negative, got {}",
                self.regularization
            )));
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(RecError::InvalidParam(format!(
                "alpha must be finite and non-negative, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Dense row-major `n_rows × n_cols` matrix of latent vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorMatrix {
    pub n_rows: usize,
    pub n_cols: usize,
    pub data: Vec<f32>,
}

impl FactorMatrix {
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            data: vec![0.0; n_rows * n_cols],
        }
    }

    fn random<R: Rng>(n_rows: usize, n_cols: usize, rng: &mut R) -> Self {
        let data = (0..n_rows * n_cols)
            .map(|_| rng.gen::<f32>() * 0.01)
            .collect();
        Self {
            n_rows,
            n_cols,
            data,
        }
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// Scores of every row against `v`.
    pub fn dot_all(&self, v: &[f32]) -> Vec<f32> {
        self.data
            .par_chunks(self.n_cols)
            .map(|row| dot(row, v))
            .collect()
    }

    /// `MᵀM` in f64, row-major `n_cols × n_cols`. Sequential so the summation order is fixed.
    fn gram(&self) -> Vec<f64> {
        let f = self.n_cols;
        let mut acc = vec![0.0f64; f * f];
        for row in self.data.chunks(f) {
            add_outer(&mut acc, row, 1.0);
        }
        acc
    }
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn add_outer(acc: &mut [f64], v: &[f32], scale: f64) {
    let f = v.len();
    for p in 0..f {
        let vp = v[p] as f64 * scale;
        for q in 0..f {
            acc[p * f + q] += vp * v[q] as f64;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Factors {
    pub user_factors: FactorMatrix,
    pub item_factors: FactorMatrix,
}

/// Implicit-feedback ALS: preference is 1 for positive weights, confidence grows with weight.
pub fn fit(matrix: &InteractionMatrix, params: &AlsParams) -> RecResult<Factors> {
    params.validate()?;
    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(params.random_seed);
    let mut item_factors = FactorMatrix::random(matrix.n_items(), params.factors, &mut rng);
    let mut user_factors = FactorMatrix::zeros(matrix.n_users(), params.factors);

    for iteration in 0..params.iterations {
        least_squares(&matrix.user_items, &mut user_factors, &item_factors, params, "user")?;
        least_squares(&matrix.item_users, &mut item_factors, &user_factors, params, "item")?;
        if log::log_enabled!(log::Level::Debug) {
            let loss = observed_loss(matrix, &user_factors, &item_factors, params);
            log::debug!("als iteration {}: observed loss {:.6}", iteration + 1, loss);
        }
    }
    log::info!(
        "als fit {} users x {} items, {} factors, {} iterations, elapsed: {:.4?}",
        matrix.n_users(),
        matrix.n_items(),
        params.factors,
        params.iterations,
        start.elapsed()
    );
    Ok(Factors {
        user_factors,
        item_factors,
    })
}

/// Solve every row of `x` with `y` held fixed.
fn least_squares(
    interactions: &CsrMatrix<u32, f32>,
    x: &mut FactorMatrix,
    y: &FactorMatrix,
    params: &AlsParams,
    side: &'static str,
) -> RecResult<()> {
    let f = y.n_cols;
    let yty = y.gram();
    let reg = params.regularization as f64;
    let alpha = params.alpha as f64;
    x.data
        .par_chunks_mut(f)
        .enumerate()
        .try_for_each(|(u, xu)| {
            let mut a = yty.clone();
            let mut b = vec![0.0f64; f];
            for (i, weight) in interactions.row(u) {
                let yi = y.row(i as usize);
                let confidence = 1.0 + alpha * weight as f64;
                add_outer(&mut a, yi, confidence - 1.0);
                if weight > 0.0 {
                    b.iter_mut()
                        .zip(yi)
                        .for_each(|(bp, &yp)| *bp += confidence * yp as f64);
                }
            }
            for p in 0..f {
                a[p * f + p] += reg;
            }
            if !cholesky_solve(&mut a, &mut b, f) {
                return Err(RecError::Convergence { side, row: u });
            }
            xu.iter_mut().zip(b).for_each(|(dst, v)| *dst = v as f32);
            Ok(())
        })
}

/// Solves `A x = b` in place for symmetric positive definite `A`, the solution lands in `b`.
/// Returns false when `A` is not positive definite.
fn cholesky_solve(a: &mut [f64], b: &mut [f64], n: usize) -> bool {
    let scale = (0..n).map(|i| a[i * n + i].abs()).fold(0.0f64, f64::max);
    let threshold = PIVOT_EPS * scale.max(f64::MIN_POSITIVE);
    // lower triangle of `a` becomes L
    for j in 0..n {
        let mut diag = a[j * n + j];
        for k in 0..j {
            diag -= a[j * n + k] * a[j * n + k];
        }
        if !diag.is_finite() || diag <= threshold {
            return false;
        }
        let diag = diag.sqrt();
        a[j * n + j] = diag;
        for i in (j + 1)..n {
            let mut s = a[i * n + j];
            for k in 0..j {
                s -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = s / diag;
        }
    }
    // L z = b
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= a[i * n + k] * b[k];
        }
        b[i] = s / a[i * n + i];
    }
    // Lᵀ x = z
    for i in (0..n).rev() {
        let mut s = b[i];
        for k in (i + 1)..n {
            s -= a[k * n + i] * b[k];
        }
        b[i] = s / a[i * n + i];
    }
    true
}

/// Weighted squared error on observed cells plus the L2 penalty.
fn observed_loss(
    matrix: &InteractionMatrix,
    user_factors: &FactorMatrix,
    item_factors: &FactorMatrix,
    params: &AlsParams,
) -> f64 {
    let alpha = params.alpha as f64;
    let err: f64 = (0..matrix.n_users())
        .into_par_iter()
        .map(|u| {
            let xu = user_factors.row(u);
            matrix
                .user_items
                .row(u)
                .map(|(i, weight)| {
                    let pref = if weight > 0.0 { 1.0 } else { 0.0 };
                    let confidence = 1.0 + alpha * weight as f64;
                    let diff = pref - dot(xu, item_factors.row(i as usize)) as f64;
                    confidence * diff * diff
                })
                .sum::<f64>()
        })
        .sum();
    let penalty: f64 = user_factors
        .data
        .iter()
        .chain(item_factors.data.iter())
        .map(|&v| v as f64 * v as f64)
        .sum();
    err + params.regularization as f64 * penalty
}
