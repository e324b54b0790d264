//! Gaussian-process Bayesian optimisation in log10 space.
//!
//! The first `n_initial` proposals are uniform in the log box. After that each
//! proposal maximises expected improvement over `n_candidates` uniform
//! candidates, with an RBF-kernel GP fitted to the standardised scores.

use std::f64::consts::{PI, SQRT_2};

use rand::{Rng, RngCore};

use crate::error::{AcError, Result};
use crate::rl::HyperParams;

use super::{Trial, Tuner};

#[derive(Debug, Clone)]
pub struct BayesConfig {
    /// Learning-rate bounds shared by both axes
    pub min_rate: f64,
    pub max_rate: f64,
    /// Random proposals before the GP takes over
    pub n_initial: usize,
    /// Total number of proposals
    pub budget: usize,
    /// Random candidates scored by expected improvement
    pub n_candidates: usize,
    /// RBF length scale in log10 units
    pub length_scale: f64,
    /// Diagonal jitter added to the kernel matrix
    pub noise: f64,
    /// Exploration margin of expected improvement
    pub xi: f64,
}

impl Default for BayesConfig {
    fn default() -> Self {
        Self {
            min_rate: 1e-3,
            max_rate: 1.0,
            n_initial: 5,
            budget: 20,
            n_candidates: 256,
            length_scale: 0.5,
            noise: 1e-6,
            xi: 0.01,
        }
    }
}

impl BayesConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_rate > 0.0 && self.max_rate >= self.min_rate && self.max_rate.is_finite()) {
            return Err(AcError::config(format!(
                "invalid learning-rate bounds [{}, {}]",
                self.min_rate, self.max_rate
            )));
        }
        if self.budget == 0 {
            return Err(AcError::config("bayesian budget must be positive"));
        }
        if self.n_initial == 0 || self.n_candidates == 0 {
            return Err(AcError::config(
                "bayesian n_initial and n_candidates must be positive",
            ));
        }
        if !(self.length_scale > 0.0 && self.noise > 0.0 && self.xi >= 0.0) {
            return Err(AcError::config(
                "length_scale and noise must be positive, xi non-negative",
            ));
        }
        Ok(())
    }
}

pub struct BayesianOptimizer {
    config: BayesConfig,
    proposed: usize,
    trials: Vec<Trial>,
}

impl BayesianOptimizer {
    pub fn new(config: BayesConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            proposed: 0,
            trials: Vec::new(),
        })
    }

    fn log_bounds(&self) -> (f64, f64) {
        (self.config.min_rate.log10(), self.config.max_rate.log10())
    }

    fn random_point(&self, rng: &mut dyn RngCore) -> [f64; 2] {
        let (lo, hi) = self.log_bounds();
        if hi <= lo {
            return [lo, lo];
        }
        [rng.random_range(lo..=hi), rng.random_range(lo..=hi)]
    }

    fn to_params(point: [f64; 2]) -> HyperParams {
        HyperParams::new(10f64.powf(point[0]), 10f64.powf(point[1]))
    }

    fn observations(&self) -> (Vec<[f64; 2]>, Vec<f64>) {
        self.trials
            .iter()
            .filter(|t| t.score.is_finite())
            .map(|t| {
                (
                    [t.params.alpha_critic.log10(), t.params.alpha_actor.log10()],
                    t.score,
                )
            })
            .unzip()
    }
}

impl Tuner for BayesianOptimizer {
    fn propose(&mut self, rng: &mut dyn RngCore) -> Option<HyperParams> {
        if self.proposed >= self.config.budget {
            return None;
        }
        self.proposed += 1;

        let (xs, ys) = self.observations();
        if xs.len() < self.config.n_initial {
            return Some(Self::to_params(self.random_point(rng)));
        }

        let Some(gp) = GaussianProcess::fit(xs, &ys, self.config.length_scale, self.config.noise)
        else {
            return Some(Self::to_params(self.random_point(rng)));
        };

        let best = gp.best_standardised();
        let mut chosen = self.random_point(rng);
        let mut chosen_ei = f64::NEG_INFINITY;
        for _ in 0..self.config.n_candidates {
            let candidate = self.random_point(rng);
            let (mu, sigma) = gp.predict(&candidate);
            let ei = expected_improvement(mu, sigma, best, self.config.xi);
            if ei > chosen_ei {
                chosen = candidate;
                chosen_ei = ei;
            }
        }
        Some(Self::to_params(chosen))
    }

    fn observe(&mut self, params: HyperParams, score: f64) {
        self.trials.push(Trial { params, score });
    }

    fn trials(&self) -> &[Trial] {
        &self.trials
    }
}

/// GP regression on standardised targets with an RBF kernel of unit variance
struct GaussianProcess {
    xs: Vec<[f64; 2]>,
    /// Lower Cholesky factor of K + noise·I, row-major
    chol: Vec<f64>,
    /// (K + noise·I)⁻¹ y
    weights: Vec<f64>,
    y_standardised: Vec<f64>,
    length_scale: f64,
}

impl GaussianProcess {
    fn fit(xs: Vec<[f64; 2]>, ys: &[f64], length_scale: f64, noise: f64) -> Option<Self> {
        let n = xs.len();
        if n == 0 {
            return None;
        }
        let mean = ys.iter().sum::<f64>() / n as f64;
        let var = ys.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n as f64;
        let scale = if var > 0.0 { var.sqrt() } else { 1.0 };
        let y_standardised: Vec<f64> = ys.iter().map(|y| (y - mean) / scale).collect();

        let mut k = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                k[i * n + j] = rbf(&xs[i], &xs[j], length_scale);
            }
            k[i * n + i] += noise;
        }

        let chol = cholesky(&k, n)?;
        let forward = forward_substitution(&chol, &y_standardised, n);
        let weights = backward_substitution(&chol, &forward, n);

        Some(Self {
            xs,
            chol,
            weights,
            y_standardised,
            length_scale,
        })
    }

    fn best_standardised(&self) -> f64 {
        self.y_standardised
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Posterior mean and standard deviation at `x`
    fn predict(&self, x: &[f64; 2]) -> (f64, f64) {
        let n = self.xs.len();
        let k_star: Vec<f64> = self.xs.iter().map(|xi| rbf(xi, x, self.length_scale)).collect();
        let mu = k_star.iter().zip(&self.weights).map(|(k, w)| k * w).sum();
        let v = forward_substitution(&self.chol, &k_star, n);
        let variance = 1.0 - v.iter().map(|vi| vi * vi).sum::<f64>();
        (mu, variance.max(0.0).sqrt())
    }
}

fn rbf(a: &[f64; 2], b: &[f64; 2], length_scale: f64) -> f64 {
    let d2 = (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2);
    (-0.5 * d2 / (length_scale * length_scale)).exp()
}

/// A = L Lᵀ, `None` when A is not positive definite
fn cholesky(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Some(l)
}

/// Solve L y = b
fn forward_substitution(l: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * n + j] * y[j];
        }
        y[i] = sum / l[i * n + i];
    }
    y
}

/// Solve Lᵀ x = y
fn backward_substitution(l: &[f64], y: &[f64], n: usize) -> Vec<f64> {
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j * n + i] * x[j];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

fn expected_improvement(mu: f64, sigma: f64, best: f64, xi: f64) -> f64 {
    let improvement = mu - best - xi;
    if sigma <= 0.0 {
        return improvement.max(0.0);
    }
    let z = improvement / sigma;
    improvement * normal_cdf(z) + sigma * normal_pdf(z)
}

fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Abramowitz-Stegun 7.1.26, absolute error below 1.5e-7
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}
