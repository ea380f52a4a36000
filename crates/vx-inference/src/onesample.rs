//! One-sample fitting at a single position.
//!
//! Two models share the same input (one value and one inverse-variance
//! weight per image):
//!
//! - **Mean** (weighted one-sample t):
//!   `mu = Σ(w·x)/Σw`, `scale = Σ w·(x-mu)² / (n-1)`,
//!   `se = sqrt(scale/Σw)`, `sd = se·sqrt(n)`, `t = mu/se`.
//!   With unit weights `sd` is the sample standard deviation (ddof = 1) and
//!   `t` the classic one-sample t.
//!
//! - **Variance ratio** (two-level mixed effects): image `i` has a known
//!   within-image variance `S_i = 1/w_i` plus an unknown between-image
//!   variance. The fixed variance is `varfix = mean(S)`; the between-image
//!   variance is refined by EM and reported relative to it as `varatio`.
//!   Subtracting `0.99·min(S)` from every `S_i` before iterating keeps the
//!   fraction of missing information small, so EM contracts quickly.
//!
//! Degenerate positions (no contributing weight, fewer than two images for
//! a spread estimate) produce NaN rather than an error.

use serde::{Deserialize, Serialize};

use crate::weights::Weights;

/// Fraction of the smallest known variance folded into the EM unknown.
const S_REDUCTION: f64 = 0.99;

/// Which model component a run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Which {
    /// Mean, standard deviation and t.
    #[default]
    Mean,
    /// Variance ratio and fixed variance.
    Varatio,
}

/// Per-position priors for the variance-ratio estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Priors {
    /// A-priori variance ratio (seeds the ratio estimate).
    pub varatio: f64,
    /// A-priori fixed variance (seeds the fixed-variance scale; 0 = unknown).
    pub varfix: f64,
}

impl Default for Priors {
    fn default() -> Self {
        Self { varatio: 1.0, varfix: 0.0 }
    }
}

/// Fitter settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Estimate the residual scale. When false, weights are taken as exact
    /// inverse variances and `scale = 1`.
    pub use_scale: bool,
    /// Iteration cap for the variance-ratio EM.
    pub max_iter: usize,
    /// Relative tolerance on the EM variance update.
    pub tol: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self { use_scale: true, max_iter: 100, tol: 1e-6 }
    }
}

/// `results["mean"]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanStats {
    /// Weighted mean.
    pub mu: f64,
    /// Weighted standard deviation.
    pub sd: f64,
    /// One-sample t-statistic (unclipped).
    pub t: f64,
    /// Square root of the residual scale.
    pub scale: f64,
    /// Number of contributing images.
    pub n: usize,
}

impl MeanStats {
    fn nan(n: usize) -> Self {
        Self { mu: f64::NAN, sd: f64::NAN, t: f64::NAN, scale: f64::NAN, n }
    }
}

/// `results["varatio"]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceRatioStats {
    /// Between-image variance divided by `varfix`.
    pub varatio: f64,
    /// Mean known within-image variance.
    pub varfix: f64,
    /// False when the EM hit `max_iter` before meeting `tol`.
    pub converged: bool,
    /// EM iterations performed.
    pub n_iter: usize,
}

impl VarianceRatioStats {
    fn nan() -> Self {
        Self { varatio: f64::NAN, varfix: f64::NAN, converged: false, n_iter: 0 }
    }
}

/// Results for one position. Built fresh per position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneSampleResults {
    /// Mean-model statistics (always computed).
    pub mean: MeanStats,
    /// Variance-ratio statistics (only for [`Which::Varatio`]).
    pub varatio: Option<VarianceRatioStats>,
}

impl OneSampleResults {
    /// True when a statistic reported for `which` is NaN.
    ///
    /// An infinite `t` (zero spread, non-zero mean) is not degenerate: it is
    /// reported at the clipping bound.
    pub fn is_degenerate(&self, which: Which) -> bool {
        match which {
            Which::Mean => self.mean.mu.is_nan() || self.mean.sd.is_nan() || self.mean.t.is_nan(),
            Which::Varatio => self.varatio.map_or(true, |v| !v.varatio.is_finite()),
        }
    }

    /// True when the variance-ratio EM ran out of iterations.
    pub fn not_converged(&self) -> bool {
        self.varatio.is_some_and(|v| v.n_iter > 0 && !v.converged)
    }
}

#[inline]
fn contributes(w: f64) -> bool {
    w.is_finite() && w > 0.0
}

/// One-sample fitter.
#[derive(Debug, Clone, Default)]
pub struct OneSample {
    config: FitConfig,
}

impl OneSample {
    /// Create a fitter.
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// Fitter settings.
    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit one position.
    ///
    /// `y` holds one value per image, `w` inverse-variance weights. Images
    /// with a zero, negative or non-finite weight do not contribute.
    pub fn fit(&self, y: &[f64], w: &Weights, priors: Priors, which: Which) -> OneSampleResults {
        let mean = self.estimate_mean(y, w);
        let varatio = match which {
            Which::Mean => None,
            Which::Varatio => Some(self.estimate_varatio(y, w, priors)),
        };
        OneSampleResults { mean, varatio }
    }

    /// Weighted mean, standard deviation and t.
    pub fn estimate_mean(&self, y: &[f64], w: &Weights) -> MeanStats {
        let mut sw = 0.0;
        let mut swy = 0.0;
        let mut n = 0usize;
        for (i, &x) in y.iter().enumerate() {
            let wi = w.get(i);
            if !contributes(wi) {
                continue;
            }
            sw += wi;
            swy += wi * x;
            n += 1;
        }
        if n == 0 {
            return MeanStats::nan(0);
        }

        let mu = swy / sw;
        let scale = if self.config.use_scale {
            let ss: f64 = y
                .iter()
                .enumerate()
                .filter(|&(i, _)| contributes(w.get(i)))
                .map(|(i, &x)| w.get(i) * (x - mu).powi(2))
                .sum();
            // n == 1 gives 0/0: no spread estimate from a single image.
            ss / (n - 1) as f64
        } else {
            1.0
        };

        let se = (scale / sw).sqrt();
        MeanStats { mu, sd: se * (n as f64).sqrt(), t: mu / se, scale: scale.sqrt(), n }
    }

    /// Variance ratio and fixed variance by EM.
    ///
    /// Returns the last iterate when `max_iter` is reached; the caller sees
    /// `converged == false`.
    pub fn estimate_varatio(&self, y: &[f64], w: &Weights, priors: Priors) -> VarianceRatioStats {
        let mut ys = Vec::with_capacity(y.len());
        let mut s = Vec::with_capacity(y.len());
        for (i, &x) in y.iter().enumerate() {
            let wi = w.get(i);
            if contributes(wi) {
                ys.push(x);
                s.push(1.0 / wi);
            }
        }
        let n = ys.len();
        if n < 2 {
            return VarianceRatioStats::nan();
        }
        let nf = n as f64;

        let varfix = s.iter().sum::<f64>() / nf;
        let min_s = s.iter().copied().fold(f64::INFINITY, f64::min) * S_REDUCTION;
        let sm: Vec<f64> = s.iter().map(|v| v - min_s).collect();

        let mut sigma2 = initial_sigma2(&ys, varfix, min_s, priors);
        let mut converged = false;
        let mut n_iter = 0;

        for iter in 0..self.config.max_iter {
            let mut sum_w = 0.0;
            let mut sum_wy = 0.0;
            for (&yi, &smi) in ys.iter().zip(&sm) {
                let wi = 1.0 / (smi + sigma2);
                sum_w += wi;
                sum_wy += wi * yi;
            }
            let winv = 1.0 / sum_w;
            let mu = sum_wy * winv;

            let mut sum_r2 = 0.0;
            let mut tr1 = 0.0;
            let mut tr2 = 0.0;
            for (&yi, &smi) in ys.iter().zip(&sm) {
                let wi = 1.0 / (smi + sigma2);
                let r = wi * (yi - mu);
                sum_r2 += r * r;
                tr1 += smi * wi;
                tr2 += smi * wi * wi;
            }
            let ptr_s = 1.0 + tr1 - tr2 * winv;
            let next = (sigma2 * ptr_s + sigma2 * sigma2 * sum_r2) / nf;

            n_iter = iter + 1;
            let delta = (next - sigma2).abs();
            sigma2 = next;
            if !sigma2.is_finite() {
                break;
            }
            if delta <= self.config.tol * sigma2.abs().max(varfix) {
                converged = true;
                break;
            }
        }

        VarianceRatioStats { varatio: (sigma2 - min_s) / varfix, varfix, converged, n_iter }
    }
}

/// Starting value for the EM unknown (between-image variance + `min_s`).
fn initial_sigma2(ys: &[f64], varfix: f64, min_s: f64, priors: Priors) -> f64 {
    let varfix_seed =
        if priors.varfix.is_finite() && priors.varfix > 0.0 { priors.varfix } else { varfix };
    let seed = priors.varatio * varfix_seed;
    if seed.is_finite() && seed > 0.0 {
        return seed + min_s;
    }

    // Sample variance of the raw values.
    let n = ys.len() as f64;
    let mean = ys.iter().sum::<f64>() / n;
    let var = ys.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / (n - 1.0);
    if var.is_finite() && var > 0.0 { var } else { varfix }
}
