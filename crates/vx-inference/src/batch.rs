//! Batch fitting over an in-memory block of positions.
//!
//! The streaming path fits one position at a time in lock-step with every
//! output. When a block of positions is already resident (position-major:
//! the `n_images` values of one position are contiguous) the positions are
//! independent and can be split into disjoint ranges:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ values: [p0: x0..xn][p1: x0..xn] ...        │
//! │        ↓ par_chunks(n_images)               │
//! │ Rayon workers, one OneSample::fit per chunk │
//! │        ↓ collect (order preserved)          │
//! │ Vec<OneSampleResults>, index = position     │
//! └─────────────────────────────────────────────┘
//! ```

use rayon::prelude::*;
use vx_core::{Error, Result};

use crate::onesample::{OneSample, OneSampleResults, Priors, Which};
use crate::weights::Weights;

/// Fit every position of a position-major block.
///
/// # Arguments
/// * `fitter` - Configured one-sample fitter
/// * `values` - `n_positions * n_images` values, position-major
/// * `weights` - Inverse-variance weights laid out like `values` (None = unweighted)
/// * `priors` - Either empty (defaults everywhere) or one entry per position
/// * `n_images` - Number of images per position
/// * `which` - Model component to estimate
///
/// # Returns
/// One result per position, in traversal order.
pub fn fit_batch(
    fitter: &OneSample,
    values: &[f64],
    weights: Option<&[f64]>,
    priors: &[Priors],
    n_images: usize,
    which: Which,
) -> Result<Vec<OneSampleResults>> {
    if n_images == 0 {
        return Err(Error::Configuration("n_images must be > 0".to_string()));
    }
    if values.len() % n_images != 0 {
        return Err(Error::Configuration(format!(
            "values length {} is not a multiple of n_images={}",
            values.len(),
            n_images
        )));
    }
    let n_positions = values.len() / n_images;
    if let Some(w) = weights {
        if w.len() != values.len() {
            return Err(Error::Configuration(format!(
                "weights length {} does not match values length {}",
                w.len(),
                values.len()
            )));
        }
    }
    if !priors.is_empty() && priors.len() != n_positions {
        return Err(Error::Configuration(format!(
            "expected {} priors (one per position), got {}",
            n_positions,
            priors.len()
        )));
    }

    tracing::debug!(n_positions, n_images, ?which, "batch fit");

    let results = values
        .par_chunks(n_images)
        .enumerate()
        .map(|(p, y)| {
            let w = match weights {
                Some(w) => Weights::PerImage(w[p * n_images..(p + 1) * n_images].to_vec()),
                None => Weights::Uniform(1.0),
            };
            let prior = priors.get(p).copied().unwrap_or_default();
            fitter.fit(y, &w, prior, which)
        })
        .collect();
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn batch_matches_serial_fits() {
        let fitter = OneSample::default();
        let n_images = 4;
        let values: Vec<f64> = (0..40).map(|i| ((i * 7) % 11) as f64 - 3.0).collect();
        let weights: Vec<f64> = (0..40).map(|i| 0.5 + (i % 3) as f64).collect();

        let batch =
            fit_batch(&fitter, &values, Some(&weights), &[], n_images, Which::Varatio).unwrap();
        assert_eq!(batch.len(), 10);

        for (p, r) in batch.iter().enumerate() {
            let y = &values[p * n_images..(p + 1) * n_images];
            let w = Weights::PerImage(weights[p * n_images..(p + 1) * n_images].to_vec());
            let serial = fitter.fit(y, &w, Priors::default(), Which::Varatio);
            assert_relative_eq!(r.mean.mu, serial.mean.mu, epsilon = 1e-15);
            assert_eq!(r.varatio.unwrap().n_iter, serial.varatio.unwrap().n_iter);
        }
    }

    #[test]
    fn batch_rejects_ragged_input() {
        let fitter = OneSample::default();
        let err = fit_batch(&fitter, &[1.0; 7], None, &[], 3, Which::Mean).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        let err = fit_batch(&fitter, &[1.0; 6], Some(&[1.0; 5]), &[], 3, Which::Mean).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        let err = fit_batch(&fitter, &[1.0; 6], None, &[Priors::default()], 3, Which::Mean)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn batch_unweighted_mean() {
        let fitter = OneSample::default();
        let r = fit_batch(&fitter, &[1.0, 2.0, 3.0], None, &[], 3, Which::Mean).unwrap();
        assert_relative_eq!(r[0].mean.mu, 2.0);
        assert_relative_eq!(r[0].mean.sd, 1.0);
    }
}
