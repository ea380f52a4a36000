//! # vx-inference
//!
//! Per-position statistics for voxstat.
//!
//! This crate provides:
//! - the one-sample fitter (weighted mean, standard deviation, t)
//! - the variance-ratio / fixed-variance mixed-effects estimator
//! - weight-image conversions to inverse-variance weights
//! - a rayon batch fitter over in-memory position blocks
//!
//! Nothing here knows about images: inputs are plain value and weight slices.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Parallel fitting over in-memory blocks of positions.
pub mod batch;
/// One-sample fitter and results structure.
pub mod onesample;
/// Weight kinds and inverse-variance conversion.
pub mod weights;

pub use batch::fit_batch;
pub use onesample::{
    FitConfig, MeanStats, OneSample, OneSampleResults, Priors, VarianceRatioStats, Which,
};
pub use weights::{WeightKind, Weights};
