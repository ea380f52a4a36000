//! Voxelwise one-sample fitting over a sequence of images.
//!
//! [`ImageOneSample`] is built from a [`OneSampleInput`] (plain images, or
//! image/weight-image pairs, plus optional prior images) and a
//! [`OneSampleOptions`]. Construction validates everything and opens every
//! output; [`ImageOneSample::fit`] then walks the grid once:
//!
//! 1. resolve weights and priors at the position,
//! 2. read the value vector at the position,
//! 3. fit,
//! 4. hand the results to every output channel at the position.
//!
//! Numerically degenerate positions are written as NaN and counted in the
//! returned [`FitSummary`]; they never stop the run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vx_core::{Error, Grid, ImageSource, OutputVolume, Result};
use vx_inference::{FitConfig, OneSample, WeightKind, Which};

use crate::output::{OutputChannel, Statistic};
use crate::raw::{DataType, RawVolumeWriter, check_target};
use crate::stream::ImageSequence;
use crate::weights::WeightResolver;

/// Run options. Every field has a default; see [`OneSampleOptions::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneSampleOptions {
    /// `mean` writes t/sd/effect, `varatio` writes varatio/varfix.
    pub which: Which,
    /// Write the t map (mean mode).
    pub t: bool,
    /// Write the standard deviation map (mean mode).
    pub sd: bool,
    /// Write the effect (mean) map (mean mode).
    pub mean: bool,
    /// Write the variance-ratio map (varatio mode).
    pub est_varatio: bool,
    /// Write the fixed-variance map (varatio mode).
    pub est_varfix: bool,
    /// Output directory, created if absent.
    pub path: PathBuf,
    /// Output file extension, including the dot.
    pub ext: String,
    /// Prefix prepended to every output file stem.
    pub prefix: String,
    /// Overwrite existing outputs.
    pub clobber: bool,
    /// Interpretation of weight images.
    pub weight_kind: WeightKind,
    /// Element type of output volumes.
    pub dtype: DataType,
    /// Estimate the residual scale from the data.
    pub use_scale: bool,
    /// Variance-ratio EM iteration cap.
    pub max_iter: usize,
    /// Variance-ratio EM relative tolerance.
    pub tol: f64,
}

impl Default for OneSampleOptions {
    fn default() -> Self {
        let fit = FitConfig::default();
        Self {
            which: Which::Mean,
            t: true,
            sd: true,
            mean: true,
            est_varatio: true,
            est_varfix: true,
            path: PathBuf::from("onesample"),
            ext: ".img".to_string(),
            prefix: String::new(),
            clobber: false,
            weight_kind: WeightKind::Std,
            dtype: DataType::F32,
            use_scale: fit.use_scale,
            max_iter: fit.max_iter,
            tol: fit.tol,
        }
    }
}

impl OneSampleOptions {
    /// Load options from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Statistics written under these options, in output order.
    pub fn statistics(&self) -> Vec<Statistic> {
        let wanted = match self.which {
            Which::Mean => vec![
                (self.t, Statistic::T),
                (self.sd, Statistic::Sd),
                (self.mean, Statistic::Mean),
            ],
            Which::Varatio => {
                vec![(self.est_varatio, Statistic::Varatio), (self.est_varfix, Statistic::Varfix)]
            }
        };
        wanted.into_iter().filter(|&(on, _)| on).map(|(_, s)| s).collect()
    }

    /// Fitter settings.
    pub fn fit_config(&self) -> FitConfig {
        FitConfig { use_scale: self.use_scale, max_iter: self.max_iter, tol: self.tol }
    }

    /// Output path of `statistic`.
    pub fn output_path(&self, statistic: Statistic) -> PathBuf {
        statistic.output_path(&self.path, &self.prefix, &self.ext)
    }

    /// Reject options that cannot produce a run.
    pub fn validate(&self) -> Result<()> {
        if self.statistics().is_empty() {
            return Err(Error::Configuration(format!(
                "no outputs enabled for which={:?}",
                self.which
            )));
        }
        if self.ext.is_empty() {
            return Err(Error::Configuration("ext must not be empty".to_string()));
        }
        if self.max_iter == 0 {
            return Err(Error::Configuration("max_iter must be > 0".to_string()));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(Error::Configuration("tol must be positive and finite".to_string()));
        }
        Ok(())
    }
}

/// Images to fit, with optional weight and prior images.
pub struct OneSampleInput {
    images: Vec<Box<dyn ImageSource>>,
    weights: Option<Vec<Box<dyn ImageSource>>>,
    varatio_prior: Option<Box<dyn ImageSource>>,
    varfix_prior: Option<Box<dyn ImageSource>>,
}

impl OneSampleInput {
    /// Unweighted images (equal variances).
    pub fn images(images: Vec<Box<dyn ImageSource>>) -> Self {
        Self { images, weights: None, varatio_prior: None, varfix_prior: None }
    }

    /// (image, weight image) pairs.
    pub fn weighted(pairs: Vec<(Box<dyn ImageSource>, Box<dyn ImageSource>)>) -> Self {
        let (images, weights) = pairs.into_iter().unzip();
        Self { images, weights: Some(weights), varatio_prior: None, varfix_prior: None }
    }

    /// Images and weight images given as two lists of equal length.
    pub fn with_weights(
        images: Vec<Box<dyn ImageSource>>,
        weights: Vec<Box<dyn ImageSource>>,
    ) -> Result<Self> {
        if images.len() != weights.len() {
            return Err(Error::Configuration(format!(
                "{} images but {} weight images",
                images.len(),
                weights.len()
            )));
        }
        Ok(Self::weighted(images.into_iter().zip(weights).collect()))
    }

    /// Variance-ratio prior image.
    pub fn with_varatio_prior(mut self, src: Box<dyn ImageSource>) -> Self {
        self.varatio_prior = Some(src);
        self
    }

    /// Fixed-variance prior image.
    pub fn with_varfix_prior(mut self, src: Box<dyn ImageSource>) -> Self {
        self.varfix_prior = Some(src);
        self
    }

    /// Number of input images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// True when no images were given.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn into_streams(self, kind: WeightKind) -> Result<(ImageSequence, WeightResolver)> {
        let (images, mut resolver) = match self.weights {
            Some(weights) => {
                let (images, weights) =
                    ImageSequence::paired(self.images.into_iter().zip(weights).collect())?;
                (images, WeightResolver::weighted(weights, kind))
            }
            None => (ImageSequence::new(self.images)?, WeightResolver::unweighted()),
        };
        if let Some(src) = self.varatio_prior {
            resolver = resolver.with_varatio_prior(images.grid(), src)?;
        }
        if let Some(src) = self.varfix_prior {
            resolver = resolver.with_varfix_prior(images.grid(), src)?;
        }
        Ok((images, resolver))
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    /// Model component fitted.
    pub which: Which,
    /// Number of input images.
    pub n_images: usize,
    /// Number of positions visited (and written by every channel).
    pub n_positions: usize,
    /// Whether weight images were used.
    pub weighted: bool,
    /// Statistics written, in output order.
    pub statistics: Vec<Statistic>,
    /// Positions whose statistics came out NaN.
    pub n_degenerate: usize,
    /// Positions where the variance-ratio EM hit its iteration cap.
    pub n_not_converged: usize,
}

/// Voxelwise one-sample fit streaming into one output volume per statistic.
pub struct ImageOneSample<V = RawVolumeWriter> {
    images: ImageSequence,
    resolver: WeightResolver,
    fitter: OneSample,
    which: Which,
    channels: Vec<OutputChannel<V>>,
}

impl ImageOneSample<RawVolumeWriter> {
    /// Validate `input` and `options` and create the output files.
    ///
    /// Every output target is checked before any file is created, so a
    /// clobber conflict leaves the output directory untouched.
    pub fn new(input: OneSampleInput, options: &OneSampleOptions) -> Result<Self> {
        options.validate()?;
        for statistic in options.statistics() {
            check_target(&options.output_path(statistic), options.clobber)?;
        }
        Self::with_volumes(input, options, |statistic, grid| {
            std::fs::create_dir_all(&options.path)?;
            RawVolumeWriter::create(
                options.output_path(statistic),
                grid,
                options.dtype,
                options.clobber,
            )
        })
    }
}

impl<V: OutputVolume> ImageOneSample<V> {
    /// Validate `input` and `options`, then open one volume per enabled
    /// statistic through `open`.
    ///
    /// `options.path`, `ext`, `prefix`, `clobber` and `dtype` are left to
    /// `open`.
    pub fn with_volumes<F>(
        input: OneSampleInput,
        options: &OneSampleOptions,
        mut open: F,
    ) -> Result<Self>
    where
        F: FnMut(Statistic, &Grid) -> Result<V>,
    {
        options.validate()?;
        let (images, resolver) = input.into_streams(options.weight_kind)?;

        let mut channels = Vec::new();
        for statistic in options.statistics() {
            let volume = open(statistic, images.grid())?;
            if !volume.grid().same_geometry(images.grid()) {
                return Err(Error::Configuration(format!(
                    "output '{}' has shape {:?}, inputs have {:?}",
                    statistic.name(),
                    volume.grid().shape(),
                    images.grid().shape()
                )));
            }
            tracing::debug!(statistic = statistic.name(), "output opened");
            channels.push(OutputChannel::new(statistic, volume));
        }

        Ok(Self {
            images,
            resolver,
            fitter: OneSample::new(options.fit_config()),
            which: options.which,
            channels,
        })
    }

    /// Input geometry.
    pub fn grid(&self) -> &Grid {
        self.images.grid()
    }

    /// Statistics that will be written, in output order.
    pub fn statistics(&self) -> Vec<Statistic> {
        self.channels.iter().map(OutputChannel::statistic).collect()
    }

    /// Run the fit over every position and close the outputs.
    pub fn fit(self) -> Result<FitSummary> {
        self.fit_into().map(|(summary, _)| summary)
    }

    /// Run the fit and return the closed output volumes with the summary.
    pub fn fit_into(mut self) -> Result<(FitSummary, Vec<(Statistic, V)>)> {
        let grid = self.images.grid().clone();
        let n_images = self.images.len();
        let weighted = self.resolver.is_weighted();
        tracing::info!(
            n_images,
            n_positions = grid.n_positions(),
            which = ?self.which,
            weighted,
            n_outputs = self.channels.len(),
            "one-sample fit started"
        );

        let mut y = Vec::with_capacity(n_images);
        let mut n_degenerate = 0usize;
        let mut n_not_converged = 0usize;
        for position in grid.positions() {
            let (weights, priors) = self.resolver.resolve(position)?;
            self.images.read_into(position, &mut y)?;
            let results = self.fitter.fit(&y, &weights, priors, self.which);
            if results.is_degenerate(self.which) {
                n_degenerate += 1;
                tracing::trace!(coords = ?grid.coords(position), n = results.mean.n, "degenerate");
            }
            if results.not_converged() {
                n_not_converged += 1;
                tracing::trace!(coords = ?grid.coords(position), "EM iteration cap reached");
            }
            for channel in self.channels.iter_mut() {
                channel.next(position, &results)?;
            }
        }

        let statistics = self.statistics();
        let volumes = self
            .channels
            .into_iter()
            .map(|ch| {
                let statistic = ch.statistic();
                ch.close().map(|v| (statistic, v))
            })
            .collect::<Result<Vec<_>>>()?;

        if n_degenerate > 0 {
            tracing::warn!(n_degenerate, "positions with degenerate statistics written as NaN");
        }
        if n_not_converged > 0 {
            tracing::warn!(
                n_not_converged,
                max_iter = self.fitter.config().max_iter,
                "variance-ratio estimate did not converge; last iterate written"
            );
        }
        tracing::info!(n_positions = grid.n_positions(), "one-sample fit complete");

        let summary = FitSummary {
            which: self.which,
            n_images,
            n_positions: grid.n_positions(),
            weighted,
            statistics,
            n_degenerate,
            n_not_converged,
        };
        Ok((summary, volumes))
    }
}
