//! Per-position weight and prior resolution.

use vx_core::{Grid, ImageSource, Position, Result};
use vx_inference::{Priors, WeightKind, Weights};

use crate::stream::ImageSequence;

/// Resolves the inverse-variance weights and the two priors of a position.
///
/// Every configured stream is read at the position it is given, which is
/// the position of the value vector being fitted.
pub struct WeightResolver {
    weights: Option<ImageSequence>,
    kind: WeightKind,
    varatio_prior: Option<Box<dyn ImageSource>>,
    varfix_prior: Option<Box<dyn ImageSource>>,
}

impl WeightResolver {
    /// Resolver for unweighted input: weight 1.0 everywhere, default priors.
    pub fn unweighted() -> Self {
        Self { weights: None, kind: WeightKind::default(), varatio_prior: None, varfix_prior: None }
    }

    /// Resolver reading one weight image per input image.
    pub fn weighted(weights: ImageSequence, kind: WeightKind) -> Self {
        Self { weights: Some(weights), kind, varatio_prior: None, varfix_prior: None }
    }

    /// Add the variance-ratio prior image (checked against `grid`).
    pub fn with_varatio_prior(mut self, grid: &Grid, src: Box<dyn ImageSource>) -> Result<Self> {
        require_grid(grid, src.as_ref(), "varatio prior")?;
        self.varatio_prior = Some(src);
        Ok(self)
    }

    /// Add the fixed-variance prior image (checked against `grid`).
    pub fn with_varfix_prior(mut self, grid: &Grid, src: Box<dyn ImageSource>) -> Result<Self> {
        require_grid(grid, src.as_ref(), "varfix prior")?;
        self.varfix_prior = Some(src);
        Ok(self)
    }

    /// True when weight images are configured.
    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// Weights and priors at `position`.
    pub fn resolve(&mut self, position: Position) -> Result<(Weights, Priors)> {
        let weights = match self.weights.as_mut() {
            Some(seq) => Weights::from_raw(seq.read(position)?, self.kind),
            None => Weights::Uniform(1.0),
        };

        let mut priors = Priors::default();
        if let Some(src) = self.varatio_prior.as_mut() {
            priors.varatio = src.value_at(position)?;
        }
        if let Some(src) = self.varfix_prior.as_mut() {
            priors.varfix = src.value_at(position)?;
        }
        Ok((weights, priors))
    }
}

fn require_grid(grid: &Grid, src: &dyn ImageSource, what: &str) -> Result<()> {
    if !src.grid().same_geometry(grid) {
        return Err(vx_core::Error::Configuration(format!(
            "{what} has shape {:?}, expected {:?}",
            src.grid().shape(),
            grid.shape()
        )));
    }
    Ok(())
}
