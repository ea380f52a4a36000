//! Output channels.
//!
//! A channel pairs one [`Statistic`] with one output volume. For every
//! position it projects the fitted results onto a scalar and writes it at
//! that same position; the driving loop owns the traversal.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vx_core::{OutputVolume, Position, Result};
use vx_inference::{OneSampleResults, Which};

/// Bound applied to reported t-statistics.
pub const T_MAX: f64 = 100.0;
/// Lower bound applied to reported t-statistics.
pub const T_MIN: f64 = -100.0;

/// A scalar field of [`OneSampleResults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    /// `mean.t`, clipped to [`T_MIN`, `T_MAX`].
    T,
    /// `mean.sd`.
    Sd,
    /// `mean.mu`.
    Mean,
    /// `varatio.varatio`.
    Varatio,
    /// `varatio.varfix`.
    Varfix,
}

impl Statistic {
    /// Output file stem.
    pub fn name(self) -> &'static str {
        match self {
            Statistic::T => "t",
            Statistic::Sd => "sd",
            Statistic::Mean => "effect",
            Statistic::Varatio => "varatio",
            Statistic::Varfix => "varfix",
        }
    }

    /// Model component the statistic belongs to.
    pub fn which(self) -> Which {
        match self {
            Statistic::T | Statistic::Sd | Statistic::Mean => Which::Mean,
            Statistic::Varatio | Statistic::Varfix => Which::Varatio,
        }
    }

    /// Project `results` onto this statistic.
    ///
    /// A variance-ratio statistic on results fitted without the variance
    /// model reads as NaN.
    pub fn extract(self, results: &OneSampleResults) -> f64 {
        match self {
            Statistic::T => results.mean.t.clamp(T_MIN, T_MAX),
            Statistic::Sd => results.mean.sd,
            Statistic::Mean => results.mean.mu,
            Statistic::Varatio => results.varatio.map_or(f64::NAN, |v| v.varatio),
            Statistic::Varfix => results.varatio.map_or(f64::NAN, |v| v.varfix),
        }
    }

    /// Output path `<dir>/<prefix><name><ext>`.
    pub fn output_path(self, dir: &Path, prefix: &str, ext: &str) -> PathBuf {
        dir.join(format!("{prefix}{}{ext}", self.name()))
    }
}

/// One statistic streamed into one output volume.
#[derive(Debug)]
pub struct OutputChannel<V> {
    statistic: Statistic,
    volume: V,
    written: usize,
}

impl<V: OutputVolume> OutputChannel<V> {
    /// Bind `statistic` to `volume`.
    pub fn new(statistic: Statistic, volume: V) -> Self {
        Self { statistic, volume, written: 0 }
    }

    /// Statistic this channel writes.
    pub fn statistic(&self) -> Statistic {
        self.statistic
    }

    /// Positions written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Extract this channel's statistic and write it at `position`.
    pub fn next(&mut self, position: Position, results: &OneSampleResults) -> Result<()> {
        self.volume.write_at(position, self.statistic.extract(results))?;
        self.written += 1;
        Ok(())
    }

    /// Finalize the volume and hand it back.
    pub fn close(mut self) -> Result<V> {
        self.volume.finish()?;
        tracing::debug!(statistic = self.statistic.name(), written = self.written, "channel closed");
        Ok(self.volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Volume;
    use vx_core::Grid;
    use vx_inference::{MeanStats, VarianceRatioStats};

    fn results(t: f64) -> OneSampleResults {
        OneSampleResults {
            mean: MeanStats { mu: 2.0, sd: 1.5, t, scale: 1.5, n: 3 },
            varatio: Some(VarianceRatioStats { varatio: 0.7, varfix: 0.2, converged: true, n_iter: 4 }),
        }
    }

    #[test]
    fn extract_projects_fields() {
        let r = results(3.0);
        assert_eq!(Statistic::T.extract(&r), 3.0);
        assert_eq!(Statistic::Sd.extract(&r), 1.5);
        assert_eq!(Statistic::Mean.extract(&r), 2.0);
        assert_eq!(Statistic::Varatio.extract(&r), 0.7);
        assert_eq!(Statistic::Varfix.extract(&r), 0.2);
    }

    #[test]
    fn t_is_clipped() {
        assert_eq!(Statistic::T.extract(&results(1e6)), T_MAX);
        assert_eq!(Statistic::T.extract(&results(-250.0)), T_MIN);
        assert_eq!(Statistic::T.extract(&results(f64::INFINITY)), 100.0);
        assert_eq!(Statistic::T.extract(&results(-100.0)), -100.0);
        assert!(Statistic::T.extract(&results(f64::NAN)).is_nan());
    }

    #[test]
    fn varatio_fields_without_variance_model() {
        let mut r = results(1.0);
        r.varatio = None;
        assert!(Statistic::Varatio.extract(&r).is_nan());
        assert!(Statistic::Varfix.extract(&r).is_nan());
    }

    #[test]
    fn names_and_paths() {
        assert_eq!(Statistic::Mean.name(), "effect");
        assert_eq!(Statistic::Varfix.which(), Which::Varatio);
        let p = Statistic::T.output_path(Path::new("out"), "grp_", ".img");
        assert_eq!(p, Path::new("out").join("grp_t.img"));
    }

    #[test]
    fn channel_writes_at_given_position() {
        let grid = Grid::new(vec![3]).unwrap();
        let mut ch = OutputChannel::new(Statistic::Sd, Volume::empty(grid.clone()));
        for p in grid.positions() {
            let mut r = results(0.0);
            r.mean.sd = p.index() as f64;
            ch.next(p, &r).unwrap();
        }
        assert_eq!(ch.written(), 3);
        assert_eq!(ch.statistic(), Statistic::Sd);
        assert_eq!(ch.close().unwrap().data(), &[0.0, 1.0, 2.0]);
    }
}
