//! Weight images come in three flavours: a standard deviation map, a
//! variance map, or a ready-made weight. The fitter only ever sees
//! inverse-variance weights.

use serde::{Deserialize, Serialize};

/// How the values of a weight image are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightKind {
    /// Standard deviation: weight = 1/v².
    #[default]
    Std,
    /// Variance: weight = 1/v.
    Var,
    /// Already an inverse-variance weight.
    Weight,
}

impl WeightKind {
    /// Convert one raw weight-image value to an inverse-variance weight.
    #[inline]
    pub fn to_inverse_variance(self, v: f64) -> f64 {
        match self {
            WeightKind::Std => 1.0 / (v * v),
            WeightKind::Var => 1.0 / v,
            WeightKind::Weight => v,
        }
    }
}

/// Inverse-variance weights for one position.
#[derive(Debug, Clone, PartialEq)]
pub enum Weights {
    /// Same weight for every image (1.0 when no weight images are given).
    Uniform(f64),
    /// One weight per image.
    PerImage(Vec<f64>),
}

impl Weights {
    /// Weight of image `i`.
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        match self {
            Weights::Uniform(w) => *w,
            Weights::PerImage(w) => w[i],
        }
    }

    /// Convert raw weight-image values in place and wrap them.
    pub fn from_raw(mut raw: Vec<f64>, kind: WeightKind) -> Self {
        for v in raw.iter_mut() {
            *v = kind.to_inverse_variance(*v);
        }
        Weights::PerImage(raw)
    }
}
