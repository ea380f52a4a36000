//! # vx-image
//!
//! Streaming voxelwise one-sample fitting over image volumes.
//!
//! ```text
//! ImageOneSample ─ for each Position p of the Grid:
//!     WeightResolver::resolve(p)   → Weights + Priors
//!     ImageSequence::read(p)       → value vector
//!     OneSample::fit               → OneSampleResults
//!     OutputChannel::next(p, &r)   → one scalar per output volume
//! ```
//!
//! The position is passed explicitly to every stream and channel, so each
//! output sees exactly the traversal of the input grid.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Orchestrator: options, inputs and the fit loop.
pub mod onesample;
/// Output channels and the statistics they extract.
pub mod output;
/// Raw little-endian volume files with a JSON header sidecar.
pub mod raw;
/// Positional value streams over several images.
pub mod stream;
/// In-memory volume.
pub mod volume;
/// Per-position weight and prior resolution.
pub mod weights;

pub use onesample::{FitSummary, ImageOneSample, OneSampleInput, OneSampleOptions};
pub use output::{OutputChannel, Statistic};
pub use raw::{DataType, RawVolumeReader, RawVolumeWriter, VolumeHeader};
pub use stream::ImageSequence;
pub use volume::Volume;
pub use weights::WeightResolver;
