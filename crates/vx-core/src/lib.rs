//! # vx-core
//!
//! Core types for voxstat: the traversal grid, the image source / output
//! volume traits every stream and sink implements, and the shared error type.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{ImageSource, OutputVolume};
pub use types::{Grid, Position, Positions};

/// Crate version, reported by `voxstat version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
