//! Collaborator traits consumed by the fitting engine.
//!
//! Image decoding and encoding live behind these two traits. Both take the
//! current [`Position`] explicitly: an implementation is never asked to keep
//! its own idea of "where the traversal is".

use crate::{Grid, Position, Result};

/// A read-only image bound to a grid.
pub trait ImageSource {
    /// Geometry of the image.
    fn grid(&self) -> &Grid;

    /// Value at `position`.
    ///
    /// Forward-only implementations must return an error when `position` is
    /// not the one immediately following the previous read.
    fn value_at(&mut self, position: Position) -> Result<f64>;
}

/// A write-only output volume bound to a grid.
pub trait OutputVolume {
    /// Geometry of the volume.
    fn grid(&self) -> &Grid;

    /// Store `value` at `position`.
    fn write_at(&mut self, position: Position, value: f64) -> Result<()>;

    /// Flush and finalize. Called once, after the last position.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: ImageSource + ?Sized> ImageSource for Box<T> {
    fn grid(&self) -> &Grid {
        (**self).grid()
    }

    fn value_at(&mut self, position: Position) -> Result<f64> {
        (**self).value_at(position)
    }
}

impl<T: OutputVolume + ?Sized> OutputVolume for Box<T> {
    fn grid(&self) -> &Grid {
        (**self).grid()
    }

    fn write_at(&mut self, position: Position, value: f64) -> Result<()> {
        (**self).write_at(position, value)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
