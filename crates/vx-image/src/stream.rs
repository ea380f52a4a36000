//! Positional value streams.
//!
//! An [`ImageSequence`] binds N images that share one grid and yields, for
//! a given position, the N values at that position. It holds no cursor of
//! its own: the caller passes the position, so two sequences built over
//! the same grid cannot drift apart.

use vx_core::{Error, Grid, ImageSource, Position, Result};

/// N images read position by position.
pub struct ImageSequence {
    grid: Grid,
    sources: Vec<Box<dyn ImageSource>>,
}

impl std::fmt::Debug for ImageSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSequence")
            .field("grid", &self.grid)
            .field("n_images", &self.sources.len())
            .finish()
    }
}

impl ImageSequence {
    /// Bind `sources`; every source must have the geometry of the first.
    pub fn new(sources: Vec<Box<dyn ImageSource>>) -> Result<Self> {
        let Some(first) = sources.first() else {
            return Err(Error::Configuration("image sequence needs at least one image".to_string()));
        };
        let grid = first.grid().clone();
        check_geometry(&grid, &sources, "image")?;
        Ok(Self { grid, sources })
    }

    /// Bind (image, weight-image) pairs into an image sequence and a
    /// weight sequence on the same grid.
    pub fn paired(
        pairs: Vec<(Box<dyn ImageSource>, Box<dyn ImageSource>)>,
    ) -> Result<(Self, Self)> {
        let (images, weights): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        let images = Self::new(images)?;
        let weights = Self::new(weights)?;
        images.require_grid(&weights.grid, "weight image")?;
        Ok((images, weights))
    }

    /// Shared geometry.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Always false: construction rejects an empty list.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Fail unless `grid` matches this sequence's geometry.
    pub fn require_grid(&self, grid: &Grid, what: &str) -> Result<()> {
        if !self.grid.same_geometry(grid) {
            return Err(Error::Configuration(format!(
                "{what} has shape {:?}, expected {:?}",
                grid.shape(),
                self.grid.shape()
            )));
        }
        Ok(())
    }

    /// Fill `buf` with the value of every image at `position`.
    pub fn read_into(&mut self, position: Position, buf: &mut Vec<f64>) -> Result<()> {
        buf.clear();
        for src in self.sources.iter_mut() {
            buf.push(src.value_at(position)?);
        }
        Ok(())
    }

    /// The value vector at `position`.
    pub fn read(&mut self, position: Position) -> Result<Vec<f64>> {
        let mut buf = Vec::with_capacity(self.sources.len());
        self.read_into(position, &mut buf)?;
        Ok(buf)
    }
}

fn check_geometry(grid: &Grid, sources: &[Box<dyn ImageSource>], what: &str) -> Result<()> {
    for (i, src) in sources.iter().enumerate() {
        if !src.grid().same_geometry(grid) {
            return Err(Error::Configuration(format!(
                "{what} {i} has shape {:?}, expected {:?}",
                src.grid().shape(),
                grid.shape()
            )));
        }
    }
    Ok(())
}
