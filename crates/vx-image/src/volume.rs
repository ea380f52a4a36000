use vx_core::{Error, Grid, ImageSource, OutputVolume, Position, Result};

/// A whole volume held in memory, in traversal order.
///
/// Readable as an [`ImageSource`] and writable as an [`OutputVolume`]; used
/// for tests, small inputs, and collecting outputs without touching disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    grid: Grid,
    data: Vec<f64>,
}

impl Volume {
    /// Wrap `data` (traversal order) as a volume on `grid`.
    pub fn new(grid: Grid, data: Vec<f64>) -> Result<Self> {
        if data.len() != grid.n_positions() {
            return Err(Error::Configuration(format!(
                "volume data has {} values, grid {:?} has {} positions",
                data.len(),
                grid.shape(),
                grid.n_positions()
            )));
        }
        Ok(Self { grid, data })
    }

    /// A NaN-filled volume, ready to be written.
    pub fn empty(grid: Grid) -> Self {
        let n = grid.n_positions();
        Self { grid, data: vec![f64::NAN; n] }
    }

    /// A single-position volume holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self { grid: Grid::scalar(), data: vec![value] }
    }

    /// Values in traversal order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Consume into the values.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    fn check(&self, position: Position) -> Result<usize> {
        let i = position.index();
        if i >= self.data.len() {
            return Err(Error::Computation(format!(
                "position {} outside volume of {} positions",
                i,
                self.data.len()
            )));
        }
        Ok(i)
    }
}

impl ImageSource for Volume {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn value_at(&mut self, position: Position) -> Result<f64> {
        let i = self.check(position)?;
        Ok(self.data[i])
    }
}

impl OutputVolume for Volume {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn write_at(&mut self, position: Position, value: f64) -> Result<()> {
        let i = self.check(position)?;
        self.data[i] = value;
        Ok(())
    }
}
