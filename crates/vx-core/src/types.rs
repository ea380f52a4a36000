//! Traversal grid shared by every stream and output volume.
//!
//! A [`Grid`] fixes the spatial extent of a volume and the order in which its
//! positions are visited (row-major, first axis slowest). Streams and sinks
//! never own a cursor into the grid: the driving loop hands each of them the
//! current [`Position`], so every participant sees the same sequence.

use crate::{Error, Result};

/// Spatial extent of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    shape: Vec<usize>,
    n_positions: usize,
}

impl Grid {
    /// Create a grid from its per-axis extents.
    ///
    /// Every axis must be non-empty.
    pub fn new(shape: Vec<usize>) -> Result<Self> {
        if shape.is_empty() {
            return Err(Error::Configuration("grid must have at least one axis".to_string()));
        }
        if let Some(axis) = shape.iter().position(|&n| n == 0) {
            return Err(Error::Configuration(format!("grid axis {axis} has zero extent")));
        }
        let n_positions = shape
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| Error::Configuration(format!("grid shape {shape:?} overflows")))?;
        Ok(Self { shape, n_positions })
    }

    /// A grid with a single position.
    pub fn scalar() -> Self {
        Self { shape: vec![1], n_positions: 1 }
    }

    /// Per-axis extents.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of positions in the traversal.
    pub fn n_positions(&self) -> usize {
        self.n_positions
    }

    /// True when `other` has identical extents (and hence traversal order).
    pub fn same_geometry(&self, other: &Grid) -> bool {
        self.shape == other.shape
    }

    /// Iterate every position in traversal order.
    pub fn positions(&self) -> Positions {
        Positions { next: 0, end: self.n_positions() }
    }

    /// Voxel coordinates of a position.
    pub fn coords(&self, position: Position) -> Vec<usize> {
        let mut rem = position.index();
        let mut coords = vec![0; self.shape.len()];
        for (axis, &n) in self.shape.iter().enumerate().rev() {
            coords[axis] = rem % n;
            rem /= n;
        }
        coords
    }
}

/// One spatial sample location, identified by its index in the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(usize);

impl Position {
    /// Position at a given traversal index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Traversal index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Iterator over grid positions in traversal order.
#[derive(Debug, Clone)]
pub struct Positions {
    next: usize,
    end: usize,
}

impl Iterator for Positions {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        if self.next >= self.end {
            return None;
        }
        let p = Position(self.next);
        self.next += 1;
        Some(p)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.next;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Positions {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_positions() {
        let grid = Grid::new(vec![2, 3, 4]).unwrap();
        assert_eq!(grid.n_positions(), 24);
        let idx: Vec<usize> = grid.positions().map(Position::index).collect();
        assert_eq!(idx, (0..24).collect::<Vec<_>>());
        assert_eq!(grid.positions().len(), 24);
    }

    #[test]
    fn test_coords_row_major() {
        let grid = Grid::new(vec![2, 3, 4]).unwrap();
        assert_eq!(grid.coords(Position::new(0)), vec![0, 0, 0]);
        assert_eq!(grid.coords(Position::new(5)), vec![0, 1, 1]);
        assert_eq!(grid.coords(Position::new(23)), vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_grids() {
        assert!(matches!(Grid::new(vec![]), Err(Error::Configuration(_))));
        assert!(matches!(Grid::new(vec![3, 0]), Err(Error::Configuration(_))));
        let huge = 1usize << (usize::BITS / 2 + 1);
        assert!(matches!(Grid::new(vec![huge, huge]), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_scalar_grid() {
        let g = Grid::scalar();
        assert_eq!(g.n_positions(), 1);
        assert_eq!(g.coords(Position::new(0)), vec![0]);
    }

    #[test]
    fn test_same_geometry() {
        let a = Grid::new(vec![4, 4]).unwrap();
        assert!(a.same_geometry(&Grid::new(vec![4, 4]).unwrap()));
        assert!(!a.same_geometry(&Grid::new(vec![16]).unwrap()));
    }
}
