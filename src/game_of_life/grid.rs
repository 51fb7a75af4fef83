//! Voxel grid representation and addressing for the 3D Game of Life

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by checked grid addressing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("coordinates ({x}, {y}, {z}) out of bounds for {dimensions} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        z: i64,
        dimensions: Dimensions,
    },

    #[error("{dimensions} grid has more cells than can be addressed")]
    TooLarge { dimensions: Dimensions },

    #[error("expected {expected} cells for {dimensions} grid, got {actual}")]
    CellCountMismatch {
        dimensions: Dimensions,
        expected: usize,
        actual: usize,
    },
}

/// Extents of a grid along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Dimensions {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Cubic extents, the canonical world shape
    pub fn cube(size: usize) -> Self {
        Self::new(size, size, size)
    }

    /// Total number of voxels
    pub fn volume(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Total number of voxels, `None` when the product overflows
    pub fn checked_volume(&self) -> Option<usize> {
        self.x.checked_mul(self.y)?.checked_mul(self.z)
    }

    pub fn is_cube(&self) -> bool {
        self.x == self.y && self.y == self.z
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// A 3D boolean voxel array (alive/dead)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    dimensions: Dimensions,
    cells: Vec<bool>,
}

impl Grid {
    /// Create a new grid with every cell dead
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            cells: vec![false; dimensions.volume()],
        }
    }

    /// Create a cubic grid with every cell dead
    pub fn cube(size: usize) -> Self {
        Self::new(Dimensions::cube(size))
    }

    /// Create a grid from a flat cell vector in x-major, then y, then z order
    pub fn from_cells(dimensions: Dimensions, cells: Vec<bool>) -> Result<Self, GridError> {
        let expected = dimensions
            .checked_volume()
            .ok_or(GridError::TooLarge { dimensions })?;
        if cells.len() != expected {
            return Err(GridError::CellCountMismatch {
                dimensions,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self { dimensions, cells })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn x_size(&self) -> usize {
        self.dimensions.x
    }

    pub fn y_size(&self) -> usize {
        self.dimensions.y
    }

    pub fn z_size(&self) -> usize {
        self.dimensions.z
    }

    /// Raw cell storage
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    /// Mutable raw storage, rows of `z_size` cells in x-major, then y order
    pub fn cells_mut(&mut self) -> &mut [bool] {
        &mut self.cells
    }

    /// Convert 3D coordinates to the flat index. Callers must bounds-check first.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.dimensions.y + y) * self.dimensions.z + z
    }

    /// Check whether signed coordinates address a voxel of this grid
    #[inline]
    pub fn is_in_world(&self, x: i64, y: i64, z: i64) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as u64) < self.dimensions.x as u64
            && (y as u64) < self.dimensions.y as u64
            && (z as u64) < self.dimensions.z as u64
    }

    #[inline]
    fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.dimensions.x && y < self.dimensions.y && z < self.dimensions.z
    }

    fn out_of_bounds(&self, x: usize, y: usize, z: usize) -> GridError {
        GridError::OutOfBounds {
            x: x as i64,
            y: y as i64,
            z: z as i64,
            dimensions: self.dimensions,
        }
    }

    /// Get cell value, reporting out-of-range coordinates as an error
    pub fn try_get(&self, x: usize, y: usize, z: usize) -> Result<bool, GridError> {
        if !self.contains(x, y, z) {
            return Err(self.out_of_bounds(x, y, z));
        }
        Ok(self.cells[self.index(x, y, z)])
    }

    /// Get cell value. Out of bounds cells are dead; there is no wraparound.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> bool {
        if self.contains(x, y, z) {
            self.cells[self.index(x, y, z)]
        } else {
            false
        }
    }

    /// Get a cell addressed with signed coordinates, dead when outside the grid
    #[inline]
    pub fn get_signed(&self, x: i64, y: i64, z: i64) -> bool {
        if self.is_in_world(x, y, z) {
            self.cells[self.index(x as usize, y as usize, z as usize)]
        } else {
            false
        }
    }

    /// Set cell value at coordinates
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: bool) -> Result<(), GridError> {
        if !self.contains(x, y, z) {
            return Err(self.out_of_bounds(x, y, z));
        }
        let idx = self.index(x, y, z);
        self.cells[idx] = value;
        Ok(())
    }

    /// Kill every cell
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = false);
    }

    /// Get all living cell coordinates
    pub fn living_cells(&self) -> Vec<(usize, usize, usize)> {
        let mut living = Vec::new();
        for x in 0..self.dimensions.x {
            for y in 0..self.dimensions.y {
                for z in 0..self.dimensions.z {
                    if self.get(x, y, z) {
                        living.push((x, y, z));
                    }
                }
            }
        }
        living
    }

    /// Count total living cells
    pub fn living_count(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell).count()
    }

    /// Check if the grid has no living cells
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&cell| !cell)
    }

    /// Copy of one horizontal layer, indexed `[x][z]`
    pub fn layer(&self, y: usize) -> Vec<Vec<bool>> {
        (0..self.dimensions.x)
            .map(|x| (0..self.dimensions.z).map(|z| self.get(x, y, z)).collect())
            .collect()
    }

    /// Build a grid with new extents, preserving the overlapping cells.
    ///
    /// Per axis, a growing extent centers the old content at
    /// `(new - old) / 2`; a shrinking extent keeps `[0, new)`.
    pub fn resized(&self, dimensions: Dimensions) -> Grid {
        let mut resized = Grid::new(dimensions);

        let offset = |old: usize, new: usize| if new > old { (new - old) / 2 } else { 0 };
        let (ox, oy, oz) = (
            offset(self.dimensions.x, dimensions.x),
            offset(self.dimensions.y, dimensions.y),
            offset(self.dimensions.z, dimensions.z),
        );

        for x in 0..self.dimensions.x.min(dimensions.x) {
            for y in 0..self.dimensions.y.min(dimensions.y) {
                for z in 0..self.dimensions.z.min(dimensions.z) {
                    if self.get(x, y, z) {
                        let idx = resized.index(x + ox, y + oy, z + oz);
                        resized.cells[idx] = true;
                    }
                }
            }
        }

        resized
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in (0..self.dimensions.y).rev() {
            writeln!(f, "y = {}", y)?;
            for x in 0..self.dimensions.x {
                for z in 0..self.dimensions.z {
                    let symbol = if self.get(x, y, z) { "⬛" } else { "⬜" };
                    write!(f, "{}", symbol)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(Dimensions::new(3, 4, 5));
        assert_eq!(grid.x_size(), 3);
        assert_eq!(grid.y_size(), 4);
        assert_eq!(grid.z_size(), 5);
        assert_eq!(grid.cells().len(), 60);
        assert!(grid.is_empty());
    }

    #[test]
    fn test_from_cells_rejects_wrong_length() {
        let result = Grid::from_cells(Dimensions::cube(2), vec![true; 7]);
        assert!(matches!(
            result,
            Err(GridError::CellCountMismatch { expected: 8, actual: 7, .. })
        ));
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let huge = Dimensions::new(usize::MAX, 2, 1);
        assert_eq!(huge.checked_volume(), None);
        assert_eq!(Dimensions::new(3, 4, 5).checked_volume(), Some(60));
        assert!(matches!(
            Grid::from_cells(huge, Vec::new()),
            Err(GridError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_set_and_get() {
        let mut grid = Grid::cube(4);
        grid.set(1, 2, 3, true).unwrap();
        assert!(grid.get(1, 2, 3));
        assert_eq!(grid.try_get(1, 2, 3), Ok(true));
        assert_eq!(grid.living_cells(), vec![(1, 2, 3)]);
        assert_eq!(grid.living_count(), 1);
    }

    #[test]
    fn test_out_of_bounds_is_checked_not_wrapped() {
        let mut grid = Grid::cube(3);
        grid.set(0, 0, 0, true).unwrap();

        assert!(grid.set(3, 0, 0, true).is_err());
        assert!(grid.try_get(0, 3, 0).is_err());
        assert!(!grid.get(3, 0, 0));
        assert!(!grid.get_signed(-3, 0, 0));
        assert!(!grid.is_in_world(-1, 0, 0));
        assert!(grid.is_in_world(2, 2, 2));
        assert!(!grid.is_in_world(2, 2, 3));
    }

    #[test]
    fn test_layer_extraction() {
        let mut grid = Grid::new(Dimensions::new(2, 3, 2));
        grid.set(1, 2, 0, true).unwrap();
        let layer = grid.layer(2);
        assert_eq!(layer, vec![vec![false, false], vec![true, false]]);
        assert!(grid.layer(0).iter().flatten().all(|&cell| !cell));
    }

    #[test]
    fn test_resize_grow_centers_content() {
        let mut grid = Grid::cube(2);
        grid.set(0, 0, 0, true).unwrap();
        grid.set(1, 1, 1, true).unwrap();

        let grown = grid.resized(Dimensions::cube(6));
        assert_eq!(grown.dimensions(), Dimensions::cube(6));
        assert_eq!(grown.living_count(), 2);
        assert!(grown.get(2, 2, 2));
        assert!(grown.get(3, 3, 3));
    }

    #[test]
    fn test_resize_shrink_keeps_prefix() {
        let mut grid = Grid::cube(5);
        grid.set(1, 1, 1, true).unwrap();
        grid.set(4, 4, 4, true).unwrap();

        let shrunk = grid.resized(Dimensions::cube(3));
        assert_eq!(shrunk.living_count(), 1);
        assert!(shrunk.get(1, 1, 1));
    }

    #[test]
    fn test_resize_mixed_axes() {
        let mut grid = Grid::new(Dimensions::new(4, 2, 2));
        grid.set(0, 1, 1, true).unwrap();

        let resized = grid.resized(Dimensions::new(2, 4, 2));
        // x shrinks (prefix), y grows by 2 (offset 1), z unchanged
        assert!(resized.get(0, 2, 1));
        assert_eq!(resized.living_count(), 1);
    }
}
