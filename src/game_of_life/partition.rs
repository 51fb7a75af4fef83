//! Splitting a grid's bounding box into work units and chunks

use super::Dimensions;
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Split `[0, size)` into `ceil(size / unit)` consecutive ranges.
///
/// Every range has length `unit` except possibly the last. A zero unit is
/// treated as one.
pub fn partition_axis(size: usize, unit: usize) -> Vec<Range<usize>> {
    let unit = unit.max(1);
    (0..size.div_ceil(unit))
        .map(|i| i * unit..((i + 1) * unit).min(size))
        .collect()
}

/// Axis-aligned box of voxels, half-open on every axis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: Range<usize>,
    pub y: Range<usize>,
    pub z: Range<usize>,
}

impl Region {
    pub fn new(x: Range<usize>, y: Range<usize>, z: Range<usize>) -> Self {
        Self { x, y, z }
    }

    /// The whole grid
    pub fn full(dimensions: Dimensions) -> Self {
        Self::new(0..dimensions.x, 0..dimensions.y, 0..dimensions.z)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.x.len(), self.y.len(), self.z.len())
    }

    pub fn volume(&self) -> usize {
        self.x.len() * self.y.len() * self.z.len()
    }

    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        self.x.contains(&x) && self.y.contains(&y) && self.z.contains(&z)
    }

    /// Iterate every voxel in x-major, then y, then z order
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, usize)> {
        iproduct!(self.x.clone(), self.y.clone(), self.z.clone())
    }
}

/// Tile the grid into work units of at most `unit` voxels per axis
pub fn partition_volume(dimensions: Dimensions, unit: usize) -> Vec<Region> {
    let xs = partition_axis(dimensions.x, unit);
    let ys = partition_axis(dimensions.y, unit);
    let zs = partition_axis(dimensions.z, unit);

    iproduct!(xs, ys, zs)
        .map(|(x, y, z)| Region::new(x, y, z))
        .collect()
}

/// Index of a chunk along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl ChunkCoord {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk tiling of a grid, the render and dirty-tracking granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    dimensions: Dimensions,
    chunk_size: usize,
    counts: Dimensions,
}

impl ChunkLayout {
    pub fn new(dimensions: Dimensions, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let counts = Dimensions::new(
            dimensions.x.div_ceil(chunk_size),
            dimensions.y.div_ceil(chunk_size),
            dimensions.z.div_ceil(chunk_size),
        );
        Self {
            dimensions,
            chunk_size,
            counts,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks along each axis
    pub fn counts(&self) -> Dimensions {
        self.counts
    }

    pub fn chunk_count(&self) -> usize {
        self.counts.volume()
    }

    /// The chunk owning voxel `(x, y, z)`
    #[inline]
    pub fn chunk_of(&self, x: usize, y: usize, z: usize) -> ChunkCoord {
        ChunkCoord::new(x / self.chunk_size, y / self.chunk_size, z / self.chunk_size)
    }

    /// Flat index of a chunk coordinate
    #[inline]
    pub fn index(&self, coord: ChunkCoord) -> usize {
        (coord.x * self.counts.y + coord.y) * self.counts.z + coord.z
    }

    pub fn coord_at(&self, index: usize) -> ChunkCoord {
        let z = index % self.counts.z;
        let y = (index / self.counts.z) % self.counts.y;
        let x = index / (self.counts.z * self.counts.y);
        ChunkCoord::new(x, y, z)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        coord.x < self.counts.x && coord.y < self.counts.y && coord.z < self.counts.z
    }

    /// Voxel bounds of a chunk; edge chunks are clipped to the grid
    pub fn bounds(&self, coord: ChunkCoord) -> Region {
        let axis = |c: usize, size: usize| {
            (c * self.chunk_size).min(size)..((c + 1) * self.chunk_size).min(size)
        };
        Region::new(
            axis(coord.x, self.dimensions.x),
            axis(coord.y, self.dimensions.y),
            axis(coord.z, self.dimensions.z),
        )
    }

    /// Every chunk coordinate in flat-index order
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> {
        iproduct!(0..self.counts.x, 0..self.counts.y, 0..self.counts.z)
            .map(|(x, y, z)| ChunkCoord::new(x, y, z))
    }
}
