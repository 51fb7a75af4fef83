//! Per-chunk "needs re-meshing" flags

use crate::game_of_life::{ChunkCoord, ChunkLayout};
use std::sync::atomic::{AtomicBool, Ordering};

/// One flag per chunk, `true` when the chunk changed since its mesh was built.
///
/// Workers only ever store `true`, so concurrent marks of the same chunk are
/// plain idempotent stores. Clearing happens on the driver thread once no
/// step is in flight.
#[derive(Debug)]
pub struct DirtyChunks {
    layout: ChunkLayout,
    flags: Vec<AtomicBool>,
}

impl DirtyChunks {
    /// Create a tracker with every chunk clean
    pub fn new(layout: ChunkLayout) -> Self {
        let flags = (0..layout.chunk_count()).map(|_| AtomicBool::new(false)).collect();
        Self { layout, flags }
    }

    /// Create a tracker with every chunk dirty
    pub fn all_dirty(layout: ChunkLayout) -> Self {
        let dirty = Self::new(layout);
        dirty.mark_all();
        dirty
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    #[inline]
    fn flag(&self, coord: ChunkCoord) -> Option<&AtomicBool> {
        if self.layout.contains(coord) {
            self.flags.get(self.layout.index(coord))
        } else {
            None
        }
    }

    #[inline]
    pub fn mark(&self, coord: ChunkCoord) {
        if let Some(flag) = self.flag(coord) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Mark the chunk owning voxel `(x, y, z)`
    #[inline]
    pub fn mark_cell(&self, x: usize, y: usize, z: usize) {
        self.mark(self.layout.chunk_of(x, y, z));
    }

    pub fn mark_all(&self) {
        for flag in &self.flags {
            flag.store(true, Ordering::Relaxed);
        }
    }

    pub fn clear(&self, coord: ChunkCoord) {
        if let Some(flag) = self.flag(coord) {
            flag.store(false, Ordering::Relaxed);
        }
    }

    pub fn clear_all(&self) {
        for flag in &self.flags {
            flag.store(false, Ordering::Relaxed);
        }
    }

    pub fn is_dirty(&self, coord: ChunkCoord) -> bool {
        self.flag(coord).is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Coordinates of every dirty chunk, in flat-index order
    pub fn dirty_coords(&self) -> Vec<ChunkCoord> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, flag)| flag.load(Ordering::Relaxed))
            .map(|(i, _)| self.layout.coord_at(i))
            .collect()
    }

    pub fn dirty_count(&self) -> usize {
        self.flags.iter().filter(|flag| flag.load(Ordering::Relaxed)).count()
    }
}
