//! Chunk mesh building boundary
//!
//! Geometry is built on worker threads from the published world and uploaded
//! on the driver thread. Only dirty chunks are rebuilt.

use super::tasks::TaskBatch;
use crate::game_of_life::{ChunkCoord, ChunkLayout, Grid, Region};
use rayon::ThreadPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Vertex and triangle buffers for one chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkGeometry {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl ChunkGeometry {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Builds renderable geometry for a chunk. Runs on worker threads and must
/// not mutate the grid.
pub trait MeshBuilder: Send + Sync {
    fn build_chunk_geometry(&self, grid: &Grid, bounds: &Region) -> ChunkGeometry;
}

/// Receives finished geometry on the driver thread
pub trait MeshUploader {
    fn upload_mesh(&mut self, chunk: ChunkCoord, geometry: ChunkGeometry);

    /// Drop every uploaded mesh, called when the chunk layout changes
    fn clear_meshes(&mut self) {}
}

/// Neighbour offset and quad corners of each cube face
const FACES: [([i64; 3], [[u8; 3]; 4]); 6] = [
    ([-1, 0, 0], [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]]),
    ([1, 0, 0], [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]]),
    ([0, -1, 0], [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]]),
    ([0, 1, 0], [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]]),
    ([0, 0, -1], [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]]),
    ([0, 0, 1], [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]]),
];

/// One unit cube per live voxel, with faces between two live voxels of the
/// same chunk culled.
///
/// Voxels outside the chunk count as empty, so a chunk's geometry depends on
/// its own cells only and stays valid while the chunk is clean.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubeMeshBuilder;

impl MeshBuilder for CubeMeshBuilder {
    fn build_chunk_geometry(&self, grid: &Grid, bounds: &Region) -> ChunkGeometry {
        let mut geometry = ChunkGeometry::default();

        for (x, y, z) in bounds.cells() {
            if !grid.get(x, y, z) {
                continue;
            }

            for (offset, corners) in FACES.iter() {
                let (nx, ny, nz) = (x as i64 + offset[0], y as i64 + offset[1], z as i64 + offset[2]);
                let inside = nx >= 0
                    && ny >= 0
                    && nz >= 0
                    && bounds.contains(nx as usize, ny as usize, nz as usize);
                if inside && grid.get_signed(nx, ny, nz) {
                    continue;
                }

                let base = geometry.vertices.len() as u32;
                for corner in corners {
                    geometry.vertices.push([
                        (x + corner[0] as usize) as f32,
                        (y + corner[1] as usize) as f32,
                        (z + corner[2] as usize) as f32,
                    ]);
                }
                geometry
                    .indices
                    .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }

        geometry
    }
}

/// Uploader that keeps the latest geometry per chunk in memory
#[derive(Debug, Default)]
pub struct MeshCache {
    meshes: HashMap<ChunkCoord, ChunkGeometry>,
    uploads: usize,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chunk: ChunkCoord) -> Option<&ChunkGeometry> {
        self.meshes.get(&chunk)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Total uploads since creation, including re-uploads of the same chunk
    pub fn upload_count(&self) -> usize {
        self.uploads
    }

    pub fn total_triangles(&self) -> usize {
        self.meshes.values().map(ChunkGeometry::triangle_count).sum()
    }
}

impl MeshUploader for MeshCache {
    fn upload_mesh(&mut self, chunk: ChunkCoord, geometry: ChunkGeometry) {
        self.uploads += 1;
        self.meshes.insert(chunk, geometry);
    }

    fn clear_meshes(&mut self) {
        self.meshes.clear();
    }
}

/// Completion handle for an in-flight mesh rebuild
pub struct MeshHandle {
    batch: TaskBatch<(ChunkCoord, ChunkGeometry)>,
}

/// Build geometry for `chunks` on the pool from the published world
pub fn launch_mesh_update(
    pool: &ThreadPool,
    builder: Arc<dyn MeshBuilder>,
    world: Arc<Grid>,
    layout: ChunkLayout,
    chunks: Vec<ChunkCoord>,
) -> MeshHandle {
    log::debug!("Dispatching mesh rebuild for {} dirty chunks", chunks.len());

    let batch = TaskBatch::spawn(pool, chunks, move |chunk| {
        let bounds = layout.bounds(chunk);
        (chunk, builder.build_chunk_geometry(&world, &bounds))
    });
    MeshHandle { batch }
}

impl MeshHandle {
    pub fn chunks(&self) -> usize {
        self.batch.len()
    }

    pub fn is_ready(&self) -> bool {
        self.batch.is_ready()
    }

    pub fn wait(&mut self) {
        self.batch.wait();
    }

    pub fn elapsed(&self) -> Duration {
        self.batch.elapsed()
    }

    /// Collect every chunk's geometry; one failed chunk fails the rebuild
    pub fn finish(self) -> Result<Vec<(ChunkCoord, ChunkGeometry)>, super::tasks::TaskFailure> {
        self.batch.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_of_life::Dimensions;
    use rayon::ThreadPoolBuilder;

    #[test]
    fn test_single_cube_has_twelve_triangles() {
        let mut grid = Grid::cube(3);
        grid.set(1, 1, 1, true).unwrap();

        let geometry = CubeMeshBuilder.build_chunk_geometry(&grid, &Region::full(grid.dimensions()));
        assert_eq!(geometry.triangle_count(), 12);
        assert_eq!(geometry.vertices.len(), 24);
        assert!(geometry.vertices.contains(&[2.0, 2.0, 2.0]));
    }

    #[test]
    fn test_shared_face_is_culled() {
        let mut grid = Grid::cube(3);
        grid.set(0, 0, 0, true).unwrap();
        grid.set(1, 0, 0, true).unwrap();

        let geometry = CubeMeshBuilder.build_chunk_geometry(&grid, &Region::full(grid.dimensions()));
        assert_eq!(geometry.triangle_count(), 20);
    }

    #[test]
    fn test_chunk_geometry_ignores_neighbouring_chunks() {
        let mut grid = Grid::new(Dimensions::new(4, 1, 1));
        grid.set(1, 0, 0, true).unwrap();
        grid.set(2, 0, 0, true).unwrap();
        let layout = ChunkLayout::new(grid.dimensions(), 2);
        let left_bounds = layout.bounds(ChunkCoord::new(0, 0, 0));

        // The border face stays: the touching cube belongs to another chunk
        let left = CubeMeshBuilder.build_chunk_geometry(&grid, &left_bounds);
        let right = CubeMeshBuilder.build_chunk_geometry(&grid, &layout.bounds(ChunkCoord::new(1, 0, 0)));
        assert_eq!(left.triangle_count(), 12);
        assert_eq!(right.triangle_count(), 12);

        // Editing the other chunk leaves this chunk's geometry unchanged
        grid.set(2, 0, 0, false).unwrap();
        assert_eq!(CubeMeshBuilder.build_chunk_geometry(&grid, &left_bounds), left);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let mut grid = Grid::cube(5);
        for (x, y, z) in [(0, 0, 0), (1, 0, 0), (2, 3, 4), (4, 4, 4)] {
            grid.set(x, y, z, true).unwrap();
        }
        let region = Region::full(grid.dimensions());

        let first = CubeMeshBuilder.build_chunk_geometry(&grid, &region);
        let second = CubeMeshBuilder.build_chunk_geometry(&grid, &region);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_chunk_has_no_geometry() {
        let grid = Grid::cube(4);
        let geometry = CubeMeshBuilder.build_chunk_geometry(&grid, &Region::full(grid.dimensions()));
        assert!(geometry.is_empty());
    }

    #[test]
    fn test_launch_mesh_update_into_cache() {
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let mut grid = Grid::cube(4);
        grid.set(3, 3, 3, true).unwrap();
        let layout = ChunkLayout::new(grid.dimensions(), 2);

        let handle = launch_mesh_update(
            &pool,
            Arc::new(CubeMeshBuilder),
            Arc::new(grid),
            layout,
            layout.coords().collect(),
        );
        assert_eq!(handle.chunks(), 8);

        let mut cache = MeshCache::new();
        for (chunk, geometry) in handle.finish().unwrap() {
            cache.upload_mesh(chunk, geometry);
        }
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.upload_count(), 8);
        assert_eq!(cache.total_triangles(), 12);
        assert_eq!(cache.get(ChunkCoord::new(1, 1, 1)).map(ChunkGeometry::triangle_count), Some(12));

        cache.clear_meshes();
        assert!(cache.is_empty());
    }
}
