//! Parallel generation step over disjoint work units
//!
//! The working grid is moved onto the pool for the duration of a step. Its
//! storage is split into per-unit row segments, so every work unit writes its
//! own cells in place while reading the shared previous generation. The
//! filled grid comes back through the step handle ready to be published.

use super::dirty::DirtyChunks;
use super::error::SimulationError;
use super::tasks::{panic_message, TaskBatch, TaskFailure};
use crate::game_of_life::rules::evaluate_with_mode;
use crate::game_of_life::{partition_axis, partition_volume, Dimensions, EvaluationMode, Grid, Region, RuleSet};
use itertools::iproduct;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-voxel next-state function
pub type Evaluator = fn(&Grid, usize, usize, usize, &RuleSet, EvaluationMode) -> bool;

/// Rule parameters latched when a step starts
#[derive(Clone, Copy)]
pub struct StepJob {
    pub rules: RuleSet,
    pub mode: EvaluationMode,
    pub evaluator: Evaluator,
}

impl StepJob {
    pub fn new(rules: RuleSet, mode: EvaluationMode) -> Self {
        Self {
            rules,
            mode,
            evaluator: evaluate_with_mode,
        }
    }

    pub fn with_evaluator(self, evaluator: Evaluator) -> Self {
        Self { evaluator, ..self }
    }
}

/// Summary of a finished step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub units: usize,
    pub changed_cells: usize,
    pub elapsed: Duration,
}

/// What the pool hands back: the working grid plus the per-unit outcome
struct StepOutput {
    grid: Grid,
    changed: Result<usize, TaskFailure>,
    elapsed: Duration,
}

/// Completion handle for one in-flight generation
pub struct StepHandle {
    batch: TaskBatch<StepOutput>,
    units: usize,
}

/// Writable row segments of one work unit, in x-major then y order
struct UnitRows<'a> {
    region: Region,
    rows: Vec<&'a mut [bool]>,
}

/// Split grid storage into disjoint per-unit row segments.
///
/// Units come out in the same order as [`partition_volume`].
fn split_units(cells: &mut [bool], dimensions: Dimensions, thread_size: usize) -> Vec<UnitRows<'_>> {
    let mut units: Vec<UnitRows<'_>> = partition_volume(dimensions, thread_size)
        .into_iter()
        .map(|region| UnitRows {
            rows: Vec::with_capacity(region.x.len() * region.y.len()),
            region,
        })
        .collect();
    if dimensions.z == 0 || dimensions.y == 0 {
        return units;
    }

    let unit = thread_size.max(1);
    let y_units = dimensions.y.div_ceil(unit);
    let z_ranges = partition_axis(dimensions.z, unit);

    for (row_index, row) in cells.chunks_mut(dimensions.z).enumerate() {
        let (x, y) = (row_index / dimensions.y, row_index % dimensions.y);
        let mut rest = row;
        for (zi, range) in z_ranges.iter().enumerate() {
            let (segment, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            rest = tail;
            let index = ((x / unit) * y_units + y / unit) * z_ranges.len() + zi;
            units[index].rows.push(segment);
        }
    }

    units
}

fn step_unit(world: &Grid, dirty: &DirtyChunks, unit: UnitRows<'_>, job: &StepJob) -> usize {
    let UnitRows { region, rows } = unit;
    let mut changed = 0;

    for ((x, y), row) in iproduct!(region.x.clone(), region.y.clone()).zip(rows) {
        for (z, cell) in region.z.clone().zip(row.iter_mut()) {
            let alive = (job.evaluator)(world, x, y, z, &job.rules, job.mode);
            if alive != world.get(x, y, z) {
                dirty.mark_cell(x, y, z);
                changed += 1;
            }
            *cell = alive;
        }
    }

    changed
}

fn run_step(world: &Grid, dirty: &DirtyChunks, mut working: Grid, thread_size: usize, job: &StepJob) -> StepOutput {
    let started = Instant::now();
    let dimensions = world.dimensions();
    if working.dimensions() != dimensions {
        working = Grid::new(dimensions);
    }

    let changed = split_units(working.cells_mut(), dimensions, thread_size)
        .into_par_iter()
        .enumerate()
        .map(|(index, unit)| {
            panic::catch_unwind(AssertUnwindSafe(|| step_unit(world, dirty, unit, job))).map_err(|payload| {
                TaskFailure {
                    unit: index,
                    message: panic_message(payload),
                }
            })
        })
        .collect::<Result<Vec<usize>, TaskFailure>>()
        .map(|changed| changed.into_iter().sum());

    StepOutput {
        grid: working,
        changed,
        elapsed: started.elapsed(),
    }
}

/// Launch one generation with work units of edge `thread_size`.
///
/// `world` is only read. `working` is overwritten cell by cell and returned
/// by [`StepHandle::finish`]; a buffer of the wrong shape is replaced.
pub fn launch_step(
    pool: &ThreadPool,
    world: Arc<Grid>,
    working: Grid,
    dirty: Arc<DirtyChunks>,
    thread_size: usize,
    job: StepJob,
) -> StepHandle {
    let dimensions = world.dimensions();
    let unit = thread_size.max(1);
    let units = dimensions.x.div_ceil(unit) * dimensions.y.div_ceil(unit) * dimensions.z.div_ceil(unit);
    log::debug!(
        "Dispatching step over {} work units ({} grid, unit {})",
        units,
        dimensions,
        thread_size
    );

    let batch = TaskBatch::spawn(pool, vec![working], move |working| {
        run_step(&world, &dirty, working, thread_size, &job)
    });
    StepHandle { batch, units }
}

impl StepHandle {
    pub fn units(&self) -> usize {
        self.units
    }

    /// Non-blocking completion check
    pub fn is_ready(&self) -> bool {
        self.batch.is_ready()
    }

    /// Block until every unit has reported
    pub fn wait(&mut self) {
        self.batch.wait();
    }

    pub fn elapsed(&self) -> Duration {
        self.batch.elapsed()
    }

    /// Take back the filled working grid.
    ///
    /// Blocks if units are still running. A single failed unit fails the
    /// step and the partially written grid is dropped.
    pub fn finish(self) -> Result<(Grid, StepReport), SimulationError> {
        let units = self.units;
        let output = self
            .batch
            .join()?
            .pop()
            .ok_or_else(|| SimulationError::WorkerFailed {
                unit: 0,
                message: "step reported no result".to_string(),
            })?;
        let changed_cells = output.changed?;

        Ok((
            output.grid,
            StepReport {
                units,
                changed_cells,
                elapsed: output.elapsed,
            },
        ))
    }
}

/// Run a whole step on the pool and wait for it
pub fn step_blocking(
    pool: &ThreadPool,
    world: Arc<Grid>,
    dirty: Arc<DirtyChunks>,
    thread_size: usize,
    job: StepJob,
) -> Result<Grid, SimulationError> {
    let working = Grid::new(world.dimensions());
    let (next, _) = launch_step(pool, world, working, dirty, thread_size, job).finish()?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_of_life::rules::evolve;
    use crate::game_of_life::{ChunkCoord, ChunkLayout};
    use rayon::ThreadPoolBuilder;

    fn pool() -> ThreadPool {
        ThreadPoolBuilder::new().num_threads(4).build().unwrap()
    }

    fn volume_job() -> StepJob {
        StepJob::new(RuleSet::default(), EvaluationMode::Volume)
    }

    fn random_grid(dims: Dimensions, seed: u64, density: f32) -> Grid {
        let mut rng = fastrand::Rng::with_seed(seed);
        let cells = (0..dims.volume()).map(|_| rng.f32() < density).collect();
        Grid::from_cells(dims, cells).unwrap()
    }

    fn explode_at_origin(grid: &Grid, x: usize, y: usize, z: usize, rules: &RuleSet, mode: EvaluationMode) -> bool {
        if (x, y, z) == (0, 0, 0) {
            panic!("evaluator failed at origin");
        }
        evaluate_with_mode(grid, x, y, z, rules, mode)
    }

    #[test]
    fn test_split_units_covers_every_cell_once() {
        let dims = Dimensions::new(7, 5, 6);
        let mut cells = vec![false; dims.volume()];
        let units = split_units(&mut cells, dims, 3);
        let regions = partition_volume(dims, 3);
        assert_eq!(units.len(), regions.len());

        for (unit, region) in units.into_iter().zip(regions) {
            assert_eq!(unit.region, region);
            assert_eq!(unit.rows.len(), region.x.len() * region.y.len());
            let covered: usize = unit.rows.iter().map(|row| row.len()).sum();
            assert_eq!(covered, region.volume());
            for row in unit.rows {
                row.iter_mut().for_each(|cell| *cell = true);
            }
        }
        assert!(cells.iter().all(|&cell| cell));
    }

    #[test]
    fn test_split_units_places_cells_correctly() {
        let dims = Dimensions::new(4, 3, 5);
        let mut grid = Grid::new(dims);
        let units = split_units(grid.cells_mut(), dims, 2);
        // Mark the cell at (3, 2, 4) through its unit's segments
        for unit in units {
            if unit.region.contains(3, 2, 4) {
                let position = iproduct!(unit.region.x.clone(), unit.region.y.clone())
                    .position(|(x, y)| (x, y) == (3, 2))
                    .unwrap();
                let offset = 4 - unit.region.z.start;
                let mut rows = unit.rows;
                rows[position][offset] = true;
            }
        }
        assert_eq!(grid.living_cells(), vec![(3, 2, 4)]);
    }

    #[test]
    fn test_single_center_cell_dies() {
        let mut grid = Grid::cube(3);
        grid.set(1, 1, 1, true).unwrap();
        let dirty = Arc::new(DirtyChunks::new(ChunkLayout::new(grid.dimensions(), 39)));

        let next = step_blocking(&pool(), Arc::new(grid), Arc::clone(&dirty), 2, volume_job()).unwrap();
        assert!(next.is_empty());
        assert_eq!(dirty.dirty_coords(), vec![ChunkCoord::new(0, 0, 0)]);
    }

    #[test]
    fn test_matches_sequential_reference() {
        let dims = Dimensions::new(13, 9, 11);
        let grid = random_grid(dims, 17, 0.3);
        let expected = evolve(&grid, &RuleSet::default(), EvaluationMode::Volume);

        for thread_size in [1, 4, 5, 39] {
            let dirty = Arc::new(DirtyChunks::new(ChunkLayout::new(dims, 4)));
            let next = step_blocking(&pool(), Arc::new(grid.clone()), dirty, thread_size, volume_job()).unwrap();
            assert_eq!(next, expected, "thread size {}", thread_size);
        }
    }

    #[test]
    fn test_planar_matches_sequential_reference() {
        let dims = Dimensions::cube(8);
        let grid = random_grid(dims, 3, 0.4);
        let job = StepJob::new(RuleSet::default(), EvaluationMode::Planar);
        let expected = evolve(&grid, &job.rules, job.mode);

        let dirty = Arc::new(DirtyChunks::new(ChunkLayout::new(dims, 3)));
        let next = step_blocking(&pool(), Arc::new(grid), dirty, 3, job).unwrap();
        assert_eq!(next, expected);
    }

    #[test]
    fn test_dirty_marks_only_changed_chunks() {
        let dims = Dimensions::cube(8);
        let layout = ChunkLayout::new(dims, 4);
        let mut grid = Grid::new(dims);
        // Stable flat plate entirely inside chunk (0, 0, 0)
        for (x, z) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            grid.set(x, 1, z, true).unwrap();
        }
        // Lone cell in chunk (1, 1, 1) that dies
        grid.set(6, 6, 6, true).unwrap();

        let dirty = Arc::new(DirtyChunks::new(layout));
        let next = step_blocking(&pool(), Arc::new(grid), Arc::clone(&dirty), 3, volume_job()).unwrap();

        assert_eq!(next.living_count(), 4);
        assert_eq!(dirty.dirty_coords(), vec![ChunkCoord::new(1, 1, 1)]);
    }

    #[test]
    fn test_working_buffer_is_overwritten_and_returned() {
        let mut grid = Grid::cube(6);
        grid.set(0, 0, 0, true).unwrap();
        let dims = grid.dimensions();
        let dirty = Arc::new(DirtyChunks::new(ChunkLayout::new(dims, 6)));

        let mut working = Grid::new(dims);
        working.set(5, 5, 5, true).unwrap();
        let mut handle = launch_step(&pool(), Arc::new(grid), working, dirty, 4, volume_job());
        assert_eq!(handle.units(), 8);
        handle.wait();
        assert!(handle.is_ready());

        let (next, report) = handle.finish().unwrap();
        assert_eq!(report.units, 8);
        assert_eq!(report.changed_cells, 1);
        assert!(next.is_empty());
    }

    #[test]
    fn test_mismatched_working_buffer_is_replaced() {
        let mut grid = Grid::cube(4);
        grid.set(1, 1, 1, true).unwrap();
        let dirty = Arc::new(DirtyChunks::new(ChunkLayout::new(grid.dimensions(), 4)));

        let handle = launch_step(&pool(), Arc::new(grid), Grid::cube(0), dirty, 2, volume_job());
        let (next, _) = handle.finish().unwrap();
        assert_eq!(next.dimensions(), Dimensions::cube(4));
        assert!(next.is_empty());
    }

    #[test]
    fn test_failing_unit_fails_step() {
        let grid = random_grid(Dimensions::cube(6), 8, 0.3);
        let dirty = Arc::new(DirtyChunks::new(ChunkLayout::new(grid.dimensions(), 3)));
        let job = volume_job().with_evaluator(explode_at_origin);

        let error = step_blocking(&pool(), Arc::new(grid), dirty, 3, job).unwrap_err();
        match error {
            SimulationError::WorkerFailed { unit, message } => {
                assert_eq!(unit, 0);
                assert!(message.contains("origin"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
