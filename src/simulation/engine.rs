//! # Simulation instance
//!
//! [`Simulation`] owns both world buffers, the dirty tracker, the worker pool
//! and the mesh collaborators. The host constructs one, keeps it, and drives
//! it from a single thread.
//!
//! Three ways to drive it:
//!
//! - **Poll**: `schedule_next()` / `schedule_cubes_update()` queue requests
//!   and `update()` advances the state machine without ever blocking.
//! - **Immediate**: `next()` / `update_cubes()` dispatch straight away and are
//!   rejected with [`SimulationError::Busy`] while work is in flight.
//! - **Blocking**: `wait_for_threads()` / `apply_blocks_changes()` park the
//!   caller until outstanding work (and pending requests) are done.
//!
//! Readers only ever see the published world. During a step it still holds
//! the previous generation; the new one replaces it in a single swap.

use super::dirty::DirtyChunks;
use super::error::SimulationError;
use super::mesh::{launch_mesh_update, CubeMeshBuilder, MeshBuilder, MeshCache, MeshHandle, MeshUploader};
use super::scheduler::{Phase, Request, RequestQueue, SchedulerState};
use super::stepper::{launch_step, Evaluator, StepHandle, StepJob};
use super::telemetry::{
    LogTelemetry, SimulationStats, TelemetryEvent, TelemetrySink, COMPUTATION_TIME_MS, MESH_TIME_MS,
};
use crate::config::Settings;
use crate::game_of_life::rules::evaluate_with_mode;
use crate::game_of_life::{ChunkLayout, Dimensions, EvaluationMode, Grid, GridError, RuleSet};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Work currently running on the pool
enum InFlight {
    Idle,
    Step(StepHandle),
    Mesh(MeshHandle),
}

pub struct Simulation<U: MeshUploader = MeshCache> {
    world: Arc<Grid>,
    working: Grid,
    dirty: Arc<DirtyChunks>,
    pool: ThreadPool,
    builder: Arc<dyn MeshBuilder>,
    uploader: U,
    telemetry: Box<dyn TelemetrySink>,
    queue: RequestQueue,
    in_flight: InFlight,
    halted: bool,
    rules: RuleSet,
    mode: EvaluationMode,
    evaluator: Evaluator,
    thread_size: usize,
    chunk_size: usize,
    max_unit_size: usize,
    stats: SimulationStats,
}

fn check_unit_size(name: &'static str, value: usize, max: usize) -> Result<usize, SimulationError> {
    if value == 0 || value > max {
        return Err(SimulationError::InvalidUnitSize { name, value, max });
    }
    Ok(value)
}

impl Simulation<MeshCache> {
    /// Empty cubic world of `settings.world.size`, cube meshes kept in memory
    pub fn new(settings: &Settings) -> Result<Self, SimulationError> {
        Self::with_grid(settings, Grid::cube(settings.world.size))
    }

    pub fn with_grid(settings: &Settings, grid: Grid) -> Result<Self, SimulationError> {
        Self::with_parts(
            settings,
            grid,
            Arc::new(CubeMeshBuilder),
            MeshCache::new(),
            Box::new(LogTelemetry),
        )
    }
}

impl<U: MeshUploader> Simulation<U> {
    /// Assemble a simulation from explicit collaborators.
    ///
    /// Rules, evaluation mode and unit sizes are copied out of `settings`;
    /// later changes go through the setters.
    pub fn with_parts(
        settings: &Settings,
        grid: Grid,
        builder: Arc<dyn MeshBuilder>,
        uploader: U,
        telemetry: Box<dyn TelemetrySink>,
    ) -> Result<Self, SimulationError> {
        let max_unit_size = settings.partition.max_unit_size.max(1);
        let thread_size = check_unit_size("thread size", settings.partition.thread_size, max_unit_size)?;
        let chunk_size = check_unit_size("chunk size", settings.partition.chunk_size, max_unit_size)?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.runtime.worker_threads)
            .thread_name(|i| format!("voxel-life-worker-{}", i))
            .build()?;

        let dimensions = grid.dimensions();
        let layout = ChunkLayout::new(dimensions, chunk_size);
        log::debug!(
            "Simulation created: {} world, {} chunks, {} worker threads",
            dimensions,
            layout.chunk_count(),
            pool.current_num_threads()
        );

        Ok(Self {
            world: Arc::new(grid),
            working: Grid::new(dimensions),
            dirty: Arc::new(DirtyChunks::all_dirty(layout)),
            pool,
            builder,
            uploader,
            telemetry,
            queue: RequestQueue::new(),
            in_flight: InFlight::Idle,
            halted: false,
            rules: settings.rules,
            mode: settings.evaluation_mode(),
            evaluator: evaluate_with_mode,
            thread_size,
            chunk_size,
            max_unit_size,
            stats: SimulationStats::default(),
        })
    }

    // ---- Poll API ----

    /// Request one generation step
    pub fn schedule_next(&mut self) {
        self.queue.schedule(Request::Next);
    }

    /// Request a mesh rebuild of every dirty chunk
    pub fn schedule_cubes_update(&mut self) {
        self.queue.schedule(Request::CubesUpdate);
    }

    /// Advance the state machine. Never blocks.
    ///
    /// Completes finished work (publishing a step or uploading meshes), then
    /// dispatches the earliest pending request if nothing is running.
    pub fn update(&mut self) -> Result<(), SimulationError> {
        self.ensure_running()?;

        if self.complete_in_flight(false)? {
            if let Some(request) = self.queue.pop() {
                self.dispatch(request);
            }
        }
        Ok(())
    }

    // ---- Immediate API ----

    /// Dispatch a generation step now, bypassing the request queue.
    ///
    /// Returns once the work is launched; completion is observed through
    /// `update()` or `wait_for_threads()`.
    pub fn next(&mut self) -> Result<(), SimulationError> {
        self.ensure_running()?;
        if self.is_busy() {
            return Err(self.reject_busy("compute the next generation"));
        }
        self.dispatch(Request::Next);
        Ok(())
    }

    /// Dispatch a mesh rebuild of the dirty chunks now
    pub fn update_cubes(&mut self) -> Result<(), SimulationError> {
        self.ensure_running()?;
        if self.is_busy() {
            return Err(self.reject_busy("update cubes"));
        }
        self.dispatch(Request::CubesUpdate);
        Ok(())
    }

    // ---- Blocking API ----

    /// Block until in-flight work is finished and its results are applied.
    /// Pending requests are left queued.
    pub fn wait_for_threads(&mut self) -> Result<(), SimulationError> {
        self.complete_in_flight(true).map(|_| ())
    }

    /// Block until in-flight work and every pending request have completed
    pub fn apply_blocks_changes(&mut self) -> Result<(), SimulationError> {
        self.ensure_running()?;
        loop {
            self.wait_for_threads()?;
            match self.queue.pop() {
                Some(request) => self.dispatch(request),
                None => return Ok(()),
            }
        }
    }

    // ---- Queries ----

    /// The published world; stable across reads while not busy
    pub fn world(&self) -> &Grid {
        &self.world
    }

    /// Shared handle to the published world, consistent for as long as it
    /// is held even if a swap happens meanwhile
    pub fn snapshot(&self) -> Arc<Grid> {
        Arc::clone(&self.world)
    }

    pub fn dimensions(&self) -> Dimensions {
        self.world.dimensions()
    }

    pub fn phase(&self) -> Phase {
        if self.halted {
            return Phase::Halted;
        }
        match self.in_flight {
            InFlight::Idle => Phase::Idle,
            InFlight::Step(_) => Phase::ComputingNext,
            InFlight::Mesh(_) => Phase::UpdatingCubes,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.phase().is_busy()
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::new(&self.queue, self.phase())
    }

    /// Generations published since the world was last replaced
    pub fn generation(&self) -> u64 {
        self.stats.generation
    }

    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            living_cells: self.world.living_count(),
            ..self.stats.clone()
        }
    }

    pub fn dirty(&self) -> &DirtyChunks {
        &self.dirty
    }

    pub fn chunk_layout(&self) -> ChunkLayout {
        *self.dirty.layout()
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn uploader_mut(&mut self) -> &mut U {
        &mut self.uploader
    }

    pub fn rules(&self) -> RuleSet {
        self.rules
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn thread_size(&self) -> usize {
        self.thread_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    // ---- Edit mode ----

    pub fn is_in_world(&self, x: i64, y: i64, z: i64) -> bool {
        self.world.is_in_world(x, y, z)
    }

    /// Read a voxel of the published world. Out of bounds reads are logged
    /// and return `false`.
    pub fn get_block(&self, x: i64, y: i64, z: i64) -> bool {
        if !self.is_in_world(x, y, z) {
            let error = self.out_of_bounds(x, y, z);
            log::error!("get_block: {}", error);
            self.telemetry.emit(TelemetryEvent::Error(error.to_string()));
            return false;
        }
        self.world.get_signed(x, y, z)
    }

    /// Write a voxel and mark its chunk dirty. Rejected while busy.
    pub fn set_block(&mut self, x: i64, y: i64, z: i64, value: bool) -> Result<(), SimulationError> {
        if self.is_busy() {
            return Err(self.reject_busy("set a block"));
        }
        if !self.is_in_world(x, y, z) {
            let error = self.out_of_bounds(x, y, z);
            log::error!("set_block: {}", error);
            self.telemetry.emit(TelemetryEvent::Error(error.to_string()));
            return Err(error.into());
        }

        let (x, y, z) = (x as usize, y as usize, z as usize);
        // Copies the grid only if a caller still holds a snapshot
        Arc::make_mut(&mut self.world).set(x, y, z, value)?;
        self.dirty.mark_cell(x, y, z);
        Ok(())
    }

    // ---- World management ----

    /// Replace the world, draining in-flight work first. Every chunk becomes
    /// dirty and previously uploaded meshes are dropped.
    pub fn set_world(&mut self, grid: Grid) -> Result<(), SimulationError> {
        self.replace_world(grid)?;
        self.stats.generation = 0;
        Ok(())
    }

    /// Resize to a cube of edge `size`
    pub fn set_size(&mut self, size: usize) -> Result<(), SimulationError> {
        self.resize(Dimensions::cube(size))
    }

    /// Resize the world, keeping overlapping cells (centered when growing)
    /// and queueing a rebuild of every chunk
    pub fn resize(&mut self, dimensions: Dimensions) -> Result<(), SimulationError> {
        self.wait_for_threads()?;
        log::info!("Resizing world from {} to {}", self.dimensions(), dimensions);
        let resized = self.world.resized(dimensions);
        self.replace_world(resized)?;
        self.schedule_cubes_update();
        Ok(())
    }

    /// Replace the world with random cells, each alive with probability `density`
    pub fn randomize(&mut self, density: f32, rng: &mut fastrand::Rng) -> Result<(), SimulationError> {
        let dimensions = self.dimensions();
        let cells = (0..dimensions.volume()).map(|_| rng.f32() < density).collect();
        let grid = Grid::from_cells(dimensions, cells)?;
        log::debug!("Randomized {} world at density {}", dimensions, density);
        self.set_world(grid)
    }

    /// Kill every cell
    pub fn reset(&mut self) -> Result<(), SimulationError> {
        let dimensions = self.dimensions();
        self.set_world(Grid::new(dimensions))
    }

    /// Empty world with one live cell: the center in volume mode, the center
    /// of the top layer in planar mode
    pub fn single_block(&mut self) -> Result<(), SimulationError> {
        let dimensions = self.dimensions();
        let mut grid = Grid::new(dimensions);
        if dimensions.volume() > 0 {
            let y = match self.mode {
                EvaluationMode::Volume => dimensions.y / 2,
                EvaluationMode::Planar => dimensions.y - 1,
            };
            grid.set(dimensions.x / 2, y, dimensions.z / 2, true)?;
        }
        self.set_world(grid)
    }

    pub fn mark_all_for_update(&self) {
        self.dirty.mark_all();
    }

    // ---- Tunables ----

    /// Takes effect from the next dispatched step
    pub fn set_rules(&mut self, rules: RuleSet) {
        self.rules = rules;
    }

    pub fn set_mode(&mut self, mode: EvaluationMode) {
        self.mode = mode;
    }

    /// Replace the per-voxel next-state function used by later steps
    pub fn set_evaluator(&mut self, evaluator: Evaluator) {
        self.evaluator = evaluator;
    }

    pub fn set_thread_size(&mut self, thread_size: usize) -> Result<(), SimulationError> {
        self.thread_size = check_unit_size("thread size", thread_size, self.max_unit_size)?;
        Ok(())
    }

    /// Change the chunk edge, which re-tiles the dirty tracker and drops
    /// every uploaded mesh
    pub fn set_chunk_size(&mut self, chunk_size: usize) -> Result<(), SimulationError> {
        if self.is_busy() {
            return Err(self.reject_busy("change the chunk size"));
        }
        self.chunk_size = check_unit_size("chunk size", chunk_size, self.max_unit_size)?;
        self.rebuild_layout();
        Ok(())
    }

    // ---- Teardown ----

    /// Drop pending requests and wait for in-flight work without applying it
    pub fn quit(&mut self) {
        self.queue.clear();
        match std::mem::replace(&mut self.in_flight, InFlight::Idle) {
            InFlight::Step(mut handle) => handle.wait(),
            InFlight::Mesh(mut handle) => handle.wait(),
            InFlight::Idle => {}
        }
        log::debug!("Simulation drained");
    }

    // ---- Internals ----

    fn ensure_running(&self) -> Result<(), SimulationError> {
        if self.halted {
            return Err(SimulationError::Halted);
        }
        Ok(())
    }

    fn out_of_bounds(&self, x: i64, y: i64, z: i64) -> GridError {
        GridError::OutOfBounds {
            x,
            y,
            z,
            dimensions: self.dimensions(),
        }
    }

    fn reject_busy(&self, operation: &'static str) -> SimulationError {
        let error = SimulationError::Busy { operation };
        log::warn!("{}", error);
        self.telemetry.emit(TelemetryEvent::Warning(error.to_string()));
        error
    }

    fn halt(&mut self, error: SimulationError) -> SimulationError {
        log::error!("{}", error);
        self.telemetry.emit(TelemetryEvent::Error(error.to_string()));
        self.halted = true;
        self.queue.clear();
        error
    }

    fn dispatch(&mut self, request: Request) {
        match request {
            Request::Next => {
                let job = StepJob::new(self.rules, self.mode).with_evaluator(self.evaluator);
                // The working buffer travels with the step and comes back filled
                let working = std::mem::replace(&mut self.working, Grid::new(Dimensions::new(0, 0, 0)));
                let handle = launch_step(
                    &self.pool,
                    Arc::clone(&self.world),
                    working,
                    Arc::clone(&self.dirty),
                    self.thread_size,
                    job,
                );
                self.in_flight = InFlight::Step(handle);
            }
            Request::CubesUpdate => {
                let chunks = self.dirty.dirty_coords();
                if chunks.is_empty() {
                    log::debug!("No dirty chunks to rebuild");
                    return;
                }
                let handle = launch_mesh_update(
                    &self.pool,
                    Arc::clone(&self.builder),
                    Arc::clone(&self.world),
                    *self.dirty.layout(),
                    chunks,
                );
                self.in_flight = InFlight::Mesh(handle);
            }
        }
    }

    /// Apply finished in-flight work. Returns whether the simulation is idle
    /// afterwards.
    fn complete_in_flight(&mut self, block: bool) -> Result<bool, SimulationError> {
        let ready = match &mut self.in_flight {
            InFlight::Idle => return Ok(true),
            InFlight::Step(handle) if block => {
                handle.wait();
                true
            }
            InFlight::Mesh(handle) if block => {
                handle.wait();
                true
            }
            InFlight::Step(handle) => handle.is_ready(),
            InFlight::Mesh(handle) => handle.is_ready(),
        };
        if !ready {
            return Ok(false);
        }

        match std::mem::replace(&mut self.in_flight, InFlight::Idle) {
            InFlight::Step(handle) => self.finish_step(handle)?,
            InFlight::Mesh(handle) => self.finish_mesh(handle)?,
            InFlight::Idle => {}
        }
        Ok(true)
    }

    fn finish_step(&mut self, handle: StepHandle) -> Result<(), SimulationError> {
        let (next, report) = match handle.finish() {
            Ok(finished) => finished,
            Err(error) => return Err(self.halt(error)),
        };

        self.publish(next);
        self.stats.generation += 1;
        self.stats.steps_completed += 1;
        self.stats.last_changed_cells = report.changed_cells;
        self.stats.last_computation_ms = Some(report.elapsed.as_millis());
        log::debug!(
            "Generation {} published: {} cells changed across {} units",
            self.stats.generation,
            report.changed_cells,
            report.units
        );
        self.telemetry.emit(TelemetryEvent::Timing {
            name: COMPUTATION_TIME_MS,
            elapsed: report.elapsed,
        });
        Ok(())
    }

    fn finish_mesh(&mut self, handle: MeshHandle) -> Result<(), SimulationError> {
        let elapsed = handle.elapsed();
        let meshes = match handle.finish() {
            Ok(meshes) => meshes,
            Err(failure) => return Err(self.halt(failure.into())),
        };

        let mut uploaded = 0;
        for (chunk, geometry) in meshes {
            if self.dirty.is_dirty(chunk) {
                self.uploader.upload_mesh(chunk, geometry);
                self.dirty.clear(chunk);
                uploaded += 1;
            }
        }

        self.stats.mesh_updates_completed += 1;
        self.stats.meshes_uploaded += uploaded;
        self.stats.last_mesh_ms = Some(elapsed.as_millis());
        log::debug!("Uploaded {} chunk meshes", uploaded);
        self.telemetry.emit(TelemetryEvent::Timing {
            name: MESH_TIME_MS,
            elapsed,
        });
        Ok(())
    }

    /// Publish a finished generation and recycle the old world as the next
    /// working buffer. A world still held by a snapshot stays with its
    /// holder and a blank buffer takes its place.
    fn publish(&mut self, next: Grid) {
        let previous = std::mem::replace(&mut self.world, Arc::new(next));
        self.working = Arc::try_unwrap(previous).unwrap_or_else(|shared| Grid::new(shared.dimensions()));
    }

    fn replace_world(&mut self, grid: Grid) -> Result<(), SimulationError> {
        self.wait_for_threads()?;
        let dimensions = grid.dimensions();
        self.working = Grid::new(dimensions);
        self.world = Arc::new(grid);
        self.rebuild_layout();
        Ok(())
    }

    fn rebuild_layout(&mut self) {
        let layout = ChunkLayout::new(self.dimensions(), self.chunk_size);
        self.dirty = Arc::new(DirtyChunks::all_dirty(layout));
        self.uploader.clear_meshes();
        log::debug!("Chunk layout rebuilt: {} chunks of edge {}", layout.chunk_count(), self.chunk_size);
    }
}

impl<U: MeshUploader> Drop for Simulation<U> {
    fn drop(&mut self) {
        self.quit();
    }
}
