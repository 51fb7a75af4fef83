//! Concurrent simulation core: parallel stepping, dirty tracking, mesh
//! rebuilds and the scheduler that interleaves them

pub mod dirty;
pub mod engine;
pub mod error;
pub mod mesh;
pub mod scheduler;
pub mod stepper;
pub mod tasks;
pub mod telemetry;

pub use dirty::DirtyChunks;
pub use engine::Simulation;
pub use error::SimulationError;
pub use mesh::{ChunkGeometry, CubeMeshBuilder, MeshBuilder, MeshCache, MeshUploader};
pub use scheduler::{Phase, Request, SchedulerState};
pub use stepper::{step_blocking, Evaluator, StepJob};
pub use telemetry::{LogTelemetry, MemoryTelemetry, SimulationStats, TelemetryEvent, TelemetrySink};
