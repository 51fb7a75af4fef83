//! Voxel Game of Life core: grid, rules, partitioning and persistence

pub mod grid;
pub mod rules;
pub mod partition;
pub mod io;

pub use grid::{Dimensions, Grid, GridError};
pub use rules::{EvaluationMode, RuleSet};
pub use partition::{partition_axis, partition_volume, ChunkCoord, ChunkLayout, Region};
pub use io::{create_example_worlds, load_world, save_world};
