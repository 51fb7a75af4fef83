//! Configuration management for the voxel Game of Life simulation

pub mod settings;

pub use settings::{
    Settings, WorldConfig, PartitionConfig, RuntimeConfig, OutputConfig, StatsFormat,
    CliOverrides, DEFAULT_MAX_UNIT_SIZE
};
