//! Configuration settings for the voxel Game of Life simulation

use crate::game_of_life::{EvaluationMode, RuleSet};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Historical cap on both unit sizes, sized for a fixed vertex buffer
pub const DEFAULT_MAX_UNIT_SIZE: usize = 39;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub rules: RuleSet,
    pub world: WorldConfig,
    pub partition: PartitionConfig,
    pub runtime: RuntimeConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    pub size: usize,
    pub is_3d: bool,
    pub initial_density: f32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub input_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Edge length of a parallel work unit
    pub thread_size: usize,
    /// Edge length of a render/dirty-tracking chunk
    pub chunk_size: usize,
    pub max_unit_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Worker pool size; 0 lets the pool pick one thread per core
    pub worker_threads: usize,
    pub generations: usize,
    pub build_meshes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub world_file: Option<PathBuf>,
    pub stats_format: StatsFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsFormat {
    Text,
    Json,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rules: RuleSet::default(),
            world: WorldConfig {
                size: 50,
                is_3d: true,
                initial_density: 0.01,
                seed: None,
                input_file: None,
            },
            partition: PartitionConfig {
                thread_size: 20,
                chunk_size: DEFAULT_MAX_UNIT_SIZE,
                max_unit_size: DEFAULT_MAX_UNIT_SIZE,
            },
            runtime: RuntimeConfig {
                worker_threads: 0,
                generations: 10,
                build_meshes: true,
            },
            output: OutputConfig {
                world_file: None,
                stats_format: StatsFormat::Text,
            },
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a YAML file
    pub fn to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .context("Failed to serialize settings")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if !self.rules.is_valid() {
            anyhow::bail!("Rule thresholds must not exceed 26 neighbours: {:?}", self.rules);
        }

        if self.world.size == 0 {
            anyhow::bail!("World size must be positive");
        }

        if !(0.0..=1.0).contains(&self.world.initial_density) {
            anyhow::bail!("Initial density must be within [0, 1], got {}", self.world.initial_density);
        }

        if self.partition.max_unit_size == 0 {
            anyhow::bail!("Maximum unit size must be positive");
        }

        for (name, value) in [
            ("Thread size", self.partition.thread_size),
            ("Chunk size", self.partition.chunk_size),
        ] {
            if value == 0 || value > self.partition.max_unit_size {
                anyhow::bail!(
                    "{} must be within 1..={}, got {}",
                    name,
                    self.partition.max_unit_size,
                    value
                );
            }
        }

        if let Some(ref input) = self.world.input_file {
            if !input.exists() {
                anyhow::bail!("World input file does not exist: {}", input.display());
            }
        }

        Ok(())
    }

    /// Clamp a requested unit size into `1..=max_unit_size`
    pub fn clamp_unit_size(&self, requested: usize) -> usize {
        requested.clamp(1, self.partition.max_unit_size.max(1))
    }

    pub fn evaluation_mode(&self) -> EvaluationMode {
        EvaluationMode::from_is_3d(self.world.is_3d)
    }

    /// Merge settings with command line overrides
    pub fn merge_with_cli(&mut self, cli_overrides: &CliOverrides) {
        if let Some(generations) = cli_overrides.generations {
            self.runtime.generations = generations;
        }
        if let Some(size) = cli_overrides.size {
            self.world.size = size;
        }
        if let Some(density) = cli_overrides.density {
            self.world.initial_density = density;
        }
        if let Some(seed) = cli_overrides.seed {
            self.world.seed = Some(seed);
        }
        if let Some(ref input) = cli_overrides.input_file {
            self.world.input_file = Some(input.clone());
        }
        if let Some(ref output) = cli_overrides.world_file {
            self.output.world_file = Some(output.clone());
        }
        if let Some(threads) = cli_overrides.worker_threads {
            self.runtime.worker_threads = threads;
        }
    }
}

/// Command line overrides for settings
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub generations: Option<usize>,
    pub size: Option<usize>,
    pub density: Option<f32>,
    pub seed: Option<u64>,
    pub input_file: Option<PathBuf>,
    pub world_file: Option<PathBuf>,
    pub worker_threads: Option<usize>,
}
