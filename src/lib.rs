//! Voxel Game of Life
//!
//! A 3D cellular automaton whose generations are computed in parallel over
//! disjoint work units, with chunked dirty tracking so only changed chunks
//! are re-meshed. The [`Simulation`] scheduler interleaves stepping and mesh
//! rebuilds without blocking the thread that drives it.

pub mod config;
pub mod game_of_life;
pub mod simulation;
pub mod utils;

pub use config::Settings;
pub use game_of_life::{Dimensions, Grid};
pub use simulation::{Simulation, SimulationError};

use anyhow::{Context, Result};

/// Build a simulation from settings, loading the configured world file or
/// filling a random world of `world.size` at `world.initial_density`
pub fn simulation_from_settings(settings: &Settings) -> Result<Simulation> {
    let simulation = match settings.world.input_file {
        Some(ref path) => {
            let grid = game_of_life::load_world(path)?;
            Simulation::with_grid(settings, grid).context("Failed to create simulation")?
        }
        None => {
            let mut simulation = Simulation::new(settings).context("Failed to create simulation")?;
            let mut rng = match settings.world.seed {
                Some(seed) => fastrand::Rng::with_seed(seed),
                None => fastrand::Rng::new(),
            };
            simulation
                .randomize(settings.world.initial_density, &mut rng)
                .context("Failed to randomize world")?;
            simulation
        }
    };
    Ok(simulation)
}
