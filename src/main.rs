//! Headless host for the voxel Game of Life simulation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use voxel_life::{
    config::{CliOverrides, Settings, StatsFormat},
    game_of_life::{create_example_worlds, load_world, rules::evolve_generations, save_world},
    simulation_from_settings,
    utils::{GenerationProgress, Tone, WorldFormatter},
    Simulation,
};

#[derive(Parser)]
#[command(name = "voxel_life")]
#[command(about = "3D Game of Life simulator with parallel stepping and chunked meshing")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation for a number of generations
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Number of generations (overrides config)
        #[arg(short, long)]
        generations: Option<usize>,

        /// Edge length of a random cubic world (overrides config)
        #[arg(short, long)]
        size: Option<usize>,

        /// Initial density of a random world (overrides config)
        #[arg(short, long)]
        density: Option<f32>,

        /// Seed for the random world (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// World file to start from instead of a random world
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to save the final world (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads, 0 for one per core (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Check the result against a sequential run
        #[arg(long)]
        verify: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Create example configuration and world files
    Setup {
        /// Directory to create files in
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Print one layer of a world file
    Show {
        /// World file
        world: PathBuf,

        /// Layer to print, defaults to the top one
        #[arg(short, long)]
        layer: Option<usize>,

        /// Print living cells per layer instead of a single layer
        #[arg(long)]
        summary: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config, generations, size, density, seed,
            input, output, threads, verify, verbose
        } => {
            init_logging(verbose);
            let overrides = CliOverrides {
                generations,
                size,
                density,
                seed,
                input_file: input,
                world_file: output,
                worker_threads: threads,
            };
            run_command(config, overrides, verify, verbose)
        }
        Commands::Setup { directory, force } => {
            init_logging(false);
            setup_command(directory, force)
        }
        Commands::Show { world, layer, summary } => {
            init_logging(false);
            show_command(world, layer, summary)
        }
    }
}

/// Poll the scheduler until nothing is running or pending
fn drive_until_idle(simulation: &mut Simulation) -> Result<()> {
    loop {
        simulation.update().context("Simulation update failed")?;
        let state = simulation.state();
        if !state.busy() && !state.next_pending && !state.cubes_update_pending {
            return Ok(());
        }
        std::thread::yield_now();
    }
}

fn run_command(config_path: PathBuf, overrides: CliOverrides, verify: bool, verbose: bool) -> Result<()> {
    println!("{}", Tone::Info.paint("🧊 Starting voxel Game of Life"));

    let mut settings = if config_path.exists() {
        Settings::from_file(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        println!("{}", Tone::Warning.paint(&format!(
            "Config file {} not found, using defaults", config_path.display()
        )));
        Settings::default()
    };

    settings.merge_with_cli(&overrides);
    settings.validate()
        .context("Configuration validation failed")?;

    if verbose {
        println!("Configuration:");
        println!("  Rules: survive {}..={}, birth {}..={}",
                 settings.rules.survive_low, settings.rules.survive_high,
                 settings.rules.birth_low, settings.rules.birth_high);
        println!("  Mode: {:?}", settings.evaluation_mode());
        println!("  Generations: {}", settings.runtime.generations);
        println!("  Thread size: {}, chunk size: {}",
                 settings.partition.thread_size, settings.partition.chunk_size);
        println!();
    }

    let mut simulation = simulation_from_settings(&settings)?;
    let initial = verify.then(|| simulation.world().clone());
    println!("World: {} with {} living cells", simulation.dimensions(), simulation.world().living_count());

    let build_meshes = settings.runtime.build_meshes;
    if build_meshes {
        simulation.schedule_cubes_update();
        drive_until_idle(&mut simulation)?;
    }

    let generations = settings.runtime.generations;
    let start_time = Instant::now();
    let mut progress = GenerationProgress::new(generations);
    for generation in 1..=generations {
        simulation.schedule_next();
        if build_meshes {
            simulation.schedule_cubes_update();
        }
        drive_until_idle(&mut simulation)?;
        progress.advance(generation);
        if verbose {
            log::debug!("{}", WorldFormatter::format_state(&simulation.state()));
        }
    }
    progress.finish();
    let total_time = start_time.elapsed();

    println!("{}", Tone::Success.paint(&format!(
        "✅ Ran {} generation(s) in {:.3}s",
        generations,
        total_time.as_secs_f64()
    )));

    if let Some(initial) = initial {
        let expected = evolve_generations(initial, &settings.rules, settings.evaluation_mode(), generations);
        if &expected == simulation.world() {
            println!("{}", Tone::Success.paint("✅ Parallel result matches sequential run"));
        } else {
            println!("{}", Tone::Failure.paint("❌ Parallel result differs from sequential run"));
            anyhow::bail!("Verification failed after {} generations", generations);
        }
    }

    if let Some(ref path) = settings.output.world_file {
        save_world(simulation.world(), path)
            .with_context(|| format!("Failed to save world to {}", path.display()))?;
        println!("💾 World saved to {}", path.display());
    }

    let stats = simulation.stats();
    match settings.output.stats_format {
        StatsFormat::Text => println!("\n{}", WorldFormatter::format_stats(&stats, simulation.world())),
        StatsFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)
            .context("Failed to serialize statistics")?),
    }

    simulation.quit();
    Ok(())
}

fn setup_command(directory: PathBuf, force: bool) -> Result<()> {
    println!("{}", Tone::Info.paint("🛠️  Setting up project structure..."));

    let config_dir = directory.join("config");
    let worlds_dir = directory.join("worlds");
    let output_dir = directory.join("output");

    for dir in [&config_dir, &worlds_dir, &output_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let config_path = config_dir.join("default.yaml");
    if !config_path.exists() || force {
        Settings::default().to_file(&config_path)
            .context("Failed to create default configuration")?;
        println!("Created: {}", config_path.display());
    } else {
        println!("Skipped: {} (already exists)", config_path.display());
    }

    create_example_worlds(&worlds_dir)
        .context("Failed to create example worlds")?;
    println!("Created example worlds in: {}", worlds_dir.display());

    let examples_dir = config_dir.join("examples");
    std::fs::create_dir_all(&examples_dir)?;

    // Small seeded world, handy for quick checks
    let mut small_config = Settings::default();
    small_config.world.size = 16;
    small_config.world.initial_density = 0.2;
    small_config.world.seed = Some(42);
    small_config.partition.thread_size = 8;
    small_config.partition.chunk_size = 8;
    small_config.output.world_file = Some(PathBuf::from("output/small.txt"));
    small_config.to_file(&examples_dir.join("small.yaml"))?;

    let mut planar_config = Settings::default();
    planar_config.world.is_3d = false;
    planar_config.world.input_file = Some(PathBuf::from("worlds/planar_blinker.txt"));
    planar_config.runtime.generations = 4;
    planar_config.output.stats_format = StatsFormat::Json;
    planar_config.to_file(&examples_dir.join("planar.yaml"))?;

    println!("Created example configurations in: {}", examples_dir.display());

    println!("\n{}", Tone::Success.paint("✅ Setup complete!"));
    println!("\nNext steps:");
    println!("1. Edit configuration files in {}", config_dir.display());
    println!("2. Add your own worlds to {}", worlds_dir.display());
    println!("3. Run: cargo run -- run --config config/default.yaml");

    Ok(())
}

fn show_command(world_path: PathBuf, layer: Option<usize>, summary: bool) -> Result<()> {
    let grid = load_world(&world_path)
        .with_context(|| format!("Failed to load world from {}", world_path.display()))?;

    println!("World {} ({} living cells)", grid.dimensions(), grid.living_count());

    if summary {
        println!("{}", WorldFormatter::format_layer_summary(&grid));
        return Ok(());
    }

    let top = grid.y_size().saturating_sub(1);
    let y = layer.unwrap_or(top);
    if y >= grid.y_size() {
        anyhow::bail!("Layer {} out of range, world has {} layers", y, grid.y_size());
    }
    println!("{}", WorldFormatter::format_layer_with_coords(&grid, y));

    Ok(())
}
