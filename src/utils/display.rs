//! Display and output formatting utilities

use crate::game_of_life::Grid;
use crate::simulation::{SchedulerState, SimulationStats};
use std::io::Write;
use std::time::{Duration, Instant};

/// Format worlds and run statistics for the console
pub struct WorldFormatter;

impl WorldFormatter {
    /// Format a layer with x/z coordinates
    pub fn format_layer_with_coords(grid: &Grid, y: usize) -> String {
        let mut output = String::new();

        output.push_str(&format!("y = {}\n", y));
        output.push_str("   ");
        for z in 0..grid.z_size() {
            output.push_str(&format!("{:2}", z % 10));
        }
        output.push('\n');

        for (x, row) in grid.layer(y).into_iter().enumerate() {
            output.push_str(&format!("{:2} ", x));
            for alive in row {
                output.push_str(if alive { "██" } else { "··" });
            }
            output.push('\n');
        }

        output
    }

    /// Living cell count per layer, top layer first
    pub fn format_layer_summary(grid: &Grid) -> String {
        let mut output = String::new();
        output.push_str("Layer | Living\n");
        output.push_str("------|-------\n");
        for y in (0..grid.y_size()).rev() {
            let living = grid.layer(y).iter().flatten().filter(|alive| **alive).count();
            output.push_str(&format!("{:5} | {:6}\n", y, living));
        }
        output
    }

    /// Human-readable run statistics
    pub fn format_stats(stats: &SimulationStats, grid: &Grid) -> String {
        let mut output = String::new();
        let volume = grid.dimensions().volume();
        let density = if volume > 0 {
            stats.living_cells as f64 / volume as f64 * 100.0
        } else {
            0.0
        };

        output.push_str("=== Simulation Statistics ===\n");
        output.push_str(&format!("World: {}\n", grid.dimensions()));
        output.push_str(&format!("Generation: {}\n", stats.generation));
        output.push_str(&format!("Living Cells: {} ({:.2}%)\n", stats.living_cells, density));
        output.push_str(&format!("Cells Changed (last step): {}\n", stats.last_changed_cells));
        output.push_str(&format!(
            "Mesh Updates: {} ({} chunk uploads)\n",
            stats.mesh_updates_completed, stats.meshes_uploaded
        ));
        if let Some(ms) = stats.last_computation_ms {
            output.push_str(&format!("Last Computation: {}ms\n", ms));
        }
        if let Some(ms) = stats.last_mesh_ms {
            output.push_str(&format!("Last Mesh Update: {}ms\n", ms));
        }

        output
    }

    /// One-line scheduler status
    pub fn format_state(state: &SchedulerState) -> String {
        let flag = |set: bool| if set { "yes" } else { "no" };
        format!(
            "busy: {} | next: pending={} running={} | cubes: pending={} running={}",
            flag(state.busy()),
            flag(state.next_pending),
            flag(state.next_in_progress),
            flag(state.cubes_update_pending),
            flag(state.cubes_update_in_progress)
        )
    }
}

/// Single console line tracking generations completed in a run
pub struct GenerationProgress {
    total: usize,
    done: usize,
    started: Instant,
    last_drawn: Option<Instant>,
}

impl GenerationProgress {
    const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            started: Instant::now(),
            last_drawn: None,
        }
    }

    /// Record a published generation, redrawing at most every 100ms
    pub fn advance(&mut self, generation: usize) {
        self.done = generation.min(self.total);
        let now = Instant::now();
        if self.last_drawn.map_or(true, |at| now.duration_since(at) >= Self::REDRAW_INTERVAL) {
            print!("\r{}", self.status_line());
            std::io::stdout().flush().ok();
            self.last_drawn = Some(now);
        }
    }

    fn status_line(&self) -> String {
        let secs = self.started.elapsed().as_secs_f64();
        let rate = if secs > 0.0 { self.done as f64 / secs } else { 0.0 };
        format!(
            "Generation {}/{} ({:.1} gen/s)",
            self.done, self.total, rate
        )
    }

    /// Overwrite the progress line with the final tally
    pub fn finish(self) {
        println!(
            "\rGenerations: {} in {:.2}s",
            self.done,
            self.started.elapsed().as_secs_f64()
        );
    }
}

/// Message classes of the console host, each with its ANSI colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Failure,
}

impl Tone {
    fn ansi(self) -> u8 {
        match self {
            Tone::Failure => 31,
            Tone::Success => 32,
            Tone::Warning => 33,
            Tone::Info => 34,
        }
    }

    /// Wrap `text` in this tone's colour unless `NO_COLOR` is set or the
    /// terminal is dumb
    pub fn paint(self, text: &str) -> String {
        let plain = std::env::var_os("NO_COLOR").is_some()
            || std::env::var("TERM").map_or(false, |term| term == "dumb");
        if plain {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", self.ansi(), text)
        }
    }
}
