//! File I/O operations for voxel worlds

use super::{Dimensions, Grid};
use anyhow::{Context, Result};
use std::path::Path;

/// Load a world from a text file
///
/// Format: three lines holding the X, Y and Z extents, then one line per
/// `(x, y)` pair in x-major order, each holding Z characters where '1' is
/// alive and '0' is dead.
pub fn load_world<P: AsRef<Path>>(path: P) -> Result<Grid> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read world file: {}", path.as_ref().display()))?;

    parse_world(&content)
        .with_context(|| format!("Failed to parse world from file: {}", path.as_ref().display()))
}

fn parse_extent(line: Option<&str>, axis: char) -> Result<usize> {
    let line = line.with_context(|| format!("Missing {} extent in world header", axis))?;
    line.parse::<usize>()
        .with_context(|| format!("Invalid {} extent '{}' in world header", axis, line))
}

/// Parse a world from its string representation
pub fn parse_world(content: &str) -> Result<Grid> {
    let mut lines = content.lines().map(|line| line.trim());

    let x_size = parse_extent(lines.next(), 'X')?;
    let y_size = parse_extent(lines.next(), 'Y')?;
    let z_size = parse_extent(lines.next(), 'Z')?;
    let dimensions = Dimensions::new(x_size, y_size, z_size);

    let expected_rows = x_size
        .checked_mul(y_size)
        .context("World extents overflow")?;
    let volume = dimensions.checked_volume().context("World extents overflow")?;

    let rows: Vec<&str> = lines.filter(|line| !line.is_empty()).collect();
    if z_size > 0 && rows.len() != expected_rows {
        anyhow::bail!(
            "World body has {} rows, expected {} for a {} world",
            rows.len(),
            expected_rows,
            dimensions
        );
    }

    // Every cell takes at least one byte of input
    let mut cells = Vec::with_capacity(volume.min(content.len()));
    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != z_size {
            anyhow::bail!(
                "Row {} has length {}, expected {} (all rows must have the same length)",
                row_idx,
                row.len(),
                z_size
            );
        }

        for (col_idx, ch) in row.chars().enumerate() {
            match ch {
                '0' => cells.push(false),
                '1' => cells.push(true),
                _ => anyhow::bail!(
                    "Invalid character '{}' at position ({}, {}). Only '0' and '1' are allowed",
                    ch,
                    row_idx,
                    col_idx
                ),
            }
        }
    }

    Ok(Grid::from_cells(dimensions, cells)?)
}

/// Save a world to a text file
pub fn save_world<P: AsRef<Path>>(grid: &Grid, path: P) -> Result<()> {
    let content = world_to_string(grid);

    // Create parent directories if they don't exist
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write world to file: {}", path.as_ref().display()))?;

    Ok(())
}

/// Convert a world to its string representation
pub fn world_to_string(grid: &Grid) -> String {
    let dims = grid.dimensions();
    let mut result = String::with_capacity(32 + dims.x * dims.y * (dims.z + 1));

    result.push_str(&format!("{}\n{}\n{}\n", dims.x, dims.y, dims.z));
    for x in 0..dims.x {
        for y in 0..dims.y {
            for z in 0..dims.z {
                result.push(if grid.get(x, y, z) { '1' } else { '0' });
            }
            result.push('\n');
        }
    }

    result
}

/// Create example world files
pub fn create_example_worlds<P: AsRef<Path>>(output_dir: P) -> Result<()> {
    let dir = output_dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    // Lone cell, dies after one generation
    let mut single = Grid::cube(3);
    single.set(1, 1, 1, true)?;
    save_world(&single, dir.join("single.txt")).context("Failed to write single.txt")?;

    // Flat 2x2 plate: every cell has 3 neighbours, still life under 2-3/3
    let mut plate = Grid::cube(4);
    for (x, z) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
        plate.set(x, 1, z, true)?;
    }
    save_world(&plate, dir.join("plate.txt")).context("Failed to write plate.txt")?;

    // Top-layer blinker for the planar mode
    let mut blinker = Grid::cube(5);
    for z in 1..4 {
        blinker.set(2, 4, z, true)?;
    }
    save_world(&blinker, dir.join("planar_blinker.txt")).context("Failed to write planar_blinker.txt")?;

    Ok(())
}
