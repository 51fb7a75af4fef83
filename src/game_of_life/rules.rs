//! Neighbour-count rules for the 3D Game of Life

use super::Grid;
use itertools::iproduct;
use serde::{Deserialize, Serialize};

/// Largest possible neighbour count in a 26-neighbourhood
pub const MAX_NEIGHBORS: u8 = 26;

/// Survive/birth thresholds. Both ranges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub survive_low: u8,
    pub survive_high: u8,
    pub birth_low: u8,
    pub birth_high: u8,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            survive_low: 2,
            survive_high: 3,
            birth_low: 3,
            birth_high: 3,
        }
    }
}

impl RuleSet {
    pub fn new(survive_low: u8, survive_high: u8, birth_low: u8, birth_high: u8) -> Self {
        Self {
            survive_low,
            survive_high,
            birth_low,
            birth_high,
        }
    }

    /// Check if a cell should be alive in the next generation given its current state and neighbor count
    #[inline]
    pub fn next_state(&self, alive: bool, neighbors: u8) -> bool {
        (self.birth_low..=self.birth_high).contains(&neighbors)
            || (alive && (self.survive_low..=self.survive_high).contains(&neighbors))
    }

    /// Check that every threshold is a reachable neighbour count
    pub fn is_valid(&self) -> bool {
        [self.survive_low, self.survive_high, self.birth_low, self.birth_high]
            .iter()
            .all(|&t| t <= MAX_NEIGHBORS)
    }
}

/// Which evaluator a step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Full 26-neighbourhood rule on every voxel
    Volume,
    /// Only the top layer evolves; lower layers fall one step per generation
    Planar,
}

impl EvaluationMode {
    pub fn from_is_3d(is_3d: bool) -> Self {
        if is_3d {
            EvaluationMode::Volume
        } else {
            EvaluationMode::Planar
        }
    }

    pub fn is_3d(&self) -> bool {
        matches!(self, EvaluationMode::Volume)
    }
}

/// Count living cells among the 26 neighbours, clipped to grid bounds
pub fn count_neighbors(grid: &Grid, x: usize, y: usize, z: usize) -> u8 {
    let (x, y, z) = (x as i64, y as i64, z as i64);
    iproduct!(-1..=1i64, -1..=1i64, -1..=1i64)
        .filter(|&(dx, dy, dz)| (dx, dy, dz) != (0, 0, 0))
        .filter(|&(dx, dy, dz)| grid.get_signed(x + dx, y + dy, z + dz))
        .count() as u8
}

/// Count living cells among the 8 neighbours sharing the cell's Y layer
pub fn count_planar_neighbors(grid: &Grid, x: usize, y: usize, z: usize) -> u8 {
    let (x, y, z) = (x as i64, y as i64, z as i64);
    iproduct!(-1..=1i64, -1..=1i64)
        .filter(|&(dx, dz)| (dx, dz) != (0, 0))
        .filter(|&(dx, dz)| grid.get_signed(x + dx, y, z + dz))
        .count() as u8
}

/// Next state of one voxel under the volume rule
#[inline]
pub fn evaluate(grid: &Grid, x: usize, y: usize, z: usize, rules: &RuleSet) -> bool {
    rules.next_state(grid.get(x, y, z), count_neighbors(grid, x, y, z))
}

/// Next state of one voxel under the planar rule.
///
/// Layers below the top copy the cell directly above them; the top layer
/// runs the rule on its in-plane neighbourhood.
pub fn evaluate_planar(grid: &Grid, x: usize, y: usize, z: usize, rules: &RuleSet) -> bool {
    if y + 1 < grid.y_size() {
        grid.get(x, y + 1, z)
    } else {
        rules.next_state(grid.get(x, y, z), count_planar_neighbors(grid, x, y, z))
    }
}

#[inline]
pub fn evaluate_with_mode(
    grid: &Grid,
    x: usize,
    y: usize,
    z: usize,
    rules: &RuleSet,
    mode: EvaluationMode,
) -> bool {
    match mode {
        EvaluationMode::Volume => evaluate(grid, x, y, z, rules),
        EvaluationMode::Planar => evaluate_planar(grid, x, y, z, rules),
    }
}

/// Evolve the grid one generation on the calling thread.
///
/// Reference implementation for the parallel stepper.
pub fn evolve(current: &Grid, rules: &RuleSet, mode: EvaluationMode) -> Grid {
    let dims = current.dimensions();
    let cells = iproduct!(0..dims.x, 0..dims.y, 0..dims.z)
        .map(|(x, y, z)| evaluate_with_mode(current, x, y, z, rules, mode))
        .collect();

    // Same dimensions and cell count, so this cannot fail
    Grid::from_cells(dims, cells).unwrap_or_else(|_| Grid::new(dims))
}

/// Evolve the grid for multiple generations
pub fn evolve_generations(mut grid: Grid, rules: &RuleSet, mode: EvaluationMode, generations: usize) -> Grid {
    for _ in 0..generations {
        grid = evolve(&grid, rules, mode);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_of_life::Dimensions;

    fn grid_with(size: usize, alive: &[(usize, usize, usize)]) -> Grid {
        let mut grid = Grid::cube(size);
        for &(x, y, z) in alive {
            grid.set(x, y, z, true).unwrap();
        }
        grid
    }

    #[test]
    fn test_rule_logic() {
        let rules = RuleSet::default();
        assert!(rules.next_state(true, 2)); // Survival with 2 neighbors
        assert!(rules.next_state(true, 3)); // Survival with 3 neighbors
        assert!(rules.next_state(false, 3)); // Birth with 3 neighbors
        assert!(!rules.next_state(true, 1)); // Death with 1 neighbor
        assert!(!rules.next_state(true, 4)); // Death with 4 neighbors
        assert!(!rules.next_state(false, 2)); // No birth with 2 neighbors
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let rules = RuleSet::new(4, 6, 5, 7);
        assert!(rules.next_state(true, 4));
        assert!(rules.next_state(true, 6));
        assert!(!rules.next_state(true, 3));
        assert!(rules.next_state(false, 5));
        assert!(rules.next_state(false, 7));
        assert!(!rules.next_state(false, 8));
    }

    #[test]
    fn test_rule_validation() {
        assert!(RuleSet::default().is_valid());
        assert!(RuleSet::new(0, 26, 26, 26).is_valid());
        assert!(!RuleSet::new(2, 27, 3, 3).is_valid());
    }

    #[test]
    fn test_neighbor_counting_clips_to_bounds() {
        let mut grid = Grid::cube(3);
        for (x, y, z) in iproduct!(0..3, 0..3, 0..3) {
            grid.set(x, y, z, true).unwrap();
        }

        assert_eq!(count_neighbors(&grid, 1, 1, 1), 26);
        assert_eq!(count_neighbors(&grid, 0, 0, 0), 7); // Corner
        assert_eq!(count_neighbors(&grid, 1, 0, 0), 11); // Edge
        assert_eq!(count_neighbors(&grid, 1, 1, 0), 17); // Face
    }

    #[test]
    fn test_single_cell_dies() {
        // 3x3x3, lone center cell: it has 0 neighbours, each neighbour has 1
        let grid = grid_with(3, &[(1, 1, 1)]);
        let next = evolve(&grid, &RuleSet::default(), EvaluationMode::Volume);
        assert!(next.is_empty());
    }

    #[test]
    fn test_birth_from_three_neighbors() {
        let grid = grid_with(3, &[(0, 1, 1), (2, 1, 1), (1, 1, 0)]);
        assert_eq!(count_neighbors(&grid, 1, 1, 1), 3);
        assert!(evaluate(&grid, 1, 1, 1, &RuleSet::default()));
    }

    #[test]
    fn test_result_depends_only_on_count() {
        // Two different arrangements with the same neighbour count agree
        let rules = RuleSet::default();
        let a = grid_with(3, &[(0, 0, 0), (2, 2, 2), (0, 2, 0)]);
        let b = grid_with(3, &[(1, 0, 1), (1, 2, 1), (2, 1, 0)]);
        assert_eq!(count_neighbors(&a, 1, 1, 1), count_neighbors(&b, 1, 1, 1));
        assert_eq!(evaluate(&a, 1, 1, 1, &rules), evaluate(&b, 1, 1, 1, &rules));
        assert_eq!(evaluate(&a, 1, 1, 1, &rules), evaluate(&a, 1, 1, 1, &rules));
    }

    #[test]
    fn test_planar_layers_fall() {
        let mut grid = Grid::new(Dimensions::new(3, 3, 3));
        grid.set(0, 1, 0, true).unwrap();
        let next = evolve(&grid, &RuleSet::default(), EvaluationMode::Planar);

        // The middle-layer cell moved down one layer
        assert!(next.get(0, 0, 0));
        assert!(!next.get(0, 1, 0));
    }

    #[test]
    fn test_planar_top_layer_blinker() {
        let mut grid = Grid::cube(5);
        let top = 4;
        for z in 1..4 {
            grid.set(2, top, z, true).unwrap();
        }

        let next = evolve(&grid, &RuleSet::default(), EvaluationMode::Planar);
        // The blinker rotates in the top plane
        assert!(next.get(1, top, 2));
        assert!(next.get(2, top, 2));
        assert!(next.get(3, top, 2));
        assert!(!next.get(2, top, 1));
        // The previous top layer was copied one layer down
        for z in 1..4 {
            assert!(next.get(2, top - 1, z));
        }
    }

    #[test]
    fn test_evolve_generations() {
        let grid = grid_with(4, &[(1, 1, 1)]);
        let evolved = evolve_generations(grid.clone(), &RuleSet::default(), EvaluationMode::Volume, 0);
        assert_eq!(evolved, grid);
        let evolved = evolve_generations(grid, &RuleSet::default(), EvaluationMode::Volume, 2);
        assert!(evolved.is_empty());
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(EvaluationMode::from_is_3d(true), EvaluationMode::Volume);
        assert_eq!(EvaluationMode::from_is_3d(false), EvaluationMode::Planar);
        assert!(!EvaluationMode::Planar.is_3d());
    }
}
