//! Trainer sight lines
//!
//! A trainer looks straight ahead along its facing. The first time the player
//! stands in that line, within range and unobstructed, the encounter fires.

use serde::{Deserialize, Serialize};

use crate::nav::{DEFAULT_MAX_EXPANSIONS, Direction, GridPosition, WorldGrid, find_path};

/// How an unobstructed line is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SightMode {
    /// Every tile between the trainer and the target must be open
    #[default]
    Raycast,
    /// Any cardinal path to the target counts, even one bending around walls
    PathProxy,
}

/// One-shot encounter trigger along a cardinal ray.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SightDetector {
    range: i32,
    mode: SightMode,
    spotted: bool,
}

impl SightDetector {
    /// Create a detector that sees `range` tiles ahead
    #[must_use]
    pub fn new(range: i32) -> Self {
        Self {
            range: range.max(0),
            mode: SightMode::default(),
            spotted: false,
        }
    }

    /// Select how obstruction is checked
    #[must_use]
    pub fn with_mode(mut self, mode: SightMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn range(&self) -> i32 {
        self.range
    }

    #[must_use]
    pub fn mode(&self) -> SightMode {
        self.mode
    }

    /// Whether the encounter already fired
    #[must_use]
    pub fn has_spotted(&self) -> bool {
        self.spotted
    }

    /// Re-arm after the encounter was resolved
    pub fn reset(&mut self) {
        self.spotted = false;
    }

    /// Look for `target` from `origin` facing `facing`.
    ///
    /// Returns `true` only on the call that first detects the target; once
    /// spotted, later calls do nothing until [`SightDetector::reset`].
    pub fn check<G: WorldGrid + ?Sized>(
        &mut self,
        grid: &G,
        origin: GridPosition,
        facing: Direction,
        target: GridPosition,
    ) -> bool {
        if self.spotted {
            return false;
        }

        for distance in 1..=self.range {
            let tile = origin.step(facing, distance);

            if tile == target {
                let visible = match self.mode {
                    SightMode::Raycast => true,
                    SightMode::PathProxy => {
                        !find_path(grid, origin, target, false, DEFAULT_MAX_EXPANSIONS).is_empty()
                    }
                };
                if visible {
                    self.spotted = true;
                }
                return visible;
            }

            // The ray stops at the first wall
            if self.mode == SightMode::Raycast && !grid.is_open(tile) {
                return false;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::TileGrid;

    fn p(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    #[test]
    fn test_spots_target_in_line() {
        let grid = TileGrid::new(10, 10);
        let mut sight = SightDetector::new(4);

        assert!(sight.check(&grid, p(2, 2), Direction::Right, p(6, 2)));
        assert!(sight.has_spotted());
    }

    #[test]
    fn test_ignores_target_out_of_line_or_range() {
        let grid = TileGrid::new(10, 10);
        let mut sight = SightDetector::new(4);

        // Beyond range
        assert!(!sight.check(&grid, p(2, 2), Direction::Right, p(7, 2)));
        // Behind
        assert!(!sight.check(&grid, p(2, 2), Direction::Right, p(1, 2)));
        // Off the ray
        assert!(!sight.check(&grid, p(2, 2), Direction::Right, p(4, 3)));
        // Own tile is not on the ray
        assert!(!sight.check(&grid, p(2, 2), Direction::Down, p(2, 2)));
        assert!(!sight.has_spotted());
    }

    #[test]
    fn test_fires_once() {
        let grid = TileGrid::new(10, 10);
        let mut sight = SightDetector::new(3);

        assert!(sight.check(&grid, p(5, 5), Direction::Up, p(5, 3)));
        assert!(!sight.check(&grid, p(5, 5), Direction::Up, p(5, 3)));
        assert!(!sight.check(&grid, p(5, 5), Direction::Up, p(5, 4)));

        sight.reset();
        assert!(sight.check(&grid, p(5, 5), Direction::Up, p(5, 4)));
    }

    #[test]
    fn test_wall_blocks_raycast_but_not_path_proxy() {
        let mut grid = TileGrid::new(10, 10);
        grid.set_blocked(p(4, 2), true);

        let mut ray = SightDetector::new(5);
        assert!(!ray.check(&grid, p(2, 2), Direction::Right, p(6, 2)));

        // The path bends around the wall, which the proxy accepts
        let mut proxy = SightDetector::new(5).with_mode(SightMode::PathProxy);
        assert!(proxy.check(&grid, p(2, 2), Direction::Right, p(6, 2)));
    }

    #[test]
    fn test_path_proxy_needs_a_path() {
        let grid = TileGrid::from_rows(&[
            "..#..", //
            "..#..", //
            "..#..", //
        ]);
        let mut proxy = SightDetector::new(4).with_mode(SightMode::PathProxy);

        assert!(!proxy.check(&grid, p(0, 1), Direction::Right, p(4, 1)));
        assert!(!proxy.has_spotted());
    }
}
