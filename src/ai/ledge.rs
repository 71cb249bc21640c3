//! Ledge jumps
//!
//! A ledge is a blocked tile that can be hopped over in one motion: from `T`
//! facing `D`, if `T+D` is blocked and `T+2D` is open, the entity lands on
//! `T+2D`. Only evaluated on deliberate input, never by NPC patterns.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::nav::{Direction, GridPosition, WorldGrid};

/// A ledge tile and the only direction it may be jumped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledge {
    pub tile: GridPosition,
    pub direction: Direction,
}

/// Decides whether a leap is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgeRule {
    /// `None`: any blocked tile is leapable in any direction
    one_way: Option<FxHashMap<GridPosition, Direction>>,
}

impl LedgeRule {
    /// Any blocked-then-open pattern is leapable, from any side
    #[must_use]
    pub fn any_direction() -> Self {
        Self::default()
    }

    /// Only the listed ledges are leapable, each in its own direction
    #[must_use]
    pub fn one_way(ledges: impl IntoIterator<Item = Ledge>) -> Self {
        Self {
            one_way: Some(
                ledges
                    .into_iter()
                    .map(|ledge| (ledge.tile, ledge.direction))
                    .collect(),
            ),
        }
    }

    /// Landing tile of a leap from `tile` toward `direction`, if allowed
    #[must_use]
    pub fn can_leap<G: WorldGrid + ?Sized>(
        &self,
        grid: &G,
        tile: GridPosition,
        direction: Direction,
    ) -> Option<GridPosition> {
        let over = tile.step(direction, 1);
        let landing = tile.step(direction, 2);

        if grid.is_open(over) || !grid.is_open(landing) {
            return None;
        }

        if let Some(ledges) = &self.one_way {
            if ledges.get(&over) != Some(&direction) {
                return None;
            }
        }

        Some(landing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::TileGrid;

    fn p(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    fn ledge_row() -> TileGrid {
        // A ledge along row 2 with a gap at x = 2
        TileGrid::from_rows(&[
            ".....", //
            ".....", //
            "##.##", //
            ".....", //
            ".....", //
        ])
    }

    #[test]
    fn test_leap_over_blocked_tile() {
        let grid = ledge_row();
        let rule = LedgeRule::any_direction();

        assert_eq!(rule.can_leap(&grid, p(0, 1), Direction::Down), Some(p(0, 3)));
        // Default rule allows the way back up too
        assert_eq!(rule.can_leap(&grid, p(0, 3), Direction::Up), Some(p(0, 1)));
    }

    #[test]
    fn test_no_leap_over_open_tile() {
        let grid = ledge_row();
        let rule = LedgeRule::any_direction();

        assert_eq!(rule.can_leap(&grid, p(2, 1), Direction::Down), None);
        assert_eq!(rule.can_leap(&grid, p(0, 0), Direction::Right), None);
    }

    #[test]
    fn test_no_leap_onto_blocked_or_outside() {
        let grid = TileGrid::from_rows(&[
            "...", //
            "###", //
            "###", //
        ]);
        let rule = LedgeRule::any_direction();

        assert_eq!(rule.can_leap(&grid, p(1, 0), Direction::Down), None);
        // Out of bounds counts as blocked for the middle tile, but the landing
        // must be inside the grid
        assert_eq!(rule.can_leap(&grid, p(0, 0), Direction::Left), None);
    }

    #[test]
    fn test_one_way_ledges() {
        let grid = ledge_row();
        let rule = LedgeRule::one_way([
            Ledge {
                tile: p(0, 2),
                direction: Direction::Down,
            },
            Ledge {
                tile: p(1, 2),
                direction: Direction::Down,
            },
        ]);

        assert_eq!(rule.can_leap(&grid, p(0, 1), Direction::Down), Some(p(0, 3)));
        assert_eq!(rule.can_leap(&grid, p(0, 3), Direction::Up), None);
        // Blocked but not registered
        assert_eq!(rule.can_leap(&grid, p(3, 1), Direction::Down), None);
    }
}
