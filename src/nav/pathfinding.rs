//! A* pathfinding on a tile grid
//!
//! Cardinal and diagonal search over any [`WorldGrid`], with a fallback for
//! blocked goals and a hard expansion budget. Every failure is reported as an
//! empty [`Path`].

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f32::consts::SQRT_2;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::grid::{GridPosition, WorldGrid};

/// Default search budget (expanded nodes)
pub const DEFAULT_MAX_EXPANSIONS: usize = 4096;

const CARDINAL_STEPS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];
const DIAGONAL_STEPS: [(i32, i32); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

// ============================================================================
// Path
// ============================================================================

/// Tiles from start to goal, both inclusive.
///
/// Immutable once built. Clones share the same tile buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    tiles: Arc<[GridPosition]>,
}

impl Path {
    /// The "no path" outcome
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an already-connected tile sequence
    #[must_use]
    pub fn from_tiles(tiles: Vec<GridPosition>) -> Self {
        Self {
            tiles: tiles.into(),
        }
    }

    /// Check if no path was found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of tiles, including start and goal
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// First tile
    #[must_use]
    pub fn start(&self) -> Option<GridPosition> {
        self.tiles.first().copied()
    }

    /// Last tile (the goal actually reached)
    #[must_use]
    pub fn goal(&self) -> Option<GridPosition> {
        self.tiles.last().copied()
    }

    /// Tile at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<GridPosition> {
        self.tiles.get(index).copied()
    }

    /// All tiles
    #[must_use]
    pub fn tiles(&self) -> &[GridPosition] {
        &self.tiles
    }

    /// Movement cost: 1 per cardinal step, √2 per diagonal step
    #[must_use]
    pub fn cost(&self) -> f32 {
        self.tiles
            .windows(2)
            .map(|pair| step_cost(pair[0], pair[1]))
            .sum()
    }
}

fn step_cost(from: GridPosition, to: GridPosition) -> f32 {
    if from.x != to.x && from.y != to.y {
        SQRT_2
    } else {
        1.0
    }
}

// ============================================================================
// Search
// ============================================================================

/// A* node for priority queue
#[derive(Debug, Clone, Copy)]
struct Node {
    pos: GridPosition,
    g_cost: f32,
    f_cost: f32,
    /// Insertion order, for stable tie-breaking
    seq: u64,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap: lowest f first, then earliest insertion
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Open tiles reachable in one step from `pos`, in fixed order.
///
/// Diagonal steps require both orthogonal tiles to be open.
fn neighbors<G: WorldGrid + ?Sized>(
    grid: &G,
    pos: GridPosition,
    diagonal: bool,
) -> SmallVec<[GridPosition; 8]> {
    let mut result = SmallVec::new();

    for (dx, dy) in CARDINAL_STEPS {
        let next = pos.offset(dx, dy);
        if grid.is_open(next) {
            result.push(next);
        }
    }

    if diagonal {
        for (dx, dy) in DIAGONAL_STEPS {
            let next = pos.offset(dx, dy);
            if grid.is_open(next)
                && grid.is_open(pos.offset(dx, 0))
                && grid.is_open(pos.offset(0, dy))
            {
                result.push(next);
            }
        }
    }

    result
}

/// Find a path using the A* algorithm.
///
/// Returns an empty path when either endpoint is out of bounds, `start` is
/// blocked, nothing is reachable, or more than `max_expansions` nodes were
/// expanded. A blocked `goal` is replaced by its closest open neighbor.
#[must_use]
pub fn find_path<G: WorldGrid + ?Sized>(
    grid: &G,
    start: GridPosition,
    goal: GridPosition,
    diagonal: bool,
    max_expansions: usize,
) -> Path {
    if !grid.in_bounds(start) || !grid.in_bounds(goal) {
        return Path::empty();
    }

    if !grid.is_open(start) {
        return Path::empty();
    }

    if start == goal {
        return Path::from_tiles(vec![start]);
    }

    let goals: SmallVec<[GridPosition; 8]> = if grid.is_open(goal) {
        smallvec::smallvec![goal]
    } else {
        // Open tiles that can step onto the goal tile
        neighbors(grid, goal, diagonal)
    };

    if goals.is_empty() {
        return Path::empty();
    }

    if goals.contains(&start) {
        return Path::from_tiles(vec![start]);
    }

    let heuristic = |pos: GridPosition| -> f32 {
        goals
            .iter()
            .map(|&target| {
                if diagonal {
                    pos.euclidean(target)
                } else {
                    pos.manhattan(target) as f32
                }
            })
            .fold(f32::MAX, f32::min)
    };

    let mut open_set = BinaryHeap::new();
    let mut came_from: FxHashMap<GridPosition, GridPosition> = FxHashMap::default();
    let mut g_score: FxHashMap<GridPosition, f32> = FxHashMap::default();
    let mut closed: FxHashSet<GridPosition> = FxHashSet::default();
    let mut seq = 0u64;
    let mut expansions = 0usize;

    g_score.insert(start, 0.0);
    open_set.push(Node {
        pos: start,
        g_cost: 0.0,
        f_cost: heuristic(start),
        seq,
    });

    while let Some(current) = open_set.pop() {
        if !closed.insert(current.pos) {
            continue;
        }

        if goals.contains(&current.pos) {
            return reconstruct(&came_from, current.pos);
        }

        expansions += 1;
        if expansions > max_expansions {
            log::debug!(
                "A* budget of {} expansions exhausted searching {} -> {}",
                max_expansions,
                start,
                goal
            );
            return Path::empty();
        }

        for next in neighbors(grid, current.pos, diagonal) {
            if closed.contains(&next) {
                continue;
            }

            let tentative_g = current.g_cost + step_cost(current.pos, next);

            if tentative_g < *g_score.get(&next).unwrap_or(&f32::MAX) {
                came_from.insert(next, current.pos);
                g_score.insert(next, tentative_g);

                seq += 1;
                open_set.push(Node {
                    pos: next,
                    g_cost: tentative_g,
                    f_cost: tentative_g + heuristic(next),
                    seq,
                });
            }
        }
    }

    // No path found
    Path::empty()
}

fn reconstruct(came_from: &FxHashMap<GridPosition, GridPosition>, end: GridPosition) -> Path {
    let mut tiles = vec![end];
    let mut curr = end;

    while let Some(&prev) = came_from.get(&curr) {
        tiles.push(prev);
        curr = prev;
    }

    tiles.reverse();
    Path::from_tiles(tiles)
}
