//! Grid navigation
//!
//! Tile grid contract, A* pathfinding, and path caching.

mod cache;
mod grid;
mod pathfinding;

pub use cache::{CacheStats, PathCache};
pub use grid::{Direction, GridPosition, TileGrid, TileMetrics, WorldGrid};
pub use pathfinding::{DEFAULT_MAX_EXPANSIONS, Path, find_path};
