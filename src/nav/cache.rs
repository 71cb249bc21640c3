//! Path memoization
//!
//! Stores computed paths between tiles so repeated journeys (patrol legs,
//! wander trips back and forth) skip the search. The cache has no view of the
//! grid: whoever owns the grid must call [`PathCache::clear`] after changing
//! any tile's blocking state.

use rustc_hash::FxHashMap;

use super::grid::{GridPosition, WorldGrid};
use super::pathfinding::{DEFAULT_MAX_EXPANSIONS, Path, find_path};

/// Cache key: start, goal, and whether diagonal steps were allowed
type PathKey = (GridPosition, GridPosition, bool);

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that ran a search
    pub misses: u64,
}

/// Memoized (start, goal) → [`Path`] lookups.
///
/// Entries never expire on their own. Empty results are cached as well.
#[derive(Debug, Clone)]
pub struct PathCache {
    paths: FxHashMap<PathKey, Path>,
    max_expansions: usize,
    stats: CacheStats,
}

impl PathCache {
    /// Create an empty cache using the given search budget on misses
    #[must_use]
    pub fn new(max_expansions: usize) -> Self {
        Self {
            paths: FxHashMap::default(),
            max_expansions,
            stats: CacheStats::default(),
        }
    }

    /// Return the cached path, or search and remember the result
    pub fn get_or_compute<G: WorldGrid + ?Sized>(
        &mut self,
        grid: &G,
        start: GridPosition,
        goal: GridPosition,
        diagonal: bool,
    ) -> Path {
        if let Some(path) = self.paths.get(&(start, goal, diagonal)) {
            self.stats.hits += 1;
            return path.clone();
        }

        self.stats.misses += 1;
        let path = find_path(grid, start, goal, diagonal, self.max_expansions);
        self.paths.insert((start, goal, diagonal), path.clone());
        path
    }

    /// Drop a single entry
    pub fn invalidate(&mut self, start: GridPosition, goal: GridPosition, diagonal: bool) {
        self.paths.remove(&(start, goal, diagonal));
    }

    /// Drop every entry. Call whenever the grid's blocking state changes.
    pub fn clear(&mut self) {
        if !self.paths.is_empty() {
            log::debug!("Clearing {} cached paths", self.paths.len());
        }
        self.paths.clear();
    }

    /// Search budget used on misses
    #[must_use]
    pub fn max_expansions(&self) -> usize {
        self.max_expansions
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Hit/miss counters since creation
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXPANSIONS)
    }
}
