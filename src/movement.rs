//! Tile-by-tile movement
//!
//! Turns a discrete [`Path`] into continuous per-frame motion. Each entity
//! cycles `Idle -> Moving -> Idle` once per tile; all progress comes from
//! `update(dt)` calls, nothing ever waits.
//!
//! Before each step the next tile is re-checked against the grid, since the
//! world may have changed after the path was computed. Repeated stalls on the
//! same step trigger a fresh search toward the same goal.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::nav::{Direction, GridPosition, Path, PathCache, TileMetrics, WorldGrid};

/// Consecutive stalls before a route is replanned
pub const DEFAULT_STALL_THRESHOLD: u32 = 3;

// ============================================================================
// Configuration
// ============================================================================

/// Movement tuning shared by every entity driven by one controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Consecutive blocked attempts before replanning
    pub stall_threshold: u32,
    /// Tile to pixel conversion
    pub tile_metrics: TileMetrics,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            tile_metrics: TileMetrics::default(),
        }
    }
}

// ============================================================================
// Moving Entity
// ============================================================================

/// Motion phase of a [`MovingEntity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovePhase {
    /// Standing on `tile`
    #[default]
    Idle,
    /// Walking from `tile` toward `target`
    Moving,
    /// Jumping over a ledge toward `target`; cannot be interrupted
    Leaping,
}

/// What happened during a movement update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementEvent {
    /// A single step finished on this tile
    StepCompleted(GridPosition),
    /// The last step of the route finished on this tile
    RouteFinished(GridPosition),
    /// A leap finished on this tile
    Landed(GridPosition),
    /// The next tile of the route is blocked
    Stalled {
        /// The blocked tile
        tile: GridPosition,
        /// Consecutive stalls so far
        stalls: u32,
    },
    /// The route was recomputed after too many stalls
    Replanned {
        /// Goal of the new route
        goal: GridPosition,
    },
    /// Replanning failed; the route was dropped
    GaveUp {
        /// Goal that could not be reached
        goal: GridPosition,
    },
}

#[derive(Debug, Clone)]
struct Route {
    path: Path,
    /// Index of the next tile to enter
    cursor: usize,
    /// Goal originally requested (may differ from the path's last tile)
    goal: GridPosition,
    diagonal: bool,
}

impl Route {
    fn new(path: Path, goal: GridPosition, diagonal: bool) -> Self {
        Self {
            path,
            cursor: 1,
            goal,
            diagonal,
        }
    }

    fn next(&self) -> Option<GridPosition> {
        self.path.get(self.cursor)
    }

    fn is_finished(&self) -> bool {
        self.cursor >= self.path.len()
    }
}

/// Position and motion state of one entity on the grid.
///
/// Only [`MovementController`] mutates this.
#[derive(Debug, Clone)]
pub struct MovingEntity {
    pixel: Vec2,
    tile: GridPosition,
    target: GridPosition,
    /// Tiles per second
    speed: f32,
    facing: Direction,
    phase: MovePhase,
    route: Option<Route>,
    stalls: u32,
}

impl MovingEntity {
    /// Create an idle entity standing at the center of `tile`
    #[must_use]
    pub fn new(tile: GridPosition, speed: f32, metrics: TileMetrics) -> Self {
        Self {
            pixel: metrics.tile_center(tile),
            tile,
            target: tile,
            speed,
            facing: Direction::default(),
            phase: MovePhase::Idle,
            route: None,
            stalls: 0,
        }
    }

    /// Set the initial facing
    #[must_use]
    pub fn with_facing(mut self, facing: Direction) -> Self {
        self.facing = facing;
        self
    }

    /// Advance this entity by one frame
    pub fn update<G: WorldGrid + ?Sized>(
        &mut self,
        dt: f32,
        controller: &MovementController,
        grid: &G,
        cache: &mut PathCache,
    ) -> Option<MovementEvent> {
        controller.update(self, grid, cache, dt)
    }

    /// Current pixel position
    #[must_use]
    pub fn pixel(&self) -> Vec2 {
        self.pixel
    }

    /// Tile the entity stands on (the departure tile while moving)
    #[must_use]
    pub fn tile(&self) -> GridPosition {
        self.tile
    }

    /// Tile currently being walked to (equals `tile` when idle)
    #[must_use]
    pub fn target(&self) -> GridPosition {
        self.target
    }

    /// Speed in tiles per second
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[must_use]
    pub fn facing(&self) -> Direction {
        self.facing
    }

    #[must_use]
    pub fn phase(&self) -> MovePhase {
        self.phase
    }

    /// Whether a step or leap is in progress
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.phase != MovePhase::Idle
    }

    /// Whether a route with steps left (or pending completion) is held
    #[must_use]
    pub fn has_route(&self) -> bool {
        self.route.is_some()
    }

    /// Goal of the current route
    #[must_use]
    pub fn goal(&self) -> Option<GridPosition> {
        self.route.as_ref().map(|route| route.goal)
    }

    /// Tiles of the current route
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.route.as_ref().map(|route| &route.path)
    }

    /// Consecutive stalls on the current step
    #[must_use]
    pub fn stalls(&self) -> u32 {
        self.stalls
    }
}

// ============================================================================
// Movement Controller
// ============================================================================

/// Drives [`MovingEntity`] state: route requests, per-frame interpolation,
/// stall handling and leaps.
#[derive(Debug, Clone, Default)]
pub struct MovementController {
    config: MovementConfig,
}

impl MovementController {
    /// Create a controller
    #[must_use]
    pub fn new(config: MovementConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Spawn an idle entity using this controller's tile metrics
    #[must_use]
    pub fn spawn(&self, tile: GridPosition, speed: f32) -> MovingEntity {
        MovingEntity::new(tile, speed, self.config.tile_metrics)
    }

    /// Request a route to `goal` through the cache.
    ///
    /// Returns `false` (keeping any current route) if the entity is moving or
    /// no path exists.
    pub fn navigate<G: WorldGrid + ?Sized>(
        &self,
        entity: &mut MovingEntity,
        grid: &G,
        cache: &mut PathCache,
        goal: GridPosition,
        diagonal: bool,
    ) -> bool {
        if entity.is_moving() {
            return false;
        }

        let path = cache.get_or_compute(grid, entity.tile, goal, diagonal);
        if path.is_empty() {
            log::trace!("No path {} -> {}", entity.tile, goal);
            return false;
        }

        entity.stalls = 0;
        entity.route = Some(Route::new(path, goal, diagonal));
        true
    }

    /// Queue a single cardinal step to an adjacent open tile, without a search.
    pub fn step_to<G: WorldGrid + ?Sized>(
        &self,
        entity: &mut MovingEntity,
        grid: &G,
        tile: GridPosition,
    ) -> bool {
        if entity.is_moving() || !entity.tile.is_adjacent(tile, false) || !grid.is_open(tile) {
            return false;
        }

        entity.stalls = 0;
        entity.route = Some(Route::new(
            Path::from_tiles(vec![entity.tile, tile]),
            tile,
            false,
        ));
        true
    }

    /// Start an uninterruptible leap to `landing`.
    ///
    /// Drops any route. Nothing between the two tiles is collision checked.
    pub fn leap(&self, entity: &mut MovingEntity, landing: GridPosition) -> bool {
        if entity.is_moving() {
            return false;
        }

        entity.route = None;
        entity.stalls = 0;
        if let Some(facing) =
            Direction::from_delta(landing.x - entity.tile.x, landing.y - entity.tile.y)
        {
            entity.facing = facing;
        }
        entity.target = landing;
        entity.phase = MovePhase::Leaping;
        true
    }

    /// Turn in place. Ignored while moving.
    pub fn face(&self, entity: &mut MovingEntity, direction: Direction) {
        if !entity.is_moving() {
            entity.facing = direction;
        }
    }

    /// Discard the current route. A step already underway still completes.
    pub fn cancel(&self, entity: &mut MovingEntity) {
        entity.route = None;
        entity.stalls = 0;
    }

    /// Advance one frame
    pub fn update<G: WorldGrid + ?Sized>(
        &self,
        entity: &mut MovingEntity,
        grid: &G,
        cache: &mut PathCache,
        dt: f32,
    ) -> Option<MovementEvent> {
        match entity.phase {
            MovePhase::Idle => self.begin_step(entity, grid, cache, dt),
            MovePhase::Moving | MovePhase::Leaping => self.advance(entity, dt),
        }
    }

    fn begin_step<G: WorldGrid + ?Sized>(
        &self,
        entity: &mut MovingEntity,
        grid: &G,
        cache: &mut PathCache,
        dt: f32,
    ) -> Option<MovementEvent> {
        let next = entity.route.as_ref()?.next();

        let Some(next) = next else {
            // Nothing left to walk (single-tile route)
            entity.route = None;
            return Some(MovementEvent::RouteFinished(entity.tile));
        };

        if grid.is_blocked(next.x, next.y) {
            entity.stalls += 1;
            if entity.stalls < self.config.stall_threshold {
                return Some(MovementEvent::Stalled {
                    tile: next,
                    stalls: entity.stalls,
                });
            }
            return self.replan(entity, grid, cache);
        }

        entity.stalls = 0;
        if let Some(route) = entity.route.as_mut() {
            route.cursor += 1;
        }
        if let Some(facing) = Direction::from_delta(next.x - entity.tile.x, next.y - entity.tile.y)
        {
            entity.facing = facing;
        }
        entity.target = next;
        entity.phase = MovePhase::Moving;

        self.advance(entity, dt)
    }

    fn replan<G: WorldGrid + ?Sized>(
        &self,
        entity: &mut MovingEntity,
        grid: &G,
        cache: &mut PathCache,
    ) -> Option<MovementEvent> {
        let route = entity.route.take()?;
        entity.stalls = 0;

        // Both entries are known to be stale
        if let Some(start) = route.path.start() {
            cache.invalidate(start, route.goal, route.diagonal);
        }
        cache.invalidate(entity.tile, route.goal, route.diagonal);

        let path = cache.get_or_compute(grid, entity.tile, route.goal, route.diagonal);
        let usable = match path.get(1) {
            Some(next) => grid.is_open(next),
            None => !path.is_empty(),
        };

        if !usable {
            log::warn!(
                "Giving up on route {} -> {} after {} stalls",
                entity.tile,
                route.goal,
                self.config.stall_threshold
            );
            return Some(MovementEvent::GaveUp { goal: route.goal });
        }

        log::debug!(
            "Replanned {} -> {} ({} tiles)",
            entity.tile,
            route.goal,
            path.len()
        );
        entity.route = Some(Route::new(path, route.goal, route.diagonal));
        Some(MovementEvent::Replanned { goal: route.goal })
    }

    fn advance(&self, entity: &mut MovingEntity, dt: f32) -> Option<MovementEvent> {
        let metrics = self.config.tile_metrics;
        let destination = metrics.tile_center(entity.target);
        let max_step = entity.speed * metrics.tile_size * dt;

        // Each axis independently, clamped so it never overshoots
        entity.pixel = Vec2::new(
            approach(entity.pixel.x, destination.x, max_step),
            approach(entity.pixel.y, destination.y, max_step),
        );

        if entity.pixel != destination {
            return None;
        }

        entity.tile = entity.target;
        let leaped = entity.phase == MovePhase::Leaping;
        entity.phase = MovePhase::Idle;

        if leaped {
            return Some(MovementEvent::Landed(entity.tile));
        }

        if entity.route.as_ref().is_some_and(Route::is_finished) {
            entity.route = None;
            return Some(MovementEvent::RouteFinished(entity.tile));
        }

        Some(MovementEvent::StepCompleted(entity.tile))
    }
}

fn approach(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::TileGrid;

    const DT: f32 = 1.0 / 60.0;

    fn p(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    /// Run until an event matching `done` fires, collecting every event
    fn run_until(
        controller: &MovementController,
        entity: &mut MovingEntity,
        grid: &TileGrid,
        cache: &mut PathCache,
        max_frames: usize,
        done: impl Fn(&MovementEvent) -> bool,
    ) -> Vec<MovementEvent> {
        let mut events = Vec::new();
        for _ in 0..max_frames {
            if let Some(event) = controller.update(entity, grid, cache, DT) {
                events.push(event);
                if done(&event) {
                    return events;
                }
            }
        }
        panic!("condition not reached, events: {events:?}");
    }

    #[test]
    fn test_walks_route_to_goal() {
        let grid = TileGrid::new(6, 6);
        let mut cache = PathCache::default();
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(0, 0), 4.0);

        assert!(controller.navigate(&mut entity, &grid, &mut cache, p(3, 2), false));

        let events = run_until(&controller, &mut entity, &grid, &mut cache, 600, |e| {
            matches!(e, MovementEvent::RouteFinished(_))
        });

        assert_eq!(events.last(), Some(&MovementEvent::RouteFinished(p(3, 2))));
        let steps = events
            .iter()
            .filter(|e| matches!(e, MovementEvent::StepCompleted(_)))
            .count();
        assert_eq!(steps, 4);
        assert_eq!(entity.tile(), p(3, 2));
        assert_eq!(entity.pixel(), controller.config().tile_metrics.tile_center(p(3, 2)));
        assert!(!entity.is_moving());
        assert!(!entity.has_route());
    }

    #[test]
    fn test_interpolation_never_overshoots() {
        let grid = TileGrid::new(4, 1);
        let mut cache = PathCache::default();
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(0, 0), 3.0);
        let metrics = controller.config().tile_metrics;
        let end_x = metrics.tile_center(p(3, 0)).x;

        controller.navigate(&mut entity, &grid, &mut cache, p(3, 0), false);

        let mut last_x = entity.pixel().x;
        for _ in 0..300 {
            controller.update(&mut entity, &grid, &mut cache, DT);
            let x = entity.pixel().x;
            assert!(x >= last_x);
            assert!(x <= end_x);
            last_x = x;
        }
        assert_eq!(last_x, end_x);
    }

    #[test]
    fn test_large_dt_clamps_to_tile_center() {
        let grid = TileGrid::new(3, 1);
        let mut cache = PathCache::default();
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(0, 0), 2.0);

        controller.navigate(&mut entity, &grid, &mut cache, p(2, 0), false);
        let event = controller.update(&mut entity, &grid, &mut cache, 10.0);

        // One tile per update, however long the frame
        assert_eq!(event, Some(MovementEvent::StepCompleted(p(1, 0))));
        assert_eq!(entity.tile(), p(1, 0));
    }

    #[test]
    fn test_facing_follows_steps() {
        let grid = TileGrid::new(3, 3);
        let mut cache = PathCache::default();
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(1, 1), 4.0);

        assert!(controller.step_to(&mut entity, &grid, p(1, 0)));
        controller.update(&mut entity, &grid, &mut cache, DT);

        assert_eq!(entity.facing(), Direction::Up);
        assert_eq!(entity.target(), p(1, 0));
        assert!(entity.is_moving());
    }

    #[test]
    fn test_step_to_rejects_blocked_or_distant_tiles() {
        let mut grid = TileGrid::new(4, 4);
        grid.set_blocked(p(2, 1), true);
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(1, 1), 4.0);

        assert!(!controller.step_to(&mut entity, &grid, p(2, 1)));
        assert!(!controller.step_to(&mut entity, &grid, p(3, 1)));
        assert!(!controller.step_to(&mut entity, &grid, p(2, 2)));
        assert!(controller.step_to(&mut entity, &grid, p(1, 2)));
    }

    #[test]
    fn test_stall_then_replan_around_new_obstacle() {
        let mut grid = TileGrid::new(5, 3);
        let mut cache = PathCache::default();
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(0, 1), 4.0);

        assert!(controller.navigate(&mut entity, &grid, &mut cache, p(4, 1), false));
        assert_eq!(entity.path().map(Path::len), Some(5));

        // Something appears on the next tile after the route was planned
        grid.set_blocked(p(1, 1), true);

        let events = run_until(&controller, &mut entity, &grid, &mut cache, 10, |e| {
            matches!(e, MovementEvent::Replanned { .. })
        });
        assert_eq!(
            events,
            vec![
                MovementEvent::Stalled {
                    tile: p(1, 1),
                    stalls: 1
                },
                MovementEvent::Stalled {
                    tile: p(1, 1),
                    stalls: 2
                },
                MovementEvent::Replanned { goal: p(4, 1) },
            ]
        );

        run_until(&controller, &mut entity, &grid, &mut cache, 600, |e| {
            matches!(e, MovementEvent::RouteFinished(_))
        });
        assert_eq!(entity.tile(), p(4, 1));
    }

    #[test]
    fn test_gives_up_when_replan_fails() {
        let mut grid = TileGrid::new(5, 1);
        let mut cache = PathCache::default();
        let controller = MovementController::new(MovementConfig {
            stall_threshold: 2,
            ..Default::default()
        });
        let mut entity = controller.spawn(p(0, 0), 4.0);

        controller.navigate(&mut entity, &grid, &mut cache, p(4, 0), false);
        grid.set_blocked(p(1, 0), true);

        let first = controller.update(&mut entity, &grid, &mut cache, DT);
        let second = controller.update(&mut entity, &grid, &mut cache, DT);

        assert_eq!(
            first,
            Some(MovementEvent::Stalled {
                tile: p(1, 0),
                stalls: 1
            })
        );
        assert_eq!(second, Some(MovementEvent::GaveUp { goal: p(4, 0) }));
        assert!(!entity.has_route());
        assert!(!entity.is_moving());
        assert_eq!(controller.update(&mut entity, &grid, &mut cache, DT), None);
    }

    #[test]
    fn test_leap_skips_blocked_tile() {
        let mut grid = TileGrid::new(1, 4);
        grid.set_blocked(p(0, 1), true);
        let mut cache = PathCache::default();
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(0, 0), 4.0);

        assert!(controller.leap(&mut entity, p(0, 2)));
        assert_eq!(entity.phase(), MovePhase::Leaping);
        assert_eq!(entity.facing(), Direction::Down);

        // Cannot be interrupted by new requests
        assert!(!controller.navigate(&mut entity, &grid, &mut cache, p(0, 3), false));
        assert!(!controller.leap(&mut entity, p(0, 3)));

        let events = run_until(&controller, &mut entity, &grid, &mut cache, 600, |e| {
            matches!(e, MovementEvent::Landed(_))
        });
        assert_eq!(events, vec![MovementEvent::Landed(p(0, 2))]);
        assert_eq!(entity.tile(), p(0, 2));
    }

    #[test]
    fn test_cancel_finishes_current_step_only() {
        let grid = TileGrid::new(6, 1);
        let mut cache = PathCache::default();
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(0, 0), 4.0);

        controller.navigate(&mut entity, &grid, &mut cache, p(5, 0), false);
        controller.update(&mut entity, &grid, &mut cache, DT);
        assert!(entity.is_moving());

        controller.cancel(&mut entity);
        let events = run_until(&controller, &mut entity, &grid, &mut cache, 600, |e| {
            matches!(e, MovementEvent::StepCompleted(_))
        });

        assert_eq!(events, vec![MovementEvent::StepCompleted(p(1, 0))]);
        for _ in 0..60 {
            assert_eq!(controller.update(&mut entity, &grid, &mut cache, DT), None);
        }
        assert_eq!(entity.tile(), p(1, 0));
    }

    #[test]
    fn test_navigate_to_own_tile_finishes_immediately() {
        let grid = TileGrid::new(3, 3);
        let mut cache = PathCache::default();
        let controller = MovementController::default();
        let mut entity = controller.spawn(p(1, 1), 4.0);

        assert!(controller.navigate(&mut entity, &grid, &mut cache, p(1, 1), false));
        assert_eq!(
            controller.update(&mut entity, &grid, &mut cache, DT),
            Some(MovementEvent::RouteFinished(p(1, 1)))
        );
    }
}
