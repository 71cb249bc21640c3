//! Per-NPC behavior engine
//!
//! Wraps one [`MovementPattern`] with a decision cooldown driven by `dt`, so
//! tests and replays can step it deterministically. Decisions are only taken
//! while the NPC stands still with no route left to walk.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::patterns::{Decision, DecisionContext, MovementPattern, PatternConfig, PatternKind};
use crate::movement::{MovementController, MovingEntity};
use crate::nav::{GridPosition, PathCache, WorldGrid};

/// Default seconds between decisions
pub const DEFAULT_DECISION_COOLDOWN: f32 = 0.75;

fn default_cooldown() -> f32 {
    DEFAULT_DECISION_COOLDOWN
}

/// Immutable behavior configuration, set when the NPC is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Movement pattern and its parameters
    pub pattern: PatternConfig,
    /// Anchor for radius-limited patterns
    pub home: GridPosition,
    /// Seconds between decisions
    #[serde(default = "default_cooldown")]
    pub cooldown: f32,
    /// Allow diagonal steps when pathfinding
    #[serde(default)]
    pub diagonal: bool,
    /// Seed for this NPC's random source
    #[serde(default)]
    pub seed: u64,
}

impl BehaviorConfig {
    #[must_use]
    pub fn new(pattern: PatternConfig, home: GridPosition) -> Self {
        Self {
            pattern,
            home,
            cooldown: DEFAULT_DECISION_COOLDOWN,
            diagonal: false,
            seed: 0,
        }
    }

    /// Set the decision cooldown in seconds
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown = cooldown.max(0.0);
        self
    }

    /// Enable or disable diagonal pathfinding
    #[must_use]
    pub fn with_diagonal(mut self, diagonal: bool) -> Self {
        self.diagonal = diagonal;
        self
    }

    /// Set the random seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Grid, cache and controller an engine acts through.
pub struct NavContext<'a> {
    pub grid: &'a dyn WorldGrid,
    pub cache: &'a mut PathCache,
    pub controller: &'a MovementController,
}

/// Decision loop for one NPC.
#[derive(Debug)]
pub struct BehaviorEngine {
    config: BehaviorConfig,
    pattern: Box<dyn MovementPattern>,
    /// Seconds until the next decision is allowed
    cooldown: f32,
    rng: ChaCha8Rng,
    decisions: u64,
}

impl BehaviorEngine {
    /// Create an engine; the first decision may happen on the first update.
    #[must_use]
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            pattern: config.pattern.build(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            cooldown: 0.0,
            decisions: 0,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    #[must_use]
    pub fn kind(&self) -> PatternKind {
        self.config.pattern.kind()
    }

    /// Pattern name for debugging
    #[must_use]
    pub fn pattern_name(&self) -> &'static str {
        self.pattern.name()
    }

    /// Seconds left before the next decision
    #[must_use]
    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown
    }

    /// Decisions taken so far (including idle ones)
    #[must_use]
    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    /// Tick the cooldown and, if allowed, decide and act.
    ///
    /// `target` is the tile of the entity followed or fled from, if any.
    /// Returns the decision taken, or [`Decision::Idle`] when none was.
    pub fn update(
        &mut self,
        dt: f32,
        entity: &mut MovingEntity,
        nav: &mut NavContext<'_>,
        target: Option<GridPosition>,
    ) -> Decision {
        self.cooldown = (self.cooldown - dt).max(0.0);
        if self.cooldown > 0.0 || entity.is_moving() || entity.has_route() {
            return Decision::Idle;
        }

        let decision = {
            let mut ctx = DecisionContext {
                grid: nav.grid,
                tile: entity.tile(),
                facing: entity.facing(),
                home: self.config.home,
                target,
                rng: &mut self.rng,
            };
            self.pattern.decide(&mut ctx)
        };

        self.apply(decision, entity, nav);
        self.cooldown = self.config.cooldown;
        self.decisions += 1;
        decision
    }

    fn apply(&mut self, decision: Decision, entity: &mut MovingEntity, nav: &mut NavContext<'_>) {
        let accepted = match decision {
            Decision::Idle => true,
            Decision::Face(direction) => {
                nav.controller.face(entity, direction);
                true
            }
            Decision::StepTo(tile) => nav.controller.step_to(entity, nav.grid, tile),
            Decision::PathTo(tile) => nav.controller.navigate(
                entity,
                nav.grid,
                nav.cache,
                tile,
                self.config.diagonal,
            ),
        };

        if accepted {
            log::trace!("{} at {}: {:?}", self.pattern.name(), entity.tile(), decision);
        } else if let Some(tile) = decision.target() {
            log::trace!("{} at {}: {} unreachable", self.pattern.name(), entity.tile(), tile);
            self.pattern.on_unreachable(tile);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MovementEvent;
    use crate::nav::TileGrid;

    const DT: f32 = 1.0 / 60.0;

    fn p(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    /// Minimal world: one NPC, an optional target tile, and everything it needs
    struct Sim {
        grid: TileGrid,
        cache: PathCache,
        controller: MovementController,
        entity: MovingEntity,
        engine: BehaviorEngine,
    }

    impl Sim {
        fn new(grid: TileGrid, start: GridPosition, config: BehaviorConfig) -> Self {
            let controller = MovementController::default();
            let entity = controller.spawn(start, 8.0);
            Self {
                grid,
                cache: PathCache::default(),
                controller,
                entity,
                engine: BehaviorEngine::new(config),
            }
        }

        /// One frame: decide, then move
        fn tick(&mut self, target: Option<GridPosition>) -> (Decision, Option<MovementEvent>) {
            let mut nav = NavContext {
                grid: &self.grid,
                cache: &mut self.cache,
                controller: &self.controller,
            };
            let decision = self.engine.update(DT, &mut self.entity, &mut nav, target);
            let event = self
                .controller
                .update(&mut self.entity, &self.grid, &mut self.cache, DT);
            (decision, event)
        }

        /// Tiles where routes finished, over `frames` frames
        fn arrivals(&mut self, frames: usize, target: Option<GridPosition>) -> Vec<GridPosition> {
            let mut arrivals = Vec::new();
            for _ in 0..frames {
                if let (_, Some(MovementEvent::RouteFinished(tile))) = self.tick(target) {
                    arrivals.push(tile);
                }
            }
            arrivals
        }
    }

    #[test]
    fn test_cooldown_gates_decisions() {
        let config = BehaviorConfig::new(PatternConfig::Static { turn_chance: 1.0 }, p(2, 2))
            .with_cooldown(0.5);
        let mut sim = Sim::new(TileGrid::new(5, 5), p(2, 2), config);

        let (first, _) = sim.tick(None);
        assert!(matches!(first, Decision::Face(_)));
        assert_eq!(sim.engine.decisions(), 1);

        // 0.5s at 60 Hz: no new decision until the cooldown runs out
        for _ in 0..29 {
            sim.tick(None);
        }
        assert_eq!(sim.engine.decisions(), 1);
        for _ in 0..2 {
            sim.tick(None);
        }
        assert_eq!(sim.engine.decisions(), 2);
        assert_eq!(sim.entity.tile(), p(2, 2));
    }

    #[test]
    fn test_no_decision_while_moving() {
        let config = BehaviorConfig::new(PatternConfig::Random { radius: 3 }, p(3, 3))
            .with_cooldown(0.0);
        let mut sim = Sim::new(TileGrid::new(7, 7), p(3, 3), config);

        let (first, _) = sim.tick(None);
        assert!(matches!(first, Decision::StepTo(_)));
        assert!(sim.entity.is_moving());

        let (second, _) = sim.tick(None);
        assert_eq!(second, Decision::Idle);
        assert_eq!(sim.engine.decisions(), 1);
    }

    #[test]
    fn test_random_walk_stays_in_radius() {
        let config = BehaviorConfig::new(PatternConfig::Random { radius: 2 }, p(5, 5))
            .with_cooldown(0.1)
            .with_seed(9);
        let mut sim = Sim::new(TileGrid::new(11, 11), p(5, 5), config);

        for _ in 0..1200 {
            sim.tick(None);
            assert!(sim.entity.tile().manhattan(p(5, 5)) <= 2);
            assert!(sim.entity.target().manhattan(p(5, 5)) <= 2);
        }
        assert!(sim.engine.decisions() > 10);
    }

    #[test]
    fn test_patrol_visits_waypoints_ping_pong() {
        let waypoints = vec![p(1, 1), p(5, 1), p(5, 5)];
        let config = BehaviorConfig::new(PatternConfig::Patrol { waypoints }, p(1, 1))
            .with_cooldown(0.25);
        let mut sim = Sim::new(TileGrid::new(8, 8), p(1, 1), config);

        let arrivals = sim.arrivals(3000, None);

        assert!(arrivals.len() >= 6, "too few arrivals: {arrivals:?}");
        assert_eq!(
            &arrivals[..6],
            &[p(5, 1), p(5, 5), p(5, 1), p(1, 1), p(5, 1), p(5, 5)]
        );
    }

    #[test]
    fn test_patrol_routes_around_walls() {
        let grid = TileGrid::from_rows(&[
            "........", //
            "...#....", //
            "...#....", //
            "...#....", //
            "........", //
        ]);
        let waypoints = vec![p(1, 2), p(6, 2)];
        let config =
            BehaviorConfig::new(PatternConfig::Patrol { waypoints }, p(1, 2)).with_cooldown(0.1);
        let mut sim = Sim::new(grid, p(1, 2), config);

        for _ in 0..2000 {
            sim.tick(None);
            assert!(sim.grid.is_open(sim.entity.tile()));
        }
        assert!(sim.cache.stats().hits > 0, "patrol legs should hit the cache");
    }

    #[test]
    fn test_patrol_passes_blocked_waypoint() {
        let mut grid = TileGrid::new(8, 8);
        grid.set_blocked(p(5, 1), true);
        let waypoints = vec![p(1, 1), p(5, 1), p(5, 5)];
        let config = BehaviorConfig::new(PatternConfig::Patrol { waypoints }, p(1, 1))
            .with_cooldown(0.25);
        let mut sim = Sim::new(grid, p(1, 1), config);

        let arrivals = sim.arrivals(3000, None);

        assert!(arrivals.contains(&p(5, 5)), "never reached (5, 5): {arrivals:?}");
        // And back again past the blocked waypoint
        assert!(arrivals.contains(&p(1, 1)), "never returned home: {arrivals:?}");
    }

    #[test]
    fn test_follow_routes_to_reachable_ring_tile() {
        let mut grid = TileGrid::new(12, 12);
        for wall in [p(2, 5), p(4, 5), p(3, 4), p(3, 6)] {
            grid.set_blocked(wall, true);
        }
        let leader = p(5, 5);
        let config = BehaviorConfig::new(
            PatternConfig::Follow {
                min_distance: 1,
                max_distance: 2,
            },
            p(0, 5),
        )
        .with_cooldown(0.2);
        let mut sim = Sim::new(grid, p(0, 5), config);

        for _ in 0..1200 {
            sim.tick(Some(leader));
        }

        let distance = sim.entity.tile().manhattan(leader);
        assert!((1..=2).contains(&distance), "ended {distance} tiles away");
    }

    #[test]
    fn test_flee_increases_distance() {
        let threat = p(5, 5);
        let config = BehaviorConfig::new(PatternConfig::Flee { sight_range: 3 }, p(7, 5))
            .with_cooldown(0.5);
        let mut sim = Sim::new(TileGrid::new(12, 12), p(7, 5), config);
        assert_eq!(sim.entity.tile().manhattan(threat), 2);

        let (decision, _) = sim.tick(Some(threat));
        assert!(matches!(decision, Decision::StepTo(_)));

        for _ in 0..120 {
            sim.tick(Some(threat));
            assert!(sim.entity.target().manhattan(threat) >= 2);
        }
        assert!(sim.entity.tile().manhattan(threat) >= 3);
    }

    #[test]
    fn test_flee_stops_outside_range() {
        let threat = p(1, 1);
        let config =
            BehaviorConfig::new(PatternConfig::Flee { sight_range: 3 }, p(2, 2)).with_cooldown(0.0);
        let mut sim = Sim::new(TileGrid::new(12, 12), p(2, 2), config);

        for _ in 0..600 {
            sim.tick(Some(threat));
        }

        // Walked away until the threat was out of range, then stayed put
        assert_eq!(sim.entity.tile().manhattan(threat), 4);
        assert!(!sim.entity.is_moving());
    }

    #[test]
    fn test_wander_resets_and_revisits() {
        let config = BehaviorConfig::new(PatternConfig::Wander { radius: 2 }, p(5, 5))
            .with_cooldown(0.1)
            .with_seed(1234);
        let mut sim = Sim::new(TileGrid::new(11, 11), p(5, 5), config);

        let arrivals = sim.arrivals(6000, None);

        // 13 tiles in range: the 14th arrival must be a revisit after a reset
        assert!(arrivals.len() > 14, "too few arrivals: {}", arrivals.len());
        assert!(arrivals.iter().all(|tile| tile.manhattan(p(5, 5)) <= 2));
        let first_round = &arrivals[..13];
        for (i, tile) in first_round.iter().enumerate() {
            assert!(!first_round[..i].contains(tile), "early revisit of {tile}");
        }
        assert!(first_round.contains(&arrivals[13]));
    }

    #[test]
    fn test_follow_closes_in_without_crowding() {
        let leader = p(10, 5);
        let config = BehaviorConfig::new(
            PatternConfig::Follow {
                min_distance: 1,
                max_distance: 2,
            },
            p(0, 5),
        )
        .with_cooldown(0.2);
        let mut sim = Sim::new(TileGrid::new(12, 12), p(0, 5), config);

        for _ in 0..1200 {
            sim.tick(Some(leader));
            assert_ne!(sim.entity.tile(), leader);
        }

        let distance = sim.entity.tile().manhattan(leader);
        assert!((1..=2).contains(&distance), "ended {distance} tiles away");
    }

    #[test]
    fn test_same_seed_same_behavior() {
        let make = || {
            let config = BehaviorConfig::new(PatternConfig::Wander { radius: 3 }, p(6, 6))
                .with_cooldown(0.2)
                .with_seed(77);
            Sim::new(TileGrid::new(13, 13), p(6, 6), config)
        };

        let a = make().arrivals(1500, None);
        let b = make().arrivals(1500, None);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }
}
