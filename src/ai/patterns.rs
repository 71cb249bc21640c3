//! NPC movement patterns
//!
//! One strategy type per pattern. Each pattern only chooses what to do next;
//! [`super::BehaviorEngine`] gates how often it is asked and carries the
//! decision out through the movement controller.

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::nav::{Direction, GridPosition, WorldGrid};

/// Default probability per decision that a static NPC turns around
pub const DEFAULT_TURN_CHANCE: f32 = 0.1;

fn default_turn_chance() -> f32 {
    DEFAULT_TURN_CHANCE
}

// ============================================================================
// Configuration
// ============================================================================

/// Pattern selection and parameters, fixed at entity creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternConfig {
    /// Stand still, occasionally turning
    Static {
        #[serde(default = "default_turn_chance")]
        turn_chance: f32,
    },
    /// Single random steps, staying within `radius` of home
    Random { radius: i32 },
    /// Walk a waypoint list back and forth
    Patrol { waypoints: Vec<GridPosition> },
    /// Visit every tile within `radius` of home, then start over
    Wander { radius: i32 },
    /// Keep between `min_distance` and `max_distance` of the target
    Follow { min_distance: i32, max_distance: i32 },
    /// Step away from the target once it comes within `sight_range`
    Flee { sight_range: i32 },
}

impl PatternConfig {
    /// Tag without parameters
    #[must_use]
    pub fn kind(&self) -> PatternKind {
        match self {
            PatternConfig::Static { .. } => PatternKind::Static,
            PatternConfig::Random { .. } => PatternKind::Random,
            PatternConfig::Patrol { .. } => PatternKind::Patrol,
            PatternConfig::Wander { .. } => PatternKind::Wander,
            PatternConfig::Follow { .. } => PatternKind::Follow,
            PatternConfig::Flee { .. } => PatternKind::Flee,
        }
    }

    /// Whether this pattern reacts to a target entity
    #[must_use]
    pub fn needs_target(&self) -> bool {
        matches!(self.kind(), PatternKind::Follow | PatternKind::Flee)
    }

    /// Instantiate the runtime strategy
    #[must_use]
    pub fn build(&self) -> Box<dyn MovementPattern> {
        match self {
            PatternConfig::Static { turn_chance } => Box::new(StaticPattern::new(*turn_chance)),
            PatternConfig::Random { radius } => Box::new(RandomPattern::new(*radius)),
            PatternConfig::Patrol { waypoints } => Box::new(PatrolPattern::new(waypoints.clone())),
            PatternConfig::Wander { radius } => Box::new(WanderPattern::new(*radius)),
            PatternConfig::Follow {
                min_distance,
                max_distance,
            } => Box::new(FollowPattern::new(*min_distance, *max_distance)),
            PatternConfig::Flee { sight_range } => Box::new(FleePattern::new(*sight_range)),
        }
    }
}

/// The six movement patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Static,
    Random,
    Patrol,
    Wander,
    Follow,
    Flee,
}

// ============================================================================
// Pattern Trait
// ============================================================================

/// What an NPC wants to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    /// Do nothing this time
    #[default]
    Idle,
    /// Turn in place
    Face(Direction),
    /// Take one step to an adjacent tile, no search
    StepTo(GridPosition),
    /// Search a path and follow it
    PathTo(GridPosition),
}

impl Decision {
    /// Tile this decision moves toward, if any
    #[must_use]
    pub fn target(&self) -> Option<GridPosition> {
        match self {
            Decision::StepTo(tile) | Decision::PathTo(tile) => Some(*tile),
            Decision::Idle | Decision::Face(_) => None,
        }
    }
}

/// Everything a pattern may look at when deciding.
pub struct DecisionContext<'a> {
    /// Collision oracle
    pub grid: &'a dyn WorldGrid,
    /// Tile the NPC stands on
    pub tile: GridPosition,
    /// Current facing
    pub facing: Direction,
    /// Home anchor
    pub home: GridPosition,
    /// Tile of the followed or feared entity
    pub target: Option<GridPosition>,
    /// Per-NPC random source
    pub rng: &'a mut ChaCha8Rng,
}

impl fmt::Debug for DecisionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionContext")
            .field("tile", &self.tile)
            .field("facing", &self.facing)
            .field("home", &self.home)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// A movement strategy.
pub trait MovementPattern: fmt::Debug + Send + Sync {
    /// Pattern name for debugging and logging.
    fn name(&self) -> &'static str;

    /// Choose the next action. Only called while the NPC is idle.
    fn decide(&mut self, ctx: &mut DecisionContext<'_>) -> Decision;

    /// Called when the chosen tile could not be reached.
    fn on_unreachable(&mut self, _tile: GridPosition) {}
}

fn open_cardinal_neighbors(
    grid: &dyn WorldGrid,
    tile: GridPosition,
) -> SmallVec<[GridPosition; 4]> {
    tile.cardinal_neighbors()
        .into_iter()
        .filter(|&next| grid.is_open(next))
        .collect()
}

// ============================================================================
// Static
// ============================================================================

/// Never moves; turns to a random facing with a small probability.
#[derive(Debug, Clone)]
pub struct StaticPattern {
    turn_chance: f32,
}

impl StaticPattern {
    #[must_use]
    pub fn new(turn_chance: f32) -> Self {
        let turn_chance = if turn_chance.is_nan() {
            0.0
        } else {
            turn_chance.clamp(0.0, 1.0)
        };
        Self { turn_chance }
    }
}

impl MovementPattern for StaticPattern {
    fn name(&self) -> &'static str {
        "Static"
    }

    fn decide(&mut self, ctx: &mut DecisionContext<'_>) -> Decision {
        if !ctx.rng.gen_bool(f64::from(self.turn_chance)) {
            return Decision::Idle;
        }

        Direction::ALL
            .choose(ctx.rng)
            .map_or(Decision::Idle, |&direction| Decision::Face(direction))
    }
}

// ============================================================================
// Random
// ============================================================================

/// Steps to a random open neighbor that stays within `radius` of home.
#[derive(Debug, Clone)]
pub struct RandomPattern {
    radius: i32,
}

impl RandomPattern {
    #[must_use]
    pub fn new(radius: i32) -> Self {
        Self {
            radius: radius.max(0),
        }
    }
}

impl MovementPattern for RandomPattern {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn decide(&mut self, ctx: &mut DecisionContext<'_>) -> Decision {
        let candidates: SmallVec<[GridPosition; 4]> = open_cardinal_neighbors(ctx.grid, ctx.tile)
            .into_iter()
            .filter(|next| next.manhattan(ctx.home) <= self.radius)
            .collect();

        candidates
            .choose(ctx.rng)
            .map_or(Decision::Idle, |&next| Decision::StepTo(next))
    }
}

// ============================================================================
// Patrol
// ============================================================================

/// Walks a fixed waypoint list back and forth (ping-pong, not a loop).
#[derive(Debug, Clone)]
pub struct PatrolPattern {
    waypoints: Vec<GridPosition>,
    index: usize,
    forward: bool,
}

impl PatrolPattern {
    #[must_use]
    pub fn new(waypoints: Vec<GridPosition>) -> Self {
        Self {
            waypoints,
            index: 0,
            forward: true,
        }
    }

    /// Waypoint currently being walked to
    #[must_use]
    pub fn current_waypoint(&self) -> Option<GridPosition> {
        self.waypoints.get(self.index).copied()
    }

    /// Whether the route is being walked front to back
    #[must_use]
    pub fn is_forward(&self) -> bool {
        self.forward
    }

    fn advance(&mut self) {
        let last = self.waypoints.len().saturating_sub(1);
        if last == 0 {
            return;
        }

        if self.forward {
            if self.index >= last {
                self.forward = false;
                self.index = last - 1;
            } else {
                self.index += 1;
            }
        } else if self.index == 0 {
            self.forward = true;
            self.index = 1;
        } else {
            self.index -= 1;
        }
    }
}

impl MovementPattern for PatrolPattern {
    fn name(&self) -> &'static str {
        "Patrol"
    }

    fn decide(&mut self, ctx: &mut DecisionContext<'_>) -> Decision {
        let Some(waypoint) = self.current_waypoint() else {
            return Decision::Idle;
        };

        // A blocked waypoint is reached by standing next to it
        let arrived = ctx.tile == waypoint
            || (!ctx.grid.is_open(waypoint) && ctx.tile.is_adjacent(waypoint, true));
        if arrived {
            self.advance();
        }

        match self.current_waypoint() {
            Some(next) if next != ctx.tile => Decision::PathTo(next),
            _ => Decision::Idle,
        }
    }

    fn on_unreachable(&mut self, tile: GridPosition) {
        if self.current_waypoint() == Some(tile) {
            log::debug!("Patrol waypoint {} unreachable, skipping", tile);
            self.advance();
        }
    }
}

// ============================================================================
// Wander
// ============================================================================

/// Visits every reachable tile around home once, then starts over.
#[derive(Debug, Clone)]
pub struct WanderPattern {
    radius: i32,
    visited: FxHashSet<GridPosition>,
    target: Option<GridPosition>,
    resets: u32,
}

impl WanderPattern {
    #[must_use]
    pub fn new(radius: i32) -> Self {
        Self {
            radius: radius.max(0),
            visited: FxHashSet::default(),
            target: None,
            resets: 0,
        }
    }

    /// Tiles visited since the last reset
    #[must_use]
    pub fn visited(&self) -> &FxHashSet<GridPosition> {
        &self.visited
    }

    /// How many times the visited set was exhausted and cleared
    #[must_use]
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Open, unvisited tiles within `radius` of home, in row-major order
    fn candidates(&self, ctx: &DecisionContext<'_>) -> Vec<GridPosition> {
        let r = self.radius;
        let mut result = Vec::new();
        for dy in -r..=r {
            let span = r - dy.abs();
            for dx in -span..=span {
                let tile = ctx.home.offset(dx, dy);
                if tile != ctx.tile && ctx.grid.is_open(tile) && !self.visited.contains(&tile) {
                    result.push(tile);
                }
            }
        }
        result
    }
}

impl MovementPattern for WanderPattern {
    fn name(&self) -> &'static str {
        "Wander"
    }

    fn decide(&mut self, ctx: &mut DecisionContext<'_>) -> Decision {
        if let Some(target) = self.target.take() {
            if ctx.tile == target {
                self.visited.insert(target);
            }
        }

        let mut candidates = self.candidates(ctx);
        if candidates.is_empty() {
            self.visited.clear();
            self.resets += 1;
            log::debug!(
                "Wander around {} exhausted, starting over (reset #{})",
                ctx.home,
                self.resets
            );
            candidates = self.candidates(ctx);
        }

        let Some(&choice) = candidates.choose(ctx.rng) else {
            return Decision::Idle;
        };

        self.target = Some(choice);
        Decision::PathTo(choice)
    }

    fn on_unreachable(&mut self, tile: GridPosition) {
        // Counts as visited so exhaustion reflects what can actually be reached
        self.visited.insert(tile);
        if self.target == Some(tile) {
            self.target = None;
        }
    }
}

// ============================================================================
// Follow
// ============================================================================

/// Trails a target, never crowding it.
#[derive(Debug, Clone)]
pub struct FollowPattern {
    min_distance: i32,
    max_distance: i32,
    /// Ring tiles that could not be reached while the target stood on `anchor`
    unreachable: FxHashSet<GridPosition>,
    anchor: Option<GridPosition>,
}

impl FollowPattern {
    #[must_use]
    pub fn new(min_distance: i32, max_distance: i32) -> Self {
        let min_distance = min_distance.max(1);
        Self {
            min_distance,
            max_distance: max_distance.max(min_distance),
            unreachable: FxHashSet::default(),
            anchor: None,
        }
    }
}

impl MovementPattern for FollowPattern {
    fn name(&self) -> &'static str {
        "Follow"
    }

    fn decide(&mut self, ctx: &mut DecisionContext<'_>) -> Decision {
        let Some(target) = ctx.target else {
            return Decision::Idle;
        };

        if ctx.tile.manhattan(target) <= self.max_distance {
            return Decision::Idle;
        }

        if self.anchor != Some(target) {
            self.anchor = Some(target);
            self.unreachable.clear();
        }

        let r = self.max_distance;
        let mut best: Option<GridPosition> = None;
        for dy in -r..=r {
            let span = r - dy.abs();
            for dx in -span..=span {
                let tile = target.offset(dx, dy);
                if tile.manhattan(target) < self.min_distance
                    || !ctx.grid.is_open(tile)
                    || self.unreachable.contains(&tile)
                {
                    continue;
                }
                let closer = best.is_none_or(|current| {
                    (tile.manhattan(ctx.tile), tile) < (current.manhattan(ctx.tile), current)
                });
                if closer {
                    best = Some(tile);
                }
            }
        }

        best.map_or(Decision::Idle, Decision::PathTo)
    }

    fn on_unreachable(&mut self, tile: GridPosition) {
        self.unreachable.insert(tile);
    }
}

// ============================================================================
// Flee
// ============================================================================

/// Steps directly away from a threat that comes too close.
#[derive(Debug, Clone)]
pub struct FleePattern {
    sight_range: i32,
}

impl FleePattern {
    #[must_use]
    pub fn new(sight_range: i32) -> Self {
        Self { sight_range }
    }
}

impl MovementPattern for FleePattern {
    fn name(&self) -> &'static str {
        "Flee"
    }

    fn decide(&mut self, ctx: &mut DecisionContext<'_>) -> Decision {
        let Some(threat) = ctx.target else {
            return Decision::Idle;
        };

        if ctx.tile.manhattan(threat) > self.sight_range {
            return Decision::Idle;
        }

        let dx = ctx.tile.x - threat.x;
        let dy = ctx.tile.y - threat.y;

        if dx == 0 && dy == 0 {
            return open_cardinal_neighbors(ctx.grid, ctx.tile)
                .choose(ctx.rng)
                .map_or(Decision::Idle, |&next| Decision::StepTo(next));
        }

        // Dominant axis first; the minor axis only if it also moves away
        let (primary, secondary) = if dx.abs() >= dy.abs() {
            ((dx.signum(), 0), (0, dy.signum()))
        } else {
            ((0, dy.signum()), (dx.signum(), 0))
        };

        [primary, secondary]
            .into_iter()
            .filter(|&step| step != (0, 0))
            .map(|(sx, sy)| ctx.tile.offset(sx, sy))
            .find(|&next| ctx.grid.is_open(next))
            .map_or(Decision::Idle, Decision::StepTo)
    }
}
