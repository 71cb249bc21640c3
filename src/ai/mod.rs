//! NPC behavior
//!
//! Movement patterns, the cooldown-gated behavior engine, trainer sight lines
//! and the ledge jump rule.

mod behavior;
mod ledge;
mod patterns;
mod sight;

pub use behavior::{BehaviorConfig, BehaviorEngine, DEFAULT_DECISION_COOLDOWN, NavContext};
pub use ledge::{Ledge, LedgeRule};
pub use patterns::{
    DEFAULT_TURN_CHANCE, Decision, DecisionContext, FleePattern, FollowPattern, MovementPattern,
    PatrolPattern, PatternConfig, PatternKind, RandomPattern, StaticPattern, WanderPattern,
};
pub use sight::{SightDetector, SightMode};
