//! Grid navigation and NPC behavior for tile-based overworlds
//!
//! This crate provides:
//! - A* pathfinding on tile grids with a shared path cache
//! - Tile-to-tile movement with interpolation, stall detection and replanning
//! - Pluggable NPC movement patterns (static, random, patrol, wander, follow, flee)
//! - Trainer sight lines and ledge jumps
//! - An ECS-backed overworld (hecs) loaded from RON or JSON area files

pub mod ai;
pub mod config;
pub mod ecs;
pub mod events;
pub mod movement;
pub mod nav;
pub mod overworld;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ai::{
        BehaviorConfig, BehaviorEngine, Decision, LedgeRule, MovementPattern, NavContext,
        PatternConfig, PatternKind, SightDetector, SightMode,
    };
    pub use crate::config::{AreaDefinition, ConfigError, NavConfig, NpcDefinition, TargetRef};
    pub use crate::ecs::{NpcId, Player, Tracks, Trainer, World};
    pub use crate::events::{EventQueue, OverworldEvent};
    pub use crate::movement::{MovePhase, MovementController, MovementEvent, MovingEntity};
    pub use crate::nav::{
        Direction, GridPosition, Path, PathCache, TileGrid, TileMetrics, WorldGrid, find_path,
    };
    pub use crate::overworld::Overworld;
    pub use glam::Vec2;
}
