//! Overworld ECS components
//!
//! Every entity carries a [`MovingEntity`](crate::movement::MovingEntity).
//! NPCs add a [`BehaviorEngine`](crate::ai::BehaviorEngine) and an [`NpcId`];
//! trainers add a [`Trainer`].

use hecs::Entity;

use crate::ai::SightDetector;

/// Marks the player-controlled entity
#[derive(Debug, Clone, Copy, Default)]
pub struct Player;

/// NPC id from the area data, for logging and lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcId(pub String);

impl NpcId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Challenges the player when seen
#[derive(Debug, Clone)]
pub struct Trainer {
    pub sight: SightDetector,
}

/// Entity followed or fled from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracks(pub Entity);
