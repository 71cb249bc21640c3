//! Entity Component System module
//!
//! Built on top of the hecs ECS library

mod components;
mod world;

pub use components::{NpcId, Player, Tracks, Trainer};
pub use world::World;
