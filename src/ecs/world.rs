//! World wrapper around hecs
//!
//! Holds the player and NPC entities of the active area.

use hecs::Entity;

use super::components::NpcId;

/// Entity storage for the active area
#[derive(Default)]
pub struct World {
    inner: hecs::World,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an entity from a component bundle
    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        self.inner.spawn(components)
    }

    /// Attach a component after spawning, e.g. a follow target that was
    /// spawned later
    pub fn insert<T: hecs::Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), hecs::NoSuchEntity> {
        self.inner.insert_one(entity, component)
    }

    pub fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        self.inner.despawn(entity)
    }

    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    pub fn get_mut<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<hecs::RefMut<'_, T>, hecs::ComponentError> {
        self.inner.get::<&mut T>(entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Number of entities, player included
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Find the NPC spawned with `id`
    pub fn find_npc(&self, id: &str) -> Option<Entity> {
        self.inner
            .query::<&NpcId>()
            .iter()
            .find(|(_, npc)| npc.0 == id)
            .map(|(entity, _)| entity)
    }

    /// Ids of every NPC, sorted
    pub fn npc_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .query::<&NpcId>()
            .iter()
            .map(|(_, npc)| npc.0.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<'_, Q> {
        self.inner.query::<Q>()
    }

    pub fn query_mut<Q: hecs::Query>(&mut self) -> hecs::QueryMut<'_, Q> {
        self.inner.query_mut::<Q>()
    }
}
