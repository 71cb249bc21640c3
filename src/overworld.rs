//! Overworld simulation
//!
//! Owns one loaded area: the collision grid, the path cache, the movement
//! controller and the hecs world holding the player and NPCs. Grid mutation
//! goes through [`Overworld::set_blocked`] and [`Overworld::reload_grid`] so
//! cached paths never outlive the grid they were computed on.

use hecs::Entity;
use rustc_hash::FxHashMap;

use crate::ai::{BehaviorEngine, LedgeRule, NavContext, SightDetector};
use crate::config::{AreaDefinition, ConfigError, NavConfig, TargetRef};
use crate::ecs::{NpcId, Player, Tracks, Trainer, World};
use crate::events::{EventQueue, OverworldEvent};
use crate::movement::{MovementController, MovementEvent, MovingEntity};
use crate::nav::{Direction, GridPosition, PathCache, TileGrid, WorldGrid};

/// Player walking speed in tiles per second
pub const DEFAULT_PLAYER_SPEED: f32 = 4.0;

/// A running area.
pub struct Overworld {
    name: String,
    nav: NavConfig,
    grid: TileGrid,
    cache: PathCache,
    controller: MovementController,
    ledges: LedgeRule,
    world: World,
    player: Entity,
    events: EventQueue,
    frame: u64,
}

impl Overworld {
    /// Validate `area` and spawn its player and NPCs.
    ///
    /// NPCs without an explicit seed are seeded with their index in the
    /// area file, so runs are reproducible.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the area fails validation
    pub fn from_area(area: &AreaDefinition) -> Result<Self, ConfigError> {
        area.validate()?;

        let nav = area.nav.clone();
        let controller = MovementController::new(nav.movement_config());
        let mut world = World::new();

        let player = world.spawn((
            Player,
            controller
                .spawn(area.player, DEFAULT_PLAYER_SPEED)
                .with_facing(Direction::Down),
        ));

        let mut spawned = FxHashMap::default();
        for (index, def) in area.npcs.iter().enumerate() {
            let moving = controller.spawn(def.tile, def.speed).with_facing(def.facing);
            let behavior = BehaviorEngine::new(def.behavior_config(&nav, index as u64));
            let entity = world.spawn((NpcId::new(def.id.as_str()), moving, behavior));

            if let Some(trainer) = &def.trainer {
                let sight = SightDetector::new(trainer.sight_range).with_mode(nav.sight_mode);
                world
                    .insert(entity, Trainer { sight })
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
            spawned.insert(def.id.as_str(), entity);
        }

        // Targets may name NPCs defined later in the file
        for def in &area.npcs {
            let Some(target) = &def.target else {
                continue;
            };
            let tracked = match target {
                TargetRef::Player => Some(player),
                TargetRef::Npc(id) => spawned.get(id.as_str()).copied(),
            };
            if let (Some(&entity), Some(tracked)) = (spawned.get(def.id.as_str()), tracked) {
                world
                    .insert(entity, Tracks(tracked))
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
        }

        let grid = area.grid();
        log::info!(
            "Loaded area '{}': {}x{} tiles ({} blocked), {} NPCs",
            area.name,
            grid.width(),
            grid.height(),
            grid.blocked_count(),
            area.npcs.len()
        );

        Ok(Self {
            name: area.name.clone(),
            cache: PathCache::new(nav.max_expansions),
            grid,
            ledges: area.ledge_rule(),
            nav,
            controller,
            world,
            player,
            events: EventQueue::new(),
            frame: 0,
        })
    }

    // ========================================================================
    // Frame Update
    // ========================================================================

    /// Advance the simulation by `dt` seconds.
    ///
    /// Events pushed during this call become readable after the next one.
    pub fn update(&mut self, dt: f32) {
        self.events.swap();
        self.frame += 1;

        let Self {
            grid,
            cache,
            controller,
            world,
            events,
            ..
        } = self;

        // Targets are read from where everyone stood at the start of the frame
        let tiles: FxHashMap<Entity, GridPosition> = world
            .query::<&MovingEntity>()
            .iter()
            .map(|(entity, moving)| (entity, moving.tile()))
            .collect();

        for (entity, (moving, behavior, tracks)) in world.query_mut::<(
            &mut MovingEntity,
            Option<&mut BehaviorEngine>,
            Option<&Tracks>,
        )>() {
            if let Some(behavior) = behavior {
                let target = tracks.and_then(|tracks| tiles.get(&tracks.0).copied());
                let mut nav = NavContext {
                    grid: &*grid,
                    cache: &mut *cache,
                    controller: &*controller,
                };
                behavior.update(dt, moving, &mut nav, target);
            }

            if let Some(event) = controller.update(moving, &*grid, cache, dt) {
                Self::forward(events, entity, event);
            }
        }

        self.check_trainers();
    }

    fn forward(events: &mut EventQueue, entity: Entity, event: MovementEvent) {
        match event {
            MovementEvent::RouteFinished(tile) => {
                events.push(OverworldEvent::RouteFinished { entity, tile });
            }
            MovementEvent::Landed(tile) => {
                events.push(OverworldEvent::Landed { entity, tile });
            }
            MovementEvent::GaveUp { goal } => {
                events.push(OverworldEvent::GaveUp { entity, goal });
            }
            other => log::trace!("{:?}: {:?}", entity, other),
        }
    }

    fn check_trainers(&mut self) {
        let Ok(player_tile) = self
            .world
            .get::<MovingEntity>(self.player)
            .map(|moving| moving.tile())
        else {
            return;
        };

        for (entity, (moving, trainer, id)) in self
            .world
            .query_mut::<(&MovingEntity, &mut Trainer, &NpcId)>()
        {
            if trainer
                .sight
                .check(&self.grid, moving.tile(), moving.facing(), player_tile)
            {
                log::info!("Trainer '{}' spotted the player at {}", id.0, player_tile);
                self.events.push(OverworldEvent::TrainerSpotted {
                    trainer: entity,
                    id: id.0.clone(),
                    player_tile,
                });
            }
        }
    }

    // ========================================================================
    // Player Input
    // ========================================================================

    /// Turn the player toward `direction` and step there if it is open.
    ///
    /// Returns whether a step was started. Turning happens even when blocked.
    pub fn move_player(&mut self, direction: Direction) -> bool {
        let Ok(mut moving) = self.world.get_mut::<MovingEntity>(self.player) else {
            return false;
        };
        if moving.is_moving() {
            return false;
        }

        self.controller.face(&mut moving, direction);
        let next = moving.tile().step(direction, 1);
        self.controller.step_to(&mut moving, &self.grid, next)
    }

    /// Jump the player over a ledge in `direction`, if the area allows it.
    pub fn player_leap(&mut self, direction: Direction) -> bool {
        let Ok(mut moving) = self.world.get_mut::<MovingEntity>(self.player) else {
            return false;
        };
        if moving.is_moving() {
            return false;
        }

        match self.ledges.can_leap(&self.grid, moving.tile(), direction) {
            Some(landing) => self.controller.leap(&mut moving, landing),
            None => false,
        }
    }

    /// Walk the player along a cached path to `goal`.
    pub fn walk_player_to(&mut self, goal: GridPosition) -> bool {
        let Ok(mut moving) = self.world.get_mut::<MovingEntity>(self.player) else {
            return false;
        };
        self.controller
            .navigate(&mut moving, &self.grid, &mut self.cache, goal, false)
    }

    /// Re-arm a trainer's sight after its encounter was resolved.
    pub fn rearm_trainer(&mut self, trainer: Entity) -> bool {
        match self.world.get_mut::<Trainer>(trainer) {
            Ok(mut trainer) => {
                trainer.sight.reset();
                true
            }
            Err(_) => false,
        }
    }

    // ========================================================================
    // Grid Mutation
    // ========================================================================

    /// Block or unblock one tile. Every cached path is dropped.
    pub fn set_blocked(&mut self, pos: GridPosition, blocked: bool) {
        if !self.grid.in_bounds(pos) || self.grid.is_blocked(pos.x, pos.y) == blocked {
            return;
        }
        self.grid.set_blocked(pos, blocked);
        self.cache.clear();
        self.events.push(OverworldEvent::GridChanged);
    }

    /// Replace the whole collision grid from ASCII rows.
    pub fn reload_grid<S: AsRef<str>>(&mut self, rows: &[S]) {
        self.grid = TileGrid::from_rows(rows);
        self.cache.clear();
        log::debug!(
            "Reloaded grid for '{}': {}x{}",
            self.name,
            self.grid.width(),
            self.grid.height()
        );
        self.events.push(OverworldEvent::GridChanged);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn nav_config(&self) -> &NavConfig {
        &self.nav
    }

    #[must_use]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    #[must_use]
    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    #[must_use]
    pub fn controller(&self) -> &MovementController {
        &self.controller
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    #[must_use]
    pub fn player(&self) -> Entity {
        self.player
    }

    /// Events from the previous frame
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Frames simulated so far
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// NPC entity by id
    #[must_use]
    pub fn npc(&self, id: &str) -> Option<Entity> {
        self.world.find_npc(id)
    }

    /// Tile an entity stands on
    #[must_use]
    pub fn tile_of(&self, entity: Entity) -> Option<GridPosition> {
        self.world
            .get::<MovingEntity>(entity)
            .ok()
            .map(|moving| moving.tile())
    }
}
