//! Navigation settings and data-driven area definitions
//!
//! Areas (grid rows, player spawn, NPCs, ledges) are loaded from RON or JSON,
//! the same formats scenes use.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::ai::{BehaviorConfig, Ledge, LedgeRule, PatternConfig, SightMode};
use crate::movement::{DEFAULT_STALL_THRESHOLD, MovementConfig};
use crate::nav::{DEFAULT_MAX_EXPANSIONS, Direction, GridPosition, TileGrid, TileMetrics, WorldGrid};

/// Default walking speed in tiles per second
pub const DEFAULT_SPEED: f32 = 4.0;

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

// ============================================================================
// Navigation Config
// ============================================================================

/// Tuning shared by every entity in an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Tile edge length in pixels
    pub tile_size: f32,
    /// A* budget per search
    pub max_expansions: usize,
    /// Consecutive stalls before replanning
    pub stall_threshold: u32,
    /// Default seconds between NPC decisions
    pub decision_cooldown: f32,
    /// Trainer line-of-sight check
    pub sight_mode: SightMode,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            tile_size: 16.0,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            decision_cooldown: crate::ai::DEFAULT_DECISION_COOLDOWN,
            sight_mode: SightMode::default(),
        }
    }
}

impl NavConfig {
    /// Set the tile size in pixels
    pub fn with_tile_size(mut self, tile_size: f32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Set the A* expansion budget
    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    /// Set the stall threshold
    pub fn with_stall_threshold(mut self, stall_threshold: u32) -> Self {
        self.stall_threshold = stall_threshold;
        self
    }

    /// Set the default decision cooldown
    pub fn with_decision_cooldown(mut self, seconds: f32) -> Self {
        self.decision_cooldown = seconds;
        self
    }

    /// Set the trainer sight mode
    pub fn with_sight_mode(mut self, sight_mode: SightMode) -> Self {
        self.sight_mode = sight_mode;
        self
    }

    /// Movement settings derived from this config
    #[must_use]
    pub fn movement_config(&self) -> MovementConfig {
        MovementConfig {
            stall_threshold: self.stall_threshold,
            tile_metrics: TileMetrics::new(self.tile_size),
        }
    }
}

// ============================================================================
// NPC Definitions
// ============================================================================

/// Entity an NPC follows or flees from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRef {
    /// The player
    Player,
    /// Another NPC, by id
    Npc(String),
}

/// Marks an NPC as a trainer that challenges the player on sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerDefinition {
    /// Tiles seen ahead along the facing direction
    pub sight_range: i32,
}

/// One NPC as described by area data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcDefinition {
    /// Unique id within the area
    pub id: String,
    /// Spawn tile, also the home anchor
    pub tile: GridPosition,
    #[serde(default)]
    pub facing: Direction,
    /// Tiles per second
    #[serde(default = "default_speed")]
    pub speed: f32,
    pub pattern: PatternConfig,
    /// Overrides the area's decision cooldown
    #[serde(default)]
    pub cooldown: Option<f32>,
    #[serde(default)]
    pub diagonal: bool,
    /// Required by FOLLOW and FLEE
    #[serde(default)]
    pub target: Option<TargetRef>,
    #[serde(default)]
    pub trainer: Option<TrainerDefinition>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl NpcDefinition {
    /// Create a definition with defaults for everything optional
    #[must_use]
    pub fn new(id: impl Into<String>, tile: GridPosition, pattern: PatternConfig) -> Self {
        Self {
            id: id.into(),
            tile,
            facing: Direction::default(),
            speed: DEFAULT_SPEED,
            pattern,
            cooldown: None,
            diagonal: false,
            target: None,
            trainer: None,
            seed: None,
        }
    }

    /// Behavior config with the home anchor at the spawn tile
    #[must_use]
    pub fn behavior_config(&self, nav: &NavConfig, fallback_seed: u64) -> BehaviorConfig {
        BehaviorConfig::new(self.pattern.clone(), self.tile)
            .with_cooldown(self.cooldown.unwrap_or(nav.decision_cooldown))
            .with_diagonal(self.diagonal)
            .with_seed(self.seed.unwrap_or(fallback_seed))
    }

    /// Speeds, cooldowns and pattern parameters that would stall the NPC
    fn validate_tuning(&self, grid: &TileGrid) -> Result<(), ConfigError> {
        let invalid =
            |what: String| Err(ConfigError::Invalid(format!("npc '{}': {what}", self.id)));

        if !(self.speed.is_finite() && self.speed > 0.0) {
            return invalid(format!("speed must be positive, got {}", self.speed));
        }
        if let Some(cooldown) = self.cooldown {
            if !(cooldown.is_finite() && cooldown >= 0.0) {
                return invalid(format!("cooldown must be zero or more, got {cooldown}"));
            }
        }

        match &self.pattern {
            PatternConfig::Static { turn_chance } if !(0.0..=1.0).contains(turn_chance) => {
                invalid(format!("turn chance must be within 0..=1, got {turn_chance}"))
            }
            PatternConfig::Patrol { waypoints } => {
                match waypoints.iter().find(|&&waypoint| !grid.in_bounds(waypoint)) {
                    Some(waypoint) => invalid(format!("waypoint {waypoint} is outside the grid")),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Area Definitions
// ============================================================================

/// A loadable area: collision rows, spawns, and ledges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDefinition {
    pub name: String,
    #[serde(default)]
    pub nav: NavConfig,
    /// ASCII collision rows, `#` = blocked
    pub rows: Vec<String>,
    /// Player spawn tile
    pub player: GridPosition,
    #[serde(default)]
    pub npcs: Vec<NpcDefinition>,
    /// One-way ledges; when empty, any ledge may be jumped from either side
    #[serde(default)]
    pub ledges: Vec<Ledge>,
}

impl AreaDefinition {
    /// Parse RON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid area
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let area: AreaDefinition =
            ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        area.validate()?;
        Ok(area)
    }

    /// Parse JSON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid area
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let area: AreaDefinition =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        area.validate()?;
        Ok(area)
    }

    /// Load an area from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid area
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Load an area from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid area
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// Load by file extension (`.json`, anything else is read as RON)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid area
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::load_json(path)
        } else {
            Self::load_ron(path)
        }
    }

    /// Build the collision grid
    #[must_use]
    pub fn grid(&self) -> TileGrid {
        TileGrid::from_rows(&self.rows)
    }

    /// Ledge rule for this area
    #[must_use]
    pub fn ledge_rule(&self) -> LedgeRule {
        if self.ledges.is_empty() {
            LedgeRule::any_direction()
        } else {
            LedgeRule::one_way(self.ledges.iter().copied())
        }
    }

    /// Check spawns and references against the grid
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = self.grid();

        if !grid.in_bounds(self.player) || !grid.is_open(self.player) {
            return Err(ConfigError::Invalid(format!(
                "player spawn {} is blocked or outside the {}x{} grid",
                self.player,
                grid.width(),
                grid.height()
            )));
        }

        if !(self.nav.tile_size.is_finite() && self.nav.tile_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tile size must be positive, got {}",
                self.nav.tile_size
            )));
        }
        if !(self.nav.decision_cooldown.is_finite() && self.nav.decision_cooldown >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "decision cooldown must be zero or more, got {}",
                self.nav.decision_cooldown
            )));
        }

        let mut ids = FxHashSet::default();
        for npc in &self.npcs {
            npc.validate_tuning(&grid)?;
            if !ids.insert(npc.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate npc id '{}'", npc.id)));
            }
            if !grid.is_open(npc.tile) {
                return Err(ConfigError::Invalid(format!(
                    "npc '{}' spawns on blocked tile {}",
                    npc.id, npc.tile
                )));
            }
            if npc.pattern.needs_target() && npc.target.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "npc '{}' has a {:?} pattern but no target",
                    npc.id,
                    npc.pattern.kind()
                )));
            }
        }

        for npc in &self.npcs {
            if let Some(TargetRef::Npc(other)) = &npc.target {
                if other == &npc.id || !ids.contains(other.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "npc '{}' targets unknown npc '{}'",
                        npc.id, other
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Errors that can occur while loading configuration
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// File system error
    Io(String),
    /// Malformed RON or JSON
    Parse(String),
    /// Well-formed but inconsistent data
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Invalid(e) => write!(f, "Invalid area: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
