//! Battle configuration.
//!
//! Every field has a default so a configuration file only needs to name the
//! roster and objective. [`BattleConfig::build`] validates the whole
//! configuration before anything is constructed; a [`ConfigError`] is fatal
//! and no battle exists afterwards.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::battle::{Battle, GridBounds};
use crate::entity::{AiUnit, GridPos, ShipClass, Side, UnitId, UnitKind};
use crate::error::ConfigError;
use crate::objective::{Objective, ObjectiveKind};
use crate::templates::TemplateCatalog;
use crate::weather::Weather;

// =============================================================================
// Timing
// =============================================================================

/// Turn, roleplay and hold timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Seconds a player has to act.
    pub turn_timeout_secs: u64,
    /// Times an accepted action may push the deadline back.
    pub max_timer_resets: u8,
    /// Seconds the roleplay pause lasts.
    pub roleplay_timeout_secs: u64,
    /// Seconds to wait for a player to rejoin once every player unit is lost.
    pub hold_timeout_secs: u64,
    /// Milliseconds between AI actions, for pacing only.
    pub ai_action_delay_ms: u64,
}

impl TimingConfig {
    /// Player turn length.
    #[must_use]
    pub const fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    /// Roleplay pause length.
    #[must_use]
    pub const fn roleplay_timeout(&self) -> Duration {
        Duration::from_secs(self.roleplay_timeout_secs)
    }

    /// Hold state length.
    #[must_use]
    pub const fn hold_timeout(&self) -> Duration {
        Duration::from_secs(self.hold_timeout_secs)
    }

    /// Delay between AI actions.
    #[must_use]
    pub const fn ai_action_delay(&self) -> Duration {
        Duration::from_millis(self.ai_action_delay_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: 300,
            max_timer_resets: 3,
            roleplay_timeout_secs: 300,
            hold_timeout_secs: 600,
            ai_action_delay_ms: 0,
        }
    }
}

// =============================================================================
// Roster
// =============================================================================

fn default_mastery() -> f32 {
    1.0
}

/// A human player's ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSpawn {
    /// Controlling player.
    pub owner: String,
    /// Template key.
    pub template: String,
    /// Starting cell.
    pub position: GridPos,
    /// Equipment mastery damage multiplier.
    #[serde(default = "default_mastery")]
    pub mastery: f32,
}

impl PlayerSpawn {
    /// Creates a spawn with default mastery.
    #[must_use]
    pub fn new(owner: impl Into<String>, template: impl Into<String>, position: GridPos) -> Self {
        Self {
            owner: owner.into(),
            template: template.into(),
            position,
            mastery: 1.0,
        }
    }
}

/// A computer-controlled unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySpawn {
    /// Template key.
    pub template: String,
    /// Starting cell.
    pub position: GridPos,
    /// Name objectives refer to.
    #[serde(default)]
    pub designation: Option<String>,
    /// Side; allied AI units are escorts.
    #[serde(default = "default_enemy_side")]
    pub side: Side,
    /// Cell to steam toward.
    #[serde(default)]
    pub waypoint: Option<GridPos>,
}

fn default_enemy_side() -> Side {
    Side::Enemy
}

impl EnemySpawn {
    /// Creates a hostile spawn.
    #[must_use]
    pub fn new(template: impl Into<String>, position: GridPos) -> Self {
        Self {
            template: template.into(),
            position,
            designation: None,
            side: Side::Enemy,
            waypoint: None,
        }
    }

    /// Sets the designation.
    #[must_use]
    pub fn designated(mut self, designation: impl Into<String>) -> Self {
        self.designation = Some(designation.into());
        self
    }

    /// Sets the side.
    #[must_use]
    pub fn on_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Sets the waypoint.
    #[must_use]
    pub fn heading_to(mut self, waypoint: GridPos) -> Self {
        self.waypoint = Some(waypoint);
        self
    }
}

// =============================================================================
// Battle
// =============================================================================

/// Full description of a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Seed for every random draw.
    pub seed: u64,
    /// Map size.
    pub grid: GridBounds,
    /// Starting weather.
    pub weather: Weather,
    /// Roll weather changes each round.
    pub dynamic_weather: bool,
    /// Pause player turns for narration once action points run out.
    pub roleplay: bool,
    /// Wait for an explicit start signal before the first round.
    pub wait_for_start: bool,
    /// Rounds before the battle is called a stalemate.
    pub max_rounds: u32,
    /// Timers.
    pub timing: TimingConfig,
    /// Win condition.
    pub objective: Objective,
    /// Player ships.
    pub players: Vec<PlayerSpawn>,
    /// AI ships, emplacements and escorts.
    pub enemies: Vec<EnemySpawn>,
    /// Templates added to, or replacing, the built-in catalog.
    pub templates: TemplateCatalog,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            grid: GridBounds::default(),
            weather: Weather::Clear,
            dynamic_weather: true,
            roleplay: false,
            wait_for_start: false,
            max_rounds: 200,
            timing: TimingConfig::default(),
            objective: Objective::default(),
            players: Vec::new(),
            enemies: Vec::new(),
            templates: TemplateCatalog::new(),
        }
    }
}

impl BattleConfig {
    /// Built-in catalog with this configuration's templates merged in.
    #[must_use]
    pub fn catalog(&self) -> TemplateCatalog {
        let mut catalog = TemplateCatalog::standard();
        catalog.merge(&self.templates);
        catalog
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<TemplateCatalog, ConfigError> {
        let setting = |field: &'static str, reason: &str| ConfigError::InvalidSetting {
            field,
            reason: reason.to_string(),
        };

        if self.grid.width <= 0 || self.grid.height <= 0 {
            return Err(setting("grid", "width and height must be positive"));
        }
        if self.max_rounds == 0 {
            return Err(setting("max_rounds", "must be positive"));
        }
        if self.timing.turn_timeout_secs == 0 {
            return Err(setting("timing.turn_timeout_secs", "must be positive"));
        }
        if self.timing.roleplay_timeout_secs == 0 {
            return Err(setting("timing.roleplay_timeout_secs", "must be positive"));
        }
        if self.timing.hold_timeout_secs == 0 {
            return Err(setting("timing.hold_timeout_secs", "must be positive"));
        }

        let catalog = self.catalog();
        catalog.validate()?;

        let mut occupied = HashSet::new();
        let spawns = self
            .players
            .iter()
            .map(|p| (&p.template, p.position))
            .chain(self.enemies.iter().map(|e| (&e.template, e.position)));
        for (template, position) in spawns {
            check_spawn(&catalog, self.grid, template, position, &mut occupied)?;
        }
        for player in &self.players {
            if player.mastery <= 0.0 || !player.mastery.is_finite() {
                return Err(setting("players.mastery", "must be positive"));
            }
            if catalog.get(&player.template)?.class == ShipClass::AirSquadron {
                return Err(ConfigError::InvalidSpawn {
                    template: player.template.clone(),
                    x: player.position.x,
                    y: player.position.y,
                    reason: "squadrons can only be launched from carriers".into(),
                });
            }
        }

        self.validate_objective()?;
        Ok(catalog)
    }

    fn validate_objective(&self) -> Result<(), ConfigError> {
        let designated = |name: &str| {
            self.enemies
                .iter()
                .filter(|e| e.designation.as_deref() == Some(name))
                .collect::<Vec<_>>()
        };
        let invalid = |reason: String| Err(ConfigError::InvalidObjective(reason));

        match &self.objective.kind {
            ObjectiveKind::DestroyAll | ObjectiveKind::Salvage { .. } => Ok(()),
            ObjectiveKind::DefeatBoss { designation } => {
                match designated(designation).as_slice() {
                    [boss] if boss.side == Side::Enemy => Ok(()),
                    [_] => invalid(format!("boss '{designation}' must be hostile")),
                    [] => invalid(format!("no unit designated '{designation}'")),
                    _ => invalid(format!("'{designation}' designates more than one unit")),
                }
            }
            ObjectiveKind::Escort {
                designation,
                destination,
                radius,
            } => {
                if !self.grid.contains(*destination) || *radius < 0.0 {
                    return invalid("escort destination must be on the grid".into());
                }
                match designated(designation).as_slice() {
                    [escort] if escort.side == Side::Allied => Ok(()),
                    [_] => invalid(format!("escort '{designation}' must be allied")),
                    [] => invalid(format!("no unit designated '{designation}'")),
                    _ => invalid(format!("'{designation}' designates more than one unit")),
                }
            }
            ObjectiveKind::CaptureOutpost {
                position,
                radius,
                turns_required,
            } => {
                if !self.grid.contains(*position) || *radius <= 0.0 || *turns_required == 0 {
                    return invalid(
                        "outpost must be on the grid with positive radius and hold time".into(),
                    );
                }
                Ok(())
            }
            ObjectiveKind::ResourceAcquisition { cells, required } => {
                if cells.iter().any(|c| !self.grid.contains(*c)) {
                    return invalid("resource cell off the grid".into());
                }
                if *required == 0 || *required > cells.len() {
                    return invalid(format!(
                        "{required} resources required but {} cells exist",
                        cells.len()
                    ));
                }
                Ok(())
            }
            ObjectiveKind::ConvoyInterception {
                designation,
                destination,
                required_sunk,
                ..
            } => {
                if !self.grid.contains(*destination) {
                    return invalid("convoy destination must be on the grid".into());
                }
                let convoy = designated(designation);
                if convoy.iter().any(|e| e.side != Side::Enemy) {
                    return invalid(format!("convoy '{designation}' must be hostile"));
                }
                if *required_sunk == 0 || *required_sunk > convoy.len() {
                    return invalid(format!(
                        "{required_sunk} convoy ships must be sunk but {} exist",
                        convoy.len()
                    ));
                }
                Ok(())
            }
        }
    }

    /// Validates the configuration and builds the battle it describes.
    ///
    /// Players spawn first, then AI units, each in listed order.
    ///
    /// # Errors
    ///
    /// Returns the first problem found; no battle is built in that case.
    pub fn build(&self) -> Result<(Battle, TemplateCatalog), ConfigError> {
        let catalog = self.validate()?;
        let mut battle = Battle::new(self.grid, self.weather, self.objective.clone())
            .with_roleplay(self.roleplay);

        for player in &self.players {
            spawn_player(&mut battle, &catalog, player)?;
        }
        for enemy in &self.enemies {
            let template = catalog.get(&enemy.template)?;
            let kind = UnitKind::Ai(AiUnit {
                side: Some(enemy.side),
                waypoint: enemy.waypoint,
            });
            let id = battle.spawn(&enemy.template, template, kind, enemy.position);
            if let Some(unit) = battle.get_mut(id) {
                unit.designation.clone_from(&enemy.designation);
            }
        }
        Ok((battle, catalog))
    }
}

fn check_spawn(
    catalog: &TemplateCatalog,
    grid: GridBounds,
    template: &str,
    position: GridPos,
    occupied: &mut HashSet<GridPos>,
) -> Result<(), ConfigError> {
    catalog.get(template)?;
    let invalid = |reason: &str| ConfigError::InvalidSpawn {
        template: template.to_string(),
        x: position.x,
        y: position.y,
        reason: reason.to_string(),
    };
    if !grid.contains(position) {
        return Err(invalid("position is off the grid"));
    }
    if !occupied.insert(position) {
        return Err(invalid("position is already taken"));
    }
    Ok(())
}

/// Adds a player to a battle, checking the template and the cell.
///
/// # Errors
///
/// Returns [`ConfigError`] if the template is unknown or the cell is off
/// the grid or occupied.
pub fn spawn_player(
    battle: &mut Battle,
    catalog: &TemplateCatalog,
    spawn: &PlayerSpawn,
) -> Result<UnitId, ConfigError> {
    let template = catalog.get(&spawn.template)?;
    let invalid = |reason: &str| ConfigError::InvalidSpawn {
        template: spawn.template.clone(),
        x: spawn.position.x,
        y: spawn.position.y,
        reason: reason.to_string(),
    };
    if template.class == ShipClass::AirSquadron {
        return Err(invalid("squadrons can only be launched from carriers"));
    }
    if !battle.grid.contains(spawn.position) {
        return Err(invalid("position is off the grid"));
    }
    if battle.occupant(spawn.position).is_some() {
        return Err(invalid("position is already taken"));
    }
    let id = battle.spawn(
        &spawn.template,
        template,
        UnitKind::player(spawn.owner.clone()),
        spawn.position,
    );
    if let Some(unit) = battle.get_mut(id) {
        unit.mastery = spawn.mastery;
    }
    Ok(id)
}
