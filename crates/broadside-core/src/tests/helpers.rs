//! Test setup shared by the scenario and scheduler tests.

use std::collections::BTreeMap;

use tokio::sync::broadcast;

use crate::actions::{ActionEffect, ActionReport};
use crate::battle::{Battle, GridBounds};
use crate::config::{BattleConfig, EnemySpawn, PlayerSpawn};
use crate::entity::{ArmorProfile, GridPos, ShipClass, UnitId, UnitKind};
use crate::events::BattleEvent;
use crate::objective::{Objective, ObjectiveKind};
use crate::templates::{TemplateCatalog, UnitTemplate};
use crate::weather::Weather;

// =============================================================================
// Battles
// =============================================================================

/// Empty 20x20 battle in clear weather.
pub fn battle_with(kind: ObjectiveKind) -> Battle {
    Battle::new(GridBounds::new(20, 20), Weather::Clear, Objective::new(kind))
}

/// Spawns a standard template at `(x, y)`.
pub fn spawn(battle: &mut Battle, key: &str, kind: UnitKind, x: i32, y: i32) -> UnitId {
    let catalog = TemplateCatalog::standard();
    battle.spawn(key, catalog.get(key).unwrap(), kind, GridPos::new(x, y))
}

/// Stationary, unarmed, unarmored hull with one hit point.
pub fn hulk_template() -> UnitTemplate {
    UnitTemplate {
        name: "Derelict".into(),
        class: ShipClass::Auxiliary,
        max_health: 1,
        armor: ArmorProfile::uniform(0.0),
        weapons: BTreeMap::new(),
        speed: 0,
        base_accuracy: 0.5,
        evasion: 0.0,
        hangar: 0,
    }
}

// =============================================================================
// Configurations
// =============================================================================

/// One player destroyer and one distant oiler; a single round; fixed
/// weather.
pub fn duel_config() -> BattleConfig {
    BattleConfig {
        seed: 42,
        dynamic_weather: false,
        max_rounds: 1,
        players: vec![PlayerSpawn::new("ayla", "destroyer", GridPos::new(2, 2))],
        enemies: vec![EnemySpawn::new("auxiliary", GridPos::new(18, 18))],
        ..BattleConfig::default()
    }
}

/// AI-only roster: nobody to play until someone joins.
pub fn empty_config() -> BattleConfig {
    BattleConfig {
        players: Vec::new(),
        ..duel_config()
    }
}

// =============================================================================
// Events
// =============================================================================

/// Receives events until one matches.
pub async fn next_matching(
    events: &mut broadcast::Receiver<BattleEvent>,
    matches: impl Fn(&BattleEvent) -> bool,
) -> BattleEvent {
    loop {
        let event = events.recv().await.unwrap();
        if matches(&event) {
            return event;
        }
    }
}

/// Returns `true` if the report records a kill.
pub fn destroyed_target(report: &ActionReport) -> bool {
    matches!(&report.effect, ActionEffect::Attacked { report, .. } if report.destroyed)
}
