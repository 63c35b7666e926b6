//! Damage over time and cooldowns, applied at the start of a unit's turn.

use serde::{Deserialize, Serialize};

use crate::entity::{Combatant, UnitId};

/// Fire damage per turn, percent of maximum health.
pub const FIRE_DAMAGE_PERCENT: u64 = 2;
/// Fire damage per turn never exceeds this.
pub const FIRE_DAMAGE_CAP: u32 = 10;
/// Flooding damage per turn, percent of maximum health.
pub const FLOOD_DAMAGE_PERCENT: u64 = 5;
/// Flooding damage per turn never exceeds this.
pub const FLOOD_DAMAGE_CAP: u32 = 30;

/// What one status tick did to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTick {
    /// Unit ticked.
    pub unit: UnitId,
    /// Health lost to fire.
    pub fire_damage: u32,
    /// Health lost to flooding.
    pub flood_damage: u32,
    /// The fire went out this tick.
    pub fire_out: bool,
    /// The flooding stopped this tick.
    pub flooding_stopped: bool,
    /// The unit died this tick.
    pub destroyed: bool,
}

impl StatusTick {
    /// Total health lost.
    #[must_use]
    pub const fn total_damage(&self) -> u32 {
        self.fire_damage + self.flood_damage
    }

    /// Returns `true` if the tick changed anything worth reporting.
    #[must_use]
    pub const fn is_noteworthy(&self) -> bool {
        self.total_damage() > 0 || self.fire_out || self.flooding_stopped || self.destroyed
    }
}

fn per_turn(max_health: u32, percent: u64, cap: u32) -> u32 {
    let raw = (u64::from(max_health) * percent).div_ceil(100);
    u32::try_from(raw).map_or(cap, |raw| raw.min(cap))
}

/// Fire damage per turn for a hull of this size.
#[must_use]
pub fn fire_damage(max_health: u32) -> u32 {
    per_turn(max_health, FIRE_DAMAGE_PERCENT, FIRE_DAMAGE_CAP)
}

/// Flooding damage per turn for a hull of this size.
#[must_use]
pub fn flood_damage(max_health: u32) -> u32 {
    per_turn(max_health, FLOOD_DAMAGE_PERCENT, FLOOD_DAMAGE_CAP)
}

/// Applies one turn of fire, flooding and cooldown decay.
///
/// Order: fire damage and timer, flooding damage and timer, damage-control
/// cooldown, then the death check. Dead units are left untouched.
///
/// # Example
///
/// ```
/// use broadside_core::effects::tick;
/// use broadside_core::entity::{Combatant, GridPos, StatusEffect, UnitId, UnitKind};
/// use broadside_core::templates::TemplateCatalog;
///
/// let catalog = TemplateCatalog::standard();
/// let mut ship = Combatant::from_template(
///     UnitId::new(1), "destroyer", catalog.get("destroyer").unwrap(),
///     UnitKind::enemy(), GridPos::ZERO,
/// );
/// ship.apply_status_effect(StatusEffect::Ignite);
/// let report = tick(&mut ship);
/// assert_eq!(report.fire_damage, 6);
/// ```
pub fn tick(unit: &mut Combatant) -> StatusTick {
    let mut report = StatusTick {
        unit: unit.id(),
        fire_damage: 0,
        flood_damage: 0,
        fire_out: false,
        flooding_stopped: false,
        destroyed: false,
    };
    if !unit.is_alive() {
        return report;
    }

    if unit.status.on_fire && unit.status.fire_timer > 0 {
        report.fire_damage = unit.take_damage(fire_damage(unit.max_health()));
        unit.status.fire_timer = unit.status.fire_timer.saturating_sub(1);
        if unit.status.fire_timer == 0 {
            unit.status.on_fire = false;
            report.fire_out = true;
        }
    }

    if unit.status.flooding && unit.status.flood_timer > 0 {
        report.flood_damage = unit.take_damage(flood_damage(unit.max_health()));
        unit.status.flood_timer = unit.status.flood_timer.saturating_sub(1);
        if unit.status.flood_timer == 0 {
            unit.status.flooding = false;
            report.flooding_stopped = true;
        }
    }

    unit.status.damage_control_cooldown = unit.status.damage_control_cooldown.saturating_sub(1);

    report.destroyed = !unit.is_alive();
    report
}
