//! Unit actions and their validation.
//!
//! Players and the AI submit the same [`Action`] values. [`apply_action`]
//! checks every precondition before touching the battle, so a rejected
//! action leaves no trace: no action points spent, no ammunition used.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::battle::Battle;
use crate::combat::{apply_outcome, AttackOutcome, CombatResolver, DamageReport};
use crate::dice::Dice;
use crate::entity::{
    ActionPoints, Aircraft, AircraftType, AmmoType, Capabilities, GridPos, UnitId, UnitKind,
    WeaponSlot, DAMAGE_CONTROL_COOLDOWN,
};
use crate::error::ValidationError;
use crate::objective::record_arrival;
use crate::templates::TemplateCatalog;

/// Something a unit does with its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Move to a cell within speed.
    Move {
        /// Destination.
        to: GridPos,
    },
    /// Fire one weapon at one target.
    Attack {
        /// Weapon to fire.
        slot: WeaponSlot,
        /// Ammunition to load.
        ammo: AmmoType,
        /// Target unit.
        target: UnitId,
    },
    /// Launch a squadron. Uses every remaining action point.
    LaunchAircraft {
        /// Squadron role.
        squadron: AircraftType,
    },
    /// Put out fires and stop flooding.
    DamageControl,
    /// Finish the turn early.
    EndTurn,
}

impl Action {
    /// Action points the action needs.
    #[must_use]
    pub const fn cost(&self) -> u8 {
        match self {
            Self::EndTurn => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move { to } => write!(f, "move to ({}, {})", to.x, to.y),
            Self::Attack { slot, ammo, target } => {
                write!(f, "fire {slot} {ammo} at unit {target}")
            }
            Self::LaunchAircraft { squadron } => write!(f, "launch {squadron} squadron"),
            Self::DamageControl => write!(f, "damage control"),
            Self::EndTurn => write!(f, "end turn"),
        }
    }
}

/// What an accepted action did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ActionEffect {
    /// The unit moved.
    Moved {
        /// Starting cell.
        from: GridPos,
        /// Final cell.
        to: GridPos,
    },
    /// The unit fired.
    Attacked {
        /// Target unit.
        target: UnitId,
        /// Roll result.
        outcome: AttackOutcome,
        /// Damage actually applied.
        report: DamageReport,
    },
    /// A squadron took off.
    Launched {
        /// New squadron's id.
        squadron: UnitId,
        /// Squadron role.
        kind: AircraftType,
        /// Cell it launched into.
        position: GridPos,
    },
    /// Fires and flooding were dealt with.
    Repaired,
    /// The unit gave up the rest of its turn.
    EndedTurn,
}

/// Accepted action and its effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    /// Acting unit.
    pub unit: UnitId,
    /// Action taken.
    pub action: Action,
    /// Result.
    pub effect: ActionEffect,
    /// Points left after the action.
    pub action_points_remaining: u8,
}

impl ActionReport {
    /// Returns `true` if no further action is possible this turn.
    #[must_use]
    pub fn ends_turn(&self) -> bool {
        matches!(self.action, Action::EndTurn) || self.action_points_remaining == 0
    }
}

/// Checks whether `unit` may take `action` right now.
///
/// # Errors
///
/// Returns the first failed precondition.
pub fn validate(
    battle: &Battle,
    catalog: &TemplateCatalog,
    unit: UnitId,
    action: &Action,
) -> Result<(), ValidationError> {
    let actor = battle
        .get(unit)
        .filter(|u| u.is_alive())
        .ok_or(ValidationError::UnitUnavailable(unit))?;

    let remaining = actor.action_points().remaining();
    let needed = action.cost();
    if needed > remaining {
        return Err(ValidationError::InsufficientActionPoints { needed, remaining });
    }

    match *action {
        Action::Move { to } => {
            if !actor.can(Capabilities::MOBILE) || actor.speed == 0 {
                return Err(ValidationError::Immobile(unit));
            }
            if !battle.grid.contains(to) {
                return Err(ValidationError::OffGrid { x: to.x, y: to.y });
            }
            if battle.occupant(to).is_some() {
                return Err(ValidationError::Occupied { x: to.x, y: to.y });
            }
            let distance = actor.distance_to(to);
            #[allow(clippy::cast_precision_loss)]
            let reach = actor.speed as f32;
            if distance > reach {
                return Err(ValidationError::TooFar {
                    distance,
                    speed: actor.speed,
                });
            }
        }
        Action::Attack { slot, ammo, target } => {
            let weapon = actor.weapon(slot).ok_or(ValidationError::NoWeapon(slot))?;
            if !slot.accepts(ammo) {
                return Err(ValidationError::IncompatibleAmmo { slot, ammo });
            }
            if actor.ammo_for(slot) == 0 {
                return Err(ValidationError::OutOfAmmo(slot));
            }
            let victim = battle
                .get(target)
                .filter(|t| t.is_alive() && t.id() != unit && t.side() != actor.side())
                .ok_or(ValidationError::InvalidTarget(target))?;
            let distance = actor.distance_to(victim.position);
            if distance > weapon.range {
                return Err(ValidationError::OutOfRange {
                    distance,
                    range: weapon.range,
                });
            }
        }
        Action::LaunchAircraft { squadron } => {
            if !actor.can(Capabilities::HANGAR) || actor.hangar == 0 {
                return Err(ValidationError::NoAircraft);
            }
            if !catalog.contains(squadron.template_key()) {
                return Err(ValidationError::NoAircraft);
            }
            if battle.free_cell_near(actor.position, 1).is_none() {
                return Err(ValidationError::NoLaunchSpace);
            }
        }
        Action::DamageControl => {
            if !actor.can(Capabilities::DAMAGE_CONTROL) {
                return Err(ValidationError::NothingToRepair);
            }
            if actor.status.damage_control_cooldown > 0 {
                return Err(ValidationError::DamageControlCooldown(
                    actor.status.damage_control_cooldown,
                ));
            }
            if !actor.status.is_afflicted() {
                return Err(ValidationError::NothingToRepair);
            }
        }
        Action::EndTurn => {}
    }
    Ok(())
}

/// Validates and carries out an action.
///
/// # Errors
///
/// Returns a [`ValidationError`] and leaves the battle untouched if any
/// precondition fails.
pub fn apply_action(
    battle: &mut Battle,
    catalog: &TemplateCatalog,
    unit: UnitId,
    action: &Action,
    dice: &mut dyn Dice,
) -> Result<ActionReport, ValidationError> {
    validate(battle, catalog, unit, action)?;

    let effect = match *action {
        Action::Move { to } => {
            let actor = battle
                .get_mut(unit)
                .ok_or(ValidationError::UnitUnavailable(unit))?;
            spend(actor.action_points_mut(), action.cost())?;
            let from = actor.position;
            actor.position = to;
            record_arrival(battle, unit);
            ActionEffect::Moved { from, to }
        }
        Action::Attack { slot, ammo, target } => attack(battle, unit, slot, ammo, target, dice)?,
        Action::LaunchAircraft { squadron } => launch(battle, catalog, unit, squadron)?,
        Action::DamageControl => {
            let actor = battle
                .get_mut(unit)
                .ok_or(ValidationError::UnitUnavailable(unit))?;
            spend(actor.action_points_mut(), action.cost())?;
            actor.status.clear_afflictions();
            actor.status.damage_control_cooldown = DAMAGE_CONTROL_COOLDOWN;
            ActionEffect::Repaired
        }
        Action::EndTurn => ActionEffect::EndedTurn,
    };

    let action_points_remaining = battle
        .get(unit)
        .map_or(0, |u| u.action_points().remaining());
    debug!(unit = %unit, action = %action, remaining = action_points_remaining, "action applied");

    Ok(ActionReport {
        unit,
        action: *action,
        effect,
        action_points_remaining,
    })
}

fn spend(points: &mut ActionPoints, cost: u8) -> Result<(), ValidationError> {
    points
        .spend(cost)
        .map_err(|remaining| ValidationError::InsufficientActionPoints {
            needed: cost,
            remaining,
        })
}

fn attack(
    battle: &mut Battle,
    unit: UnitId,
    slot: WeaponSlot,
    ammo: AmmoType,
    target: UnitId,
    dice: &mut dyn Dice,
) -> Result<ActionEffect, ValidationError> {
    let weather = battle.weather;
    let outcome = {
        let attacker = battle
            .get(unit)
            .ok_or(ValidationError::UnitUnavailable(unit))?;
        let victim = battle
            .get(target)
            .ok_or(ValidationError::InvalidTarget(target))?;
        CombatResolver::resolve(attacker, victim, slot, ammo, weather, dice)?
    };

    if let Some(attacker) = battle.get_mut(unit) {
        spend(attacker.action_points_mut(), 1)?;
        if let Some(rounds) = attacker.ammo.get_mut(&slot) {
            *rounds = rounds.saturating_sub(1);
        }
    }
    let report = battle
        .get_mut(target)
        .map(|victim| apply_outcome(victim, &outcome))
        .unwrap_or_default();
    battle
        .stats_mut(unit)
        .record_attack(outcome.hit, report.dealt, report.destroyed);

    Ok(ActionEffect::Attacked {
        target,
        outcome,
        report,
    })
}

fn launch(
    battle: &mut Battle,
    catalog: &TemplateCatalog,
    unit: UnitId,
    squadron: AircraftType,
) -> Result<ActionEffect, ValidationError> {
    let template = catalog
        .get(squadron.template_key())
        .map_err(|_| ValidationError::NoAircraft)?;
    let (origin, side) = battle
        .get(unit)
        .map(|u| (u.position, u.side()))
        .ok_or(ValidationError::UnitUnavailable(unit))?;
    let position = battle
        .free_cell_near(origin, 1)
        .ok_or(ValidationError::NoLaunchSpace)?;

    if let Some(carrier) = battle.get_mut(unit) {
        carrier.action_points_mut().drain();
        carrier.hangar -= 1;
    }
    let kind = UnitKind::Aircraft(Aircraft {
        carrier: unit,
        squadron,
        side,
    });
    let id = battle.spawn(squadron.template_key(), template, kind, position);

    Ok(ActionEffect::Launched {
        squadron: id,
        kind: squadron,
        position,
    })
}
