//! Attack resolution.
//!
//! Resolving an attack is split in two:
//!
//! 1. [`CombatResolver::resolve`] reads attacker and target and rolls the
//!    dice, producing an [`AttackOutcome`]. Nothing is mutated.
//! 2. [`apply_outcome`] writes the outcome onto the target.
//!
//! # Draw Order
//!
//! Draws are taken in a fixed order so scripted dice line up with the
//! rules: hit, critical, penetration, ricochet (only if not penetrated),
//! fire (only if eligible), flooding (only for torpedoes). A miss consumes
//! exactly one draw.
//!
//! # Example
//!
//! ```
//! use broadside_core::combat::CombatResolver;
//! use broadside_core::dice::ScriptedDice;
//! use broadside_core::entity::{AmmoType, Combatant, GridPos, UnitId, UnitKind, WeaponSlot};
//! use broadside_core::templates::TemplateCatalog;
//! use broadside_core::weather::Weather;
//!
//! let catalog = TemplateCatalog::standard();
//! let bb = Combatant::from_template(
//!     UnitId::new(1), "battleship", catalog.get("battleship").unwrap(),
//!     UnitKind::player("ayla"), GridPos::new(0, 0),
//! );
//! let dd = Combatant::from_template(
//!     UnitId::new(2), "destroyer", catalog.get("destroyer").unwrap(),
//!     UnitKind::enemy(), GridPos::new(6, 0),
//! );
//!
//! // hit, no crit, penetrate
//! let mut dice = ScriptedDice::new([0.0, 0.9, 0.0]);
//! let outcome = CombatResolver::resolve(&bb, &dd, WeaponSlot::Main, AmmoType::Ap, Weather::Clear, &mut dice).unwrap();
//! assert!(outcome.hit && outcome.penetrated);
//! ```

pub mod modifiers;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::dice::Dice;
use crate::entity::{AmmoType, Combatant, StatusEffect, WeaponSlot};
use crate::error::ValidationError;
use crate::weather::Weather;

use self::modifiers::{
    accuracy, overpenetration, penetration_chance, range_modifier, CRITICAL_CHANCE,
    CRITICAL_MULTIPLIER, HE_FIRE_CHANCE, INCENDIARY_FIRE_CHANCE, RICOCHET_CHANCE, SPALL_FRACTION,
    TORPEDO_FLOOD_CHANCE,
};

/// Result of one attack roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    /// The shot connected.
    pub hit: bool,
    /// Damage to apply, already rounded.
    pub damage: u32,
    /// The shell defeated the struck armor.
    pub penetrated: bool,
    /// The hit was a critical.
    pub critical: bool,
    /// The hit starts a fire.
    pub ignited: bool,
    /// The hit starts flooding.
    pub flooded: bool,
    /// Hit chance the roll was made against.
    pub accuracy: f32,
    /// Distance to the target in cells.
    pub distance: f32,
}

/// What applying an outcome did to the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    /// Health actually removed.
    pub dealt: u32,
    /// The target died from this hit.
    pub destroyed: bool,
}

/// Pure attack maths.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatResolver;

impl CombatResolver {
    /// Fraction of the weapon's range the target sits at.
    fn range_ratio(distance: f32, range: f32) -> f32 {
        if range > 0.0 {
            distance / range
        } else {
            f32::INFINITY
        }
    }

    /// Hit chance for an attack, without rolling.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoWeapon`] if the slot is empty.
    pub fn hit_chance(
        attacker: &Combatant,
        target: &Combatant,
        slot: WeaponSlot,
        weather: Weather,
    ) -> Result<f32, ValidationError> {
        let weapon = attacker
            .weapon(slot)
            .ok_or(ValidationError::NoWeapon(slot))?;
        let ratio = Self::range_ratio(attacker.distance_to(target.position), weapon.range);
        Ok(accuracy(attacker.base_accuracy, ratio, target.evasion, weather))
    }

    /// Damage a hit would do before critical and penetration rolls.
    fn base_damage(
        attacker: &Combatant,
        target: &Combatant,
        slot: WeaponSlot,
        ammo: AmmoType,
        ratio: f32,
    ) -> Result<f32, ValidationError> {
        let weapon = attacker
            .weapon(slot)
            .ok_or(ValidationError::NoWeapon(slot))?;
        #[allow(clippy::cast_precision_loss)]
        let damage = weapon.damage as f32
            * attacker.mastery
            * range_modifier(ratio)
            * weapon.ammo_modifier(ammo)
            * overpenetration(slot, ammo, attacker.class, target.class);
        Ok(damage)
    }

    /// Rolls one attack.
    ///
    /// The attacker's ammunition is not consumed and range is not enforced;
    /// callers check both before resolving. A target past maximum range is
    /// treated as the longest range bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoWeapon`] if the slot is empty,
    /// [`ValidationError::IncompatibleAmmo`] if the slot cannot fire the
    /// ammunition, and [`ValidationError::InvalidTarget`] if the target is
    /// already dead.
    pub fn resolve(
        attacker: &Combatant,
        target: &Combatant,
        slot: WeaponSlot,
        ammo: AmmoType,
        weather: Weather,
        dice: &mut dyn Dice,
    ) -> Result<AttackOutcome, ValidationError> {
        if !target.is_alive() {
            return Err(ValidationError::InvalidTarget(target.id()));
        }
        if !slot.accepts(ammo) {
            return Err(ValidationError::IncompatibleAmmo { slot, ammo });
        }
        let weapon = attacker
            .weapon(slot)
            .ok_or(ValidationError::NoWeapon(slot))?;

        let distance = attacker.distance_to(target.position);
        let ratio = Self::range_ratio(distance, weapon.range);
        let hit_chance = accuracy(attacker.base_accuracy, ratio, target.evasion, weather);

        let mut outcome = AttackOutcome {
            accuracy: hit_chance,
            distance,
            ..AttackOutcome::default()
        };

        if dice.roll() > f64::from(hit_chance) {
            trace!(attacker = %attacker.id(), target = %target.id(), "miss");
            return Ok(outcome);
        }
        outcome.hit = true;

        let mut damage = Self::base_damage(attacker, target, slot, ammo, ratio)?;

        if dice.chance(CRITICAL_CHANCE) {
            outcome.critical = true;
            damage *= CRITICAL_MULTIPLIER;
        }

        let armor = target.armor.facing(slot, ratio);
        outcome.penetrated = dice.chance(penetration_chance(weapon.penetration, armor));
        if !outcome.penetrated {
            damage = if dice.chance(RICOCHET_CHANCE) {
                0.0
            } else {
                damage * SPALL_FRACTION
            };
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rounded = damage.max(0.0).round() as u32;
        outcome.damage = rounded;

        let fire_chance = match ammo {
            AmmoType::He if outcome.penetrated => Some(HE_FIRE_CHANCE),
            AmmoType::Incendiary if outcome.damage > 0 => Some(INCENDIARY_FIRE_CHANCE),
            _ => None,
        };
        if let Some(chance) = fire_chance {
            outcome.ignited = dice.chance(chance);
        }
        if ammo == AmmoType::Torpedo {
            outcome.flooded = dice.chance(TORPEDO_FLOOD_CHANCE);
        }

        trace!(
            attacker = %attacker.id(),
            target = %target.id(),
            damage = outcome.damage,
            penetrated = outcome.penetrated,
            critical = outcome.critical,
            "hit"
        );
        Ok(outcome)
    }

    /// Expected damage of one attack, averaged over every roll.
    ///
    /// Used by the AI to rank weapons. Returns zero for empty slots or
    /// incompatible ammunition.
    #[must_use]
    pub fn expected_damage(
        attacker: &Combatant,
        target: &Combatant,
        slot: WeaponSlot,
        ammo: AmmoType,
        weather: Weather,
    ) -> f32 {
        let Some(weapon) = attacker.weapon(slot) else {
            return 0.0;
        };
        if !slot.accepts(ammo) {
            return 0.0;
        }
        let ratio = Self::range_ratio(attacker.distance_to(target.position), weapon.range);
        let hit = accuracy(attacker.base_accuracy, ratio, target.evasion, weather);
        let Ok(base) = Self::base_damage(attacker, target, slot, ammo, ratio) else {
            return 0.0;
        };

        #[allow(clippy::cast_possible_truncation)]
        let crit_factor = (1.0 + CRITICAL_CHANCE * f64::from(CRITICAL_MULTIPLIER - 1.0)) as f32;
        let pen = penetration_chance(weapon.penetration, target.armor.facing(slot, ratio));
        #[allow(clippy::cast_possible_truncation)]
        let pen_factor =
            (pen + (1.0 - pen) * (1.0 - RICOCHET_CHANCE) * f64::from(SPALL_FRACTION)) as f32;

        hit * base * crit_factor * pen_factor
    }
}

/// Writes an attack outcome onto its target.
///
/// Damage is applied first; fire and flooding are only started on a target
/// that survives the hit.
pub fn apply_outcome(target: &mut Combatant, outcome: &AttackOutcome) -> DamageReport {
    if !outcome.hit {
        return DamageReport::default();
    }
    let was_alive = target.is_alive();
    let dealt = target.take_damage(outcome.damage);
    if outcome.ignited {
        target.apply_status_effect(StatusEffect::Ignite);
    }
    if outcome.flooded {
        target.apply_status_effect(StatusEffect::Flood);
    }
    DamageReport {
        dealt,
        destroyed: was_alive && !target.is_alive(),
    }
}
