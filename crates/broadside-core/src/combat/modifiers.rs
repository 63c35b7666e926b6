//! Gunnery tables: accuracy, range falloff, overpenetration, penetration.
//!
//! All functions here are pure and take plain numbers so they can be
//! property-tested in isolation.

use crate::entity::{AmmoType, ShipClass, SizeClass, WeaponSlot};
use crate::weather::Weather;

/// Lowest hit chance any attack can have.
pub const MIN_ACCURACY: f32 = 0.05;
/// Highest hit chance any attack can have.
pub const MAX_ACCURACY: f32 = 0.95;
/// Accuracy lost at full weapon range.
pub const RANGE_ACCURACY_PENALTY: f32 = 0.3;
/// Accuracy lost per point of target evasion.
pub const EVASION_ACCURACY_PENALTY: f32 = 0.2;

/// Chance of a critical hit.
pub const CRITICAL_CHANCE: f64 = 0.05;
/// Damage multiplier of a critical hit.
pub const CRITICAL_MULTIPLIER: f32 = 1.5;

/// Chance a non-penetrating shot does nothing at all.
pub const RICOCHET_CHANCE: f64 = 0.7;
/// Fraction of damage a non-penetrating shot deals as spall.
pub const SPALL_FRACTION: f32 = 0.1;

/// Overpenetration multiplier for heavy guns against light hulls.
pub const OVERPEN_HEAVY_VS_LIGHT: f32 = 0.35;
/// Overpenetration multiplier for heavy guns against medium hulls.
pub const OVERPEN_HEAVY_VS_MEDIUM: f32 = 0.70;

/// Chance HE that penetrates starts a fire.
pub const HE_FIRE_CHANCE: f64 = 0.3;
/// Chance a damaging incendiary hit starts a fire.
pub const INCENDIARY_FIRE_CHANCE: f64 = 0.5;
/// Chance a torpedo hit starts flooding.
pub const TORPEDO_FLOOD_CHANCE: f64 = 0.4;

/// Steepness of the penetration curve.
const PENETRATION_STEEPNESS: f64 = 5.0;

/// Hit chance of one attack.
///
/// `range_ratio` is distance over maximum weapon range; anything past 1.0 is
/// penalised as if at full range.
///
/// # Example
///
/// ```
/// use broadside_core::combat::modifiers::accuracy;
/// use broadside_core::weather::Weather;
///
/// let acc = accuracy(0.70, 0.5, 0.2, Weather::Clear);
/// assert!((acc - 0.51).abs() < 1e-6);
/// ```
#[must_use]
pub fn accuracy(base: f32, range_ratio: f32, evasion: f32, weather: Weather) -> f32 {
    let raw = base
        - range_ratio.clamp(0.0, 1.0) * RANGE_ACCURACY_PENALTY
        - evasion * EVASION_ACCURACY_PENALTY;
    let adjusted = raw * weather.accuracy_modifier();
    if adjusted.is_nan() {
        return MIN_ACCURACY;
    }
    adjusted.clamp(MIN_ACCURACY, MAX_ACCURACY)
}

/// Damage multiplier by fraction of maximum range.
#[must_use]
pub fn range_modifier(range_ratio: f32) -> f32 {
    match range_ratio {
        r if r <= 0.4 => 1.2,
        r if r <= 0.6 => 1.0,
        r if r <= 0.8 => 0.9,
        r if r <= 1.0 => 0.8,
        _ => 0.7,
    }
}

/// Damage lost when a heavy armor-piercing shell passes straight through a
/// lighter hull.
///
/// Applies to main-battery AP fire from heavy ships only.
#[must_use]
pub fn overpenetration(
    slot: WeaponSlot,
    ammo: AmmoType,
    attacker: ShipClass,
    target: ShipClass,
) -> f32 {
    if slot != WeaponSlot::Main || ammo != AmmoType::Ap {
        return 1.0;
    }
    match (attacker.size_class(), target.size_class()) {
        (SizeClass::Heavy, SizeClass::Light) => OVERPEN_HEAVY_VS_LIGHT,
        (SizeClass::Heavy, SizeClass::Medium) => OVERPEN_HEAVY_VS_MEDIUM,
        _ => 1.0,
    }
}

/// Chance a shell with `penetration` defeats `armor`.
///
/// Logistic in the penetration-to-armor ratio: exactly 0.5 when they are
/// equal. Unarmored targets are always penetrated.
#[must_use]
pub fn penetration_chance(penetration: f32, armor: f32) -> f64 {
    if armor <= 0.0 {
        return 1.0;
    }
    let ratio = f64::from(penetration) / f64::from(armor);
    1.0 / (1.0 + (-PENETRATION_STEEPNESS * (ratio - 1.0)).exp())
}
