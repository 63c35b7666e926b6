//! Monte Carlo odds for a single engagement.
//!
//! [`estimate`] rolls the same attack many times with the production dice
//! and reports how often it hits, penetrates and crits, and how much damage
//! it does on average. Trials are split into fixed-size chunks, each seeded
//! from the base seed and its chunk index, and the chunks run in parallel
//! with rayon. Totals are summed, so the result depends only on the seed and
//! the trial count, never on thread scheduling.
//!
//! # Example
//!
//! ```
//! use broadside_core::analysis::estimate;
//! use broadside_core::entity::{AmmoType, Combatant, GridPos, UnitId, UnitKind, WeaponSlot};
//! use broadside_core::templates::TemplateCatalog;
//! use broadside_core::weather::Weather;
//!
//! let catalog = TemplateCatalog::standard();
//! let dd = Combatant::from_template(
//!     UnitId::new(1), "destroyer", catalog.get("destroyer").unwrap(),
//!     UnitKind::player("ayla"), GridPos::new(0, 0),
//! );
//! let bb = Combatant::from_template(
//!     UnitId::new(2), "battleship", catalog.get("battleship").unwrap(),
//!     UnitKind::enemy(), GridPos::new(4, 0),
//! );
//!
//! let odds = estimate(&dd, &bb, WeaponSlot::Torpedo, AmmoType::Torpedo, Weather::Clear, 2_000, 7).unwrap();
//! assert!(odds.hit_rate > 0.0 && odds.hit_rate <= 0.95);
//! ```

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::CombatResolver;
use crate::dice::BattleRng;
use crate::entity::{AmmoType, Combatant, WeaponSlot};
use crate::error::ValidationError;
use crate::weather::Weather;

/// Trials rolled by one seeded chunk.
pub const CHUNK_SIZE: u32 = 1_024;

/// Estimated outcome distribution of one attack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementOdds {
    /// Attacks rolled.
    pub trials: u32,
    /// Fraction that hit.
    pub hit_rate: f64,
    /// Fraction of hits that penetrated.
    pub penetration_rate: f64,
    /// Fraction of hits that were critical.
    pub critical_rate: f64,
    /// Mean damage per attack, misses included.
    pub mean_damage: f64,
    /// Closed-form expectation for comparison.
    pub expected_damage: f32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    hits: u64,
    penetrations: u64,
    criticals: u64,
    damage: u64,
}

impl Tally {
    const fn merge(self, other: Self) -> Self {
        Self {
            hits: self.hits + other.hits,
            penetrations: self.penetrations + other.penetrations,
            criticals: self.criticals + other.criticals,
            damage: self.damage + other.damage,
        }
    }
}

fn roll_chunk(
    attacker: &Combatant,
    target: &Combatant,
    slot: WeaponSlot,
    ammo: AmmoType,
    weather: Weather,
    trials: u32,
    seed: u64,
) -> Result<Tally, ValidationError> {
    let mut dice = BattleRng::new(seed);
    let mut tally = Tally::default();
    for _ in 0..trials {
        let outcome = CombatResolver::resolve(attacker, target, slot, ammo, weather, &mut dice)?;
        if outcome.hit {
            tally.hits += 1;
            tally.penetrations += u64::from(outcome.penetrated);
            tally.criticals += u64::from(outcome.critical);
            tally.damage += u64::from(outcome.damage);
        }
    }
    Ok(tally)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Rolls `trials` attacks and summarises them.
///
/// Range and ammunition stock are ignored; the attack is rolled from the
/// units' current positions as if the weapon could always fire.
///
/// # Errors
///
/// Returns the [`ValidationError`] [`CombatResolver::resolve`] would: an
/// empty slot, incompatible ammunition, or a dead target.
pub fn estimate(
    attacker: &Combatant,
    target: &Combatant,
    slot: WeaponSlot,
    ammo: AmmoType,
    weather: Weather,
    trials: u32,
    seed: u64,
) -> Result<EngagementOdds, ValidationError> {
    let chunks = trials.div_ceil(CHUNK_SIZE);
    let tally = (0..chunks)
        .into_par_iter()
        .map(|chunk| {
            let size = CHUNK_SIZE.min(trials - chunk * CHUNK_SIZE);
            let chunk_seed = seed.wrapping_add(u64::from(chunk));
            roll_chunk(attacker, target, slot, ammo, weather, size, chunk_seed)
        })
        .try_reduce(Tally::default, |a, b| Ok(a.merge(b)))?;

    let trials_u64 = u64::from(trials);
    Ok(EngagementOdds {
        trials,
        hit_rate: ratio(tally.hits, trials_u64),
        penetration_rate: ratio(tally.penetrations, tally.hits),
        critical_rate: ratio(tally.criticals, tally.hits),
        mean_damage: ratio(tally.damage, trials_u64),
        expected_damage: CombatResolver::expected_damage(attacker, target, slot, ammo, weather),
    })
}
