//! Per-unit battle statistics and MVP scoring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::UnitId;

/// Score per kill.
pub const KILL_WEIGHT: f64 = 50.0;
/// Score for a perfect hit rate.
pub const ACCURACY_WEIGHT: f64 = 100.0;
/// Score per round survived.
pub const SURVIVAL_WEIGHT: f64 = 5.0;

/// Running statistics for one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MvpStats {
    /// Damage dealt to enemy units.
    pub damage_dealt: u64,
    /// Enemy units sunk.
    pub kills: u32,
    /// Attacks made.
    pub shots_fired: u32,
    /// Attacks that hit.
    pub hits: u32,
    /// Rounds ended alive.
    pub turns_survived: u32,
}

impl MvpStats {
    /// Records one attack.
    pub fn record_attack(&mut self, hit: bool, damage: u32, killed: bool) {
        self.shots_fired += 1;
        if hit {
            self.hits += 1;
        }
        self.damage_dealt += u64::from(damage);
        if killed {
            self.kills += 1;
        }
    }

    /// Fraction of attacks that hit, zero before the first shot.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.shots_fired == 0 {
            0.0
        } else {
            f64::from(self.hits) / f64::from(self.shots_fired)
        }
    }

    /// Combined MVP score.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self) -> f64 {
        self.damage_dealt as f64
            + KILL_WEIGHT * f64::from(self.kills)
            + ACCURACY_WEIGHT * self.accuracy()
            + SURVIVAL_WEIGHT * f64::from(self.turns_survived)
    }
}

/// The best-performing player unit of a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvpAward {
    /// Winning unit.
    pub unit: UnitId,
    /// Its controlling player.
    pub owner: String,
    /// Its score.
    pub score: f64,
    /// Its statistics.
    pub stats: MvpStats,
}

/// Picks the highest-scoring candidate; ties go to the earliest id.
///
/// `candidates` pairs each eligible unit with its owner.
#[must_use]
pub fn select_mvp<'a>(
    stats: &BTreeMap<UnitId, MvpStats>,
    candidates: impl IntoIterator<Item = (UnitId, &'a str)>,
) -> Option<MvpAward> {
    let mut best: Option<MvpAward> = None;
    for (unit, owner) in candidates {
        let unit_stats = stats.get(&unit).copied().unwrap_or_default();
        let score = unit_stats.score();
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(MvpAward {
                unit,
                owner: owner.to_string(),
                score,
                stats: unit_stats,
            });
        }
    }
    best
}
