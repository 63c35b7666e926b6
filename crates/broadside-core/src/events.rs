//! Events published by a running battle.
//!
//! Events go out on a broadcast channel; subscribers that fall behind lose
//! the oldest events rather than slowing the battle down.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actions::ActionReport;
use crate::battle::{Battle, BattleOutcome};
use crate::effects::StatusTick;
use crate::entity::{AircraftType, UnitId};
use crate::mvp::MvpAward;
use crate::objective::Reward;
use crate::weather::Weather;

/// Why a unit's turn finished.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEnd {
    /// Every action point was used.
    Exhausted,
    /// The unit ended its turn early.
    Ended,
    /// The turn timer ran out.
    TimedOut,
    /// The unit sank to fire or flooding before it could act.
    Destroyed,
    /// The turn was abandoned, or an AI action was rejected.
    Forfeited,
}

/// Something that happened in the battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BattleEvent {
    /// The first round is about to start.
    BattleStarted {
        /// Player turn order.
        turn_order: Vec<UnitId>,
        /// Opening weather.
        weather: Weather,
    },
    /// A new round started.
    RoundStarted {
        /// Round number, starting at 1.
        round: u32,
    },
    /// The weather changed.
    WeatherChanged {
        /// Old weather.
        from: Weather,
        /// New weather.
        to: Weather,
    },
    /// A unit's turn started.
    TurnBegan {
        /// Acting unit.
        unit: UnitId,
        /// Points available.
        action_points: u8,
        /// Time allowed, for player units.
        time_limit: Option<Duration>,
    },
    /// Fire, flooding or cooldowns ticked.
    StatusTicked(StatusTick),
    /// An action was carried out.
    ActionResolved(ActionReport),
    /// A squadron launched.
    AircraftLaunched {
        /// Launching carrier.
        carrier: UnitId,
        /// New squadron.
        squadron: UnitId,
        /// Squadron role.
        kind: AircraftType,
    },
    /// A unit was sunk or shot down.
    UnitDestroyed {
        /// Lost unit.
        unit: UnitId,
        /// Unit that dealt the final blow, if any.
        by: Option<UnitId>,
    },
    /// A player unit's turn is paused for narration.
    RoleplayStarted {
        /// Unit waiting.
        unit: UnitId,
        /// Pause length.
        time_limit: Duration,
    },
    /// A unit's turn finished.
    TurnEnded {
        /// Unit.
        unit: UnitId,
        /// Why.
        reason: TurnEnd,
    },
    /// Every player unit is lost; waiting for someone to rejoin.
    HoldStarted {
        /// How long to wait.
        timeout: Duration,
    },
    /// A player rejoined during the hold.
    HoldEnded,
    /// A player joined.
    PlayerJoined {
        /// New unit.
        unit: UnitId,
        /// Player.
        owner: String,
    },
    /// The battle is over.
    BattleEnded {
        /// How it ended.
        outcome: BattleOutcome,
        /// Best player unit.
        mvp: Option<MvpAward>,
        /// Reward paid, on victory.
        reward: Option<Reward>,
    },
}

/// Final summary of a battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleReport {
    /// How it ended.
    pub outcome: BattleOutcome,
    /// Rounds completed.
    pub rounds: u32,
    /// Best player unit.
    pub mvp: Option<MvpAward>,
    /// Reward paid, on victory.
    pub reward: Option<Reward>,
    /// Final state.
    pub battle: Battle,
}

impl BattleReport {
    /// Builds a report from a finished battle.
    ///
    /// A battle that never recorded an outcome is reported as abandoned.
    #[must_use]
    pub fn from_battle(battle: Battle) -> Self {
        let outcome = battle.outcome.unwrap_or(BattleOutcome::Abandoned);
        Self {
            outcome,
            rounds: battle.turn_number,
            mvp: battle.mvp(),
            reward: outcome.is_victory().then_some(battle.objective.reward),
            battle,
        }
    }

    /// The terminal event for this report.
    #[must_use]
    pub fn event(&self) -> BattleEvent {
        BattleEvent::BattleEnded {
            outcome: self.outcome,
            mvp: self.mvp.clone(),
            reward: self.reward,
        }
    }
}
