//! Player turn lifecycle.
//!
//! A player's turn is a suspension: the scheduler calls
//! [`PlayerTurnController::begin_turn`], receives a [`TurnWaiter`], and
//! awaits it while feeding in actions and clock ticks. The turn resolves
//! exactly once, on whichever of these comes first:
//!
//! - the unit runs out of action points (after the roleplay pause, if the
//!   battle has one),
//! - the player ends the turn,
//! - the turn timer runs out.
//!
//! # Timer
//!
//! Each accepted action that leaves points over pushes the deadline back to
//! a full turn length, at most `max_resets` times per turn. Further actions
//! are accepted but leave the deadline where it is.
//!
//! # Example
//!
//! ```
//! use broadside_core::entity::UnitId;
//! use broadside_core::turn::{PlayerTurnController, TurnProgress, TurnTiming};
//! use tokio::time::Instant;
//!
//! let mut turns = PlayerTurnController::new(TurnTiming::default(), false);
//! let unit = UnitId::new(1);
//! let now = Instant::now();
//!
//! let waiter = turns.begin_turn(unit, now);
//! assert!(waiter.is_some());
//! // A second begin for the same unit is a no-op.
//! assert!(turns.begin_turn(unit, now).is_none());
//!
//! let progress = turns.record_action(unit, 0, false, now).unwrap();
//! assert!(matches!(progress, TurnProgress::Resolved(_)));
//! ```

mod completion;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::config::TimingConfig;
use crate::entity::UnitId;
use crate::error::{BattleError, TurnStateError};
use crate::events::TurnEnd;

use self::completion::TurnCompletion;
pub use self::completion::TurnWaiter;

/// Timer settings for player turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTiming {
    /// Turn length.
    pub turn_timeout: Duration,
    /// Deadline extensions allowed per turn.
    pub max_resets: u8,
    /// Roleplay pause length.
    pub roleplay_timeout: Duration,
}

impl Default for TurnTiming {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for TurnTiming {
    fn from(config: &TimingConfig) -> Self {
        Self {
            turn_timeout: config.turn_timeout(),
            max_resets: config.max_timer_resets,
            roleplay_timeout: config.roleplay_timeout(),
        }
    }
}

/// Where an open turn stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    /// Accepting actions.
    Acting {
        /// When the turn times out.
        deadline: Instant,
        /// Deadline extensions used so far.
        resets_used: u8,
    },
    /// Out of action points, waiting on narration.
    Roleplay {
        /// When the pause ends.
        deadline: Instant,
    },
}

impl TurnStage {
    /// Current deadline.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        match self {
            Self::Acting { deadline, .. } | Self::Roleplay { deadline } => *deadline,
        }
    }
}

/// Result of feeding an accepted action to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnProgress {
    /// More actions may follow before the deadline.
    Continue {
        /// Deadline after the action.
        deadline: Instant,
    },
    /// Action points are spent; the roleplay pause has begun.
    Roleplay {
        /// When the pause ends.
        deadline: Instant,
    },
    /// The turn is resolved.
    Resolved(TurnEnd),
}

#[derive(Debug)]
struct ActiveTurn {
    stage: TurnStage,
    completion: TurnCompletion,
}

/// Tracks every open player turn.
///
/// The scheduler runs player turns one at a time, but the controller keys
/// its state by unit so that a repeated begin for a unit with an open turn
/// is detected and ignored.
#[derive(Debug)]
pub struct PlayerTurnController {
    timing: TurnTiming,
    roleplay: bool,
    active: HashMap<UnitId, ActiveTurn>,
}

impl PlayerTurnController {
    /// Creates a controller.
    #[must_use]
    pub fn new(timing: TurnTiming, roleplay: bool) -> Self {
        Self {
            timing,
            roleplay,
            active: HashMap::new(),
        }
    }

    /// Timer settings.
    #[must_use]
    pub const fn timing(&self) -> &TurnTiming {
        &self.timing
    }

    /// Opens a turn for `unit`.
    ///
    /// Returns `None` without side effects if the unit already has a turn
    /// open: no second timer and no second waiter.
    pub fn begin_turn(&mut self, unit: UnitId, now: Instant) -> Option<TurnWaiter> {
        if self.active.contains_key(&unit) {
            debug!(unit = %unit, "turn already open, ignoring begin");
            return None;
        }
        let (completion, waiter) = TurnCompletion::channel(unit);
        self.active.insert(
            unit,
            ActiveTurn {
                stage: TurnStage::Acting {
                    deadline: now + self.timing.turn_timeout,
                    resets_used: 0,
                },
                completion,
            },
        );
        Some(waiter)
    }

    /// Returns `true` if the unit has a turn open, resolved or not.
    #[must_use]
    pub fn is_open(&self, unit: UnitId) -> bool {
        self.active.contains_key(&unit)
    }

    /// Stage of the unit's open turn.
    #[must_use]
    pub fn stage(&self, unit: UnitId) -> Option<TurnStage> {
        self.active.get(&unit).map(|t| t.stage)
    }

    /// Checks that `unit` may act right now.
    ///
    /// # Errors
    ///
    /// [`TurnStateError::NotYourTurn`] if it has no turn open, or
    /// [`TurnStateError::AlreadyResolved`] if its turn has been resolved or
    /// has moved on to the roleplay pause.
    pub fn check_acting(&self, unit: UnitId) -> Result<(), TurnStateError> {
        let turn = self
            .active
            .get(&unit)
            .ok_or(TurnStateError::NotYourTurn(unit))?;
        if turn.completion.is_spent() || matches!(turn.stage, TurnStage::Roleplay { .. }) {
            return Err(TurnStateError::AlreadyResolved(unit));
        }
        Ok(())
    }

    fn open_turn(&mut self, unit: UnitId) -> Result<&mut ActiveTurn, BattleError> {
        let turn = self
            .active
            .get_mut(&unit)
            .ok_or(TurnStateError::NotYourTurn(unit))?;
        if turn.completion.is_spent() {
            debug!(unit = %unit, "turn already resolved");
            return Err(BattleError::Concurrency(unit));
        }
        Ok(turn)
    }

    /// Feeds an accepted action into the turn.
    ///
    /// `remaining` is the unit's action points after the action; `ended` is
    /// set for an explicit end-turn, which skips the roleplay pause.
    ///
    /// # Errors
    ///
    /// [`TurnStateError::NotYourTurn`] if no turn is open and
    /// [`BattleError::Concurrency`] if it is already resolved.
    pub fn record_action(
        &mut self,
        unit: UnitId,
        remaining: u8,
        ended: bool,
        now: Instant,
    ) -> Result<TurnProgress, BattleError> {
        let timing = self.timing;
        let roleplay = self.roleplay;
        let turn = self.open_turn(unit)?;

        if ended {
            turn.completion.complete(TurnEnd::Ended)?;
            return Ok(TurnProgress::Resolved(TurnEnd::Ended));
        }
        if remaining == 0 {
            if roleplay {
                let deadline = now + timing.roleplay_timeout;
                turn.stage = TurnStage::Roleplay { deadline };
                return Ok(TurnProgress::Roleplay { deadline });
            }
            turn.completion.complete(TurnEnd::Exhausted)?;
            return Ok(TurnProgress::Resolved(TurnEnd::Exhausted));
        }

        match &mut turn.stage {
            TurnStage::Acting {
                deadline,
                resets_used,
            } => {
                if *resets_used < timing.max_resets {
                    *deadline = now + timing.turn_timeout;
                    *resets_used += 1;
                }
                Ok(TurnProgress::Continue {
                    deadline: *deadline,
                })
            }
            TurnStage::Roleplay { .. } => Err(TurnStateError::AlreadyResolved(unit).into()),
        }
    }

    /// Resolves the turn if its deadline has passed.
    ///
    /// An expired action stage times out; an expired roleplay pause ends the
    /// turn as exhausted. Returns `None` if the deadline has not been
    /// reached.
    ///
    /// # Errors
    ///
    /// [`TurnStateError::NotYourTurn`] if no turn is open and
    /// [`BattleError::Concurrency`] if it is already resolved.
    pub fn expire(&mut self, unit: UnitId, now: Instant) -> Result<Option<TurnEnd>, BattleError> {
        let turn = self.open_turn(unit)?;
        if now < turn.stage.deadline() {
            return Ok(None);
        }
        let reason = match turn.stage {
            TurnStage::Acting { .. } => TurnEnd::TimedOut,
            TurnStage::Roleplay { .. } => TurnEnd::Exhausted,
        };
        turn.completion.complete(reason)?;
        Ok(Some(reason))
    }

    /// Ends the roleplay pause early.
    ///
    /// # Errors
    ///
    /// [`TurnStateError::NoRoleplayWait`] if the unit is not paused and
    /// [`BattleError::Concurrency`] if its turn is already resolved.
    pub fn finish_roleplay(&mut self, unit: UnitId) -> Result<(), BattleError> {
        let turn = self
            .active
            .get_mut(&unit)
            .ok_or(TurnStateError::NoRoleplayWait(unit))?;
        if turn.completion.is_spent() {
            return Err(BattleError::Concurrency(unit));
        }
        if !matches!(turn.stage, TurnStage::Roleplay { .. }) {
            return Err(TurnStateError::NoRoleplayWait(unit).into());
        }
        turn.completion.complete(TurnEnd::Exhausted)
    }

    /// Resolves the turn for a reason outside the player's control.
    ///
    /// # Errors
    ///
    /// [`TurnStateError::NotYourTurn`] if no turn is open and
    /// [`BattleError::Concurrency`] if it is already resolved.
    pub fn force(&mut self, unit: UnitId, reason: TurnEnd) -> Result<(), BattleError> {
        self.open_turn(unit)?.completion.complete(reason)
    }

    /// Closes a turn once the scheduler has observed its resolution.
    ///
    /// Returns `false` if the unit had no turn open.
    pub fn finish(&mut self, unit: UnitId) -> bool {
        self.active.remove(&unit).is_some()
    }
}
