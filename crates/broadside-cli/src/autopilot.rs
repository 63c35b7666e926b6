//! Plays every player turn with the AI engine.
//!
//! Useful for soak runs and for watching a scenario end to end without a
//! front end attached.

use broadside_core::ai::AiEngine;
use broadside_core::dice::BattleRng;
use broadside_core::{Action, BattleError, BattleEvent, BattleHandle, UnitId};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Drives player turns until the battle ends.
pub struct Autopilot {
    handle: BattleHandle,
    events: broadcast::Receiver<BattleEvent>,
    engine: AiEngine,
    rng: BattleRng,
}

impl Autopilot {
    /// Creates an autopilot with its own dice stream.
    ///
    /// Subscribes immediately, so no turn that begins after this call is
    /// missed.
    pub fn new(handle: BattleHandle, seed: u64) -> Self {
        Self {
            events: handle.subscribe(),
            handle,
            engine: AiEngine::new(),
            rng: BattleRng::new(seed),
        }
    }

    /// Runs until the battle ends or the event stream closes.
    pub async fn run(mut self) {
        loop {
            match self.events.recv().await {
                Ok(BattleEvent::TurnBegan {
                    unit,
                    time_limit: Some(_),
                    ..
                }) => {
                    if let Err(err) = self.play_turn(unit).await {
                        warn!(unit = %unit, error = %err, "autopilot turn failed");
                    }
                }
                Ok(BattleEvent::RoleplayStarted { unit, .. }) => {
                    if let Err(err) = self.handle.skip_roleplay(unit).await {
                        debug!(unit = %unit, error = %err, "roleplay skip ignored");
                    }
                }
                Ok(BattleEvent::BattleEnded { .. }) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "autopilot fell behind the event stream");
                }
            }
        }
    }

    async fn play_turn(&mut self, unit: UnitId) -> Result<(), BattleError> {
        loop {
            let battle = self.handle.snapshot().await?;
            let decision = self.engine.decide(&battle, unit, &mut self.rng);
            debug!(unit = %unit, action = ?decision.action, "autopilot");

            let report = match self.handle.submit_action(unit, decision.action).await {
                Ok(report) => report,
                Err(err) => {
                    warn!(unit = %unit, error = %err, "autopilot action rejected, ending turn");
                    self.handle.submit_action(unit, Action::EndTurn).await?;
                    return Ok(());
                }
            };

            if decision.action == Action::EndTurn || report.action_points_remaining == 0 {
                return Ok(());
            }
            if decision.is_final {
                self.handle.submit_action(unit, Action::EndTurn).await?;
                return Ok(());
            }
        }
    }
}
