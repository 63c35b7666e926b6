//! The battle loop.
//!
//! A [`TurnScheduler`] owns one [`Battle`] and runs it to completion on a
//! single task. Everything outside the loop talks to it through a
//! [`BattleHandle`]: commands go in over an `mpsc` channel with `oneshot`
//! replies, events come out over a `broadcast` channel. Nothing outside the
//! loop ever touches the battle state directly.
//!
//! # Rounds
//!
//! ```text
//! hold check ─▶ weather ─▶ player turns (turn order) ─▶ AI turns (registration order) ─▶ bookkeeping
//! ```
//!
//! Player turns run one at a time; each is fully resolved, roleplay pause
//! included, before the next begins. The objective is checked after every
//! unit's turn and again at round end.
//!
//! # Example
//!
//! ```no_run
//! use broadside_core::actions::Action;
//! use broadside_core::config::BattleConfig;
//! use broadside_core::scheduler::TurnScheduler;
//!
//! # async fn demo(config: BattleConfig) -> Result<(), broadside_core::error::BattleError> {
//! let (scheduler, handle) = TurnScheduler::new(config)?;
//! let battle = tokio::spawn(scheduler.run());
//!
//! let snapshot = handle.snapshot().await?;
//! if let Some(&unit) = snapshot.turn_order().first() {
//!     let _ = handle.submit_action(unit, Action::EndTurn).await;
//! }
//! let report = battle.await.expect("battle task panicked");
//! println!("{}", report.outcome);
//! # Ok(())
//! # }
//! ```

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::actions::{apply_action, Action, ActionEffect, ActionReport};
use crate::ai::{AiEngine, Commander};
use crate::battle::{Battle, BattleOutcome, BattlePhase};
use crate::config::{spawn_player, BattleConfig, PlayerSpawn, TimingConfig};
use crate::dice::BattleRng;
use crate::effects;
use crate::entity::UnitId;
use crate::error::{BattleError, TurnStateError};
use crate::events::{BattleEvent, BattleReport, TurnEnd};
use crate::objective::{advance_round, evaluate, ObjectiveStatus};
use crate::templates::TemplateCatalog;
use crate::turn::{PlayerTurnController, TurnProgress, TurnTiming, TurnWaiter};

/// Commands queued ahead of the loop before senders wait.
const COMMAND_BUFFER: usize = 64;

/// Events kept for slow subscribers.
const EVENT_BUFFER: usize = 1024;

type Reply<T> = oneshot::Sender<Result<T, BattleError>>;

/// Requests a [`BattleHandle`] sends to the loop.
#[derive(Debug)]
pub(crate) enum BattleCommand {
    SubmitAction {
        unit: UnitId,
        action: Action,
        reply: Reply<ActionReport>,
    },
    EndRoleplay {
        unit: UnitId,
        reply: Reply<()>,
    },
    Join {
        spawn: PlayerSpawn,
        reply: Reply<UnitId>,
    },
    Start {
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<Battle>,
    },
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable connection to a running battle.
///
/// Once every handle is dropped the loop stops listening for commands; open
/// player turns then end on their timers.
#[derive(Debug, Clone)]
pub struct BattleHandle {
    commands: mpsc::Sender<BattleCommand>,
    events: broadcast::Sender<BattleEvent>,
}

impl BattleHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> BattleCommand,
    ) -> Result<T, BattleError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| BattleError::Closed)?;
        response.await.map_err(|_| BattleError::Closed)?
    }

    /// Submits an action for a player unit.
    ///
    /// # Errors
    ///
    /// A [`BattleError`] whose [`reason`](BattleError::reason) is the public
    /// rejection code. A rejected action costs nothing and leaves the turn
    /// open.
    pub async fn submit_action(
        &self,
        unit: UnitId,
        action: Action,
    ) -> Result<ActionReport, BattleError> {
        self.request(|reply| BattleCommand::SubmitAction {
            unit,
            action,
            reply,
        })
        .await
    }

    /// Ends a roleplay pause because the owner has posted their narration.
    ///
    /// # Errors
    ///
    /// [`TurnStateError::NoRoleplayWait`] if the unit is not paused.
    pub async fn resolve_roleplay_wait(&self, unit: UnitId) -> Result<(), BattleError> {
        self.request(|reply| BattleCommand::EndRoleplay { unit, reply })
            .await
    }

    /// Ends a roleplay pause without narration.
    ///
    /// # Errors
    ///
    /// [`TurnStateError::NoRoleplayWait`] if the unit is not paused.
    pub async fn skip_roleplay(&self, unit: UnitId) -> Result<(), BattleError> {
        debug!(unit = %unit, "roleplay skipped");
        self.resolve_roleplay_wait(unit).await
    }

    /// Adds a player unit. Accepted before and during the battle.
    ///
    /// # Errors
    ///
    /// [`BattleError::Config`] for a bad template or cell, or
    /// [`TurnStateError::WrongPhase`] once the battle has ended.
    pub async fn join(&self, spawn: PlayerSpawn) -> Result<UnitId, BattleError> {
        self.request(|reply| BattleCommand::Join { spawn, reply })
            .await
    }

    /// Starts a battle that is waiting in the joining phase.
    ///
    /// # Errors
    ///
    /// [`TurnStateError::WrongPhase`] if it has already started.
    pub async fn start(&self) -> Result<(), BattleError> {
        self.request(|reply| BattleCommand::Start { reply }).await
    }

    /// Copy of the current battle state.
    ///
    /// # Errors
    ///
    /// [`BattleError::Closed`] once the loop has finished.
    pub async fn snapshot(&self) -> Result<Battle, BattleError> {
        self.request(|reply| BattleCommand::Snapshot { reply }).await
    }

    /// Subscribes to battle events from this point on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BattleEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Runs one battle.
pub struct TurnScheduler {
    battle: Battle,
    catalog: TemplateCatalog,
    turns: PlayerTurnController,
    ai: Box<dyn Commander>,
    rng: BattleRng,
    commands: mpsc::Receiver<BattleCommand>,
    commands_open: bool,
    events: broadcast::Sender<BattleEvent>,
    timing: TimingConfig,
    dynamic_weather: bool,
    wait_for_start: bool,
    max_rounds: u32,
}

impl TurnScheduler {
    /// Builds the battle described by `config`.
    ///
    /// # Errors
    ///
    /// [`BattleError::Config`] if the configuration is invalid; nothing is
    /// built in that case.
    pub fn new(config: BattleConfig) -> Result<(Self, BattleHandle), BattleError> {
        let (battle, catalog) = config.build()?;
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let handle = BattleHandle {
            commands: command_tx,
            events: events.clone(),
        };
        let scheduler = Self {
            battle,
            catalog,
            turns: PlayerTurnController::new(TurnTiming::from(&config.timing), config.roleplay),
            ai: Box::new(AiEngine::new()),
            rng: BattleRng::new(config.seed),
            commands,
            commands_open: true,
            events,
            timing: config.timing,
            dynamic_weather: config.dynamic_weather,
            wait_for_start: config.wait_for_start,
            max_rounds: config.max_rounds,
        };
        Ok((scheduler, handle))
    }

    /// Replaces the built-in [`AiEngine`] for every non-player unit.
    #[must_use]
    pub fn with_commander(mut self, commander: impl Commander + 'static) -> Self {
        self.ai = Box::new(commander);
        self
    }

    /// Current battle state.
    #[must_use]
    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    /// Runs the battle to its end and returns the final report.
    pub async fn run(mut self) -> BattleReport {
        if self.wait_for_start {
            self.await_start().await;
        }
        self.begin_battle();

        while !self.battle.is_over() {
            self.play_round().await;
        }

        let report = BattleReport::from_battle(self.battle);
        info!(
            outcome = %report.outcome,
            rounds = report.rounds,
            mvp = ?report.mvp.as_ref().map(|m| m.unit),
            "battle ended"
        );
        let _ = self.events.send(report.event());
        report
    }

    fn publish(&self, event: BattleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // -------------------------------------------------------------------------
    // Phases
    // -------------------------------------------------------------------------

    async fn await_start(&mut self) {
        info!("waiting for start signal");
        while self.commands_open {
            match self.commands.recv().await {
                Some(BattleCommand::Start { reply }) => {
                    let _ = reply.send(Ok(()));
                    return;
                }
                Some(command) => self.handle_command(command),
                None => self.commands_open = false,
            }
        }
    }

    fn begin_battle(&mut self) {
        self.battle.shuffle_turn_order(&mut self.rng);
        self.battle.phase = BattlePhase::Battle;
        info!(
            units = self.battle.len(),
            players = self.battle.turn_order().len(),
            weather = %self.battle.weather,
            "battle started"
        );
        self.publish(BattleEvent::BattleStarted {
            turn_order: self.battle.turn_order().to_vec(),
            weather: self.battle.weather,
        });
    }

    async fn play_round(&mut self) {
        if self.battle.live_players() == 0 && !self.hold().await {
            return;
        }

        let round = self.battle.turn_number + 1;
        debug!(round, "round started");
        self.publish(BattleEvent::RoundStarted { round });

        if self.dynamic_weather {
            let from = self.battle.weather;
            let to = from.transition(&mut self.rng);
            if to != from {
                self.battle.weather = to;
                info!(%from, %to, "weather changed");
                self.publish(BattleEvent::WeatherChanged { from, to });
            }
        }

        let order = self.battle.turn_order().to_vec();
        for unit in order {
            if self.battle.is_over() {
                return;
            }
            if self.battle.is_alive(unit) {
                self.player_turn(unit).await;
                self.check_objective();
            }
        }

        for unit in self.battle.ai_units() {
            if self.battle.is_over() {
                return;
            }
            if self.battle.is_alive(unit) {
                self.ai_turn(unit).await;
                self.check_objective();
            }
        }

        self.battle.turn_number += 1;
        self.battle.credit_survivors();
        advance_round(&mut self.battle);
        self.check_objective();

        if !self.battle.is_over() && self.battle.turn_number >= self.max_rounds {
            info!(rounds = self.battle.turn_number, "round limit reached");
            self.battle.end(BattleOutcome::Stalemate);
        }
    }

    /// Waits for a player to join while no player unit is alive.
    ///
    /// Returns `false` if the hold timed out and the battle was abandoned.
    async fn hold(&mut self) -> bool {
        let timeout = self.timing.hold_timeout();
        warn!(timeout_secs = timeout.as_secs(), "no player units left, holding");
        self.publish(BattleEvent::HoldStarted { timeout });

        let deadline = Instant::now() + timeout;
        loop {
            if self.battle.live_players() > 0 {
                info!("player rejoined, resuming");
                self.publish(BattleEvent::HoldEnded);
                return true;
            }
            tokio::select! {
                biased;
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => self.commands_open = false,
                },
                () = sleep_until(deadline) => {
                    warn!("hold timed out, battle abandoned");
                    self.battle.end(BattleOutcome::Abandoned);
                    return false;
                }
            }
        }
    }

    fn check_objective(&mut self) {
        if self.battle.is_over() {
            return;
        }
        match evaluate(&self.battle) {
            ObjectiveStatus::Complete => {
                info!("objective complete");
                self.battle.objective_complete = true;
                self.battle.end(BattleOutcome::Victory);
            }
            ObjectiveStatus::Failed => {
                info!("objective failed");
                self.battle.end(BattleOutcome::ObjectiveFailed);
            }
            ObjectiveStatus::InProgress => {}
        }
    }

    // -------------------------------------------------------------------------
    // Turns
    // -------------------------------------------------------------------------

    /// Ticks status effects and refills action points.
    ///
    /// Returns the points available, or `None` if the unit sank to its
    /// afflictions.
    fn open_turn(&mut self, unit: UnitId) -> Option<u8> {
        let combatant = self.battle.get_mut(unit)?;
        let tick = effects::tick(combatant);
        combatant.action_points_mut().refill();
        let points = combatant.action_points().remaining();

        if tick.is_noteworthy() {
            self.publish(BattleEvent::StatusTicked(tick));
        }
        if tick.destroyed {
            info!(unit = %unit, "lost to fire and flooding");
            self.publish(BattleEvent::UnitDestroyed { unit, by: None });
            self.publish(BattleEvent::TurnEnded {
                unit,
                reason: TurnEnd::Destroyed,
            });
            return None;
        }
        Some(points)
    }

    async fn player_turn(&mut self, unit: UnitId) {
        let Some(action_points) = self.open_turn(unit) else {
            return;
        };
        let Some(waiter) = self.turns.begin_turn(unit, Instant::now()) else {
            warn!(unit = %unit, "turn already open");
            return;
        };
        debug!(unit = %unit, action_points, "player turn began");
        self.publish(BattleEvent::TurnBegan {
            unit,
            action_points,
            time_limit: Some(self.turns.timing().turn_timeout),
        });

        let reason = self.await_turn(waiter).await;
        self.turns.finish(unit);
        debug!(unit = %unit, ?reason, "player turn ended");
        self.publish(BattleEvent::TurnEnded { unit, reason });
    }

    /// Serves commands until the turn resolves.
    async fn await_turn(&mut self, mut waiter: TurnWaiter) -> TurnEnd {
        let unit = waiter.unit();
        loop {
            let Some(deadline) = self.turns.stage(unit).map(|s| s.deadline()) else {
                return TurnEnd::Forfeited;
            };
            tokio::select! {
                biased;
                reason = &mut waiter => return reason,
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => self.commands_open = false,
                },
                () = sleep_until(deadline) => {
                    if let Err(err) = self.turns.expire(unit, Instant::now()) {
                        debug!(unit = %unit, %err, "expiry discarded");
                    }
                }
            }
        }
    }

    async fn ai_turn(&mut self, unit: UnitId) {
        let Some(action_points) = self.open_turn(unit) else {
            return;
        };
        self.publish(BattleEvent::TurnBegan {
            unit,
            action_points,
            time_limit: None,
        });

        let delay = self.timing.ai_action_delay();
        let reason = loop {
            let decision = self.ai.decide(&self.battle, unit, &mut self.rng);
            let result = apply_action(
                &mut self.battle,
                &self.catalog,
                unit,
                &decision.action,
                &mut self.rng,
            );
            match result {
                Ok(report) => {
                    let exhausted = report.action_points_remaining == 0;
                    let done = decision.is_final || report.ends_turn();
                    self.publish_action(report);
                    if done {
                        break if exhausted {
                            TurnEnd::Exhausted
                        } else {
                            TurnEnd::Ended
                        };
                    }
                }
                Err(err) => {
                    warn!(
                        unit = %unit,
                        action = %decision.action,
                        %err,
                        "AI action rejected, forfeiting turn"
                    );
                    break TurnEnd::Forfeited;
                }
            }
            if !delay.is_zero() {
                sleep(delay).await;
            }
        };
        self.publish(BattleEvent::TurnEnded { unit, reason });
    }

    fn publish_action(&self, report: ActionReport) {
        match &report.effect {
            ActionEffect::Launched { squadron, kind, .. } => {
                info!(carrier = %report.unit, squadron = %squadron, %kind, "squadron launched");
                self.publish(BattleEvent::AircraftLaunched {
                    carrier: report.unit,
                    squadron: *squadron,
                    kind: *kind,
                });
            }
            ActionEffect::Attacked {
                target,
                report: damage,
                ..
            } if damage.destroyed => {
                info!(unit = %target, by = %report.unit, "unit destroyed");
                self.publish(BattleEvent::UnitDestroyed {
                    unit: *target,
                    by: Some(report.unit),
                });
            }
            _ => {}
        }
        self.publish(BattleEvent::ActionResolved(report));
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    fn handle_command(&mut self, command: BattleCommand) {
        match command {
            BattleCommand::SubmitAction {
                unit,
                action,
                reply,
            } => {
                let result = self.submit(unit, action);
                if let Err(err) = &result {
                    debug!(unit = %unit, %action, %err, "action rejected");
                }
                let _ = reply.send(result);
            }
            BattleCommand::EndRoleplay { unit, reply } => {
                let _ = reply.send(self.turns.finish_roleplay(unit));
            }
            BattleCommand::Join { spawn, reply } => {
                let _ = reply.send(self.join(&spawn));
            }
            BattleCommand::Start { reply } => {
                let _ = reply.send(Err(TurnStateError::WrongPhase.into()));
            }
            BattleCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.battle.clone()));
            }
        }
    }

    fn submit(&mut self, unit: UnitId, action: Action) -> Result<ActionReport, BattleError> {
        if self.battle.phase != BattlePhase::Battle {
            return Err(TurnStateError::WrongPhase.into());
        }
        self.turns.check_acting(unit)?;
        let report = apply_action(
            &mut self.battle,
            &self.catalog,
            unit,
            &action,
            &mut self.rng,
        )?;
        self.publish_action(report.clone());

        let ended = matches!(action, Action::EndTurn);
        match self.turns.record_action(
            unit,
            report.action_points_remaining,
            ended,
            Instant::now(),
        ) {
            Ok(TurnProgress::Roleplay { .. }) => {
                self.publish(BattleEvent::RoleplayStarted {
                    unit,
                    time_limit: self.turns.timing().roleplay_timeout,
                });
            }
            Ok(_) => {}
            Err(err) => debug!(unit = %unit, %err, "turn progress discarded"),
        }
        Ok(report)
    }

    fn join(&mut self, spawn: &PlayerSpawn) -> Result<UnitId, BattleError> {
        if self.battle.is_over() {
            return Err(TurnStateError::WrongPhase.into());
        }
        let unit = spawn_player(&mut self.battle, &self.catalog, spawn)?;
        info!(unit = %unit, owner = %spawn.owner, template = %spawn.template, "player joined");
        self.publish(BattleEvent::PlayerJoined {
            unit,
            owner: spawn.owner.clone(),
        });
        Ok(unit)
    }
}

/// Runs a configured battle to completion with no external driver.
///
/// Player turns can only end on their timers, so this suits battles whose
/// roster is all AI or whose players are driven some other way.
///
/// # Errors
///
/// [`BattleError::Config`] if the configuration is invalid.
pub async fn start_battle(config: BattleConfig) -> Result<BattleReport, BattleError> {
    let (scheduler, handle) = TurnScheduler::new(config)?;
    drop(handle);
    Ok(scheduler.run().await)
}
