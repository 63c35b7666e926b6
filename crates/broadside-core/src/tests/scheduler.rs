//! Full battles driven through a [`BattleHandle`](crate::scheduler::BattleHandle).
//!
//! Every test runs on paused virtual time, so turn and hold timeouts elapse
//! instantly once the loop is idle.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::helpers::*;
use crate::actions::{Action, ActionEffect};
use crate::ai::{Commander, Decision};
use crate::battle::Battle;
use crate::battle::{BattleOutcome, BattlePhase};
use crate::dice::Dice;
use crate::config::{EnemySpawn, PlayerSpawn};
use crate::entity::{AmmoType, GridPos, Side, UnitId, WeaponSlot};
use crate::error::{BattleError, RejectReason, TurnStateError};
use crate::events::{BattleEvent, TurnEnd};
use crate::objective::{Objective, ObjectiveKind};
use crate::scheduler::{start_battle, BattleHandle, TurnScheduler};

fn turn_ended(event: &BattleEvent) -> bool {
    matches!(event, BattleEvent::TurnEnded { .. })
}

fn battle_ended(event: &BattleEvent) -> bool {
    matches!(event, BattleEvent::BattleEnded { .. })
}

/// Ends every player turn as soon as it begins and returns all events up to
/// and including `BattleEnded`.
async fn pass_every_turn(
    handle: &BattleHandle,
    events: &mut tokio::sync::broadcast::Receiver<BattleEvent>,
) -> Vec<BattleEvent> {
    let mut seen = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        if let BattleEvent::TurnBegan {
            unit,
            time_limit: Some(_),
            ..
        } = event
        {
            handle.submit_action(unit, Action::EndTurn).await.unwrap();
        }
        let done = battle_ended(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn turns_begun(events: &[BattleEvent]) -> Vec<UnitId> {
    events
        .iter()
        .filter_map(|e| match e {
            BattleEvent::TurnBegan { unit, .. } => Some(*unit),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Timers
// =============================================================================

mod timer_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn idle_player_times_out() {
        let (scheduler, handle) = TurnScheduler::new(duel_config()).unwrap();
        let mut events = handle.subscribe();
        let start = Instant::now();
        let task = tokio::spawn(scheduler.run());

        let event = next_matching(&mut events, turn_ended).await;
        assert_eq!(
            event,
            BattleEvent::TurnEnded {
                unit: UnitId::new(1),
                reason: TurnEnd::TimedOut,
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(300));

        let report = task.await.unwrap();
        assert_eq!(report.outcome, BattleOutcome::Stalemate);
        assert_eq!(report.rounds, 1);
        assert!(report.reward.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn resets_stop_at_the_cap() {
        let mut config = duel_config();
        config.timing.max_timer_resets = 1;
        config.players = vec![PlayerSpawn::new("ayla", "carrier", GridPos::new(5, 5))];
        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let mut events = handle.subscribe();
        let start = Instant::now();
        let _task = tokio::spawn(scheduler.run());
        let carrier = UnitId::new(1);

        sleep(Duration::from_secs(100)).await;
        let first = handle
            .submit_action(carrier, Action::Move { to: GridPos::new(6, 5) })
            .await
            .unwrap();
        assert_eq!(first.action_points_remaining, 2);

        sleep(Duration::from_secs(100)).await;
        let second = handle
            .submit_action(carrier, Action::Move { to: GridPos::new(7, 5) })
            .await
            .unwrap();
        assert_eq!(second.action_points_remaining, 1);

        // The first move pushed the deadline to t=400; the second was past
        // the cap and left it there.
        let event = next_matching(&mut events, turn_ended).await;
        assert!(matches!(
            event,
            BattleEvent::TurnEnded {
                reason: TurnEnd::TimedOut,
                ..
            }
        ));
        assert_eq!(start.elapsed(), Duration::from_secs(400));
    }
}

// =============================================================================
// Player Turns
// =============================================================================

mod turn_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn only_the_active_unit_may_act() {
        let mut config = duel_config();
        config
            .players
            .push(PlayerSpawn::new("brin", "destroyer", GridPos::new(4, 2)));
        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(scheduler.run());

        let BattleEvent::BattleStarted { turn_order, .. } =
            next_matching(&mut events, |e| matches!(e, BattleEvent::BattleStarted { .. })).await
        else {
            unreachable!();
        };
        let (first, second) = (turn_order[0], turn_order[1]);

        let err = handle
            .submit_action(second, Action::EndTurn)
            .await
            .unwrap_err();
        assert_eq!(err, TurnStateError::NotYourTurn(second).into());
        assert_eq!(err.reason(), RejectReason::NotYourTurn);

        handle.submit_action(first, Action::EndTurn).await.unwrap();
        let ended = next_matching(&mut events, turn_ended).await;
        assert_eq!(
            ended,
            BattleEvent::TurnEnded {
                unit: first,
                reason: TurnEnd::Ended,
            }
        );

        handle.submit_action(second, Action::EndTurn).await.unwrap();
        let report = task.await.unwrap();
        assert_eq!(report.outcome, BattleOutcome::Stalemate);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_action_keeps_the_turn_open() {
        let (scheduler, handle) = TurnScheduler::new(duel_config()).unwrap();
        let _task = tokio::spawn(scheduler.run());
        let player = UnitId::new(1);

        let err = handle
            .submit_action(player, Action::Move { to: GridPos::new(15, 15) })
            .await
            .unwrap_err();
        assert!(matches!(err, BattleError::Validation(_)));

        let report = handle
            .submit_action(player, Action::Move { to: GridPos::new(4, 2) })
            .await
            .unwrap();
        assert_eq!(report.action_points_remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn roleplay_pause_follows_exhaustion() {
        let mut config = duel_config();
        config.roleplay = true;
        config.timing.roleplay_timeout_secs = 120;
        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let mut events = handle.subscribe();
        let _task = tokio::spawn(scheduler.run());
        let player = UnitId::new(1);

        handle
            .submit_action(player, Action::Move { to: GridPos::new(3, 2) })
            .await
            .unwrap();
        let last = handle
            .submit_action(player, Action::Move { to: GridPos::new(4, 2) })
            .await
            .unwrap();
        assert_eq!(last.action_points_remaining, 0);

        let paused = next_matching(&mut events, |e| {
            matches!(e, BattleEvent::RoleplayStarted { .. })
        })
        .await;
        assert_eq!(
            paused,
            BattleEvent::RoleplayStarted {
                unit: player,
                time_limit: Duration::from_secs(120),
            }
        );

        let late = handle.submit_action(player, Action::EndTurn).await;
        assert_eq!(late, Err(TurnStateError::AlreadyResolved(player).into()));

        handle.resolve_roleplay_wait(player).await.unwrap();
        let ended = next_matching(&mut events, turn_ended).await;
        assert_eq!(
            ended,
            BattleEvent::TurnEnded {
                unit: player,
                reason: TurnEnd::Exhausted,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn skip_without_pause_is_rejected() {
        let (scheduler, handle) = TurnScheduler::new(duel_config()).unwrap();
        let _task = tokio::spawn(scheduler.run());
        let player = UnitId::new(1);

        let err = handle.skip_roleplay(player).await.unwrap_err();
        assert_eq!(err, TurnStateError::NoRoleplayWait(player).into());
    }
}

// =============================================================================
// Phases
// =============================================================================

mod phase_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn joining_phase_waits_for_start() {
        let mut config = empty_config();
        config.wait_for_start = true;
        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let mut events = handle.subscribe();
        let _task = tokio::spawn(scheduler.run());

        let unit = handle
            .join(PlayerSpawn::new("cato", "light_cruiser", GridPos::new(1, 1)))
            .await
            .unwrap();
        let early = handle.submit_action(unit, Action::EndTurn).await;
        assert_eq!(early, Err(TurnStateError::WrongPhase.into()));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, BattlePhase::Joining);
        assert_eq!(snapshot.turn_order(), &[unit]);

        handle.start().await.unwrap();
        let started = next_matching(&mut events, |e| {
            matches!(e, BattleEvent::BattleStarted { .. })
        })
        .await;
        let BattleEvent::BattleStarted { turn_order, .. } = started else {
            unreachable!();
        };
        assert_eq!(turn_order, vec![unit]);
        assert_eq!(
            handle.start().await,
            Err(TurnStateError::WrongPhase.into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hold_times_out_as_abandoned() {
        let start = Instant::now();
        let report = start_battle(empty_config()).await.unwrap();
        assert_eq!(report.outcome, BattleOutcome::Abandoned);
        assert_eq!(start.elapsed(), Duration::from_secs(600));
        assert_eq!(report.rounds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejoin_ends_the_hold() {
        let (scheduler, handle) = TurnScheduler::new(empty_config()).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(scheduler.run());

        next_matching(&mut events, |e| matches!(e, BattleEvent::HoldStarted { .. })).await;
        sleep(Duration::from_secs(60)).await;
        let unit = handle
            .join(PlayerSpawn::new("dara", "destroyer", GridPos::new(0, 0)))
            .await
            .unwrap();
        next_matching(&mut events, |e| matches!(e, BattleEvent::HoldEnded)).await;

        let began = next_matching(&mut events, |e| {
            matches!(e, BattleEvent::TurnBegan { .. })
        })
        .await;
        assert!(matches!(began, BattleEvent::TurnBegan { unit: u, .. } if u == unit));
        handle.submit_action(unit, Action::EndTurn).await.unwrap();

        let report = task.await.unwrap();
        assert_eq!(report.outcome, BattleOutcome::Stalemate);
        assert_eq!(report.rounds, 1);
    }

    #[test]
    fn invalid_config_builds_nothing() {
        let mut config = duel_config();
        config.enemies.push(EnemySpawn::new("dreadnought", GridPos::new(9, 9)));
        assert!(matches!(
            TurnScheduler::new(config),
            Err(BattleError::Config(_))
        ));
    }
}

// =============================================================================
// Outcomes
// =============================================================================

mod outcome_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sinking_the_last_enemy_wins() {
        let mut config = duel_config();
        config.max_rounds = 50;
        config.templates.insert("hulk", hulk_template());
        config.players = vec![PlayerSpawn::new("ayla", "battleship", GridPos::new(5, 5))];
        config.enemies = vec![EnemySpawn::new("hulk", GridPos::new(6, 5))];
        config.objective = config.objective.with_reward(500, 20);

        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(scheduler.run());
        let (player, hulk) = (UnitId::new(1), UnitId::new(2));
        let attack = Action::Attack {
            slot: WeaponSlot::Secondary,
            ammo: AmmoType::He,
            target: hulk,
        };

        loop {
            match events.recv().await.unwrap() {
                BattleEvent::TurnBegan { unit, .. } if unit == player => {
                    let first = handle.submit_action(player, attack).await.unwrap();
                    if first.action_points_remaining > 0 {
                        let next = if destroyed_target(&first) {
                            Action::EndTurn
                        } else {
                            attack
                        };
                        handle.submit_action(player, next).await.unwrap();
                    }
                }
                event if battle_ended(&event) => break,
                _ => {}
            }
        }

        let report = task.await.unwrap();
        assert_eq!(report.outcome, BattleOutcome::Victory);
        assert!(report.battle.objective_complete);
        assert_eq!(report.reward.map(|r| r.credits), Some(500));
        let mvp = report.mvp.unwrap();
        assert_eq!(mvp.unit, player);
        assert_eq!(mvp.stats.kills, 1);
    }
}

// =============================================================================
// Ordering and Failure
// =============================================================================

mod ordering_tests {
    use super::*;

    /// Orders a move off the map every time.
    struct OffTheMap;

    impl Commander for OffTheMap {
        fn decide(&self, _: &Battle, _: UnitId, _: &mut dyn Dice) -> Decision {
            Decision {
                action: Action::Move {
                    to: GridPos::new(-1, -1),
                },
                is_final: false,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn players_move_before_ai_in_registration_order() {
        let mut config = duel_config();
        config
            .players
            .push(PlayerSpawn::new("brin", "destroyer", GridPos::new(4, 2)));
        config.enemies = vec![
            EnemySpawn::new("destroyer", GridPos::new(19, 19)),
            EnemySpawn::new("destroyer", GridPos::new(19, 0)),
        ];
        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(scheduler.run());

        let seen = pass_every_turn(&handle, &mut events).await;
        let Some(BattleEvent::BattleStarted { turn_order, .. }) = seen.first() else {
            panic!("first event was {:?}", seen.first());
        };
        let mut expected = turn_order.clone();
        expected.extend([UnitId::new(3), UnitId::new(4)]);
        assert_eq!(turns_begun(&seen), expected);

        assert_eq!(task.await.unwrap().outcome, BattleOutcome::Stalemate);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_ai_order_forfeits_and_play_continues() {
        let mut config = duel_config();
        config.max_rounds = 2;
        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let scheduler = scheduler.with_commander(OffTheMap);
        let mut events = handle.subscribe();
        let task = tokio::spawn(scheduler.run());
        let (player, oiler) = (UnitId::new(1), UnitId::new(2));

        let seen = pass_every_turn(&handle, &mut events).await;
        let forfeits = seen
            .iter()
            .filter(|e| {
                **e == BattleEvent::TurnEnded {
                    unit: oiler,
                    reason: TurnEnd::Forfeited,
                }
            })
            .count();
        assert_eq!(forfeits, 2);
        assert!(!seen
            .iter()
            .any(|e| matches!(e, BattleEvent::ActionResolved(r) if r.unit == oiler)));
        assert_eq!(turns_begun(&seen), vec![player, oiler, player, oiler]);

        let report = task.await.unwrap();
        assert_eq!(report.outcome, BattleOutcome::Stalemate);
        assert_eq!(report.rounds, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn victory_ends_the_round_before_later_turns() {
        let mut config = duel_config();
        config.max_rounds = 50;
        config.templates.insert("hulk", hulk_template());
        config.players = vec![PlayerSpawn::new("ayla", "battleship", GridPos::new(5, 5))];
        config.enemies = vec![
            EnemySpawn::new("hulk", GridPos::new(6, 5)).designated("flagship"),
            EnemySpawn::new("destroyer", GridPos::new(19, 19)),
        ];
        config.objective = Objective::new(ObjectiveKind::DefeatBoss {
            designation: "flagship".into(),
        });

        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(scheduler.run());
        let (player, boss) = (UnitId::new(1), UnitId::new(2));
        let attack = Action::Attack {
            slot: WeaponSlot::Secondary,
            ammo: AmmoType::He,
            target: boss,
        };

        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.unwrap();
            if matches!(event, BattleEvent::TurnBegan { unit, .. } if unit == player) {
                let first = handle.submit_action(player, attack).await.unwrap();
                if first.action_points_remaining > 0 {
                    let next = if destroyed_target(&first) {
                        Action::EndTurn
                    } else {
                        attack
                    };
                    handle.submit_action(player, next).await.unwrap();
                }
            }
            let done = battle_ended(&event);
            seen.push(event);
            if done {
                break;
            }
        }

        let sunk = seen
            .iter()
            .position(|e| matches!(e, BattleEvent::UnitDestroyed { unit, .. } if *unit == boss))
            .unwrap();
        assert!(!seen[sunk..]
            .iter()
            .any(|e| matches!(e, BattleEvent::TurnBegan { .. })));
        assert_eq!(task.await.unwrap().outcome, BattleOutcome::Victory);
    }

    #[tokio::test(start_paused = true)]
    async fn ai_without_targets_never_fires() {
        let mut config = duel_config();
        config.enemies =
            vec![EnemySpawn::new("destroyer", GridPos::new(10, 10)).on_side(Side::Allied)];
        config.objective = Objective::new(ObjectiveKind::CaptureOutpost {
            position: GridPos::new(15, 15),
            radius: 1.0,
            turns_required: 5,
        });
        let (scheduler, handle) = TurnScheduler::new(config).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(scheduler.run());
        let escort = UnitId::new(2);

        let seen = pass_every_turn(&handle, &mut events).await;
        assert!(seen.contains(&BattleEvent::TurnEnded {
            unit: escort,
            reason: TurnEnd::Ended,
        }));
        assert!(!seen.iter().any(|e| matches!(
            e,
            BattleEvent::ActionResolved(r) if matches!(r.effect, ActionEffect::Attacked { .. })
        )));

        let report = task.await.unwrap();
        assert_eq!(report.battle.stats[&escort].shots_fired, 0);
    }
}
