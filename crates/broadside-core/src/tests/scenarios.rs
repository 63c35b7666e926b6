//! Reference scenarios, run end to end through the battle and action layer.

use tokio::time::Instant;

use super::helpers::*;
use crate::actions::{apply_action, Action, ActionEffect};
use crate::ai::AiEngine;
use crate::combat::modifiers::OVERPEN_HEAVY_VS_LIGHT;
use crate::combat::CombatResolver;
use crate::dice::ScriptedDice;
use crate::effects::tick;
use crate::entity::{AmmoType, GridPos, StatusEffect, UnitId, UnitKind, WeaponSlot};
use crate::events::TurnEnd;
use crate::objective::ObjectiveKind;
use crate::templates::{TemplateCatalog, UnitTemplate};
use crate::turn::{PlayerTurnController, TurnTiming};
use crate::weather::Weather;

// =============================================================================
// Gunnery
// =============================================================================

#[test]
fn battleship_at_half_range_against_evasive_target() {
    let mut battle = battle_with(ObjectiveKind::DestroyAll);
    let bb = spawn(&mut battle, "battleship", UnitKind::player("ayla"), 0, 0);
    let target = spawn(&mut battle, "light_cruiser", UnitKind::enemy(), 6, 0);
    battle.get_mut(target).unwrap().evasion = 0.2;

    let chance = CombatResolver::hit_chance(
        battle.get(bb).unwrap(),
        battle.get(target).unwrap(),
        WeaponSlot::Main,
        Weather::Clear,
    )
    .unwrap();
    assert!((chance - 0.51).abs() < 1e-6);
}

#[test]
fn battleship_ap_overpenetrates_destroyer() {
    let catalog = TemplateCatalog::standard();
    let mut battle = battle_with(ObjectiveKind::DestroyAll);
    let bb = spawn(&mut battle, "battleship", UnitKind::player("ayla"), 0, 0);
    let dd = spawn(&mut battle, "destroyer", UnitKind::enemy(), 6, 0);

    // hit, no crit, penetrate
    let mut dice = ScriptedDice::new([0.0, 0.9, 0.0]);
    let attack = Action::Attack {
        slot: WeaponSlot::Main,
        ammo: AmmoType::Ap,
        target: dd,
    };
    let report = apply_action(&mut battle, &catalog, bb, &attack, &mut dice).unwrap();

    let ActionEffect::Attacked { outcome, .. } = report.effect else {
        panic!("expected an attack, got {:?}", report.effect);
    };
    assert!(outcome.penetrated);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let expected = (120.0 * OVERPEN_HEAVY_VS_LIGHT).round() as u32;
    assert_eq!(outcome.damage, expected);
    assert_eq!(battle.get(dd).unwrap().health(), 300 - expected);
    assert_eq!(battle.get(bb).unwrap().ammo_for(WeaponSlot::Main), 19);
    assert_eq!(battle.stats[&bb].hits, 1);
}

// =============================================================================
// Status Effects
// =============================================================================

#[test]
fn fire_on_small_hull_burns_two_per_turn() {
    let mut template: UnitTemplate = TemplateCatalog::standard()
        .get("auxiliary")
        .unwrap()
        .clone();
    template.max_health = 100;
    let mut battle = battle_with(ObjectiveKind::DestroyAll);
    let id = battle.spawn("auxiliary", &template, UnitKind::enemy(), GridPos::new(3, 3));

    let unit = battle.get_mut(id).unwrap();
    unit.set_health(10);
    unit.apply_status_effect(StatusEffect::Ignite);

    tick(unit);
    assert_eq!(unit.health(), 8);
    tick(unit);
    assert_eq!(unit.health(), 6);
    assert!(unit.is_alive());
    assert!(unit.status.on_fire);
}

// =============================================================================
// Turns
// =============================================================================

#[tokio::test]
async fn repeated_begin_yields_one_waiter() {
    let mut turns = PlayerTurnController::new(TurnTiming::default(), false);
    let unit = UnitId::new(1);
    let now = Instant::now();

    let mut waiters: Vec<_> = (0..2).filter_map(|_| turns.begin_turn(unit, now)).collect();
    assert_eq!(waiters.len(), 1);

    turns.record_action(unit, 0, false, now).unwrap();
    assert_eq!(waiters.pop().unwrap().await, TurnEnd::Exhausted);
}

// =============================================================================
// AI
// =============================================================================

#[test]
fn ai_without_targets_patrols_and_holds_fire() {
    let catalog = TemplateCatalog::standard();
    let mut battle = battle_with(ObjectiveKind::DestroyAll);
    let ai = spawn(&mut battle, "destroyer", UnitKind::enemy(), 10, 10);
    let engine = AiEngine::new();
    let mut dice = ScriptedDice::constant(0.6);

    let decision = engine.decide(&battle, ai, &mut dice);
    assert!(decision.is_final);
    assert!(matches!(decision.action, Action::Move { .. }));

    let report = apply_action(&mut battle, &catalog, ai, &decision.action, &mut dice).unwrap();
    assert!(matches!(report.effect, ActionEffect::Moved { .. }));
    assert_eq!(battle.stats[&ai].shots_fired, 0);
}
