//! Decision making for AI ships, emplacements and squadrons.
//!
//! The engine is stateless: each call to [`AiEngine::decide`] looks at the
//! battle as it is and returns the next [`Action`]. The scheduler keeps
//! asking until the unit runs out of action points or a decision is marked
//! final.
//!
//! # Priorities
//!
//! 1. No live opposing unit: patrol (one random move, then stop).
//! 2. A carrier at the start of its turn with aircraft to spare launches a
//!    squadron chosen for the nearest target.
//! 3. Something is in range of a loaded weapon: fire the weapon with the
//!    highest expected damage.
//! 4. Units with a waypoint steam toward it.
//! 5. Otherwise close on the nearest target.

use tracing::trace;

use crate::actions::Action;
use crate::battle::Battle;
use crate::combat::modifiers::overpenetration;
use crate::combat::CombatResolver;
use crate::dice::Dice;
use crate::entity::{
    AircraftType, AmmoType, Capabilities, Combatant, GridPos, SizeClass, UnitId, WeaponSlot,
};

/// Squadrons a single carrier keeps in the air at once.
pub const MAX_AIRBORNE_PER_CARRIER: usize = 2;

/// Attempts at finding a free patrol cell before giving up.
const PATROL_ATTEMPTS: usize = 8;

/// The AI's next move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Action to take.
    pub action: Action,
    /// The unit does nothing else this turn after this action.
    pub is_final: bool,
}

impl Decision {
    const fn then_continue(action: Action) -> Self {
        Self {
            action,
            is_final: false,
        }
    }

    const fn last(action: Action) -> Self {
        Self {
            action,
            is_final: true,
        }
    }

    const fn end_turn() -> Self {
        Self::last(Action::EndTurn)
    }
}

/// Source of orders for units no player controls.
///
/// The scheduler asks for one [`Decision`] at a time and validates each
/// action before applying it; an order that fails validation forfeits the
/// rest of the unit's turn.
pub trait Commander: Send + Sync {
    /// Next action for `unit`.
    fn decide(&self, battle: &Battle, unit: UnitId, dice: &mut dyn Dice) -> Decision;
}

/// Chooses actions for non-player units.
#[derive(Debug, Clone)]
pub struct AiEngine {
    max_airborne: usize,
}

impl Default for AiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AiEngine {
    /// Creates an engine with the standard squadron limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_airborne: MAX_AIRBORNE_PER_CARRIER,
        }
    }

    /// Nearest living unit on the opposing side; ties go to the earliest
    /// registered.
    #[must_use]
    pub fn select_target<'a>(&self, battle: &'a Battle, unit: &Combatant) -> Option<&'a Combatant> {
        let mut best: Option<(&Combatant, f32)> = None;
        for candidate in battle.live_on_side(unit.side().opposing()) {
            let d = unit.distance_to(candidate.position);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((candidate, d));
            }
        }
        best.map(|(c, _)| c)
    }

    /// Squadron type to send against a target.
    #[must_use]
    pub fn choose_squadron(target: &Combatant) -> AircraftType {
        if target.can(Capabilities::AIRBORNE) {
            AircraftType::Fighter
        } else if target.class.size_class() == SizeClass::Heavy {
            AircraftType::TorpedoBomber
        } else {
            AircraftType::DiveBomber
        }
    }

    /// Ammunition for a slot against a target.
    ///
    /// Main guns load HE when AP would overpenetrate and AP otherwise; other
    /// slots load whichever accepted round is expected to do more damage.
    #[must_use]
    pub fn choose_ammo(
        attacker: &Combatant,
        target: &Combatant,
        slot: WeaponSlot,
        battle: &Battle,
    ) -> AmmoType {
        match slot {
            WeaponSlot::Main => {
                if overpenetration(slot, AmmoType::Ap, attacker.class, target.class) < 1.0 {
                    AmmoType::He
                } else {
                    AmmoType::Ap
                }
            }
            WeaponSlot::Torpedo => AmmoType::Torpedo,
            WeaponSlot::Secondary | WeaponSlot::Bombs => {
                let ap = CombatResolver::expected_damage(
                    attacker,
                    target,
                    slot,
                    AmmoType::Ap,
                    battle.weather,
                );
                let he = CombatResolver::expected_damage(
                    attacker,
                    target,
                    slot,
                    AmmoType::He,
                    battle.weather,
                );
                if ap > he {
                    AmmoType::Ap
                } else {
                    AmmoType::He
                }
            }
        }
    }

    /// Best loaded, in-range weapon against a target.
    fn best_attack(
        attacker: &Combatant,
        target: &Combatant,
        battle: &Battle,
    ) -> Option<(WeaponSlot, AmmoType)> {
        let distance = attacker.distance_to(target.position);
        let mut best: Option<(WeaponSlot, AmmoType, f32)> = None;
        for (slot, weapon) in &attacker.weapons {
            if attacker.ammo_for(*slot) == 0 || distance > weapon.range {
                continue;
            }
            let ammo = Self::choose_ammo(attacker, target, *slot, battle);
            let expected =
                CombatResolver::expected_damage(attacker, target, *slot, ammo, battle.weather);
            if best.map_or(true, |(_, _, e)| expected > e) {
                best = Some((*slot, ammo, expected));
            }
        }
        best.map(|(slot, ammo, _)| (slot, ammo))
    }

    /// Decides the next action for `unit`.
    ///
    /// Dead units and units with no action points end their turn.
    pub fn decide(&self, battle: &Battle, unit: UnitId, dice: &mut dyn Dice) -> Decision {
        let Some(actor) = battle.get(unit).filter(|u| u.is_alive()) else {
            return Decision::end_turn();
        };
        if actor.action_points().is_exhausted() {
            return Decision::end_turn();
        }

        let Some(target) = self.select_target(battle, actor) else {
            trace!(unit = %unit, "no targets, patrolling");
            return Self::patrol(battle, actor, dice);
        };

        if self.should_launch(battle, actor) {
            return Decision::last(Action::LaunchAircraft {
                squadron: Self::choose_squadron(target),
            });
        }

        if let Some((slot, ammo)) = Self::best_attack(actor, target, battle) {
            return Decision::then_continue(Action::Attack {
                slot,
                ammo,
                target: target.id(),
            });
        }

        if actor.weapons.keys().all(|slot| actor.ammo_for(*slot) == 0) {
            return Decision::end_turn();
        }

        let goal = actor
            .waypoint()
            .filter(|w| actor.distance_to(*w) >= 1.0)
            .unwrap_or(target.position);
        match Self::step_toward(battle, actor, goal) {
            Some(to) => Decision::then_continue(Action::Move { to }),
            None => Decision::end_turn(),
        }
    }

    fn should_launch(&self, battle: &Battle, actor: &Combatant) -> bool {
        actor.can(Capabilities::HANGAR)
            && actor.hangar > 0
            && actor.action_points().remaining() == actor.action_points().budget()
            && battle.airborne_from(actor.id()) < self.max_airborne
            && battle.free_cell_near(actor.position, 1).is_some()
    }

    /// Cells searched in each direction: the unit's speed, never more than
    /// the grid is wide.
    fn reach(battle: &Battle, actor: &Combatant) -> i32 {
        let extent = battle.grid.width.max(battle.grid.height);
        i32::try_from(actor.speed).map_or(extent, |speed| speed.min(extent))
    }

    /// Free cell within speed that gets closest to `goal`, if it improves on
    /// the current distance.
    fn step_toward(battle: &Battle, actor: &Combatant, goal: GridPos) -> Option<GridPos> {
        if !actor.can(Capabilities::MOBILE) || actor.speed == 0 {
            return None;
        }
        let reach = Self::reach(battle, actor);
        #[allow(clippy::cast_precision_loss)]
        let max_step = actor.speed as f32;
        let goal_f = goal.as_vec2();
        let mut best: Option<(GridPos, f32)> = None;
        let current = actor.position.as_vec2().distance(goal_f);

        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let cell = actor.position + GridPos::new(dx, dy);
                if cell == actor.position
                    || !battle.grid.contains(cell)
                    || actor.distance_to(cell) > max_step
                    || battle.occupant(cell).is_some()
                {
                    continue;
                }
                let d = cell.as_vec2().distance(goal_f);
                if d < current && best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((cell, d));
                }
            }
        }
        best.map(|(cell, _)| cell)
    }

    fn patrol(battle: &Battle, actor: &Combatant, dice: &mut dyn Dice) -> Decision {
        if !actor.can(Capabilities::MOBILE) || actor.speed == 0 {
            return Decision::end_turn();
        }
        let reach = Self::reach(battle, actor);
        #[allow(clippy::cast_precision_loss)]
        let max_step = actor.speed as f32;
        for _ in 0..PATROL_ATTEMPTS {
            let offset = GridPos::new(dice.range(-reach, reach), dice.range(-reach, reach));
            let cell = battle.grid.clamp(actor.position + offset);
            if cell != actor.position
                && actor.distance_to(cell) <= max_step
                && battle.occupant(cell).is_none()
            {
                return Decision::last(Action::Move { to: cell });
            }
        }
        Decision::end_turn()
    }
}

impl Commander for AiEngine {
    fn decide(&self, battle: &Battle, unit: UnitId, dice: &mut dyn Dice) -> Decision {
        AiEngine::decide(self, battle, unit, dice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::GridBounds;
    use crate::dice::ScriptedDice;
    use crate::entity::UnitKind;
    use crate::objective::{Objective, ObjectiveKind};
    use crate::templates::TemplateCatalog;
    use crate::weather::Weather;

    fn empty_battle() -> (Battle, TemplateCatalog) {
        (
            Battle::new(
                GridBounds::new(20, 20),
                Weather::Clear,
                Objective::new(ObjectiveKind::DestroyAll),
            ),
            TemplateCatalog::standard(),
        )
    }

    fn spawn(
        battle: &mut Battle,
        catalog: &TemplateCatalog,
        key: &str,
        kind: UnitKind,
        x: i32,
        y: i32,
    ) -> UnitId {
        battle.spawn(key, catalog.get(key).unwrap(), kind, GridPos::new(x, y))
    }

    mod targeting_tests {
        use super::*;

        #[test]
        fn nearest_target_ties_to_registration_order() {
            let (mut battle, catalog) = empty_battle();
            let ai = spawn(&mut battle, &catalog, "destroyer", UnitKind::enemy(), 10, 10);
            let first = spawn(&mut battle, &catalog, "destroyer", UnitKind::player("a"), 10, 13);
            spawn(&mut battle, &catalog, "destroyer", UnitKind::player("b"), 13, 10);

            let engine = AiEngine::new();
            let actor = battle.get(ai).unwrap();
            assert_eq!(engine.select_target(&battle, actor).unwrap().id(), first);
        }

        #[test]
        fn squadron_matches_target() {
            let (mut battle, catalog) = empty_battle();
            let bb = spawn(&mut battle, &catalog, "battleship", UnitKind::player("a"), 0, 0);
            let dd = spawn(&mut battle, &catalog, "destroyer", UnitKind::player("b"), 2, 0);
            assert_eq!(
                AiEngine::choose_squadron(battle.get(bb).unwrap()),
                AircraftType::TorpedoBomber
            );
            assert_eq!(
                AiEngine::choose_squadron(battle.get(dd).unwrap()),
                AircraftType::DiveBomber
            );
        }
    }

    mod ammo_tests {
        use super::*;

        #[test]
        fn main_guns_switch_to_he_against_light_hulls() {
            let (mut battle, catalog) = empty_battle();
            let bb = spawn(&mut battle, &catalog, "battleship", UnitKind::enemy(), 0, 0);
            let dd = spawn(&mut battle, &catalog, "destroyer", UnitKind::player("a"), 5, 0);
            let other_bb = spawn(&mut battle, &catalog, "battleship", UnitKind::player("b"), 0, 5);
            let attacker = battle.get(bb).unwrap();

            assert_eq!(
                AiEngine::choose_ammo(attacker, battle.get(dd).unwrap(), WeaponSlot::Main, &battle),
                AmmoType::He
            );
            assert_eq!(
                AiEngine::choose_ammo(
                    attacker,
                    battle.get(other_bb).unwrap(),
                    WeaponSlot::Main,
                    &battle
                ),
                AmmoType::Ap
            );
        }
    }

    mod decision_tests {
        use super::*;

        #[test]
        fn attacks_when_in_range() {
            let (mut battle, catalog) = empty_battle();
            let ai = spawn(&mut battle, &catalog, "destroyer", UnitKind::enemy(), 10, 10);
            let p = spawn(&mut battle, &catalog, "destroyer", UnitKind::player("a"), 13, 10);
            let decision = AiEngine::new().decide(&battle, ai, &mut ScriptedDice::constant(0.5));
            assert!(matches!(
                decision.action,
                Action::Attack { target, .. } if target == p
            ));
            assert!(!decision.is_final);
        }

        #[test]
        fn closes_distance_when_out_of_range() {
            let (mut battle, catalog) = empty_battle();
            let ai = spawn(&mut battle, &catalog, "destroyer", UnitKind::enemy(), 0, 0);
            spawn(&mut battle, &catalog, "destroyer", UnitKind::player("a"), 19, 0);
            let decision = AiEngine::new().decide(&battle, ai, &mut ScriptedDice::constant(0.5));
            assert_eq!(decision.action, Action::Move { to: GridPos::new(4, 0) });
        }

        #[test]
        fn emplacements_hold_position() {
            let (mut battle, catalog) = empty_battle();
            let ai = spawn(&mut battle, &catalog, "shore_battery", UnitKind::enemy(), 0, 0);
            spawn(&mut battle, &catalog, "destroyer", UnitKind::player("a"), 19, 19);
            let decision = AiEngine::new().decide(&battle, ai, &mut ScriptedDice::constant(0.5));
            assert_eq!(decision, Decision::end_turn());
        }

        #[test]
        fn patrol_without_targets_is_final() {
            let (mut battle, catalog) = empty_battle();
            let ai = spawn(&mut battle, &catalog, "destroyer", UnitKind::enemy(), 10, 10);
            // offsets of +1 on both axes
            let decision = AiEngine::new().decide(&battle, ai, &mut ScriptedDice::constant(0.6));
            assert!(decision.is_final);
            let Action::Move { to } = decision.action else {
                panic!("expected a patrol move");
            };
            assert!(battle.get(ai).unwrap().distance_to(to) <= 4.0);
        }

        #[test]
        fn oversized_speed_stays_on_the_grid() {
            let (mut battle, catalog) = empty_battle();
            let ai = spawn(&mut battle, &catalog, "destroyer", UnitKind::enemy(), 10, 10);
            battle.get_mut(ai).unwrap().speed = u32::MAX;
            let engine = AiEngine::new();

            let patrol = engine.decide(&battle, ai, &mut ScriptedDice::constant(0.9));
            let Action::Move { to } = patrol.action else {
                panic!("expected a patrol move, got {:?}", patrol.action);
            };
            assert!(battle.grid.contains(to));

            let target = spawn(&mut battle, &catalog, "destroyer", UnitKind::player("a"), 19, 0);
            let chase = engine.decide(&battle, ai, &mut ScriptedDice::constant(0.5));
            let Action::Move { to } = chase.action else {
                panic!("expected a chase move, got {:?}", chase.action);
            };
            assert!(battle.grid.contains(to));
            assert!(battle.get(target).unwrap().distance_to(to) < 2.0);
        }

        #[test]
        fn carriers_launch_at_turn_start() {
            let (mut battle, catalog) = empty_battle();
            let cv = spawn(&mut battle, &catalog, "carrier", UnitKind::enemy(), 10, 10);
            spawn(&mut battle, &catalog, "battleship", UnitKind::player("a"), 0, 0);
            let decision = AiEngine::new().decide(&battle, cv, &mut ScriptedDice::constant(0.5));
            assert_eq!(
                decision,
                Decision::last(Action::LaunchAircraft {
                    squadron: AircraftType::TorpedoBomber
                })
            );
        }

        #[test]
        fn dry_magazines_end_the_turn() {
            let (mut battle, catalog) = empty_battle();
            let ai = spawn(&mut battle, &catalog, "submarine", UnitKind::enemy(), 0, 0);
            spawn(&mut battle, &catalog, "destroyer", UnitKind::player("a"), 19, 19);
            battle
                .get_mut(ai)
                .unwrap()
                .ammo
                .insert(WeaponSlot::Torpedo, 0);
            let decision = AiEngine::new().decide(&battle, ai, &mut ScriptedDice::constant(0.5));
            assert_eq!(decision, Decision::end_turn());
        }

        #[test]
        fn waypoint_beats_chasing() {
            let (mut battle, catalog) = empty_battle();
            let kind = UnitKind::Ai(crate::entity::AiUnit {
                side: None,
                waypoint: Some(GridPos::new(0, 19)),
            });
            let ai = spawn(&mut battle, &catalog, "auxiliary", kind, 0, 10);
            spawn(&mut battle, &catalog, "destroyer", UnitKind::player("a"), 19, 10);
            let decision = AiEngine::new().decide(&battle, ai, &mut ScriptedDice::constant(0.5));
            assert_eq!(decision.action, Action::Move { to: GridPos::new(0, 13) });
        }
    }
}
