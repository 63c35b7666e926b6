//! The battle aggregate.
//!
//! A [`Battle`] holds everything about one engagement: the roster, the turn
//! order, weather, objective progress, and statistics. It is owned by exactly
//! one scheduler and mutated only from the scheduler's task; external
//! observers receive clones through snapshots.
//!
//! # Determinism
//!
//! The roster is a `BTreeMap` keyed by monotonically increasing [`UnitId`]s,
//! so iterating it always yields units in registration order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dice::BattleRng;
use crate::entity::{Combatant, GridPos, Side, UnitId, UnitKind, UnitTag};
use crate::mvp::{select_mvp, MvpAward, MvpStats};
use crate::objective::{Objective, ObjectiveProgress};
use crate::templates::UnitTemplate;
use crate::weather::Weather;

// =============================================================================
// Grid
// =============================================================================

/// Size of the battle map. Cells run from `(0, 0)` to
/// `(width - 1, height - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    /// Number of columns.
    pub width: i32,
    /// Number of rows.
    pub height: i32,
}

impl GridBounds {
    /// Creates bounds.
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if the cell is on the map.
    #[must_use]
    pub const fn contains(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Clamps a cell onto the map.
    #[must_use]
    pub fn clamp(&self, pos: GridPos) -> GridPos {
        GridPos::new(
            pos.x.clamp(0, (self.width - 1).max(0)),
            pos.y.clamp(0, (self.height - 1).max(0)),
        )
    }
}

impl Default for GridBounds {
    fn default() -> Self {
        Self::new(20, 20)
    }
}

// =============================================================================
// Phase and Outcome
// =============================================================================

/// Battle lifecycle phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    /// Accepting joins before the first round.
    Joining,
    /// Rounds are running.
    Battle,
    /// Finished.
    Ended,
}

/// How a battle ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleOutcome {
    /// The objective was completed.
    Victory,
    /// The objective can no longer be completed.
    ObjectiveFailed,
    /// Every player was lost and nobody rejoined in time.
    Abandoned,
    /// The round limit was reached.
    Stalemate,
}

impl BattleOutcome {
    /// Returns `true` for a player win.
    #[must_use]
    pub const fn is_victory(self) -> bool {
        matches!(self, Self::Victory)
    }
}

impl fmt::Display for BattleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Victory => write!(f, "victory"),
            Self::ObjectiveFailed => write!(f, "objective failed"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::Stalemate => write!(f, "stalemate"),
        }
    }
}

// =============================================================================
// Battle
// =============================================================================

/// State of one engagement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    /// Lifecycle phase.
    pub phase: BattlePhase,
    /// Rounds completed so far.
    pub turn_number: u32,
    units: BTreeMap<UnitId, Combatant>,
    turn_order: Vec<UnitId>,
    next_id: u64,
    /// Current weather.
    pub weather: Weather,
    /// What the players must achieve.
    pub objective: Objective,
    /// Set once the objective's completion check passes.
    pub objective_complete: bool,
    /// Set when the battle ends.
    pub outcome: Option<BattleOutcome>,
    /// Per-unit statistics.
    pub stats: BTreeMap<UnitId, MvpStats>,
    /// Map size.
    pub grid: GridBounds,
    /// Objective counters.
    pub progress: ObjectiveProgress,
    /// Whether player turns pause for narration once action points run out.
    pub roleplay: bool,
}

impl Battle {
    /// Creates an empty battle in the joining phase.
    #[must_use]
    pub fn new(grid: GridBounds, weather: Weather, objective: Objective) -> Self {
        Self {
            phase: BattlePhase::Joining,
            turn_number: 0,
            units: BTreeMap::new(),
            turn_order: Vec::new(),
            next_id: 1,
            weather,
            objective,
            objective_complete: false,
            outcome: None,
            stats: BTreeMap::new(),
            grid,
            progress: ObjectiveProgress::default(),
            roleplay: false,
        }
    }

    /// Enables the roleplay pause.
    #[must_use]
    pub fn with_roleplay(mut self, roleplay: bool) -> Self {
        self.roleplay = roleplay;
        self
    }

    /// Adds a unit built from a template and returns its id.
    ///
    /// Player units are appended to the turn order.
    pub fn spawn(
        &mut self,
        template_key: &str,
        template: &UnitTemplate,
        kind: UnitKind,
        position: GridPos,
    ) -> UnitId {
        let id = UnitId::new(self.next_id);
        self.next_id += 1;

        let unit = Combatant::from_template(id, template_key, template, kind, position);
        if unit.is_player() {
            self.turn_order.push(id);
        }
        self.units.insert(id, unit);
        self.stats.insert(id, MvpStats::default());
        id
    }

    /// Returns a unit by id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Combatant> {
        self.units.get(&id)
    }

    /// Returns a mutable unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Combatant> {
        self.units.get_mut(&id)
    }

    /// Returns `true` if the unit exists and is alive.
    #[must_use]
    pub fn is_alive(&self, id: UnitId) -> bool {
        self.units.get(&id).is_some_and(Combatant::is_alive)
    }

    /// Iterates all units, dead ones included, in registration order.
    pub fn units(&self) -> impl Iterator<Item = &Combatant> {
        self.units.values()
    }

    /// Iterates living units in registration order.
    pub fn live_units(&self) -> impl Iterator<Item = &Combatant> {
        self.units.values().filter(|u| u.is_alive())
    }

    /// Number of units ever registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if no unit has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Player turn order.
    #[must_use]
    pub fn turn_order(&self) -> &[UnitId] {
        &self.turn_order
    }

    /// Reshuffles the player turn order.
    pub fn shuffle_turn_order(&mut self, rng: &mut BattleRng) {
        rng.shuffle(&mut self.turn_order);
    }

    /// AI, aircraft and emplacement units in registration order.
    #[must_use]
    pub fn ai_units(&self) -> Vec<UnitId> {
        self.units
            .values()
            .filter(|u| u.tag() != UnitTag::Player)
            .map(Combatant::id)
            .collect()
    }

    /// Number of living player units.
    #[must_use]
    pub fn live_players(&self) -> usize {
        self.live_units().filter(|u| u.is_player()).count()
    }

    /// Living units on a side.
    pub fn live_on_side(&self, side: Side) -> impl Iterator<Item = &Combatant> {
        self.live_units().filter(move |u| u.side() == side)
    }

    /// The living unit occupying a cell, if any.
    #[must_use]
    pub fn occupant(&self, pos: GridPos) -> Option<UnitId> {
        self.live_units()
            .find(|u| u.position == pos)
            .map(Combatant::id)
    }

    /// First unit carrying a designation.
    #[must_use]
    pub fn designated(&self, designation: &str) -> Option<&Combatant> {
        self.units
            .values()
            .find(|u| u.designation.as_deref() == Some(designation))
    }

    /// Units launched from a carrier that are still flying.
    #[must_use]
    pub fn airborne_from(&self, carrier: UnitId) -> usize {
        self.live_units()
            .filter(|u| matches!(&u.kind, UnitKind::Aircraft(a) if a.carrier == carrier))
            .count()
    }

    /// Nearest free cell around `origin`, scanning outward ring by ring.
    #[must_use]
    pub fn free_cell_near(&self, origin: GridPos, max_radius: i32) -> Option<GridPos> {
        for radius in 1..=max_radius {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    let cell = origin + GridPos::new(dx, dy);
                    if self.grid.contains(cell) && self.occupant(cell).is_none() {
                        return Some(cell);
                    }
                }
            }
        }
        None
    }

    /// Statistics for a unit.
    pub fn stats_mut(&mut self, id: UnitId) -> &mut MvpStats {
        self.stats.entry(id).or_default()
    }

    /// Credits every living unit with one round survived.
    pub fn credit_survivors(&mut self) {
        let survivors: Vec<UnitId> = self.live_units().map(Combatant::id).collect();
        for id in survivors {
            self.stats_mut(id).turns_survived += 1;
        }
    }

    /// Best player unit so far.
    #[must_use]
    pub fn mvp(&self) -> Option<MvpAward> {
        let candidates = self
            .units
            .values()
            .filter_map(|u| u.owner().map(|owner| (u.id(), owner)));
        select_mvp(&self.stats, candidates)
    }

    /// Ends the battle.
    pub fn end(&mut self, outcome: BattleOutcome) {
        self.phase = BattlePhase::Ended;
        self.outcome = Some(outcome);
    }

    /// Returns `true` once the battle has ended.
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.phase == BattlePhase::Ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::ObjectiveKind;
    use crate::templates::TemplateCatalog;

    fn battle() -> (Battle, TemplateCatalog) {
        let objective = Objective::new(ObjectiveKind::DestroyAll);
        (
            Battle::new(GridBounds::new(10, 10), Weather::Clear, objective),
            TemplateCatalog::standard(),
        )
    }

    mod grid_tests {
        use super::*;

        #[test]
        fn bounds_are_half_open() {
            let grid = GridBounds::new(10, 5);
            assert!(grid.contains(GridPos::new(0, 0)));
            assert!(grid.contains(GridPos::new(9, 4)));
            assert!(!grid.contains(GridPos::new(10, 0)));
            assert!(!grid.contains(GridPos::new(0, -1)));
            assert_eq!(grid.clamp(GridPos::new(15, -3)), GridPos::new(9, 0));
        }
    }

    mod roster_tests {
        use super::*;

        #[test]
        fn ids_are_monotonic_and_players_join_turn_order() {
            let (mut battle, catalog) = battle();
            let dd = catalog.get("destroyer").unwrap();
            let a = battle.spawn("destroyer", dd, UnitKind::player("a"), GridPos::new(0, 0));
            let e = battle.spawn("destroyer", dd, UnitKind::enemy(), GridPos::new(5, 5));
            let b = battle.spawn("destroyer", dd, UnitKind::player("b"), GridPos::new(1, 0));

            assert!(a < e && e < b);
            assert_eq!(battle.turn_order(), &[a, b]);
            assert_eq!(battle.ai_units(), vec![e]);
            assert_eq!(battle.live_players(), 2);
        }

        #[test]
        fn dead_units_stay_in_roster() {
            let (mut battle, catalog) = battle();
            let dd = catalog.get("destroyer").unwrap();
            let a = battle.spawn("destroyer", dd, UnitKind::player("a"), GridPos::new(0, 0));
            battle.get_mut(a).unwrap().set_health(0);

            assert_eq!(battle.len(), 1);
            assert_eq!(battle.turn_order(), &[a]);
            assert_eq!(battle.live_players(), 0);
            assert!(battle.occupant(GridPos::new(0, 0)).is_none());
        }

        #[test]
        fn free_cell_skips_occupied_and_off_grid() {
            let (mut battle, catalog) = battle();
            let dd = catalog.get("destroyer").unwrap();
            battle.spawn("destroyer", dd, UnitKind::enemy(), GridPos::new(0, 0));
            battle.spawn("destroyer", dd, UnitKind::enemy(), GridPos::new(1, 0));
            let cell = battle.free_cell_near(GridPos::new(0, 0), 1).unwrap();
            assert_eq!(cell, GridPos::new(0, 1));
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn survivors_are_credited_and_mvp_is_player_only() {
            let (mut battle, catalog) = battle();
            let dd = catalog.get("destroyer").unwrap();
            let p = battle.spawn("destroyer", dd, UnitKind::player("ayla"), GridPos::new(0, 0));
            let e = battle.spawn("destroyer", dd, UnitKind::enemy(), GridPos::new(5, 5));
            battle.stats_mut(e).damage_dealt = 10_000;
            battle.credit_survivors();

            assert_eq!(battle.stats[&p].turns_survived, 1);
            let mvp = battle.mvp().unwrap();
            assert_eq!(mvp.unit, p);
            assert_eq!(mvp.owner, "ayla");
        }
    }
}
