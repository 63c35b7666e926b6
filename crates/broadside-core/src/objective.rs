//! Battle objectives and the win-condition check.
//!
//! [`evaluate`] is a pure function of the battle state. The progress
//! counters it reads ([`ObjectiveProgress`]) are advanced by
//! [`record_arrival`] whenever a unit moves and by [`advance_round`] at the
//! end of every round.

use serde::{Deserialize, Serialize};

use crate::battle::Battle;
use crate::entity::{Combatant, GridPos, Side, UnitId, UnitTag};

/// Payout for completing an objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Currency.
    #[serde(default)]
    pub credits: u32,
    /// Progression experience.
    #[serde(default)]
    pub experience: u32,
}

/// What the players must do to win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Sink every enemy ship and emplacement. Aircraft do not count.
    DestroyAll,
    /// Sink one designated enemy unit.
    DefeatBoss {
        /// Designation of the boss.
        designation: String,
    },
    /// Bring a designated allied unit to a destination alive.
    Escort {
        /// Designation of the escorted unit.
        designation: String,
        /// Destination cell.
        destination: GridPos,
        /// Arrival radius in cells.
        radius: f32,
    },
    /// Hold an area with no enemy inside it for a number of rounds.
    CaptureOutpost {
        /// Centre of the outpost.
        position: GridPos,
        /// Radius in cells.
        radius: f32,
        /// Consecutive rounds to hold.
        turns_required: u32,
    },
    /// Move player units onto resource cells.
    ResourceAcquisition {
        /// Cells holding resources.
        cells: Vec<GridPos>,
        /// Cells that must be collected.
        required: usize,
    },
    /// Move player units alongside enemy wrecks.
    Salvage {
        /// Wrecks that must be salvaged.
        required: usize,
    },
    /// Sink enough designated convoy ships before they reach safety.
    ConvoyInterception {
        /// Designation shared by the convoy ships.
        designation: String,
        /// Where the convoy is heading.
        destination: GridPos,
        /// Arrival radius in cells.
        radius: f32,
        /// Convoy ships that must be sunk.
        required_sunk: usize,
    },
}

/// An objective with its reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    /// Completion rule.
    #[serde(flatten)]
    pub kind: ObjectiveKind,
    /// Payout on victory.
    #[serde(default)]
    pub reward: Reward,
}

impl Objective {
    /// Creates an objective with no reward.
    #[must_use]
    pub fn new(kind: ObjectiveKind) -> Self {
        Self {
            kind,
            reward: Reward::default(),
        }
    }

    /// Sets the reward.
    #[must_use]
    pub fn with_reward(mut self, credits: u32, experience: u32) -> Self {
        self.reward = Reward {
            credits,
            experience,
        };
        self
    }
}

impl Default for Objective {
    fn default() -> Self {
        Self::new(ObjectiveKind::DestroyAll)
    }
}

/// Result of a win-condition check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    /// Not decided yet.
    InProgress,
    /// The players have won.
    Complete,
    /// The objective can no longer be met.
    Failed,
}

/// Counters for objectives that accumulate over the battle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveProgress {
    /// Consecutive rounds the outpost has been held.
    pub capture_turns: u32,
    /// Resource cells collected.
    pub resources: Vec<GridPos>,
    /// Wrecks salvaged.
    pub salvaged: Vec<UnitId>,
}

fn counts_as_ship(unit: &Combatant) -> bool {
    unit.tag() != UnitTag::Aircraft
}

fn within(unit: &Combatant, centre: GridPos, radius: f32) -> bool {
    unit.distance_to(centre) <= radius
}

/// Checks the objective against the current battle state.
#[must_use]
pub fn evaluate(battle: &Battle) -> ObjectiveStatus {
    match &battle.objective.kind {
        ObjectiveKind::DestroyAll => {
            let remaining = battle
                .live_on_side(Side::Enemy)
                .filter(|u| counts_as_ship(u))
                .count();
            if remaining == 0 {
                ObjectiveStatus::Complete
            } else {
                ObjectiveStatus::InProgress
            }
        }
        ObjectiveKind::DefeatBoss { designation } => match battle.designated(designation) {
            Some(boss) if boss.is_alive() => ObjectiveStatus::InProgress,
            _ => ObjectiveStatus::Complete,
        },
        ObjectiveKind::Escort {
            designation,
            destination,
            radius,
        } => match battle.designated(designation) {
            Some(escort) if !escort.is_alive() => ObjectiveStatus::Failed,
            Some(escort) if within(escort, *destination, *radius) => ObjectiveStatus::Complete,
            Some(_) => ObjectiveStatus::InProgress,
            None => ObjectiveStatus::Failed,
        },
        ObjectiveKind::CaptureOutpost { turns_required, .. } => {
            if battle.progress.capture_turns >= *turns_required {
                ObjectiveStatus::Complete
            } else {
                ObjectiveStatus::InProgress
            }
        }
        ObjectiveKind::ResourceAcquisition { required, .. } => {
            if battle.progress.resources.len() >= *required {
                ObjectiveStatus::Complete
            } else {
                ObjectiveStatus::InProgress
            }
        }
        ObjectiveKind::Salvage { required } => {
            if battle.progress.salvaged.len() >= *required {
                ObjectiveStatus::Complete
            } else {
                ObjectiveStatus::InProgress
            }
        }
        ObjectiveKind::ConvoyInterception {
            designation,
            destination,
            radius,
            required_sunk,
        } => {
            let convoy: Vec<&Combatant> = battle
                .units()
                .filter(|u| u.designation.as_deref() == Some(designation.as_str()))
                .collect();
            let sunk = convoy.iter().filter(|u| !u.is_alive()).count();
            let escaped = convoy
                .iter()
                .filter(|u| u.is_alive() && within(u, *destination, *radius))
                .count();
            if sunk >= *required_sunk {
                ObjectiveStatus::Complete
            } else if convoy.len() - escaped < *required_sunk {
                ObjectiveStatus::Failed
            } else {
                ObjectiveStatus::InProgress
            }
        }
    }
}

/// Advances resource and salvage progress after `unit` moves.
///
/// Only player units collect. A resource cell counts once; a wreck counts
/// once and is salvaged from any cell touching it.
pub fn record_arrival(battle: &mut Battle, unit: UnitId) {
    let Some(pos) = battle
        .get(unit)
        .filter(|u| u.is_player() && u.is_alive())
        .map(|u| u.position)
    else {
        return;
    };

    match &battle.objective.kind {
        ObjectiveKind::ResourceAcquisition { cells, .. } => {
            if cells.contains(&pos) && !battle.progress.resources.contains(&pos) {
                battle.progress.resources.push(pos);
            }
        }
        ObjectiveKind::Salvage { .. } => {
            let wrecks: Vec<UnitId> = battle
                .units()
                .filter(|u| !u.is_alive() && u.side() == Side::Enemy && counts_as_ship(u))
                .filter(|u| (u.position - pos).abs().max_element() <= 1)
                .map(Combatant::id)
                .collect();
            for wreck in wrecks {
                if !battle.progress.salvaged.contains(&wreck) {
                    battle.progress.salvaged.push(wreck);
                }
            }
        }
        _ => {}
    }
}

/// Round-end bookkeeping for the capture objective.
///
/// The hold counter grows while a living player-side ship is inside the
/// outpost radius and no enemy ship is; any enemy inside resets it.
pub fn advance_round(battle: &mut Battle) {
    let ObjectiveKind::CaptureOutpost {
        position, radius, ..
    } = battle.objective.kind
    else {
        return;
    };

    let inside = |side: Side| {
        battle
            .live_on_side(side)
            .filter(|u| counts_as_ship(u))
            .any(|u| within(u, position, radius))
    };
    let contested = inside(Side::Enemy);
    let held = inside(Side::Allied);

    if contested {
        battle.progress.capture_turns = 0;
    } else if held {
        battle.progress.capture_turns += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::GridBounds;
    use crate::entity::{AiUnit, UnitKind};
    use crate::templates::TemplateCatalog;
    use crate::weather::Weather;

    fn battle_with(kind: ObjectiveKind) -> (Battle, TemplateCatalog) {
        (
            Battle::new(GridBounds::new(20, 20), Weather::Clear, Objective::new(kind)),
            TemplateCatalog::standard(),
        )
    }

    fn spawn(
        battle: &mut Battle,
        catalog: &TemplateCatalog,
        kind: UnitKind,
        x: i32,
        y: i32,
    ) -> UnitId {
        battle.spawn(
            "destroyer",
            catalog.get("destroyer").unwrap(),
            kind,
            GridPos::new(x, y),
        )
    }

    mod destroy_all_tests {
        use super::*;

        #[test]
        fn complete_when_enemy_ships_sunk() {
            let (mut battle, catalog) = battle_with(ObjectiveKind::DestroyAll);
            spawn(&mut battle, &catalog, UnitKind::player("p"), 0, 0);
            let e = spawn(&mut battle, &catalog, UnitKind::enemy(), 5, 5);
            assert_eq!(evaluate(&battle), ObjectiveStatus::InProgress);

            battle.get_mut(e).unwrap().set_health(0);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Complete);
        }
    }

    mod boss_tests {
        use super::*;

        #[test]
        fn complete_when_boss_sunk() {
            let (mut battle, catalog) = battle_with(ObjectiveKind::DefeatBoss {
                designation: "flagship".into(),
            });
            spawn(&mut battle, &catalog, UnitKind::enemy(), 1, 1);
            let boss = spawn(&mut battle, &catalog, UnitKind::enemy(), 5, 5);
            battle.get_mut(boss).unwrap().designation = Some("flagship".into());

            assert_eq!(evaluate(&battle), ObjectiveStatus::InProgress);
            battle.get_mut(boss).unwrap().set_health(0);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Complete);
        }
    }

    mod escort_tests {
        use super::*;

        fn escort_battle() -> (Battle, UnitId) {
            let (mut battle, catalog) = battle_with(ObjectiveKind::Escort {
                designation: "oiler".into(),
                destination: GridPos::new(10, 10),
                radius: 1.5,
            });
            let kind = UnitKind::Ai(AiUnit {
                side: Some(Side::Allied),
                waypoint: Some(GridPos::new(10, 10)),
            });
            let id = spawn(&mut battle, &catalog, kind, 0, 0);
            battle.get_mut(id).unwrap().designation = Some("oiler".into());
            (battle, id)
        }

        #[test]
        fn arrival_completes() {
            let (mut battle, id) = escort_battle();
            assert_eq!(evaluate(&battle), ObjectiveStatus::InProgress);
            battle.get_mut(id).unwrap().position = GridPos::new(9, 10);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Complete);
        }

        #[test]
        fn losing_the_escort_fails() {
            let (mut battle, id) = escort_battle();
            battle.get_mut(id).unwrap().set_health(0);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Failed);
        }
    }

    mod capture_tests {
        use super::*;

        #[test]
        fn holding_accumulates_and_contest_resets() {
            let (mut battle, catalog) = battle_with(ObjectiveKind::CaptureOutpost {
                position: GridPos::new(5, 5),
                radius: 2.0,
                turns_required: 2,
            });
            spawn(&mut battle, &catalog, UnitKind::player("p"), 5, 6);
            let e = spawn(&mut battle, &catalog, UnitKind::enemy(), 15, 15);

            advance_round(&mut battle);
            assert_eq!(battle.progress.capture_turns, 1);

            battle.get_mut(e).unwrap().position = GridPos::new(6, 5);
            advance_round(&mut battle);
            assert_eq!(battle.progress.capture_turns, 0);

            battle.get_mut(e).unwrap().set_health(0);
            advance_round(&mut battle);
            advance_round(&mut battle);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Complete);
        }
    }

    mod collection_tests {
        use super::*;

        #[test]
        fn resource_cells_count_once() {
            let (mut battle, catalog) = battle_with(ObjectiveKind::ResourceAcquisition {
                cells: vec![GridPos::new(3, 3), GridPos::new(4, 4)],
                required: 2,
            });
            let p = spawn(&mut battle, &catalog, UnitKind::player("p"), 3, 3);
            record_arrival(&mut battle, p);
            record_arrival(&mut battle, p);
            assert_eq!(battle.progress.resources.len(), 1);
            assert_eq!(evaluate(&battle), ObjectiveStatus::InProgress);

            battle.get_mut(p).unwrap().position = GridPos::new(4, 4);
            record_arrival(&mut battle, p);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Complete);
        }

        #[test]
        fn enemies_do_not_collect() {
            let (mut battle, catalog) = battle_with(ObjectiveKind::ResourceAcquisition {
                cells: vec![GridPos::new(3, 3)],
                required: 1,
            });
            let e = spawn(&mut battle, &catalog, UnitKind::enemy(), 3, 3);
            record_arrival(&mut battle, e);
            assert!(battle.progress.resources.is_empty());
        }

        #[test]
        fn wrecks_salvaged_from_adjacent_cells() {
            let (mut battle, catalog) = battle_with(ObjectiveKind::Salvage { required: 1 });
            let wreck = spawn(&mut battle, &catalog, UnitKind::enemy(), 5, 5);
            battle.get_mut(wreck).unwrap().set_health(0);
            let p = spawn(&mut battle, &catalog, UnitKind::player("p"), 0, 0);

            record_arrival(&mut battle, p);
            assert_eq!(evaluate(&battle), ObjectiveStatus::InProgress);

            battle.get_mut(p).unwrap().position = GridPos::new(6, 6);
            record_arrival(&mut battle, p);
            assert_eq!(battle.progress.salvaged, vec![wreck]);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Complete);
        }
    }

    mod convoy_tests {
        use super::*;

        fn convoy_battle() -> (Battle, Vec<UnitId>) {
            let (mut battle, catalog) = battle_with(ObjectiveKind::ConvoyInterception {
                designation: "convoy".into(),
                destination: GridPos::new(19, 10),
                radius: 1.0,
                required_sunk: 2,
            });
            let ids: Vec<UnitId> = (0..3)
                .map(|i| {
                    let id = spawn(&mut battle, &catalog, UnitKind::enemy(), 0, i * 2);
                    battle.get_mut(id).unwrap().designation = Some("convoy".into());
                    id
                })
                .collect();
            (battle, ids)
        }

        #[test]
        fn sinking_enough_completes() {
            let (mut battle, ids) = convoy_battle();
            battle.get_mut(ids[0]).unwrap().set_health(0);
            assert_eq!(evaluate(&battle), ObjectiveStatus::InProgress);
            battle.get_mut(ids[2]).unwrap().set_health(0);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Complete);
        }

        #[test]
        fn too_many_escapes_fail() {
            let (mut battle, ids) = convoy_battle();
            battle.get_mut(ids[0]).unwrap().position = GridPos::new(19, 10);
            assert_eq!(evaluate(&battle), ObjectiveStatus::InProgress);
            battle.get_mut(ids[1]).unwrap().position = GridPos::new(18, 10);
            assert_eq!(evaluate(&battle), ObjectiveStatus::Failed);
        }
    }

    #[test]
    fn objective_deserializes_from_tagged_form() {
        let json = r#"{
            "type": "defeat_boss",
            "designation": "flagship",
            "reward": {"credits": 500, "experience": 120}
        }"#;
        let objective: Objective = serde_json::from_str(json).unwrap();
        assert_eq!(
            objective.kind,
            ObjectiveKind::DefeatBoss {
                designation: "flagship".into()
            }
        );
        assert_eq!(objective.reward.credits, 500);
    }
}
