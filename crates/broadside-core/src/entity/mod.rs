//! Combatants taking part in a battle.
//!
//! This module provides the runtime unit types:
//! - [`UnitId`]: Unique identifier, also the unit's registration order
//! - [`UnitTag`]: Which controller drives the unit
//! - [`UnitKind`]: Controller-specific data (player owner, carrier of origin)
//! - [`Combatant`]: The unit itself, with the capability surface every
//!   controller and resolver works through
//!
//! # Example
//!
//! ```
//! use broadside_core::entity::{Combatant, GridPos, UnitId, UnitKind};
//! use broadside_core::templates::TemplateCatalog;
//!
//! let catalog = TemplateCatalog::standard();
//! let template = catalog.get("destroyer").unwrap();
//! let ship = Combatant::from_template(
//!     UnitId::new(1),
//!     "destroyer",
//!     template,
//!     UnitKind::player("ayla"),
//!     GridPos::new(3, 4),
//! );
//!
//! assert!(ship.is_alive());
//! assert_eq!(ship.action_points().budget(), 2);
//! ```

pub mod components;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use components::{
    ActionPoints, AircraftType, AmmoType, ArmorProfile, Capabilities, GridPos, ShipClass,
    SizeClass, StatusEffect, StatusState, Weapon, WeaponSlot, DAMAGE_CONTROL_COOLDOWN,
    FIRE_DURATION, FLOOD_DURATION,
};

use crate::templates::UnitTemplate;

/// Unique identifier for a unit.
///
/// Ids are handed out monotonically as units join or spawn, so ordering by
/// id is registration order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(u64);

impl UnitId {
    /// Creates a new `UnitId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UnitId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Which side of the battle a unit fights for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Human players and their squadrons.
    Allied,
    /// Computer-controlled opposition.
    Enemy,
}

impl Side {
    /// Returns the other side.
    #[must_use]
    pub const fn opposing(self) -> Self {
        match self {
            Self::Allied => Self::Enemy,
            Self::Enemy => Self::Allied,
        }
    }
}

/// Controller classification of a unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitTag {
    /// Driven by a human through the turn controller.
    Player,
    /// Driven by the AI engine.
    Ai,
    /// Squadron driven by the AI engine on behalf of its carrier's side.
    Aircraft,
}

impl fmt::Display for UnitTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "Player"),
            Self::Ai => write!(f, "AI"),
            Self::Aircraft => write!(f, "Aircraft"),
        }
    }
}

/// Player-controlled unit data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUnit {
    /// Account or handle of the controlling human.
    pub owner: String,
}

/// AI-controlled unit data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiUnit {
    /// Allied escorts are AI-driven but fight for the players; everything
    /// else is hostile.
    pub side: Option<Side>,
    /// Cell the unit steams toward when nothing is in range.
    pub waypoint: Option<GridPos>,
}

/// Launched squadron data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aircraft {
    /// Carrier the squadron flew from.
    pub carrier: UnitId,
    /// Squadron role.
    pub squadron: AircraftType,
    /// Side of the launching carrier.
    pub side: Side,
}

/// Controller-specific unit data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// Human controlled.
    Player(PlayerUnit),
    /// AI controlled ship or emplacement.
    Ai(AiUnit),
    /// Launched squadron.
    Aircraft(Aircraft),
}

impl UnitKind {
    /// Shorthand for a player unit.
    #[must_use]
    pub fn player(owner: impl Into<String>) -> Self {
        Self::Player(PlayerUnit {
            owner: owner.into(),
        })
    }

    /// Shorthand for a hostile AI unit.
    #[must_use]
    pub fn enemy() -> Self {
        Self::Ai(AiUnit::default())
    }

    /// Returns the controller tag.
    #[must_use]
    pub const fn tag(&self) -> UnitTag {
        match self {
            Self::Player(_) => UnitTag::Player,
            Self::Ai(_) => UnitTag::Ai,
            Self::Aircraft(_) => UnitTag::Aircraft,
        }
    }

    /// Returns the side this unit fights for.
    #[must_use]
    pub fn side(&self) -> Side {
        match self {
            Self::Player(_) => Side::Allied,
            Self::Ai(ai) => ai.side.unwrap_or(Side::Enemy),
            Self::Aircraft(aircraft) => aircraft.side,
        }
    }
}

/// A unit on the battle grid.
///
/// Every controller and resolver reads and mutates units through this one
/// type. Health and the alive flag are kept private so that
/// `alive == false` holds exactly when health is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    id: UnitId,
    /// Display name copied from the template.
    pub name: String,
    /// Catalog key the unit was spawned from.
    pub template: String,
    /// Controller data.
    pub kind: UnitKind,
    /// Hull class.
    pub class: ShipClass,
    /// Capability flags set at spawn.
    pub capabilities: Capabilities,
    /// Grid cell.
    pub position: GridPos,
    health: u32,
    max_health: u32,
    /// Armor by zone.
    pub armor: ArmorProfile,
    /// Weapon fit.
    pub weapons: BTreeMap<WeaponSlot, Weapon>,
    /// Rounds left per slot.
    pub ammo: BTreeMap<WeaponSlot, u32>,
    action_points: ActionPoints,
    /// Fire, flooding, damage control.
    pub status: StatusState,
    alive: bool,
    /// Cells per move.
    pub speed: u32,
    /// Base hit chance.
    pub base_accuracy: f32,
    /// Evasion.
    pub evasion: f32,
    /// Equipment mastery damage multiplier supplied by progression systems.
    pub mastery: f32,
    /// Squadrons left in the hangar.
    pub hangar: u32,
    /// Name objectives use to find this unit.
    pub designation: Option<String>,
}

impl Combatant {
    /// Spawns a unit from a template.
    #[must_use]
    pub fn from_template(
        id: UnitId,
        template_key: &str,
        template: &UnitTemplate,
        kind: UnitKind,
        position: GridPos,
    ) -> Self {
        Self {
            id,
            name: template.name.clone(),
            template: template_key.to_string(),
            kind,
            class: template.class,
            capabilities: template.capabilities(),
            position,
            health: template.max_health,
            max_health: template.max_health,
            armor: template.armor,
            weapons: template.weapons.clone(),
            ammo: template
                .weapons
                .iter()
                .map(|(slot, weapon)| (*slot, weapon.magazine))
                .collect(),
            action_points: ActionPoints::new(template.class.action_point_cap()),
            status: StatusState::default(),
            alive: true,
            speed: template.speed,
            base_accuracy: template.base_accuracy,
            evasion: template.evasion,
            mastery: 1.0,
            hangar: template.hangar,
            designation: None,
        }
    }

    /// Sets the mastery multiplier.
    #[must_use]
    pub fn with_mastery(mut self, mastery: f32) -> Self {
        self.mastery = mastery;
        self
    }

    /// Sets the objective designation.
    #[must_use]
    pub fn with_designation(mut self, designation: Option<String>) -> Self {
        self.designation = designation;
        self
    }

    /// Unit id.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Controller tag.
    #[must_use]
    pub const fn tag(&self) -> UnitTag {
        self.kind.tag()
    }

    /// Side the unit fights for.
    #[must_use]
    pub fn side(&self) -> Side {
        self.kind.side()
    }

    /// Returns `true` for human-controlled units.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        matches!(self.kind, UnitKind::Player(_))
    }

    /// Standing waypoint, for AI units.
    #[must_use]
    pub fn waypoint(&self) -> Option<GridPos> {
        match &self.kind {
            UnitKind::Ai(ai) => ai.waypoint,
            _ => None,
        }
    }

    /// Controlling human, for player units.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        match &self.kind {
            UnitKind::Player(player) => Some(&player.owner),
            _ => None,
        }
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> u32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> u32 {
        self.max_health
    }

    /// Returns `true` while health is above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Action-point state.
    #[must_use]
    pub const fn action_points(&self) -> &ActionPoints {
        &self.action_points
    }

    /// Mutable action-point state.
    pub fn action_points_mut(&mut self) -> &mut ActionPoints {
        &mut self.action_points
    }

    /// Returns `true` if the unit has every flag in `caps`.
    #[must_use]
    pub fn can(&self, caps: Capabilities) -> bool {
        self.capabilities.contains(caps)
    }

    /// Weapon in a slot.
    #[must_use]
    pub fn weapon(&self, slot: WeaponSlot) -> Option<&Weapon> {
        self.weapons.get(&slot)
    }

    /// Rounds left in a slot.
    #[must_use]
    pub fn ammo_for(&self, slot: WeaponSlot) -> u32 {
        self.ammo.get(&slot).copied().unwrap_or(0)
    }

    /// Euclidean distance in cells to a grid position.
    #[must_use]
    pub fn distance_to(&self, pos: GridPos) -> f32 {
        self.position.as_vec2().distance(pos.as_vec2())
    }

    /// Applies damage, flooring health at zero.
    ///
    /// Returns the damage actually absorbed. A unit brought to zero health
    /// is marked dead; dead units absorb nothing.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        if !self.alive {
            return 0;
        }
        let dealt = amount.min(self.health);
        self.health -= dealt;
        if self.health == 0 {
            self.alive = false;
        }
        dealt
    }

    /// Sets health directly, clamped to `[0, max_health]`.
    ///
    /// Dead units stay dead.
    pub fn set_health(&mut self, health: u32) {
        if !self.alive {
            return;
        }
        self.health = health.min(self.max_health);
        if self.health == 0 {
            self.alive = false;
        }
    }

    /// Applies a status effect.
    pub fn apply_status_effect(&mut self, effect: StatusEffect) {
        if self.alive {
            self.status.apply(effect);
        }
    }
}
