//! Component types carried by every combatant.
//!
//! These are plain data types: ship classes and their capability flags,
//! weapons and ammunition, armor, status effects, and the per-turn
//! action-point budget. Behaviour that needs more than one unit lives in
//! the combat, effects, and turn modules.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Grid coordinate of a cell on the battle map.
pub type GridPos = glam::IVec2;

/// Number of turns a fire burns once ignited.
pub const FIRE_DURATION: u8 = 10;

/// Number of turns a hull floods once holed.
pub const FLOOD_DURATION: u8 = 10;

/// Turns a crew needs before damage control can be used again.
pub const DAMAGE_CONTROL_COOLDOWN: u8 = 3;

// =============================================================================
// Ship Classes
// =============================================================================

/// Coarse weight class used by the overpenetration rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    /// Destroyers, submarines, auxiliaries, aircraft.
    Light,
    /// Light cruisers and shore batteries.
    Medium,
    /// Battleships, heavy cruisers, carriers.
    Heavy,
}

bitflags! {
    /// Capability flags derived from a unit's class at template load time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// Can launch aircraft squadrons.
        const HANGAR = 1;
        /// Carries at least one torpedo mount.
        const TORPEDOES = 1 << 1;
        /// Can move on the grid.
        const MOBILE = 1 << 2;
        /// Is an aircraft squadron.
        const AIRBORNE = 1 << 3;
        /// Has a crew able to fight fires and flooding.
        const DAMAGE_CONTROL = 1 << 4;
    }
}

/// Hull classification of a unit.
///
/// The class decides the unit's size class (for overpenetration), its
/// action-point cap, and its default capabilities. Nothing in the engine
/// inspects display names to infer any of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipClass {
    /// Capital ship with the heaviest guns and armor.
    Battleship,
    /// Cruiser with capital-grade main guns.
    HeavyCruiser,
    /// Fast cruiser with light guns.
    LightCruiser,
    /// Escort with torpedoes.
    Destroyer,
    /// Submerged torpedo boat.
    Submarine,
    /// Aircraft carrier.
    Carrier,
    /// Supply ship, tanker, or transport.
    Auxiliary,
    /// Fixed coastal emplacement.
    ShoreBattery,
    /// Aircraft squadron launched from a carrier.
    AirSquadron,
}

impl ShipClass {
    /// Returns the size class used by the overpenetration table.
    #[must_use]
    pub const fn size_class(self) -> SizeClass {
        match self {
            Self::Battleship | Self::HeavyCruiser | Self::Carrier => SizeClass::Heavy,
            Self::Destroyer | Self::Submarine | Self::Auxiliary | Self::AirSquadron => {
                SizeClass::Light
            }
            Self::LightCruiser | Self::ShoreBattery => SizeClass::Medium,
        }
    }

    /// Returns the per-turn action-point cap for this class.
    #[must_use]
    pub const fn action_point_cap(self) -> u8 {
        match self {
            Self::Carrier => 3,
            _ => 2,
        }
    }

    /// Returns the capabilities every unit of this class has.
    ///
    /// `TORPEDOES` is not included here; it depends on the template's
    /// weapon fit.
    #[must_use]
    pub fn default_capabilities(self) -> Capabilities {
        match self {
            Self::Carrier => {
                Capabilities::HANGAR | Capabilities::MOBILE | Capabilities::DAMAGE_CONTROL
            }
            Self::ShoreBattery => Capabilities::DAMAGE_CONTROL,
            Self::AirSquadron => Capabilities::AIRBORNE | Capabilities::MOBILE,
            _ => Capabilities::MOBILE | Capabilities::DAMAGE_CONTROL,
        }
    }
}

impl fmt::Display for ShipClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Battleship => "battleship",
            Self::HeavyCruiser => "heavy cruiser",
            Self::LightCruiser => "light cruiser",
            Self::Destroyer => "destroyer",
            Self::Submarine => "submarine",
            Self::Carrier => "carrier",
            Self::Auxiliary => "auxiliary",
            Self::ShoreBattery => "shore battery",
            Self::AirSquadron => "air squadron",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Weapons and Ammunition
// =============================================================================

/// Weapon mount position on a unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponSlot {
    /// Main battery.
    Main,
    /// Secondary battery.
    Secondary,
    /// Torpedo tubes or aerial torpedoes.
    Torpedo,
    /// Aerial bombs.
    Bombs,
}

impl WeaponSlot {
    /// Returns `true` if this mount can fire the given ammunition.
    #[must_use]
    pub const fn accepts(self, ammo: AmmoType) -> bool {
        match self {
            Self::Main | Self::Secondary => matches!(
                ammo,
                AmmoType::Ap | AmmoType::He | AmmoType::Sap | AmmoType::Incendiary
            ),
            Self::Torpedo => matches!(ammo, AmmoType::Torpedo),
            Self::Bombs => matches!(ammo, AmmoType::He | AmmoType::Ap),
        }
    }
}

impl fmt::Display for WeaponSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Secondary => write!(f, "secondary"),
            Self::Torpedo => write!(f, "torpedo"),
            Self::Bombs => write!(f, "bombs"),
        }
    }
}

/// Ammunition type loaded for an attack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmmoType {
    /// Armor piercing.
    Ap,
    /// High explosive.
    He,
    /// Semi armor piercing.
    Sap,
    /// Incendiary.
    Incendiary,
    /// Torpedo warhead.
    Torpedo,
}

impl AmmoType {
    /// Damage modifier used when a weapon's table has no entry for this ammo.
    #[must_use]
    pub const fn default_modifier(self) -> f32 {
        match self {
            Self::Ap | Self::Torpedo => 1.0,
            Self::He => 0.85,
            Self::Sap => 0.95,
            Self::Incendiary => 0.7,
        }
    }
}

impl fmt::Display for AmmoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ap => write!(f, "AP"),
            Self::He => write!(f, "HE"),
            Self::Sap => write!(f, "SAP"),
            Self::Incendiary => write!(f, "incendiary"),
            Self::Torpedo => write!(f, "torpedo"),
        }
    }
}

/// A weapon mount as configured in a unit template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Base damage per hit.
    pub damage: u32,
    /// Maximum range in grid cells.
    pub range: f32,
    /// Penetration value compared against the struck armor.
    pub penetration: f32,
    /// Rounds carried at battle start.
    pub magazine: u32,
    /// Per-ammo damage modifiers overriding [`AmmoType::default_modifier`].
    #[serde(default)]
    pub ammo_modifiers: BTreeMap<AmmoType, f32>,
}

impl Weapon {
    /// Creates a weapon with the default ammo modifier table.
    #[must_use]
    pub fn new(damage: u32, range: f32, penetration: f32, magazine: u32) -> Self {
        Self {
            damage,
            range,
            penetration,
            magazine,
            ammo_modifiers: BTreeMap::new(),
        }
    }

    /// Returns the damage modifier for the given ammunition.
    #[must_use]
    pub fn ammo_modifier(&self, ammo: AmmoType) -> f32 {
        self.ammo_modifiers
            .get(&ammo)
            .copied()
            .unwrap_or_else(|| ammo.default_modifier())
    }
}

/// Aircraft squadron types a carrier can launch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AircraftType {
    /// Air superiority fighters.
    Fighter,
    /// Dive bombers striking the deck.
    DiveBomber,
    /// Torpedo bombers striking the belt.
    TorpedoBomber,
}

impl AircraftType {
    /// Template catalog key holding this squadron's stats.
    #[must_use]
    pub const fn template_key(self) -> &'static str {
        match self {
            Self::Fighter => "fighter_squadron",
            Self::DiveBomber => "dive_bomber_squadron",
            Self::TorpedoBomber => "torpedo_bomber_squadron",
        }
    }

    /// All squadron types.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Fighter, Self::DiveBomber, Self::TorpedoBomber]
    }
}

impl fmt::Display for AircraftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fighter => write!(f, "fighter"),
            Self::DiveBomber => write!(f, "dive bomber"),
            Self::TorpedoBomber => write!(f, "torpedo bomber"),
        }
    }
}

// =============================================================================
// Armor
// =============================================================================

/// Armor thickness of the three hull zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmorProfile {
    /// Side belt.
    pub belt: f32,
    /// Horizontal deck.
    pub deck: f32,
    /// Turret faces.
    pub turret: f32,
}

impl ArmorProfile {
    /// Creates a profile with the same thickness everywhere.
    #[must_use]
    pub const fn uniform(value: f32) -> Self {
        Self {
            belt: value,
            deck: value,
            turret: value,
        }
    }

    /// Returns the armor struck by a shot from `slot` fired at
    /// `range_ratio` of the weapon's maximum range.
    ///
    /// Torpedoes strike the belt and bombs the deck. Gunfire strikes the
    /// belt on flat trajectories and the deck once plunging past 60% range.
    #[must_use]
    pub fn facing(&self, slot: WeaponSlot, range_ratio: f32) -> f32 {
        match slot {
            WeaponSlot::Torpedo => self.belt,
            WeaponSlot::Bombs => self.deck,
            WeaponSlot::Main | WeaponSlot::Secondary => {
                if range_ratio <= 0.6 {
                    self.belt
                } else {
                    self.deck
                }
            }
        }
    }

    /// Mean thickness across zones, for reporting.
    #[must_use]
    pub fn effective(&self) -> f32 {
        (self.belt + self.deck + self.turret) / 3.0
    }
}

impl Default for ArmorProfile {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

// =============================================================================
// Status
// =============================================================================

/// A status effect an attack can inflict.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEffect {
    /// Sets the unit on fire.
    Ignite,
    /// Starts flooding.
    Flood,
}

/// Recurring damage and cooldown state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusState {
    /// Burning.
    pub on_fire: bool,
    /// Remaining fire turns.
    pub fire_timer: u8,
    /// Taking on water.
    pub flooding: bool,
    /// Remaining flooding turns.
    pub flood_timer: u8,
    /// Turns until damage control is available again.
    pub damage_control_cooldown: u8,
}

impl StatusState {
    /// Applies an effect, restarting its timer.
    pub fn apply(&mut self, effect: StatusEffect) {
        match effect {
            StatusEffect::Ignite => {
                self.on_fire = true;
                self.fire_timer = FIRE_DURATION;
            }
            StatusEffect::Flood => {
                self.flooding = true;
                self.flood_timer = FLOOD_DURATION;
            }
        }
    }

    /// Returns `true` if burning or flooding.
    #[must_use]
    pub const fn is_afflicted(&self) -> bool {
        self.on_fire || self.flooding
    }

    /// Extinguishes fires and stops flooding.
    pub fn clear_afflictions(&mut self) {
        self.on_fire = false;
        self.fire_timer = 0;
        self.flooding = false;
        self.flood_timer = 0;
    }
}

// =============================================================================
// Action Points
// =============================================================================

/// Per-turn action budget.
///
/// Within a turn `remaining` only ever decreases; [`ActionPoints::refill`]
/// is called once at the start of each of the unit's turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPoints {
    budget: u8,
    remaining: u8,
}

impl ActionPoints {
    /// Creates a full budget.
    #[must_use]
    pub const fn new(budget: u8) -> Self {
        Self {
            budget,
            remaining: budget,
        }
    }

    /// Per-turn budget.
    #[must_use]
    pub const fn budget(&self) -> u8 {
        self.budget
    }

    /// Points left this turn.
    #[must_use]
    pub const fn remaining(&self) -> u8 {
        self.remaining
    }

    /// Returns `true` once nothing is left.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Restores the full budget for a new turn.
    pub fn refill(&mut self) {
        self.remaining = self.budget;
    }

    /// Spends `cost` points, or returns the remaining count if short.
    ///
    /// # Errors
    ///
    /// Returns the remaining points when `cost` exceeds them; nothing is
    /// spent in that case.
    pub fn spend(&mut self, cost: u8) -> Result<(), u8> {
        if cost > self.remaining {
            return Err(self.remaining);
        }
        self.remaining -= cost;
        Ok(())
    }

    /// Spends everything that is left and returns how much that was.
    pub fn drain(&mut self) -> u8 {
        std::mem::take(&mut self.remaining)
    }
}
