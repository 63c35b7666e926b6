//! Error taxonomy for the battle engine.
//!
//! - [`ValidationError`]: an action is malformed or illegal right now. The
//!   turn stays open and nothing is consumed.
//! - [`TurnStateError`]: an action arrived for a unit that has no open turn.
//! - [`BattleError::Concurrency`]: a second resolution was attempted against
//!   a turn that is already resolved. Logged and discarded.
//! - [`ConfigError`]: a template or battle configuration is malformed. Fatal
//!   at setup; no battle is constructed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{AmmoType, UnitId, WeaponSlot};

/// Public rejection code returned to whoever submitted an action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// The unit is not the one whose turn is open.
    NotYourTurn,
    /// The action costs more points than remain.
    InsufficientActionPoints,
    /// The target does not exist, is dead, or is friendly.
    InvalidTarget,
    /// The target is beyond the weapon's range.
    OutOfRange,
    /// Any other malformed or illegal action.
    InvalidAction,
    /// The turn has already been resolved.
    TurnResolved,
    /// The battle is not accepting commands.
    BattleClosed,
}

/// An action that cannot be carried out as submitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The acting unit is unknown or dead.
    #[error("unit {0} cannot act")]
    UnitUnavailable(UnitId),
    /// Not enough action points left.
    #[error("action needs {needed} action points, {remaining} remaining")]
    InsufficientActionPoints {
        /// Cost of the action.
        needed: u8,
        /// Points left this turn.
        remaining: u8,
    },
    /// Target is unknown, dead, the attacker itself, or on the same side.
    #[error("unit {0} is not a valid target")]
    InvalidTarget(UnitId),
    /// Target beyond weapon range.
    #[error("target at {distance:.1} cells is beyond {range:.1} cell range")]
    OutOfRange {
        /// Distance to the target.
        distance: f32,
        /// Weapon range.
        range: f32,
    },
    /// No weapon mounted in the slot.
    #[error("no weapon mounted in {0} slot")]
    NoWeapon(WeaponSlot),
    /// The slot cannot fire this ammunition.
    #[error("{slot} slot cannot fire {ammo}")]
    IncompatibleAmmo {
        /// Weapon slot.
        slot: WeaponSlot,
        /// Requested ammunition.
        ammo: AmmoType,
    },
    /// Magazine empty.
    #[error("{0} slot is out of ammunition")]
    OutOfAmmo(WeaponSlot),
    /// Unit cannot move.
    #[error("unit {0} is immobile")]
    Immobile(UnitId),
    /// Destination is off the map.
    #[error("destination ({x}, {y}) is off the grid")]
    OffGrid {
        /// Destination x.
        x: i32,
        /// Destination y.
        y: i32,
    },
    /// Destination is held by another live unit.
    #[error("destination ({x}, {y}) is occupied")]
    Occupied {
        /// Destination x.
        x: i32,
        /// Destination y.
        y: i32,
    },
    /// Destination is further than the unit's speed.
    #[error("move of {distance:.1} cells exceeds speed {speed}")]
    TooFar {
        /// Requested move distance.
        distance: f32,
        /// Unit speed.
        speed: u32,
    },
    /// No hangar or no aircraft left.
    #[error("no aircraft available to launch")]
    NoAircraft,
    /// No free cell next to the carrier.
    #[error("no free cell to launch aircraft into")]
    NoLaunchSpace,
    /// Damage control still cooling down.
    #[error("damage control available in {0} turns")]
    DamageControlCooldown(u8),
    /// Nothing for damage control to fix, or no crew for it.
    #[error("damage control has nothing to do")]
    NothingToRepair,
}

impl ValidationError {
    /// Maps this error to its public rejection code.
    #[must_use]
    pub const fn reason(&self) -> RejectReason {
        match self {
            Self::InsufficientActionPoints { .. } => RejectReason::InsufficientActionPoints,
            Self::InvalidTarget(_) => RejectReason::InvalidTarget,
            Self::OutOfRange { .. } => RejectReason::OutOfRange,
            _ => RejectReason::InvalidAction,
        }
    }
}

/// An action arrived at the wrong time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnStateError {
    /// Another unit's turn is open, or none at all.
    #[error("it is not unit {0}'s turn")]
    NotYourTurn(UnitId),
    /// The unit's turn was already resolved.
    #[error("turn for unit {0} is already resolved")]
    AlreadyResolved(UnitId),
    /// The unit is not waiting on a roleplay pause.
    #[error("unit {0} is not in a roleplay wait")]
    NoRoleplayWait(UnitId),
    /// The battle is not in a phase that accepts this command.
    #[error("battle is not accepting this command in its current phase")]
    WrongPhase,
}

impl TurnStateError {
    /// Maps this error to its public rejection code.
    #[must_use]
    pub const fn reason(&self) -> RejectReason {
        match self {
            Self::NotYourTurn(_) | Self::NoRoleplayWait(_) => RejectReason::NotYourTurn,
            Self::AlreadyResolved(_) => RejectReason::TurnResolved,
            Self::WrongPhase => RejectReason::BattleClosed,
        }
    }
}

/// Malformed template or battle configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A template fails validation.
    #[error("template '{template}': {reason}")]
    InvalidTemplate {
        /// Template key.
        template: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A spawn references a template that does not exist.
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    /// A spawn position is off the grid or doubly occupied.
    #[error("spawn for '{template}' at ({x}, {y}): {reason}")]
    InvalidSpawn {
        /// Template key.
        template: String,
        /// Spawn x.
        x: i32,
        /// Spawn y.
        y: i32,
        /// What is wrong with it.
        reason: String,
    },
    /// The objective refers to something the roster does not have.
    #[error("objective: {0}")]
    InvalidObjective(String),
    /// Any other out-of-range setting.
    #[error("{field}: {reason}")]
    InvalidSetting {
        /// Setting name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Umbrella error for everything the engine can return.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BattleError {
    /// Illegal action.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Action at the wrong time.
    #[error(transparent)]
    TurnState(#[from] TurnStateError),
    /// Second resolution of an already completed turn.
    #[error("turn for unit {0} was already completed")]
    Concurrency(UnitId),
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The scheduler has stopped and no longer takes commands.
    #[error("battle has ended or its scheduler is gone")]
    Closed,
}

impl BattleError {
    /// Maps this error to its public rejection code.
    #[must_use]
    pub const fn reason(&self) -> RejectReason {
        match self {
            Self::Validation(e) => e.reason(),
            Self::TurnState(e) => e.reason(),
            Self::Concurrency(_) => RejectReason::TurnResolved,
            Self::Config(_) => RejectReason::InvalidAction,
            Self::Closed => RejectReason::BattleClosed,
        }
    }
}
