//! # Broadside Core
//!
//! Turn scheduling and combat resolution for Broadside naval battles.
//!
//! Ships, emplacements and aircraft squadrons take turns on a grid,
//! trade fire through a probabilistic ballistics model, and burn or flood
//! until one side's objective is met.
//!
//! ## Architecture
//!
//! - **Combat** ([`combat`]): hit, damage and penetration for one attack.
//! - **Effects** ([`effects`]): fire and flooding at the start of a turn.
//! - **AI** ([`ai`]): picks actions for units no player controls.
//! - **Turns** ([`turn`]): exactly-once suspension of a player turn.
//! - **Objectives** ([`objective`]): win and loss checks.
//! - **Scheduler** ([`scheduler`]): the round loop that ties them together.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use broadside_core::{BattleConfig, TurnScheduler};
//!
//! let config: BattleConfig = serde_json::from_str(&text)?;
//! let (scheduler, handle) = TurnScheduler::new(config)?;
//! let report = tokio::spawn(scheduler.run());
//! // drive player turns through `handle`
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod actions;
pub mod ai;
pub mod analysis;
pub mod battle;
pub mod combat;
pub mod config;
pub mod dice;
pub mod effects;
pub mod entity;
pub mod error;
pub mod events;
pub mod mvp;
pub mod objective;
pub mod scheduler;
pub mod templates;
pub mod turn;
pub mod weather;

pub use actions::{Action, ActionReport};
pub use battle::{Battle, BattleOutcome, BattlePhase, GridBounds};
pub use config::{BattleConfig, EnemySpawn, PlayerSpawn, TimingConfig};
pub use entity::{Combatant, GridPos, UnitId};
pub use error::{BattleError, RejectReason};
pub use events::{BattleEvent, BattleReport};
pub use scheduler::{start_battle, BattleHandle, TurnScheduler};
pub use templates::{TemplateCatalog, UnitTemplate};
pub use weather::Weather;

#[cfg(test)]
mod tests;
