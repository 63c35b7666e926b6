//! Cross-module tests.
//!
//! - `scenarios.rs`: the reference gunnery, damage and AI scenarios run
//!   against real templates
//! - `scheduler.rs`: full battles driven through a `BattleHandle` on
//!   virtual time
//! - `helpers.rs`: shared setup

mod helpers;
mod scenarios;
mod scheduler;

pub use helpers::*;
