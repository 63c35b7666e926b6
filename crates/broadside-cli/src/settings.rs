//! Layered battle configuration.
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults
//! 2. The TOML battle file
//! 3. `BROADSIDE_`-prefixed environment variables, with `__` separating
//!    nested keys (`BROADSIDE_TIMING__TURN_TIMEOUT_SECS=60`)

use std::path::Path;

use anyhow::{bail, Context, Result};
use broadside_core::BattleConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "BROADSIDE_";

/// Builds the provider stack for a battle file.
pub fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(BattleConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Loads and validates a battle configuration.
pub fn load(path: Option<&Path>) -> Result<BattleConfig> {
    if let Some(path) = path {
        if !path.exists() {
            bail!("battle file not found: {}", path.display());
        }
    }
    let config: BattleConfig = figment(path)
        .extract()
        .context("failed to read battle configuration")?;
    config.validate().context("invalid battle configuration")?;
    Ok(config)
}
