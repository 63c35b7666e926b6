//! Broadside command line driver.
//!
//! ```text
//! broadside run demos/skirmish.toml --autopilot --events
//! broadside odds battleship destroyer --distance 6 --slot main --ammo ap
//! ```

mod autopilot;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use broadside_core::analysis::estimate;
use broadside_core::entity::{AmmoType, UnitKind, WeaponSlot};
use broadside_core::{
    BattleEvent, BattleReport, Combatant, GridPos, TemplateCatalog, TurnScheduler, UnitId, Weather,
};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::prelude::*;

use crate::autopilot::Autopilot;

#[derive(Parser)]
#[command(name = "broadside")]
#[command(about = "Turn-based naval battles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a battle from a configuration file
    Run {
        /// Battle file (TOML); defaults plus environment overrides if omitted
        config: Option<PathBuf>,

        /// Let the AI play the player ships too
        #[arg(long)]
        autopilot: bool,

        /// Override the battle seed
        #[arg(long)]
        seed: Option<u64>,

        /// Print every battle event as a JSON line
        #[arg(long)]
        events: bool,
    },
    /// Estimate the outcome of one attack
    Odds {
        /// Attacking template
        attacker: String,

        /// Target template
        target: String,

        /// Cells between the two ships
        #[arg(short, long, default_value_t = 5)]
        distance: i32,

        /// Weapon slot (main, secondary, torpedo, bombs)
        #[arg(long, default_value = "main", value_parser = parse_snake::<WeaponSlot>)]
        slot: WeaponSlot,

        /// Ammunition (ap, he, sap, incendiary, torpedo)
        #[arg(long, default_value = "ap", value_parser = parse_snake::<AmmoType>)]
        ammo: AmmoType,

        /// Weather during the attack
        #[arg(long, default_value = "clear", value_parser = parse_snake::<Weather>)]
        weather: Weather,

        /// Attacks to roll
        #[arg(short, long, default_value_t = 100_000)]
        trials: u32,

        /// Dice seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

/// Parses a snake_case enum name the way it is written in battle files.
fn parse_snake<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown value '{value}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("broadside_core=info,broadside_cli=info")
    });
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            autopilot,
            seed,
            events,
        } => {
            let report = run(config, autopilot, seed, events).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Odds {
            attacker,
            target,
            distance,
            slot,
            ammo,
            weather,
            trials,
            seed,
        } => {
            let catalog = TemplateCatalog::standard();
            let shooter = Combatant::from_template(
                UnitId::new(1),
                &attacker,
                catalog.get(&attacker)?,
                UnitKind::player("odds"),
                GridPos::new(0, 0),
            );
            let victim = Combatant::from_template(
                UnitId::new(2),
                &target,
                catalog.get(&target)?,
                UnitKind::enemy(),
                GridPos::new(distance, 0),
            );
            let odds = estimate(&shooter, &victim, slot, ammo, weather, trials, seed)
                .with_context(|| format!("{attacker} cannot attack {target} with {slot} {ammo}"))?;
            println!("{}", serde_json::to_string_pretty(&odds)?);
        }
    }
    Ok(())
}

async fn run(
    path: Option<PathBuf>,
    autopilot: bool,
    seed: Option<u64>,
    print_events: bool,
) -> Result<BattleReport> {
    let mut config = settings::load(path.as_deref())?;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    info!(
        seed = config.seed,
        players = config.players.len(),
        enemies = config.enemies.len(),
        "loaded battle"
    );

    let pilot_seed = config.seed.wrapping_add(1);
    let (scheduler, handle) = TurnScheduler::new(config)?;

    let printer = print_events.then(|| {
        let mut events = handle.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let done = matches!(event, BattleEvent::BattleEnded { .. });
                        match serde_json::to_string(&event) {
                            Ok(line) => println!("{line}"),
                            Err(err) => tracing::warn!(error = %err, "event not printable"),
                        }
                        if done {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event printer fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });
    let pilot = autopilot.then(|| tokio::spawn(Autopilot::new(handle.clone(), pilot_seed).run()));
    if !autopilot {
        info!("no autopilot; idle player turns will time out");
    }
    drop(handle);

    let report = scheduler.run().await;
    for task in [printer, pilot].into_iter().flatten() {
        task.await.context("background task panicked")?;
    }
    info!(outcome = ?report.outcome, rounds = report.rounds, "battle over");
    Ok(report)
}
