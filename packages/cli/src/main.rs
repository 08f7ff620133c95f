#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line tools for the lot monitor.
//!
//! `replay` drives recorded detections through the occupancy engine for
//! one or more lots, printing either a JSON snapshot per frame or a
//! summary per lot. `annotate` validates an annotation file and prints
//! the canonical, id-ordered version of it, which is how operators learn
//! which number each drawn polygon received.

mod annotate;
mod replay;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lot_monitor_occupancy::LotSnapshot;

use crate::replay::ReplayConfig;

#[derive(Parser)]
#[command(name = "lot_monitor", about = "Parking occupancy and billing tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded detections for every lot in a replay config
    Replay {
        /// Replay config (TOML)
        config: PathBuf,
        /// Print a JSON snapshot after every frame instead of a summary
        #[arg(long)]
        frames: bool,
    },
    /// Validate an annotation file and print its spaces in id order
    Annotate {
        /// Annotation file (JSON array of polygons)
        annotations: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { config, frames } => run_replay(&config, frames)?,
        Commands::Annotate { annotations } => {
            println!("{}", annotate::canonical_json(&annotations)?);
        }
    }

    Ok(())
}

fn run_replay(path: &Path, frames: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = ReplayConfig::load(path)?;
    log::info!("Loaded {} lots from {}", config.lots.len(), path.display());

    let snapshots = replay::run(&config, |snapshot| {
        if frames {
            println!("{}", serde_json::to_string(snapshot)?);
        }
        Ok(())
    })?;

    if !frames {
        for (lot, snapshot) in config.lots.iter().zip(&snapshots) {
            print_summary(lot.config.display_name(), snapshot);
        }
    }

    Ok(())
}

fn print_summary(name: &str, snapshot: &LotSnapshot) {
    let aggregates = &snapshot.aggregates;
    println!("{name} ({})", snapshot.lot_id);
    println!("  frames processed:  {}", snapshot.frames_processed);
    println!(
        "  spaces:            {} occupied, {} available",
        aggregates.occupied_count(),
        aggregates.available_count()
    );
    println!("  cars served:       {}", aggregates.total_cars_served());
    println!("  occupied minutes:  {}", aggregates.total_occupied_minutes());
    println!("  revenue:           {}", aggregates.total_revenue());
    println!(
        "  vacancy:           {}",
        if snapshot.has_vacancy { "yes" } else { "full" }
    );
}
