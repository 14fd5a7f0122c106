#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless maze chase session.

mod autopilot;
mod render;
mod settings;
mod simulation;

use std::{path::PathBuf, time::Duration};

use anyhow::{ensure, Result};
use clap::Parser;
use tracing::info;

use crate::simulation::{RoundOutcome, Simulation};

/// Runs a maze chase session with a scripted target walking to the exit.
#[derive(Debug, Parser)]
#[command(name = "maze-chase", version, about)]
struct Args {
    /// TOML file holding the session configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for maze generation and placement.
    #[arg(long)]
    seed: Option<u64>,
    /// Side length of the first maze.
    #[arg(long)]
    initial_size: Option<u32>,
    /// Largest maze side that still needs to be cleared to win.
    #[arg(long)]
    win_size: Option<u32>,
    /// Simulation ticks to run before giving up.
    #[arg(long, default_value_t = 20_000)]
    max_ticks: u64,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,
    /// Walking speed of the scripted target in world units per second.
    #[arg(long, default_value_t = 2.0)]
    target_speed: f32,
    /// Let the scripted target drop slowing traps behind it.
    #[arg(long)]
    drop_traps: bool,
    /// Print the final maze as ASCII art.
    #[arg(long)]
    print_maze: bool,
}

/// Entry point for the maze chase command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = settings::load(&args)?;
    ensure!(args.tick_ms > 0, "--tick-ms must be positive");
    ensure!(
        args.target_speed.is_finite() && args.target_speed > 0.0,
        "--target-speed must be a positive number"
    );

    info!(seed = config.seed, initial_size = config.maze.initial_size, "starting session");
    let mut simulation = Simulation::new(
        config,
        Duration::from_millis(args.tick_ms),
        args.target_speed,
    )
    .dropping_traps(args.drop_traps);
    let report = simulation.run(args.max_ticks)?;

    for round in &report.rounds {
        let outcome = match round.outcome {
            RoundOutcome::Escaped => "escaped".to_owned(),
            RoundOutcome::Caught { cell: Some(cell) } => format!("caught at {cell}"),
            RoundOutcome::Caught { cell: None } => "caught".to_owned(),
            RoundOutcome::Unfinished => "unfinished".to_owned(),
        };
        println!(
            "round {} ({}): {outcome} after {} ticks, {}/{} trigger zones entered, {}/{} traps set off",
            round.round,
            round.size,
            round.ticks,
            round.zones_entered,
            round.trigger_zones,
            round.traps_triggered,
            round.traps_dropped,
        );
    }
    println!("session {:?} after {} ticks", report.state, report.ticks);
    if let Some(failure) = report.bake_failure {
        println!("navigation surface bake failed: {failure}");
    }

    if args.print_maze {
        if let Some(maze) = simulation.maze() {
            print!("{}", render::ascii(maze));
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
