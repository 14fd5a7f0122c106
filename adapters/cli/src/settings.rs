use std::fs;

use anyhow::{Context, Result};
use maze_chase_core::ChaseConfig;

use crate::Args;

/// Loads the session configuration and applies command-line overrides.
pub(crate) fn load(args: &Args) -> Result<ChaseConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            parse(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => ChaseConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(size) = args.initial_size {
        config.maze.initial_size = size;
    }
    if let Some(size) = args.win_size {
        config.maze.win_size = size;
    }

    config.validate().context("invalid session configuration")?;
    Ok(config)
}

fn parse(contents: &str) -> Result<ChaseConfig> {
    Ok(toml::from_str(contents)?)
}
