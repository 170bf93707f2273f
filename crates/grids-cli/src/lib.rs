pub mod cli;
pub mod commands;
pub mod config;

use crate::cli::{Cli, Command};
use crate::config::Config;

/// Run one command.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?.with_overrides(&cli.overrides);
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Import {
            asc,
            store,
            value_type,
        } => commands::import(&config, &asc, &store, value_type),
        Command::Stats { grid } => commands::stats(&config, &grid),
        Command::Get { grid, row, col } => commands::get(&config, &grid, row, col),
        Command::Nearest { grid, x, y } => commands::nearest(&config, &grid, x, y),
        Command::Export { grid, asc } => commands::export(&config, &grid, &asc),
    }
}
