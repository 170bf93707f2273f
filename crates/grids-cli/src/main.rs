use clap::Parser;
use tracing_subscriber::EnvFilter;

use grids_cli::cli::Cli;

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    grids_cli::run(Cli::parse())
}
