use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use grids_core::{ChunkPolicy, StatsMode};

use crate::config::{parse_policy, parse_stats_mode};

/// Import, inspect and export chunked raster grids.
#[derive(Debug, Parser)]
#[command(name = "grids", version)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that take precedence over `GRIDS_*` environment variables.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Memory budget for resident chunks, in bytes.
    #[arg(long, global = true)]
    pub memory_budget: Option<usize>,

    /// Headroom kept free below the budget, in bytes.
    #[arg(long, global = true)]
    pub memory_reserve: Option<usize>,

    /// Rows per chunk for new grids.
    #[arg(long, global = true)]
    pub chunk_rows: Option<usize>,

    /// Columns per chunk for new grids.
    #[arg(long, global = true)]
    pub chunk_cols: Option<usize>,

    /// Chunk representation for new grids: dense, sparse or adaptive.
    #[arg(long, global = true, value_parser = parse_policy)]
    pub policy: Option<ChunkPolicy>,

    /// Statistics mode for new grids: eager or lazy.
    #[arg(long, global = true, value_parser = parse_stats_mode)]
    pub stats_mode: Option<StatsMode>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import an ESRI ASCII grid into a new grid directory.
    Import {
        /// ASCII grid file.
        asc: PathBuf,
        /// Base directory under which the grid directory is created.
        #[arg(long)]
        store: PathBuf,
        /// Cell value type.
        #[arg(long, value_enum, default_value_t = ValueType::Double)]
        value_type: ValueType,
    },
    /// Print count, sum, mean, min and max.
    Stats {
        grid: PathBuf,
    },
    /// Print the value of one cell.
    Get {
        grid: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        row: i64,
        #[arg(long, allow_hyphen_values = true)]
        col: i64,
    },
    /// Print the data cells closest to a point.
    Nearest {
        grid: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
    },
    /// Write a grid out as an ESRI ASCII file.
    Export {
        grid: PathBuf,
        asc: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    Double,
    Int,
    Boolean,
}

impl ValueType {
    /// The value type recorded under `name` in a grid header.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "double" => Some(ValueType::Double),
            "int" => Some(ValueType::Int),
            "boolean" => Some(ValueType::Boolean),
            _ => None,
        }
    }
}
