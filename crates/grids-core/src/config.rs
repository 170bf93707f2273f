use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::chunk::ChunkPolicy;
use crate::error::{GridError, GridResult};
use crate::layout::DEFAULT_CHUNK_SIZE;
use crate::stats::StatsMode;

/// Default memory budget for resident chunks: 1 GiB.
pub const DEFAULT_MEMORY_BUDGET: usize = 1 << 30;

/// Default headroom kept free below the budget: 8 MiB.
pub const DEFAULT_MEMORY_RESERVE: usize = 8 << 20;

/// Chunk cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Upper bound on the estimated bytes of resident chunks.
    pub memory_budget: usize,
    /// Headroom that is given up only when nothing else can be evicted.
    pub memory_reserve: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_budget: DEFAULT_MEMORY_BUDGET,
            memory_reserve: DEFAULT_MEMORY_RESERVE,
        }
    }
}

impl CacheConfig {
    /// Load configuration from `GRIDS_MEMORY_BUDGET` and `GRIDS_MEMORY_RESERVE`.
    pub fn from_env() -> GridResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GridResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            memory_budget: parse_var(&lookup, "GRIDS_MEMORY_BUDGET")?
                .unwrap_or(defaults.memory_budget),
            memory_reserve: parse_var(&lookup, "GRIDS_MEMORY_RESERVE")?
                .unwrap_or(defaults.memory_reserve),
        })
    }
}

/// Settings applied to newly created grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    /// Rows per chunk.
    pub chunk_nrows: usize,
    /// Columns per chunk.
    pub chunk_ncols: usize,
    /// Chunk representation policy.
    pub policy: ChunkPolicy,
    /// Statistics update mode.
    pub stats_mode: StatsMode,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            chunk_nrows: DEFAULT_CHUNK_SIZE,
            chunk_ncols: DEFAULT_CHUNK_SIZE,
            policy: ChunkPolicy::default(),
            stats_mode: StatsMode::default(),
        }
    }
}

impl GridConfig {
    /// Load configuration from `GRIDS_CHUNK_NROWS`, `GRIDS_CHUNK_NCOLS`,
    /// `GRIDS_CHUNK_POLICY` and `GRIDS_STATS_MODE`.
    pub fn from_env() -> GridResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GridResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            chunk_nrows: parse_var(&lookup, "GRIDS_CHUNK_NROWS")?.unwrap_or(defaults.chunk_nrows),
            chunk_ncols: parse_var(&lookup, "GRIDS_CHUNK_NCOLS")?.unwrap_or(defaults.chunk_ncols),
            policy: parse_var(&lookup, "GRIDS_CHUNK_POLICY")?.unwrap_or(defaults.policy),
            stats_mode: parse_var(&lookup, "GRIDS_STATS_MODE")?.unwrap_or(defaults.stats_mode),
        })
    }

    pub fn with_chunk_size(mut self, chunk_nrows: usize, chunk_ncols: usize) -> Self {
        self.chunk_nrows = chunk_nrows;
        self.chunk_ncols = chunk_ncols;
        self
    }

    pub fn with_policy(mut self, policy: ChunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_stats_mode(mut self, stats_mode: StatsMode) -> Self {
        self.stats_mode = stats_mode;
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> GridResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| GridError::Config(format!("{}={}: {}", key, raw, e))),
    }
}
