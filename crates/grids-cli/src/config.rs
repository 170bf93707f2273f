use grids_core::{CacheConfig, ChunkPolicy, GridConfig, StatsMode};

use crate::cli::Overrides;

/// Tool configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Chunk cache sizing.
    pub cache: CacheConfig,
    /// Settings for grids created by `import`.
    pub grid: GridConfig,
}

impl Config {
    /// Load configuration from `GRIDS_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            cache: CacheConfig::from_env()?,
            grid: GridConfig::from_env()?,
        })
    }

    /// Apply command-line flags on top of the environment.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(budget) = overrides.memory_budget {
            self.cache.memory_budget = budget;
        }
        if let Some(reserve) = overrides.memory_reserve {
            self.cache.memory_reserve = reserve;
        }
        if let Some(rows) = overrides.chunk_rows {
            self.grid.chunk_nrows = rows;
        }
        if let Some(cols) = overrides.chunk_cols {
            self.grid.chunk_ncols = cols;
        }
        if let Some(policy) = overrides.policy {
            self.grid = self.grid.with_policy(policy);
        }
        if let Some(mode) = overrides.stats_mode {
            self.grid = self.grid.with_stats_mode(mode);
        }
        self
    }
}

pub(crate) fn parse_policy(s: &str) -> Result<ChunkPolicy, String> {
    s.parse()
}

pub(crate) fn parse_stats_mode(s: &str) -> Result<StatsMode, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_only_given_values() {
        let overrides = Overrides {
            chunk_rows: Some(64),
            policy: Some(ChunkPolicy::Sparse),
            ..Overrides::default()
        };
        let config = Config::default().with_overrides(&overrides);
        assert_eq!(config.grid.chunk_nrows, 64);
        assert_eq!(config.grid.chunk_ncols, grids_core::DEFAULT_CHUNK_SIZE);
        assert_eq!(config.grid.policy, ChunkPolicy::Sparse);
        assert_eq!(config.grid.stats_mode, StatsMode::Eager);
        assert_eq!(config.cache, CacheConfig::default());
    }
}
