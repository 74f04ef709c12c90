//! Configuration for the container cache

use crate::error::{ResolverError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on hierarchy depth. Deeper chains are treated as malformed.
pub const DEFAULT_MAX_DEPTH: usize = 300;

const MAX_DEFAULT_CONCURRENCY: usize = 8;

/// Tuning for one cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum number of containers visited by one resolution walk
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Number of resolution walks allowed in flight at once
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,

    /// Stop a pass at the first recoverable failure
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_resolve_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
        .min(MAX_DEFAULT_CONCURRENCY)
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            resolve_concurrency: default_resolve_concurrency(),
            fail_fast: false,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ResolverError::config(format!("{}: {}", path.display(), e)))?;
        let config: ResolverConfig =
            toml::from_str(&content).map_err(|e| ResolverError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ResolverError::config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| ResolverError::config(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(ResolverError::config("max_depth must be at least 1"));
        }
        if self.resolve_concurrency == 0 {
            return Err(ResolverError::config("resolve_concurrency must be at least 1"));
        }
        Ok(())
    }
}
