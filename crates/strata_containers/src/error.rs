//! Error types for the container cache

use strata_ids::{ContainerId, ScopeKey};
use thiserror::Error;

/// Container cache error type.
///
/// Errors are split into two classes (see [`ResolverError::is_recoverable`]).
/// Recoverable errors concern one container and are handed to a
/// [`FailureCollector`](crate::fault::FailureCollector) while the pass goes on.
/// Everything else ends the pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Enumerating containers in scope {scope}: {message}")]
    Enumerate { scope: ScopeKey, message: String },

    #[error("Fetching container {id} in scope {scope}: {message}")]
    Fetch {
        scope: ScopeKey,
        id: ContainerId,
        message: String,
    },

    #[error("Fetching root folder {alias} in scope {scope}: {message}")]
    RootFetch {
        scope: ScopeKey,
        alias: String,
        message: String,
    },

    #[error("Container {id} not found in scope {scope}")]
    NotFound { scope: ScopeKey, id: ContainerId },

    #[error("Cycle detected resolving container {id}: {}", render_chain(.chain))]
    Cycle {
        id: ContainerId,
        chain: Vec<ContainerId>,
    },

    #[error("Container {id} is nested deeper than {max_depth} levels")]
    DepthExceeded { id: ContainerId, max_depth: usize },

    #[error("Malformed container: {0}")]
    Malformed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl ResolverError {
    /// Per-item failures that must not unwind the pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolverError::NotFound { .. }
                | ResolverError::Cycle { .. }
                | ResolverError::DepthExceeded { .. }
                | ResolverError::Malformed(_)
        )
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

fn render_chain(chain: &[ContainerId]) -> String {
    chain
        .iter()
        .map(ContainerId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ResolverError>;
