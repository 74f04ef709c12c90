//! Remote collaborator interfaces
//!
//! The cache never talks to a remote service directly. A [`ContainerKind`]
//! says how one kind of remote object (mail folder, contact folder, ...)
//! turns into a [`ContainerRecord`]. The fetcher and enumerator traits are
//! the transport for that kind, and [`ContainerRefresher`] is the single
//! capability the resolver holds for gap-filling.

use crate::error::{ResolverError, Result};
use crate::types::ContainerRecord;
use async_trait::async_trait;
use std::sync::Arc;
use strata_ids::{ContainerId, ScopeKey};
use thiserror::Error;

/// Failure reported by a fetcher or enumerator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The object does not exist remotely (any more).
    #[error("Not found")]
    NotFound,
    /// The call failed after the transport's own retries.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// One kind of remote hierarchy.
pub trait ContainerKind: Send + Sync + 'static {
    /// Remote representation of one container.
    type Item: Send + Sync + 'static;

    /// Short name used in logs.
    const NAME: &'static str;

    /// Validate and convert a remote item.
    ///
    /// Returns [`ResolverError::Malformed`] when required identity fields are
    /// missing.
    fn convert(item: &Self::Item) -> Result<ContainerRecord>;

    /// IDs (or service aliases) of roots that enumeration does not return
    /// and that must be seeded before population.
    fn well_known_roots() -> &'static [&'static str] {
        &[]
    }
}

/// Single-item lookup by ID.
#[async_trait]
pub trait ContainerFetcher<K: ContainerKind>: Send + Sync {
    async fn get_by_id(
        &self,
        scope: &ScopeKey,
        id: &ContainerId,
    ) -> std::result::Result<K::Item, FetchError>;
}

/// Bulk listing of every container in a scope.
#[async_trait]
pub trait ContainerEnumerator<K: ContainerKind>: Send + Sync {
    /// Returns the complete set; paging is the implementation's business.
    async fn enumerate(
        &self,
        scope: &ScopeKey,
        continuation: Option<&str>,
    ) -> std::result::Result<Vec<K::Item>, FetchError>;
}

/// Fetch-and-convert capability bound to one scope.
#[async_trait]
pub trait ContainerRefresher: Send + Sync {
    fn scope(&self) -> &ScopeKey;

    /// Fetch one container by ID.
    ///
    /// Missing and malformed containers come back as recoverable errors;
    /// transport failures as [`ResolverError::Fetch`].
    async fn refresh_container(&self, id: &ContainerId) -> Result<ContainerRecord>;
}

/// [`ContainerRefresher`] over a fetcher for one kind and scope.
pub struct ScopedRefresher<K: ContainerKind> {
    fetcher: Arc<dyn ContainerFetcher<K>>,
    scope: ScopeKey,
}

impl<K: ContainerKind> ScopedRefresher<K> {
    pub fn new(fetcher: Arc<dyn ContainerFetcher<K>>, scope: ScopeKey) -> Self {
        Self { fetcher, scope }
    }
}

#[async_trait]
impl<K: ContainerKind> ContainerRefresher for ScopedRefresher<K> {
    fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    async fn refresh_container(&self, id: &ContainerId) -> Result<ContainerRecord> {
        log_api_call(K::NAME, "get_by_id", &self.scope, Some(id));

        let item = self
            .fetcher
            .get_by_id(&self.scope, id)
            .await
            .map_err(|err| match err {
                FetchError::NotFound => ResolverError::NotFound {
                    scope: self.scope.clone(),
                    id: id.clone(),
                },
                FetchError::Transport(message) => ResolverError::Fetch {
                    scope: self.scope.clone(),
                    id: id.clone(),
                    message,
                },
            })?;

        let record = K::convert(&item)?;
        if record.id() != id {
            return Err(ResolverError::malformed(format!(
                "fetched container {} but received {}",
                id,
                record.id()
            )));
        }
        Ok(record)
    }
}

/// Remote calls log at debug, or at info under `--debug-api-calls`.
pub(crate) fn log_api_call(kind: &str, op: &str, scope: &ScopeKey, id: Option<&ContainerId>) {
    let id = id.map(ContainerId::as_str).unwrap_or("");
    if strata_logging::debug_api_calls() {
        tracing::info!(kind, op, scope = %scope, id, "remote call");
    } else {
        tracing::debug!(kind, op, scope = %scope, id, "remote call");
    }
}
