//! Population of a container cache for one scope
//!
//! One [`ContainerCache::populate`] call is one refresh cycle:
//!
//! ```text
//! seed roots ─▶ enumerate (1 call) ─▶ insert each ─▶ resolve paths
//!                                         │               │
//!                                         └──▶ FailureCollector ◀── per-record failures
//! ```

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::fault::FailureCollector;
use crate::remote::{log_api_call, ContainerEnumerator, ContainerFetcher, ContainerKind, ScopedRefresher};
use crate::resolver::ResolverCache;
use crate::types::{ContainerRecord, ResolvedPath};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use strata_ids::{ContainerId, ScopeKey};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Population orchestrator for one scope and one container kind.
///
/// The [`ResolverCache`] is created on first use and bound to this cache's
/// fetcher for its whole lifetime. Share it with path-consuming stages via
/// [`ContainerCache::resolver`].
pub struct ContainerCache<K: ContainerKind> {
    scope: ScopeKey,
    enumerator: Arc<dyn ContainerEnumerator<K>>,
    fetcher: Arc<dyn ContainerFetcher<K>>,
    config: ResolverConfig,
    seeded_roots: Vec<ContainerRecord>,
    resolver: OnceLock<Arc<ResolverCache>>,
}

impl<K: ContainerKind> ContainerCache<K> {
    pub fn new(
        scope: ScopeKey,
        enumerator: Arc<dyn ContainerEnumerator<K>>,
        fetcher: Arc<dyn ContainerFetcher<K>>,
    ) -> Self {
        Self {
            scope,
            enumerator,
            fetcher,
            config: ResolverConfig::default(),
            seeded_roots: Vec::new(),
            resolver: OnceLock::new(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed an already-known root in addition to the kind's well-known roots.
    pub fn with_root(mut self, record: ContainerRecord) -> Self {
        self.seeded_roots.push(record);
        self
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// The resolver, once [`populate`](Self::populate) has created it.
    pub fn resolver(&self) -> Option<Arc<ResolverCache>> {
        self.resolver.get().cloned()
    }

    /// Resolved paths for `id`, if populated and resolved.
    pub fn paths(&self, id: &str) -> Option<ResolvedPath> {
        self.resolver.get().and_then(|cache| cache.paths(id))
    }

    fn init(&self) -> Arc<ResolverCache> {
        let cache = self.resolver.get_or_init(|| {
            let refresher = ScopedRefresher::<K>::new(Arc::clone(&self.fetcher), self.scope.clone());
            Arc::new(ResolverCache::new(Arc::new(refresher), self.config.clone()))
        });
        Arc::clone(cache)
    }

    async fn seed_roots(&self, cache: &ResolverCache, cancel: &CancellationToken) -> Result<()> {
        for record in &self.seeded_roots {
            cache.add_root(record.clone());
        }

        for alias in K::well_known_roots() {
            let root_fetch_error = |message: String| ResolverError::RootFetch {
                scope: self.scope.clone(),
                alias: alias.to_string(),
                message,
            };
            let alias_id = ContainerId::parse(alias).map_err(|e| root_fetch_error(e.to_string()))?;

            log_api_call(K::NAME, "get_by_id", &self.scope, Some(&alias_id));
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
                fetched = self.fetcher.get_by_id(&self.scope, &alias_id) => fetched,
            };
            let item = fetched.map_err(|e| root_fetch_error(e.to_string()))?;
            let record = K::convert(&item).map_err(|e| root_fetch_error(e.to_string()))?;
            cache.add_root(record);
        }
        Ok(())
    }

    /// Run one population pass.
    ///
    /// Returns an error when the pass was aborted (root or enumeration
    /// transport failure, gap-fill transport failure, cancellation) or when
    /// `errs` reports a terminal failure. Malformed items and unresolvable
    /// records only go to `errs`.
    pub async fn populate(
        &self,
        cancel: &CancellationToken,
        errs: &dyn FailureCollector,
    ) -> Result<()> {
        let start = Instant::now();
        info!(kind = K::NAME, scope = %self.scope, "populating container cache");

        let cache = self.init();
        self.seed_roots(&cache, cancel).await?;

        log_api_call(K::NAME, "enumerate", &self.scope, None);
        let enumerated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
            enumerated = self.enumerator.enumerate(&self.scope, None) => enumerated,
        };
        let items = enumerated.map_err(|e| ResolverError::Enumerate {
            scope: self.scope.clone(),
            message: e.to_string(),
        })?;
        debug!(scope = %self.scope, num_enumerated_containers = items.len(), "enumerated containers");

        for item in &items {
            if let Some(err) = errs.failure() {
                return Err(err);
            }
            match K::convert(item) {
                Ok(record) => cache.insert(record),
                Err(err) => {
                    warn!(scope = %self.scope, error = %err, "skipping malformed container");
                    errs.add_recoverable(err);
                }
            }
        }

        cache.resolve_paths(cancel, errs).await?;

        let stats = cache.stats();
        info!(
            kind = K::NAME,
            scope = %self.scope,
            num_enumerated_containers = items.len(),
            resolved = stats.resolved.saturating_sub(stats.roots),
            failed = stats.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "done populating container cache"
        );

        match errs.failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
