//! Resolver Cache - ID-indexed container store with path resolution
//!
//! Records arrive in any order (bulk enumeration is not tree ordered) and are
//! resolved afterwards by walking each record's parent chain up to a root or
//! an already-resolved ancestor. Parents missing from the bulk result are
//! fetched on demand through the bound [`ContainerRefresher`], at most once
//! per ID per pass.
//!
//! Walks for different records may run concurrently. Each walk keeps its own
//! visited set; two chains sharing an ancestor never look like a cycle to
//! each other. Paths are written only after a walk completes, all under one
//! write lock, so a cancelled or failed walk leaves nothing half-written.

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::fault::FailureCollector;
use crate::remote::ContainerRefresher;
use crate::types::{CacheStats, ContainerRecord, RecordState, ResolvedPath};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use strata_ids::{ContainerId, ScopeKey};
use strata_logging::conceal;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Container store for one backup pass.
pub struct ResolverCache {
    refresher: Arc<dyn ContainerRefresher>,
    config: ResolverConfig,
    records: RwLock<HashMap<ContainerId, ContainerRecord>>,
    /// IDs whose fetch failed recoverably this pass; never fetched again.
    unavailable: Mutex<HashMap<ContainerId, ResolverError>>,
    /// One gate per in-flight gap fill so concurrent walks share the fetch.
    fetch_gates: Mutex<HashMap<ContainerId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResolverCache {
    pub fn new(refresher: Arc<dyn ContainerRefresher>, config: ResolverConfig) -> Self {
        Self {
            refresher,
            config,
            records: RwLock::new(HashMap::new()),
            unavailable: Mutex::new(HashMap::new()),
            fetch_gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        self.refresher.scope()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ContainerId, ContainerRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ContainerId, ContainerRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a record. Last writer wins.
    ///
    /// Re-inserting a resolved record with unchanged parent and name keeps
    /// its paths. Changed attributes reset it and every resolved descendant
    /// to unresolved. Seeded roots stay roots and only pick up the new
    /// display name.
    pub fn insert(&self, record: ContainerRecord) {
        let id = record.id().clone();
        {
            let mut records = self.write();
            match records.get_mut(&id) {
                Some(existing) if existing.is_root() => {
                    existing.set_display_name(record.display_name().to_string());
                }
                Some(existing) if existing.is_resolved() && existing.same_attributes(&record) => {}
                _ => {
                    if let Some(previous) = records.insert(id.clone(), record.into_unresolved()) {
                        if previous.is_resolved() {
                            invalidate_descendants(&mut records, &id);
                        }
                    }
                }
            }
        }
        self.unavailable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Seed a well-known root. It resolves to empty paths so its children
    /// do not carry an invisible top-level segment. Idempotent.
    pub fn add_root(&self, record: ContainerRecord) {
        let mut records = self.write();
        if records.get(record.id()).is_some_and(ContainerRecord::is_root) {
            return;
        }
        debug!(
            scope = %self.scope(),
            id = %record.id(),
            name = %conceal(record.display_name()),
            "seeded root container"
        );
        records.insert(record.id().clone(), record.into_root());
    }

    /// Copy of the record for `id`. Never fetches.
    pub fn lookup(&self, id: &str) -> Option<ContainerRecord> {
        self.read().get(id).cloned()
    }

    /// Resolved paths for `id`; `None` if absent or not resolved yet.
    pub fn paths(&self, id: &str) -> Option<ResolvedPath> {
        self.read().get(id).and_then(|r| r.path().cloned())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let records = self.read();
        let mut stats = CacheStats::default();
        for record in records.values() {
            if record.is_root() {
                stats.roots += 1;
            }
            match record.state() {
                RecordState::Resolved => stats.resolved += 1,
                RecordState::Unresolved => stats.unresolved += 1,
                RecordState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Resolved, non-root records ordered by ID path.
    pub fn items(&self) -> Vec<ContainerRecord> {
        let mut items: Vec<(String, ContainerRecord)> = self
            .read()
            .values()
            .filter(|r| r.is_resolved() && !r.is_root())
            .map(|r| (r.path().map(ResolvedPath::id_string).unwrap_or_default(), r.clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items.into_iter().map(|(_, r)| r).collect()
    }

    /// Container whose display-name path equals `location` (`/`-joined).
    pub fn location_in_cache(&self, location: &str) -> Option<ContainerId> {
        let location = location.trim_matches('/');
        self.find_resolved(|path| path.name_string() == location)
    }

    /// Container whose ID path equals `id_path` (`/`-joined).
    pub fn path_in_cache(&self, id_path: &str) -> Option<ContainerId> {
        let id_path = id_path.trim_matches('/');
        self.find_resolved(|path| path.id_string() == id_path)
    }

    fn find_resolved(&self, matches: impl Fn(&ResolvedPath) -> bool) -> Option<ContainerId> {
        self.read()
            .values()
            .filter(|r| !r.is_root())
            .find(|r| r.path().is_some_and(&matches))
            .map(|r| r.id().clone())
    }

    fn unresolved_ids(&self) -> Vec<ContainerId> {
        let mut ids: Vec<ContainerId> = self
            .read()
            .values()
            .filter(|r| r.state() == RecordState::Unresolved)
            .map(|r| r.id().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Resolve every unresolved record.
    ///
    /// Per-record failures (cycles, vanished parents, excessive depth,
    /// malformed fetch results) mark that record failed, go to `errs`, and
    /// do not stop the other walks. Transport failures and cancellation are
    /// returned and abort the walks still running.
    pub async fn resolve_paths(
        self: &Arc<Self>,
        cancel: &CancellationToken,
        errs: &dyn FailureCollector,
    ) -> Result<()> {
        let pending = self.unresolved_ids();
        if pending.is_empty() {
            return Ok(());
        }
        debug!(scope = %self.scope(), pending = pending.len(), "resolving container paths");

        let permits = Arc::new(Semaphore::new(self.config.resolve_concurrency.max(1)));
        let mut walks = JoinSet::new();
        for id in pending {
            let cache = Arc::clone(self);
            let cancel = cancel.clone();
            let permits = Arc::clone(&permits);
            walks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| ResolverError::Cancelled)?;
                cache.resolve_one(&id, &cancel).await
            });
        }

        let mut terminal = None;
        while let Some(joined) = walks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_recoverable() => errs.add_recoverable(err),
                Ok(Err(err)) => {
                    if terminal.is_none() {
                        walks.abort_all();
                        terminal = Some(err);
                    }
                }
                Err(join_err) if join_err.is_panic() => {
                    std::panic::resume_unwind(join_err.into_panic())
                }
                Err(_) => {}
            }
        }

        match terminal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn resolve_one(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()> {
        match self.walk(id, cancel).await {
            Err(err) if err.is_recoverable() => {
                warn!(scope = %self.scope(), id = %id, error = %err, "container path unresolvable");
                self.mark_failed(id);
                Err(err)
            }
            other => other,
        }
    }

    async fn walk(&self, start: &ContainerId, cancel: &CancellationToken) -> Result<()> {
        let Some(mut current) = self.lookup(start.as_str()) else {
            return Ok(());
        };
        let mut chain: Vec<ContainerRecord> = Vec::new();
        let mut visited: HashSet<ContainerId> = HashSet::new();

        let prefix = loop {
            if cancel.is_cancelled() {
                return Err(ResolverError::Cancelled);
            }
            // Roots are stored resolved with empty paths, so this also stops at roots.
            if let Some(path) = current.path() {
                break path.clone();
            }
            if chain.len() >= self.config.max_depth {
                return Err(ResolverError::DepthExceeded {
                    id: start.clone(),
                    max_depth: self.config.max_depth,
                });
            }

            visited.insert(current.id().clone());
            let parent_id = current.parent_id().cloned();
            chain.push(current);

            let Some(parent_id) = parent_id else {
                break ResolvedPath::empty();
            };
            if visited.contains(&parent_id) {
                let mut cycle: Vec<ContainerId> = chain.iter().map(|r| r.id().clone()).collect();
                cycle.push(parent_id);
                return Err(ResolverError::Cycle {
                    id: start.clone(),
                    chain: cycle,
                });
            }

            current = match self.lookup(parent_id.as_str()) {
                Some(parent) => parent,
                None => self.fill_gap(&parent_id, cancel).await?,
            };
        };

        self.memoize(&chain, prefix);
        Ok(())
    }

    /// Write paths for a completed walk, top-down. Stops at the first record
    /// that changed since the walk read it; everything below it would be
    /// derived from stale attributes.
    fn memoize(&self, chain: &[ContainerRecord], prefix: ResolvedPath) {
        let mut path = prefix;
        let mut records = self.write();
        for walked in chain.iter().rev() {
            let Some(entry) = records.get_mut(walked.id()) else {
                break;
            };
            if !entry.same_attributes(walked) {
                break;
            }
            path = path.child(walked.id().clone(), walked.display_name());
            if entry.state() == RecordState::Unresolved {
                debug!(
                    id = %walked.id(),
                    depth = path.len(),
                    location = %conceal(&path.name_string()),
                    "resolved container"
                );
                entry.mark_resolved(path.clone());
            }
        }
    }

    fn mark_failed(&self, id: &ContainerId) {
        if let Some(record) = self.write().get_mut(id) {
            if record.state() == RecordState::Unresolved {
                record.mark_failed();
            }
        }
    }

    fn known_unavailable(&self, id: &ContainerId) -> Option<ResolverError> {
        self.unavailable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn gate_for(&self, id: &ContainerId) -> FetchGate<'_> {
        let mut gates = self.fetch_gates.lock().unwrap_or_else(PoisonError::into_inner);
        let gate = Arc::clone(gates.entry(id.clone()).or_default());
        FetchGate {
            gates: &self.fetch_gates,
            id: id.clone(),
            gate,
        }
    }

    /// Fetch a parent that bulk enumeration did not return and insert it.
    async fn fill_gap(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<ContainerRecord> {
        if let Some(err) = self.known_unavailable(id) {
            return Err(err);
        }

        let gate = self.gate_for(id);
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
            guard = gate.lock() => guard,
        };

        // Another walk may have filled it while this one waited.
        if let Some(record) = self.lookup(id.as_str()) {
            return Ok(record);
        }
        if let Some(err) = self.known_unavailable(id) {
            return Err(err);
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
            fetched = self.refresher.refresh_container(id) => fetched,
        };

        match fetched {
            Ok(record) => {
                debug!(scope = %self.scope(), id = %id, "gap-filled missing parent");
                self.insert(record.clone());
                Ok(self.lookup(id.as_str()).unwrap_or(record))
            }
            Err(err) if err.is_recoverable() => {
                self.unavailable
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id.clone(), err.clone());
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

/// Reset every resolved record whose path runs through `id`.
fn invalidate_descendants(records: &mut HashMap<ContainerId, ContainerRecord>, id: &ContainerId) {
    for record in records.values_mut() {
        if record.is_root() || record.id() == id {
            continue;
        }
        if record.path().is_some_and(|path| path.ids().contains(id)) {
            record.reset();
        }
    }
}

/// Shared claim on the gap-fill gate for one ID.
///
/// The last claim released removes the gate, on every exit path.
struct FetchGate<'a> {
    gates: &'a Mutex<HashMap<ContainerId, Arc<tokio::sync::Mutex<()>>>>,
    id: ContainerId,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl FetchGate<'_> {
    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for FetchGate<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // Release under the map lock so exactly one holder sees the last count.
        drop(std::mem::take(&mut self.gate));
        if gates.get(&self.id).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            gates.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultBus;
    use async_trait::async_trait;
    use std::time::Duration;

    fn id(value: &str) -> ContainerId {
        ContainerId::parse(value).unwrap()
    }

    fn folder(value: &str, parent: Option<&str>, name: &str) -> ContainerRecord {
        ContainerRecord::new(id(value), parent.map(id), name)
    }

    /// Serves a fixed set of records and counts fetches per ID.
    #[derive(Default)]
    struct StaticRefresher {
        scope: Option<ScopeKey>,
        remote: HashMap<String, ContainerRecord>,
        transport_failures: HashSet<String>,
        hang: bool,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl StaticRefresher {
        fn with(records: Vec<ContainerRecord>) -> Self {
            Self {
                scope: Some(ScopeKey::parse("user-1").unwrap()),
                remote: records
                    .into_iter()
                    .map(|r| (r.id().to_string(), r))
                    .collect(),
                ..Self::default()
            }
        }

        fn calls_for(&self, id: &str) -> usize {
            self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl ContainerRefresher for StaticRefresher {
        fn scope(&self) -> &ScopeKey {
            self.scope.as_ref().unwrap()
        }

        async fn refresh_container(&self, id: &ContainerId) -> Result<ContainerRecord> {
            *self.calls.lock().unwrap().entry(id.to_string()).or_default() += 1;
            tokio::task::yield_now().await;
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.transport_failures.contains(id.as_str()) {
                return Err(ResolverError::Fetch {
                    scope: self.scope().clone(),
                    id: id.clone(),
                    message: "503 Service Unavailable".into(),
                });
            }
            self.remote
                .get(id.as_str())
                .cloned()
                .ok_or_else(|| ResolverError::NotFound {
                    scope: self.scope().clone(),
                    id: id.clone(),
                })
        }
    }

    fn cache_with(refresher: StaticRefresher) -> (Arc<ResolverCache>, Arc<StaticRefresher>) {
        let refresher = Arc::new(refresher);
        let config = ResolverConfig {
            resolve_concurrency: 4,
            ..ResolverConfig::default()
        };
        let cache = Arc::new(ResolverCache::new(refresher.clone(), config));
        (cache, refresher)
    }

    fn assert_path_invariants(cache: &ResolverCache) {
        for record in cache.items() {
            let path = record.path().unwrap();
            assert_eq!(path.ids().len(), path.names().len());
            assert_eq!(path.ids().last(), Some(record.id()));
            assert_eq!(path.names().last().map(String::as_str), Some(record.display_name()));
            let own = path.ids().iter().filter(|i| *i == record.id()).count();
            assert_eq!(own, 1, "{} appears {} times in its own path", record.id(), own);
            let unique: HashSet<_> = path.ids().iter().collect();
            assert_eq!(unique.len(), path.len());
            // Every ancestor segment matches the ancestor's own resolved path.
            if let Some(parent) = record.parent_id().and_then(|p| cache.lookup(p.as_str())) {
                let parent_path = parent.path().unwrap();
                assert_eq!(&path.ids()[..path.len() - 1], parent_path.ids());
            }
        }
    }

    #[tokio::test]
    async fn test_simple_chain_any_order() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Top of Information Store"));
        cache.insert(folder("B", Some("A"), "nameB"));
        cache.insert(folder("A", Some("R"), "nameA"));

        let bus = FaultBus::new(false);
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        let path = cache.paths("B").unwrap();
        assert_eq!(path.ids(), &[id("A"), id("B")]);
        assert_eq!(path.names(), &["nameA".to_string(), "nameB".to_string()]);
        assert!(bus.recovered().is_empty());
        assert_path_invariants(&cache);
    }

    #[tokio::test]
    async fn test_root_resolves_to_empty_paths() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", Some("above-root"), "Root"));
        cache.add_root(folder("R", None, "Renamed"));

        let root = cache.lookup("R").unwrap();
        assert!(root.is_root());
        assert_eq!(root.display_name(), "Root");
        assert_eq!(cache.paths("R"), Some(ResolvedPath::empty()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_idempotent_insert_keeps_resolution() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("A", Some("R"), "Inbox"));
        cache
            .resolve_paths(&CancellationToken::new(), &FaultBus::default())
            .await
            .unwrap();
        let before = cache.lookup("A").unwrap();

        cache.insert(folder("A", Some("R"), "Inbox"));
        assert_eq!(cache.lookup("A").unwrap(), before);
        assert!(cache.lookup("A").unwrap().is_resolved());
    }

    #[tokio::test]
    async fn test_changed_insert_invalidates() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("A", Some("R"), "Inbox"));
        cache.insert(folder("B", Some("R"), "Archive"));
        let bus = FaultBus::default();
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        cache.insert(folder("A", Some("B"), "Inbox"));
        assert_eq!(cache.lookup("A").unwrap().state(), RecordState::Unresolved);
        assert!(cache.paths("A").is_none());

        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();
        assert_eq!(cache.paths("A").unwrap().name_string(), "Archive/Inbox");
    }

    #[tokio::test]
    async fn test_moved_container_invalidates_descendants() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("A", Some("R"), "Inbox"));
        cache.insert(folder("C", Some("A"), "Receipts"));
        cache.insert(folder("D", Some("C"), "2024"));
        cache.insert(folder("B", Some("R"), "Archive"));
        let bus = FaultBus::default();
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();
        assert_eq!(cache.paths("D").unwrap().name_string(), "Inbox/Receipts/2024");

        cache.insert(folder("A", Some("B"), "Inbox"));
        assert_eq!(cache.lookup("C").unwrap().state(), RecordState::Unresolved);
        assert_eq!(cache.lookup("D").unwrap().state(), RecordState::Unresolved);
        assert!(cache.lookup("B").unwrap().is_resolved());

        // An unchanged descendant re-inserted afterwards stays unresolved.
        cache.insert(folder("C", Some("A"), "Receipts"));
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        assert_eq!(cache.paths("A").unwrap().name_string(), "Archive/Inbox");
        assert_eq!(cache.paths("C").unwrap().name_string(), "Archive/Inbox/Receipts");
        assert_eq!(cache.paths("D").unwrap().ids(), &[id("B"), id("A"), id("C"), id("D")]);
        assert!(bus.recovered().is_empty());
        assert_path_invariants(&cache);
    }

    #[tokio::test]
    async fn test_renamed_container_invalidates_descendants() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("A", Some("R"), "Inbox"));
        cache.insert(folder("C", Some("A"), "Receipts"));
        let bus = FaultBus::default();
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        cache.insert(folder("A", Some("R"), "Mail"));
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        assert_eq!(cache.paths("C").unwrap().name_string(), "Mail/Receipts");
        assert_eq!(cache.location_in_cache("Inbox/Receipts"), None);
    }

    #[tokio::test]
    async fn test_insert_over_root_keeps_root() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("R", Some("X"), "Top"));

        let root = cache.lookup("R").unwrap();
        assert!(root.is_root());
        assert_eq!(root.display_name(), "Top");
        assert_eq!(root.path(), Some(&ResolvedPath::empty()));
    }

    #[tokio::test]
    async fn test_top_level_record_without_parent() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.insert(folder("A", None, "Orphanage"));
        cache
            .resolve_paths(&CancellationToken::new(), &FaultBus::default())
            .await
            .unwrap();
        assert_eq!(cache.paths("A").unwrap().id_string(), "A");
    }

    #[tokio::test]
    async fn test_cycle_containment() {
        let (cache, refresher) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("A", Some("B"), "a"));
        cache.insert(folder("B", Some("A"), "b"));
        cache.insert(folder("C", Some("R"), "c"));

        let bus = FaultBus::new(false);
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        let recovered = bus.recovered();
        assert_eq!(recovered.len(), 2);
        assert!(recovered
            .iter()
            .all(|e| matches!(e, ResolverError::Cycle { .. })));
        let mut offenders: Vec<String> = recovered
            .iter()
            .filter_map(|e| match e {
                ResolverError::Cycle { id, .. } => Some(id.to_string()),
                _ => None,
            })
            .collect();
        offenders.sort();
        assert_eq!(offenders, vec!["A", "B"]);

        assert_eq!(cache.lookup("A").unwrap().state(), RecordState::Failed);
        assert_eq!(cache.lookup("B").unwrap().state(), RecordState::Failed);
        assert_eq!(cache.paths("C").unwrap().id_string(), "C");
        assert_eq!(refresher.calls.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_self_parent_is_cycle() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.insert(folder("A", Some("A"), "loop"));
        let bus = FaultBus::default();
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        match bus.recovered().as_slice() {
            [ResolverError::Cycle { id: offender, chain }] => {
                assert_eq!(offender.as_str(), "A");
                assert_eq!(chain, &vec![id("A"), id("A")]);
            }
            other => panic!("unexpected errors: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shared_ancestor_is_not_a_cycle() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("M", Some("R"), "Projects"));
        cache.insert(folder("X", Some("M"), "Alpha"));
        cache.insert(folder("Y", Some("M"), "Beta"));

        let bus = FaultBus::default();
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        assert!(bus.recovered().is_empty());
        assert_eq!(cache.paths("X").unwrap().name_string(), "Projects/Alpha");
        assert_eq!(cache.paths("Y").unwrap().name_string(), "Projects/Beta");
    }

    #[tokio::test]
    async fn test_gap_fill_fetches_shared_parent_once() {
        let (cache, refresher) =
            cache_with(StaticRefresher::with(vec![folder("P", Some("R"), "Parent")]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("L1", Some("P"), "Leaf one"));
        cache.insert(folder("L2", Some("P"), "Leaf two"));

        let bus = FaultBus::default();
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        assert_eq!(refresher.calls_for("P"), 1);
        assert!(cache.fetch_gates.lock().unwrap().is_empty());
        let path = cache.paths("L1").unwrap();
        assert_eq!(path.ids(), &[id("P"), id("L1")]);
        assert_eq!(cache.paths("L2").unwrap().len(), 2);
        assert!(cache.lookup("P").unwrap().is_resolved());
        assert_path_invariants(&cache);
    }

    #[tokio::test]
    async fn test_missing_parent_reported_once_and_siblings_unaffected() {
        let (cache, refresher) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("L1", Some("gone"), "Orphan one"));
        cache.insert(folder("L2", Some("gone"), "Orphan two"));
        cache.insert(folder("S", Some("R"), "Sibling"));

        let bus = FaultBus::default();
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        assert_eq!(refresher.calls_for("gone"), 1);
        let recovered = bus.recovered();
        assert_eq!(recovered.len(), 2);
        assert!(recovered
            .iter()
            .all(|e| matches!(e, ResolverError::NotFound { id, .. } if id.as_str() == "gone")));
        assert_eq!(cache.lookup("L1").unwrap().state(), RecordState::Failed);
        assert!(cache.paths("S").is_some());
        assert!(bus.failure().is_none());
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let refresher = Arc::new(StaticRefresher::with(vec![
            folder("P1", Some("P2"), "one"),
            folder("P2", Some("P3"), "two"),
            folder("P3", Some("R"), "three"),
        ]));
        let config = ResolverConfig {
            max_depth: 3,
            resolve_concurrency: 1,
            fail_fast: false,
        };
        let cache = Arc::new(ResolverCache::new(refresher.clone(), config));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("L", Some("P1"), "leaf"));

        let bus = FaultBus::default();
        cache.resolve_paths(&CancellationToken::new(), &bus).await.unwrap();

        assert_eq!(
            bus.recovered(),
            vec![ResolverError::DepthExceeded {
                id: id("L"),
                max_depth: 3
            }]
        );
        assert_eq!(cache.lookup("L").unwrap().state(), RecordState::Failed);
        assert_eq!(refresher.calls_for("P3"), 1);
        assert_eq!(cache.lookup("P2").unwrap().state(), RecordState::Unresolved);
    }

    #[tokio::test]
    async fn test_transport_failure_is_terminal() {
        let mut refresher = StaticRefresher::with(vec![]);
        refresher.transport_failures.insert("P".into());
        let (cache, _) = cache_with(refresher);
        cache.insert(folder("L", Some("P"), "Leaf"));

        let bus = FaultBus::default();
        let err = cache
            .resolve_paths(&CancellationToken::new(), &bus)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::Fetch { .. }));
        assert!(!err.is_recoverable());
        assert!(bus.recovered().is_empty());
        assert_eq!(cache.lookup("L").unwrap().state(), RecordState::Unresolved);
        assert!(cache.fetch_gates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_fetch() {
        let mut refresher = StaticRefresher::with(vec![]);
        refresher.hang = true;
        let (cache, refresher) = cache_with(refresher);
        cache.insert(folder("L", Some("P"), "Leaf"));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let bus = FaultBus::default();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            cache.resolve_paths(&cancel, &bus),
        )
        .await
        .expect("cancellation should end resolution promptly");

        assert_eq!(result.unwrap_err(), ResolverError::Cancelled);
        assert_eq!(refresher.calls_for("P"), 1);
        assert!(cache.paths("L").is_none());
        assert!(cache.fetch_gates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiters_release_gate() {
        let mut refresher = StaticRefresher::with(vec![]);
        refresher.hang = true;
        let (cache, _) = cache_with(refresher);
        cache.insert(folder("L1", Some("P"), "Leaf one"));
        cache.insert(folder("L2", Some("P"), "Leaf two"));
        cache.insert(folder("L3", Some("P"), "Leaf three"));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            cache.resolve_paths(&cancel, &FaultBus::default()),
        )
        .await
        .expect("cancellation should end resolution promptly");

        assert_eq!(result.unwrap_err(), ResolverError::Cancelled);
        assert!(cache.fetch_gates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reverse_lookups() {
        let (cache, _) = cache_with(StaticRefresher::with(vec![]));
        cache.add_root(folder("R", None, "Root"));
        cache.insert(folder("A", Some("R"), "Inbox"));
        cache.insert(folder("B", Some("A"), "Receipts"));
        cache
            .resolve_paths(&CancellationToken::new(), &FaultBus::default())
            .await
            .unwrap();

        assert_eq!(cache.location_in_cache("Inbox/Receipts"), Some(id("B")));
        assert_eq!(cache.location_in_cache("/Inbox/"), Some(id("A")));
        assert_eq!(cache.location_in_cache("Receipts"), None);
        assert_eq!(cache.path_in_cache("A/B"), Some(id("B")));
        assert_eq!(cache.path_in_cache(""), None);

        let items: Vec<String> = cache.items().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(items, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_lookup_never_fetches() {
        let (cache, refresher) = cache_with(StaticRefresher::with(vec![folder("P", None, "p")]));
        assert!(cache.lookup("P").is_none());
        assert!(cache.paths("P").is_none());
        assert_eq!(refresher.calls_for("P"), 0);
    }
}
