//! Core types for the container cache

use serde::{Deserialize, Serialize};
use strata_ids::ContainerId;

/// Separator used when rendering a path as a single string.
pub const PATH_SEPARATOR: &str = "/";

/// Resolution state of a cached container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Inserted, paths not computed yet
    #[default]
    Unresolved,
    /// Both paths computed
    Resolved,
    /// Resolution failed for this pass (cycle, missing ancestor, too deep)
    Failed,
}

/// The two aligned paths from the scope root down to a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPath {
    ids: Vec<ContainerId>,
    names: Vec<String>,
}

impl ResolvedPath {
    /// Path of a root: no segments.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Extend `self` by one segment, returning the child's path.
    pub fn child(&self, id: ContainerId, name: &str) -> Self {
        let mut ids = Vec::with_capacity(self.ids.len() + 1);
        ids.extend(self.ids.iter().cloned());
        ids.push(id);

        let mut names = Vec::with_capacity(self.names.len() + 1);
        names.extend(self.names.iter().cloned());
        names.push(name.to_string());

        Self { ids, names }
    }

    pub fn ids(&self) -> &[ContainerId] {
        &self.ids
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// IDs joined with [`PATH_SEPARATOR`].
    pub fn id_string(&self) -> String {
        self.ids
            .iter()
            .map(ContainerId::as_str)
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }

    /// Display names joined with [`PATH_SEPARATOR`].
    pub fn name_string(&self) -> String {
        self.names.join(PATH_SEPARATOR)
    }
}

/// A cached remote container.
///
/// Records handed out by the cache are copies; changing one has no effect on
/// the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    id: ContainerId,
    parent_id: Option<ContainerId>,
    display_name: String,
    path: ResolvedPath,
    state: RecordState,
    is_root: bool,
}

impl ContainerRecord {
    /// New unresolved record.
    pub fn new(id: ContainerId, parent_id: Option<ContainerId>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            display_name: display_name.into(),
            path: ResolvedPath::empty(),
            state: RecordState::Unresolved,
            is_root: false,
        }
    }

    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&ContainerId> {
        self.parent_id.as_ref()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state == RecordState::Resolved
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Resolved paths, or `None` while the record is not resolved.
    pub fn path(&self) -> Option<&ResolvedPath> {
        self.is_resolved().then_some(&self.path)
    }

    /// Same identity and attributes, ignoring resolution state.
    pub(crate) fn same_attributes(&self, other: &ContainerRecord) -> bool {
        self.id == other.id
            && self.parent_id == other.parent_id
            && self.display_name == other.display_name
    }

    pub(crate) fn into_root(mut self) -> Self {
        self.is_root = true;
        self.path = ResolvedPath::empty();
        self.state = RecordState::Resolved;
        self
    }

    pub(crate) fn into_unresolved(mut self) -> Self {
        self.is_root = false;
        self.path = ResolvedPath::empty();
        self.state = RecordState::Unresolved;
        self
    }

    /// Drop computed paths so the next pass resolves this record again.
    pub(crate) fn reset(&mut self) {
        self.path = ResolvedPath::empty();
        self.state = RecordState::Unresolved;
    }

    pub(crate) fn set_display_name(&mut self, name: String) {
        self.display_name = name;
    }

    pub(crate) fn mark_resolved(&mut self, path: ResolvedPath) {
        self.path = path;
        self.state = RecordState::Resolved;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.path = ResolvedPath::empty();
        self.state = RecordState::Failed;
    }
}

/// Record counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub roots: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub failed: usize,
}

impl CacheStats {
    pub fn total(&self) -> usize {
        self.resolved + self.unresolved + self.failed
    }
}
