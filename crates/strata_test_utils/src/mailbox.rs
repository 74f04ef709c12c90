//! In-memory mailbox implementing the container collaborator traits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use strata_containers::{
    ContainerEnumerator, ContainerFetcher, FetchError, MailFolder, MailFolders, MSG_FOLDER_ROOT,
};
use strata_ids::{ContainerId, ScopeKey};

/// Mock remote mailbox.
///
/// Folders are either *enumerated* (returned by the bulk listing, in
/// insertion order) or *remote-only* (reachable by ID only, like parents the
/// listing misses). Every enumerated folder is also fetchable. The root is
/// fetchable under its own ID and under [`MSG_FOLDER_ROOT`].
#[derive(Default)]
pub struct MockMailbox {
    enumerated: Vec<MailFolder>,
    fetchable: HashMap<String, MailFolder>,
    enumerate_error: Option<FetchError>,
    fetch_errors: HashMap<String, FetchError>,
    fetch_delay: Option<Duration>,
    enumerate_calls: AtomicUsize,
    fetch_calls: Mutex<HashMap<String, usize>>,
}

impl MockMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailbox whose root folder is `root_id`, named like the real service.
    pub fn with_standard_root(root_id: &str) -> Self {
        Self::new().with_root(MailFolder::new(root_id, None, "Top of Information Store"))
    }

    pub fn with_root(mut self, root: MailFolder) -> Self {
        self.fetchable.insert(MSG_FOLDER_ROOT.to_string(), root.clone());
        if let Some(id) = root.id.clone() {
            self.fetchable.insert(id, root);
        }
        self
    }

    pub fn with_folder(mut self, folder: MailFolder) -> Self {
        if let Some(id) = folder.id.clone().filter(|id| !id.is_empty()) {
            self.fetchable.insert(id, folder.clone());
        }
        self.enumerated.push(folder);
        self
    }

    pub fn with_remote_only(mut self, folder: MailFolder) -> Self {
        if let Some(id) = folder.id.clone() {
            self.fetchable.insert(id, folder);
        }
        self
    }

    pub fn with_enumerate_error(mut self, err: FetchError) -> Self {
        self.enumerate_error = Some(err);
        self
    }

    pub fn with_fetch_error(mut self, id: &str, err: FetchError) -> Self {
        self.fetch_errors.insert(id.to_string(), err);
        self
    }

    /// Delay every fetch, to widen race windows between concurrent walks.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn enumerate_calls(&self) -> usize {
        self.enumerate_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self, id: &str) -> usize {
        self.fetch_calls
            .lock()
            .map(|calls| calls.get(id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_fetch_calls(&self) -> usize {
        self.fetch_calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ContainerFetcher<MailFolders> for MockMailbox {
    async fn get_by_id(&self, _scope: &ScopeKey, id: &ContainerId) -> Result<MailFolder, FetchError> {
        if let Ok(mut calls) = self.fetch_calls.lock() {
            *calls.entry(id.to_string()).or_default() += 1;
        }
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.fetch_errors.get(id.as_str()) {
            return Err(err.clone());
        }
        self.fetchable
            .get(id.as_str())
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}

#[async_trait]
impl ContainerEnumerator<MailFolders> for MockMailbox {
    async fn enumerate(
        &self,
        _scope: &ScopeKey,
        _continuation: Option<&str>,
    ) -> Result<Vec<MailFolder>, FetchError> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.enumerate_error {
            return Err(err.clone());
        }
        Ok(self.enumerated.clone())
    }
}
