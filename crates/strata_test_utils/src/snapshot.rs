//! JSON mailbox snapshots for replaying a folder hierarchy.

use crate::mailbox::MockMailbox;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_containers::MailFolder;
use strata_ids::ScopeKey;

/// Captured folder listing of one mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxSnapshot {
    pub scope: ScopeKey,
    pub root: MailFolder,
    /// What bulk enumeration returned, in order
    #[serde(default)]
    pub folders: Vec<MailFolder>,
    /// Folders reachable only by ID
    #[serde(default)]
    pub remote_only: Vec<MailFolder>,
}

impl MailboxSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    pub fn into_mailbox(self) -> (ScopeKey, MockMailbox) {
        let mailbox = self
            .folders
            .into_iter()
            .fold(MockMailbox::new().with_root(self.root), MockMailbox::with_folder);
        let mailbox = self
            .remote_only
            .into_iter()
            .fold(mailbox, MockMailbox::with_remote_only);
        (self.scope, mailbox)
    }
}
