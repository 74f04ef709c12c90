//! Mail folder hierarchy
//!
//! The mailbox root (`msgfolderroot`) holds no messages and is never
//! returned by folder enumeration, so it is declared as a well-known root and
//! seeded with empty paths. Top-level folders like Inbox therefore resolve to
//! `Inbox`, not `Top of Information Store/Inbox`.

use crate::error::{ResolverError, Result};
use crate::remote::ContainerKind;
use crate::types::ContainerRecord;
use serde::{Deserialize, Serialize};
use strata_ids::ContainerId;

/// Service alias for the mailbox root folder.
pub const MSG_FOLDER_ROOT: &str = "msgfolderroot";

/// Mail folder as returned by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailFolder {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub child_folder_count: Option<u32>,
    #[serde(default)]
    pub total_item_count: Option<u32>,
}

impl MailFolder {
    pub fn new(id: &str, parent_folder_id: Option<&str>, display_name: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            parent_folder_id: parent_folder_id.map(str::to_string),
            display_name: Some(display_name.to_string()),
            ..Self::default()
        }
    }
}

/// [`ContainerKind`] for mail folders.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailFolders;

impl ContainerKind for MailFolders {
    type Item = MailFolder;

    const NAME: &'static str = "mail";

    fn convert(item: &MailFolder) -> Result<ContainerRecord> {
        let raw_id = item
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ResolverError::malformed("mail folder without an id"))?;
        let id = ContainerId::parse(raw_id)
            .map_err(|e| ResolverError::malformed(format!("mail folder {raw_id:?}: {e}")))?;

        let display_name = item
            .display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ResolverError::malformed(format!("mail folder {id} without a display name")))?;

        let parent_id = match item.parent_folder_id.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(ContainerId::parse(raw).map_err(|e| {
                ResolverError::malformed(format!("mail folder {id} parent {raw:?}: {e}"))
            })?),
        };

        Ok(ContainerRecord::new(id, parent_id, display_name))
    }

    fn well_known_roots() -> &'static [&'static str] {
        &[MSG_FOLDER_ROOT]
    }
}
