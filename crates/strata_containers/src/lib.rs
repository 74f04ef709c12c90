//! Strata Containers - hierarchical container cache and path resolver
//!
//! Mirrors the folder hierarchy of a remote mailbox-like service into paths
//! usable for backup addressing. Each container gets two aligned paths, one
//! built from IDs and one from display names.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌────────────────┐
//! │  Enumerator  │────▶│ ContainerCache │────▶│ ResolverCache  │◀──── lookup / paths
//! │ (bulk list)  │     │ (one pass)     │     │ (id → record)  │      (backup stages)
//! └──────────────┘     └───────┬────────┘     └───────┬────────┘
//!                              │                      │ gap fill
//!                              ▼                      ▼
//!                     ┌──────────────────┐   ┌────────────────┐
//!                     │ FailureCollector │   │ Fetcher (1 ID) │
//!                     └──────────────────┘   └────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Container**: remote folder-like object with an ID and optional parent
//! - **Scope**: enumeration boundary, e.g. one mailbox
//! - **Gap fill**: single-item fetch of a parent the bulk listing missed
//! - **Recoverable failure**: per-item error reported without aborting the pass

pub mod config;
pub mod error;
pub mod fault;
pub mod mail;
pub mod populate;
pub mod remote;
pub mod resolver;
pub mod types;

// Re-exports for convenience
pub use config::ResolverConfig;
pub use error::{ResolverError, Result};
pub use fault::{FailureCollector, FaultBus};
pub use mail::{MailFolder, MailFolders, MSG_FOLDER_ROOT};
pub use populate::ContainerCache;
pub use remote::{
    ContainerEnumerator, ContainerFetcher, ContainerKind, ContainerRefresher, FetchError,
    ScopedRefresher,
};
pub use resolver::ResolverCache;
pub use strata_ids::{ContainerId, ScopeKey};
pub use tokio_util::sync::CancellationToken;
pub use types::{CacheStats, ContainerRecord, RecordState, ResolvedPath, PATH_SEPARATOR};
