//! Strata Test Utilities
//!
//! In-memory doubles for the remote side of the container cache, plus
//! snapshot loading for replaying recorded mailbox hierarchies.
//!
//! # Usage
//!
//! ```rust,ignore
//! use strata_test_utils::MockMailbox;
//!
//! let mailbox = Arc::new(
//!     MockMailbox::with_standard_root("root")
//!         .with_folder(MailFolder::new("inbox", Some("root"), "Inbox")),
//! );
//! let cache = ContainerCache::<MailFolders>::new(scope, mailbox.clone(), mailbox.clone());
//! cache.populate(&CancellationToken::new(), &FaultBus::default()).await?;
//! assert_eq!(mailbox.enumerate_calls(), 1);
//! ```

pub mod mailbox;
pub mod snapshot;

// Re-exports for convenience
pub use mailbox::MockMailbox;
pub use snapshot::MailboxSnapshot;
