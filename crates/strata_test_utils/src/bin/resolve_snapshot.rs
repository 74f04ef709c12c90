//! Replays a recorded mailbox snapshot through the container cache and
//! prints every resolved path.
//!
//! ```text
//! strata-resolve-snapshot fixtures/mailbox.json --log-level debug
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use strata_containers::{
    CancellationToken, ContainerCache, FaultBus, MailFolders, ResolverConfig,
};
use strata_logging::{init_logging, preload_logging_args, LoggingArgs};
use strata_test_utils::MailboxSnapshot;
use tracing::{debug, warn};

#[derive(Debug, Parser)]
#[command(name = "strata-resolve-snapshot", about = "Resolve container paths from a mailbox snapshot")]
struct Cli {
    /// Snapshot JSON file
    snapshot: PathBuf,

    /// Resolver configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Abort at the first recoverable failure
    #[arg(long)]
    fail_fast: bool,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging comes up before full argument parsing so usage errors are logged too.
    let settings = preload_logging_args(std::env::args());
    init_logging(&settings)?;

    let cli = Cli::parse();
    debug!(log_level = %cli.logging.log_level, snapshot = %cli.snapshot.display(), "starting");

    let mut config = match &cli.config {
        Some(path) => ResolverConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ResolverConfig::default(),
    };
    config.fail_fast |= cli.fail_fast;

    let (scope, mailbox) = MailboxSnapshot::load(&cli.snapshot)?.into_mailbox();
    let mailbox = Arc::new(mailbox);
    let cache = ContainerCache::<MailFolders>::new(scope, mailbox.clone(), mailbox)
        .with_config(config.clone());

    let errs = FaultBus::new(config.fail_fast);
    let outcome = cache.populate(&CancellationToken::new(), &errs).await;

    for err in errs.recovered() {
        warn!(error = %err, "recoverable failure");
        eprintln!("recovered: {err}");
    }

    if let Some(resolver) = cache.resolver() {
        for record in resolver.items() {
            if let Some(path) = record.path().filter(|p| !p.is_empty()) {
                println!("{}\t{}", path.id_string(), path.name_string());
            }
        }
        let stats = resolver.stats();
        eprintln!(
            "{} containers: {} resolved, {} unresolved, {} failed",
            stats.total(),
            stats.resolved,
            stats.unresolved,
            stats.failed
        );
    }

    outcome.context("Population failed")
}
