//! Shared logging utilities for Strata binaries.
//!
//! Settings come from command-line flags ([`LoggingArgs`]) and can be read
//! ahead of full argument parsing with [`preload_logging_args`], so logging is
//! up before anything else runs.

mod pii;
mod rolling;

pub use pii::{conceal, pii_handling, PiiHandling};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rolling::SharedRollingWriter;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const LOG_LEVEL_FLAG: &str = "log-level";
pub const LOG_FILE_FLAG: &str = "log-file";
pub const READABLE_LOGS_FLAG: &str = "readable-logs";
pub const SENSITIVE_INFO_FLAG: &str = "mask-sensitive-data";
pub const DEBUG_API_FLAG: &str = "debug-api-calls";

/// Writes log output to stderr instead of a file.
pub const LOG_TO_STDERR: &str = "stderr";
/// Writes log output to stdout instead of a file.
pub const LOG_TO_STDOUT: &str = "stdout";

static DEBUG_API_CALLS: AtomicBool = AtomicBool::new(false);

/// Minimum level that gets recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Disabled,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Disabled => "off",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        <LogLevel as ValueEnum>::from_str(value, true).ok()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Logging flags shared by every Strata binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct LoggingArgs {
    /// Minimum level to record
    #[arg(long = LOG_LEVEL_FLAG, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log file path, or "stderr"/"stdout" to skip the file
    #[arg(long = LOG_FILE_FLAG)]
    pub log_file: Option<String>,

    /// Human-friendly multi-line log formatting
    #[arg(long = READABLE_LOGS_FLAG)]
    pub readable_logs: bool,

    /// How user data (folder names and the like) appears in logs
    #[arg(long = SENSITIVE_INFO_FLAG, value_enum, default_value_t = PiiHandling::Hash)]
    pub pii_handling: PiiHandling,

    /// Log every remote API call at info instead of debug
    #[arg(long = DEBUG_API_FLAG)]
    pub debug_api_calls: bool,
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    /// `None` means the default file under [`logs_dir`].
    pub file: Option<String>,
    pub readable: bool,
    pub pii_handling: PiiHandling,
    pub debug_api_calls: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            readable: false,
            pii_handling: PiiHandling::Hash,
            debug_api_calls: false,
        }
    }
}

impl From<LoggingArgs> for LogSettings {
    fn from(args: LoggingArgs) -> Self {
        Self {
            level: args.log_level,
            file: args.log_file,
            readable: args.readable_logs,
            pii_handling: args.pii_handling,
            debug_api_calls: args.debug_api_calls,
        }
    }
}

impl LogSettings {
    fn log_path(&self) -> Option<PathBuf> {
        match self.file.as_deref() {
            Some(LOG_TO_STDERR) | Some(LOG_TO_STDOUT) => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(logs_dir().join("strata.log")),
        }
    }
}

/// Pulls logging settings out of a raw argv without failing on anything
/// else it contains. Both `--flag value` and `--flag=value` are accepted;
/// unparseable values fall back to defaults.
pub fn preload_logging_args<I, S>(args: I) -> LogSettings
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut settings = LogSettings::default();
    let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
    let mut idx = 0;

    while idx < args.len() {
        let Some(flag) = args[idx].strip_prefix("--") else {
            idx += 1;
            continue;
        };
        let (name, inline) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (flag, None),
        };

        let take_value = |idx: &mut usize| -> Option<String> {
            if inline.is_some() {
                return inline.clone();
            }
            let next = args.get(*idx + 1)?;
            if next.starts_with("--") {
                return None;
            }
            *idx += 1;
            Some(next.clone())
        };

        match name {
            LOG_LEVEL_FLAG => {
                if let Some(level) = take_value(&mut idx).as_deref().and_then(LogLevel::parse) {
                    settings.level = level;
                }
            }
            LOG_FILE_FLAG => {
                if let Some(file) = take_value(&mut idx) {
                    settings.file = Some(file);
                }
            }
            SENSITIVE_INFO_FLAG => {
                if let Some(mode) = take_value(&mut idx).as_deref().and_then(PiiHandling::parse) {
                    settings.pii_handling = mode;
                }
            }
            READABLE_LOGS_FLAG => settings.readable = true,
            DEBUG_API_FLAG => settings.debug_api_calls = true,
            _ => {}
        }
        idx += 1;
    }

    settings
}

/// Initialize tracing with a rolling file writer and stderr output.
///
/// `RUST_LOG`, when set, overrides the configured level.
pub fn init_logging(settings: &LogSettings) -> Result<()> {
    pii::set_pii_handling(settings.pii_handling);
    DEBUG_API_CALLS.store(settings.debug_api_calls, Ordering::Relaxed);

    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(settings.level.directive()))
    };

    let file_layer = match settings.log_path() {
        Some(path) => {
            let writer = SharedRollingWriter::new(&path, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    let console_layer = if settings.file.as_deref() == Some(LOG_TO_STDOUT) {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_filter(filter())
            .boxed()
    } else if settings.readable {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Whether remote calls should be logged at info level.
pub fn debug_api_calls() -> bool {
    DEBUG_API_CALLS.load(Ordering::Relaxed)
}

/// Get the Strata home directory: `$STRATA_HOME` or `~/.strata`.
pub fn strata_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("STRATA_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".strata")
}

/// Get the logs directory: `<strata home>/logs`.
pub fn logs_dir() -> PathBuf {
    strata_home().join("logs")
}

/// Ensure the parent directory of a log file exists.
pub fn ensure_log_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    Ok(())
}
