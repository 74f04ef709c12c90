//! Concealment of user data in log output.

use clap::ValueEnum;
use std::fmt;
use std::sync::OnceLock;

static PII_HANDLING: OnceLock<PiiHandling> = OnceLock::new();

const MASK: &str = "***";
const HASH_LEN: usize = 12;

/// How values that may identify a person are rendered in logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PiiHandling {
    /// Log values as-is.
    Plaintext,
    /// Replace values with a fixed mask.
    Mask,
    /// Replace values with a short stable digest, so repeated values can
    /// still be correlated across log lines.
    #[default]
    Hash,
}

impl PiiHandling {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        <PiiHandling as ValueEnum>::from_str(value, true).ok()
    }

    /// Render `value` according to this mode.
    pub fn apply(self, value: &str) -> String {
        match self {
            PiiHandling::Plaintext => value.to_string(),
            PiiHandling::Mask => MASK.to_string(),
            PiiHandling::Hash => {
                let digest = blake3::hash(value.as_bytes()).to_hex();
                digest[..HASH_LEN].to_string()
            }
        }
    }
}

impl fmt::Display for PiiHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PiiHandling::Plaintext => "plaintext",
            PiiHandling::Mask => "mask",
            PiiHandling::Hash => "hash",
        };
        f.write_str(name)
    }
}

/// First call wins; later calls are ignored.
pub(crate) fn set_pii_handling(mode: PiiHandling) {
    let _ = PII_HANDLING.set(mode);
}

/// The process-wide mode, [`PiiHandling::Hash`] until logging is initialized.
pub fn pii_handling() -> PiiHandling {
    PII_HANDLING.get().copied().unwrap_or_default()
}

/// Render a user-supplied value (e.g. a folder display name) for logging.
pub fn conceal(value: &str) -> String {
    pii_handling().apply(value)
}
