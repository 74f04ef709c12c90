//! Shared identifier wrappers for Strata.
//!
//! Remote services hand out opaque string identifiers. The wrappers here only
//! guarantee that an identifier is non-empty and carries no surrounding
//! whitespace; the contents are otherwise left untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned when an identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {label}: {reason}")]
pub struct IdParseError {
    label: &'static str,
    reason: &'static str,
}

impl IdParseError {
    fn new(label: &'static str, reason: &'static str) -> Self {
        Self { label, reason }
    }

    /// Which kind of identifier was rejected.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

fn validate(value: &str, label: &'static str) -> Result<(), IdParseError> {
    if value.is_empty() {
        return Err(IdParseError::new(label, "must not be empty"));
    }
    if value.trim() != value {
        return Err(IdParseError::new(label, "must not have surrounding whitespace"));
    }
    Ok(())
}

macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident, $label:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                validate(value, $label)?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate(&value, $label)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Stable identifier of a remote container (folder), unique within a scope.
    ContainerId,
    "container ID"
);
define_string_id!(
    /// Enumeration boundary, e.g. the owner of one mailbox.
    ScopeKey,
    "scope key"
);
