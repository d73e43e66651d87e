//! Structured error types shared across RNS crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`RnsError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (identifiers, counts, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the RNS engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum RnsError {
    /// A user supplied transform or likelihood violated its contract.
    #[error("user function error: {0}")]
    UserFunction(ErrorInfo),
    /// Live population bookkeeping contract violations.
    #[error("population error: {0}")]
    Population(ErrorInfo),
    /// Region construction or sampling failures.
    #[error("region error: {0}")]
    Region(ErrorInfo),
    /// Batch dispatch failures.
    #[error("dispatch error: {0}")]
    Dispatch(ErrorInfo),
    /// Checkpoint persistence failures.
    #[error("checkpoint error: {0}")]
    Checkpoint(ErrorInfo),
    /// Invalid run configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl RnsError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            RnsError::UserFunction(info)
            | RnsError::Population(info)
            | RnsError::Region(info)
            | RnsError::Dispatch(info)
            | RnsError::Checkpoint(info)
            | RnsError::Config(info)
            | RnsError::Serde(info) => info,
        }
    }

    /// Whether the error leaves the run unable to continue.
    ///
    /// Checkpoint failures degrade to warnings; everything else aborts the
    /// round loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RnsError::Checkpoint(_))
    }
}
