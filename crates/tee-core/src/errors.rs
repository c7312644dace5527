//! Structured error types shared across the launcher crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`TeeError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (artifact names, paths, axis labels).
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

/// Canonical error type for the experiment launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum TeeError {
    /// Malformed artifact declarations or dangling dependency handles.
    #[error("artifact error: {0}")]
    Artifact(ErrorInfo),
    /// Invalid configuration axes or output layout collisions.
    #[error("matrix error: {0}")]
    Matrix(ErrorInfo),
    /// Experiment plan loading and binding errors.
    #[error("plan error: {0}")]
    Plan(ErrorInfo),
    /// Failures raised while handing runs to a dispatcher.
    #[error("dispatch error: {0}")]
    Dispatch(ErrorInfo),
    /// Run ledger persistence errors.
    #[error("ledger error: {0}")]
    Ledger(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
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

impl TeeError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            TeeError::Artifact(info)
            | TeeError::Matrix(info)
            | TeeError::Plan(info)
            | TeeError::Dispatch(info)
            | TeeError::Ledger(info)
            | TeeError::Serde(info)
            | TeeError::Io(info) => info,
        }
    }

    /// Returns the stable error code carried by the payload.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// True for errors raised while building the batch, before any run is submitted.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            TeeError::Artifact(_) | TeeError::Matrix(_) | TeeError::Plan(_)
        )
    }
}
