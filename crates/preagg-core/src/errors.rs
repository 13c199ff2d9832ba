//! Structured error types shared across preagg crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`PreaggError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, entity codes, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint naming the step that resolves the issue.
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

    /// Adds the display form of a path as a context entry.
    pub fn with_path(self, path: &Path) -> Self {
        self.with_context("path", path.display().to_string())
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the preagg pipeline.
///
/// `Config`, `Seed`, `Coordinate` and `Registry` errors are fatal for a run.
/// `Evaluation` errors are recovered by the caller at iteration or entity
/// granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum PreaggError {
    /// Missing prerequisites, invalid arguments or shape mismatches.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Batch key and seed derivation errors.
    #[error("seed error: {0}")]
    Seed(ErrorInfo),
    /// Identifier or type code resolution failures.
    #[error("coordinate error: {0}")]
    Coordinate(ErrorInfo),
    /// Campaign and resource registry errors.
    #[error("registry error: {0}")]
    Registry(ErrorInfo),
    /// Failures raised by the evaluator for an entity or iteration.
    #[error("evaluation error: {0}")]
    Evaluation(ErrorInfo),
    /// Serialization, schema and filesystem errors.
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

impl PreaggError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            PreaggError::Config(info)
            | PreaggError::Seed(info)
            | PreaggError::Coordinate(info)
            | PreaggError::Registry(info)
            | PreaggError::Evaluation(info)
            | PreaggError::Serde(info) => info,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &str {
        &self.info().code
    }
}

/// Wraps a filesystem error for `path` under the given code.
pub fn io_error(code: &str, path: &Path, err: impl ToString) -> PreaggError {
    PreaggError::Serde(ErrorInfo::new(code, err.to_string()).with_path(path))
}
