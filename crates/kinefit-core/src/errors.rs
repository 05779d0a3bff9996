//! Structured error types shared across kinefit crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`KineError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable kebab-case code, e.g. `invalid-boundaries`.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Offending values keyed by name: parameters, shapes, paths.
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

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.code)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "; hint: {hint}")?;
        }
        Ok(())
    }
}

/// Error returned by every fallible kinefit operation.
///
/// `Config` errors are fatal and raised before sampling starts. `Model` errors
/// raised while evaluating a proposal are downgraded to rejections by the
/// sampler; they only surface to callers from direct model evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum KineError {
    /// Invalid boundaries, instrument settings or parameter names.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Forward model evaluation failures.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Shape or rank problems inside the convolution engine.
    #[error("convolution error: {0}")]
    Convolution(ErrorInfo),
    /// Sampler failures such as a chain without any accepted step.
    #[error("sampler error: {0}")]
    Sampler(ErrorInfo),
    /// Serialization, schema and artefact I/O errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl KineError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            KineError::Config(info)
            | KineError::Model(info)
            | KineError::Convolution(info)
            | KineError::Sampler(info)
            | KineError::Serde(info) => info,
        }
    }

    /// Lower-case family name.
    pub fn family(&self) -> &'static str {
        match self {
            KineError::Config(_) => "config",
            KineError::Model(_) => "model",
            KineError::Convolution(_) => "convolution",
            KineError::Sampler(_) => "sampler",
            KineError::Serde(_) => "serde",
        }
    }

    /// Same error with one more context entry.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        match self {
            KineError::Config(info) => KineError::Config(info.with_context(key, value)),
            KineError::Model(info) => KineError::Model(info.with_context(key, value)),
            KineError::Convolution(info) => KineError::Convolution(info.with_context(key, value)),
            KineError::Sampler(info) => KineError::Sampler(info.with_context(key, value)),
            KineError::Serde(info) => KineError::Serde(info.with_context(key, value)),
        }
    }
}
