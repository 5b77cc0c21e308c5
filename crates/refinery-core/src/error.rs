//! Typed errors for the pipeline engine.

use thiserror::Error;

/// Malformed or incomplete declarative configuration. Raised while building
/// components, never while processing records.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{kind} config has no \"type\" (or \"class\") discriminator")]
    MissingType { kind: &'static str },

    #[error("unknown {kind} type '{tag}'")]
    UnknownType { kind: &'static str, tag: String },

    #[error("{kind} config is missing required field '{field}'")]
    MissingField { kind: &'static str, field: String },

    #[error("invalid {kind} config: {reason}")]
    Invalid { kind: &'static str, reason: String },

    #[error("invalid regex pattern '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid template '{template}': {reason}")]
    Template { template: String, reason: String },
}

impl ConfigError {
    pub fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            kind,
            reason: reason.into(),
        }
    }

    pub fn missing(kind: &'static str, field: impl Into<String>) -> Self {
        ConfigError::MissingField {
            kind,
            field: field.into(),
        }
    }
}

/// A rule needed a record field that was absent or of the wrong shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldAccessError {
    #[error("record has no field '{0}'")]
    Missing(String),

    #[error("field '{0}' is not a string")]
    NotAString(String),
}

/// Producer or sink I/O failure.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {message}")]
    Parse { context: String, message: String },
}

impl AdapterError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AdapterError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        AdapterError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// Errors surfaced by pipeline construction and execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("field access error: {0}")]
    FieldAccess(#[from] FieldAccessError),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// An extension point that exists in the config surface but has no
    /// semantics yet.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
