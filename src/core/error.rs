//! Engine error taxonomy

use thiserror::Error;

/// Errors raised by the pipeline engine.
///
/// Every failure is fatal to the step that raised it; the run driver stops
/// the pipeline at the first error and leaves already-persisted artifacts in
/// place.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation lookup failed (unknown module, or unknown function within it)
    #[error("cannot resolve operation '{module}.{function}': {reason}")]
    Resolution {
        module: String,
        function: String,
        reason: String,
    },

    /// Storage backend failed to read or write an artifact
    #[error("storage error: {0}")]
    Storage(String),

    /// A requested artifact, file, or path does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The database collaborator failed at the transport level
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A value violated a representability requirement (e.g. not JSON-serializable)
    #[error("validation error: {0}")]
    Validation(String),

    /// A filter expression failed to parse or evaluate
    #[error("filter expression '{expr}' failed: {message}")]
    Expression { expr: String, message: String },

    /// An operation (or JSON parse on its behalf) failed at some traversal node
    #[error("step '{step}' failed at '{context}': {message}")]
    Execution {
        step: String,
        context: String,
        message: String,
    },

    /// The engine was asked to do something its configuration does not support
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Wrap an arbitrary failure as a step-scoped execution error.
    pub fn execution(
        step: impl Into<String>,
        context: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        EngineError::Execution {
            step: step.into(),
            context: context.into(),
            message: message.to_string(),
        }
    }
}
