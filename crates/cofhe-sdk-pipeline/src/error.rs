//! Error types for the pipeline module.

use cofhe_sdk_core::CoreError;
use thiserror::Error;

/// Errors that can occur while preparing inputs or unsealing outputs.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The value nests deeper than the configured bound.
    #[error("maximum traversal depth {limit} exceeded")]
    MaxDepthExceeded { limit: usize },

    /// Extraction and substitution disagreed on the number of encryptable
    /// leaves. This is a bug, not bad input.
    #[error("encryptable count mismatch: walk visited {expected} encryptable items, backend returned {received} handles")]
    EncryptableCountMismatch { expected: usize, received: usize },

    /// The value holds a permission marker but no permission was supplied.
    #[error("permission marker present but no permission available")]
    MissingPermission,

    /// An encryptable payload does not fit its declared type.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A JSON value could not be mapped onto the value model.
    #[error("unrecognized shape: {0}")]
    UnrecognizedShape(String),

    /// The FHE engine failed.
    #[error("fhe engine error: {0}")]
    Engine(String),

    /// The verification backend failed or rejected the proof.
    #[error("verifier error: {0}")]
    Backend(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl PipelineError {
    /// True for failures that indicate an internal contract violation
    /// rather than bad input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, PipelineError::EncryptableCountMismatch { .. })
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
