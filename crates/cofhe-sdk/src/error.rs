//! Error types for the SDK.

use cofhe_sdk_core::CoreError;
use cofhe_sdk_permits::PermitError;
use cofhe_sdk_pipeline::PipelineError;
use cofhe_sdk_store::StoreError;
use thiserror::Error;

/// Errors that can occur during SDK operations.
#[derive(Debug, Error)]
pub enum SdkError {
    /// The session lacks state the operation needs.
    #[error("sdk not initialized: {0}")]
    NotInitialized(String),

    /// A permit lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Permit creation, signing or validation error.
    #[error("permit error: {0}")]
    Permit(#[from] PermitError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Input preparation or unsealing error.
    #[error("pipeline error: {0}")]
    Pipeline(PipelineError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The pipeline broke one of its own invariants.
    #[error("internal error: {0}")]
    Internal(PipelineError),
}

impl From<PipelineError> for SdkError {
    fn from(err: PipelineError) -> Self {
        if err.is_contract_violation() {
            SdkError::Internal(err)
        } else {
            SdkError::Pipeline(err)
        }
    }
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violations_are_internal() {
        let err: SdkError = PipelineError::EncryptableCountMismatch {
            expected: 1,
            received: 0,
        }
        .into();
        assert!(matches!(err, SdkError::Internal(_)));

        let err: SdkError = PipelineError::MissingPermission.into();
        assert!(matches!(err, SdkError::Pipeline(PipelineError::MissingPermission)));
    }
}
