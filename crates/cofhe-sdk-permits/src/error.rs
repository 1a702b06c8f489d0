//! Error types for permits.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::permit::PermitKind;
use crate::signature::SigningRole;

/// Errors that can occur during permit operations.
#[derive(Debug, Error)]
pub enum PermitError {
    /// The signer exposes neither typed-data signing method.
    #[error("unsupported signer: no typed-data signing method available")]
    UnsupportedSigner,

    /// The signer failed or refused to sign.
    #[error("signer error: {0}")]
    Signer(String),

    /// The permit is structurally invalid.
    #[error("invalid permit data:\n{0}")]
    ShapeValidationFailed(FieldErrors),

    /// The permit is well-formed but not trustworthy (expired, bad signature).
    #[error("permit is invalid: {0}")]
    TrustValidationFailed(String),

    /// A signing role that does not apply to this permit kind.
    #[error("cannot sign a {kind} permit as {role}")]
    InvalidRole { kind: PermitKind, role: SigningRole },

    /// A lifecycle step that does not apply to this permit.
    #[error("invalid permit transition: {0}")]
    InvalidTransition(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("core error: {0}")]
    Core(#[from] cofhe_sdk_core::CoreError),
}

/// Result type for permit operations.
pub type Result<T> = std::result::Result<T, PermitError>;

/// Violations keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map holding a single violation.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `Ok(())` when empty, otherwise the map itself.
    pub fn into_result(self) -> std::result::Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "- {}: {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

impl From<FieldErrors> for PermitError {
    fn from(errors: FieldErrors) -> Self {
        PermitError::ShapeValidationFailed(errors)
    }
}
