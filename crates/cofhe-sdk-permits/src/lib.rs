//! # CoFHE SDK Permits
//!
//! Permits, their permission projection, EIP-712 signature payloads and
//! permit validation.
//!
//! ## Overview
//!
//! A permit is a signed, time-bounded authorization to request sealed
//! outputs of confidential values. It binds an X25519 sealing key pair so
//! that the holder can unseal what the network returns.
//!
//! ## Key Concepts
//!
//! - **Permit**: the authorization record (self, sharing or recipient)
//! - **Permission**: the signature-free projection attached to requests
//! - **SignatureSchema**: which fields each signature covers
//! - **TypedDataSigner**: the external wallet that produces signatures
//!
//! ## Trust Model
//!
//! The issuer signs the base fields. For self permits the signature also
//! covers the sealing key. A sharing permit is signed before the recipient
//! has a key, so the recipient adopts it with a fresh key pair and signs
//! `{sealingKey, issuerSignature}` itself.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cofhe_sdk_permits::{Permit, PermitOptions};
//! # use cofhe_sdk_permits::TypedDataSigner;
//! # async fn demo(signer: &dyn TypedDataSigner) -> cofhe_sdk_permits::Result<()> {
//! let account = signer.address().await?;
//! let options = PermitOptions::self_permit(account).with_projects(vec!["demo".into()]);
//! let permit = Permit::create_and_sign(options, 1, signer).await?;
//! assert!(permit.is_valid().valid);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod permit;
pub mod signature;
pub mod signer;
pub mod validation;

pub use error::{FieldErrors, PermitError, Result};
pub use permit::{
    Permission, Permit, PermitKind, PermitOptions, SerializedPermit, DEFAULT_PERMIT_NAME,
    DEFAULT_PERMIT_TTL_SECS,
};
pub use signature::{signature_domain, SignatureSchema, SigningRole};
pub use signer::{sign_with_capability, TypedDataSigner};
pub use validation::Validity;

#[cfg(any(test, feature = "testing"))]
pub use signer::{LocalSigner, SignerMode};
