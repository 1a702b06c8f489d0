//! # CoFHE SDK Testkit
//!
//! Testing utilities for the CoFHE SDK.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: local wallets with memory stores, and signed permits of
//!   every kind
//! - **Generators**: Proptest strategies for payload trees, encryptable
//!   items and permit options
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use cofhe_sdk_testkit::fixtures::multi_party_fixtures;
//!
//! # async fn demo() {
//! let parties = multi_party_fixtures(2);
//! let shared = parties[0].sharing_permit(parties[1].account()).await;
//! let adopted = parties[1].adopt(shared).await;
//! assert!(adopted.is_valid().valid);
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cofhe_sdk_testkit::generators::payload;
//!
//! proptest! {
//!     #[test]
//!     fn extraction_is_deterministic(value in payload(4)) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_party_fixtures, sample_payload, TestFixture, TEST_CHAIN_ID, TEST_PROJECT};
