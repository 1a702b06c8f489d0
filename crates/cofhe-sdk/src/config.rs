//! Session configuration.

use std::time::Duration;

use cofhe_sdk_core::Address;
use cofhe_sdk_permits::DEFAULT_PERMIT_TTL_SECS;
use cofhe_sdk_pipeline::{WalkConfig, DEFAULT_MAX_DEPTH};

use crate::error::{Result, SdkError};

/// Configuration for an [`Sdk`](crate::Sdk) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkConfig {
    /// Chain the session signs permits for.
    pub chain_id: u64,
    /// Security zones whose network keys are fetched on initialization.
    pub security_zones: Vec<u8>,
    /// Default contracts copied into newly created permits.
    pub contracts: Vec<Address>,
    /// Default projects copied into newly created permits.
    pub projects: Vec<String>,
    /// Create and activate a self permit on initialization when the
    /// account has no active permit.
    pub generate_permit: bool,
    /// Nesting bound for payload walks.
    pub max_depth: usize,
    /// Expiration offset for permits created without one.
    pub permit_ttl: Duration,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            security_zones: vec![0],
            contracts: Vec::new(),
            projects: Vec::new(),
            generate_permit: true,
            max_depth: DEFAULT_MAX_DEPTH,
            permit_ttl: Duration::from_secs(DEFAULT_PERMIT_TTL_SECS),
        }
    }
}

impl SdkConfig {
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_security_zones(mut self, zones: Vec<u8>) -> Self {
        self.security_zones = zones;
        self
    }

    pub fn with_contracts(mut self, contracts: Vec<Address>) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn with_projects(mut self, projects: Vec<String>) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_generate_permit(mut self, generate: bool) -> Self {
        self.generate_permit = generate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_permit_ttl(mut self, ttl: Duration) -> Self {
        self.permit_ttl = ttl;
        self
    }

    /// Reject configurations no session can run with.
    pub fn validate(&self) -> Result<()> {
        if self.security_zones.is_empty() {
            return Err(SdkError::InvalidConfig(
                "a list of security zones was provided, but it is empty".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(SdkError::InvalidConfig("max_depth must be at least 1".into()));
        }
        if self.permit_ttl.is_zero() {
            return Err(SdkError::InvalidConfig("permit_ttl must be positive".into()));
        }
        Ok(())
    }

    pub(crate) fn walk(&self) -> WalkConfig {
        WalkConfig {
            max_depth: self.max_depth,
        }
    }
}
