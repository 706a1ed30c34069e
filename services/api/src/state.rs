//! Shared Application State
//!
//! One `AppState` is created at startup and handed to all handlers. It
//! holds the configuration, the credential issuer, and one running
//! [`DomainRuntime`] per agent domain.

use crate::config::Config;
use crate::runtime::DomainRuntime;
use duet_access::CredentialIssuer;
use duet_core::AgentDomain;
use std::collections::HashMap;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub issuer: Arc<CredentialIssuer>,
    domains: HashMap<AgentDomain, DomainRuntime>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        issuer: Arc<CredentialIssuer>,
        domains: HashMap<AgentDomain, DomainRuntime>,
    ) -> Self {
        Self {
            config,
            issuer,
            domains,
        }
    }

    /// The runtime for `domain`. Both domains are started at boot, so a
    /// miss here is a wiring bug, not a user error.
    pub fn domain(&self, domain: AgentDomain) -> &DomainRuntime {
        self.domains
            .get(&domain)
            .unwrap_or_else(|| panic!("runtime for domain '{domain}' was not started"))
    }
}
