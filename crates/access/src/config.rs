//! Per-domain realtime endpoint configuration with a shared fallback.
//!
//! Each agent domain may point at its own realtime server and signing key
//! pair (`LIVEKIT_SHOPPING_URL`, ...); when a domain-specific value is
//! absent the generic `LIVEKIT_*` variables apply, so a single deployment
//! can serve both assistants from one room server.

use duet_core::AgentDomain;

/// A credential configuration failure. Fatal for the session being
/// started; there is no retry without operator intervention.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Failed to sign access token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// One (possibly partial) set of realtime server coordinates.
#[derive(Clone, Debug, Default)]
pub struct RealtimeEndpoint {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl RealtimeEndpoint {
    fn from_env(prefix: &str) -> Self {
        Self {
            url: std::env::var(format!("{prefix}_URL")).ok(),
            api_key: std::env::var(format!("{prefix}_API_KEY")).ok(),
            api_secret: std::env::var(format!("{prefix}_API_SECRET")).ok(),
        }
    }
}

/// A fully resolved endpoint for one domain.
#[derive(Clone, Debug)]
pub struct ResolvedEndpoint {
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Realtime endpoint configuration for both domains.
///
/// Loading never fails: missing values only become a [`ConfigError`] when
/// a credential for the affected domain is actually requested.
#[derive(Clone, Debug, Default)]
pub struct AccessConfig {
    pub shared: RealtimeEndpoint,
    pub restaurant: RealtimeEndpoint,
    pub shopping: RealtimeEndpoint,
}

impl AccessConfig {
    /// Reads `LIVEKIT_URL`/`LIVEKIT_API_KEY`/`LIVEKIT_API_SECRET` and the
    /// `LIVEKIT_RESTAURANT_*`/`LIVEKIT_SHOPPING_*` overrides.
    pub fn from_env() -> Self {
        Self {
            shared: RealtimeEndpoint::from_env("LIVEKIT"),
            restaurant: RealtimeEndpoint::from_env("LIVEKIT_RESTAURANT"),
            shopping: RealtimeEndpoint::from_env("LIVEKIT_SHOPPING"),
        }
    }

    fn overrides(&self, domain: AgentDomain) -> &RealtimeEndpoint {
        match domain {
            AgentDomain::Restaurant => &self.restaurant,
            AgentDomain::Shopping => &self.shopping,
        }
    }

    /// Resolves the endpoint for `domain`, preferring domain-specific
    /// values and falling back to the shared ones field by field.
    pub fn resolve(&self, domain: AgentDomain) -> Result<ResolvedEndpoint, ConfigError> {
        let specific = self.overrides(domain);
        let pick = |a: &Option<String>, b: &Option<String>, var: &str| {
            a.clone()
                .or_else(|| b.clone())
                .ok_or_else(|| ConfigError::MissingVar(var.to_string()))
        };
        Ok(ResolvedEndpoint {
            url: pick(&specific.url, &self.shared.url, "LIVEKIT_URL")?,
            api_key: pick(&specific.api_key, &self.shared.api_key, "LIVEKIT_API_KEY")?,
            api_secret: pick(
                &specific.api_secret,
                &self.shared.api_secret,
                "LIVEKIT_API_SECRET",
            )?,
        })
    }
}
