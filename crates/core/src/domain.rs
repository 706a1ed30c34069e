//! The two independent agent contexts presented side by side.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Identifies which backend and agent a timeline, credential, and realtime
/// connection belong to.
///
/// The two domains run concurrently and are fully isolated from each other:
/// separate session state, separate network targets, no shared mutable data.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentDomain {
    Restaurant,
    Shopping,
}

impl AgentDomain {
    /// All domains, in presentation order.
    pub const ALL: [AgentDomain; 2] = [AgentDomain::Restaurant, AgentDomain::Shopping];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentDomain::Restaurant => "restaurant",
            AgentDomain::Shopping => "shopping",
        }
    }
}

impl fmt::Display for AgentDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known agent domain.
#[derive(Debug, thiserror::Error)]
#[error("Unknown agent domain: '{0}'")]
pub struct UnknownDomain(pub String);

impl FromStr for AgentDomain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restaurant" => Ok(AgentDomain::Restaurant),
            "shopping" => Ok(AgentDomain::Shopping),
            other => Err(UnknownDomain(other.to_string())),
        }
    }
}
