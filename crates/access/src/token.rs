//! Room access token minting.
//!
//! Tokens are HS256 JWTs in the shape the realtime room server expects:
//! the api key as issuer, the participant identity as subject, and a
//! `video` grant object naming the single room the holder may join.

use crate::config::{AccessConfig, ConfigError};
use chrono::{DateTime, Duration, Utc};
use duet_core::AgentDomain;
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed validity window. The session may outlive the token, but expiry
/// ends the ability to (re)join the room; renegotiation is not supported.
pub const TOKEN_TTL_MINUTES: i64 = 15;

/// The scoped rights a credential carries: join this one room, publish
/// audio, publish data, subscribe to room media. Nothing else.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrants {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_publish_data: bool,
    pub can_subscribe: bool,
}

impl VideoGrants {
    pub fn for_room(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            room_join: true,
            can_publish: true,
            can_publish_data: true,
            can_subscribe: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub(crate) struct Claims {
    pub iss: String,
    pub sub: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrants,
}

/// A short-lived credential for one realtime session. Immutable, scoped to
/// a single freshly-named room, and never persisted.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub server_url: String,
    pub room_name: String,
    pub participant_identity: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues [`SessionCredential`]s from per-domain endpoint configuration.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    config: AccessConfig,
}

impl CredentialIssuer {
    pub fn new(config: AccessConfig) -> Self {
        Self { config }
    }

    /// Mints a credential for one session in `domain`.
    ///
    /// Identity and room names are random per session; the room exists only
    /// for the session's lifetime, so collisions are statistically ignored
    /// rather than deduplicated. Missing configuration for the domain is a
    /// [`ConfigError`] and must be treated as fatal by the caller.
    pub fn issue(&self, domain: AgentDomain) -> Result<SessionCredential, ConfigError> {
        let endpoint = self.config.resolve(domain)?;

        let mut rng = rand::rng();
        let participant_identity = format!("{}_user_{}", domain, rng.random_range(0..10_000));
        let room_name = format!("{}_room_{}", domain, rng.random_range(0..10_000));

        let now = Utc::now();
        let expires_at = now + Duration::minutes(TOKEN_TTL_MINUTES);
        let claims = Claims {
            iss: endpoint.api_key.clone(),
            sub: participant_identity.clone(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            video: VideoGrants::for_room(&room_name),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(endpoint.api_secret.as_bytes()),
        )?;

        debug!(%domain, %room_name, %participant_identity, "Issued session credential");
        Ok(SessionCredential {
            server_url: endpoint.url,
            room_name,
            participant_identity,
            token,
            expires_at,
        })
    }
}
