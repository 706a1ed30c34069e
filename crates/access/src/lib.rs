//! Duet Access Library
//!
//! Mints scoped, time-limited realtime-room credentials: a fresh random
//! participant identity and room name per session, plus an HS256 access
//! token granting exactly the rights needed to join that one room and
//! exchange audio and data with the voice agent.

pub mod config;
pub mod token;

pub use config::{AccessConfig, ConfigError, RealtimeEndpoint, ResolvedEndpoint};
pub use token::{CredentialIssuer, SessionCredential, VideoGrants, TOKEN_TTL_MINUTES};
