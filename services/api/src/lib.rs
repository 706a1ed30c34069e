//! Duet API Library Crate
//!
//! This library contains the session-orchestration service for the
//! dual-agent concierge: environment configuration, the credential
//! endpoint, the text channel bridge (two poll loops per domain), the
//! realtime session manager, and the per-domain runtime that wires them
//! into one serialized conversation timeline. The `bin/api.rs` binary is a
//! thin wrapper around this library.

pub mod bridge;
pub mod config;
pub mod handlers;
pub mod models;
pub mod realtime;
pub mod router;
pub mod runtime;
pub mod state;
