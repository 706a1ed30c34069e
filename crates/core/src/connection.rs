//! Realtime connection state, as reported by the voice provider.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The lifecycle state of a domain's realtime audio connection.
///
/// `Disconnected -> Connecting -> Connected` is driven by the session
/// manager; the remaining values are provider-reported sub-states of
/// `Connected` that this crate passes through without interpretation.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Listening,
    Speaking,
    Thinking,
}

impl RealtimeConnectionState {
    /// Whether a live connection currently exists (any state other than
    /// `Disconnected` or `Connecting`).
    pub fn is_connected(&self) -> bool {
        !matches!(
            self,
            RealtimeConnectionState::Disconnected | RealtimeConnectionState::Connecting
        )
    }

    /// Maps a provider-reported state name onto this vocabulary. Unknown
    /// names collapse to `Connected` so that new provider sub-states do not
    /// break the session.
    pub fn from_provider(name: &str) -> Self {
        match name {
            "disconnected" => RealtimeConnectionState::Disconnected,
            "connecting" => RealtimeConnectionState::Connecting,
            "listening" => RealtimeConnectionState::Listening,
            "speaking" => RealtimeConnectionState::Speaking,
            "thinking" => RealtimeConnectionState::Thinking,
            _ => RealtimeConnectionState::Connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        assert_eq!(
            RealtimeConnectionState::default(),
            RealtimeConnectionState::Disconnected
        );
    }

    #[test]
    fn provider_sub_states_pass_through() {
        assert_eq!(
            RealtimeConnectionState::from_provider("speaking"),
            RealtimeConnectionState::Speaking
        );
        assert_eq!(
            RealtimeConnectionState::from_provider("thinking"),
            RealtimeConnectionState::Thinking
        );
    }

    #[test]
    fn unknown_provider_state_collapses_to_connected() {
        assert_eq!(
            RealtimeConnectionState::from_provider("initializing"),
            RealtimeConnectionState::Connected
        );
    }

    #[test]
    fn connectedness() {
        assert!(!RealtimeConnectionState::Disconnected.is_connected());
        assert!(!RealtimeConnectionState::Connecting.is_connected());
        assert!(RealtimeConnectionState::Connected.is_connected());
        assert!(RealtimeConnectionState::Listening.is_connected());
    }
}
