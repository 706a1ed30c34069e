//! Wire models for the REST surface.
//!
//! Field casing on `ConnectionDetails` is part of the contract with the
//! presentation shell and must stay camelCase.

use duet_access::SessionCredential;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Everything the presentation shell needs to join a realtime room.
#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub server_url: String,
    pub room_name: String,
    pub participant_name: String,
    pub participant_token: String,
}

impl From<SessionCredential> for ConnectionDetails {
    fn from(credential: SessionCredential) -> Self {
        Self {
            server_url: credential.server_url,
            room_name: credential.room_name,
            participant_name: credential.participant_identity,
            participant_token: credential.token,
        }
    }
}

/// A typed user reply bound for the text-channel agent.
#[derive(Deserialize, ToSchema, Debug)]
pub struct ReplyPayload {
    #[schema(example = "A table for two, please")]
    pub text: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn connection_details_serialize_camel_case() {
        let details = ConnectionDetails::from(SessionCredential {
            server_url: "wss://rooms.example".to_string(),
            room_name: "shopping_room_7".to_string(),
            participant_identity: "shopping_user_42".to_string(),
            token: "jwt".to_string(),
            expires_at: Utc::now(),
        });
        let json = serde_json::to_value(&details).unwrap();
        let keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            keys,
            vec![
                "participantName",
                "participantToken",
                "roomName",
                "serverUrl"
            ]
        );
        assert_eq!(json["participantName"], "shopping_user_42");
    }

    #[test]
    fn reply_payload_requires_text() {
        assert!(serde_json::from_str::<ReplyPayload>(r#"{}"#).is_err());
        let payload: ReplyPayload = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(payload.text, "hi");
    }
}
