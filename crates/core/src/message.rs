//! Conversation messages and the backend-owned status/order structures.
//!
//! Wire names (`voice`, `interface`, `tool-call`, `tool_name`, ...) follow
//! the contract the presentation shell and the agent backends already
//! speak; changing them is a breaking change for both.

use crate::domain::AgentDomain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Who produced a conversation message.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The spoken-audio agent (transcriptions arrive from this speaker).
    #[serde(rename = "voice")]
    VoiceAgent,
    /// The text-channel agent (questions and synthesized notices).
    #[serde(rename = "interface")]
    InterfaceAgent,
    /// The human user (typed replies).
    #[serde(rename = "user")]
    User,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Speaker::VoiceAgent => "voice",
            Speaker::InterfaceAgent => "interface",
            Speaker::User => "user",
        };
        f.write_str(s)
    }
}

/// What kind of content a conversation message carries.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    #[serde(rename = "transcription")]
    Transcription,
    #[serde(rename = "response")]
    Response,
    #[serde(rename = "tool-call")]
    ToolCall,
}

/// One immutable entry in a domain's conversation timeline.
///
/// Messages are created by any of the three channels, appended in arrival
/// order at the session's single append point, and never mutated or removed
/// for the life of the session.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ConversationMessage {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub domain: AgentDomain,
    pub speaker: Speaker,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Free-form extra data whose schema is owned by the backend.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
}

/// A message as produced by a channel, before the timeline assigns its
/// identifier and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub speaker: Speaker,
    pub kind: MessageKind,
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl NewMessage {
    pub fn new(speaker: Speaker, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            speaker,
            kind,
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// A question or notice from the text-channel agent.
    pub fn interface_response(content: impl Into<String>) -> Self {
        Self::new(Speaker::InterfaceAgent, MessageKind::Response, content)
    }

    /// A typed reply from the user.
    pub fn user_reply(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, MessageKind::Response, content)
    }

    /// A finalized utterance transcription from the voice channel.
    pub fn transcription(content: impl Into<String>) -> Self {
        Self::new(Speaker::VoiceAgent, MessageKind::Transcription, content)
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The *current* tool activity reported by a domain's backend.
///
/// This is not part of the message log: each successful status poll
/// overwrites it wholesale, and the backend owns the `status` vocabulary
/// beyond `idle`/`running`.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ToolStatus {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default = "ToolStatus::idle_status")]
    pub status: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
}

impl ToolStatus {
    fn idle_status() -> String {
        "idle".to_string()
    }

    pub fn is_idle(&self) -> bool {
        self.status == "idle"
    }
}

impl Default for ToolStatus {
    fn default() -> Self {
        Self {
            tool_name: String::new(),
            status: Self::idle_status(),
            details: Map::new(),
        }
    }
}

/// One line of the backend-authoritative cart contents.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_and_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&Speaker::VoiceAgent).unwrap(),
            "\"voice\""
        );
        assert_eq!(
            serde_json::to_string(&Speaker::InterfaceAgent).unwrap(),
            "\"interface\""
        );
        assert_eq!(serde_json::to_string(&Speaker::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&MessageKind::ToolCall).unwrap(),
            "\"tool-call\""
        );
        assert_eq!(
            serde_json::to_string(&MessageKind::Transcription).unwrap(),
            "\"transcription\""
        );
    }

    #[test]
    fn tool_status_defaults_to_idle() {
        let status = ToolStatus::default();
        assert!(status.is_idle());
        assert!(status.tool_name.is_empty());
        assert!(status.details.is_empty());
    }

    #[test]
    fn tool_status_deserializes_backend_payload() {
        let json = r#"{"tool_name":"search_products","status":"running","details":{"query":"espresso beans"}}"#;
        let status: ToolStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.tool_name, "search_products");
        assert_eq!(status.status, "running");
        assert_eq!(
            status.details.get("query").and_then(Value::as_str),
            Some("espresso beans")
        );
        assert!(!status.is_idle());
    }

    #[test]
    fn tool_status_tolerates_missing_fields() {
        let status: ToolStatus = serde_json::from_str("{}").unwrap();
        assert!(status.is_idle());
    }

    #[test]
    fn conversation_message_round_trip() {
        let message = ConversationMessage {
            id: Uuid::new_v4(),
            domain: AgentDomain::Shopping,
            speaker: Speaker::InterfaceAgent,
            kind: MessageKind::Response,
            content: "Paper or plastic?".to_string(),
            created_at: Utc::now(),
            metadata: Map::new(),
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"interface\""));
        assert!(json.contains("Paper or plastic?"));
        // Empty metadata is omitted from the wire form.
        assert!(!json.contains("metadata"));

        let back: ConversationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, message.id);
        assert_eq!(back.speaker, message.speaker);
        assert_eq!(back.content, message.content);
    }

    #[test]
    fn order_item_round_trip() {
        let item = OrderItem {
            id: "sku-42".to_string(),
            name: "Espresso beans".to_string(),
            quantity: 2,
            price: 12.5,
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: OrderItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
