//! Per-domain conversation state and its read-only snapshot form.

use crate::connection::RealtimeConnectionState;
use crate::domain::AgentDomain;
use crate::message::{ConversationMessage, NewMessage, OrderItem, ToolStatus};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// An immutable view of one domain's session state, cheap to clone and
/// safe to hand to renderers while the session keeps appending.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct SessionSnapshot {
    pub domain: AgentDomain,
    /// The append-only conversation log; append order is display order.
    pub timeline: Vec<ConversationMessage>,
    /// Backend-authoritative cart contents, replaced wholesale on update.
    pub order: Vec<OrderItem>,
    /// The most recently reported tool activity.
    pub tool_status: ToolStatus,
    pub connection: RealtimeConnectionState,
    /// The latest partial transcription, displayed until a final arrives.
    pub live_transcription: Option<String>,
}

/// The mutable state behind a domain's session. All mutation is routed
/// through the session actor, so this type needs no locking of its own.
#[derive(Debug)]
pub(crate) struct Timeline {
    domain: AgentDomain,
    messages: Vec<ConversationMessage>,
    order: Vec<OrderItem>,
    tool_status: ToolStatus,
    connection: RealtimeConnectionState,
    live_transcription: Option<String>,
}

impl Timeline {
    pub(crate) fn new(domain: AgentDomain) -> Self {
        Self {
            domain,
            messages: Vec::new(),
            order: Vec::new(),
            tool_status: ToolStatus::default(),
            connection: RealtimeConnectionState::Disconnected,
            live_transcription: None,
        }
    }

    /// Assigns an id and creation timestamp and appends the message.
    /// Messages are never reordered, mutated, or removed afterwards.
    pub(crate) fn append(&mut self, message: NewMessage) -> &ConversationMessage {
        self.messages.push(ConversationMessage {
            id: Uuid::new_v4(),
            domain: self.domain,
            speaker: message.speaker,
            kind: message.kind,
            content: message.content,
            created_at: Utc::now(),
            metadata: message.metadata,
        });
        self.messages
            .last()
            .unwrap_or_else(|| unreachable!("push guarantees a last element"))
    }

    /// Wholesale replacement; the backend is the source of truth for the
    /// cart, so no merging or diffing happens here.
    pub(crate) fn replace_order(&mut self, items: Vec<OrderItem>) {
        self.order = items;
    }

    pub(crate) fn set_tool_status(&mut self, status: ToolStatus) {
        self.tool_status = status;
    }

    pub(crate) fn set_connection(&mut self, state: RealtimeConnectionState) {
        self.connection = state;
    }

    /// Records a partial transcription segment; a later partial supersedes
    /// an earlier one for the same utterance.
    pub(crate) fn set_live_transcription(&mut self, text: String) {
        self.live_transcription = Some(text);
    }

    /// Promotes the utterance to a timeline entry and clears the live bubble.
    pub(crate) fn finalize_transcription(&mut self, text: String) {
        self.live_transcription = None;
        self.append(NewMessage::transcription(text));
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            domain: self.domain,
            timeline: self.messages.clone(),
            order: self.order.clone(),
            tool_status: self.tool_status.clone(),
            connection: self.connection,
            live_transcription: self.live_transcription.clone(),
        }
    }
}
