//! Duet Core Library
//!
//! Domain model and session state for the dual-agent concierge: the two
//! agent domains, the conversation timeline with its single serialized
//! append point, and the per-domain session actor that merges events from
//! the realtime voice channel and the text channel bridge.

pub mod connection;
pub mod domain;
pub mod message;
pub mod session;
pub mod timeline;

pub use connection::RealtimeConnectionState;
pub use domain::{AgentDomain, UnknownDomain};
pub use message::{ConversationMessage, MessageKind, NewMessage, OrderItem, Speaker, ToolStatus};
pub use session::{AgentSession, SessionEvent};
pub use timeline::SessionSnapshot;
