//! The per-domain session actor.
//!
//! One `AgentSession` exists per agent domain. Three independently-clocked
//! producers (realtime provider callbacks, the question poll loop, and the
//! tool-status poll loop) send tagged events into one mailbox; a single
//! consumer task drains them into the timeline, so appends are serialized
//! without any locking and the timeline never observes interleaved writes.
//! Readers observe the session through a `watch` snapshot and are never
//! blocked behind the writer.

use crate::connection::RealtimeConnectionState;
use crate::domain::AgentDomain;
use crate::message::{NewMessage, OrderItem, ToolStatus};
use crate::timeline::{SessionSnapshot, Timeline};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Mailbox capacity. Producers suspend (back-pressure) rather than drop
/// events if the consumer falls behind.
const MAILBOX_CAPACITY: usize = 128;

/// A tagged event from one of the session's three producers.
#[derive(Debug)]
pub enum SessionEvent {
    /// Append a finished message to the timeline.
    Message(NewMessage),
    /// A transcription segment from the voice channel. Partials supersede
    /// one another; the final is appended as a timeline entry.
    TranscriptionSegment { text: String, is_final: bool },
    /// Wholesale replacement of the current tool activity.
    ToolStatus(ToolStatus),
    /// Wholesale replacement of the order snapshot.
    OrderUpdate(Vec<OrderItem>),
    /// Realtime connection state transition (including provider-reported
    /// sub-states passed through unmodified).
    ConnectionState(RealtimeConnectionState),
    /// Local audio capture could not be acquired. Terminal for the connect
    /// attempt; surfaced in the timeline so the user can retry manually.
    DeviceFailure(String),
}

/// Handle to a running session: the mailbox sender for producers and the
/// snapshot receiver for readers.
pub struct AgentSession {
    domain: AgentDomain,
    events: mpsc::Sender<SessionEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
    consumer: JoinHandle<()>,
}

impl AgentSession {
    /// Starts a fresh session for `domain` and spawns its consumer task.
    pub fn start(domain: AgentDomain) -> Self {
        let (events, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let timeline = Timeline::new(domain);
        let (snapshot_tx, snapshot_rx) = watch::channel(timeline.snapshot());
        let cancel = CancellationToken::new();

        let consumer = tokio::spawn(run_consumer(
            domain,
            timeline,
            mailbox,
            snapshot_tx,
            cancel.clone(),
        ));
        info!(%domain, "Session started");

        Self {
            domain,
            events,
            snapshot_rx,
            cancel,
            consumer,
        }
    }

    pub fn domain(&self) -> AgentDomain {
        self.domain
    }

    /// A sender producers use to feed the mailbox. Cheap to clone.
    pub fn sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events.clone()
    }

    /// The current state. Last write wins and is visible immediately;
    /// reading never blocks the consumer.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver that can be awaited for snapshot changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Tears the session down. Once this returns, the consumer has stopped
    /// and no further timeline appends can occur.
    pub async fn end(self) {
        self.cancel.cancel();
        drop(self.events);
        if let Err(e) = self.consumer.await {
            warn!(domain = %self.domain, error = ?e, "Session consumer ended abnormally");
        }
        info!(domain = %self.domain, "Session ended");
    }
}

async fn run_consumer(
    domain: AgentDomain,
    mut timeline: Timeline,
    mut mailbox: mpsc::Receiver<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = mailbox.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        apply(domain, &mut timeline, event);
        // Readers only ever see fully-applied events.
        let _ = snapshot_tx.send(timeline.snapshot());
    }
    debug!(%domain, "Session consumer stopped");
}

fn apply(domain: AgentDomain, timeline: &mut Timeline, event: SessionEvent) {
    match event {
        SessionEvent::Message(message) => {
            let appended = timeline.append(message);
            debug!(%domain, speaker = %appended.speaker, id = %appended.id, "Appended message");
        }
        SessionEvent::TranscriptionSegment { text, is_final } => {
            if is_final {
                timeline.finalize_transcription(text);
            } else {
                timeline.set_live_transcription(text);
            }
        }
        SessionEvent::ToolStatus(status) => timeline.set_tool_status(status),
        SessionEvent::OrderUpdate(items) => timeline.replace_order(items),
        SessionEvent::ConnectionState(state) => {
            debug!(%domain, ?state, "Connection state changed");
            timeline.set_connection(state);
        }
        SessionEvent::DeviceFailure(detail) => {
            warn!(%domain, %detail, "Local audio capture failed");
            let mut metadata = Map::new();
            metadata.insert("error".to_string(), Value::String(detail));
            timeline.append(
                NewMessage::new(
                    crate::message::Speaker::VoiceAgent,
                    crate::message::MessageKind::Response,
                    "Error acquiring microphone permissions. Please grant access and try again.",
                )
                .with_metadata(metadata),
            );
            timeline.set_connection(RealtimeConnectionState::Disconnected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Speaker;
    use std::time::Duration;

    async fn settled(session: &AgentSession, predicate: impl Fn(&SessionSnapshot) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        let mut rx = session.watch();
        loop {
            if predicate(&rx.borrow()) {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("snapshot never reached the expected state");
            }
            let _ = tokio::time::timeout(Duration::from_millis(50), rx.changed()).await;
        }
    }

    #[tokio::test]
    async fn events_are_applied_in_send_order() {
        let session = AgentSession::start(AgentDomain::Restaurant);
        let tx = session.sender();
        for i in 0..10 {
            tx.send(SessionEvent::Message(NewMessage::user_reply(format!(
                "reply {i}"
            ))))
            .await
            .unwrap();
        }

        settled(&session, |s| s.timeline.len() == 10).await;
        let snapshot = session.snapshot();
        for (i, message) in snapshot.timeline.iter().enumerate() {
            assert_eq!(message.content, format!("reply {i}"));
        }
        session.end().await;
    }

    #[tokio::test]
    async fn transcription_partials_then_final() {
        let session = AgentSession::start(AgentDomain::Shopping);
        let tx = session.sender();
        tx.send(SessionEvent::TranscriptionSegment {
            text: "add two".into(),
            is_final: false,
        })
        .await
        .unwrap();
        tx.send(SessionEvent::TranscriptionSegment {
            text: "add two bags of rice".into(),
            is_final: true,
        })
        .await
        .unwrap();

        settled(&session, |s| s.timeline.len() == 1).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.live_transcription, None);
        assert_eq!(snapshot.timeline[0].speaker, Speaker::VoiceAgent);
        assert_eq!(snapshot.timeline[0].content, "add two bags of rice");
        session.end().await;
    }

    #[tokio::test]
    async fn device_failure_is_surfaced_and_disconnects() {
        let session = AgentSession::start(AgentDomain::Restaurant);
        session
            .sender()
            .send(SessionEvent::ConnectionState(
                RealtimeConnectionState::Connecting,
            ))
            .await
            .unwrap();
        session
            .sender()
            .send(SessionEvent::DeviceFailure("permission denied".into()))
            .await
            .unwrap();

        settled(&session, |s| s.timeline.len() == 1).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.connection, RealtimeConnectionState::Disconnected);
        assert!(snapshot.timeline[0].content.contains("microphone"));
        assert_eq!(
            snapshot.timeline[0]
                .metadata
                .get("error")
                .and_then(|v| v.as_str()),
            Some("permission denied")
        );
        session.end().await;
    }

    #[tokio::test]
    async fn ended_session_accepts_no_more_events() {
        let session = AgentSession::start(AgentDomain::Shopping);
        let tx = session.sender();
        tx.send(SessionEvent::Message(NewMessage::user_reply("hello")))
            .await
            .unwrap();
        settled(&session, |s| s.timeline.len() == 1).await;
        session.end().await;

        // The consumer is gone and the mailbox with it, so a late send
        // fails rather than queueing silently.
        assert!(
            tx.send(SessionEvent::Message(NewMessage::user_reply("late")))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn sessions_for_different_domains_are_isolated() {
        let restaurant = AgentSession::start(AgentDomain::Restaurant);
        let shopping = AgentSession::start(AgentDomain::Shopping);

        let (rtx, stx) = (restaurant.sender(), shopping.sender());
        let writes = tokio::join!(
            async {
                for _ in 0..25 {
                    rtx.send(SessionEvent::Message(NewMessage::interface_response(
                        "table for two?",
                    )))
                    .await
                    .unwrap();
                }
            },
            async {
                for _ in 0..25 {
                    stx.send(SessionEvent::Message(NewMessage::interface_response(
                        "paper or plastic?",
                    )))
                    .await
                    .unwrap();
                }
            }
        );
        let _ = writes;

        settled(&restaurant, |s| s.timeline.len() == 25).await;
        settled(&shopping, |s| s.timeline.len() == 25).await;

        assert!(
            restaurant
                .snapshot()
                .timeline
                .iter()
                .all(|m| m.domain == AgentDomain::Restaurant && m.content == "table for two?")
        );
        assert!(
            shopping
                .snapshot()
                .timeline
                .iter()
                .all(|m| m.domain == AgentDomain::Shopping && m.content == "paper or plastic?")
        );

        restaurant.end().await;
        shopping.end().await;
    }
}
