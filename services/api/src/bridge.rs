//! The text channel bridge: two long-poll loops per domain against the
//! agent backend, plus outgoing reply submission.
//!
//! The loops are deliberately simple retry-forever tasks with a fixed
//! inter-cycle delay; the backend exposes no push subscription, so
//! polling is the only option. A failed cycle never terminates a loop; only explicit
//! cancellation does, and cancellation also interrupts in-flight waits so
//! no event reaches the session mailbox after [`BridgeHandle::stop`]
//! returns.

use duet_core::{AgentDomain, NewMessage, SessionEvent, ToolStatus};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// A network or HTTP-status failure talking to the agent backend.
///
/// Poll loops log these and continue; reply submission surfaces them to
/// the caller, which synthesizes a timeline notice instead of retrying.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request to agent backend failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Agent backend returned HTTP {0}")]
    Status(u16),
}

#[derive(Deserialize)]
struct QuestionBody {
    question: String,
}

/// One domain's connection to its text-channel backend.
#[derive(Clone)]
pub struct TextChannelBridge {
    domain: AgentDomain,
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

/// Handles to a bridge's two running poll loops.
pub struct BridgeHandle {
    cancel: CancellationToken,
    question_loop: JoinHandle<()>,
    status_loop: JoinHandle<()>,
}

impl BridgeHandle {
    /// Cancels both loops and waits for them to finish. In-flight waits are
    /// interrupted promptly; once this returns, the loops can no longer
    /// append to the session.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.question_loop.await;
        let _ = self.status_loop.await;
    }
}

impl TextChannelBridge {
    /// `http_timeout` bounds every request so a stalled backend cannot
    /// wedge a loop; a timeout is treated like any other transport error.
    pub fn new(
        domain: AgentDomain,
        base_url: impl Into<String>,
        poll_interval: Duration,
        http_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            domain,
            client,
            base_url: base_url.into(),
            poll_interval,
        })
    }

    /// Starts the question and tool-status loops, feeding `events`.
    pub fn start(&self, events: mpsc::Sender<SessionEvent>) -> BridgeHandle {
        let cancel = CancellationToken::new();
        info!(domain = %self.domain, backend = %self.base_url, "Starting text channel bridge");

        let question_loop = tokio::spawn(question_loop(
            self.clone(),
            events.clone(),
            cancel.clone(),
        ));
        let status_loop = tokio::spawn(tool_status_loop(self.clone(), events, cancel.clone()));

        BridgeHandle {
            cancel,
            question_loop,
            status_loop,
        }
    }

    /// Posts the user's typed text to the backend.
    ///
    /// Non-success statuses are an error; the caller appends a synthesized
    /// timeline notice and leaves resending to the user.
    pub async fn send_reply(&self, text: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/agent/response", self.base_url))
            .json(&serde_json::json!({ "response": text }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn poll_question(&self) -> Result<Option<String>, TransportError> {
        let response = self
            .client
            .get(format!("{}/agent/question", self.base_url))
            .send()
            .await?;
        match response.status() {
            reqwest::StatusCode::OK => {
                let body: QuestionBody = response.json().await?;
                Ok(Some(body.question))
            }
            reqwest::StatusCode::NO_CONTENT => Ok(None),
            other => Err(TransportError::Status(other.as_u16())),
        }
    }

    async fn poll_tool_status(&self) -> Result<ToolStatus, TransportError> {
        let response = self
            .client
            .get(format!("{}/agent/tool-status", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

/// Repeatedly asks the backend for a pending agent question. A `200`
/// yields one interface-agent message; a `204` means nothing is pending;
/// everything else is "no question this cycle".
#[instrument(name = "question_loop", skip_all, fields(domain = %bridge.domain))]
async fn question_loop(
    bridge: TextChannelBridge,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = bridge.poll_question() => outcome,
        };
        match outcome {
            Ok(Some(question)) => {
                if events
                    .send(SessionEvent::Message(NewMessage::interface_response(
                        question,
                    )))
                    .await
                    .is_err()
                {
                    // Session mailbox closed; nothing left to feed.
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Question poll failed; retrying next cycle"),
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(bridge.poll_interval) => {}
        }
    }
    debug!("Question loop stopped");
}

/// Repeatedly fetches the current tool activity and replaces the session's
/// view of it wholesale. Same cadence and error policy as the question loop.
#[instrument(name = "tool_status_loop", skip_all, fields(domain = %bridge.domain))]
async fn tool_status_loop(
    bridge: TextChannelBridge,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = bridge.poll_tool_status() => outcome,
        };
        match outcome {
            Ok(status) => {
                if events.send(SessionEvent::ToolStatus(status)).await.is_err() {
                    break;
                }
            }
            Err(e) => debug!(error = %e, "Tool status poll failed; retrying next cycle"),
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(bridge.poll_interval) => {}
        }
    }
    debug!("Tool status loop stopped");
}
