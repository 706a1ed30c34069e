//! Realtime voice connection lifecycle, one manager per domain.
//!
//! The audio transport itself is an external collaborator reached through
//! the [`RealtimeProvider`] trait: connect with a credential, publish the
//! local microphone, observe room events, disconnect. The manager owns the
//! `disconnected -> connecting -> connected` state machine, issues the
//! session credential, and marshals provider callbacks (which may arrive
//! on any task) into the session mailbox so the timeline only ever sees
//! serialized appends.

pub mod signal;

use async_trait::async_trait;
use duet_access::{ConfigError, CredentialIssuer, SessionCredential};
use duet_core::{AgentDomain, OrderItem, RealtimeConnectionState, SessionEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// An event observed on the realtime room, forwarded by the provider.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// Provider-reported state change; sub-states of `connected` (listening,
    /// speaking, thinking) pass through unmodified.
    StateChanged(RealtimeConnectionState),
    /// An incremental transcription segment. Partials may be superseded by
    /// a later final for the same utterance.
    Transcription { text: String, is_final: bool },
    /// Cart contents published on the room's data channel.
    OrderUpdate(Vec<OrderItem>),
    /// The provider closed the connection (drop, room end, token expiry).
    Closed { reason: Option<String> },
}

/// The realtime connection dropped or could not be established.
#[derive(Debug, thiserror::Error)]
#[error("Realtime connection failed: {0}")]
pub struct ProviderError(pub String);

/// Local audio capture could not be acquired. Terminal for the connect
/// attempt; the user must retry explicitly.
#[derive(Debug, thiserror::Error)]
#[error("Could not acquire local audio: {0}")]
pub struct DeviceError(pub String);

/// Why a connect attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Credential configuration is unresolved; fatal for the session.
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("Connect is only valid while disconnected")]
    AlreadyConnected,
}

/// The connect/publish/subscribe primitives of the audio transport.
#[async_trait]
pub trait RealtimeProvider: Send + Sync {
    /// Opens a connection to the room named by `credential`, delivering
    /// room events on `events` until the connection ends.
    async fn connect(
        &self,
        credential: &SessionCredential,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<Box<dyn RealtimeConnection>, ProviderError>;
}

/// One live provider connection.
#[async_trait]
pub trait RealtimeConnection: Send + Sync {
    /// Enables local audio publishing into the room.
    async fn publish_microphone(&mut self) -> Result<(), DeviceError>;
    /// Tears the connection down. Must be safe to call more than once.
    async fn disconnect(&mut self);
}

/// Owns one domain's realtime connection lifecycle.
pub struct RealtimeSessionManager {
    domain: AgentDomain,
    issuer: Arc<CredentialIssuer>,
    provider: Arc<dyn RealtimeProvider>,
    events: mpsc::Sender<SessionEvent>,
    /// Bound on the provider connect attempt, so a stalled room server
    /// cannot wedge the session lifecycle.
    connect_timeout: Duration,
    /// Mirror of the connection state for gating `connect()`; the
    /// session's own copy is updated through the mailbox.
    state: Arc<Mutex<RealtimeConnectionState>>,
    connection: Option<Box<dyn RealtimeConnection>>,
    forwarder: Option<JoinHandle<()>>,
}

impl RealtimeSessionManager {
    pub fn new(
        domain: AgentDomain,
        issuer: Arc<CredentialIssuer>,
        provider: Arc<dyn RealtimeProvider>,
        events: mpsc::Sender<SessionEvent>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            domain,
            issuer,
            provider,
            events,
            connect_timeout,
            state: Arc::new(Mutex::new(RealtimeConnectionState::Disconnected)),
            connection: None,
            forwarder: None,
        }
    }

    pub fn state(&self) -> RealtimeConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn transition(&self, state: RealtimeConnectionState) {
        set_shared_state(&self.state, state);
        let _ = self.events.send(SessionEvent::ConnectionState(state)).await;
    }

    /// Starts a realtime session: issues a credential, opens the provider
    /// connection, and enables microphone publishing.
    ///
    /// Valid only while disconnected. A configuration failure is fatal for
    /// the session; a microphone failure is surfaced as a `DeviceFailure`
    /// timeline event and ends the attempt without automatic retry. The
    /// provider connect attempt is bounded by `connect_timeout`; expiry is
    /// a [`ProviderError`].
    #[instrument(skip(self), fields(domain = %self.domain))]
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        if self.state() != RealtimeConnectionState::Disconnected {
            return Err(ConnectError::AlreadyConnected);
        }
        // A provider-initiated close leaves the previous connection box
        // behind; tear it down before opening a new one.
        if let Some(mut stale) = self.connection.take() {
            stale.disconnect().await;
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
            let _ = forwarder.await;
        }
        self.transition(RealtimeConnectionState::Connecting).await;

        let credential = match self.issuer.issue(self.domain) {
            Ok(credential) => credential,
            Err(e) => {
                self.transition(RealtimeConnectionState::Disconnected).await;
                return Err(e.into());
            }
        };

        let (provider_tx, provider_rx) = mpsc::channel(64);
        let attempt = self.provider.connect(&credential, provider_tx);
        let mut connection = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                warn!(error = %e, "Provider connect failed");
                self.transition(RealtimeConnectionState::Disconnected).await;
                return Err(e.into());
            }
            Err(_) => {
                warn!(timeout = ?self.connect_timeout, "Provider connect timed out");
                self.transition(RealtimeConnectionState::Disconnected).await;
                return Err(ProviderError(format!(
                    "connect timed out after {:?}",
                    self.connect_timeout
                ))
                .into());
            }
        };

        if let Err(e) = connection.publish_microphone().await {
            connection.disconnect().await;
            let _ = self
                .events
                .send(SessionEvent::DeviceFailure(e.to_string()))
                .await;
            set_shared_state(&self.state, RealtimeConnectionState::Disconnected);
            return Err(e.into());
        }

        self.transition(RealtimeConnectionState::Connected).await;
        info!(room = %credential.room_name, "Realtime session connected");

        self.forwarder = Some(tokio::spawn(forward_provider_events(
            self.domain,
            provider_rx,
            self.events.clone(),
            self.state.clone(),
        )));
        self.connection = Some(connection);
        Ok(())
    }

    /// Tears down the connection and audio publishing. Idempotent: calling
    /// while already disconnected does nothing.
    #[instrument(skip(self), fields(domain = %self.domain))]
    pub async fn disconnect(&mut self) {
        let was_connected = self.connection.is_some();
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect().await;
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
            let _ = forwarder.await;
        }
        if was_connected || self.state() != RealtimeConnectionState::Disconnected {
            self.transition(RealtimeConnectionState::Disconnected).await;
            info!("Realtime session disconnected");
        }
    }
}

fn set_shared_state(state: &Arc<Mutex<RealtimeConnectionState>>, value: RealtimeConnectionState) {
    *state.lock().unwrap_or_else(|e| e.into_inner()) = value;
}

/// Drains provider callbacks into the session mailbox. Runs until the
/// provider closes the stream or the manager disconnects.
async fn forward_provider_events(
    domain: AgentDomain,
    mut provider_rx: mpsc::Receiver<ProviderEvent>,
    events: mpsc::Sender<SessionEvent>,
    state: Arc<Mutex<RealtimeConnectionState>>,
) {
    while let Some(event) = provider_rx.recv().await {
        let forwarded = match event {
            ProviderEvent::StateChanged(new_state) => {
                set_shared_state(&state, new_state);
                events.send(SessionEvent::ConnectionState(new_state)).await
            }
            ProviderEvent::Transcription { text, is_final } => {
                events
                    .send(SessionEvent::TranscriptionSegment { text, is_final })
                    .await
            }
            ProviderEvent::OrderUpdate(items) => {
                events.send(SessionEvent::OrderUpdate(items)).await
            }
            ProviderEvent::Closed { reason } => {
                debug!(%domain, ?reason, "Provider closed the realtime connection");
                set_shared_state(&state, RealtimeConnectionState::Disconnected);
                let _ = events
                    .send(SessionEvent::ConnectionState(
                        RealtimeConnectionState::Disconnected,
                    ))
                    .await;
                break;
            }
        };
        if forwarded.is_err() {
            break;
        }
    }
}
