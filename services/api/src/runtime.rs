//! Wires one domain's session actor, text channel bridge, and realtime
//! manager together, with explicit construction and teardown so multiple
//! runtimes (one per domain, or several under test) never interfere.

use crate::bridge::{BridgeHandle, TextChannelBridge, TransportError};
use crate::config::Config;
use crate::realtime::{RealtimeProvider, RealtimeSessionManager};
use duet_access::CredentialIssuer;
use duet_core::{AgentDomain, AgentSession, NewMessage, SessionSnapshot};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// Everything alive for one agent domain.
pub struct DomainRuntime {
    session: AgentSession,
    bridge: TextChannelBridge,
    bridge_handle: Mutex<Option<BridgeHandle>>,
    manager: Mutex<RealtimeSessionManager>,
}

impl DomainRuntime {
    /// Starts the session actor and both poll loops for `domain`.
    pub fn start(
        domain: AgentDomain,
        config: &Config,
        issuer: Arc<CredentialIssuer>,
        provider: Arc<dyn RealtimeProvider>,
    ) -> Result<Self, reqwest::Error> {
        let session = AgentSession::start(domain);
        let bridge = TextChannelBridge::new(
            domain,
            config.backend_url(domain),
            config.poll_interval,
            config.http_timeout,
        )?;
        let bridge_handle = bridge.start(session.sender());
        let manager = RealtimeSessionManager::new(
            domain,
            issuer,
            provider,
            session.sender(),
            config.http_timeout,
        );
        Ok(Self {
            session,
            bridge,
            bridge_handle: Mutex::new(Some(bridge_handle)),
            manager: Mutex::new(manager),
        })
    }

    pub fn domain(&self) -> AgentDomain {
        self.session.domain()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn manager(&self) -> &Mutex<RealtimeSessionManager> {
        &self.manager
    }

    /// Appends the user's reply to the timeline, then submits it to the
    /// backend. On failure a synthesized notice is appended and the error
    /// is returned; the user resends manually, there is no retry.
    #[instrument(skip(self, text), fields(domain = %self.domain()))]
    pub async fn submit_reply(&self, text: &str) -> Result<(), TransportError> {
        let events = self.session.sender();
        let _ = events
            .send(duet_core::SessionEvent::Message(NewMessage::user_reply(
                text,
            )))
            .await;

        match self.bridge.send_reply(text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = events
                    .send(duet_core::SessionEvent::Message(
                        NewMessage::interface_response(
                            "Error: Could not send response to the agent. Please try again.",
                        ),
                    ))
                    .await;
                Err(e)
            }
        }
    }

    /// Stops the poll loops, tears down the realtime connection, then ends
    /// the session. Once this returns nothing can append to the timeline.
    pub async fn stop(self) {
        if let Some(handle) = self.bridge_handle.lock().await.take() {
            handle.stop().await;
        }
        self.manager.lock().await.disconnect().await;
        info!(domain = %self.session.domain(), "Domain runtime stopped");
        self.session.end().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{
        DeviceError, ProviderError, ProviderEvent, RealtimeConnection, RealtimeProvider,
    };
    use async_trait::async_trait;
    use duet_access::{AccessConfig, RealtimeEndpoint, SessionCredential};
    use duet_core::{MessageKind, Speaker};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct InertProvider;

    #[async_trait]
    impl RealtimeProvider for InertProvider {
        async fn connect(
            &self,
            _credential: &SessionCredential,
            _events: mpsc::Sender<ProviderEvent>,
        ) -> Result<Box<dyn RealtimeConnection>, ProviderError> {
            Ok(Box::new(InertConnection))
        }
    }

    struct InertConnection;

    #[async_trait]
    impl RealtimeConnection for InertConnection {
        async fn publish_microphone(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        async fn disconnect(&mut self) {}
    }

    fn test_config(backend: &str) -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            restaurant_backend: backend.to_string(),
            shopping_backend: backend.to_string(),
            poll_interval: Duration::from_millis(20),
            http_timeout: Duration::from_millis(500),
            log_level: tracing::Level::INFO,
            access: AccessConfig {
                shared: RealtimeEndpoint {
                    url: Some("wss://rooms.example".to_string()),
                    api_key: Some("key".to_string()),
                    api_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
                },
                ..Default::default()
            },
        }
    }

    async fn quiet_backend() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agent/question"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/agent/tool-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tool_name": "", "status": "idle", "details": {}
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn failed_reply_synthesizes_exactly_one_error_message() {
        let server = quiet_backend().await;
        Mock::given(method("POST"))
            .and(path("/agent/response"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let issuer = Arc::new(CredentialIssuer::new(config.access.clone()));
        let runtime = DomainRuntime::start(
            AgentDomain::Shopping,
            &config,
            issuer,
            Arc::new(InertProvider),
        )
        .unwrap();

        let err = runtime.submit_reply("hello").await.unwrap_err();
        assert!(matches!(err, TransportError::Status(500)));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = runtime.snapshot();
        let user_messages: Vec<_> = snapshot
            .timeline
            .iter()
            .filter(|m| m.speaker == Speaker::User)
            .collect();
        let synthesized: Vec<_> = snapshot
            .timeline
            .iter()
            .filter(|m| m.speaker == Speaker::InterfaceAgent && m.content.starts_with("Error:"))
            .collect();
        assert_eq!(user_messages.len(), 1);
        assert_eq!(user_messages[0].content, "hello");
        assert_eq!(synthesized.len(), 1);
        assert_eq!(synthesized[0].kind, MessageKind::Response);

        runtime.stop().await;
    }

    #[tokio::test]
    async fn successful_reply_appends_only_the_user_message() {
        let server = quiet_backend().await;
        Mock::given(method("POST"))
            .and(path("/agent/response"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok"
            })))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let issuer = Arc::new(CredentialIssuer::new(config.access.clone()));
        let runtime = DomainRuntime::start(
            AgentDomain::Restaurant,
            &config,
            issuer,
            Arc::new(InertProvider),
        )
        .unwrap();

        runtime.submit_reply("a corner table").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = runtime.snapshot();
        assert_eq!(
            snapshot
                .timeline
                .iter()
                .filter(|m| m.speaker == Speaker::User)
                .count(),
            1
        );
        assert!(
            !snapshot
                .timeline
                .iter()
                .any(|m| m.content.starts_with("Error:"))
        );

        runtime.stop().await;
    }

    #[tokio::test]
    async fn stop_prevents_any_further_appends() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agent/question"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "question": "Still shopping?"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/agent/tool-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tool_name": "noisy", "status": "running", "details": {}
            })))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let issuer = Arc::new(CredentialIssuer::new(config.access.clone()));
        let runtime = DomainRuntime::start(
            AgentDomain::Shopping,
            &config,
            issuer,
            Arc::new(InertProvider),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let snapshot_before_stop = runtime.snapshot();
        assert!(!snapshot_before_stop.timeline.is_empty());
        runtime.stop().await;
        // The backend keeps answering, but the runtime is gone; nothing is
        // left that could append.
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
}
