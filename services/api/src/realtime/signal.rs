//! Default realtime provider: the room server's signal WebSocket.
//!
//! This provider joins the room over the signalling socket and relays the
//! JSON room events the voice agent publishes (assistant state,
//! transcription segments, order updates). Media capture and playback are
//! negotiated out of band by the room server once the microphone track is
//! announced; this core never touches audio frames.

use super::{DeviceError, ProviderError, ProviderEvent, RealtimeConnection, RealtimeProvider};
use async_trait::async_trait;
use duet_access::SessionCredential;
use duet_core::{OrderItem, RealtimeConnectionState};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<TcpStream>>,
    WsMessage,
>;

/// Room events as the voice agent publishes them on the data channel.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SignalEvent {
    AgentState {
        state: String,
    },
    Transcription {
        text: String,
        #[serde(default)]
        is_final: bool,
    },
    OrderUpdate {
        items: Vec<OrderItem>,
    },
}

/// Connects to `{serverUrl}/rtc` with the credential's access token.
#[derive(Debug, Default)]
pub struct SignalProvider;

#[async_trait]
impl RealtimeProvider for SignalProvider {
    async fn connect(
        &self,
        credential: &SessionCredential,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<Box<dyn RealtimeConnection>, ProviderError> {
        let url = format!(
            "{}/rtc?access_token={}&auto_subscribe=1",
            credential.server_url, credential.token
        );
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ProviderError(e.to_string()))?;
        info!(room = %credential.room_name, "Joined realtime room");

        let (sink, source) = stream.split();
        let reader = tokio::spawn(read_room_events(source, events));
        Ok(Box::new(SignalConnection { sink, reader }))
    }
}

struct SignalConnection {
    sink: WsSink,
    reader: JoinHandle<()>,
}

#[async_trait]
impl RealtimeConnection for SignalConnection {
    async fn publish_microphone(&mut self) -> Result<(), DeviceError> {
        let announce = serde_json::json!({
            "type": "add_track",
            "kind": "audio",
            "source": "microphone",
        });
        self.sink
            .send(WsMessage::Text(announce.to_string().into()))
            .await
            .map_err(|e| DeviceError(e.to_string()))
    }

    async fn disconnect(&mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
        self.reader.abort();
        let _ = (&mut self.reader).await;
    }
}

async fn read_room_events(
    mut source: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    events: mpsc::Sender<ProviderEvent>,
) {
    loop {
        let message = match source.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(error = %e, "Signal socket error");
                let _ = events
                    .send(ProviderEvent::Closed {
                        reason: Some(e.to_string()),
                    })
                    .await;
                return;
            }
            None => {
                let _ = events.send(ProviderEvent::Closed { reason: None }).await;
                return;
            }
        };
        let WsMessage::Text(text) = message else {
            continue;
        };
        let event = match serde_json::from_str::<SignalEvent>(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                // Backend-owned messages this core does not consume.
                debug!(error = %e, "Ignoring unrecognized room event");
                continue;
            }
        };
        let forwarded = match event {
            SignalEvent::AgentState { state } => events
                .send(ProviderEvent::StateChanged(
                    RealtimeConnectionState::from_provider(&state),
                ))
                .await,
            SignalEvent::Transcription { text, is_final } => {
                events
                    .send(ProviderEvent::Transcription { text, is_final })
                    .await
            }
            SignalEvent::OrderUpdate { items } => {
                events.send(ProviderEvent::OrderUpdate(items)).await
            }
        };
        if forwarded.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_events_deserialize() {
        let state: SignalEvent =
            serde_json::from_str(r#"{"type":"agent_state","state":"speaking"}"#).unwrap();
        assert!(matches!(state, SignalEvent::AgentState { state } if state == "speaking"));

        let partial: SignalEvent =
            serde_json::from_str(r#"{"type":"transcription","text":"hel"}"#).unwrap();
        assert!(
            matches!(partial, SignalEvent::Transcription { is_final: false, text } if text == "hel")
        );

        let order: SignalEvent = serde_json::from_str(
            r#"{"type":"order_update","items":[{"id":"1","name":"Milk","quantity":1,"price":2.5}]}"#,
        )
        .unwrap();
        assert!(matches!(order, SignalEvent::OrderUpdate { items } if items.len() == 1));
    }

    #[test]
    fn unknown_room_events_are_rejected_by_the_parser() {
        assert!(serde_json::from_str::<SignalEvent>(r#"{"type":"sip_dtmf"}"#).is_err());
    }
}
