//! The single long-lived subscription to the orchestrator's event stream.
//!
//! Reconnect policy deliberately lives outside this process: a lost
//! connection surfaces as an error, main exits nonzero and the supervisor
//! restarts us with a fresh bootstrap regeneration.

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};

use crate::directory::model::State;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("unable to reach the event stream: {0}")]
    Connect(#[from] tungstenite::Error),
    #[error("event stream connection lost")]
    ConnectionLost,
}

/// One lifecycle transition notification for a service. Consumed once by the
/// coalescer and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    pub uuid: String,
    pub state: State,
}

/// Raw stream message envelope. Only `type == "service"` messages with a
/// uuid and state become events; everything else is dropped without error.
#[derive(Debug, serde::Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    uuid: Option<String>,
    state: Option<State>,
}

pub struct EventStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EventStream {
    pub async fn connect(url: &str) -> Result<Self, StreamError> {
        log::info!("Connecting to the event stream");
        let (inner, _) = connect_async(url).await?;
        log::info!("Event stream connected");
        Ok(Self { inner })
    }

    /// Next service lifecycle event. Messages that are not service
    /// transitions are consumed and dropped here so the caller only ever
    /// sees events worth coalescing.
    pub async fn next_event(&mut self) -> Result<ServiceEvent, StreamError> {
        loop {
            let message = match self.inner.next().await {
                Some(Ok(message)) => message,
                Some(Err(err)) => {
                    log::error!("Event stream error: {err}");
                    return Err(StreamError::ConnectionLost);
                }
                None => return Err(StreamError::ConnectionLost),
            };

            let text = match message {
                tungstenite::Message::Text(text) => text,
                tungstenite::Message::Close(_) => return Err(StreamError::ConnectionLost),
                // Pings are answered by tungstenite itself.
                _ => continue,
            };

            if let Some(event) = parse_event(&text) {
                return Ok(event);
            }
        }
    }
}

fn parse_event(raw: &str) -> Option<ServiceEvent> {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            log::debug!("Ignoring undecodable stream message: {err}");
            return None;
        }
    };
    if envelope.kind != "service" {
        return None;
    }
    let uuid = envelope.uuid?;
    let state = envelope.state?;
    Some(ServiceEvent { uuid, state })
}
