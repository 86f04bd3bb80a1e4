/// Real-time transport contract and the WebSocket implementation
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::message::ChatMessage;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

/// Connection state of the real-time channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Initial connection attempt in progress
    Connecting,
    /// Fully connected, messages flowing
    Connected,
    /// Transient loss; the transport is retrying on its own
    Reconnecting,
    /// Explicit teardown in progress
    Disconnecting,
}

/// Events a transport surfaces to its consumer
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The server pushed a new chat message
    MessageReceived(ChatMessage),
    /// The connection dropped unexpectedly
    Closed,
}

/// Wire envelope pushed by the server over the channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChannelFrame {
    MessageReceived { message: ChatMessage },
}

/// Contract a real-time transport must satisfy.
///
/// Reconnection backoff and retry scheduling after an established
/// connection drops are the transport's own policy; consumers only react
/// to the resulting state transitions and events.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Begin the initial connection; resolves once it succeeds or fails.
    /// A transport that connected once keeps itself alive afterwards.
    async fn start(&self) -> Result<()>;

    /// Tear the connection down. Passes through `Disconnecting` and ends
    /// in `Disconnected`.
    async fn stop(&self);

    async fn state(&self) -> ConnectionState;

    /// Subscribe to pushed events. May be called before `start`.
    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket transport with internal reconnection.
///
/// After the initial connect succeeds the channel task keeps itself alive:
/// on loss it moves to `Reconnecting` and retries at a fixed interval up
/// to the attempt budget, then settles in `Disconnected`.
pub struct WsTransport {
    url: String,
    retry_interval: Duration,
    max_reconnect_attempts: u32,
    state: Arc<RwLock<ConnectionState>>,
    events: broadcast::Sender<ChannelEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new(config: &Config) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            url: config.realtime_url.clone(),
            retry_interval: config.retry_interval,
            max_reconnect_attempts: config.max_reconnect_attempts,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            events,
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn start(&self) -> Result<()> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws = match tokio_tungstenite::connect_async(&self.url).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ChatError::Channel(format!(
                    "connect to {}: {}",
                    self.url, e
                )));
            }
        };

        *self.state.write().await = ConnectionState::Connected;
        info!("Real-time channel connected to {}", self.url);

        let url = self.url.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        let retry_interval = self.retry_interval;
        let max_attempts = self.max_reconnect_attempts;
        let handle = tokio::spawn(async move {
            run_channel(ws, url, state, events, retry_interval, max_attempts).await;
        });
        *self.task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        *self.state.write().await = ConnectionState::Disconnecting;
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        *self.state.write().await = ConnectionState::Disconnected;
        debug!("Real-time channel stopped");
    }

    async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

/// Drive an established connection, reconnecting on loss until the attempt
/// budget runs out.
async fn run_channel(
    mut ws: WsStream,
    url: String,
    state: Arc<RwLock<ConnectionState>>,
    events: broadcast::Sender<ChannelEvent>,
    retry_interval: Duration,
    max_attempts: u32,
) {
    loop {
        read_until_closed(&mut ws, &events).await;

        *state.write().await = ConnectionState::Reconnecting;
        let _ = events.send(ChannelEvent::Closed);
        warn!("Real-time channel closed, reconnecting");

        let mut attempts = 0u32;
        loop {
            if attempts >= max_attempts {
                *state.write().await = ConnectionState::Disconnected;
                warn!(
                    "Real-time channel gave up after {} reconnect attempts",
                    attempts
                );
                return;
            }
            tokio::time::sleep(retry_interval).await;
            attempts += 1;
            match tokio_tungstenite::connect_async(&url).await {
                Ok((stream, _)) => {
                    ws = stream;
                    *state.write().await = ConnectionState::Connected;
                    info!("Real-time channel reconnected");
                    break;
                }
                Err(e) => debug!("Reconnect attempt {} failed: {}", attempts, e),
            }
        }
    }
}

async fn read_until_closed(ws: &mut WsStream, events: &broadcast::Sender<ChannelEvent>) {
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<ChannelFrame>(text.as_str())
            {
                Ok(ChannelFrame::MessageReceived { message }) => {
                    let _ = events.send(ChannelEvent::MessageReceived(message));
                }
                Err(e) => warn!("Ignoring malformed channel frame: {}", e),
            },
            Ok(WsMessage::Close(_)) => {
                debug!("Channel closed by server");
                break;
            }
            Ok(_) => {} // ping/pong/binary
            Err(e) => {
                debug!("Channel read error: {}", e);
                break;
            }
        }
    }
}
