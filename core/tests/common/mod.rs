#![allow(dead_code)]
/// Shared helpers for integration tests
use async_trait::async_trait;
use chatlink_core::channel::{ChannelEvent, ConnectionState, RealtimeTransport};
use chatlink_core::error::{ChatError, Result};
use chatlink_core::{ChatMessage, Config};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .try_init();
}

/// Config pointed at a test server, with intervals shrunk so tests finish
/// quickly.
pub fn test_config(api_base_url: &str) -> Config {
    Config {
        api_base_url: api_base_url.to_string(),
        realtime_url: "ws://127.0.0.1:1/unused".to_string(),
        poll_interval: Duration::from_millis(50),
        reset_check_interval: Duration::from_millis(100),
        reset_debounce: Duration::from_millis(200),
        dedup_capacity: 200,
        connect_timeout: Duration::from_millis(300),
        state_poll_interval: Duration::from_millis(20),
        send_refresh_delay: Duration::from_millis(50),
        request_timeout: Duration::from_secs(2),
        retry_interval: Duration::from_millis(50),
        max_reconnect_attempts: 2,
    }
}

pub fn msg(sender: &str, message: &str, timestamp: &str) -> ChatMessage {
    ChatMessage {
        sender: sender.to_string(),
        message: message.to_string(),
        timestamp: timestamp.to_string(),
    }
}

pub fn page_json(messages: &[ChatMessage]) -> serde_json::Value {
    serde_json::to_value(messages).unwrap()
}

/// Scripted transport for channel-manager tests. State transitions are
/// driven by the test; `start` flips to the configured outcome.
pub struct MockTransport {
    state: RwLock<ConnectionState>,
    events: broadcast::Sender<ChannelEvent>,
    start_succeeds: bool,
    pub start_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(initial: ConnectionState, start_succeeds: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            state: RwLock::new(initial),
            events,
            start_succeeds,
            start_calls: AtomicUsize::new(0),
        })
    }

    pub async fn set_state(&self, next: ConnectionState) {
        *self.state.write().await = next;
    }

    pub fn push(&self, message: ChatMessage) {
        let _ = self.events.send(ChannelEvent::MessageReceived(message));
    }

    pub fn close(&self) {
        let _ = self.events.send(ChannelEvent::Closed);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeTransport for MockTransport {
    async fn start(&self) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.start_succeeds {
            *self.state.write().await = ConnectionState::Connected;
            Ok(())
        } else {
            *self.state.write().await = ConnectionState::Disconnected;
            Err(ChatError::Channel("mock transport refused to start".to_string()))
        }
    }

    async fn stop(&self) {
        *self.state.write().await = ConnectionState::Disconnected;
    }

    async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}
