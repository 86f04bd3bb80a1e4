/// Real-time channel management
///
/// Owns the transport state machine and guarantees the system always has a
/// working delivery path: whatever happens to the channel, the polling
/// fallback is active afterwards.
pub mod transport;

pub use transport::{ChannelEvent, ConnectionState, RealtimeTransport, WsTransport};

use crate::config::Config;
use crate::engine::SyncEngine;
use crate::error::{ChatError, Result};
use crate::polling::Poller;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::warn;

pub struct ChannelManager {
    transport: Arc<dyn RealtimeTransport>,
    engine: Arc<SyncEngine>,
    poller: Poller,
    state_poll_interval: Duration,
    connect_timeout: Duration,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelManager {
    pub fn new(
        config: &Config,
        transport: Arc<dyn RealtimeTransport>,
        engine: Arc<SyncEngine>,
        poller: Poller,
    ) -> Self {
        Self {
            transport,
            engine,
            poller,
            state_poll_interval: config.state_poll_interval,
            connect_timeout: config.connect_timeout,
            pump: Mutex::new(None),
        }
    }

    /// Connect the channel per its current state. The polling fallback is
    /// active when this returns, success or not.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_pump().await;
        match self.transport.state().await {
            ConnectionState::Connected => {
                // Healthy channel still gets the fallback safety net
                self.poller.ensure_active().await;
                Ok(())
            }
            ConnectionState::Connecting
            | ConnectionState::Reconnecting
            | ConnectionState::Disconnecting => self.await_settled().await,
            ConnectionState::Disconnected => self.start_transport().await,
        }
    }

    pub async fn disconnect(&self) {
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
        if self.transport.state().await != ConnectionState::Disconnected {
            self.transport.stop().await;
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.transport.state().await
    }

    /// Forward transport events into the shared dedup path. Idempotent.
    async fn ensure_pump(&self) {
        let mut pump = self.pump.lock().await;
        if pump.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let mut events = self.transport.subscribe();
        let engine = self.engine.clone();
        let poller = self.poller.clone();
        *pump = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ChannelEvent::MessageReceived(message)) => {
                        engine.ingest_pushed(message).await;
                    }
                    Ok(ChannelEvent::Closed) => {
                        // Channel loss is never surfaced; keep a delivery
                        // path alive
                        poller.ensure_active().await;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Channel event consumer lagged {} events", n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Poll a transitional state until it settles, bounded by the connect
    /// timeout. A fall to `Disconnected` gets one fresh start attempt.
    async fn await_settled(&self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.connect_timeout;
        loop {
            match self.transport.state().await {
                ConnectionState::Connected => {
                    self.poller.ensure_active().await;
                    return Ok(());
                }
                ConnectionState::Disconnected => return self.start_transport().await,
                _ => {}
            }
            if tokio::time::Instant::now() + self.state_poll_interval > deadline {
                self.poller.ensure_active().await;
                return Err(ChatError::Timeout(
                    "channel did not settle before the connect timeout".to_string(),
                ));
            }
            sleep(self.state_poll_interval).await;
        }
    }

    /// Start the transport. Polling is active afterwards no matter the
    /// outcome; a start error still reaches the caller.
    async fn start_transport(&self) -> Result<()> {
        let started = self.transport.start().await;
        self.poller.ensure_active().await;
        started
    }
}
