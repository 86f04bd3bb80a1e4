/// Synchronization facade — the single access point for the UI layer
///
/// One `ChatService` instance is constructed by the embedding application
/// and lives for the chat context's lifetime. Background tasks come up
/// lazily on `connect()` and are torn down by `disconnect()`.
use crate::channel::{ChannelManager, ConnectionState, RealtimeTransport, WsTransport};
use crate::config::Config;
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::events::{ResetOrigin, SubscriptionId};
use crate::message::ChatMessage;
use crate::polling::Poller;
use crate::rest::RestClient;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct ChatService {
    config: Config,
    engine: Arc<SyncEngine>,
    poller: Poller,
    channel: ChannelManager,
    reset_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatService {
    /// Create a service speaking to the configured backend over WebSocket
    /// and REST.
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(WsTransport::new(&config));
        Self::with_transport(config, transport)
    }

    /// Create a service with a caller-supplied real-time transport.
    pub fn with_transport(config: Config, transport: Arc<dyn RealtimeTransport>) -> Result<Self> {
        let rest = RestClient::new(&config)?;
        let engine = Arc::new(SyncEngine::new(config.clone(), rest));
        let poller = Poller::new(engine.clone(), config.poll_interval);
        let channel = ChannelManager::new(&config, transport, engine.clone(), poller.clone());
        Ok(Self {
            config,
            engine,
            poller,
            channel,
            reset_task: Mutex::new(None),
        })
    }

    /// Connect the real-time channel. The polling fallback is active when
    /// this returns, whether or not the channel came up.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_reset_check().await;
        self.channel.connect().await
    }

    /// Send a message, then shortly after pull it back through the normal
    /// dedup path; the sender's own message is never synthesized locally.
    /// On failure the caller owns restoring any optimistic UI state.
    pub async fn send_message(&self, sender: &str, text: &str) -> Result<()> {
        self.engine.send(sender, text).await?;

        let engine = self.engine.clone();
        let delay = self.config.send_refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = engine.fetch_new().await {
                warn!("Post-send refresh failed: {}", e);
            }
        });
        Ok(())
    }

    /// Full history fetch; seeds local state so a subsequent poll only
    /// surfaces genuinely new entries. Fails when every endpoint does.
    pub async fn get_message_history(&self) -> Result<Vec<ChatMessage>> {
        self.engine.fetch_history_full().await
    }

    /// Incremental fetch since the sync cursor. New entries are also
    /// delivered to subscribers.
    pub async fn get_new_messages(&self) -> Result<Vec<ChatMessage>> {
        self.engine.fetch_new().await
    }

    /// Clear the shared log for every participant. Local state is cleared
    /// only on success.
    pub async fn reset_chat(&self) -> Result<()> {
        self.engine.reset_chat().await
    }

    pub async fn start_polling(&self) {
        self.poller.start(self.config.poll_interval).await;
    }

    pub async fn stop_polling(&self) {
        self.poller.stop().await;
    }

    pub async fn is_polling(&self) -> bool {
        self.poller.is_active().await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.channel.state().await
    }

    pub async fn on_message_received(
        &self,
        callback: impl Fn(&ChatMessage) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.engine.subscribers().on_message(callback).await
    }

    pub async fn off_message_received(&self, id: SubscriptionId) {
        self.engine.subscribers().off_message(id).await;
    }

    pub async fn on_chat_reset(
        &self,
        callback: impl Fn(ResetOrigin) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.engine.subscribers().on_reset(callback).await
    }

    pub async fn off_chat_reset(&self, id: SubscriptionId) {
        self.engine.subscribers().off_reset(id).await;
    }

    /// Tear everything down: polling, the reset check, and the channel.
    /// Safe to call more than once; a later `connect()` brings the service
    /// back up. A fetch in flight right now will discard its result.
    pub async fn disconnect(&self) {
        self.poller.stop().await;
        if let Some(handle) = self.reset_task.lock().await.take() {
            handle.abort();
        }
        self.channel.disconnect().await;
        self.engine.bump_generation();
        info!("Chat service disconnected");
    }

    /// Independent reset check, decoupled from polling so it runs even
    /// while the real-time channel is healthy.
    async fn ensure_reset_check(&self) {
        let mut task = self.reset_task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let engine = self.engine.clone();
        let period = self.config.reset_check_interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = engine.check_reset().await {
                    warn!("Reset check failed: {}", e);
                }
            }
        }));
        debug!("Reset check started (every {:?})", period);
    }
}
