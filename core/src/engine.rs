/// Shared synchronization state and the single ingest path
///
/// Both delivery channels (real-time push and polling) feed messages
/// through here, so the dedup store is the sole arbiter of "already seen".
/// The store, sync cursor, and reset debounce clock live under one lock
/// and are always cleared together.
use crate::config::Config;
use crate::dedup::DedupStore;
use crate::error::Result;
use crate::events::{ResetOrigin, SubscriberRegistry};
use crate::message::ChatMessage;
use crate::reset::ResetDetector;
use crate::rest::RestClient;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

struct SyncState {
    dedup: DedupStore,
    cursor: Option<String>,
    reset: ResetDetector,
}

pub struct SyncEngine {
    rest: RestClient,
    state: Mutex<SyncState>,
    subscribers: SubscriberRegistry,
    config: Config,
    /// Bumped on disconnect; a fetch started under an older generation
    /// discards its result instead of mutating torn-down state.
    generation: AtomicU64,
}

impl SyncEngine {
    pub fn new(config: Config, rest: RestClient) -> Self {
        let state = SyncState {
            dedup: DedupStore::new(),
            cursor: None,
            reset: ResetDetector::new(config.reset_debounce),
        };
        Self {
            rest,
            state: Mutex::new(state),
            subscribers: SubscriberRegistry::new(),
            config,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    pub fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// A message pushed over the real-time channel. Discarded when the
    /// identity was already processed (the same message may also arrive in
    /// a history page).
    pub async fn ingest_pushed(&self, message: ChatMessage) {
        let fresh = {
            let mut state = self.state.lock().await;
            let id = message.identity();
            if state.dedup.has(&id) {
                false
            } else {
                state.dedup.add(id);
                state.dedup.evict_overflow(self.config.dedup_capacity);
                if !message.timestamp.is_empty() {
                    state.cursor = Some(message.timestamp.clone());
                }
                true
            }
        };
        if fresh {
            debug!("Channel message from {} ingested", message.sender);
            self.subscribers.notify_message(&message).await;
        }
    }

    /// One incremental fetch: pull the page since the cursor, run the
    /// reset policy, and deliver entries not seen before, in page order.
    pub async fn fetch_new(&self) -> Result<Vec<ChatMessage>> {
        let generation = self.current_generation();
        let since = self.state.lock().await.cursor.clone();

        let page = self.rest.fetch_history(since.as_deref()).await?;

        if self.current_generation() != generation {
            debug!("Discarding fetch result from a previous session");
            return Ok(Vec::new());
        }

        if page.is_empty() {
            self.try_remote_reset().await;
            return Ok(Vec::new());
        }

        let fresh = {
            let mut state = self.state.lock().await;

            // The cursor stays monotonic even when every entry was seen
            if let Some(last) = page.last() {
                if !last.timestamp.is_empty() {
                    state.cursor = Some(last.timestamp.clone());
                }
            }

            // Re-check while adding so an identity colliding within the
            // page is delivered once
            let mut fresh = Vec::new();
            for message in &page {
                let id = message.identity();
                if !state.dedup.has(&id) {
                    state.dedup.add(id);
                    fresh.push(message.clone());
                }
            }
            state.dedup.evict_overflow(self.config.dedup_capacity);
            fresh
        };

        for message in &fresh {
            self.subscribers.notify_message(message).await;
        }
        Ok(fresh)
    }

    /// Full history fetch. A non-empty page seeds the dedup store and the
    /// cursor so a subsequent poll only surfaces genuinely new entries; an
    /// empty page clears any stale local view.
    pub async fn fetch_history_full(&self) -> Result<Vec<ChatMessage>> {
        let generation = self.current_generation();
        let page = self.rest.fetch_history_with_fallback().await?;

        if self.current_generation() != generation {
            debug!("Discarding history result from a previous session");
            return Ok(Vec::new());
        }

        {
            let mut state = self.state.lock().await;
            if let Some(last) = page.last() {
                state.cursor = Some(last.timestamp.clone());
                for message in &page {
                    state.dedup.add(message.identity());
                }
                state.dedup.evict_overflow(self.config.dedup_capacity);
            } else {
                state.dedup.clear();
                state.cursor = None;
            }
        }
        Ok(page)
    }

    /// Reset-check tick: a full fetch judged only by the reset policy.
    /// Ingestion of a non-empty page is the polling tick's job.
    pub async fn check_reset(&self) -> Result<()> {
        let generation = self.current_generation();
        let page = self.rest.fetch_history(None).await?;
        if self.current_generation() != generation {
            return Ok(());
        }
        if page.is_empty() {
            self.try_remote_reset().await;
        }
        Ok(())
    }

    /// Run the remote-reset policy on an observed empty page. Returns true
    /// when a reset fired.
    async fn try_remote_reset(&self) -> bool {
        let fired = {
            let mut state = self.state.lock().await;
            let store_nonempty = !state.dedup.is_empty();
            if state
                .reset
                .observe_empty_history(store_nonempty, Instant::now())
            {
                state.dedup.clear();
                state.cursor = None;
                true
            } else {
                false
            }
        };
        if fired {
            info!("Remote chat reset detected");
            self.subscribers.notify_reset(ResetOrigin::Remote).await;
        }
        fired
    }

    pub async fn send(&self, sender: &str, text: &str) -> Result<()> {
        self.rest.send_message(sender, text).await
    }

    /// Reset the shared log. Local state is cleared only after the server
    /// accepts the action; a failure leaves it untouched.
    pub async fn reset_chat(&self) -> Result<()> {
        self.rest.reset().await?;
        {
            let mut state = self.state.lock().await;
            state.dedup.clear();
            state.cursor = None;
            state.reset.note_local_reset(Instant::now());
        }
        info!("Chat history reset by local user");
        self.subscribers.notify_reset(ResetOrigin::Local).await;
        Ok(())
    }
}
