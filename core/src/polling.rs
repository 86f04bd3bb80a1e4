/// Polling fallback: a repeating incremental fetch with explicit start/stop
use crate::engine::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Poller {
    engine: Arc<SyncEngine>,
    default_interval: Duration,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Poller {
    pub fn new(engine: Arc<SyncEngine>, default_interval: Duration) -> Self {
        Self {
            engine,
            default_interval,
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Start polling at the given interval, replacing any running timer.
    pub async fn start(&self, every: Duration) {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
        }

        let engine = self.engine.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick resolves immediately; polling waits one period
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Tick errors leave cursor and store untouched; the next
                // tick retries with the same cursor
                if let Err(e) = engine.fetch_new().await {
                    warn!("Polling tick failed: {}", e);
                }
            }
        }));
        debug!("Polling started (every {:?})", every);
    }

    /// No-op when a timer is already running. The rest of the system only
    /// goes through here, so channel flaps cannot stack timers.
    pub async fn ensure_active(&self) {
        {
            let task = self.task.lock().await;
            if task.as_ref().is_some_and(|h| !h.is_finished()) {
                return;
            }
        }
        self.start(self.default_interval).await;
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            debug!("Polling stopped");
        }
    }

    pub async fn is_active(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }
}
