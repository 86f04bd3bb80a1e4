/// Configuration management
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Synchronization core configuration.
///
/// The timing and capacity values default to the behavior observed against
/// the production backend; they are policy knobs, not invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the REST API (no trailing slash required)
    pub api_base_url: String,

    /// WebSocket URL of the real-time push channel
    pub realtime_url: String,

    /// Polling fallback interval
    pub poll_interval: Duration,

    /// Independent reset-check interval
    pub reset_check_interval: Duration,

    /// Window during which repeated reset notifications are suppressed
    pub reset_debounce: Duration,

    /// Cap on the processed-identity set; oldest entries are evicted beyond it
    pub dedup_capacity: usize,

    /// Overall bound on waiting for the channel to leave a transitional state
    pub connect_timeout: Duration,

    /// How often a transitional connection state is re-examined
    pub state_poll_interval: Duration,

    /// Delay before pulling back our own message after a successful send
    pub send_refresh_delay: Duration,

    /// Timeout applied to every outbound HTTP request
    pub request_timeout: Duration,

    /// Delay between transport reconnect attempts
    pub retry_interval: Duration,

    /// Reconnect attempts before the transport gives up
    pub max_reconnect_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000/api".to_string(),
            realtime_url: "ws://127.0.0.1:5000/chat/stream".to_string(),
            poll_interval: Duration::from_secs(2),
            reset_check_interval: Duration::from_secs(5),
            reset_debounce: Duration::from_secs(5),
            dedup_capacity: 200,
            connect_timeout: Duration::from_secs(10),
            state_poll_interval: Duration::from_millis(500),
            send_refresh_delay: Duration::from_millis(300),
            request_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_secs(2),
            max_reconnect_attempts: 5,
        }
    }
}

impl Config {
    /// Create a config for the given backend URLs.
    pub fn new(api_base_url: impl Into<String>, realtime_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            realtime_url: realtime_url.into(),
            ..Default::default()
        }
    }

    /// Apply environment overrides (nice for scripts)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("CHATLINK_API_URL") {
            config.api_base_url = url;
        }
        if let Ok(url) = std::env::var("CHATLINK_REALTIME_URL") {
            config.realtime_url = url;
        }
        config
    }
}
