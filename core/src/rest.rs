/// REST client for the chat backend
///
/// The deployed backend is reachable under inconsistent route casings, so
/// send and full-history fetches walk a fallback ladder before giving up.
/// Incremental fetches (the polling hot path) stay on the primary route.
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::message::ChatMessage;
use serde::Serialize;
use tracing::{debug, warn};

const SEND_PRIMARY: &str = "Chat/send";
const SEND_FALLBACKS: [&str; 3] = ["Chat/send", "chat/Send", "chat/message"];
const HISTORY_PRIMARY: &str = "Chat/history";
const HISTORY_FALLBACKS: [&str; 3] = ["chat/History", "chat/messages", "Chat/messages"];
const RESET_ENDPOINT: &str = "Chat/reset";

#[derive(Debug, Serialize)]
struct SendPayload<'a> {
    sender: &'a str,
    message: &'a str,
    timestamp: String,
}

#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// POST a message, stamped with the client clock, walking the fallback
    /// ladder on failure. The primary error is what the caller sees when
    /// every endpoint fails.
    pub async fn send_message(&self, sender: &str, message: &str) -> Result<()> {
        let payload = SendPayload {
            sender,
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let primary_err = match self.post_send(SEND_PRIMARY, &payload).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!("Send failed on {}: {}", SEND_PRIMARY, primary_err);

        for endpoint in SEND_FALLBACKS {
            match self.post_send(endpoint, &payload).await {
                Ok(()) => {
                    debug!("Send succeeded via fallback {}", endpoint);
                    return Ok(());
                }
                Err(e) => debug!("Send failed on {}: {}", endpoint, e),
            }
        }

        Err(ChatError::EndpointsExhausted {
            operation: "send",
            detail: primary_err.to_string(),
        })
    }

    async fn post_send(&self, endpoint: &str, payload: &SendPayload<'_>) -> Result<()> {
        self.http
            .post(self.url(endpoint))
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// GET a history page from the primary endpoint. `since` bounds the
    /// page to messages after the sync cursor.
    pub async fn fetch_history(&self, since: Option<&str>) -> Result<Vec<ChatMessage>> {
        self.get_history(HISTORY_PRIMARY, since).await
    }

    /// Full history fetch with the fallback ladder. Fails only when every
    /// endpoint does.
    pub async fn fetch_history_with_fallback(&self) -> Result<Vec<ChatMessage>> {
        let primary_err = match self.get_history(HISTORY_PRIMARY, None).await {
            Ok(page) => return Ok(page),
            Err(e) => e,
        };
        warn!("History fetch failed on {}: {}", HISTORY_PRIMARY, primary_err);

        for endpoint in HISTORY_FALLBACKS {
            match self.get_history(endpoint, None).await {
                Ok(page) => {
                    debug!("History fetched via fallback {}", endpoint);
                    return Ok(page);
                }
                Err(e) => debug!("History fetch failed on {}: {}", endpoint, e),
            }
        }

        Err(ChatError::EndpointsExhausted {
            operation: "history",
            detail: primary_err.to_string(),
        })
    }

    async fn get_history(&self, endpoint: &str, since: Option<&str>) -> Result<Vec<ChatMessage>> {
        let mut request = self.http.get(self.url(endpoint));
        if let Some(since) = since {
            request = request.query(&[("since", since)]);
        }
        let page = request
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<ChatMessage>>()
            .await?;
        Ok(page)
    }

    /// POST the reset action. No fallback routes exist for it.
    pub async fn reset(&self) -> Result<()> {
        self.http
            .post(self.url(RESET_ENDPOINT))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
