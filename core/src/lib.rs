/// ChatLink — client-side synchronization core for a shared chat log
///
/// Keeps a single user's view of an append-only chat log consistent across
/// an unreliable real-time channel and a REST polling fallback: the two
/// sources are merged through one deduplication path, out-of-band "clear
/// history" actions are detected and debounced, and the system degrades to
/// polling whenever the push channel is unavailable.

pub mod channel;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod events;
pub mod message;
pub mod polling;
pub mod reset;
pub mod rest;
pub mod service;

pub use channel::{ChannelEvent, ConnectionState, RealtimeTransport, WsTransport};
pub use config::Config;
pub use error::{ChatError, Result};
pub use events::{ResetOrigin, SubscriptionId};
pub use message::ChatMessage;
pub use service::ChatService;
