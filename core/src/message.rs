/// Chat message type and its deduplication identity
use serde::{Deserialize, Serialize};

/// A single entry in the shared chat log.
///
/// Produced by the server and never mutated after receipt. The timestamp is
/// the server's ISO-8601 text, kept verbatim so the identity stays stable
/// across channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
    pub timestamp: String,
}

impl ChatMessage {
    /// Derived dedup key. Two messages are the same logical message iff
    /// their identities are equal, no matter which channel delivered them.
    /// Must be the only way an identity is ever computed.
    pub fn identity(&self) -> String {
        format!("{}|{}|{}", self.sender, self.message, self.timestamp)
    }
}
