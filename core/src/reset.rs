/// Remote-reset detection
///
/// An empty history page while the local store still holds messages means
/// some participant cleared the shared log. Overlapping fetch timers can
/// observe the same condition repeatedly, so notifications are debounced.
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ResetDetector {
    debounce: Duration,
    last_reset: Option<Instant>,
}

impl ResetDetector {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_reset: None,
        }
    }

    /// An empty history page arrived. Returns true when it should be
    /// treated as a remote reset: the store is non-empty and the debounce
    /// window since the last reset has elapsed. Stamps the clock on fire.
    pub fn observe_empty_history(&mut self, store_nonempty: bool, now: Instant) -> bool {
        if !store_nonempty {
            return false;
        }
        if let Some(last) = self.last_reset {
            if now.duration_since(last) < self.debounce {
                return false;
            }
        }
        self.last_reset = Some(now);
        true
    }

    /// The local user cleared the chat themselves. Stamps the clock so the
    /// next empty poll is not reported as someone else's reset.
    pub fn note_local_reset(&mut self, now: Instant) {
        self.last_reset = Some(now);
    }
}
