/// Typed subscriber registry for message and reset notifications
use crate::message::ChatMessage;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Why the chat log was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOrigin {
    /// This client posted the reset itself
    Local,
    /// Another participant cleared the log, observed via an empty history
    Remote,
}

/// Opaque handle returned by the register operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

type MessageCallback = Arc<dyn Fn(&ChatMessage) + Send + Sync>;
type ResetCallback = Arc<dyn Fn(ResetOrigin) + Send + Sync>;

/// Subscriber lists owned by the facade. Subscribers are notified in
/// registration order; unregistering an unknown id is a no-op.
#[derive(Default)]
pub struct SubscriberRegistry {
    messages: RwLock<Vec<(SubscriptionId, MessageCallback)>>,
    resets: RwLock<Vec<(SubscriptionId, ResetCallback)>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn on_message(
        &self,
        callback: impl Fn(&ChatMessage) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.messages.write().await.push((id, Arc::new(callback)));
        id
    }

    pub async fn off_message(&self, id: SubscriptionId) {
        self.messages.write().await.retain(|(sid, _)| *sid != id);
    }

    pub async fn on_reset(
        &self,
        callback: impl Fn(ResetOrigin) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.resets.write().await.push((id, Arc::new(callback)));
        id
    }

    pub async fn off_reset(&self, id: SubscriptionId) {
        self.resets.write().await.retain(|(sid, _)| *sid != id);
    }

    /// Deliver a message to every subscriber, in registration order.
    /// Callbacks run outside the lock so a subscriber may re-enter the
    /// registry.
    pub async fn notify_message(&self, message: &ChatMessage) {
        let callbacks: Vec<MessageCallback> = self
            .messages
            .read()
            .await
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(message);
        }
    }

    pub async fn notify_reset(&self, origin: ResetOrigin) {
        let callbacks: Vec<ResetCallback> = self
            .resets
            .read()
            .await
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(origin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn msg() -> ChatMessage {
        ChatMessage {
            sender: "a".to_string(),
            message: "hi".to_string(),
            timestamp: "t1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_notify_in_registration_order() {
        let registry = SubscriberRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 1..=3 {
            let order = order.clone();
            registry
                .on_message(move |_| order.lock().unwrap().push(tag))
                .await;
        }

        registry.notify_message(&msg()).await;
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        let id = registry
            .on_message(move |_| *counter.lock().unwrap() += 1)
            .await;

        registry.notify_message(&msg()).await;
        registry.off_message(id).await;
        registry.notify_message(&msg()).await;

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_noop() {
        let registry = SubscriberRegistry::new();
        let id = registry.on_reset(|_| {}).await;
        registry.off_reset(id).await;
        // Second removal of the same id does nothing
        registry.off_reset(id).await;
        registry.notify_reset(ResetOrigin::Remote).await;
    }

    #[tokio::test]
    async fn test_reset_origin_reaches_subscriber() {
        let registry = SubscriberRegistry::new();
        let seen = Arc::new(Mutex::new(None));

        let sink = seen.clone();
        registry
            .on_reset(move |origin| *sink.lock().unwrap() = Some(origin))
            .await;

        registry.notify_reset(ResetOrigin::Local).await;
        assert_eq!(*seen.lock().unwrap(), Some(ResetOrigin::Local));
    }
}
