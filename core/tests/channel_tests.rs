/// Channel-manager tests: the connect state machine and the guarantee
/// that a working delivery path survives every channel outcome.
mod common;

use chatlink_core::channel::ConnectionState;
use chatlink_core::{ChatError, ChatService, ResetOrigin};
use common::{init_tracing, msg, page_json, test_config, MockTransport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn empty_history_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Chat/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&[])))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_connect_when_already_connected_ensures_polling() {
    init_tracing();
    let server = empty_history_server().await;
    let transport = MockTransport::new(ConnectionState::Connected, true);

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    service.connect().await.unwrap();

    assert_eq!(transport.start_calls(), 0);
    assert!(service.is_polling().await);
}

#[tokio::test]
async fn test_connect_failure_still_activates_polling() {
    init_tracing();
    let server = MockServer::start().await;
    let m1 = msg("A", "hi", "2025-06-01T10:00:01Z");
    Mock::given(method("GET"))
        .and(path("/Chat/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&[m1.clone()])))
        .mount(&server)
        .await;
    let transport = MockTransport::new(ConnectionState::Disconnected, false);

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    service
        .on_message_received(move |m| sink.lock().unwrap().push(m.clone()))
        .await;

    let result = service.connect().await;
    assert!(matches!(result, Err(ChatError::Channel(_))));
    assert!(service.is_polling().await);

    // Messages keep appearing through the fallback despite the failure
    sleep(Duration::from_millis(300)).await;
    assert_eq!(*received.lock().unwrap(), vec![m1]);
}

#[tokio::test]
async fn test_connect_from_disconnected_starts_transport_and_polling() {
    init_tracing();
    let server = empty_history_server().await;
    let transport = MockTransport::new(ConnectionState::Disconnected, true);

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    service.connect().await.unwrap();

    assert_eq!(transport.start_calls(), 1);
    assert_eq!(service.connection_state().await, ConnectionState::Connected);
    assert!(service.is_polling().await);
}

#[tokio::test]
async fn test_connect_waits_out_a_transitional_state() {
    init_tracing();
    let server = empty_history_server().await;
    let transport = MockTransport::new(ConnectionState::Connecting, true);

    let flipper = transport.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(100)).await;
        flipper.set_state(ConnectionState::Connected).await;
    });

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    service.connect().await.unwrap();

    // The connection resolved on its own; no fresh start was needed
    assert_eq!(transport.start_calls(), 0);
    assert!(service.is_polling().await);
}

#[tokio::test]
async fn test_connect_times_out_when_state_never_settles() {
    init_tracing();
    let server = empty_history_server().await;
    let transport = MockTransport::new(ConnectionState::Connecting, true);

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    let result = service.connect().await;

    assert!(matches!(result, Err(ChatError::Timeout(_))));
    assert!(service.is_polling().await);
}

#[tokio::test]
async fn test_connect_retries_once_when_transition_falls_to_disconnected() {
    init_tracing();
    let server = empty_history_server().await;
    let transport = MockTransport::new(ConnectionState::Reconnecting, false);

    let flipper = transport.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(100)).await;
        flipper.set_state(ConnectionState::Disconnected).await;
    });

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    let result = service.connect().await;

    // The fall to Disconnected earned one start attempt, which failed
    assert!(matches!(result, Err(ChatError::Channel(_))));
    assert_eq!(transport.start_calls(), 1);
    assert!(service.is_polling().await);
}

#[tokio::test]
async fn test_pushed_message_deduped_against_polled_history() {
    init_tracing();
    let server = MockServer::start().await;
    let m1 = msg("A", "hi", "2025-06-01T10:00:01Z");
    Mock::given(method("GET"))
        .and(path("/Chat/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&[m1.clone()])))
        .mount(&server)
        .await;
    let transport = MockTransport::new(ConnectionState::Connected, true);

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    service
        .on_message_received(move |m| sink.lock().unwrap().push(m.clone()))
        .await;

    service.connect().await.unwrap();

    // The same message arrives pushed (twice) and in the polled page
    transport.push(m1.clone());
    transport.push(m1.clone());
    sleep(Duration::from_millis(300)).await;

    assert_eq!(*received.lock().unwrap(), vec![m1]);
    assert!(service.get_new_messages().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unexpected_close_reactivates_polling() {
    init_tracing();
    let server = empty_history_server().await;
    let transport = MockTransport::new(ConnectionState::Connected, true);

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    service.connect().await.unwrap();

    // The user turned the safety net off while the channel was healthy
    service.stop_polling().await;
    assert!(!service.is_polling().await);

    transport.close();
    sleep(Duration::from_millis(100)).await;
    assert!(service.is_polling().await);
}

#[tokio::test]
async fn test_reset_check_timer_detects_remote_reset() {
    init_tracing();
    let server = empty_history_server().await;
    let transport = MockTransport::new(ConnectionState::Connected, true);

    let mut config = test_config(&server.uri());
    // Keep polling out of the picture; only the reset timer fetches
    config.poll_interval = Duration::from_secs(30);

    let service = ChatService::with_transport(config, transport.clone()).unwrap();
    let resets = Arc::new(AtomicUsize::new(0));
    let origin_seen = Arc::new(Mutex::new(None));
    {
        let resets = resets.clone();
        let origin_seen = origin_seen.clone();
        service
            .on_chat_reset(move |origin| {
                resets.fetch_add(1, Ordering::SeqCst);
                *origin_seen.lock().unwrap() = Some(origin);
            })
            .await;
    }

    service.connect().await.unwrap();
    transport.push(msg("A", "hi", "2025-06-01T10:00:01Z"));

    // The reset check runs on its own cadence even with the channel healthy
    sleep(Duration::from_millis(400)).await;
    assert_eq!(resets.load(Ordering::SeqCst), 1);
    assert_eq!(*origin_seen.lock().unwrap(), Some(ResetOrigin::Remote));
}

#[tokio::test]
async fn test_disconnect_tears_down_channel_and_timers() {
    init_tracing();
    let server = empty_history_server().await;
    let transport = MockTransport::new(ConnectionState::Disconnected, true);

    let service =
        ChatService::with_transport(test_config(&server.uri()), transport.clone()).unwrap();
    service.connect().await.unwrap();
    assert_eq!(service.connection_state().await, ConnectionState::Connected);

    service.disconnect().await;
    assert!(!service.is_polling().await);
    assert_eq!(
        service.connection_state().await,
        ConnectionState::Disconnected
    );
}
