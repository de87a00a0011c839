//! Reachability probing and connectivity transitions over HTTP

use crate::common::*;
use crate::assert_ok;
use assert_matches::assert_matches;
use progress_sync::client::offline::{DeferralReason, MutationRequest};
use progress_sync::client::session::SessionState;
use progress_sync::client::sync::{NetworkStatus, SyncEngine, SyncEvent};
use progress_sync::client::transport::{HttpProbe, HttpTransport, OperationRequest, ReachabilityProbe};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_any_response_counts_as_reachable() {
    for status in [200, 404, 500] {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let probe = assert_ok!(HttpProbe::new(server.uri(), Duration::from_secs(2)));
        assert!(probe.probe().await, "status {} should be reachable", status);
    }
}

#[tokio::test]
async fn test_refused_connection_is_unreachable() {
    let probe = assert_ok!(HttpProbe::new(unreachable_url(), Duration::from_secs(2)));
    assert!(!probe.probe().await);
}

#[tokio::test]
async fn test_slow_probe_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let probe = assert_ok!(HttpProbe::new(server.uri(), Duration::from_millis(50)));
    assert!(!probe.probe().await);
}

#[tokio::test]
async fn test_ping_loop_brings_engine_back_online() {
    let server = MockServer::start().await;
    let probe = Arc::new(assert_ok!(HttpProbe::new(server.uri(), Duration::from_secs(1))));
    let (_session, session_rx) = watch::channel(SessionState::authenticated("u1", "token"));

    let engine = SyncEngine::new(
        fast_config(Duration::from_millis(20), Duration::from_millis(250)),
        test_db().await,
        ScriptedTransport::new(),
        probe,
        session_rx,
    );
    let mut events = engine.subscribe();

    assert_ok!(engine.connectivity().report_unreachable().await);
    assert_eq!(engine.connectivity().status(), NetworkStatus::Offline);

    wait_for_event(&mut events, |event| {
        matches!(event, SyncEvent::ConnectivityChanged { is_online: true })
    })
    .await;
    assert_eq!(engine.connectivity().status(), NetworkStatus::Online);
    assert!(!engine.connectivity().is_ping_loop_running().await);
    assert_eq!(assert_ok!(engine.db().read_connectivity().await), Some(true));
}

#[tokio::test]
async fn test_live_network_failure_defers_and_goes_offline() {
    let transport = Arc::new(assert_ok!(HttpTransport::new(format!(
        "{}/graphql",
        unreachable_url()
    ))));
    let probe = Arc::new(assert_ok!(HttpProbe::new(unreachable_url(), Duration::from_secs(1))));
    let (_session, session_rx) = watch::channel(SessionState::authenticated("u1", "token"));

    let engine = SyncEngine::new(
        fast_config(Duration::from_millis(20), Duration::from_millis(250)),
        test_db().await,
        transport,
        probe,
        session_rx,
    );
    let mut events = engine.subscribe();

    let request = MutationRequest::new(OperationRequest::new("AddCounter", "mutation AddCounter { id }"))
        .with_optimistic(json!({"id": "local-1"}));
    let data = assert_ok!(engine.request_or_defer(request).await);
    assert_eq!(data, json!({"id": "local-1"}));
    assert!(engine.connectivity().is_offline());

    let event = wait_for_event(&mut events, |event| matches!(event, SyncEvent::Enqueued { .. })).await;
    assert_matches!(
        event,
        SyncEvent::Enqueued {
            reason: DeferralReason::Offline,
            ..
        }
    );

    engine.shutdown().await;
}
