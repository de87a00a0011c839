//! Deferral and replay of offline mutations

use crate::common::*;
use crate::{assert_err, assert_ok};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use progress_sync::client::error::SyncError;
use progress_sync::client::offline::{DeferralReason, DrainOutcome, DropReason, StopReason};
use progress_sync::client::session::SessionState;
use progress_sync::client::sync::SyncEvent;
use progress_sync::client::transport::TransportError;
use serde_json::json;
use std::time::Duration;

fn signed_in() -> SessionState {
    SessionState::authenticated("u1", "token")
}

/// Go offline with a probe that keeps failing, so the ping loop cannot
/// bring the engine back online behind the test's back
async fn go_offline(harness: &TestEngine) {
    harness.probe.set_reachable(false);
    assert_ok!(harness.engine.connectivity().report_unreachable().await);
}

#[tokio::test]
async fn test_offline_mutation_resolves_optimistically() {
    let mut harness = test_engine(signed_in()).await;
    let engine = &harness.engine;
    go_offline(&harness).await;

    let data = assert_ok!(engine.request(optimistic_mutation("AddCounter")).await);
    assert_eq!(data, json!({"name": "AddCounter", "optimistic": true}));
    assert!(harness.transport.calls().is_empty());

    let event = wait_for_event(&mut harness.events, |event| {
        matches!(event, SyncEvent::Enqueued { .. })
    })
    .await;
    assert_matches!(
        event,
        SyncEvent::Enqueued { reason: DeferralReason::Offline, ref name, .. } if name == "AddCounter"
    );

    let state = assert_ok!(engine.state().await);
    assert_eq!(state.pending_operations, 1);
}

#[tokio::test]
async fn test_reconnect_replays_in_fifo_order() {
    let mut harness = test_engine(signed_in()).await;
    let engine = &harness.engine;
    assert_ok!(engine.start().await);
    go_offline(&harness).await;

    for name in ["First", "Second", "Third"] {
        assert_ok!(engine.request(optimistic_mutation(name)).await);
    }
    assert!(harness.transport.calls().is_empty());

    harness.probe.set_reachable(true);
    for expected in ["First", "Second", "Third"] {
        let event = wait_for_event(&mut harness.events, |event| {
            matches!(event, SyncEvent::Replayed { .. })
        })
        .await;
        assert_matches!(event, SyncEvent::Replayed { ref name, .. } if name == expected);
    }

    assert_eq!(harness.transport.call_names(), vec!["First", "Second", "Third"]);
    assert!(harness
        .transport
        .calls()
        .iter()
        .all(|call| call.context.is_offline_operation));
    assert_eq!(assert_ok!(engine.state().await).pending_operations, 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_rejected_head_is_dropped_and_drain_continues() {
    let mut harness = test_engine(signed_in()).await;
    let engine = &harness.engine;
    go_offline(&harness).await;
    assert_ok!(engine.request(optimistic_mutation("Invalid")).await);
    assert_ok!(engine.request(optimistic_mutation("Valid")).await);

    harness
        .transport
        .push(Err(TransportError::ClientRejected { status: 400 }));
    assert_ok!(engine.connectivity().set_online(true).await);

    let outcome = assert_ok!(engine.offline().try_drain().await);
    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            replayed: 1,
            dropped: 1
        }
    );
    assert_eq!(harness.transport.call_names(), vec!["Invalid", "Valid"]);

    let dropped = wait_for_event(&mut harness.events, |event| {
        matches!(event, SyncEvent::Dropped { .. })
    })
    .await;
    assert_matches!(
        dropped,
        SyncEvent::Dropped { reason: DropReason::Rejected { status: 400 }, .. }
    );
}

#[tokio::test]
async fn test_expired_token_stops_and_keeps_operation() {
    let mut harness = test_engine(signed_in()).await;
    let engine = &harness.engine;
    go_offline(&harness).await;
    assert_ok!(engine.request(optimistic_mutation("Archive")).await);
    assert_ok!(engine.request(optimistic_mutation("Later")).await);
    assert_ok!(engine.connectivity().set_online(true).await);

    harness.transport.push(Err(TransportError::AuthExpired));
    let outcome = assert_ok!(engine.offline().try_drain().await);
    assert_matches!(
        outcome,
        DrainOutcome::Stopped {
            reason: StopReason::AuthExpired,
            replayed: 0,
            dropped: 0
        }
    );

    let head = assert_ok!(engine.offline().queue().peek().await).unwrap();
    assert_eq!(head.name, "Archive");
    assert_eq!(assert_ok!(engine.state().await).pending_operations, 2);

    wait_for_event(&mut harness.events, |event| {
        matches!(event, SyncEvent::AuthExpired { name, .. } if name == "Archive")
    })
    .await;

    // A refreshed token lets the same head go through.
    harness
        .session
        .send_replace(SessionState::authenticated("u1", "fresh-token"));
    let outcome = assert_ok!(engine.offline().try_drain().await);
    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            replayed: 2,
            dropped: 0
        }
    );
    let calls = harness.transport.calls();
    assert_eq!(calls[1].name, "Archive");
    assert_eq!(calls[1].context.access_token.as_deref(), Some("fresh-token"));
}

#[tokio::test]
async fn test_server_errors_back_off_until_timeout() {
    let mut harness = test_engine_with(
        test_db().await,
        fast_config(Duration::from_millis(20), Duration::from_millis(250)),
        signed_in(),
    );
    let engine = &harness.engine;
    go_offline(&harness).await;
    assert_ok!(engine.request(optimistic_mutation("Flaky")).await);
    assert_ok!(engine.connectivity().set_online(true).await);

    harness
        .transport
        .set_fallback(Err(TransportError::ServerUnavailable { status: 500 }));
    let outcome = assert_ok!(engine.offline().try_drain().await);
    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            replayed: 0,
            dropped: 1
        }
    );

    let calls = harness.transport.calls();
    assert!(calls.len() >= 3, "expected several attempts, got {}", calls.len());
    let gaps: Vec<Duration> = calls.windows(2).map(|pair| pair[1].at - pair[0].at).collect();
    for pair in gaps.windows(2) {
        assert!(pair[1] > pair[0], "backoff did not grow: {:?}", gaps);
    }

    wait_for_event(&mut harness.events, |event| {
        matches!(
            event,
            SyncEvent::Dropped {
                reason: DropReason::RetryTimeout,
                ..
            }
        )
    })
    .await;
}

#[tokio::test]
async fn test_network_failure_while_unreachable_stops_drain() {
    let harness = test_engine(signed_in()).await;
    let engine = &harness.engine;
    go_offline(&harness).await;
    assert_ok!(engine.request(optimistic_mutation("Pending")).await);
    assert_ok!(engine.connectivity().set_online(true).await);

    harness.probe.set_reachable(false);
    harness
        .transport
        .push(Err(TransportError::network("connection refused")));

    let outcome = assert_ok!(engine.offline().try_drain().await);
    assert_matches!(
        outcome,
        DrainOutcome::Stopped {
            reason: StopReason::Offline,
            ..
        }
    );
    assert!(engine.connectivity().is_offline());
    assert_eq!(assert_ok!(engine.state().await).pending_operations, 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_transient_network_failure_is_retried() {
    let harness = test_engine(signed_in()).await;
    let engine = &harness.engine;
    go_offline(&harness).await;
    assert_ok!(engine.request(optimistic_mutation("Pending")).await);
    assert_ok!(engine.connectivity().set_online(true).await);

    harness.probe.set_reachable(true);
    harness
        .transport
        .push(Err(TransportError::network("connection reset")));

    let outcome = assert_ok!(engine.offline().try_drain().await);
    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            replayed: 1,
            dropped: 0
        }
    );
    assert_eq!(harness.transport.calls().len(), 2);
    assert!(harness.probe.probe_count() >= 1);
}

#[tokio::test]
async fn test_logout_during_backoff_stops_drain() {
    let harness = test_engine_with(
        test_db().await,
        fast_config(Duration::from_secs(30), Duration::from_secs(300)),
        signed_in(),
    );
    let engine = &harness.engine;
    go_offline(&harness).await;
    assert_ok!(engine.request(optimistic_mutation("Pending")).await);
    assert_ok!(engine.connectivity().set_online(true).await);
    harness
        .transport
        .set_fallback(Err(TransportError::ServerUnavailable { status: 503 }));

    let offline = std::sync::Arc::clone(engine.offline());
    let drain = tokio::spawn(async move { offline.try_drain().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.session.send_replace(SessionState::anonymous("u1"));

    let outcome = tokio::time::timeout(Duration::from_secs(5), drain)
        .await
        .expect("drain did not stop")
        .unwrap();
    assert_matches!(
        outcome,
        Ok(DrainOutcome::Stopped {
            reason: StopReason::SessionLost,
            ..
        })
    );
    assert_eq!(harness.transport.calls().len(), 1);
    assert_eq!(assert_ok!(engine.state().await).pending_operations, 1);
}

#[tokio::test]
async fn test_mutations_during_drain_are_queued_behind() {
    let harness = test_engine(signed_in()).await;
    let engine = &harness.engine;
    go_offline(&harness).await;
    assert_ok!(engine.request(optimistic_mutation("Queued")).await);
    assert_ok!(engine.connectivity().set_online(true).await);

    let gate = harness.transport.hold_next();
    let offline = std::sync::Arc::clone(engine.offline());
    let drain = tokio::spawn(async move { offline.try_drain().await });

    tokio::time::timeout(Duration::from_secs(5), async {
        while !engine.offline().is_draining() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("drain did not start");

    assert_ok!(engine.request(optimistic_mutation("Late")).await);
    assert_eq!(
        assert_ok!(engine.offline().try_drain().await),
        DrainOutcome::AlreadyDraining
    );
    gate.notify_one();

    let outcome = assert_ok!(drain.await.unwrap());
    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            replayed: 2,
            dropped: 0
        }
    );
    assert_eq!(harness.transport.call_names(), vec!["Queued", "Late"]);
}

#[tokio::test]
async fn test_anonymous_mutations_wait_for_sign_in() {
    let mut harness = test_engine(SessionState::anonymous("u1")).await;
    let engine = &harness.engine;
    assert_ok!(engine.start().await);

    assert_ok!(engine.request(optimistic_mutation("AddGoal")).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.transport.calls().is_empty());

    harness.session.send_replace(signed_in());
    wait_for_event(&mut harness.events, |event| {
        matches!(event, SyncEvent::Replayed { name, .. } if name == "AddGoal")
    })
    .await;
    assert_eq!(
        harness.transport.calls()[0].context.access_token.as_deref(),
        Some("token")
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn test_live_failure_without_optimistic_result_is_returned() {
    let harness = test_engine(signed_in()).await;
    harness
        .transport
        .push(Err(TransportError::ClientRejected { status: 409 }));

    let request = progress_sync::client::offline::MutationRequest::new(
        progress_sync::client::transport::OperationRequest::new("Rename", "mutation Rename { id }"),
    );
    assert_err!(
        harness.engine.request_or_defer(request).await,
        SyncError::Transport(TransportError::ClientRejected { status: 409 })
    );
}
