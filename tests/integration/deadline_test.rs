//! Deadline expiry against the local cache

use crate::common::*;
use crate::assert_ok;
use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use progress_sync::client::local_db::Audience;
use progress_sync::client::session::SessionState;
use progress_sync::client::sync::SyncEvent;
use progress_sync::shared::trackable::{ActivityKind, TrackableKind, TrackableNode, TrackableStatus};
use std::time::Duration;

#[tokio::test]
async fn test_repeated_ticks_expire_once() {
    let mut harness = test_engine(SessionState::authenticated("u1", "token")).await;
    let db = harness.engine.db();
    seed_connections(db, "u1").await;

    let now = Utc::now();
    assert_ok!(
        db.splice_active_trackables(
            "u1",
            &[],
            vec![
                TrackableNode::active("late-1", TrackableKind::TaskGoal, 3)
                    .with_deadline(now - ChronoDuration::hours(2)),
                TrackableNode::active("late-2", TrackableKind::NumericalGoal, 2)
                    .with_deadline(now - ChronoDuration::minutes(1)),
                TrackableNode::active("on-time", TrackableKind::NumericalGoal, 1)
                    .with_deadline(now + ChronoDuration::hours(1)),
            ],
        )
        .await
    );

    let scanner = harness.engine.deadlines();
    let mut expired = assert_ok!(scanner.tick_at(now).await);
    expired.sort();
    assert_eq!(expired, vec!["late-1".to_string(), "late-2".to_string()]);
    assert!(assert_ok!(scanner.tick_at(now).await).is_empty());

    let activities = assert_ok!(db.read_activities(Audience::Me).await).unwrap();
    assert_eq!(activities.len(), 2);
    assert!(activities
        .nodes()
        .all(|activity| activity.kind == ActivityKind::GoalExpired && activity.date == now));

    let archived = assert_ok!(db.read_archived_trackables("u1", TrackableStatus::Expired).await).unwrap();
    assert_eq!(archived.len(), 2);
    let active = assert_ok!(db.read_active_trackables("u1").await).unwrap();
    assert_eq!(active.node_ids(), vec!["on-time"]);

    let event = wait_for_event(&mut harness.events, |event| {
        matches!(event, SyncEvent::TrackablesExpired { .. })
    })
    .await;
    let SyncEvent::TrackablesExpired { mut ids } = event else {
        unreachable!();
    };
    ids.sort();
    assert_eq!(ids, expired);
}

#[tokio::test]
async fn test_start_offline_sweeps_immediately() {
    let db = test_db().await;
    seed_connections(&db, "u1").await;
    assert_ok!(db.write_connectivity(false).await);
    assert_ok!(
        db.splice_active_trackables(
            "u1",
            &[],
            vec![TrackableNode::active("late", TrackableKind::TaskGoal, 1)
                .with_deadline(Utc::now() - ChronoDuration::minutes(10))],
        )
        .await
    );

    // The default hourly period would never fire during the test.
    let config = progress_sync::shared::config::AppConfig::builder()
        .ping_period(Duration::from_secs(60))
        .build()
        .unwrap();
    let mut harness = test_engine_with(db, config, SessionState::authenticated("u1", "token"));
    harness.probe.set_reachable(false);
    assert_ok!(harness.engine.start().await);

    let event = wait_for_event(&mut harness.events, |event| {
        matches!(event, SyncEvent::TrackablesExpired { .. })
    })
    .await;
    assert_eq!(
        event,
        SyncEvent::TrackablesExpired {
            ids: vec!["late".to_string()]
        }
    );

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_signed_out_user_is_skipped() {
    let harness = test_engine(SessionState::default()).await;
    seed_connections(harness.engine.db(), "u1").await;
    assert!(assert_ok!(harness.engine.deadlines().tick().await).is_empty());
}
