//! State that must survive a restart of the client

use crate::common::*;
use crate::assert_ok;
use pretty_assertions::assert_eq;
use progress_sync::client::local_db::LocalDatabase;
use progress_sync::client::session::SessionState;
use progress_sync::client::sync::NetworkStatus;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn open(dir: &TempDir) -> Arc<LocalDatabase> {
    Arc::new(assert_ok!(LocalDatabase::open(dir.path().join("cache.db")).await))
}

fn config() -> progress_sync::shared::config::AppConfig {
    fast_config(Duration::from_millis(20), Duration::from_millis(250))
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let harness = test_engine_with(
            open(&dir).await,
            config(),
            SessionState::anonymous("u1"),
        );
        for name in ["AddCounter", "IncrementCounter"] {
            assert_ok!(harness.engine.request(optimistic_mutation(name)).await);
        }
        harness.engine.db().close().await;
    }

    let harness = test_engine_with(
        open(&dir).await,
        config(),
        SessionState::authenticated("u1", "token"),
    );
    let queued: Vec<String> = assert_ok!(harness.engine.offline().queue().snapshot().await)
        .operations()
        .map(|operation| operation.name.clone())
        .collect();
    assert_eq!(queued, vec!["AddCounter", "IncrementCounter"]);

    assert_ok!(harness.engine.offline().try_drain().await);
    assert_eq!(harness.transport.call_names(), vec!["AddCounter", "IncrementCounter"]);
}

#[tokio::test]
async fn test_offline_state_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let harness = test_engine_with(
            open(&dir).await,
            config(),
            SessionState::authenticated("u1", "token"),
        );
        harness.probe.set_reachable(false);
        assert_ok!(harness.engine.start().await);
        assert_ok!(harness.engine.connectivity().report_unreachable().await);
        harness.engine.shutdown().await;
        harness.engine.db().close().await;
    }

    let harness = test_engine_with(
        open(&dir).await,
        config(),
        SessionState::authenticated("u1", "token"),
    );
    harness.probe.set_reachable(false);
    assert_eq!(harness.engine.connectivity().status(), NetworkStatus::Online);

    assert_ok!(harness.engine.start().await);
    assert_eq!(harness.engine.connectivity().status(), NetworkStatus::Offline);
    assert!(harness.engine.connectivity().is_ping_loop_running().await);

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_schema_is_created_once() {
    let dir = TempDir::new().unwrap();
    let first = open(&dir).await;
    let version = assert_ok!(first.schema_version().await);
    first.close().await;

    let second = open(&dir).await;
    assert_eq!(assert_ok!(second.schema_version().await), version);
    assert_eq!(assert_ok!(second.get_stats().await).entry_count, 0);
}
