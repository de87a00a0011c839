//! # Sync Engine
//!
//! Wires the connectivity tracker, the offline mutation queue and the
//! deadline scanner onto one local cache and one event bus.
//!
//! ## Architecture
//!
//! - **Network Monitor**: reachability, persisted, probed while offline
//! - **Offline Manager**: defers and replays mutations (see [`crate::client::offline`])
//! - **Deadline Scanner**: hourly expiry sweep over the active list
//! - **Sync State**: snapshot for status displays
//!
//! Every component reports what it did as a [`SyncEvent`] on a broadcast
//! channel.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use progress_sync::client::session::{session_channel, SessionState};
//! use progress_sync::client::sync::SyncEngine;
//! use progress_sync::shared::config::AppConfig;
//!
//! # async fn run() -> progress_sync::client::error::Result<()> {
//! let (session, session_rx) = session_channel(SessionState::default());
//! let engine = SyncEngine::connect(AppConfig::default(), session_rx).await?;
//! engine.start().await?;
//!
//! let mut events = engine.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod deadline_scanner;
pub mod network_monitor;
pub mod sync_state;

pub use deadline_scanner::DeadlineScanner;
pub use network_monitor::{ConnectivityState, ConnectivityTracker, NetworkStatus};
pub use sync_state::SyncState;

use crate::client::error::Result;
use crate::client::local_db::LocalDatabase;
use crate::client::offline::{
    CacheUpdate, DeferralReason, DropReason, MutationRequest, OfflineManager, RetryPolicy,
    StopReason,
};
use crate::client::session::SessionState;
use crate::client::transport::{HttpProbe, HttpTransport, MutationTransport, ReachabilityProbe};
use crate::shared::config::AppConfig;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// Something the engine did
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    ConnectivityChanged {
        is_online: bool,
    },
    Enqueued {
        operation_id: Uuid,
        name: String,
        reason: DeferralReason,
    },
    Replayed {
        operation_id: Uuid,
        name: String,
    },
    Dropped {
        operation_id: Uuid,
        name: String,
        reason: DropReason,
    },
    /// The drain stopped with operations left in the queue
    DrainStopped {
        reason: StopReason,
    },
    /// The server refused the access token; the host should refresh it
    AuthExpired {
        operation_id: Uuid,
        name: String,
    },
    TrackablesExpired {
        ids: Vec<String>,
    },
}

/// The offline-first sync engine
pub struct SyncEngine {
    config: AppConfig,
    db: Arc<LocalDatabase>,
    connectivity: Arc<ConnectivityTracker>,
    offline: Arc<OfflineManager>,
    deadlines: Arc<DeadlineScanner>,
    events: broadcast::Sender<SyncEvent>,
    session: watch::Receiver<SessionState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Assemble the engine from its collaborators
    pub fn new(
        config: AppConfig,
        db: Arc<LocalDatabase>,
        transport: Arc<dyn MutationTransport>,
        probe: Arc<dyn ReachabilityProbe>,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let connectivity = Arc::new(ConnectivityTracker::new(
            Arc::clone(&db),
            probe,
            config.ping_period,
            events.clone(),
        ));
        let offline = Arc::new(OfflineManager::new(
            Arc::clone(&db),
            transport,
            Arc::clone(&connectivity),
            session.clone(),
            RetryPolicy::new(config.initial_retry_delay, config.sync_retry_timeout),
            events.clone(),
        ));
        let deadlines = Arc::new(DeadlineScanner::new(
            Arc::clone(&db),
            session.clone(),
            config.deadline_watch_period,
            events.clone(),
        ));

        Self {
            config,
            db,
            connectivity,
            offline,
            deadlines,
            events,
            session,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Open the local cache and talk to the configured server over HTTP
    pub async fn connect(config: AppConfig, session: watch::Receiver<SessionState>) -> Result<Self> {
        config.validate()?;

        let db = match &config.database_path {
            Some(path) => LocalDatabase::open(path).await?,
            None => LocalDatabase::open_default().await?,
        };
        let transport = HttpTransport::new(config.graphql_url())?;
        let probe = HttpProbe::new(config.probe_url.clone(), config.ping_period)?;

        Ok(Self::new(
            config,
            Arc::new(db),
            Arc::new(transport),
            Arc::new(probe),
            session,
        ))
    }

    /// Restore connectivity and start the background tasks
    pub async fn start(&self) -> Result<()> {
        self.connectivity.start().await?;
        let offline_at_start = self.connectivity.is_offline();

        let mut tasks = self.tasks.lock().await;
        tasks.push(self.offline.spawn_drain_listener());
        tasks.push(self.deadlines.start(offline_at_start));

        tracing::info!(
            "[SYNC] Engine started ({:?}, server {})",
            self.connectivity.status(),
            self.config.server_url
        );
        Ok(())
    }

    /// Stop the background tasks
    pub async fn shutdown(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.connectivity.stop().await;
        tracing::info!("[SYNC] Engine stopped");
    }

    /// Send or defer a mutation
    pub async fn request(&self, request: MutationRequest) -> Result<Value> {
        self.offline.request(request).await
    }

    /// Send a mutation, deferring it on a network or server failure
    pub async fn request_or_defer(&self, request: MutationRequest) -> Result<Value> {
        self.offline.request_or_defer(request).await
    }

    pub async fn register_update(&self, operation: impl Into<String>, handler: Arc<dyn CacheUpdate>) {
        self.offline.register_update(operation, handler).await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> Result<SyncState> {
        let stats = self.offline.queue_stats().await?;
        Ok(SyncState {
            network_status: self.connectivity.status(),
            is_draining: self.offline.is_draining(),
            pending_operations: stats.pending,
            oldest_pending: stats.oldest,
            is_authenticated: !self.session.borrow().is_anonymous(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db(&self) -> &Arc<LocalDatabase> {
        &self.db
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityTracker> {
        &self.connectivity
    }

    pub fn offline(&self) -> &Arc<OfflineManager> {
        &self.offline
    }

    pub fn deadlines(&self) -> &Arc<DeadlineScanner> {
        &self.deadlines
    }
}
