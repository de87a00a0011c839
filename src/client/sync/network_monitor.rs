//! # Network Monitor
//!
//! Tracks whether the server is reachable. The flag is published through a
//! `watch` channel and persisted, so a client that went down offline starts
//! offline again.
//!
//! While offline, a ping loop probes the server every `ping_period` and goes
//! back online on the first success. The loop only runs while offline.
//! Going offline is reported by the request paths when the transport fails
//! to reach the server.

use super::SyncEvent;
use crate::client::error::Result;
use crate::client::local_db::LocalDatabase;
use crate::client::transport::ReachabilityProbe;
use crate::client::FlagGuard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Unknown,
    Online,
    Offline,
}

/// Connectivity as last observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    /// `None` until first determined
    pub is_online: Option<bool>,
}

impl ConnectivityState {
    pub fn online() -> Self {
        Self {
            is_online: Some(true),
        }
    }

    pub fn status(&self) -> NetworkStatus {
        match self.is_online {
            None => NetworkStatus::Unknown,
            Some(true) => NetworkStatus::Online,
            Some(false) => NetworkStatus::Offline,
        }
    }

    /// Only a known-offline state counts
    pub fn is_offline(&self) -> bool {
        self.is_online == Some(false)
    }
}

pub struct ConnectivityTracker {
    db: Arc<LocalDatabase>,
    probe: Arc<dyn ReachabilityProbe>,
    ping_period: Duration,
    state: watch::Sender<ConnectivityState>,
    probe_in_flight: AtomicBool,
    /// Dropping the sender stops the running ping loop
    ping_loop: Mutex<Option<oneshot::Sender<()>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl ConnectivityTracker {
    /// Create a tracker that assumes the server is reachable
    pub fn new(
        db: Arc<LocalDatabase>,
        probe: Arc<dyn ReachabilityProbe>,
        ping_period: Duration,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectivityState::online());
        Self {
            db,
            probe,
            ping_period,
            state,
            probe_in_flight: AtomicBool::new(false),
            ping_loop: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn status(&self) -> NetworkStatus {
        self.state().status()
    }

    pub fn is_offline(&self) -> bool {
        self.state().is_offline()
    }

    pub async fn is_ping_loop_running(&self) -> bool {
        self.ping_loop.lock().await.is_some()
    }

    /// Restore the persisted state
    ///
    /// With nothing persisted, the optimistic online state is written. A
    /// persisted offline state starts the ping loop.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        match self.db.read_connectivity().await? {
            None => self.db.write_connectivity(true).await?,
            Some(true) => {}
            Some(false) => {
                tracing::info!("[NETWORK] Restored offline state");
                self.set_online(false).await?;
            }
        }
        Ok(())
    }

    /// Record a reachability change; returns whether the state changed
    ///
    /// Transitions are serialized on the ping loop lock, held until the new
    /// state is persisted, so the stored flag always matches the last
    /// published one.
    pub async fn set_online(self: &Arc<Self>, online: bool) -> Result<bool> {
        let mut ping_loop = self.ping_loop.lock().await;

        let changed = self.state.send_if_modified(|state| {
            if state.is_online == Some(online) {
                return false;
            }
            state.is_online = Some(online);
            true
        });
        if !changed {
            return Ok(false);
        }

        if online {
            tracing::info!("[NETWORK] Server reachable, going online");
            ping_loop.take();
        } else {
            tracing::warn!("[NETWORK] Server unreachable, going offline");
            if ping_loop.is_none() {
                *ping_loop = Some(self.spawn_ping_loop());
            }
        }
        self.db.write_connectivity(online).await?;
        drop(ping_loop);

        let _ = self.events.send(SyncEvent::ConnectivityChanged { is_online: online });
        Ok(true)
    }

    /// Mark the server unreachable
    pub async fn report_unreachable(self: &Arc<Self>) -> Result<bool> {
        self.set_online(false).await
    }

    /// Probe once and record the result
    ///
    /// Returns `None` without probing when a probe is already in flight.
    pub async fn check_now(self: &Arc<Self>) -> Option<bool> {
        if self
            .probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!("[NETWORK] Probe already in flight");
            return None;
        }
        let _guard = FlagGuard::new(&self.probe_in_flight);

        let online = self.probe.probe().await;
        if let Err(e) = self.set_online(online).await {
            tracing::error!("[NETWORK] Failed to record connectivity: {}", e);
        }
        Some(online)
    }

    /// Stop the ping loop, if running
    pub async fn stop(&self) {
        self.ping_loop.lock().await.take();
    }

    fn spawn_ping_loop(self: &Arc<Self>) -> oneshot::Sender<()> {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let tracker = Arc::downgrade(self);
        let period = self.ping_period;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }
                let Some(tracker) = tracker.upgrade() else {
                    break;
                };
                tracker.check_now().await;
            }
            tracing::debug!("[NETWORK] Ping loop stopped");
        });

        stop_tx
    }
}
