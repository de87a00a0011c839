//! # Deadline Scanner
//!
//! Expires active trackables whose deadline has passed. Each tick reads the
//! signed-in user's cached active list, moves every overdue Active entry to
//! the Expired archive and records one activity per expired entry.
//!
//! Expired entries are no longer Active, so a repeated tick never selects
//! them twice. The whole sweep is one cache transaction.

use super::SyncEvent;
use crate::client::error::Result;
use crate::client::local_db::LocalDatabase;
use crate::client::session::SessionState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub struct DeadlineScanner {
    db: Arc<LocalDatabase>,
    session: watch::Receiver<SessionState>,
    period: Duration,
    events: broadcast::Sender<SyncEvent>,
}

impl DeadlineScanner {
    pub fn new(
        db: Arc<LocalDatabase>,
        session: watch::Receiver<SessionState>,
        period: Duration,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        Self {
            db,
            session,
            period,
            events,
        }
    }

    /// Expire everything overdue as of now
    pub async fn tick(&self) -> Result<Vec<String>> {
        self.tick_at(Utc::now()).await
    }

    /// Expire everything overdue as of `now`; returns the expired ids
    ///
    /// Does nothing without a signed-in user or a cached active list.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let user_id = self.session.borrow().user_id.clone();
        let Some(user_id) = user_id else {
            return Ok(Vec::new());
        };

        let Some(ids) = self.db.expire_overdue_trackables(&user_id, now).await? else {
            tracing::trace!("[DEADLINE] No active trackables cached");
            return Ok(Vec::new());
        };
        if ids.is_empty() {
            return Ok(ids);
        }

        tracing::info!("[DEADLINE] Expired {} trackable(s)", ids.len());
        let _ = self.events.send(SyncEvent::TrackablesExpired { ids: ids.clone() });
        Ok(ids)
    }

    /// Tick every period; the first tick runs immediately when
    /// `tick_immediately` is set
    pub fn start(self: &Arc<Self>, tick_immediately: bool) -> JoinHandle<()> {
        let scanner = Arc::clone(self);

        tokio::spawn(async move {
            let first = if tick_immediately {
                Instant::now()
            } else {
                Instant::now() + scanner.period
            };
            let mut ticker = tokio::time::interval_at(first, scanner.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                tracing::trace!("[DEADLINE] tick");
                if let Err(e) = scanner.tick().await {
                    tracing::error!("[DEADLINE] Sweep failed: {}", e);
                }
            }
        })
    }
}
