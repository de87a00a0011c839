//! # Sync State
//!
//! Point-in-time snapshot of the engine for status displays.

use super::network_monitor::NetworkStatus;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub network_status: NetworkStatus,
    pub is_draining: bool,
    pub pending_operations: usize,
    /// Enqueue date of the operation at the head of the queue
    pub oldest_pending: Option<DateTime<Utc>>,
    pub is_authenticated: bool,
}

impl SyncState {
    /// Whether queued mutations can reach the server right now
    pub fn can_sync(&self) -> bool {
        self.network_status != NetworkStatus::Offline && self.is_authenticated
    }

    /// Nothing left to replay
    pub fn is_idle(&self) -> bool {
        self.pending_operations == 0 && !self.is_draining
    }
}
