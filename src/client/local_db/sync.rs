//! Sync fragments of the local cache
//!
//! The offline queue and the last known connectivity flag are stored as two
//! singleton entries so that both survive a restart.

use super::cache::{EntityKind, StoreKey};
use super::LocalDatabase;
use crate::client::error::Result;
use crate::client::offline::queue::OfflineQueue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectivityRecord {
    is_online: bool,
}

impl LocalDatabase {
    /// Persisted offline queue; empty when never written
    pub async fn read_offline_queue(&self) -> Result<OfflineQueue> {
        Ok(self
            .read(&StoreKey::singleton(EntityKind::OfflineQueue))
            .await?
            .unwrap_or_default())
    }

    /// Modify the persisted offline queue in one transaction
    pub async fn update_offline_queue<R, F>(&self, apply: F) -> Result<R>
    where
        R: Send,
        F: FnOnce(&mut OfflineQueue) -> R + Send,
    {
        self.update_or_default(&StoreKey::singleton(EntityKind::OfflineQueue), apply)
            .await
    }

    /// Last persisted connectivity; `None` when never written
    pub async fn read_connectivity(&self) -> Result<Option<bool>> {
        let record: Option<ConnectivityRecord> = self
            .read(&StoreKey::singleton(EntityKind::Connectivity))
            .await?;
        Ok(record.map(|record| record.is_online))
    }

    pub async fn write_connectivity(&self, is_online: bool) -> Result<()> {
        self.write(
            &StoreKey::singleton(EntityKind::Connectivity),
            &ConnectivityRecord { is_online },
        )
        .await
    }
}
