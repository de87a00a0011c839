//! Typed access to cache entries

use super::LocalDatabase;
use crate::client::error::Result;
use crate::shared::trackable::TrackableStatus;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqliteExecutor;
use std::fmt;

/// Kind of a cached entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    OfflineQueue,
    Connectivity,
    Trackable,
    Aggregate,
    Activity,
    Connection,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::OfflineQueue => "offline_queue",
            EntityKind::Connectivity => "connectivity",
            EntityKind::Trackable => "trackable",
            EntityKind::Aggregate => "aggregate",
            EntityKind::Activity => "activity",
            EntityKind::Connection => "connection",
        }
    }
}

/// Whose activity feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    Me,
    Friends,
}

/// Identity of a cached connection: its field plus its filter arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionKey {
    ActiveTrackables {
        user_id: String,
    },
    ArchivedTrackables {
        user_id: String,
        status: TrackableStatus,
    },
    Activities {
        audience: Audience,
    },
}

impl ConnectionKey {
    pub fn active_trackables(user_id: impl Into<String>) -> Self {
        Self::ActiveTrackables {
            user_id: user_id.into(),
        }
    }

    pub fn archived_trackables(user_id: impl Into<String>, status: TrackableStatus) -> Self {
        Self::ArchivedTrackables {
            user_id: user_id.into(),
            status,
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionKey::ActiveTrackables { user_id } => {
                write!(f, "activeTrackables(userId={})", user_id)
            }
            ConnectionKey::ArchivedTrackables { user_id, status } => {
                write!(
                    f,
                    "archivedTrackables(userId={},status={})",
                    user_id,
                    status.as_str()
                )
            }
            ConnectionKey::Activities { audience } => write!(f, "activities(audience={:?})", audience),
        }
    }
}

/// Address of a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub kind: EntityKind,
    pub id: String,
}

impl StoreKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Key of an entity that exists once per cache
    pub fn singleton(kind: EntityKind) -> Self {
        Self::new(kind, "default")
    }

    pub fn connection(key: &ConnectionKey) -> Self {
        Self::new(EntityKind::Connection, key.to_string())
    }
}

async fn fetch_data<'e, E>(executor: E, key: &StoreKey) -> Result<Option<String>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<(String,)> =
        sqlx::query_as("SELECT data FROM cache_entries WHERE kind = ? AND id = ?")
            .bind(key.kind.as_str())
            .bind(&key.id)
            .fetch_optional(executor)
            .await?;
    Ok(row.map(|(data,)| data))
}

async fn store_data<'e, E>(executor: E, key: &StoreKey, data: &str) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO cache_entries (kind, id, data, updated_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(kind, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
    )
    .bind(key.kind.as_str())
    .bind(&key.id)
    .bind(data)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

/// Read and decode an entry through `executor`
///
/// Pass `&mut *tx` to read inside a transaction.
pub(super) async fn fetch<'e, T, E>(executor: E, key: &StoreKey) -> Result<Option<T>>
where
    T: DeserializeOwned,
    E: SqliteExecutor<'e>,
{
    let data = fetch_data(executor, key).await?;
    Ok(data.map(|data| serde_json::from_str(&data)).transpose()?)
}

/// Encode and write an entry through `executor`
pub(super) async fn store<'e, T, E>(executor: E, key: &StoreKey, value: &T) -> Result<()>
where
    T: Serialize,
    E: SqliteExecutor<'e>,
{
    store_data(executor, key, &serde_json::to_string(value)?).await
}

/// Delete an entry through `executor`; returns whether it existed
pub(super) async fn delete<'e, E>(executor: E, key: &StoreKey) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM cache_entries WHERE kind = ? AND id = ?")
        .bind(key.kind.as_str())
        .bind(&key.id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

impl LocalDatabase {
    /// Read an entry; `None` when absent
    pub async fn read<T>(&self, key: &StoreKey) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        fetch(self.pool(), key).await
    }

    /// Write an entry, replacing any previous value
    pub async fn write<T>(&self, key: &StoreKey, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        store(self.pool(), key, value).await
    }

    /// Write an entry only if none exists; returns whether it was written
    pub async fn insert_if_absent<T>(&self, key: &StoreKey, value: &T) -> Result<bool>
    where
        T: Serialize + Sync,
    {
        let data = serde_json::to_string(value)?;
        let result = sqlx::query(
            "INSERT INTO cache_entries (kind, id, data, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(kind, id) DO NOTHING",
        )
        .bind(key.kind.as_str())
        .bind(&key.id)
        .bind(data)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove an entry; returns whether it existed
    pub async fn remove(&self, key: &StoreKey) -> Result<bool> {
        delete(self.pool(), key).await
    }

    /// Read-modify-write an existing entry in one transaction
    ///
    /// Returns `None` without writing when the entry is absent.
    pub async fn update<T, R, F>(&self, key: &StoreKey, apply: F) -> Result<Option<R>>
    where
        T: Serialize + DeserializeOwned + Send,
        R: Send,
        F: FnOnce(&mut T) -> R + Send,
    {
        let mut tx = self.pool().begin().await?;

        let Some(data) = fetch_data(&mut *tx, key).await? else {
            return Ok(None);
        };
        let mut value: T = serde_json::from_str(&data)?;
        let result = apply(&mut value);
        store_data(&mut *tx, key, &serde_json::to_string(&value)?).await?;

        tx.commit().await?;
        Ok(Some(result))
    }

    /// Read-modify-write an entry, starting from the default when absent
    pub async fn update_or_default<T, R, F>(&self, key: &StoreKey, apply: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default + Send,
        R: Send,
        F: FnOnce(&mut T) -> R + Send,
    {
        let mut tx = self.pool().begin().await?;

        let mut value: T = match fetch_data(&mut *tx, key).await? {
            Some(data) => serde_json::from_str(&data)?,
            None => T::default(),
        };
        let result = apply(&mut value);
        store_data(&mut *tx, key, &serde_json::to_string(&value)?).await?;

        tx.commit().await?;
        Ok(result)
    }

    /// Number of entries of one kind
    pub async fn count(&self, kind: EntityKind) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(self.pool())
            .await?;
        Ok(count as u64)
    }
}
