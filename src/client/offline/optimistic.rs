//! # Cache Updates
//!
//! Handlers that fold a mutation's result into the local cache, registered
//! per operation name.
//!
//! The same handler runs for the optimistic result when a mutation is
//! deferred, for the live result of a mutation sent directly, and for the
//! server result when a deferred mutation is replayed. [`UpdateOrigin`] tells
//! them apart so a handler can avoid applying an effect twice.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use progress_sync::client::error::Result;
//! use progress_sync::client::local_db::LocalDatabase;
//! use progress_sync::client::offline::optimistic::{CacheUpdate, UpdateOrigin};
//! use serde_json::Value;
//!
//! struct ArchiveTrackable;
//!
//! #[async_trait]
//! impl CacheUpdate for ArchiveTrackable {
//!     async fn apply(&self, db: &LocalDatabase, data: &Value, origin: UpdateOrigin) -> Result<()> {
//!         if origin == UpdateOrigin::Replayed {
//!             return Ok(());
//!         }
//!         // splice the trackable out of the active list...
//!         Ok(())
//!     }
//! }
//! ```

use crate::client::error::Result;
use crate::client::local_db::LocalDatabase;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where a mutation result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// Server result of a mutation sent directly
    Live,
    /// Locally predicted result of a deferred mutation
    Optimistic,
    /// Server result of a deferred mutation, after replay
    Replayed,
}

/// Folds one mutation's result into the cache
#[async_trait]
pub trait CacheUpdate: Send + Sync {
    async fn apply(&self, db: &LocalDatabase, data: &Value, origin: UpdateOrigin) -> Result<()>;
}

/// Cache-update handlers keyed by operation name
#[derive(Default)]
pub struct UpdateRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn CacheUpdate>>>,
}

impl UpdateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `operation`, replacing any previous one
    pub async fn register(&self, operation: impl Into<String>, handler: Arc<dyn CacheUpdate>) {
        self.handlers.write().await.insert(operation.into(), handler);
    }

    /// Run the handler registered for `operation`, if any
    ///
    /// Handler failures are logged and swallowed: the mutation itself has
    /// already been decided by then.
    pub async fn apply(&self, db: &LocalDatabase, operation: &str, data: &Value, origin: UpdateOrigin) {
        let handler = self.handlers.read().await.get(operation).cloned();
        let Some(handler) = handler else {
            return;
        };

        if let Err(e) = handler.apply(db, data, origin).await {
            tracing::error!(
                "[OFFLINE] Cache update for {} ({:?}) failed: {}",
                operation,
                origin,
                e
            );
        }
    }
}
