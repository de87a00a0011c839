//! # Operation Queue
//!
//! Mutations deferred while offline, persisted in the local cache so they
//! survive a restart. Replay is strictly FIFO; an operation leaves the queue
//! only after it succeeded or was dropped.

use crate::client::error::Result;
use crate::client::local_db::LocalDatabase;
use crate::client::transport::OperationRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// One named variable of a queued operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationVariable {
    pub name: String,
    pub value: Value,
}

/// A mutation waiting for replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineOperation {
    pub id: Uuid,
    pub name: String,
    pub body: String,
    pub variables: Vec<OperationVariable>,
    /// When the operation was enqueued
    pub date: DateTime<Utc>,
}

impl OfflineOperation {
    /// Capture a request for later replay
    pub fn from_request(request: &OperationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            body: request.body.clone(),
            variables: request
                .variables
                .iter()
                .map(|(name, value)| OperationVariable {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            date: Utc::now(),
        }
    }

    /// Rebuild the request to replay
    pub fn to_request(&self) -> OperationRequest {
        let variables: Map<String, Value> = self
            .variables
            .iter()
            .map(|variable| (variable.name.clone(), variable.value.clone()))
            .collect();

        OperationRequest {
            name: self.name.clone(),
            body: self.body.clone(),
            variables,
        }
    }
}

/// Persisted queue fragment
///
/// `has_operations` mirrors `!operations.is_empty()` and is kept in sync by
/// every mutator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineQueue {
    has_operations: bool,
    operations: VecDeque<OfflineOperation>,
}

impl OfflineQueue {
    pub fn has_operations(&self) -> bool {
        self.has_operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Oldest operation
    pub fn head(&self) -> Option<&OfflineOperation> {
        self.operations.front()
    }

    pub fn operations(&self) -> impl Iterator<Item = &OfflineOperation> {
        self.operations.iter()
    }

    /// Append at the tail
    pub fn push(&mut self, operation: OfflineOperation) {
        self.operations.push_back(operation);
        self.has_operations = true;
    }

    /// Remove an operation by id
    pub fn remove(&mut self, id: Uuid) -> Option<OfflineOperation> {
        let index = self.operations.iter().position(|operation| operation.id == id)?;
        let removed = self.operations.remove(index);
        self.has_operations = !self.operations.is_empty();
        removed
    }

    pub fn clear(&mut self) {
        self.operations.clear();
        self.has_operations = false;
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.operations.len(),
            oldest: self.operations.front().map(|operation| operation.date),
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub oldest: Option<DateTime<Utc>>,
}

/// Handle on the persisted queue
#[derive(Debug, Clone)]
pub struct OperationQueue {
    db: Arc<LocalDatabase>,
}

impl OperationQueue {
    pub fn new(db: Arc<LocalDatabase>) -> Self {
        Self { db }
    }

    /// Append an operation and return the new queue length
    pub async fn enqueue(&self, operation: OfflineOperation) -> Result<usize> {
        self.db
            .update_offline_queue(|queue| {
                queue.push(operation);
                queue.len()
            })
            .await
    }

    /// Oldest operation, left in place
    pub async fn peek(&self) -> Result<Option<OfflineOperation>> {
        Ok(self.db.read_offline_queue().await?.head().cloned())
    }

    /// Remove an operation; returns whether it was queued
    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        self.db
            .update_offline_queue(|queue| queue.remove(id).is_some())
            .await
    }

    pub async fn snapshot(&self) -> Result<OfflineQueue> {
        self.db.read_offline_queue().await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(self.db.read_offline_queue().await?.stats())
    }

    pub async fn clear(&self) -> Result<()> {
        self.db.update_offline_queue(OfflineQueue::clear).await
    }
}
