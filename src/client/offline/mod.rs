//! # Offline Mutations
//!
//! Intercepts outgoing mutations, defers them while the server cannot take
//! them, and replays them in order once it can.
//!
//! ## Architecture
//!
//! - **Interception**: a mutation carrying an optimistic result is deferred
//!   when the client is offline, a drain is running, the session has no
//!   access token, or the caller asked for it. The optimistic result is
//!   written to the cache and returned immediately.
//! - **Operation Queue**: deferred mutations are persisted in FIFO order.
//! - **Drain**: once online and authenticated, queued mutations are replayed
//!   one by one. A mutation is removed only after it succeeded or was
//!   dropped, so a drain interrupted at any point resumes at the same head.
//! - **Retry Logic**: see [`retry`] for how each failure is handled.
//!
//! ## Key Components
//!
//! - `optimistic.rs`: cache-update handlers per operation name
//! - `queue.rs`: the persisted operation queue
//! - `retry.rs`: failure classification and backoff
//!
//! ## Usage
//!
//! ```rust,no_run
//! use progress_sync::client::offline::MutationRequest;
//! use progress_sync::client::transport::OperationRequest;
//! use serde_json::json;
//!
//! # async fn run(offline: &progress_sync::client::offline::OfflineManager) -> progress_sync::client::error::Result<()> {
//! let operation = OperationRequest::new("IncrementCounter", "mutation IncrementCounter($id: ID!) { ... }")
//!     .variable("id", json!("t1"));
//! let request = MutationRequest::new(operation).with_optimistic(json!({"id": "t1", "progress": 4}));
//!
//! let data = offline.request_or_defer(request).await?;
//! # Ok(())
//! # }
//! ```

pub mod optimistic;
pub mod queue;
pub mod retry;

pub use optimistic::{CacheUpdate, UpdateOrigin, UpdateRegistry};
pub use queue::{OfflineOperation, OfflineQueue, OperationQueue, OperationVariable, QueueStats};
pub use retry::{Backoff, DropReason, FailureAction, RetryPolicy, StopReason};

use crate::client::error::{Result, SyncError};
use crate::client::local_db::LocalDatabase;
use crate::client::session::SessionState;
use crate::client::sync::network_monitor::ConnectivityTracker;
use crate::client::sync::SyncEvent;
use crate::client::transport::{MutationTransport, OperationRequest, RequestContext, TransportError};
use crate::client::FlagGuard;
use crate::shared::error::SharedError;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Why a mutation went to the queue instead of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferralReason {
    Offline,
    /// A drain is running; sending now could overtake queued mutations
    Draining,
    Anonymous,
    /// The caller asked for deferral
    Requested,
}

/// A mutation submitted by a caller
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub operation: OperationRequest,
    /// Locally predicted result; only requests carrying one can be deferred
    pub optimistic_response: Option<Value>,
    /// Defer even when the server is reachable
    pub defer: bool,
}

impl MutationRequest {
    pub fn new(operation: OperationRequest) -> Self {
        Self {
            operation,
            optimistic_response: None,
            defer: false,
        }
    }

    pub fn with_optimistic(mut self, response: Value) -> Self {
        self.optimistic_response = Some(response);
        self
    }

    /// Request deferral regardless of connectivity
    pub fn deferred(mut self) -> Self {
        self.defer = true;
        self
    }

    fn validate(&self) -> std::result::Result<(), SharedError> {
        if self.operation.name.trim().is_empty() {
            return Err(SharedError::validation("name", "operation name must not be empty"));
        }
        if self.operation.body.trim().is_empty() {
            return Err(SharedError::validation("body", "operation body must not be empty"));
        }
        Ok(())
    }
}

/// Result of one drain attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Offline or no access token; nothing was attempted
    NotReady(StopReason),
    AlreadyDraining,
    /// The queue is empty
    Drained { replayed: usize, dropped: usize },
    /// Stopped with the head operation still queued
    Stopped {
        reason: StopReason,
        replayed: usize,
        dropped: usize,
    },
}

enum ReplayResult {
    Succeeded(Value),
    Dropped(DropReason),
    Stopped(StopReason),
}

/// Coordinates interception, the persisted queue and replay
pub struct OfflineManager {
    db: Arc<LocalDatabase>,
    queue: OperationQueue,
    updates: UpdateRegistry,
    transport: Arc<dyn MutationTransport>,
    connectivity: Arc<ConnectivityTracker>,
    session: watch::Receiver<SessionState>,
    retry: RetryPolicy,
    is_draining: AtomicBool,
    drain_requested: Notify,
    events: broadcast::Sender<SyncEvent>,
}

impl OfflineManager {
    pub fn new(
        db: Arc<LocalDatabase>,
        transport: Arc<dyn MutationTransport>,
        connectivity: Arc<ConnectivityTracker>,
        session: watch::Receiver<SessionState>,
        retry: RetryPolicy,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        Self {
            queue: OperationQueue::new(Arc::clone(&db)),
            db,
            updates: UpdateRegistry::new(),
            transport,
            connectivity,
            session,
            retry,
            is_draining: AtomicBool::new(false),
            drain_requested: Notify::new(),
            events,
        }
    }

    /// Register the cache update run for every result of `operation`
    pub async fn register_update(&self, operation: impl Into<String>, handler: Arc<dyn CacheUpdate>) {
        self.updates.register(operation, handler).await;
    }

    pub fn is_draining(&self) -> bool {
        self.is_draining.load(Ordering::Acquire)
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        self.queue.stats().await
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Send a mutation, or defer it when the server cannot take it now
    ///
    /// A deferred mutation resolves immediately with its optimistic result.
    /// A mutation without one is always sent.
    pub async fn request(&self, request: MutationRequest) -> Result<Value> {
        request.validate()?;

        if let Some(optimistic) = &request.optimistic_response {
            if let Some(reason) = self.deferral_reason(request.defer) {
                return self.defer(&request.operation, optimistic, reason).await;
            }
        }

        let access_token = self.session.borrow().access_token.clone();
        let context = RequestContext::live(access_token);

        match self.transport.send(&request.operation, &context).await {
            Ok(data) => {
                self.updates
                    .apply(&self.db, &request.operation.name, &data, UpdateOrigin::Live)
                    .await;
                Ok(data)
            }
            Err(error) => {
                if error.is_network() {
                    self.connectivity.check_now().await;
                }
                Err(error.into())
            }
        }
    }

    /// Send a mutation; on a network or server failure, defer it instead
    ///
    /// Other failures are returned to the caller.
    pub async fn request_or_defer(&self, request: MutationRequest) -> Result<Value> {
        if request.optimistic_response.is_none() || request.defer {
            return self.request(request).await;
        }

        match self.request(request.clone()).await {
            Err(SyncError::Transport(
                error @ (TransportError::NetworkUnavailable { .. }
                | TransportError::ServerUnavailable { .. }),
            )) => {
                tracing::warn!(
                    "[OFFLINE] {} failed ({}), deferring",
                    request.operation.name,
                    error
                );
                self.request(request.deferred()).await
            }
            result => result,
        }
    }

    fn deferral_reason(&self, requested: bool) -> Option<DeferralReason> {
        if self.connectivity.is_offline() {
            Some(DeferralReason::Offline)
        } else if self.is_draining() {
            Some(DeferralReason::Draining)
        } else if self.session.borrow().is_anonymous() {
            Some(DeferralReason::Anonymous)
        } else if requested {
            Some(DeferralReason::Requested)
        } else {
            None
        }
    }

    async fn defer(
        &self,
        operation: &OperationRequest,
        optimistic: &Value,
        reason: DeferralReason,
    ) -> Result<Value> {
        let queued = OfflineOperation::from_request(operation);
        let operation_id = queued.id;
        let pending = self.queue.enqueue(queued).await?;
        tracing::info!(
            "[OFFLINE] Deferred {} ({:?}), {} pending",
            operation.name,
            reason,
            pending
        );

        self.updates
            .apply(&self.db, &operation.name, optimistic, UpdateOrigin::Optimistic)
            .await;

        let _ = self.events.send(SyncEvent::Enqueued {
            operation_id,
            name: operation.name.clone(),
            reason,
        });
        self.drain_requested.notify_one();

        Ok(optimistic.clone())
    }

    fn blocked_reason(&self) -> Option<StopReason> {
        if self.connectivity.is_offline() {
            Some(StopReason::Offline)
        } else if self.session.borrow().is_anonymous() {
            Some(StopReason::SessionLost)
        } else {
            None
        }
    }

    /// Replay queued mutations unless offline, anonymous or already draining
    pub async fn try_drain(&self) -> Result<DrainOutcome> {
        if let Some(reason) = self.blocked_reason() {
            return Ok(DrainOutcome::NotReady(reason));
        }
        if self
            .is_draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(DrainOutcome::AlreadyDraining);
        }
        let _guard = FlagGuard::new(&self.is_draining);

        self.drain().await
    }

    async fn drain(&self) -> Result<DrainOutcome> {
        let mut replayed = 0;
        let mut dropped = 0;

        loop {
            let Some(operation) = self.queue.peek().await? else {
                if replayed + dropped > 0 {
                    tracing::info!(
                        "[OFFLINE] Queue drained: {} replayed, {} dropped",
                        replayed,
                        dropped
                    );
                }
                return Ok(DrainOutcome::Drained { replayed, dropped });
            };

            match self.replay(&operation).await {
                ReplayResult::Succeeded(data) => {
                    self.queue.remove(operation.id).await?;
                    replayed += 1;
                    tracing::info!("[OFFLINE] Replayed {}", operation.name);

                    self.updates
                        .apply(&self.db, &operation.name, &data, UpdateOrigin::Replayed)
                        .await;
                    let _ = self.events.send(SyncEvent::Replayed {
                        operation_id: operation.id,
                        name: operation.name,
                    });
                }
                ReplayResult::Dropped(reason) => {
                    self.queue.remove(operation.id).await?;
                    dropped += 1;
                    tracing::warn!("[OFFLINE] Dropped {}: {:?}", operation.name, reason);

                    let _ = self.events.send(SyncEvent::Dropped {
                        operation_id: operation.id,
                        name: operation.name,
                        reason,
                    });
                }
                ReplayResult::Stopped(reason) => {
                    tracing::info!(
                        "[OFFLINE] Drain stopped at {}: {:?}",
                        operation.name,
                        reason
                    );
                    if reason == StopReason::AuthExpired {
                        let _ = self.events.send(SyncEvent::AuthExpired {
                            operation_id: operation.id,
                            name: operation.name,
                        });
                    }
                    let _ = self.events.send(SyncEvent::DrainStopped { reason });
                    return Ok(DrainOutcome::Stopped {
                        reason,
                        replayed,
                        dropped,
                    });
                }
            }
        }
    }

    async fn replay(&self, operation: &OfflineOperation) -> ReplayResult {
        let request = operation.to_request();
        let started = Instant::now();
        let mut backoff = self.retry.backoff();

        loop {
            let access_token = self.session.borrow().access_token.clone();
            let context = RequestContext::offline_replay(access_token);

            let error = match self.transport.send(&request, &context).await {
                Ok(data) => return ReplayResult::Succeeded(data),
                Err(error) => error,
            };

            if let Some(reason) = self.blocked_reason() {
                return ReplayResult::Stopped(reason);
            }

            match retry::classify(&error) {
                FailureAction::Stop(reason) => return ReplayResult::Stopped(reason),
                FailureAction::Drop(reason) => return ReplayResult::Dropped(reason),
                FailureAction::CheckReachability => {
                    if self.connectivity.check_now().await == Some(false) {
                        return ReplayResult::Stopped(StopReason::Offline);
                    }
                }
                FailureAction::Retry => {}
            }

            if self.retry.is_expired(started.elapsed()) {
                return ReplayResult::Dropped(DropReason::RetryTimeout);
            }

            let delay = backoff.next_delay();
            tracing::debug!(
                "[OFFLINE] {} failed ({}), retrying in {:?}",
                operation.name,
                error,
                delay
            );
            if let Err(reason) = self.wait_for_retry(delay).await {
                return ReplayResult::Stopped(reason);
            }
        }
    }

    /// Sleep for `delay`, waking early to stop when connectivity or the
    /// session is lost
    async fn wait_for_retry(&self, delay: Duration) -> std::result::Result<(), StopReason> {
        let deadline = Instant::now() + delay;
        let mut connectivity = self.connectivity.subscribe();
        let mut session = self.session.clone();
        session.borrow_and_update();
        let mut watching = true;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                changed = connectivity.changed(), if watching => watching = changed.is_ok(),
                changed = session.changed(), if watching => watching = changed.is_ok(),
            }
            if let Some(reason) = self.blocked_reason() {
                return Err(reason);
            }
        }

        match self.blocked_reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Drain whenever connectivity or the session changes, or a mutation
    /// is deferred
    pub fn spawn_drain_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            let mut connectivity = manager.connectivity.subscribe();
            let mut session = manager.session.clone();
            let mut session_open = true;

            loop {
                match manager.try_drain().await {
                    Ok(outcome) => tracing::trace!("[OFFLINE] Drain attempt: {:?}", outcome),
                    Err(e) => tracing::error!("[OFFLINE] Drain failed: {}", e),
                }

                tokio::select! {
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = session.changed(), if session_open => session_open = changed.is_ok(),
                    _ = manager.drain_requested.notified() => {}
                }
            }
            tracing::debug!("[OFFLINE] Drain listener stopped");
        })
    }
}
