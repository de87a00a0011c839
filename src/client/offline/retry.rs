//! # Retry Policy
//!
//! Decides what happens to a queued operation whose replay failed, and how
//! long to wait before the next attempt.
//!
//! | Failure              | Action                                   |
//! |----------------------|------------------------------------------|
//! | 401                  | stop draining, keep the operation        |
//! | other 4xx            | drop the operation                       |
//! | 5xx, GraphQL, other  | retry with backoff until the timeout     |
//! | network              | confirm reachability, then stop or retry |

use crate::client::transport::TransportError;
use std::time::Duration;

/// Retry limits for one queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First backoff delay
    pub initial_delay: Duration,
    /// Total time after the first attempt past which a failing operation is dropped
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, timeout: Duration) -> Self {
        Self {
            initial_delay,
            timeout,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay)
    }

    /// Whether an operation first attempted `elapsed` ago has run out of time
    pub fn is_expired(&self, elapsed: Duration) -> bool {
        elapsed >= self.timeout
    }
}

/// Exponential backoff: each delay doubles the previous one
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
}

impl Backoff {
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            next: initial_delay,
        }
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = delay.checked_mul(2).unwrap_or(Duration::MAX);
        delay
    }
}

/// How a failed replay is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Back off and send again
    Retry,
    /// Remove the operation from the queue
    Drop(DropReason),
    /// Leave the operation at the head and stop draining
    Stop(StopReason),
    /// The server may be unreachable; reachability decides
    CheckReachability,
}

/// Why an operation was removed without succeeding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Rejected by the server
    Rejected { status: u16 },
    /// Kept failing for longer than the retry timeout
    RetryTimeout,
}

/// Why a drain stopped with operations left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Offline,
    /// No access token
    SessionLost,
    AuthExpired,
}

/// Map a transport failure to its action
pub fn classify(error: &TransportError) -> FailureAction {
    match error {
        TransportError::AuthExpired => FailureAction::Stop(StopReason::AuthExpired),
        TransportError::ClientRejected { status } => {
            FailureAction::Drop(DropReason::Rejected { status: *status })
        }
        TransportError::NetworkUnavailable { .. } => FailureAction::CheckReachability,
        TransportError::ServerUnavailable { .. } | TransportError::Unknown { .. } => {
            FailureAction::Retry
        }
    }
}
