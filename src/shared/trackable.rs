//! Trackable Data Model
//!
//! Goals, counters and the aggregates built from them, as stored in the local
//! cache. Progress for goal-like trackables is `progress / max_progress`;
//! counters carry a raw total with no ceiling.

use crate::shared::connection::Node;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a trackable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackableKind {
    Counter,
    NumericalGoal,
    TaskGoal,
    GymExercise,
    Aggregate,
}

impl TrackableKind {
    /// Whether progress of this kind is a raw total rather than a ratio
    pub fn is_summable(self) -> bool {
        matches!(self, TrackableKind::Counter)
    }
}

/// Lifecycle status of a trackable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackableStatus {
    Active,
    Expired,
    PendingProof,
    PendingReview,
    Approved,
    Rejected,
}

impl TrackableStatus {
    /// Active and PendingProof trackables still count toward an aggregate
    pub fn is_open(self) -> bool {
        matches!(self, TrackableStatus::Active | TrackableStatus::PendingProof)
    }

    /// Stable name used as a connection filter
    pub fn as_str(self) -> &'static str {
        match self {
            TrackableStatus::Active => "Active",
            TrackableStatus::Expired => "Expired",
            TrackableStatus::PendingProof => "PendingProof",
            TrackableStatus::PendingReview => "PendingReview",
            TrackableStatus::Approved => "Approved",
            TrackableStatus::Rejected => "Rejected",
        }
    }
}

/// A trackable whose progress is stored directly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveTrackable {
    pub id: String,
    pub kind: TrackableKind,
    pub status: TrackableStatus,
    pub progress: f64,
    pub max_progress: Option<f64>,
    /// Aggregate this trackable belongs to
    pub parent_id: Option<String>,
}

impl PrimitiveTrackable {
    /// Create an active counter
    pub fn counter(id: impl Into<String>, progress: f64) -> Self {
        Self {
            id: id.into(),
            kind: TrackableKind::Counter,
            status: TrackableStatus::Active,
            progress,
            max_progress: None,
            parent_id: None,
        }
    }

    /// Create an active numerical goal
    pub fn goal(id: impl Into<String>, progress: f64, max_progress: f64) -> Self {
        Self {
            id: id.into(),
            kind: TrackableKind::NumericalGoal,
            status: TrackableStatus::Active,
            progress,
            max_progress: Some(max_progress),
            parent_id: None,
        }
    }

    /// Completion ratio of a goal-like trackable
    ///
    /// A missing or zero maximum yields zero rather than NaN.
    pub fn ratio(&self) -> f64 {
        match self.max_progress {
            Some(max) if max > 0.0 => self.progress / max,
            _ => 0.0,
        }
    }
}

/// Node of the active and archived trackable connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackableNode {
    pub id: String,
    pub kind: TrackableKind,
    pub status: TrackableStatus,
    /// Manual sort key of the active list; larger first
    pub order: i64,
    pub deadline_date: Option<DateTime<Utc>>,
    pub status_change_date: Option<DateTime<Utc>>,
}

impl TrackableNode {
    /// Create an active node
    pub fn active(id: impl Into<String>, kind: TrackableKind, order: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            status: TrackableStatus::Active,
            order,
            deadline_date: None,
            status_change_date: None,
        }
    }

    /// Set the deadline
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline_date = Some(deadline);
        self
    }

    /// Whether the deadline has passed while the trackable is still active
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.status == TrackableStatus::Active
            && self.deadline_date.is_some_and(|deadline| deadline <= now)
    }

    /// Cursor of the archived connections
    pub fn archive_cursor(&self) -> i64 {
        self.status_change_date
            .map(|date| date.timestamp_millis())
            .unwrap_or_default()
    }
}

impl Node for TrackableNode {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Kind of a feed activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    TrackableAdded,
    CounterProgressChanged,
    GoalAchieved,
    GoalExpired,
}

/// Entry of the activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    pub date: DateTime<Utc>,
    pub trackable_id: Option<String>,
    pub user_id: String,
}

impl Activity {
    /// Create an activity with a fresh id
    pub fn new(
        kind: ActivityKind,
        date: DateTime<Utc>,
        trackable_id: Option<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            date,
            trackable_id,
            user_id: user_id.into(),
        }
    }

    /// Cursor of the activity feed
    pub fn cursor(&self) -> i64 {
        self.date.timestamp_millis()
    }
}

impl Node for Activity {
    fn id(&self) -> &str {
        &self.id
    }
}
