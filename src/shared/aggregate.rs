//! # Aggregates
//!
//! An aggregate's progress is derived from its children and is recomputed on
//! every structural change to them. Counter children are summed with no
//! ceiling; goal children contribute the unweighted average of their
//! completion ratios, with a maximum of 1.
//!
//! A child list mixes kinds only if a caller broke the grouping rules; the
//! first child decides how the whole list is read.

use crate::shared::trackable::{PrimitiveTrackable, TrackableStatus};
use serde::{Deserialize, Serialize};

/// Derived progress of an aggregate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub current: f64,
    pub max: Option<f64>,
}

/// Outcome of removing a child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRemoval {
    /// No children left; the aggregate should be deleted or replaced.
    /// Progress was not recomputed.
    NowEmpty,
    /// Progress was recomputed from the remaining children
    StillHasChildren,
}

/// A trackable whose progress is derived from its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTrackable {
    id: String,
    progress: f64,
    max_progress: Option<f64>,
    children: Vec<PrimitiveTrackable>,
}

impl AggregateTrackable {
    /// Create an aggregate over `children`, deriving its progress
    pub fn new(id: impl Into<String>, children: Vec<PrimitiveTrackable>) -> Self {
        let id = id.into();
        let children = children
            .into_iter()
            .map(|mut child| {
                child.parent_id = Some(id.clone());
                child
            })
            .collect();

        let mut aggregate = Self {
            id,
            progress: 0.0,
            max_progress: None,
            children,
        };
        update_progress(&mut aggregate, None);
        aggregate
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn max_progress(&self) -> Option<f64> {
        self.max_progress
    }

    pub fn children(&self) -> &[PrimitiveTrackable] {
        &self.children
    }

    /// Add a child and recompute progress
    pub fn add_child(&mut self, mut child: PrimitiveTrackable) {
        child.parent_id = Some(self.id.clone());
        self.children.retain(|existing| existing.id != child.id);
        self.children.push(child);
        update_progress(self, None);
    }
}

/// Derive progress from a list of children
///
/// An empty list has no progress and no maximum.
pub fn get_progress(children: &[PrimitiveTrackable]) -> Progress {
    let Some(first) = children.first() else {
        return Progress {
            current: 0.0,
            max: None,
        };
    };

    if first.kind.is_summable() {
        return Progress {
            current: children.iter().map(|child| child.progress).sum(),
            max: None,
        };
    }

    let count = children.len() as f64;
    Progress {
        current: children.iter().map(|child| child.ratio() / count).sum(),
        max: Some(1.0),
    }
}

/// Recompute an aggregate's progress, optionally patching one child first
///
/// `child_update` is `(child_id, new_progress)`; an unknown id is ignored.
pub fn update_progress(aggregate: &mut AggregateTrackable, child_update: Option<(&str, f64)>) {
    if let Some((child_id, progress)) = child_update {
        if let Some(child) = aggregate.children.iter_mut().find(|child| child.id == child_id) {
            child.progress = progress;
        }
    }

    let Progress { current, max } = get_progress(&aggregate.children);
    aggregate.progress = current;
    aggregate.max_progress = max;
}

/// Remove the child with `id`
pub fn remove_child(id: &str, parent: &mut AggregateTrackable) -> ChildRemoval {
    if let Some(index) = parent.children.iter().position(|child| child.id == id) {
        parent.children.remove(index);
    }

    if parent.children.is_empty() {
        return ChildRemoval::NowEmpty;
    }

    update_progress(parent, None);
    ChildRemoval::StillHasChildren
}

/// Set a child's status and report whether any child is still open
///
/// When no child remains Active or PendingProof, every child is detached
/// from the aggregate.
pub fn set_child_status(
    aggregate: &mut AggregateTrackable,
    child_id: &str,
    status: TrackableStatus,
) -> bool {
    let mut has_open_children = false;

    for child in &mut aggregate.children {
        if child.id == child_id {
            child.status = status;
        }
        if child.status.is_open() {
            has_open_children = true;
        }
    }

    if !has_open_children {
        for child in &mut aggregate.children {
            child.parent_id = None;
        }
    }

    has_open_children
}
