//! Trackable connections, aggregates and the activity feed
//!
//! All connection edits go through [`Connection::splice`]. An edit against a
//! connection that was never fetched is a no-op and reports `false`.

use super::cache::{self, Audience, ConnectionKey, EntityKind, StoreKey};
use super::LocalDatabase;
use crate::client::error::Result;
use crate::shared::aggregate::{self, AggregateTrackable, ChildRemoval};
use crate::shared::connection::{Connection, Placement};
use crate::shared::error::SharedError;
use crate::shared::trackable::{Activity, ActivityKind, TrackableNode, TrackableStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Active or archived trackables, keyed by an integer cursor
pub type TrackableConnection = Connection<TrackableNode, i64>;

/// Activity feed, keyed by date in milliseconds
pub type ActivityConnection = Connection<Activity, i64>;

fn active_cursor(node: &TrackableNode) -> i64 {
    node.order
}

fn archive_cursor(node: &TrackableNode) -> i64 {
    node.archive_cursor()
}

impl LocalDatabase {
    /// Create an empty connection unless one is already cached
    ///
    /// Returns whether a connection was created.
    pub async fn init_connection(&self, key: &ConnectionKey) -> Result<bool> {
        let created = self
            .insert_if_absent(&StoreKey::connection(key), &Connection::<Value, Value>::default())
            .await?;
        if created {
            tracing::debug!("[STORE] Initialized connection {}", key);
        }
        Ok(created)
    }

    pub async fn read_active_trackables(&self, user_id: &str) -> Result<Option<TrackableConnection>> {
        self.read(&StoreKey::connection(&ConnectionKey::active_trackables(user_id)))
            .await
    }

    /// Splice the active list, ordered by `order` descending
    pub async fn splice_active_trackables(
        &self,
        user_id: &str,
        ids_to_remove: &[&str],
        items_to_add: Vec<TrackableNode>,
    ) -> Result<bool> {
        let key = StoreKey::connection(&ConnectionKey::active_trackables(user_id));
        let spliced = self
            .update(&key, |connection: &mut TrackableConnection| {
                connection.splice(ids_to_remove, items_to_add, active_cursor, Placement::Descending)
            })
            .await?;
        Ok(spliced.is_some())
    }

    /// Re-sort the active list after orders changed
    pub async fn reorder_active_trackables(&self, user_id: &str) -> Result<bool> {
        let key = StoreKey::connection(&ConnectionKey::active_trackables(user_id));
        let sorted = self
            .update(&key, |connection: &mut TrackableConnection| {
                connection.sort_descending(active_cursor)
            })
            .await?;
        Ok(sorted.is_some())
    }

    pub async fn read_archived_trackables(
        &self,
        user_id: &str,
        status: TrackableStatus,
    ) -> Result<Option<TrackableConnection>> {
        self.read(&StoreKey::connection(&ConnectionKey::archived_trackables(
            user_id, status,
        )))
        .await
    }

    /// Splice an archived list, ordered by status change date descending
    pub async fn splice_archived_trackables(
        &self,
        user_id: &str,
        status: TrackableStatus,
        ids_to_remove: &[&str],
        items_to_add: Vec<TrackableNode>,
    ) -> Result<bool> {
        let key = StoreKey::connection(&ConnectionKey::archived_trackables(user_id, status));
        let spliced = self
            .update(&key, |connection: &mut TrackableConnection| {
                connection.splice(ids_to_remove, items_to_add, archive_cursor, Placement::Descending)
            })
            .await?;
        Ok(spliced.is_some())
    }

    pub async fn read_trackable(&self, id: &str) -> Result<Option<TrackableNode>> {
        self.read(&StoreKey::new(EntityKind::Trackable, id)).await
    }

    pub async fn write_trackable(&self, node: &TrackableNode) -> Result<()> {
        self.write(&StoreKey::new(EntityKind::Trackable, node.id.as_str()), node)
            .await
    }

    pub async fn read_activities(&self, audience: Audience) -> Result<Option<ActivityConnection>> {
        self.read(&StoreKey::connection(&ConnectionKey::Activities { audience }))
            .await
    }

    /// Store an activity and add it to the user's own feed
    pub async fn prepend_activity(&self, activity: &Activity) -> Result<bool> {
        self.write(&StoreKey::new(EntityKind::Activity, activity.id.as_str()), activity)
            .await?;

        let key = StoreKey::connection(&ConnectionKey::Activities {
            audience: Audience::Me,
        });
        let item = activity.clone();
        let spliced = self
            .update(&key, |connection: &mut ActivityConnection| {
                connection.splice(&[], vec![item], Activity::cursor, Placement::Descending)
            })
            .await?;
        Ok(spliced.is_some())
    }

    pub async fn read_aggregate(&self, id: &str) -> Result<Option<AggregateTrackable>> {
        self.read(&StoreKey::new(EntityKind::Aggregate, id)).await
    }

    pub async fn write_aggregate(&self, aggregate: &AggregateTrackable) -> Result<()> {
        self.write(&StoreKey::new(EntityKind::Aggregate, aggregate.id()), aggregate)
            .await
    }

    /// Set one child's progress and return the aggregate's new progress
    ///
    /// Fails when the aggregate is cached but has no such child.
    pub async fn update_aggregate_child_progress(
        &self,
        aggregate_id: &str,
        child_id: &str,
        progress: f64,
    ) -> Result<Option<f64>> {
        let key = StoreKey::new(EntityKind::Aggregate, aggregate_id);
        let updated = self
            .update(&key, |aggregate: &mut AggregateTrackable| {
                if !aggregate.children().iter().any(|child| child.id == child_id) {
                    return None;
                }
                aggregate::update_progress(aggregate, Some((child_id, progress)));
                Some(aggregate.progress())
            })
            .await?;

        match updated {
            None => Ok(None),
            Some(None) => Err(SharedError::invalid_trackable(
                child_id,
                format!("not a child of aggregate {}", aggregate_id),
            )
            .into()),
            Some(Some(progress)) => Ok(Some(progress)),
        }
    }

    /// Set one child's status; returns whether any child is still open
    pub async fn set_aggregate_child_status(
        &self,
        aggregate_id: &str,
        child_id: &str,
        status: TrackableStatus,
    ) -> Result<Option<bool>> {
        let key = StoreKey::new(EntityKind::Aggregate, aggregate_id);
        self.update(&key, |aggregate: &mut AggregateTrackable| {
            aggregate::set_child_status(aggregate, child_id, status)
        })
        .await
    }

    /// Remove a child from a cached aggregate
    ///
    /// An aggregate left without children is deleted and spliced out of
    /// the user's active list. Runs in one transaction.
    pub async fn remove_aggregate_child(
        &self,
        user_id: &str,
        aggregate_id: &str,
        child_id: &str,
    ) -> Result<Option<ChildRemoval>> {
        let aggregate_key = StoreKey::new(EntityKind::Aggregate, aggregate_id);
        let mut tx = self.pool().begin().await?;

        let Some(mut aggregate) = cache::fetch::<AggregateTrackable, _>(&mut *tx, &aggregate_key).await?
        else {
            return Ok(None);
        };

        let removal = aggregate::remove_child(child_id, &mut aggregate);
        match removal {
            ChildRemoval::NowEmpty => {
                cache::delete(&mut *tx, &aggregate_key).await?;

                let active_key = StoreKey::connection(&ConnectionKey::active_trackables(user_id));
                if let Some(mut active) =
                    cache::fetch::<TrackableConnection, _>(&mut *tx, &active_key).await?
                {
                    active.splice(&[aggregate_id], Vec::new(), active_cursor, Placement::Descending);
                    cache::store(&mut *tx, &active_key, &active).await?;
                }
                tracing::debug!("[STORE] Removed empty aggregate {}", aggregate_id);
            }
            ChildRemoval::StillHasChildren => {
                cache::store(&mut *tx, &aggregate_key, &aggregate).await?;
            }
        }

        tx.commit().await?;
        Ok(Some(removal))
    }

    /// Move every overdue Active entry of the user's active list to the
    /// Expired archive, recording one activity each
    ///
    /// The active list is read and rewritten inside one transaction, so an
    /// entry changed concurrently is judged by its latest state. Returns the
    /// expired ids, or `None` when no active list is cached.
    pub async fn expire_overdue_trackables(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<String>>> {
        let active_key = StoreKey::connection(&ConnectionKey::active_trackables(user_id));
        let mut tx = self.pool().begin().await?;

        let Some(mut active) = cache::fetch::<TrackableConnection, _>(&mut *tx, &active_key).await?
        else {
            return Ok(None);
        };

        let expired: Vec<TrackableNode> = active
            .nodes()
            .filter(|node| node.is_past_deadline(now))
            .cloned()
            .map(|mut node| {
                node.status = TrackableStatus::Expired;
                node.status_change_date = Some(now);
                node
            })
            .collect();
        if expired.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let ids: Vec<String> = expired.iter().map(|node| node.id.clone()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        for node in &expired {
            cache::store(&mut *tx, &StoreKey::new(EntityKind::Trackable, node.id.as_str()), node)
                .await?;
        }

        active.splice(&id_refs, Vec::new(), active_cursor, Placement::Descending);
        cache::store(&mut *tx, &active_key, &active).await?;

        let archive_key = StoreKey::connection(&ConnectionKey::archived_trackables(
            user_id,
            TrackableStatus::Expired,
        ));
        if let Some(mut archived) =
            cache::fetch::<TrackableConnection, _>(&mut *tx, &archive_key).await?
        {
            archived.splice(&[], expired, archive_cursor, Placement::Descending);
            cache::store(&mut *tx, &archive_key, &archived).await?;
        }

        let feed_key = StoreKey::connection(&ConnectionKey::Activities {
            audience: Audience::Me,
        });
        let mut feed = cache::fetch::<ActivityConnection, _>(&mut *tx, &feed_key).await?;
        for id in &ids {
            let activity = Activity::new(ActivityKind::GoalExpired, now, Some(id.clone()), user_id);
            cache::store(
                &mut *tx,
                &StoreKey::new(EntityKind::Activity, activity.id.as_str()),
                &activity,
            )
            .await?;
            if let Some(feed) = feed.as_mut() {
                feed.splice(&[], vec![activity], Activity::cursor, Placement::Descending);
            }
        }
        if let Some(feed) = &feed {
            cache::store(&mut *tx, &feed_key, feed).await?;
        }

        tx.commit().await?;
        Ok(Some(ids))
    }
}
