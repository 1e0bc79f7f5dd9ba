//! Subscription repository.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use crate::database::models::{DestinationRow, SubscriptionDbModel};
use crate::database::time::now_ms;
use crate::domain::{BroadcasterHandle, Destination, Subscription};
use crate::{Error, Result};

/// SQL expression folding a stored handle the same way
/// [`BroadcasterHandle::parse`] folds a bare handle. Rows written by another
/// process are matched through it.
pub(crate) const NORMALIZED_BROADCASTER: &str = "ltrim(lower(trim(broadcaster)), '@')";

/// Subscription data access.
///
/// The monitor only uses the read side; the write side is the surface the
/// command layer mutates concurrently.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Distinct broadcasters referenced by at least one subscription.
    async fn list_broadcasters(&self) -> Result<Vec<BroadcasterHandle>>;

    /// Every (subscriber, destination) routing row for a broadcaster.
    async fn list_destinations(&self, handle: &BroadcasterHandle) -> Result<Vec<Destination>>;

    /// Create a subscription. A duplicate triple is a `Conflict`.
    async fn create_subscription(
        &self,
        subscriber_id: i64,
        destination_id: i64,
        destination_label: &str,
        handle: &BroadcasterHandle,
    ) -> Result<Subscription>;

    async fn delete_subscription(&self, id: i64) -> Result<()>;

    async fn list_for_subscriber(&self, subscriber_id: i64) -> Result<Vec<Subscription>>;
}

/// SQLx implementation of SubscriptionRepository.
pub struct SqlxSubscriptionRepository {
    pool: SqlitePool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn list_broadcasters(&self) -> Result<Vec<BroadcasterHandle>> {
        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT {NORMALIZED_BROADCASTER} FROM subscriptions ORDER BY 1"
        ))
        .fetch_all(&self.pool)
        .await?;

        // Only list handles that list_destinations can route back to.
        let handles: BTreeSet<BroadcasterHandle> = rows
            .into_iter()
            .filter_map(|(folded,)| match BroadcasterHandle::parse(&folded) {
                Ok(handle) if handle.as_str() == folded => Some(handle),
                Ok(_) => {
                    warn!(broadcaster = %folded, "Skipping non-canonical broadcaster handle");
                    None
                }
                Err(e) => {
                    warn!(broadcaster = %folded, error = %e, "Skipping invalid broadcaster handle");
                    None
                }
            })
            .collect();

        Ok(handles.into_iter().collect())
    }

    async fn list_destinations(&self, handle: &BroadcasterHandle) -> Result<Vec<Destination>> {
        let rows = sqlx::query_as::<_, DestinationRow>(&format!(
            r#"
            SELECT subscriber_id, destination_id, destination_label
            FROM subscriptions
            WHERE {NORMALIZED_BROADCASTER} = ?
            ORDER BY destination_id, subscriber_id
            "#
        ))
        .bind(handle.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Destination::from).collect())
    }

    async fn create_subscription(
        &self,
        subscriber_id: i64,
        destination_id: i64,
        destination_label: &str,
        handle: &BroadcasterHandle,
    ) -> Result<Subscription> {
        let now = now_ms();
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                subscriber_id, destination_id, destination_label, broadcaster, created_at
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(subscriber_id)
        .bind(destination_id)
        .bind(destination_label)
        .bind(handle.as_str())
        .bind(now)
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(Error::conflict(format!(
                    "destination {} is already subscribed to {}",
                    destination_id, handle
                )));
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                return Err(Error::not_found("User", subscriber_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        SubscriptionDbModel {
            id,
            subscriber_id,
            destination_id,
            destination_label: destination_label.to_string(),
            broadcaster: handle.as_str().to_string(),
            created_at: now,
        }
        .try_into()
    }

    async fn delete_subscription(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Subscription", id.to_string()));
        }
        Ok(())
    }

    async fn list_for_subscriber(&self, subscriber_id: i64) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionDbModel>(
            "SELECT * FROM subscriptions WHERE subscriber_id = ? ORDER BY id",
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}
