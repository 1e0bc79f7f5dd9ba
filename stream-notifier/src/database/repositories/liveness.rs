//! Liveness repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::begin_immediate;
use crate::database::models::{LivenessDbModel, LivenessMessageDbModel};
use crate::database::repositories::subscription::NORMALIZED_BROADCASTER;
use crate::database::time::now_ms;
use crate::domain::{BroadcasterHandle, LivenessRecord};

/// Per-broadcaster liveness bookkeeping, owned by the monitor.
#[async_trait]
pub trait LivenessRepository: Send + Sync {
    /// Load the record; a broadcaster never seen before is unchecked.
    async fn get_liveness(&self, handle: &BroadcasterHandle) -> Result<LivenessRecord>;

    /// Replace the record and its message ids atomically.
    async fn set_liveness(
        &self,
        handle: &BroadcasterHandle,
        live: bool,
        checked: bool,
        message_ids: &BTreeMap<i64, i64>,
    ) -> Result<()>;

    /// Drop records for broadcasters no subscription references any more.
    /// Returns the number of records removed.
    async fn prune_orphaned(&self) -> Result<u64>;
}

/// SQLx implementation of LivenessRepository.
pub struct SqlxLivenessRepository {
    pool: SqlitePool,
}

impl SqlxLivenessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LivenessRepository for SqlxLivenessRepository {
    async fn get_liveness(&self, handle: &BroadcasterHandle) -> Result<LivenessRecord> {
        let row = sqlx::query_as::<_, LivenessDbModel>(
            "SELECT * FROM broadcaster_liveness WHERE broadcaster = ?",
        )
        .bind(handle.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(LivenessRecord::unchecked());
        };

        let messages = sqlx::query_as::<_, LivenessMessageDbModel>(
            "SELECT destination_id, message_id FROM liveness_messages WHERE broadcaster = ?",
        )
        .bind(handle.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(LivenessRecord {
            live: row.live,
            checked: row.checked,
            message_ids: messages
                .into_iter()
                .map(|m| (m.destination_id, m.message_id))
                .collect(),
        })
    }

    async fn set_liveness(
        &self,
        handle: &BroadcasterHandle,
        live: bool,
        checked: bool,
        message_ids: &BTreeMap<i64, i64>,
    ) -> Result<()> {
        let mut tx = begin_immediate(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO broadcaster_liveness (broadcaster, live, checked, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(broadcaster) DO UPDATE SET
                live = excluded.live,
                checked = excluded.checked,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(handle.as_str())
        .bind(live)
        .bind(checked)
        .bind(now_ms())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM liveness_messages WHERE broadcaster = ?")
            .bind(handle.as_str())
            .execute(&mut *tx)
            .await?;

        for (destination_id, message_id) in message_ids {
            sqlx::query(
                "INSERT INTO liveness_messages (broadcaster, destination_id, message_id) VALUES (?, ?, ?)",
            )
            .bind(handle.as_str())
            .bind(destination_id)
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn prune_orphaned(&self) -> Result<u64> {
        let result = sqlx::query(&format!(
            r#"
            DELETE FROM broadcaster_liveness
            WHERE broadcaster NOT IN (SELECT DISTINCT {NORMALIZED_BROADCASTER} FROM subscriptions)
            "#
        ))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
