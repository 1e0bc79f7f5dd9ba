//! Subscriber repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::models::UserDbModel;
use crate::database::time::{datetime_to_ms, now_ms};
use crate::{Error, Result};

/// Subscriber data access.
///
/// Privilege is written by the entitlement flow; the monitor only asks
/// [`UserRepository::is_privileged`], fresh on every transition.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a subscriber, or refresh the username of an existing one.
    async fn upsert_user(&self, telegram_id: i64, username: Option<&str>) -> Result<()>;

    async fn find_by_id(&self, telegram_id: i64) -> Result<Option<UserDbModel>>;

    /// Whether the subscriber has an unexpired entitlement. Unknown users are
    /// not privileged.
    async fn is_privileged(&self, telegram_id: i64) -> Result<bool>;

    async fn grant_privilege(&self, telegram_id: i64, until: DateTime<Utc>) -> Result<()>;

    async fn revoke_privilege(&self, telegram_id: i64) -> Result<()>;
}

/// SQLx implementation of UserRepository.
pub struct SqlxUserRepository {
    pool: SqlitePool,
}

impl SqlxUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn set_privileged_until(&self, telegram_id: i64, until: Option<i64>) -> Result<()> {
        let result = sqlx::query("UPDATE users SET privileged_until = ? WHERE telegram_id = ?")
            .bind(until)
            .bind(telegram_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("User", telegram_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn upsert_user(&self, telegram_id: i64, username: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (telegram_id, username, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(telegram_id) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(telegram_id)
        .bind(username)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, telegram_id: i64) -> Result<Option<UserDbModel>> {
        let user = sqlx::query_as::<_, UserDbModel>("SELECT * FROM users WHERE telegram_id = ?")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn is_privileged(&self, telegram_id: i64) -> Result<bool> {
        Ok(self
            .find_by_id(telegram_id)
            .await?
            .is_some_and(|user| user.privilege().is_active()))
    }

    async fn grant_privilege(&self, telegram_id: i64, until: DateTime<Utc>) -> Result<()> {
        self.set_privileged_until(telegram_id, Some(datetime_to_ms(until)))
            .await
    }

    async fn revoke_privilege(&self, telegram_id: i64) -> Result<()> {
        self.set_privileged_until(telegram_id, None).await
    }
}
