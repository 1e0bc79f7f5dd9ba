//! Subscriber row model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::ms_to_datetime;
use crate::domain::Privilege;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserDbModel {
    /// Telegram user id.
    pub telegram_id: i64,
    pub username: Option<String>,
    /// Unix epoch milliseconds (UTC) the entitlement lapses at.
    pub privileged_until: Option<i64>,
    /// Unix epoch milliseconds (UTC) when the user was created.
    pub created_at: i64,
}

impl UserDbModel {
    pub fn privilege(&self) -> Privilege {
        Privilege {
            privileged_until: self.privileged_until.map(ms_to_datetime),
        }
    }
}
