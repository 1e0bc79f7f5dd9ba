//! Liveness row models.

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct LivenessDbModel {
    pub broadcaster: String,
    pub live: bool,
    pub checked: bool,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct LivenessMessageDbModel {
    pub destination_id: i64,
    pub message_id: i64,
}
