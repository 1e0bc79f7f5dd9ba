//! Subscription row model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Result;
use crate::database::time::ms_to_datetime;
use crate::domain::{BroadcasterHandle, Destination, Subscription};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubscriptionDbModel {
    pub id: i64,
    pub subscriber_id: i64,
    pub destination_id: i64,
    pub destination_label: String,
    pub broadcaster: String,
    pub created_at: i64,
}

impl TryFrom<SubscriptionDbModel> for Subscription {
    type Error = crate::Error;

    fn try_from(row: SubscriptionDbModel) -> Result<Self> {
        Ok(Subscription {
            id: row.id,
            subscriber_id: row.subscriber_id,
            destination_id: row.destination_id,
            destination_label: row.destination_label,
            broadcaster: BroadcasterHandle::parse(&row.broadcaster)?,
            created_at: ms_to_datetime(row.created_at),
        })
    }
}

/// Projection used by `list_destinations`.
#[derive(Debug, Clone, FromRow)]
pub struct DestinationRow {
    pub subscriber_id: i64,
    pub destination_id: i64,
    pub destination_label: String,
}

impl From<DestinationRow> for Destination {
    fn from(row: DestinationRow) -> Self {
        Destination::new(row.subscriber_id, row.destination_id, row.destination_label)
    }
}
