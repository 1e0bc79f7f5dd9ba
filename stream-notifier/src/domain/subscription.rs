//! Subscriptions, destinations and subscriber privilege.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BroadcasterHandle;

/// A (subscriber, destination, broadcaster) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub subscriber_id: i64,
    pub destination_id: i64,
    /// Human-readable destination name (channel title or @username).
    pub destination_label: String,
    pub broadcaster: BroadcasterHandle,
    pub created_at: DateTime<Utc>,
}

/// One routing row for a broadcaster: where to deliver and on whose behalf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub subscriber_id: i64,
    pub destination_id: i64,
    pub label: String,
}

impl Destination {
    pub fn new(subscriber_id: i64, destination_id: i64, label: impl Into<String>) -> Self {
        Self {
            subscriber_id,
            destination_id,
            label: label.into(),
        }
    }
}

/// Subscriber entitlement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub privileged_until: Option<DateTime<Utc>>,
}

impl Privilege {
    pub fn until(expiry: DateTime<Utc>) -> Self {
        Self {
            privileged_until: Some(expiry),
        }
    }

    /// Active iff an expiry is set and lies strictly in the future.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.privileged_until.is_some_and(|until| until > now)
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}
