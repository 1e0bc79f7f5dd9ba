//! Delivery fan-out for detected transitions.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::gateway::{DeliveryError, MessagingGateway};
use super::message::MessageComposer;
use crate::Result;
use crate::database::repositories::{SubscriptionRepository, UserRepository};
use crate::domain::{BroadcasterHandle, StreamSnapshot};

/// Fan-out tuning.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Concurrent gateway calls within one privilege tier.
    pub max_concurrent_deliveries: usize,
    /// Upper bound for each send or delete.
    pub request_timeout: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_concurrent_deliveries: 8,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// One destination to notify, after collapsing duplicate routing rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub destination_id: i64,
    pub label: String,
    /// True if any subscriber routing this broadcaster here is privileged.
    pub privileged: bool,
}

/// Resolves destinations and dispatches announcements and retractions.
pub struct DeliveryFanout {
    subscriptions: Arc<dyn SubscriptionRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn MessagingGateway>,
    composer: MessageComposer,
    config: FanoutConfig,
}

impl DeliveryFanout {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<dyn MessagingGateway>,
        composer: MessageComposer,
        config: FanoutConfig,
    ) -> Self {
        Self {
            subscriptions,
            users,
            gateway,
            composer,
            config: FanoutConfig {
                max_concurrent_deliveries: config.max_concurrent_deliveries.max(1),
                ..config
            },
        }
    }

    /// Current destinations for `handle`, privileged ones first.
    ///
    /// Reads the store fresh every time; privilege is looked up once per
    /// subscriber within the call.
    pub async fn resolve_targets(&self, handle: &BroadcasterHandle) -> Result<Vec<DeliveryTarget>> {
        let rows = self.subscriptions.list_destinations(handle).await?;

        let mut privilege: HashMap<i64, bool> = HashMap::new();
        let mut targets: BTreeMap<i64, DeliveryTarget> = BTreeMap::new();

        for row in rows {
            let privileged = match privilege.get(&row.subscriber_id) {
                Some(p) => *p,
                None => {
                    let p = self.users.is_privileged(row.subscriber_id).await?;
                    privilege.insert(row.subscriber_id, p);
                    p
                }
            };

            targets
                .entry(row.destination_id)
                .and_modify(|t| t.privileged |= privileged)
                .or_insert(DeliveryTarget {
                    destination_id: row.destination_id,
                    label: row.label,
                    privileged,
                });
        }

        let (mut ordered, regular): (Vec<_>, Vec<_>) =
            targets.into_values().partition(|t| t.privileged);
        ordered.extend(regular);
        Ok(ordered)
    }

    /// Announce a live broadcast to every current destination.
    ///
    /// Returns the message id for each destination that accepted the message.
    /// Only destination resolution can fail; individual send failures are
    /// logged and leave that destination out of the result.
    pub async fn announce(
        &self,
        handle: &BroadcasterHandle,
        snapshot: &StreamSnapshot,
    ) -> Result<BTreeMap<i64, i64>> {
        let targets = self.resolve_targets(handle).await?;
        let total = targets.len();
        let (privileged, regular): (Vec<_>, Vec<_>) =
            targets.into_iter().partition(|t| t.privileged);

        let mut sent = BTreeMap::new();
        for tier in [privileged, regular] {
            if tier.is_empty() {
                continue;
            }
            let results = self.send_tier(handle, snapshot, tier).await;
            for (target, result) in results {
                match result {
                    Ok(message_id) => {
                        sent.insert(target.destination_id, message_id);
                    }
                    Err(e) => warn!(
                        broadcaster = %handle,
                        destination_id = target.destination_id,
                        destination = %target.label,
                        gateway = self.gateway.name(),
                        error = %e,
                        "Failed to deliver live announcement"
                    ),
                }
            }
        }

        info!(
            broadcaster = %handle,
            delivered = sent.len(),
            total,
            "Live announcement delivered"
        );
        Ok(sent)
    }

    async fn send_tier(
        &self,
        handle: &BroadcasterHandle,
        snapshot: &StreamSnapshot,
        tier: Vec<DeliveryTarget>,
    ) -> Vec<(DeliveryTarget, std::result::Result<i64, DeliveryError>)> {
        stream::iter(tier)
            .map(|target| async move {
                let text = self.composer.compose(handle, snapshot, target.privileged);
                let result = self
                    .bounded(self.gateway.send(target.destination_id, &text))
                    .await;
                (target, result)
            })
            .buffer_unordered(self.config.max_concurrent_deliveries)
            .collect()
            .await
    }

    /// Delete every recorded announcement. Returns how many were deleted.
    ///
    /// Failures are logged; the caller clears the recorded ids regardless.
    pub async fn retract(&self, handle: &BroadcasterHandle, message_ids: &BTreeMap<i64, i64>) -> usize {
        let results: Vec<_> = stream::iter(message_ids.iter().map(|(&d, &m)| (d, m)).collect::<Vec<_>>())
            .map(|(destination_id, message_id)| async move {
                let result = self
                    .bounded(self.gateway.delete(destination_id, message_id))
                    .await;
                (destination_id, message_id, result)
            })
            .buffer_unordered(self.config.max_concurrent_deliveries)
            .collect()
            .await;

        let mut deleted = 0;
        for (destination_id, message_id, result) in results {
            match result {
                Ok(()) => deleted += 1,
                Err(e) if e.is_permanent() => debug!(
                    broadcaster = %handle,
                    destination_id,
                    message_id,
                    error = %e,
                    "Announcement already gone"
                ),
                Err(e) => warn!(
                    broadcaster = %handle,
                    destination_id,
                    message_id,
                    error = %e,
                    "Failed to retract announcement"
                ),
            }
        }

        info!(
            broadcaster = %handle,
            deleted,
            recorded = message_ids.len(),
            "Live announcement retracted"
        );
        deleted
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, DeliveryError>>,
    ) -> std::result::Result<T, DeliveryError> {
        let timeout = self.config.request_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(DeliveryError::Timeout(timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GatewayCall, MemoryStore, RecordingGateway};

    const FOOTER: &str = "Sent with Notifier";

    fn fanout(store: &Arc<MemoryStore>, gateway: &Arc<RecordingGateway>) -> DeliveryFanout {
        DeliveryFanout::new(
            store.clone(),
            store.clone(),
            gateway.clone(),
            MessageComposer::new(FOOTER).unwrap(),
            FanoutConfig {
                max_concurrent_deliveries: 4,
                request_timeout: Duration::from_millis(200),
            },
        )
    }

    fn alice() -> BroadcasterHandle {
        BroadcasterHandle::parse("alice").unwrap()
    }

    fn snapshot() -> StreamSnapshot {
        StreamSnapshot {
            title: "Test".into(),
            category: "Just Chatting".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_privileged_tier_sent_first_without_footer() {
        let store = Arc::new(MemoryStore::new());
        store.subscribe(1, 100, "alice");
        store.subscribe(2, 200, "alice");
        store.set_privileged(2, true);
        let gateway = Arc::new(RecordingGateway::new());

        let ids = fanout(&store, &gateway).announce(&alice(), &snapshot()).await.unwrap();

        assert_eq!(ids.len(), 2);
        let sends = gateway.sends();
        assert_eq!(sends[0].0, 200);
        assert!(!sends[0].1.contains("Notifier"));
        assert_eq!(sends[1].0, 100);
        assert!(sends[1].1.contains("Notifier"));
    }

    #[tokio::test]
    async fn test_shared_destination_gets_one_message() {
        let store = Arc::new(MemoryStore::new());
        store.subscribe(1, 100, "alice");
        store.subscribe(2, 100, "alice");
        store.set_privileged(2, true);
        let gateway = Arc::new(RecordingGateway::new());

        let targets = fanout(&store, &gateway).resolve_targets(&alice()).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert!(targets[0].privileged);

        fanout(&store, &gateway).announce(&alice(), &snapshot()).await.unwrap();
        assert_eq!(gateway.sends().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_siblings() {
        let store = Arc::new(MemoryStore::new());
        store.subscribe(1, 100, "alice");
        store.subscribe(1, 200, "alice");
        store.subscribe(1, 300, "alice");
        let gateway = Arc::new(RecordingGateway::new());
        gateway.fail_destination(200, DeliveryError::Forbidden("kicked".into()));

        let ids = fanout(&store, &gateway).announce(&alice(), &snapshot()).await.unwrap();

        assert_eq!(ids.keys().copied().collect::<Vec<_>>(), vec![100, 300]);
        assert_eq!(gateway.sends().len(), 3);
    }

    #[tokio::test]
    async fn test_hung_send_times_out() {
        let store = Arc::new(MemoryStore::new());
        store.subscribe(1, 100, "alice");
        store.subscribe(1, 200, "alice");
        let gateway = Arc::new(RecordingGateway::new());
        gateway.hang_destination(100);

        let ids = fanout(&store, &gateway).announce(&alice(), &snapshot()).await.unwrap();

        assert!(!ids.contains_key(&100));
        assert!(ids.contains_key(&200));
    }

    #[tokio::test]
    async fn test_store_failure_aborts_before_sending() {
        let store = Arc::new(MemoryStore::new());
        store.subscribe(1, 100, "alice");
        store.fail_reads(true);
        let gateway = Arc::new(RecordingGateway::new());

        let result = fanout(&store, &gateway).announce(&alice(), &snapshot()).await;

        assert!(result.unwrap_err().is_store_error());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retract_deletes_exactly_recorded_ids() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        gateway.fail_delete(200, DeliveryError::NotFound("message to delete not found".into()));

        let recorded = BTreeMap::from([(100, 11), (200, 22)]);
        let deleted = fanout(&store, &gateway).retract(&alice(), &recorded).await;

        assert_eq!(deleted, 1);
        let mut deletes: Vec<_> = gateway
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Delete {
                    destination_id,
                    message_id,
                } => Some((destination_id, message_id)),
                _ => None,
            })
            .collect();
        deletes.sort();
        assert_eq!(deletes, vec![(100, 11), (200, 22)]);
    }
}
