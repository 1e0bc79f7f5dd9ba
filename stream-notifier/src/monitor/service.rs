//! Stream Monitor service implementation.
//!
//! The StreamMonitor runs the check/diff/deliver/persist pipeline for one
//! broadcaster at a time. The scheduler decides which broadcasters run when.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::detector::StatusProvider;
use crate::Result;
use crate::database::repositories::{LivenessRepository, SubscriptionRepository};
use crate::domain::{BroadcasterHandle, LivenessState, Transition};
use crate::notification::DeliveryFanout;

pub struct StreamMonitor {
    subscriptions: Arc<dyn SubscriptionRepository>,
    liveness: Arc<dyn LivenessRepository>,
    provider: Arc<dyn StatusProvider>,
    fanout: DeliveryFanout,
}

impl StreamMonitor {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        liveness: Arc<dyn LivenessRepository>,
        provider: Arc<dyn StatusProvider>,
        fanout: DeliveryFanout,
    ) -> Self {
        Self {
            subscriptions,
            liveness,
            provider,
            fanout,
        }
    }

    /// Distinct broadcasters with at least one subscription, read fresh.
    pub async fn list_broadcasters(&self) -> Result<Vec<BroadcasterHandle>> {
        self.subscriptions.list_broadcasters().await
    }

    /// Remove liveness records nobody subscribes to any more.
    pub async fn prune_orphaned(&self) -> Result<u64> {
        self.liveness.prune_orphaned().await
    }

    /// Check one broadcaster and act on whatever transition it made.
    ///
    /// A store error aborts this broadcaster for the current tick; since the
    /// record is only written at the end, the next tick sees the same previous
    /// state and retries. Delivery failures never surface here.
    pub async fn process_broadcaster(&self, handle: &BroadcasterHandle) -> Result<Transition> {
        let mut record = self.liveness.get_liveness(handle).await?;
        let previous = record.state();

        let status = self.provider.check(handle).await;

        // A failed check never ends a live broadcast; wait for a real answer.
        if status.is_unavailable() && previous == LivenessState::Live {
            debug!(broadcaster = %handle, "Status unavailable, keeping live record");
            return Ok(Transition::Unchanged);
        }

        let transition = record.observe(status.is_live());

        match transition {
            Transition::Announce => {
                let snapshot = status.snapshot().cloned().unwrap_or_default();
                record.message_ids = self.fanout.announce(handle, &snapshot).await?;
            }
            Transition::Retract => {
                self.fanout.retract(handle, &record.message_ids).await;
                record.message_ids.clear();
            }
            Transition::Initialize | Transition::Unchanged => {}
        }

        if transition.needs_persist() {
            if let Err(e) = self
                .liveness
                .set_liveness(handle, record.live, record.checked, &record.message_ids)
                .await
            {
                error!(
                    broadcaster = %handle,
                    transition = %transition,
                    error = %e,
                    "Failed to persist liveness after transition"
                );
                return Err(e);
            }
            info!(
                broadcaster = %handle,
                from = %previous,
                to = %record.state(),
                transition = %transition,
                "Liveness transition recorded"
            );
        } else {
            debug!(broadcaster = %handle, state = %previous, "No liveness change");
        }

        Ok(transition)
    }
}
