//! In-memory fakes shared by unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::models::UserDbModel;
use crate::database::repositories::{LivenessRepository, SubscriptionRepository, UserRepository};
use crate::domain::{BroadcasterHandle, Destination, LivenessRecord, StreamSnapshot, Subscription};
use crate::monitor::{LiveStatus, StatusProvider};
use crate::notification::{DeliveryError, MessagingGateway};
use crate::{Error, Result};

fn injected() -> Error {
    Error::Database("injected failure".to_string())
}

#[derive(Default)]
struct StoreState {
    next_id: i64,
    subscriptions: Vec<Subscription>,
    users: HashMap<i64, Option<String>>,
    privileged: HashSet<i64>,
    liveness: HashMap<String, LivenessRecord>,
    liveness_writes: usize,
    fail_reads: bool,
    fail_liveness: bool,
}

/// Subscription, user and liveness store in one.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber_id: i64, destination_id: i64, handle: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.subscriptions.push(Subscription {
            id,
            subscriber_id,
            destination_id,
            destination_label: format!("chat-{destination_id}"),
            broadcaster: BroadcasterHandle::parse(handle).unwrap(),
            created_at: Utc::now(),
        });
    }

    pub fn unsubscribe_all(&self, handle: &str) {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .retain(|s| s.broadcaster.as_str() != handle);
    }

    pub fn set_privileged(&self, subscriber_id: i64, privileged: bool) {
        let mut state = self.state.lock().unwrap();
        if privileged {
            state.privileged.insert(subscriber_id);
        } else {
            state.privileged.remove(&subscriber_id);
        }
    }

    /// Make subscription and privilege reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    /// Make liveness reads and writes fail.
    pub fn fail_liveness(&self, fail: bool) {
        self.state.lock().unwrap().fail_liveness = fail;
    }

    pub fn liveness(&self, handle: &str) -> LivenessRecord {
        self.state
            .lock()
            .unwrap()
            .liveness
            .get(handle)
            .cloned()
            .unwrap_or_default()
    }

    pub fn put_liveness(&self, handle: &str, record: LivenessRecord) {
        self.state
            .lock()
            .unwrap()
            .liveness
            .insert(handle.to_string(), record);
    }

    pub fn has_liveness(&self, handle: &str) -> bool {
        self.state.lock().unwrap().liveness.contains_key(handle)
    }

    pub fn liveness_writes(&self) -> usize {
        self.state.lock().unwrap().liveness_writes
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn list_broadcasters(&self) -> Result<Vec<BroadcasterHandle>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(injected());
        }
        let mut handles: Vec<_> = state
            .subscriptions
            .iter()
            .map(|s| s.broadcaster.clone())
            .collect();
        handles.sort();
        handles.dedup();
        Ok(handles)
    }

    async fn list_destinations(&self, handle: &BroadcasterHandle) -> Result<Vec<Destination>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(injected());
        }
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| &s.broadcaster == handle)
            .map(|s| Destination::new(s.subscriber_id, s.destination_id, s.destination_label.clone()))
            .collect())
    }

    async fn create_subscription(
        &self,
        subscriber_id: i64,
        destination_id: i64,
        destination_label: &str,
        handle: &BroadcasterHandle,
    ) -> Result<Subscription> {
        let mut state = self.state.lock().unwrap();
        if state.subscriptions.iter().any(|s| {
            s.subscriber_id == subscriber_id
                && s.destination_id == destination_id
                && &s.broadcaster == handle
        }) {
            return Err(Error::conflict("duplicate subscription"));
        }
        state.next_id += 1;
        let subscription = Subscription {
            id: state.next_id,
            subscriber_id,
            destination_id,
            destination_label: destination_label.to_string(),
            broadcaster: handle.clone(),
            created_at: Utc::now(),
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn delete_subscription(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        if state.subscriptions.len() == before {
            return Err(Error::not_found("Subscription", id.to_string()));
        }
        Ok(())
    }

    async fn list_for_subscriber(&self, subscriber_id: i64) -> Result<Vec<Subscription>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.subscriber_id == subscriber_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn upsert_user(&self, telegram_id: i64, username: Option<&str>) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(telegram_id, username.map(str::to_string));
        Ok(())
    }

    async fn find_by_id(&self, telegram_id: i64) -> Result<Option<UserDbModel>> {
        let state = self.state.lock().unwrap();
        Ok(state.users.get(&telegram_id).map(|username| UserDbModel {
            telegram_id,
            username: username.clone(),
            privileged_until: None,
            created_at: 0,
        }))
    }

    async fn is_privileged(&self, telegram_id: i64) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(injected());
        }
        Ok(state.privileged.contains(&telegram_id))
    }

    async fn grant_privilege(&self, telegram_id: i64, _until: DateTime<Utc>) -> Result<()> {
        self.set_privileged(telegram_id, true);
        Ok(())
    }

    async fn revoke_privilege(&self, telegram_id: i64) -> Result<()> {
        self.set_privileged(telegram_id, false);
        Ok(())
    }
}

#[async_trait]
impl LivenessRepository for MemoryStore {
    async fn get_liveness(&self, handle: &BroadcasterHandle) -> Result<LivenessRecord> {
        let state = self.state.lock().unwrap();
        if state.fail_liveness {
            return Err(injected());
        }
        Ok(state.liveness.get(handle.as_str()).cloned().unwrap_or_default())
    }

    async fn set_liveness(
        &self,
        handle: &BroadcasterHandle,
        live: bool,
        checked: bool,
        message_ids: &BTreeMap<i64, i64>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_liveness {
            return Err(injected());
        }
        state.liveness_writes += 1;
        state.liveness.insert(
            handle.to_string(),
            LivenessRecord {
                live,
                checked,
                message_ids: message_ids.clone(),
            },
        );
        Ok(())
    }

    async fn prune_orphaned(&self) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let referenced: HashSet<String> = state
            .subscriptions
            .iter()
            .map(|s| s.broadcaster.to_string())
            .collect();
        let before = state.liveness.len();
        state.liveness.retain(|handle, _| referenced.contains(handle));
        Ok((before - state.liveness.len()) as u64)
    }
}

/// Status provider answering from a script.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    statuses: Mutex<HashMap<String, LiveStatus>>,
    delay: Mutex<Option<Duration>>,
    handle_delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_live(&self, handle: &str, title: &str, category: &str) {
        let snapshot = StreamSnapshot {
            title: title.to_string(),
            category: category.to_string(),
            ..Default::default()
        };
        self.statuses
            .lock()
            .unwrap()
            .insert(handle.to_string(), LiveStatus::Live(snapshot));
    }

    pub fn set_offline(&self, handle: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(handle.to_string(), LiveStatus::Offline);
    }

    /// Make checks for `handle` fail as a provider error would.
    pub fn set_unavailable(&self, handle: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(handle.to_string(), LiveStatus::Unavailable);
    }

    /// Make every check take this long.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Make checks for `handle` take this long, overriding [`Self::set_delay`].
    pub fn set_delay_for(&self, handle: &str, delay: Duration) {
        self.handle_delays
            .lock()
            .unwrap()
            .insert(handle.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProvider for ScriptedProvider {
    async fn check(&self, handle: &BroadcasterHandle) -> LiveStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .handle_delays
            .lock()
            .unwrap()
            .get(handle.as_str())
            .copied()
            .or(*self.delay.lock().unwrap());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.statuses
            .lock()
            .unwrap()
            .get(handle.as_str())
            .cloned()
            .unwrap_or(LiveStatus::Offline)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GatewayCall {
    Send { destination_id: i64, text: String },
    Delete { destination_id: i64, message_id: i64 },
}

struct GatewayState {
    calls: Vec<GatewayCall>,
    next_message_id: i64,
    send_failures: HashMap<i64, DeliveryError>,
    delete_failures: HashMap<i64, DeliveryError>,
    hanging: HashSet<i64>,
}

/// Gateway that records every call and hands out sequential message ids.
pub(crate) struct RecordingGateway {
    state: Mutex<GatewayState>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState {
                calls: Vec::new(),
                next_message_id: 1000,
                send_failures: HashMap::new(),
                delete_failures: HashMap::new(),
                hanging: HashSet::new(),
            }),
        }
    }

    pub fn fail_destination(&self, destination_id: i64, error: DeliveryError) {
        self.state
            .lock()
            .unwrap()
            .send_failures
            .insert(destination_id, error);
    }

    pub fn fail_delete(&self, destination_id: i64, error: DeliveryError) {
        self.state
            .lock()
            .unwrap()
            .delete_failures
            .insert(destination_id, error);
    }

    /// Sends to this destination never complete.
    pub fn hang_destination(&self, destination_id: i64) {
        self.state.lock().unwrap().hanging.insert(destination_id);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn sends(&self) -> Vec<(i64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Send {
                    destination_id,
                    text,
                } => Some((destination_id, text)),
                GatewayCall::Delete { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, destination_id: i64, text: &str) -> std::result::Result<i64, DeliveryError> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(GatewayCall::Send {
                destination_id,
                text: text.to_string(),
            });
            if state.hanging.contains(&destination_id) {
                None
            } else if let Some(err) = state.send_failures.get(&destination_id) {
                Some(Err(err.clone()))
            } else {
                state.next_message_id += 1;
                Some(Ok(state.next_message_id))
            }
        };

        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn delete(&self, destination_id: i64, message_id: i64) -> std::result::Result<(), DeliveryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(GatewayCall::Delete {
            destination_id,
            message_id,
        });
        match state.delete_failures.get(&destination_id) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
