//! Per-broadcaster liveness state machine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Coarse liveness state derived from a [`LivenessRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LivenessState {
    /// Never polled.
    Unknown,
    Offline,
    Live,
}

/// Outcome of feeding one observation into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Entered LIVE (from UNKNOWN or OFFLINE): notify every destination.
    Announce,
    /// LIVE -> OFFLINE: delete the recorded messages.
    Retract,
    /// First poll found the broadcaster offline. Nothing to send.
    Initialize,
    /// LIVE -> LIVE or OFFLINE -> OFFLINE.
    Unchanged,
}

impl Transition {
    /// Whether the record changed and must be written back.
    pub fn needs_persist(&self) -> bool {
        !matches!(self, Transition::Unchanged)
    }
}

/// Persisted liveness bookkeeping for one broadcaster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessRecord {
    pub live: bool,
    pub checked: bool,
    /// Announcement message id per destination, present only while live.
    pub message_ids: BTreeMap<i64, i64>,
}

impl LivenessRecord {
    /// Record for a broadcaster that has never been polled.
    pub fn unchecked() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LivenessState {
        match (self.checked, self.live) {
            (false, _) => LivenessState::Unknown,
            (true, false) => LivenessState::Offline,
            (true, true) => LivenessState::Live,
        }
    }

    /// Apply an observation and report which transition it caused.
    ///
    /// Leaves `message_ids` alone; the caller fills them in after an announce
    /// and clears them after a retract.
    pub fn observe(&mut self, obs_live: bool) -> Transition {
        let transition = match (self.state(), obs_live) {
            (LivenessState::Unknown, true) | (LivenessState::Offline, true) => Transition::Announce,
            (LivenessState::Unknown, false) => Transition::Initialize,
            (LivenessState::Live, false) => Transition::Retract,
            (LivenessState::Live, true) | (LivenessState::Offline, false) => Transition::Unchanged,
        };

        self.checked = true;
        self.live = obs_live;
        transition
    }
}
