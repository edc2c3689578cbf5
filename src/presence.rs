//! Online presence.
//!
//! A [`PresenceHub`] hands out at most one live [`PresenceChannel`] per channel
//! name. The channel is an owned resource: whoever opened it tracks members
//! through it and tears it down with [`PresenceChannel::close`] (or by dropping
//! it), which frees the name for the next `open`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::broadcast;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Channel used for the site-wide online indicator.
pub const ONLINE_CHANNEL: &str = "online-users";

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    #[error("presence channel {0:?} already has an active subscription")]
    AlreadySubscribed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PresenceStatus {
    #[default]
    Online,
    Away,
    Busy,
}

/// PresenceEntry
///
/// One tracked member of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PresenceEntry {
    pub user_id: Uuid,
    pub status: PresenceStatus,
    #[ts(type = "string")]
    pub online_at: DateTime<Utc>,
}

/// Body of POST /presence.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TrackPresenceRequest {
    #[serde(default)]
    pub status: PresenceStatus,
}

/// Membership changes broadcast to channel subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum PresenceEvent {
    Join(PresenceEntry),
    Update(PresenceEntry),
    Leave { user_id: Uuid },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Presence state stays usable even if a holder panicked mid-update.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// PresenceHub
///
/// Registry of the channel names that currently have a live handle.
#[derive(Debug, Default)]
pub struct PresenceHub {
    active: Mutex<HashSet<String>>,
}

impl PresenceHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// open
    ///
    /// Claims `name` and returns its handle. Fails while another handle for the
    /// same name is alive.
    pub fn open(self: &Arc<Self>, name: &str) -> Result<PresenceChannel, PresenceError> {
        if !lock(&self.active).insert(name.to_string()) {
            return Err(PresenceError::AlreadySubscribed(name.to_string()));
        }

        let (events, _) = broadcast::channel(EVENT_BUFFER);
        tracing::debug!(channel = name, "presence channel opened");

        Ok(PresenceChannel {
            name: name.to_string(),
            hub: Arc::clone(self),
            members: Mutex::new(HashMap::new()),
            events,
        })
    }

    pub fn is_open(&self, name: &str) -> bool {
        lock(&self.active).contains(name)
    }

    fn release(&self, name: &str) {
        lock(&self.active).remove(name);
    }
}

/// PresenceChannel
///
/// The live handle for one channel. Holds the member set and the event fan-out.
#[derive(Debug)]
pub struct PresenceChannel {
    name: String,
    hub: Arc<PresenceHub>,
    members: Mutex<HashMap<Uuid, PresenceEntry>>,
    events: broadcast::Sender<PresenceEvent>,
}

impl PresenceChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// track
    ///
    /// Marks `user_id` present with `status`. Re-tracking an existing member
    /// updates the status but keeps the original `online_at`.
    pub fn track(&self, user_id: Uuid, status: PresenceStatus) -> PresenceEntry {
        let mut members = lock(&self.members);
        let (entry, event) = match members.get_mut(&user_id) {
            Some(existing) => {
                existing.status = status;
                (existing.clone(), PresenceEvent::Update(existing.clone()))
            }
            None => {
                let entry = PresenceEntry {
                    user_id,
                    status,
                    online_at: Utc::now(),
                };
                members.insert(user_id, entry.clone());
                (entry.clone(), PresenceEvent::Join(entry))
            }
        };
        drop(members);

        // No receivers is not an error: nobody is listening yet.
        let _ = self.events.send(event);
        entry
    }

    /// untrack
    ///
    /// Removes `user_id`. Returns false when the user was not tracked.
    pub fn untrack(&self, user_id: Uuid) -> bool {
        let removed = lock(&self.members).remove(&user_id).is_some();
        if removed {
            let _ = self.events.send(PresenceEvent::Leave { user_id });
        }
        removed
    }

    /// sync
    ///
    /// Snapshot of the current members, oldest first.
    pub fn sync(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = lock(&self.members).values().cloned().collect();
        entries.sort_by(|a, b| a.online_at.cmp(&b.online_at).then(a.user_id.cmp(&b.user_id)));
        entries
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        lock(&self.members).contains_key(&user_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.events.subscribe()
    }

    /// close
    ///
    /// Tears the channel down and frees its name.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for PresenceChannel {
    fn drop(&mut self) {
        self.hub.release(&self.name);
        tracing::debug!(channel = %self.name, "presence channel closed");
    }
}

/// PresenceState
///
/// The online channel shared through `AppState`.
pub type PresenceState = Arc<PresenceChannel>;
