//! Real-time presence tracking
//!
//! [`PresenceRegistry`] owns the set of live WebSocket connections behind a
//! single mutex. Entries hold an unbounded mpsc sender drained by each
//! socket's writer task, so registry mutation never blocks on network I/O;
//! a failed send is swallowed per recipient and removal only ever happens
//! via the explicit disconnect signal from the transport.
//!
//! [`HeartbeatRegistry`] is the fallback for deployments where no socket is
//! connected: it tracks last-seen timestamps per source address from
//! ordinary request traffic and counts addresses seen within a trailing
//! window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// One live connection.
struct PresenceEntry {
    /// Username when authenticated, source IP otherwise.
    identity: String,
    #[allow(dead_code)]
    source_addr: String,
    sender: mpsc::UnboundedSender<String>,
}

/// Registry of live connections keyed by connection id.
///
/// All operations take the registry lock for their full duration; sends go
/// through the per-connection channels and never block.
#[derive(Default)]
pub struct PresenceRegistry {
    entries: Mutex<HashMap<Uuid, PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live connection and push the updated count to
    /// everyone.
    pub fn connect(
        &self,
        id: Uuid,
        identity: impl Into<String>,
        source_addr: impl Into<String>,
        sender: mpsc::UnboundedSender<String>,
    ) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            id,
            PresenceEntry {
                identity: identity.into(),
                source_addr: source_addr.into(),
                sender,
            },
        );
        Self::broadcast_count(&entries);
    }

    /// Remove a connection and push the updated count to the rest.
    pub fn disconnect(&self, id: Uuid) {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(&id).is_some() {
            Self::broadcast_count(&entries);
        }
    }

    /// Upgrade a connection's identity once late-arriving credentials are
    /// presented over the same socket. Broadcasts only when the distinct
    /// count actually changes.
    pub fn reidentify(&self, id: Uuid, identity: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap();
        let before = Self::distinct_count(&entries);
        if let Some(entry) = entries.get_mut(&id) {
            entry.identity = identity.into();
        }
        if Self::distinct_count(&entries) != before {
            Self::broadcast_count(&entries);
        }
    }

    /// Number of distinct identities currently connected. One user with
    /// several tabs counts once.
    pub fn count(&self) -> usize {
        Self::distinct_count(&self.entries.lock().unwrap())
    }

    /// Number of live connections (not identities).
    pub fn connection_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Deliver a message to every connection held by `identity`. Dead
    /// connections are skipped; they are only removed by their own
    /// disconnect event.
    pub fn unicast(&self, identity: &str, message: &serde_json::Value) {
        let text = message.to_string();
        let entries = self.entries.lock().unwrap();
        for entry in entries.values().filter(|e| e.identity == identity) {
            if entry.sender.send(text.clone()).is_err() {
                debug!("presence: dropped unicast to stale connection");
            }
        }
    }

    /// Deliver a message to every live connection. Per-entry failures are
    /// independently swallowed and never abort delivery to the rest.
    pub fn broadcast(&self, message: &serde_json::Value) {
        let text = message.to_string();
        let entries = self.entries.lock().unwrap();
        Self::send_all(&entries, &text);
    }

    fn distinct_count(entries: &HashMap<Uuid, PresenceEntry>) -> usize {
        let mut identities: Vec<&str> =
            entries.values().map(|e| e.identity.as_str()).collect();
        identities.sort_unstable();
        identities.dedup();
        identities.len()
    }

    fn broadcast_count(entries: &HashMap<Uuid, PresenceEntry>) {
        let message = serde_json::json!({
            "type": "online_count",
            "count": Self::distinct_count(entries),
        })
        .to_string();
        Self::send_all(entries, &message);
    }

    fn send_all(entries: &HashMap<Uuid, PresenceEntry>, text: &str) {
        for entry in entries.values() {
            if entry.sender.send(text.to_string()).is_err() {
                debug!("presence: dropped message to stale connection");
            }
        }
    }
}

/// How long a source address stays "online" after its last request.
const HEARTBEAT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Last-seen tracker for the no-WebSocket fallback path. Stale entries are
/// purged lazily at read time; the count never drops below 1 because there
/// is always at least the requesting caller.
#[derive(Default)]
pub struct HeartbeatRegistry {
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl HeartbeatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record request traffic from `source_addr`.
    pub fn touch(&self, source_addr: &str) {
        self.last_seen
            .lock()
            .unwrap()
            .insert(source_addr.to_string(), Instant::now());
    }

    /// Addresses seen within the trailing window, floored at 1.
    pub fn count(&self) -> usize {
        self.count_at(Instant::now())
    }

    fn count_at(&self, now: Instant) -> usize {
        let mut last_seen = self.last_seen.lock().unwrap();
        last_seen.retain(|_, seen| now.duration_since(*seen) < HEARTBEAT_WINDOW);
        last_seen.len().max(1)
    }
}
