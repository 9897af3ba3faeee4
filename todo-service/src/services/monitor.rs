//! Connection state driven by the MongoDB driver's monitoring events.
//!
//! The driver heartbeats every known server in the background. Each outcome
//! lands here and updates the shared [`ConnectionStateCell`] that health
//! checks read, so a cluster that drops while the service runs shows up as
//! `disconnected` without any request having to fail first.

use super::store::{ConnectionState, ConnectionStateCell};
use mongodb::event::sdam::{
    SdamEventHandler, ServerHeartbeatFailedEvent, ServerHeartbeatSucceededEvent,
    TopologyDescriptionChangedEvent,
};
use mongodb::options::ServerAddress;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct ConnectionMonitor {
    state: Arc<ConnectionStateCell>,
    reachable: Mutex<HashSet<ServerAddress>>,
    closing: AtomicBool,
}

impl ConnectionMonitor {
    pub fn new(state: Arc<ConnectionStateCell>) -> Self {
        Self {
            state,
            reachable: Mutex::new(HashSet::new()),
            closing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn server_reachable(&self, address: &ServerAddress) {
        let any_reachable = self.update_reachable(|servers| {
            servers.insert(address.clone());
        });
        self.apply(any_reachable);
    }

    pub fn server_unreachable(&self, address: &ServerAddress) {
        let any_reachable = self.update_reachable(|servers| {
            servers.remove(address);
        });
        if !any_reachable {
            tracing::warn!(server = %address, "No reachable MongoDB server");
        }
        self.apply(any_reachable);
    }

    /// `usable` is whether the new topology can serve primary reads.
    pub fn topology_changed(&self, usable: bool) {
        self.apply(usable);
    }

    /// Stops event handling; the store owns the state from here on.
    pub fn begin_shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.state.set(ConnectionState::Disconnecting);
    }

    pub fn finish_shutdown(&self) {
        self.state.set(ConnectionState::Disconnected);
    }

    fn update_reachable(&self, change: impl FnOnce(&mut HashSet<ServerAddress>)) -> bool {
        let mut servers = self
            .reachable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        change(&mut servers);
        !servers.is_empty()
    }

    /// A failure while still connecting leaves the state alone: the initial
    /// ping decides whether startup succeeds.
    fn apply(&self, available: bool) {
        if self.closing.load(Ordering::SeqCst) {
            return;
        }
        let current = self.state.get();
        let next = match (available, current) {
            (true, _) => ConnectionState::Connected,
            (false, ConnectionState::Connecting) => ConnectionState::Connecting,
            (false, _) => ConnectionState::Disconnected,
        };
        if next != current {
            tracing::info!(from = current.as_str(), to = next.as_str(), "MongoDB connection state changed");
            self.state.set(next);
        }
    }
}

impl SdamEventHandler for ConnectionMonitor {
    fn handle_server_heartbeat_succeeded_event(&self, event: ServerHeartbeatSucceededEvent) {
        self.server_reachable(&event.server_address);
    }

    fn handle_server_heartbeat_failed_event(&self, event: ServerHeartbeatFailedEvent) {
        tracing::debug!(server = %event.server_address, error = %event.failure, "MongoDB heartbeat failed");
        self.server_unreachable(&event.server_address);
    }

    fn handle_topology_description_changed_event(&self, event: TopologyDescriptionChangedEvent) {
        self.topology_changed(event.new_description.has_readable_server(None));
    }
}
