//! Server state shared by all connection handlers
//!
//! This module owns the connected clients' outboxes and the room registry.
//! Both live behind one mutex so membership changes and the fan-out they
//! trigger are serialized with respect to each other.

use crate::outbox::{Delivery, Outbox};
use crate::registry::{MemberRecord, Registry};
use signal_relay_protocol::{ConnectionId, JsonServerEvent, RoomId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Default number of undelivered events kept per connection
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

#[derive(Debug, Default)]
pub(crate) struct InnerState {
    /// Map of connection ID -> outbound queue
    pub(crate) peers: HashMap<ConnectionId, Arc<Outbox>>,
    /// Room membership
    pub(crate) registry: Registry,
}

impl InnerState {
    /// Queue an event for one connection
    ///
    /// Delivery problems stay with that connection and are only logged.
    pub(crate) fn deliver(&self, recipient: ConnectionId, event: &str) -> Delivery {
        let Some(outbox) = self.peers.get(&recipient) else {
            debug!(%recipient, "dropping event for unknown connection");
            return Delivery::Closed;
        };
        let delivery = outbox.push(event.to_string());
        match delivery {
            Delivery::Queued => {}
            Delivery::DroppedOldest => {
                warn!(%recipient, "outbox full, dropped oldest pending event")
            }
            Delivery::Closed => debug!(%recipient, "dropping event for closed connection"),
        }
        delivery
    }

    /// Queue the same event for several connections
    pub(crate) fn fan_out<'a>(
        &self,
        recipients: impl IntoIterator<Item = &'a MemberRecord>,
        event: &JsonServerEvent,
    ) -> usize {
        let text = event.to_string();
        recipients
            .into_iter()
            .filter(|member| self.deliver(member.connection_id, &text) != Delivery::Closed)
            .count()
    }
}

/// Handle to the server state, cheap to clone
#[derive(Debug, Clone)]
pub struct ServerState {
    inner: Arc<Mutex<InnerState>>,
    outbox_capacity: usize,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl ServerState {
    /// Create empty server state
    pub fn new(outbox_capacity: usize) -> Self {
        Self {
            inner: Arc::default(),
            outbox_capacity,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, InnerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new transport connection
    pub fn connect(&self) -> (ConnectionId, Arc<Outbox>) {
        let connection_id = ConnectionId::new_v4();
        let outbox = Arc::new(Outbox::new(self.outbox_capacity));
        self.lock().peers.insert(connection_id, outbox.clone());
        (connection_id, outbox)
    }

    /// Snapshot of a room's members
    pub fn members_of(&self, room_id: &RoomId) -> Vec<MemberRecord> {
        self.lock().registry.members_of(room_id)
    }

    /// Number of rooms with at least one member
    pub fn room_count(&self) -> usize {
        self.lock().registry.room_count()
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.lock().peers.len()
    }

    /// Whether the membership indices agree with each other
    pub fn is_consistent(&self) -> bool {
        self.lock().registry.is_consistent()
    }
}
