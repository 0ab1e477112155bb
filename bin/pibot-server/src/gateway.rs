//! Per-owner event rooms for connected WebSocket clients.
//!
//! Every open connection of an owner joins that owner's room; events emitted
//! for the owner fan out to all of them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::generation::{EventSink, GatewayEvent};

type Room = HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>;

#[derive(Debug, Default)]
pub struct ConnectionGateway {
    rooms: Mutex<HashMap<String, Room>>,
}

impl ConnectionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, Room>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection for `owner_id`; events arrive on the receiver.
    pub fn join(&self, owner_id: &str) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        self.rooms()
            .entry(owner_id.to_owned())
            .or_default()
            .insert(connection_id, tx);
        (connection_id, rx)
    }

    /// Remove a connection. Returns `true` when it was the owner's last one.
    pub fn leave(&self, owner_id: &str, connection_id: Uuid) -> bool {
        let mut rooms = self.rooms();
        let Some(room) = rooms.get_mut(owner_id) else {
            return true;
        };
        room.remove(&connection_id);
        if room.is_empty() {
            rooms.remove(owner_id);
            true
        } else {
            false
        }
    }

    pub fn connection_count(&self, owner_id: &str) -> usize {
        self.rooms().get(owner_id).map_or(0, HashMap::len)
    }

    /// Deliver `event` to every connection of `owner_id`. Connections whose
    /// receiver is gone are dropped from the room.
    pub fn emit_to(&self, owner_id: &str, event: GatewayEvent) {
        let mut rooms = self.rooms();
        let Some(room) = rooms.get_mut(owner_id) else {
            debug!(owner_id, "no connection for event; dropped");
            return;
        };
        room.retain(|_, tx| tx.send(event.clone()).is_ok());
        if room.is_empty() {
            rooms.remove(owner_id);
        }
    }

    pub fn room(self: &Arc<Self>, owner_id: &str) -> RoomSink {
        RoomSink {
            gateway: Arc::clone(self),
            owner_id: owner_id.to_owned(),
        }
    }
}

/// [`EventSink`] bound to one owner's room.
#[derive(Debug, Clone)]
pub struct RoomSink {
    gateway: Arc<ConnectionGateway>,
    owner_id: String,
}

impl EventSink for RoomSink {
    fn emit(&self, event: GatewayEvent) {
        self.gateway.emit_to(&self.owner_id, event);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn events_reach_every_connection_of_the_owner_only() {
        let gateway = Arc::new(ConnectionGateway::new());
        let (_, mut a1) = gateway.join("alice");
        let (_, mut a2) = gateway.join("alice");
        let (_, mut b) = gateway.join("bob");

        gateway.room("alice").emit(GatewayEvent::error("boom"));

        assert_eq!(a1.try_recv().unwrap(), GatewayEvent::error("boom"));
        assert_eq!(a2.try_recv().unwrap(), GatewayEvent::error("boom"));
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn leave_reports_the_last_connection() {
        let gateway = ConnectionGateway::new();
        let (first, _rx1) = gateway.join("alice");
        let (second, _rx2) = gateway.join("alice");
        assert!(!gateway.leave("alice", first));
        assert!(gateway.leave("alice", second));
        assert_eq!(gateway.connection_count("alice"), 0);
    }

    #[test]
    fn closed_receivers_are_pruned() {
        let gateway = ConnectionGateway::new();
        let (_, rx) = gateway.join("alice");
        drop(rx);
        gateway.emit_to("alice", GatewayEvent::error("x"));
        assert_eq!(gateway.connection_count("alice"), 0);
    }
}
