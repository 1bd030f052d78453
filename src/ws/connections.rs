//! Outbound message routing to connected clients

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::ws::protocol::ServerMsg;

/// Per-connection outbound buffer
const OUTBOUND_CAPACITY: usize = 256;

/// Where the scheduler sends its messages
pub trait Outbox: Send + 'static {
    /// Deliver to every connected client
    fn broadcast(&self, msg: ServerMsg);

    /// Deliver to one connection only
    fn send_to(&self, connection_id: &str, msg: ServerMsg);
}

/// Live connections keyed by connection id, each with its own ordered outbound queue.
/// Connections register on socket upgrade, before they join the session.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, mpsc::Sender<ServerMsg>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection and get the receiving end of its outbound queue
    pub fn register(&self, connection_id: &str) -> mpsc::Receiver<ServerMsg> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.connections.insert(connection_id.to_string(), tx);
        rx
    }

    pub fn unregister(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn deliver(connection_id: &str, tx: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %connection_id, "Client lagging, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %connection_id, "Outbound queue closed");
            }
        }
    }
}

impl Outbox for Arc<ConnectionRegistry> {
    fn broadcast(&self, msg: ServerMsg) {
        for entry in self.connections.iter() {
            ConnectionRegistry::deliver(entry.key(), entry.value(), msg.clone());
        }
    }

    fn send_to(&self, connection_id: &str, msg: ServerMsg) {
        if let Some(tx) = self.connections.get(connection_id) {
            ConnectionRegistry::deliver(connection_id, tx.value(), msg);
        }
    }
}
