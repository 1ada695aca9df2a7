//! Connection registry: maps peer IDs to their TCP write halves.
//!
//! Shared between the listener and connector (which register new
//! connections), the read loops (which remove them on disconnect) and the
//! outbound drain (which writes framed messages to peers).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use drawtree_blocktree::SignedNode;
use drawtree_ledger::SignedTransaction;
use drawtree_messages::WireMessage;
use drawtree_protocol::{decode_message, read_frame, write_frame, ProtocolError};

use crate::metrics::NodeMetrics;

/// Read timeout for peer connections. Keepalives arrive well within it.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Arc<Mutex<OwnedWriteHalf>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer's write half. A previous connection for the same
    /// peer is replaced, which closes its write side.
    pub fn insert(&mut self, peer_id: String, writer: OwnedWriteHalf) {
        self.connections
            .insert(peer_id, Arc::new(Mutex::new(writer)));
    }

    pub fn remove(&mut self, peer_id: &str) -> Option<Arc<Mutex<OwnedWriteHalf>>> {
        self.connections.remove(peer_id)
    }

    /// Look up a peer's write half (a cheap `Arc` clone).
    pub fn get(&self, peer_id: &str) -> Option<Arc<Mutex<OwnedWriteHalf>>> {
        self.connections.get(peer_id).cloned()
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.connections.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Snapshot of all registered peer IDs.
    pub fn peer_ids(&self) -> Vec<String> {
        self.connections.keys().cloned().collect()
    }
}

/// Write one length-prefixed frame to a registered write half.
pub async fn write_framed(
    writer: &Mutex<OwnedWriteHalf>,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let mut w = writer.lock().await;
    write_frame(&mut *w, payload).await
}

/// Where decoded inbound messages go.
#[derive(Clone)]
pub struct InboundRoutes {
    pub transactions: mpsc::Sender<SignedTransaction>,
    pub nodes: mpsc::Sender<SignedNode>,
}

impl InboundRoutes {
    /// Hand a message to its consumer. Returns `false` once the consumer is
    /// gone.
    async fn dispatch(&self, peer_id: &str, message: WireMessage) -> bool {
        match message {
            WireMessage::Transaction(tx) => self.transactions.send(tx).await.is_ok(),
            WireMessage::Node(node) => self.nodes.send(node).await.is_ok(),
            WireMessage::Keepalive => {
                tracing::trace!(peer = %peer_id, "keepalive");
                true
            }
            WireMessage::Hello { listen_port } => {
                tracing::debug!(peer = %peer_id, listen_port, "repeated hello ignored");
                true
            }
        }
    }
}

/// Spawn the read loop for one connection.
///
/// On disconnect, read error or undecodable frame the peer is removed from
/// the registry; no other connection is affected. A shutdown signal ends
/// the loop at its next read and drops the read half.
pub fn spawn_peer_read_loop(
    peer_id: String,
    reader: OwnedReadHalf,
    routes: InboundRoutes,
    connection_registry: Arc<RwLock<ConnectionRegistry>>,
    metrics: Arc<NodeMetrics>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                tracing::debug!(peer = %peer_id, "read loop shutting down");
            }
            result = peer_read_loop(&peer_id, reader, &routes) => match result {
                Ok(()) => tracing::info!(peer = %peer_id, "peer disconnected (clean close)"),
                Err(e) => tracing::warn!(peer = %peer_id, error = %e, "peer disconnected with error"),
            },
        }

        let mut registry = connection_registry.write().await;
        registry.remove(&peer_id);
        metrics.peer_count.set(registry.len() as i64);
        tracing::debug!(peer = %peer_id, "peer cleaned up after disconnect");
    })
}

async fn peer_read_loop(
    peer_id: &str,
    mut reader: OwnedReadHalf,
    routes: &InboundRoutes,
) -> Result<(), ProtocolError> {
    while let Some(body) = read_frame(&mut reader, READ_TIMEOUT).await? {
        let message = decode_message(&body)?;
        tracing::trace!(peer = %peer_id, kind = message.kind(), "message received");
        if !routes.dispatch(peer_id, message).await {
            tracing::debug!(peer = %peer_id, "inbound consumer closed");
            return Ok(());
        }
    }
    Ok(())
}
