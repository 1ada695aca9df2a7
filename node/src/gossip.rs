//! Flooding typed wire messages to every connected peer.

use std::sync::Arc;

use tokio::sync::RwLock;

use drawtree_messages::WireMessage;
use drawtree_network::{BroadcastResult, Broadcaster};
use drawtree_protocol::encode_message;

use crate::connection_registry::ConnectionRegistry;

/// Encodes a message once and queues it for every registered connection.
#[derive(Clone)]
pub struct Gossip {
    broadcaster: Broadcaster,
    registry: Arc<RwLock<ConnectionRegistry>>,
}

impl Gossip {
    pub fn new(broadcaster: Broadcaster, registry: Arc<RwLock<ConnectionRegistry>>) -> Self {
        Self {
            broadcaster,
            registry,
        }
    }

    pub async fn broadcast(&self, message: &WireMessage) -> BroadcastResult {
        let bytes = match encode_message(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(kind = message.kind(), error = %e, "cannot encode broadcast");
                return BroadcastResult::default();
            }
        };
        let peers = self.registry.read().await.peer_ids();
        let result = self.broadcaster.broadcast_to_all(&bytes, &peers);
        tracing::trace!(
            kind = message.kind(),
            sent = result.sent,
            failed = result.failed,
            "broadcast queued"
        );
        result
    }
}
