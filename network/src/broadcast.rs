//! Flood-based message broadcasting.
//!
//! The [`Broadcaster`] does not write directly to TCP streams. Instead it
//! pushes `(connection_id, message_bytes)` tuples onto an `mpsc` channel that
//! the connection layer drains.

use tokio::sync::mpsc;

use crate::NetworkError;

/// Outcome of a broadcast attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Number of connections the message was queued for.
    pub sent: usize,
    /// Number of connections for which queueing failed (channel full / closed).
    pub failed: usize,
}

/// Queue-based broadcaster.
#[derive(Clone)]
pub struct Broadcaster {
    outbound_tx: mpsc::Sender<(String, Vec<u8>)>,
}

impl Broadcaster {
    pub fn new(outbound_tx: mpsc::Sender<(String, Vec<u8>)>) -> Self {
        Self { outbound_tx }
    }

    /// Queue `message` once for every connection ID in `connections`.
    pub fn broadcast_to_all(&self, message: &[u8], connections: &[String]) -> BroadcastResult {
        let mut result = BroadcastResult::default();
        for id in connections {
            match self.outbound_tx.try_send((id.clone(), message.to_vec())) {
                Ok(()) => result.sent += 1,
                Err(_) => result.failed += 1,
            }
        }
        if result.failed > 0 {
            tracing::debug!(
                sent = result.sent,
                failed = result.failed,
                "outbound queue rejected some broadcasts"
            );
        }
        result
    }

    /// Queue `message` for a single connection, waiting for queue space.
    pub async fn send_to(&self, connection: &str, message: Vec<u8>) -> Result<(), NetworkError> {
        self.outbound_tx
            .send((connection.to_string(), message))
            .await
            .map_err(|_| NetworkError::QueueClosed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let (tx, mut rx) = mpsc::channel(64);
        let broadcaster = Broadcaster::new(tx);

        let result = broadcaster.broadcast_to_all(b"hello", &ids(&["1.0.0.1:1", "1.0.0.3:3"]));
        assert_eq!(result, BroadcastResult { sent: 2, failed: 0 });

        let (id1, msg1) = rx.recv().await.unwrap();
        assert_eq!(msg1, b"hello");
        assert_eq!(id1, "1.0.0.1:1");
        let (id2, _) = rx.recv().await.unwrap();
        assert_eq!(id2, "1.0.0.3:3");
    }

    #[tokio::test]
    async fn broadcast_handles_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let broadcaster = Broadcaster::new(tx);
        let result = broadcaster.broadcast_to_all(b"data", &ids(&["a", "b", "c"]));
        assert_eq!(result.sent, 1);
        assert_eq!(result.failed, 2);
    }

    #[tokio::test]
    async fn send_to_closed_queue_fails() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let broadcaster = Broadcaster::new(tx);
        assert!(matches!(
            broadcaster.send_to("a", vec![1]).await,
            Err(NetworkError::QueueClosed)
        ));
    }

    #[test]
    fn empty_target_list_sends_nothing() {
        let (tx, _rx) = mpsc::channel(1);
        let result = Broadcaster::new(tx).broadcast_to_all(b"x", &[]);
        assert_eq!(result, BroadcastResult::default());
    }
}
