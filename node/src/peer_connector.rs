//! Peer connections, inbound and outbound.
//!
//! A dialled connection opens with a [`WireMessage::Hello`] carrying the
//! dialler's listening port. Both ends then name the connection by the
//! dialler's listening address, so a peer linked in either direction is
//! recognised and not dialled twice.
//!
//! [`connect_to_peer`] is shared by the bootstrap dial at startup and the
//! reachout loop, which walks the peer registry in address order starting
//! after the local address.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

use drawtree_messages::{PeerAddress, WireMessage};
use drawtree_network::{NetworkError, PeerRegistry};
use drawtree_protocol::{decode_message, encode_message, read_frame, write_frame};

use crate::connection_registry::{spawn_peer_read_loop, ConnectionRegistry, InboundRoutes};
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// Timeout for the initial TCP connection attempt and for the hello that
/// must follow it.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The reachout loop stops dialing once this many connections are open.
pub const MAX_OUTBOUND_PEERS: usize = 10;

const REACHOUT_INTERVAL: Duration = Duration::from_secs(5);

/// Per-connection tasks (handshakes and read loops), joined on shutdown.
pub type ConnectionTasks = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Shared handles needed to register a new connection.
#[derive(Clone)]
pub struct PeerContext {
    pub local: PeerAddress,
    pub connection_registry: Arc<RwLock<ConnectionRegistry>>,
    pub peers: Arc<RwLock<PeerRegistry>>,
    pub routes: InboundRoutes,
    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,
    pub tasks: ConnectionTasks,
}

impl PeerContext {
    /// Keep a per-connection task so shutdown can wait for it. Finished
    /// handles are pruned on the way.
    pub async fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Register an established stream under `peer_id` and start its read
    /// loop. Returns `false`, dropping the stream, when the node is shutting
    /// down or the peer already has a connection.
    pub async fn register(&self, peer_id: String, stream: TcpStream) -> bool {
        let shutdown_rx = self.shutdown.subscribe();
        if self.shutdown.is_shutdown() {
            return false;
        }
        let (read_half, write_half) = stream.into_split();
        {
            let mut registry = self.connection_registry.write().await;
            if registry.contains(&peer_id) {
                tracing::debug!(peer = %peer_id, "already connected, dropping duplicate link");
                return false;
            }
            registry.insert(peer_id.clone(), write_half);
            self.metrics.peer_count.set(registry.len() as i64);
        }
        let reader = spawn_peer_read_loop(
            peer_id,
            read_half,
            self.routes.clone(),
            Arc::clone(&self.connection_registry),
            Arc::clone(&self.metrics),
            shutdown_rx,
        );
        self.track(reader).await;
        true
    }

    /// Wait for the dialler's hello, then register the connection under
    /// its listening address and remember that address.
    pub async fn accept_inbound(&self, mut stream: TcpStream, remote: SocketAddr) {
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.shutdown.is_shutdown() {
            return;
        }
        let first = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => return,
            frame = read_frame(&mut stream, CONNECT_TIMEOUT) => frame,
        };
        let listen_port = match first.map(|body| body.map(|b| decode_message(&b))) {
            Ok(Some(Ok(WireMessage::Hello { listen_port }))) => listen_port,
            Ok(Some(Ok(other))) => {
                tracing::debug!(remote = %remote, kind = other.kind(), "expected hello, closing");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) | Err(e) => {
                tracing::debug!(remote = %remote, error = %e, "inbound handshake failed");
                return;
            }
        };

        let addr = PeerAddress::new(remote.ip().to_string(), listen_port);
        let peer_id = addr.to_string();
        if self.register(peer_id.clone(), stream).await {
            self.peers.write().await.insert(addr);
            tracing::info!(peer = %peer_id, remote = %remote, "inbound peer connected");
        }
    }
}

/// Dial `addr`, announce the local listening port, register the connection
/// and remember the address.
///
/// Returns the connection's peer ID.
pub async fn connect_to_peer(addr: &PeerAddress, ctx: &PeerContext) -> Result<String, NodeError> {
    let peer_id = addr.to_string();
    let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&peer_id))
        .await
        .map_err(|_| NetworkError::ConnectionFailed(format!("connection timed out to {peer_id}")))?
        .map_err(|e| NetworkError::ConnectionFailed(format!("TCP connect to {peer_id} failed: {e}")))?;

    let hello = encode_message(&WireMessage::Hello {
        listen_port: ctx.local.port,
    })?;
    write_frame(&mut stream, &hello).await?;

    ctx.peers.write().await.insert(addr.clone());
    if ctx.register(peer_id.clone(), stream).await {
        tracing::info!(peer = %peer_id, "outbound peer connected");
    }
    Ok(peer_id)
}

/// Periodically dial known peers that are not connected, in registry order
/// after the local address, up to [`MAX_OUTBOUND_PEERS`] open connections.
pub fn spawn_reachout(ctx: PeerContext, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REACHOUT_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::debug!("reachout task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    reach_out(&ctx).await;
                }
            }
        }
    })
}

async fn reach_out(ctx: &PeerContext) {
    let candidates = ctx.peers.read().await.iter_wrap(&ctx.local);
    for addr in candidates {
        let (open, connected) = {
            let registry = ctx.connection_registry.read().await;
            (registry.len(), registry.contains(&addr.to_string()))
        };
        if open >= MAX_OUTBOUND_PEERS {
            break;
        }
        if connected {
            continue;
        }
        if let Err(e) = connect_to_peer(&addr, ctx).await {
            tracing::debug!(peer = %addr, error = %e, "reachout dial failed");
        }
    }
}
