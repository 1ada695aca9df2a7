//! The drawtree node: wires every task together.
//!
//! [`DrawtreeNode::start`] binds the P2P listener and spawns the listener,
//! outbound drain, transaction processor, sequencer, keepalive and reachout
//! tasks. The returned [`NodeHandle`] submits transfers and queries the
//! sequencer; [`DrawtreeNode::stop`] signals shutdown and joins the tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

use drawtree_blocktree::{SignedNode, Tree};
use drawtree_ledger::{LedgerSnapshot, PastMap, SignedTransaction, Transaction};
use drawtree_messages::{PeerAddress, WireMessage};
use drawtree_network::{Broadcaster, PeerRegistry};
use drawtree_types::{AccountId, Clock, KeyPair, SystemClock, TxId};

use crate::config::NodeConfig;
use crate::connection_registry::{write_framed, ConnectionRegistry, InboundRoutes};
use crate::gossip::Gossip;
use crate::metrics::NodeMetrics;
use crate::peer_connector::{connect_to_peer, spawn_reachout, ConnectionTasks, PeerContext};
use crate::sequencer::{
    run_sequencer, SequencerCommand, SequencerInputs, SequencerSettings, SequencerStatus,
    SlotSequencer,
};
use crate::shutdown::ShutdownController;
use crate::transactions::{spawn_transaction_processor, TransactionProcessor};
use crate::NodeError;

/// Capacity of the outbound `(peer, bytes)` queue.
const OUTBOUND_CHANNEL_CAPACITY: usize = 4096;
const TRANSACTION_CHANNEL_CAPACITY: usize = 4096;
const NODE_CHANNEL_CAPACITY: usize = 1024;
const COMMAND_CHANNEL_CAPACITY: usize = 64;
/// Maximum time to wait for tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DrawtreeNode {
    config: NodeConfig,
    metrics: Arc<NodeMetrics>,
    shutdown: Arc<ShutdownController>,
    connection_registry: Arc<RwLock<ConnectionRegistry>>,
    peers: Arc<RwLock<PeerRegistry>>,
    past: Arc<Mutex<PastMap>>,
    keys: Arc<KeyPair>,
    clock: Arc<dyn Clock>,
    local_address: Option<PeerAddress>,
    task_handles: Vec<JoinHandle<()>>,
    /// Handshake and read-loop tasks, one per connection.
    connection_tasks: ConnectionTasks,
}

impl DrawtreeNode {
    pub fn new(config: NodeConfig, keys: KeyPair, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            metrics: Arc::new(NodeMetrics::new()),
            shutdown: Arc::new(ShutdownController::new()),
            connection_registry: Arc::new(RwLock::new(ConnectionRegistry::new())),
            peers: Arc::new(RwLock::new(PeerRegistry::new())),
            past: Arc::new(Mutex::new(PastMap::new())),
            keys: Arc::new(keys),
            clock,
            local_address: None,
            task_handles: Vec::new(),
            connection_tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_system_clock(config: NodeConfig, keys: KeyPair) -> Self {
        Self::new(config, keys, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<NodeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    pub fn account(&self) -> AccountId {
        self.keys.account()
    }

    /// The `host:port` this node listens on, once started.
    pub fn local_address(&self) -> Option<&PeerAddress> {
        self.local_address.as_ref()
    }

    /// Bind the listener, dial the bootstrap peers and spawn every task.
    ///
    /// Failing to bind is fatal and returned as [`NodeError::Bind`];
    /// unreachable bootstrap peers are only logged.
    pub async fn start(&mut self) -> Result<NodeHandle, NodeError> {
        let genesis = self.config.genesis_node()?;
        let bootstrap = self.config.bootstrap_addresses()?;

        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| NodeError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let local = PeerAddress::new(self.config.host.clone(), listener.local_addr()?.port());
        self.local_address = Some(local.clone());
        self.peers.write().await.insert(local.clone());
        tracing::info!(
            address = %local,
            account = %self.keys.account(),
            "drawtree node starting"
        );

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (processor_tx, processor_rx) = mpsc::channel(TRANSACTION_CHANNEL_CAPACITY);
        let (sequencer_tx_tx, sequencer_tx_rx) = mpsc::channel(TRANSACTION_CHANNEL_CAPACITY);
        let (node_tx, node_rx) = mpsc::channel::<SignedNode>(NODE_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let gossip = Gossip::new(
            Broadcaster::new(outbound_tx),
            Arc::clone(&self.connection_registry),
        );
        let ctx = PeerContext {
            local: local.clone(),
            connection_registry: Arc::clone(&self.connection_registry),
            peers: Arc::clone(&self.peers),
            routes: InboundRoutes {
                transactions: processor_tx.clone(),
                nodes: node_tx,
            },
            metrics: Arc::clone(&self.metrics),
            shutdown: Arc::clone(&self.shutdown),
            tasks: Arc::clone(&self.connection_tasks),
        };

        // ── P2P listener ──────────────────────────────────────────────────
        let ctx_listener = ctx.clone();
        let mut shutdown_rx_p2p = self.shutdown.subscribe();
        let p2p_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx_p2p.recv() => {
                        tracing::info!("P2P listener shutting down");
                        break;
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, remote)) => {
                                tracing::debug!(remote = %remote, "inbound connection");
                                let ctx = ctx_listener.clone();
                                let handshake = tokio::spawn(async move {
                                    ctx.accept_inbound(stream, remote).await;
                                });
                                ctx_listener.track(handshake).await;
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "P2P accept error");
                            }
                        }
                    }
                }
            }
        });
        self.task_handles.push(p2p_handle);

        // ── Outbound message drain ────────────────────────────────────────
        let mut outbound_rx: mpsc::Receiver<(String, Vec<u8>)> = outbound_rx;
        let conn_registry_drain = Arc::clone(&self.connection_registry);
        let metrics_drain = Arc::clone(&self.metrics);
        let mut shutdown_rx_drain = self.shutdown.subscribe();
        let drain_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx_drain.recv() => {
                        tracing::info!("outbound message task shutting down");
                        break;
                    }
                    Some((peer_id, bytes)) = outbound_rx.recv() => {
                        let writer = conn_registry_drain.read().await.get(&peer_id);
                        match writer {
                            Some(writer) => {
                                if let Err(e) = write_framed(&writer, &bytes).await {
                                    tracing::warn!(
                                        peer = %peer_id,
                                        error = %e,
                                        "failed to send message, disconnecting peer"
                                    );
                                    let mut registry = conn_registry_drain.write().await;
                                    registry.remove(&peer_id);
                                    metrics_drain.peer_count.set(registry.len() as i64);
                                }
                            }
                            None => {
                                tracing::trace!(
                                    peer = %peer_id,
                                    "outbound message dropped: no connection for peer"
                                );
                            }
                        }
                    }
                }
            }
        });
        self.task_handles.push(drain_handle);

        // ── Transaction processor ─────────────────────────────────────────
        let processor = TransactionProcessor::new(
            Arc::clone(&self.past),
            sequencer_tx_tx,
            gossip.clone(),
            Arc::clone(&self.metrics),
        );
        self.task_handles.push(spawn_transaction_processor(
            processor,
            processor_rx,
            self.shutdown.subscribe(),
        ));

        // ── Sequencer ─────────────────────────────────────────────────────
        let sequencer = SlotSequencer::new(
            Tree::new(genesis, self.config.chain_params()),
            Arc::clone(&self.keys),
            SequencerSettings::from_config(&self.config),
            Arc::clone(&self.metrics),
        );
        let inputs = SequencerInputs {
            transactions: sequencer_tx_rx,
            nodes: node_rx,
            commands: command_rx,
        };
        self.task_handles.push(tokio::spawn(run_sequencer(
            sequencer,
            Arc::clone(&self.clock),
            inputs,
            gossip.clone(),
            self.shutdown.subscribe(),
        )));

        // ── Keepalive ─────────────────────────────────────────────────────
        let gossip_ka = gossip.clone();
        let keepalive_every = Duration::from_secs(self.config.keepalive_interval_secs.max(1));
        let mut shutdown_rx_ka = self.shutdown.subscribe();
        let ka_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(keepalive_every);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx_ka.recv() => {
                        tracing::debug!("keepalive task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        gossip_ka.broadcast(&WireMessage::Keepalive).await;
                    }
                }
            }
        });
        self.task_handles.push(ka_handle);

        // ── Bootstrap and reachout ────────────────────────────────────────
        for addr in &bootstrap {
            if *addr == local {
                continue;
            }
            match connect_to_peer(addr, &ctx).await {
                Ok(peer_id) => tracing::info!(peer = %peer_id, "bootstrap peer connected"),
                Err(e) => {
                    self.peers.write().await.insert(addr.clone());
                    tracing::warn!(peer = %addr, error = %e, "bootstrap peer unreachable");
                }
            }
        }
        self.task_handles
            .push(spawn_reachout(ctx, self.shutdown.subscribe()));

        tracing::info!(tasks = self.task_handles.len(), "drawtree node started");
        Ok(NodeHandle {
            transactions: processor_tx,
            commands: command_tx,
            past: Arc::clone(&self.past),
            keys: Arc::clone(&self.keys),
            local_address: local,
        })
    }

    /// Signal every task, drop all connections and wait for the tasks,
    /// per-connection readers included, to finish.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("drawtree node stopping");
        self.shutdown.shutdown();

        {
            let mut registry = self.connection_registry.write().await;
            *registry = ConnectionRegistry::new();
            self.metrics.peer_count.set(0);
            tracing::info!("connection registry cleared");
        }

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let connection_tasks = Arc::clone(&self.connection_tasks);
        let wait_all = async move {
            for handle in handles {
                let _ = handle.await;
            }
            // handshakes still in flight may add a reader; drain until empty
            loop {
                let batch: Vec<JoinHandle<()>> = connection_tasks.lock().await.drain(..).collect();
                if batch.is_empty() {
                    break;
                }
                for handle in batch {
                    let _ = handle.await;
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all)
            .await
            .is_err()
        {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        tracing::info!("drawtree node stopped");
        Ok(())
    }
}

/// Cheap, cloneable access to a running node.
#[derive(Clone)]
pub struct NodeHandle {
    transactions: mpsc::Sender<SignedTransaction>,
    commands: mpsc::Sender<SequencerCommand>,
    past: Arc<Mutex<PastMap>>,
    keys: Arc<KeyPair>,
    local_address: PeerAddress,
}

impl NodeHandle {
    pub fn account(&self) -> AccountId {
        self.keys.account()
    }

    pub fn local_address(&self) -> &PeerAddress {
        &self.local_address
    }

    /// Sign a transfer from this node's account under a fresh local ID and
    /// hand it to the transaction processor.
    pub async fn submit_transfer(&self, to: AccountId, amount: u64) -> Result<TxId, NodeError> {
        let id = self
            .past
            .lock()
            .await
            .next_id(&self.local_address.to_string());
        let tx = SignedTransaction::sign(
            Transaction {
                id: id.clone(),
                from: self.keys.account(),
                to,
                amount,
            },
            &self.keys.private,
        );
        self.submit(tx).await?;
        tracing::info!(tx = %id, amount, "transfer submitted");
        Ok(id)
    }

    /// Hand an already signed transaction to the processor.
    pub async fn submit(&self, tx: SignedTransaction) -> Result<(), NodeError> {
        self.transactions
            .send(tx)
            .await
            .map_err(|_| NodeError::ChannelClosed("transaction processor"))
    }

    pub async fn status(&self) -> Result<SequencerStatus, NodeError> {
        self.query(SequencerCommand::Status).await
    }

    /// Balance of `account` at the current head.
    pub async fn balance(&self, account: &AccountId) -> Result<u64, NodeError> {
        let account = account.clone();
        self.query(|reply| SequencerCommand::Balance(account, reply))
            .await
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, NodeError> {
        self.query(SequencerCommand::Snapshot).await
    }

    pub async fn render_tree(&self) -> Result<String, NodeError> {
        self.query(SequencerCommand::Render).await
    }

    async fn query<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SequencerCommand,
    ) -> Result<T, NodeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| NodeError::ChannelClosed("sequencer commands"))?;
        reply_rx
            .await
            .map_err(|_| NodeError::ChannelClosed("sequencer reply"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawtree_crypto::keypair_from_seed;
    use drawtree_nullables::NullClock;
    use drawtree_protocol::{encode_message, write_frame};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    fn config() -> NodeConfig {
        NodeConfig {
            port: 0,
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn start_and_stop() {
        let mut node = DrawtreeNode::new(
            config(),
            keypair_from_seed(&[1; 32]),
            Arc::new(NullClock::new(10_000)),
        );
        let handle = node.start().await.unwrap();
        assert_ne!(handle.local_address().port, 0);

        let status = handle.status().await.unwrap();
        assert_eq!(status.current_slot, 10);
        assert_eq!(status.tree_size, 1);

        node.stop().await.unwrap();
        assert!(handle.status().await.is_err());
    }

    #[tokio::test]
    async fn bind_conflict_is_fatal() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let mut node = DrawtreeNode::with_system_clock(
            NodeConfig {
                port,
                ..NodeConfig::default()
            },
            keypair_from_seed(&[2; 32]),
        );
        assert!(matches!(node.start().await, Err(NodeError::Bind { .. })));
    }

    #[tokio::test]
    async fn local_transfer_issues_sequential_ids() {
        let mut node = DrawtreeNode::new(
            config(),
            keypair_from_seed(&[3; 32]),
            Arc::new(NullClock::new(0)),
        );
        let handle = node.start().await.unwrap();
        let to = keypair_from_seed(&[4; 32]).account();
        let first = handle.submit_transfer(to.clone(), 5).await.unwrap();
        let second = handle.submit_transfer(to, 5).await.unwrap();
        assert_eq!(first.index(), Some(0));
        assert_eq!(second.index(), Some(1));
        assert!(first.as_str().ends_with(&handle.local_address().to_string()));
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_closes_idle_connections() {
        let mut node = DrawtreeNode::new(
            config(),
            keypair_from_seed(&[5; 32]),
            Arc::new(NullClock::new(0)),
        );
        let handle = node.start().await.unwrap();
        let port = handle.local_address().port;

        // a peer that says hello and then stays silent
        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let hello = encode_message(&WireMessage::Hello { listen_port: 4999 }).unwrap();
        write_frame(&mut client, &hello).await.unwrap();
        let metrics = node.metrics();
        for _ in 0..50 {
            if metrics.peer_count.get() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(metrics.peer_count.get(), 1);

        let started = std::time::Instant::now();
        node.stop().await.unwrap();
        assert!(started.elapsed() < SHUTDOWN_TIMEOUT);
        assert!(node.connection_tasks.lock().await.is_empty());

        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(1), client.read(&mut buf))
            .await
            .expect("connection should be closed by stop");
        assert_eq!(read.unwrap(), 0);
    }
}
