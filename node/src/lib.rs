//! drawtree full node.
//!
//! The node floods signed transfers and candidate nodes between peers,
//! runs one sequencer task that owns the block tree and ledger, and
//! proposes a node in every slot where its stake-weighted draw clears the
//! hardness threshold.

pub mod config;
pub mod connection_registry;
pub mod error;
pub mod gossip;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod node_buffer;
pub mod peer_connector;
pub mod sequencer;
pub mod shutdown;
pub mod transactions;

pub use config::{GenesisAllocation, NodeConfig};
pub use connection_registry::{ConnectionRegistry, InboundRoutes};
pub use error::NodeError;
pub use gossip::Gossip;
pub use keys::{load_keypair, load_or_generate, save_keypair};
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{DrawtreeNode, NodeHandle};
pub use node_buffer::{GapType, NodeBuffer};
pub use peer_connector::{connect_to_peer, ConnectionTasks, PeerContext};
pub use sequencer::{
    run_sequencer, SequencerCommand, SequencerSettings, SequencerStatus, SlotSequencer, Verdict,
};
pub use shutdown::ShutdownController;
pub use transactions::{check_transaction, TransactionProcessor, TxVerdict};
