//! Node configuration with TOML file support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use drawtree_blocktree::Node;
use drawtree_ledger::Transaction;
use drawtree_messages::PeerAddress;
use drawtree_types::{AccountId, ChainParams, TxId};

use crate::logging::LogFormat;
use crate::NodeError;

/// Stake minted to one account by the genesis node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub account: String,
    pub amount: u64,
}

/// Configuration for a drawtree node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every replica of one network
/// must agree on the chain fields (`slot_duration_ms` through
/// `genesis_allocations`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address to listen on, also used to build local transaction IDs.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on for P2P connections; 0 picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Peers (`ip:port`) to dial on startup.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,

    /// File holding the hex-encoded signing seed.
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,

    #[serde(default = "default_slot_duration_ms")]
    pub slot_duration_ms: u64,

    /// Draws must exceed `2^hardness_exponent` to participate.
    #[serde(default = "default_hardness_exponent")]
    pub hardness_exponent: u32,

    #[serde(default = "default_reward")]
    pub reward: u64,

    #[serde(default = "default_fee")]
    pub fee: u64,

    #[serde(default = "default_genesis_seed")]
    pub genesis_seed: u64,

    #[serde(default)]
    pub genesis_allocations: Vec<GenesisAllocation>,

    /// Propose a node even when no transactions are pending.
    #[serde(default)]
    pub propose_empty: bool,

    /// Candidates further ahead than this many slots are dropped.
    #[serde(default = "default_max_future_slots")]
    pub max_future_slots: u64,

    /// How many past slots of verified candidates are kept as possible
    /// ancestors.
    #[serde(default = "default_recent_slots")]
    pub recent_slots: u64,

    /// Maximum number of buffered candidates.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_key_file() -> PathBuf {
    PathBuf::from("./drawtree.key")
}

fn default_slot_duration_ms() -> u64 {
    ChainParams::default().slot_duration_ms
}

fn default_hardness_exponent() -> u32 {
    ChainParams::default().hardness_exponent
}

fn default_reward() -> u64 {
    ChainParams::default().reward
}

fn default_fee() -> u64 {
    ChainParams::default().fee
}

fn default_genesis_seed() -> u64 {
    ChainParams::default().genesis_seed
}

fn default_max_future_slots() -> u64 {
    4
}

fn default_recent_slots() -> u64 {
    8
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_keepalive_interval_secs() -> u64 {
    10
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            slot_duration_ms: self.slot_duration_ms,
            hardness_exponent: self.hardness_exponent,
            reward: self.reward,
            fee: self.fee,
            genesis_seed: self.genesis_seed,
        }
    }

    /// The genesis node minting `genesis_allocations`, in listed order.
    pub fn genesis_node(&self) -> Result<Node, NodeError> {
        let mut created_stake = Vec::with_capacity(self.genesis_allocations.len());
        for (index, allocation) in self.genesis_allocations.iter().enumerate() {
            let to: AccountId = allocation
                .account
                .parse()
                .map_err(|e| NodeError::Config(format!("genesis allocation {index}: {e}")))?;
            created_stake.push(Transaction {
                id: TxId::new(index as u64, "genesis"),
                from: AccountId::genesis(),
                to,
                amount: allocation.amount,
            });
        }
        Ok(Node::genesis(self.genesis_seed, created_stake))
    }

    pub fn bootstrap_addresses(&self) -> Result<Vec<PeerAddress>, NodeError> {
        self.bootstrap_peers
            .iter()
            .map(|s| s.parse::<PeerAddress>().map_err(NodeError::from))
            .collect()
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bootstrap_peers: Vec::new(),
            key_file: default_key_file(),
            slot_duration_ms: default_slot_duration_ms(),
            hardness_exponent: default_hardness_exponent(),
            reward: default_reward(),
            fee: default_fee(),
            genesis_seed: default_genesis_seed(),
            genesis_allocations: Vec::new(),
            propose_empty: false,
            max_future_slots: default_max_future_slots(),
            recent_slots: default_recent_slots(),
            buffer_capacity: default_buffer_capacity(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}
