//! Top-level P2P wire message envelope.
//!
//! Every frame sent between drawtree nodes carries exactly one
//! [`WireMessage`]; the read loop decodes it once and dispatches on the
//! variant.

use drawtree_blocktree::SignedNode;
use drawtree_ledger::SignedTransaction;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    /// A signed transfer (flooded).
    Transaction(SignedTransaction),
    /// A signed candidate node for the current slot.
    Node(SignedNode),
    /// Liveness ping; keeps idle links under the read timeout.
    Keepalive,
    /// First frame on a dialled connection: the port the dialler listens on.
    /// The receiver pairs it with the socket's IP to name the connection.
    Hello { listen_port: u16 },
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transaction(_) => "transaction",
            Self::Node(_) => "node",
            Self::Keepalive => "keepalive",
            Self::Hello { .. } => "hello",
        }
    }
}
