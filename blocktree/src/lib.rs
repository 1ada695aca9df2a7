//! Stake-weighted block tree.
//!
//! Every slot each peer signs `(slot, seed)`; the signature is its *draw*.
//! Hashing the draw and multiplying by the signer's stake gives a value that
//! ranks competing nodes. The [`Tree`] keeps every node it has accepted,
//! picks the deepest (then highest valued) leaf as head, and keeps the
//! ledger equal to a replay of the genesis→head path, rolling back and
//! replaying when the head switches branch.

pub mod draw;
pub mod error;
pub mod node;
pub mod signed_node;
pub mod tree;

pub use draw::{hardness, weighted_value, DrawValue};
pub use error::TreeError;
pub use node::Node;
pub use signed_node::SignedNode;
pub use tree::{HeadChange, Tree};
