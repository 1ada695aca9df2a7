//! P2P networking layer for drawtree.
//!
//! Tracks known peers in address order and fans serialized messages out to
//! connections through the outbound queue.

pub mod broadcast;
pub mod error;
pub mod peer_registry;

pub use broadcast::{BroadcastResult, Broadcaster};
pub use error::NetworkError;
pub use peer_registry::PeerRegistry;
