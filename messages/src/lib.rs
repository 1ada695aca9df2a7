//! Network message types for drawtree node-to-node communication.

pub mod peer;
pub mod wire;

pub use peer::{AddressError, PeerAddress};
pub use wire::WireMessage;
