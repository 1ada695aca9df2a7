//! Known peers, kept sorted by `(ip, port)`.

use std::collections::BTreeSet;
use std::ops::Bound;

use drawtree_messages::PeerAddress;

#[derive(Clone, Debug, Default)]
pub struct PeerRegistry {
    peers: BTreeSet<PeerAddress>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the peer was not known before.
    pub fn insert(&mut self, peer: PeerAddress) -> bool {
        self.peers.insert(peer)
    }

    pub fn remove(&mut self, peer: &PeerAddress) -> bool {
        self.peers.remove(peer)
    }

    pub fn contains(&self, peer: &PeerAddress) -> bool {
        self.peers.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Copy of the peers in order, so callers can iterate without holding
    /// the registry lock.
    pub fn snapshot(&self) -> Vec<PeerAddress> {
        self.peers.iter().cloned().collect()
    }

    /// Every peer other than `after`, starting just past it and wrapping
    /// around. When `after` is not registered the walk starts at the
    /// position it would occupy.
    pub fn iter_wrap(&self, after: &PeerAddress) -> Vec<PeerAddress> {
        let tail = self
            .peers
            .range::<PeerAddress, _>((Bound::Excluded(after), Bound::Unbounded))
            .cloned();
        let head = self
            .peers
            .range::<PeerAddress, _>((Bound::Unbounded, Bound::Excluded(after)))
            .cloned();
        tail.chain(head).collect()
    }
}
