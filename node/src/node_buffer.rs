//! Candidate buffer: holds candidates that cannot be evaluated yet.
//!
//! A candidate waits here when its slot has not started, when its parent is
//! unknown, or when it references transactions this replica has not
//! received. Entries are released when the missing piece shows up and are
//! dropped after a bounded number of slots.

use std::collections::{BTreeMap, HashMap, HashSet};

use drawtree_blocktree::SignedNode;
use drawtree_types::{NodeHash, TxId};

/// Why a candidate is buffered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GapType {
    /// Its slot is ahead of the local clock.
    FutureSlot,
    /// Its parent hash is unknown.
    Parent,
    /// Some of its transaction IDs are unknown.
    Transactions,
}

struct WaitingEntry {
    node: SignedNode,
    /// Slot during which the entry was buffered.
    buffered_at: u64,
}

struct AwaitingEntry {
    node: SignedNode,
    missing: HashSet<TxId>,
    buffered_at: u64,
}

pub struct NodeBuffer {
    future: BTreeMap<u64, Vec<SignedNode>>,
    orphans: HashMap<NodeHash, Vec<WaitingEntry>>,
    awaiting: Vec<AwaitingEntry>,
    /// Total entries across all three kinds.
    count: usize,
    max_size: usize,
}

impl NodeBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            future: BTreeMap::new(),
            orphans: HashMap::new(),
            awaiting: Vec::new(),
            count: 0,
            max_size,
        }
    }

    /// Hold a candidate until `slot` starts. Returns `false` if full.
    pub fn insert_future(&mut self, slot: u64, node: SignedNode) -> bool {
        if self.count >= self.max_size {
            return false;
        }
        self.future.entry(slot).or_default().push(node);
        self.count += 1;
        true
    }

    /// Hold a candidate until `parent` becomes known. Returns `false` if full.
    pub fn insert_orphan(&mut self, parent: NodeHash, node: SignedNode, now_slot: u64) -> bool {
        if self.count >= self.max_size {
            return false;
        }
        self.orphans.entry(parent).or_default().push(WaitingEntry {
            node,
            buffered_at: now_slot,
        });
        self.count += 1;
        true
    }

    /// Hold a candidate until every ID in `missing` has arrived. Returns
    /// `false` if full or if nothing is missing.
    pub fn insert_awaiting(&mut self, missing: Vec<TxId>, node: SignedNode, now_slot: u64) -> bool {
        if self.count >= self.max_size || missing.is_empty() {
            return false;
        }
        self.awaiting.push(AwaitingEntry {
            node,
            missing: missing.into_iter().collect(),
            buffered_at: now_slot,
        });
        self.count += 1;
        true
    }

    /// Release the candidates of `slot`. Candidates of earlier slots are
    /// discarded.
    pub fn take_slot(&mut self, slot: u64) -> Vec<SignedNode> {
        let later = self.future.split_off(&(slot + 1));
        let due = std::mem::replace(&mut self.future, later);
        let mut released = Vec::new();
        for (s, nodes) in due {
            self.count -= nodes.len();
            if s == slot {
                released = nodes;
            }
        }
        released
    }

    /// Release candidates waiting for `parent`.
    pub fn take_orphans(&mut self, parent: &NodeHash) -> Vec<SignedNode> {
        match self.orphans.remove(parent) {
            Some(entries) => {
                self.count -= entries.len();
                entries.into_iter().map(|e| e.node).collect()
            }
            None => Vec::new(),
        }
    }

    /// Record that `arrived` is now known and release every candidate that
    /// no longer misses anything.
    pub fn take_ready(&mut self, arrived: &TxId) -> Vec<SignedNode> {
        let mut released = Vec::new();
        let mut i = 0;
        while i < self.awaiting.len() {
            self.awaiting[i].missing.remove(arrived);
            if self.awaiting[i].missing.is_empty() {
                released.push(self.awaiting.swap_remove(i).node);
                self.count -= 1;
            } else {
                i += 1;
            }
        }
        released
    }

    /// Drop orphans and awaiting entries buffered more than `max_age_slots`
    /// slots ago, and future entries whose slot has passed.
    ///
    /// Returns the number of entries removed.
    pub fn clear_expired(&mut self, current_slot: u64, max_age_slots: u64) -> usize {
        let mut removed = 0;

        let kept = self.future.split_off(&current_slot);
        removed += self.future.values().map(Vec::len).sum::<usize>();
        self.future = kept;

        self.orphans.retain(|_parent, entries| {
            let before = entries.len();
            entries.retain(|e| current_slot.saturating_sub(e.buffered_at) <= max_age_slots);
            removed += before - entries.len();
            !entries.is_empty()
        });

        let before = self.awaiting.len();
        self.awaiting
            .retain(|e| current_slot.saturating_sub(e.buffered_at) <= max_age_slots);
        removed += before - self.awaiting.len();

        self.count -= removed;
        removed
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
