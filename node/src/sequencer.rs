//! Slot-driven sequencing.
//!
//! The [`SlotSequencer`] owns the [`Tree`] and every piece of per-slot state:
//! the pending transaction sequence, the best candidate seen for the current
//! slot, and the buffer of candidates that cannot be judged yet. It is
//! driven by one task ([`run_sequencer`]) that selects over slot ticks,
//! transactions, candidates, commands and shutdown, so none of that state
//! needs a lock.
//!
//! Candidate arrival is classified by slot: earlier slots are stale, the
//! current slot is evaluated, and later slots are buffered until the clock
//! catches up.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use drawtree_blocktree::{HeadChange, Node, SignedNode, Tree, TreeError};
use drawtree_ledger::{LedgerSnapshot, SignedTransaction};
use drawtree_messages::WireMessage;
use drawtree_types::{AccountId, Clock, KeyPair, NodeHash, TxId};

use crate::config::NodeConfig;
use crate::gossip::Gossip;
use crate::metrics::NodeMetrics;
use crate::node_buffer::{GapType, NodeBuffer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencerSettings {
    pub propose_empty: bool,
    pub max_future_slots: u64,
    pub recent_slots: u64,
    pub buffer_capacity: usize,
}

impl SequencerSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            propose_empty: config.propose_empty,
            max_future_slots: config.max_future_slots,
            recent_slots: config.recent_slots,
            buffer_capacity: config.buffer_capacity,
        }
    }
}

/// What happened to a received candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Valid for the current slot; `winner` if it is now the best one.
    Accepted { winner: bool },
    Duplicate,
    /// From an earlier slot. Kept only as a possible ancestor.
    Stale,
    Buffered(GapType),
    /// Too far ahead, or the buffer is full.
    Dropped,
    Rejected(TreeError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencerStatus {
    pub current_slot: u64,
    pub head: NodeHash,
    pub head_depth: u64,
    pub tree_size: usize,
    pub leaves: usize,
    pub pending: usize,
    pub buffered: usize,
    pub winner: Option<NodeHash>,
}

/// Queries answered by the sequencer task.
pub enum SequencerCommand {
    Status(oneshot::Sender<SequencerStatus>),
    Balance(AccountId, oneshot::Sender<u64>),
    Snapshot(oneshot::Sender<LedgerSnapshot>),
    /// Text rendering of every branch.
    Render(oneshot::Sender<String>),
}

pub struct SlotSequencer {
    tree: Tree,
    keys: Arc<KeyPair>,
    settings: SequencerSettings,
    current_slot: u64,
    pending: Vec<TxId>,
    winner: Option<SignedNode>,
    /// Candidates evaluated during the current slot.
    seen: HashSet<NodeHash>,
    /// Verified candidates of the last `recent_slots` slots, by hash.
    recent: HashMap<NodeHash, SignedNode>,
    buffer: NodeBuffer,
    /// Nodes to flood once the current event is handled.
    outbox: Vec<SignedNode>,
    metrics: Arc<NodeMetrics>,
}

impl SlotSequencer {
    pub fn new(
        tree: Tree,
        keys: Arc<KeyPair>,
        settings: SequencerSettings,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        let buffer = NodeBuffer::new(settings.buffer_capacity);
        Self {
            tree,
            keys,
            settings,
            current_slot: 0,
            pending: Vec::new(),
            winner: None,
            seen: HashSet::new(),
            recent: HashMap::new(),
            buffer,
            outbox: Vec::new(),
            metrics,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn current_slot(&self) -> u64 {
        self.current_slot
    }

    pub fn pending(&self) -> &[TxId] {
        &self.pending
    }

    pub fn winner(&self) -> Option<&SignedNode> {
        self.winner.as_ref()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn balance(&self, account: &AccountId) -> u64 {
        self.tree.ledger().balance(account)
    }

    pub fn status(&self) -> SequencerStatus {
        SequencerStatus {
            current_slot: self.current_slot,
            head: self.tree.head(),
            head_depth: self.tree.head_depth(),
            tree_size: self.tree.len(),
            leaves: self.tree.leaves().len(),
            pending: self.pending.len(),
            buffered: self.buffer.len(),
            winner: self.winner.as_ref().map(SignedNode::hash),
        }
    }

    /// Nodes produced or accepted since the last call, in order.
    pub fn take_outbox(&mut self) -> Vec<SignedNode> {
        std::mem::take(&mut self.outbox)
    }

    // ── Slot ticks ──────────────────────────────────────────────────────

    /// Close the current slot and open `slot`.
    ///
    /// Commits the closed slot's winner, re-admits the pending sequence
    /// against the new head (followed by any transactions a reorg took off
    /// the head path), proposes a local node if the draw participates,
    /// and releases candidates buffered for `slot`. Ticks that do not move
    /// forward are ignored.
    pub fn on_tick(&mut self, slot: u64) {
        if slot <= self.current_slot {
            return;
        }
        if let Some(winner) = self.winner.take() {
            self.commit(winner);
        }

        self.current_slot = slot;
        let mut pending = std::mem::take(&mut self.pending);
        for id in self.tree.take_returned() {
            if !pending.contains(&id) {
                pending.push(id);
            }
        }
        self.pending = self.tree.admit_pending(&pending);
        self.seen.clear();
        let horizon = slot.saturating_sub(self.settings.recent_slots);
        self.recent.retain(|_, candidate| candidate.node.slot >= horizon);

        self.propose(slot);

        for candidate in self.buffer.take_slot(slot) {
            self.route(candidate);
        }
        let expired = self.buffer.clear_expired(slot, self.settings.recent_slots);
        if expired > 0 {
            tracing::debug!(slot, expired, "expired buffered candidates");
        }
        self.refresh_gauges();
    }

    fn commit(&mut self, winner: SignedNode) {
        let hash = winner.hash();
        let slot = winner.node.slot;
        match self.tree.consider_leaf(winner.node) {
            Ok(change) => {
                self.metrics.leaves_adopted.inc();
                self.record_head_change(hash, change);
                tracing::info!(
                    slot,
                    node = %hash,
                    head = %self.tree.head(),
                    depth = self.tree.head_depth(),
                    "slot winner committed"
                );
            }
            Err(e) if e.is_consistency_gap() => {
                self.metrics.consistency_gaps.inc();
                tracing::warn!(slot, node = %hash, error = %e, "cannot commit slot winner");
            }
            Err(e) => {
                tracing::warn!(slot, node = %hash, error = %e, "slot winner refused by tree");
            }
        }
    }

    fn record_head_change(&self, hash: NodeHash, change: HeadChange) {
        match change {
            HeadChange::Reorg {
                rolled_back,
                applied,
            } => {
                self.metrics.reorgs.inc();
                tracing::info!(node = %hash, rolled_back, applied, "head switched branch");
            }
            HeadChange::Extended { applied } => {
                tracing::debug!(node = %hash, applied, "head extended");
            }
            HeadChange::Unchanged => {
                tracing::debug!(node = %hash, "node added off the head");
            }
        }
    }

    fn propose(&mut self, slot: u64) {
        if self.pending.is_empty() && !self.settings.propose_empty {
            return;
        }
        let node = Node::new(
            self.tree.seed(),
            slot,
            self.pending.clone(),
            &self.keys,
            &self.tree.head(),
        );
        if !self.tree.is_participating(&node) {
            tracing::trace!(slot, "local draw below hardness");
            return;
        }
        let signed = SignedNode::sign(node, &self.keys.private);
        let hash = signed.hash();
        tracing::debug!(
            slot,
            node = %hash,
            transactions = self.pending.len(),
            "proposing node"
        );
        self.seen.insert(hash);
        self.recent.insert(hash, signed.clone());
        self.winner = Some(signed.clone());
        self.outbox.push(signed);
    }

    // ── Candidates ──────────────────────────────────────────────────────

    /// Handle a candidate received from a peer.
    pub fn on_node(&mut self, candidate: SignedNode) -> Verdict {
        self.metrics.candidates_received.inc();
        let hash = candidate.hash();
        let verdict = self.route(candidate);
        if let Verdict::Rejected(e) = &verdict {
            self.metrics.candidates_rejected.inc();
            tracing::debug!(node = %hash, error = %e, "candidate rejected");
        }
        self.metrics
            .buffered_candidates
            .set(self.buffer.len() as i64);
        verdict
    }

    fn route(&mut self, candidate: SignedNode) -> Verdict {
        let hash = candidate.hash();
        if self.tree.contains(&hash) || self.seen.contains(&hash) {
            return Verdict::Duplicate;
        }
        if !candidate.verify() {
            return Verdict::Rejected(TreeError::InvalidSignature);
        }
        if !candidate.node.verify_draw() {
            return Verdict::Rejected(TreeError::InvalidDraw);
        }

        let slot = candidate.node.slot;
        if slot < self.current_slot {
            let horizon = self.current_slot.saturating_sub(self.settings.recent_slots);
            if slot >= horizon && !self.recent.contains_key(&hash) {
                self.recent.insert(hash, candidate);
                self.retry_orphans(hash);
            }
            return Verdict::Stale;
        }
        if slot > self.current_slot {
            if slot - self.current_slot > self.settings.max_future_slots {
                tracing::debug!(node = %hash, slot, "candidate too far ahead");
                return Verdict::Dropped;
            }
            return if self.buffer.insert_future(slot, candidate) {
                Verdict::Buffered(GapType::FutureSlot)
            } else {
                Verdict::Dropped
            };
        }
        self.evaluate(candidate)
    }

    fn evaluate(&mut self, candidate: SignedNode) -> Verdict {
        let hash = candidate.hash();

        let mut gap = self.resolve_ancestors(&candidate.node).err();
        if gap.is_none() {
            let missing = self.tree.missing_transactions(&candidate.node);
            if !missing.is_empty() {
                gap = Some(TreeError::MissingTransactions(missing));
            }
        }
        match gap {
            Some(TreeError::MissingParent(parent)) => {
                self.metrics.consistency_gaps.inc();
                tracing::warn!(node = %hash, parent = %parent, "candidate parent unknown");
                return if self
                    .buffer
                    .insert_orphan(parent, candidate, self.current_slot)
                {
                    Verdict::Buffered(GapType::Parent)
                } else {
                    Verdict::Dropped
                };
            }
            Some(TreeError::MissingTransactions(ids)) => {
                self.metrics.consistency_gaps.inc();
                tracing::warn!(
                    node = %hash,
                    missing = ids.len(),
                    "candidate references unknown transactions"
                );
                return if self
                    .buffer
                    .insert_awaiting(ids, candidate, self.current_slot)
                {
                    Verdict::Buffered(GapType::Transactions)
                } else {
                    Verdict::Dropped
                };
            }
            Some(e) => return Verdict::Rejected(e),
            None => {}
        }

        if let Err(e) = self.tree.validate_candidate(&candidate) {
            return Verdict::Rejected(e);
        }

        self.seen.insert(hash);
        self.recent.insert(hash, candidate.clone());
        let better = match &self.winner {
            None => true,
            Some(current) => {
                self.tree
                    .compare_value_of_nodes(&candidate.node, &current.node)
                    == Ordering::Less
            }
        };
        if better {
            tracing::debug!(slot = self.current_slot, node = %hash, "new slot winner");
            self.winner = Some(candidate.clone());
        }
        self.outbox.push(candidate);
        Verdict::Accepted { winner: better }
    }

    /// Make the node's parent chain available in the tree, inserting
    /// ancestors found among recent candidates oldest first.
    fn resolve_ancestors(&mut self, node: &Node) -> Result<(), TreeError> {
        let mut chain: Vec<SignedNode> = Vec::new();
        let mut parent = node.parent;
        while !self.tree.contains(&parent) {
            let ancestor = self
                .recent
                .get(&parent)
                .ok_or(TreeError::MissingParent(parent))?;
            if chain.len() as u64 > self.settings.recent_slots {
                return Err(TreeError::MissingParent(parent));
            }
            parent = ancestor.node.parent;
            chain.push(ancestor.clone());
        }

        for ancestor in chain.into_iter().rev() {
            let hash = ancestor.hash();
            if let Err(e) = self.tree.validate_candidate(&ancestor) {
                self.recent.remove(&hash);
                return Err(e);
            }
            let change = self.tree.consider_leaf(ancestor.node)?;
            self.record_head_change(hash, change);
        }
        Ok(())
    }

    fn retry_orphans(&mut self, parent: NodeHash) {
        for orphan in self.buffer.take_orphans(&parent) {
            self.route(orphan);
        }
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Stage a transaction. On admission its ID joins the pending sequence.
    /// Candidates that were waiting for it are judged again either way.
    pub fn on_transaction(&mut self, tx: SignedTransaction) -> Result<(), TreeError> {
        let id = tx.id().clone();
        let result = self.tree.consider_transaction(tx, &self.pending);
        match &result {
            Ok(()) => {
                if !self.pending.contains(&id) {
                    self.pending.push(id.clone());
                }
                self.metrics.transactions_admitted.inc();
                tracing::debug!(tx = %id, pending = self.pending.len(), "transaction admitted");
            }
            Err(e) => {
                self.metrics.transactions_rejected.inc();
                tracing::debug!(tx = %id, error = %e, "transaction not admitted");
            }
        }

        for candidate in self.buffer.take_ready(&id) {
            self.route(candidate);
        }
        self.refresh_gauges();
        result
    }

    // ── Commands ────────────────────────────────────────────────────────

    pub fn handle_command(&self, command: SequencerCommand) {
        match command {
            SequencerCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            SequencerCommand::Balance(account, reply) => {
                let _ = reply.send(self.balance(&account));
            }
            SequencerCommand::Snapshot(reply) => {
                let _ = reply.send(self.tree.snapshot());
            }
            SequencerCommand::Render(reply) => {
                let _ = reply.send(self.tree.to_string());
            }
        }
    }

    fn refresh_gauges(&self) {
        self.metrics.current_slot.set(self.current_slot as i64);
        self.metrics.tree_size.set(self.tree.len() as i64);
        self.metrics.head_depth.set(self.tree.head_depth() as i64);
        self.metrics
            .pending_transactions
            .set(self.pending.len() as i64);
        self.metrics
            .buffered_candidates
            .set(self.buffer.len() as i64);
    }
}

/// Channels feeding the sequencer task.
pub struct SequencerInputs {
    pub transactions: mpsc::Receiver<SignedTransaction>,
    pub nodes: mpsc::Receiver<SignedNode>,
    pub commands: mpsc::Receiver<SequencerCommand>,
}

/// Drive `sequencer` until shutdown, flooding every node it produces or
/// accepts.
pub async fn run_sequencer(
    mut sequencer: SlotSequencer,
    clock: Arc<dyn Clock>,
    mut inputs: SequencerInputs,
    gossip: Gossip,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let slot_ms = sequencer.tree().params().slot_duration_ms;
    sequencer.on_tick(clock.current_slot(slot_ms));
    flush_outbox(&mut sequencer, &gossip).await;
    tracing::info!(slot = sequencer.current_slot(), "sequencer started");

    loop {
        let next_tick = tokio::time::sleep(clock.until_next_slot(slot_ms));
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                tracing::info!("sequencer shutting down");
                break;
            }
            _ = next_tick => {
                sequencer.on_tick(clock.current_slot(slot_ms));
            }
            Some(tx) = inputs.transactions.recv() => {
                let _ = sequencer.on_transaction(tx);
            }
            Some(node) = inputs.nodes.recv() => {
                sequencer.on_node(node);
            }
            Some(command) = inputs.commands.recv() => {
                sequencer.handle_command(command);
            }
        }
        flush_outbox(&mut sequencer, &gossip).await;
    }
}

async fn flush_outbox(sequencer: &mut SlotSequencer, gossip: &Gossip) {
    for node in sequencer.take_outbox() {
        gossip.broadcast(&WireMessage::Node(node)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawtree_blocktree::Node;
    use drawtree_crypto::keypair_from_seed;
    use drawtree_ledger::Transaction;
    use drawtree_types::ChainParams;

    fn keys(n: u8) -> Arc<KeyPair> {
        Arc::new(keypair_from_seed(&[n; 32]))
    }

    fn params() -> ChainParams {
        ChainParams {
            hardness_exponent: 200,
            ..ChainParams::default()
        }
    }

    fn settings() -> SequencerSettings {
        SequencerSettings {
            propose_empty: false,
            max_future_slots: 4,
            recent_slots: 8,
            buffer_capacity: 64,
        }
    }

    /// Genesis gives each of keys 1..=3 a stake of 1000.
    fn tree() -> Tree {
        let created = (1u8..=3)
            .map(|n| Transaction {
                id: TxId::new(n as u64, "genesis"),
                from: AccountId::genesis(),
                to: keys(n).account(),
                amount: 1_000,
            })
            .collect();
        Tree::new(Node::genesis(42, created), params())
    }

    fn sequencer_for(n: u8, settings: SequencerSettings) -> SlotSequencer {
        SlotSequencer::new(tree(), keys(n), settings, Arc::new(NodeMetrics::new()))
    }

    fn candidate(n: u8, slot: u64, parent: NodeHash, txs: Vec<TxId>) -> SignedNode {
        let k = keys(n);
        SignedNode::sign(Node::new(42, slot, txs, &k, &parent), &k.private)
    }

    fn transfer(from: u8, to: u8, index: u64, amount: u64) -> SignedTransaction {
        let k = keys(from);
        SignedTransaction::sign(
            Transaction {
                id: TxId::new(index, "test"),
                from: k.account(),
                to: keys(to).account(),
                amount,
            },
            &k.private,
        )
    }

    // ----------------------------------------------------------------
    // Proposing and committing
    // ----------------------------------------------------------------

    #[test]
    fn no_proposal_without_pending_transactions() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        assert!(seq.winner().is_none());
        assert!(seq.take_outbox().is_empty());
    }

    #[test]
    fn propose_empty_proposes_every_slot() {
        let mut seq = sequencer_for(
            1,
            SequencerSettings {
                propose_empty: true,
                ..settings()
            },
        );
        seq.on_tick(1);
        let outbox = seq.take_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].node.slot, 1);
        assert_eq!(outbox[0].node.parent, seq.tree().genesis());
        assert!(outbox[0].verify());
    }

    #[test]
    fn pending_transaction_is_proposed_then_committed() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        seq.on_transaction(transfer(2, 3, 0, 100)).unwrap();
        assert_eq!(seq.pending().len(), 1);

        seq.on_tick(2);
        let proposed = seq.winner().cloned().expect("local node proposed");
        assert_eq!(proposed.node.transaction_ids, vec![TxId::new(0, "test")]);

        seq.on_tick(3);
        assert_eq!(seq.tree().head(), proposed.hash());
        assert_eq!(seq.balance(&keys(2).account()), 900);
        assert_eq!(seq.balance(&keys(3).account()), 1_099);
        // reward 10 plus fee 1
        assert_eq!(seq.balance(&keys(1).account()), 1_011);
        assert!(seq.pending().is_empty());
    }

    #[test]
    fn ticks_that_do_not_advance_are_ignored() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(5);
        seq.on_tick(5);
        seq.on_tick(3);
        assert_eq!(seq.current_slot(), 5);
    }

    #[test]
    fn unaffordable_transaction_rejected() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        assert!(seq.on_transaction(transfer(2, 3, 0, 5_000)).is_err());
        assert!(seq.pending().is_empty());
    }

    #[test]
    fn second_spend_checked_against_pending() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        seq.on_transaction(transfer(2, 3, 0, 600)).unwrap();
        assert!(seq.on_transaction(transfer(2, 3, 1, 600)).is_err());
        assert_eq!(seq.pending().len(), 1);
    }

    // ----------------------------------------------------------------
    // Candidate arrival
    // ----------------------------------------------------------------

    #[test]
    fn current_slot_candidate_accepted_and_forwarded() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        let genesis = seq.tree().genesis();
        let verdict = seq.on_node(candidate(2, 1, genesis, vec![]));
        assert_eq!(verdict, Verdict::Accepted { winner: true });
        assert_eq!(seq.take_outbox().len(), 1);
    }

    #[test]
    fn duplicate_candidate_ignored() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        let c = candidate(2, 1, seq.tree().genesis(), vec![]);
        seq.on_node(c.clone());
        assert_eq!(seq.on_node(c), Verdict::Duplicate);
    }

    #[test]
    fn stale_candidate_not_evaluated() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(3);
        let verdict = seq.on_node(candidate(2, 2, seq.tree().genesis(), vec![]));
        assert_eq!(verdict, Verdict::Stale);
        assert!(seq.winner().is_none());
    }

    #[test]
    fn future_candidate_buffered_until_its_slot() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        let genesis = seq.tree().genesis();
        let c = candidate(2, 3, genesis, vec![]);
        assert_eq!(
            seq.on_node(c.clone()),
            Verdict::Buffered(GapType::FutureSlot)
        );
        assert_eq!(seq.buffered(), 1);

        seq.on_tick(3);
        assert_eq!(seq.buffered(), 0);
        assert_eq!(seq.winner().map(SignedNode::hash), Some(c.hash()));
    }

    #[test]
    fn far_future_candidate_dropped() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        let verdict = seq.on_node(candidate(2, 10, seq.tree().genesis(), vec![]));
        assert_eq!(verdict, Verdict::Dropped);
        assert_eq!(seq.buffered(), 0);
    }

    #[test]
    fn tampered_candidate_rejected() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        let mut c = candidate(2, 1, seq.tree().genesis(), vec![]);
        c.node.transaction_ids.push(TxId::new(9, "x"));
        assert_eq!(
            seq.on_node(c),
            Verdict::Rejected(TreeError::InvalidSignature)
        );
    }

    #[test]
    fn unstaked_signer_rejected() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        let verdict = seq.on_node(candidate(9, 1, seq.tree().genesis(), vec![]));
        assert_eq!(verdict, Verdict::Rejected(TreeError::BelowHardness));
    }

    #[test]
    fn best_candidate_wins_regardless_of_arrival_order() {
        let genesis = tree().genesis();
        let a = candidate(2, 1, genesis, vec![]);
        let b = candidate(3, 1, genesis, vec![]);

        let mut first = sequencer_for(1, settings());
        first.on_tick(1);
        first.on_node(a.clone());
        first.on_node(b.clone());

        let mut second = sequencer_for(1, settings());
        second.on_tick(1);
        second.on_node(b);
        second.on_node(a);

        let w1 = first.winner().map(SignedNode::hash);
        let w2 = second.winner().map(SignedNode::hash);
        assert!(w1.is_some());
        assert_eq!(w1, w2);
        // both are forwarded even when not winning
        assert_eq!(first.take_outbox().len(), 2);
    }

    #[test]
    fn candidate_waits_for_missing_transaction() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        let tx = transfer(2, 3, 0, 50);
        let c = candidate(2, 1, seq.tree().genesis(), vec![tx.id().clone()]);
        assert_eq!(
            seq.on_node(c.clone()),
            Verdict::Buffered(GapType::Transactions)
        );
        assert!(seq.winner().is_none());

        seq.on_transaction(tx).unwrap();
        assert_eq!(seq.buffered(), 0);
        assert_eq!(seq.winner().map(SignedNode::hash), Some(c.hash()));
    }

    #[test]
    fn recent_stale_candidate_resolves_parent() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(2);
        let genesis = seq.tree().genesis();
        let parent = candidate(2, 1, genesis, vec![]);
        let child = candidate(3, 2, parent.hash(), vec![]);

        assert_eq!(seq.on_node(parent.clone()), Verdict::Stale);
        assert_eq!(seq.on_node(child), Verdict::Accepted { winner: true });
        assert!(seq.tree().contains(&parent.hash()));
    }

    #[test]
    fn transaction_rolled_back_by_reorg_is_proposed_again() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(1);
        let tx = transfer(2, 3, 0, 100);
        let id = tx.id().clone();
        seq.on_transaction(tx).unwrap();
        seq.on_tick(2);
        seq.on_tick(3);
        assert!(seq.tree().delivered().contains(&id));
        assert!(seq.pending().is_empty());

        // a longer branch without the transfer overtakes the head
        let genesis = seq.tree().genesis();
        let q1 = candidate(2, 1, genesis, vec![]);
        let q2 = candidate(2, 2, q1.hash(), vec![]);
        let q3 = candidate(2, 3, q2.hash(), vec![]);
        assert_eq!(seq.on_node(q1), Verdict::Stale);
        assert_eq!(seq.on_node(q2), Verdict::Stale);
        assert_eq!(seq.on_node(q3.clone()), Verdict::Accepted { winner: true });
        assert!(seq.tree().received().contains(&id));
        assert!(!seq.tree().delivered().contains(&id));

        seq.on_tick(4);
        assert_eq!(seq.tree().head(), q3.hash());
        assert_eq!(seq.pending(), &[id.clone()]);
        let proposed = seq.winner().cloned().expect("local node proposed");
        assert_eq!(proposed.node.parent, q3.hash());
        assert_eq!(proposed.node.transaction_ids, vec![id.clone()]);

        seq.on_tick(5);
        assert_eq!(seq.tree().head(), proposed.hash());
        assert_eq!(seq.tree().head_depth(), 4);
        assert!(seq.tree().delivered().contains(&id));
        assert!(seq.pending().is_empty());
    }

    #[test]
    fn orphan_released_when_parent_arrives() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(2);
        let genesis = seq.tree().genesis();
        let parent = candidate(2, 1, genesis, vec![]);
        let child = candidate(3, 2, parent.hash(), vec![]);

        assert_eq!(
            seq.on_node(child.clone()),
            Verdict::Buffered(GapType::Parent)
        );
        seq.on_node(parent);
        assert_eq!(seq.buffered(), 0);
        assert_eq!(seq.winner().map(SignedNode::hash), Some(child.hash()));
    }

    #[test]
    fn status_reflects_state() {
        let mut seq = sequencer_for(1, settings());
        seq.on_tick(4);
        seq.on_transaction(transfer(2, 3, 0, 10)).unwrap();
        let status = seq.status();
        assert_eq!(status.current_slot, 4);
        assert_eq!(status.head, seq.tree().genesis());
        assert_eq!(status.tree_size, 1);
        assert_eq!(status.pending, 1);
        assert_eq!(status.winner, None);
    }

    #[tokio::test]
    async fn commands_answer_over_oneshot() {
        let seq = sequencer_for(1, settings());
        let (tx, rx) = oneshot::channel();
        seq.handle_command(SequencerCommand::Balance(keys(2).account(), tx));
        assert_eq!(rx.await.unwrap(), 1_000);

        let (tx, rx) = oneshot::channel();
        seq.handle_command(SequencerCommand::Snapshot(tx));
        assert!(rx.await.unwrap().verify());
    }
}
