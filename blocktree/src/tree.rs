//! The block tree: fork choice, ledger replay and rollback.
//!
//! Nodes are never removed. Leaves are kept fully ranked by
//! [`Tree::compare_weight`] (deepest first, then highest stake-weighted draw,
//! then smallest signer identity, then smallest hash), and the head is
//! always the first leaf.
//!
//! The ledger always equals a replay of the genesis→head path. Each node
//! applied along that path leaves a journal entry holding the prior balances
//! of the accounts it touched and the transactions it delivered, so moving
//! to another branch rolls the journal back to the common ancestor and
//! applies the new branch forward.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use drawtree_ledger::{
    BalanceCheckpoint, Ledger, LedgerSnapshot, SignedTransaction, Transaction, TransactionMap,
};
use drawtree_types::{AccountId, ChainParams, Clock, NodeHash, TxId};

use crate::draw::{hardness, DrawValue};
use crate::{Node, SignedNode, TreeError};

struct TreeEntry {
    node: Node,
    /// Path length to genesis.
    depth: u64,
    /// Draw value weighted by the signer's stake at the parent.
    value: DrawValue,
}

struct AppliedNode {
    hash: NodeHash,
    checkpoint: BalanceCheckpoint,
    delivered: Vec<TxId>,
}

/// How the head moved after a tree update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadChange {
    Unchanged,
    Extended { applied: usize },
    Reorg { rolled_back: usize, applied: usize },
}

enum Lookup<'a> {
    Available(&'a Transaction),
    AlreadyApplied,
    Unknown,
}

#[derive(Default)]
struct NodeOutcome {
    applied: Vec<TxId>,
    fees: u64,
    rejected: usize,
    duplicates: usize,
    missing: usize,
}

/// Apply one node's effects to `ledger`. Genesis mints its created stake;
/// any other node applies each listed transaction with the fee and pays the
/// signer the reward plus collected fees.
fn apply_node<'a>(
    ledger: &mut Ledger,
    node: &Node,
    params: &ChainParams,
    mut lookup: impl FnMut(&TxId) -> Lookup<'a>,
) -> NodeOutcome {
    let mut outcome = NodeOutcome::default();

    if node.is_genesis() {
        for tx in &node.created_stake {
            if let Err(e) = ledger.add_to_balance(&tx.to, tx.amount) {
                tracing::warn!(account = %tx.to, error = %e, "genesis mint skipped");
            }
        }
        return outcome;
    }

    for id in &node.transaction_ids {
        if outcome.applied.contains(id) {
            outcome.duplicates += 1;
            continue;
        }
        match lookup(id) {
            Lookup::Available(tx) => match ledger.apply_with_fee(tx, params.fee) {
                Ok(fee) => {
                    outcome.fees = outcome.fees.saturating_add(fee);
                    outcome.applied.push(id.clone());
                }
                Err(e) => {
                    tracing::debug!(tx = %id, error = %e, "transaction not applied");
                    outcome.rejected += 1;
                }
            },
            Lookup::AlreadyApplied => outcome.duplicates += 1,
            Lookup::Unknown => outcome.missing += 1,
        }
    }

    let payout = params.reward.saturating_add(outcome.fees);
    if let Err(e) = ledger.add_to_balance(&node.peer, payout) {
        tracing::warn!(peer = %node.peer, error = %e, "signer payout skipped");
    }
    outcome
}

pub struct Tree {
    params: ChainParams,
    hardness: DrawValue,
    genesis: NodeHash,
    nodes: HashMap<NodeHash, TreeEntry>,
    leaves: Vec<NodeHash>,
    head: NodeHash,
    ledger: Ledger,
    received: TransactionMap,
    delivered: TransactionMap,
    /// One entry per node on the genesis→head path, genesis first.
    journal: Vec<AppliedNode>,
    /// Transactions a reorg took off the head path that the new branch did
    /// not deliver again, oldest first.
    returned: Vec<TxId>,
}

impl Tree {
    pub fn new(genesis: Node, params: ChainParams) -> Self {
        let hash = genesis.hash();
        let mut nodes = HashMap::new();
        nodes.insert(
            hash,
            TreeEntry {
                node: genesis,
                depth: 0,
                value: DrawValue::zero(),
            },
        );
        let mut tree = Self {
            hardness: hardness(params.hardness_exponent),
            params,
            genesis: hash,
            nodes,
            leaves: vec![hash],
            head: hash,
            ledger: Ledger::new(),
            received: TransactionMap::new(),
            delivered: TransactionMap::new(),
            journal: Vec::new(),
            returned: Vec::new(),
        };
        tree.apply_all_transactions(hash);
        tree
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.nodes
            .get(&self.genesis)
            .map(|e| e.node.seed)
            .unwrap_or(self.params.genesis_seed)
    }

    pub fn genesis(&self) -> NodeHash {
        self.genesis
    }

    pub fn head(&self) -> NodeHash {
        self.head
    }

    pub fn head_node(&self) -> Option<&Node> {
        self.get(&self.head)
    }

    pub fn head_depth(&self) -> u64 {
        self.depth(&self.head).unwrap_or(0)
    }

    pub fn leaves(&self) -> &[NodeHash] {
        &self.leaves
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn received(&self) -> &TransactionMap {
        &self.received
    }

    pub fn delivered(&self) -> &TransactionMap {
        &self.delivered
    }

    pub fn get(&self, hash: &NodeHash) -> Option<&Node> {
        self.nodes.get(hash).map(|e| &e.node)
    }

    pub fn contains(&self, hash: &NodeHash) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn depth(&self, hash: &NodeHash) -> Option<u64> {
        self.nodes.get(hash).map(|e| e.depth)
    }

    /// Number of nodes, genesis included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stake of `peer` at the head.
    pub fn stake(&self, peer: &AccountId) -> u64 {
        self.ledger.balance(peer)
    }

    pub fn current_slot(&self, clock: &dyn Clock) -> u64 {
        clock.current_slot(self.params.slot_duration_ms)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::capture(&self.ledger, self.head, self.head_depth())
    }

    // ── Nodes ───────────────────────────────────────────────────────────

    /// Insert a node and move the head if it now ranks first.
    ///
    /// Known nodes are a no-op. Nodes referencing transactions this replica
    /// has not seen are refused with [`TreeError::MissingTransactions`] so
    /// the caller can retry once they arrive.
    pub fn consider_leaf(&mut self, node: Node) -> Result<HeadChange, TreeError> {
        let hash = node.hash();
        if self.nodes.contains_key(&hash) {
            return Ok(HeadChange::Unchanged);
        }
        self.check_structure(&node)?;
        let missing = self.missing_transactions(&node);
        if !missing.is_empty() {
            return Err(TreeError::MissingTransactions(missing));
        }
        self.add_leaf(hash, node);
        Ok(self.update_ledger())
    }

    /// Whether the node's parent is in the tree.
    pub fn check_is_next(&self, node: &Node) -> bool {
        self.nodes.contains_key(&node.parent)
    }

    /// Full check of a network candidate apart from transaction availability.
    pub fn validate_candidate(&self, signed: &SignedNode) -> Result<(), TreeError> {
        if !signed.verify() {
            return Err(TreeError::InvalidSignature);
        }
        if !signed.node.verify_draw() {
            return Err(TreeError::InvalidDraw);
        }
        self.check_structure(&signed.node)?;
        if !self.is_participating(&signed.node) {
            return Err(TreeError::BelowHardness);
        }
        Ok(())
    }

    fn check_structure(&self, node: &Node) -> Result<(), TreeError> {
        if node.peer.is_genesis() {
            return Err(TreeError::InvalidNode("only genesis is signed by Genesis"));
        }
        if !node.created_stake.is_empty() {
            return Err(TreeError::InvalidNode("only genesis may create stake"));
        }
        let parent = &self
            .nodes
            .get(&node.parent)
            .ok_or(TreeError::MissingParent(node.parent))?
            .node;
        if node.slot <= parent.slot {
            return Err(TreeError::NonCausalSlot {
                slot: node.slot,
                parent_slot: parent.slot,
            });
        }
        if node.seed != parent.seed {
            return Err(TreeError::SeedMismatch {
                expected: parent.seed,
                got: node.seed,
            });
        }
        Ok(())
    }

    /// Referenced transaction IDs this replica has never seen, deduplicated.
    pub fn missing_transactions(&self, node: &Node) -> Vec<TxId> {
        let mut missing: Vec<TxId> = Vec::new();
        for id in &node.transaction_ids {
            if !self.received.contains(id) && !self.delivered.contains(id) && !missing.contains(id)
            {
                missing.push(id.clone());
            }
        }
        missing
    }

    /// Stake-weighted draw value, using the signer's stake in the ledger
    /// state at the node's parent. `None` when the parent is unknown.
    pub fn draw_value(&self, node: &Node) -> Option<DrawValue> {
        if let Some(entry) = self.nodes.get(&node.hash()) {
            return Some(entry.value);
        }
        let stake = self.ledger_at(&node.parent)?.balance(&node.peer);
        Some(node.value_of_draw(stake))
    }

    pub fn is_participating(&self, node: &Node) -> bool {
        self.draw_value(node)
            .map(|value| value > self.hardness)
            .unwrap_or(false)
    }

    /// Rank two same-slot candidates. `Ordering::Less` means `a` is the
    /// better one: higher draw value, then smaller signer identity, then
    /// smaller hash.
    pub fn compare_value_of_nodes(&self, a: &Node, b: &Node) -> Ordering {
        let va = self.draw_value(a).unwrap_or_else(DrawValue::zero);
        let vb = self.draw_value(b).unwrap_or_else(DrawValue::zero);
        vb.cmp(&va)
            .then_with(|| a.peer.cmp(&b.peer))
            .then_with(|| a.hash().cmp(&b.hash()))
    }

    /// Fork-choice order of two inserted nodes. `Ordering::Less` means `a`
    /// ranks ahead.
    pub fn compare_weight(&self, a: &NodeHash, b: &NodeHash) -> Ordering {
        match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(ea), Some(eb)) => eb
                .depth
                .cmp(&ea.depth)
                .then_with(|| eb.value.cmp(&ea.value))
                .then_with(|| ea.node.peer.cmp(&eb.node.peer))
                .then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    /// Record a node and place it among the leaves. A leaf parent is
    /// replaced by its child; otherwise the node opens a new branch.
    fn add_leaf(&mut self, hash: NodeHash, node: Node) {
        let Some(parent) = self.nodes.get(&node.parent) else {
            return;
        };
        let depth = parent.depth + 1;
        let stake = self
            .ledger_at(&node.parent)
            .map(|ledger| ledger.balance(&node.peer))
            .unwrap_or(0);
        let value = node.value_of_draw(stake);
        let parent_hash = node.parent;

        self.nodes.insert(hash, TreeEntry { node, depth, value });
        self.leaves.retain(|leaf| *leaf != parent_hash);
        let position = self
            .leaves
            .iter()
            .position(|leaf| self.compare_weight(&hash, leaf) == Ordering::Less)
            .unwrap_or(self.leaves.len());
        self.leaves.insert(position, hash);
    }

    // ── Paths ───────────────────────────────────────────────────────────

    /// Nodes strictly after `from` up to and including `to`, in order.
    /// Empty when they are equal, `None` if `from` is not an ancestor of `to`.
    pub fn path_from_to(&self, from: &NodeHash, to: &NodeHash) -> Option<Vec<NodeHash>> {
        let from_depth = self.nodes.get(from)?.depth;
        let mut path = Vec::new();
        let mut cursor = *to;
        while cursor != *from {
            let entry = self.nodes.get(&cursor)?;
            if entry.depth <= from_depth {
                return None;
            }
            path.push(cursor);
            cursor = entry.node.parent;
        }
        path.reverse();
        Some(path)
    }

    fn common_ancestor(&self, a: NodeHash, b: NodeHash) -> NodeHash {
        let depth = |h: &NodeHash| self.nodes.get(h).map(|e| e.depth).unwrap_or(0);
        let parent = |h: &NodeHash| {
            self.nodes
                .get(h)
                .map(|e| e.node.parent)
                .unwrap_or(self.genesis)
        };
        let (mut a, mut b) = (a, b);
        while depth(&a) > depth(&b) {
            a = parent(&a);
        }
        while depth(&b) > depth(&a) {
            b = parent(&b);
        }
        while a != b {
            if a == self.genesis || b == self.genesis {
                return self.genesis;
            }
            a = parent(&a);
            b = parent(&b);
        }
        a
    }

    // ── Ledger ──────────────────────────────────────────────────────────

    /// Bring the ledger in line with the best leaf.
    ///
    /// If the best leaf descends from the head only the new nodes are
    /// applied. Otherwise the head path is rolled back to the common
    /// ancestor, its delivered transactions returned to `received`, and the
    /// new branch applied.
    pub fn update_ledger(&mut self) -> HeadChange {
        let Some(best) = self.leaves.first().copied() else {
            return HeadChange::Unchanged;
        };
        if best == self.head {
            return HeadChange::Unchanged;
        }

        let ancestor = self.common_ancestor(self.head, best);
        let mut undone = Vec::new();
        let rolled_back = self.rollback_to(&ancestor, &mut undone);
        let path = self.path_from_to(&ancestor, &best).unwrap_or_default();
        let consistent = self.journal.last().map(|e| e.hash) == Some(ancestor);
        self.head = best;

        if !consistent {
            tracing::warn!(head = %best, "undo journal out of step, replaying from genesis");
            let mut earlier: Vec<TxId> = self
                .journal
                .iter()
                .flat_map(|entry| entry.delivered.iter().cloned())
                .collect();
            earlier.append(&mut undone);
            undone = earlier;
            self.resync();
        } else {
            for hash in &path {
                self.apply_all_transactions(*hash);
            }
        }

        for id in undone {
            if self.received.contains(&id) && !self.returned.contains(&id) {
                self.returned.push(id);
            }
        }

        if rolled_back == 0 {
            HeadChange::Extended {
                applied: path.len(),
            }
        } else {
            HeadChange::Reorg {
                rolled_back,
                applied: path.len(),
            }
        }
    }

    /// Undo head-path nodes down to `ancestor`. The IDs they delivered are
    /// appended to `undone` in path order.
    fn rollback_to(&mut self, ancestor: &NodeHash, undone: &mut Vec<TxId>) -> usize {
        let mut popped: Vec<Vec<TxId>> = Vec::new();
        loop {
            match self.journal.last() {
                Some(entry) if entry.hash != *ancestor => {}
                _ => break,
            }
            let Some(entry) = self.journal.pop() else {
                break;
            };
            self.ledger.restore(&entry.checkpoint);
            for id in entry.delivered.iter().rev() {
                self.delivered.move_to(id, &mut self.received);
            }
            popped.push(entry.delivered);
        }
        let count = popped.len();
        for ids in popped.into_iter().rev() {
            undone.extend(ids);
        }
        count
    }

    /// Drain the transactions returned to `received` by reorgs since the
    /// last call. The caller owns re-proposing them.
    pub fn take_returned(&mut self) -> Vec<TxId> {
        let returned = std::mem::take(&mut self.returned);
        returned
            .into_iter()
            .filter(|id| self.received.contains(id))
            .collect()
    }

    fn touched_accounts(&self, node: &Node) -> Vec<AccountId> {
        if node.is_genesis() {
            return node.created_stake.iter().map(|tx| tx.to.clone()).collect();
        }
        let mut accounts = vec![node.peer.clone()];
        for id in &node.transaction_ids {
            if let Some(tx) = self.received.get(id) {
                accounts.push(tx.transaction.from.clone());
                accounts.push(tx.transaction.to.clone());
            }
        }
        accounts
    }

    /// Apply a node on top of the head path, moving what it delivers out of
    /// `received` and journaling how to undo it.
    fn apply_all_transactions(&mut self, hash: NodeHash) {
        let Some(entry) = self.nodes.get(&hash) else {
            return;
        };
        let node = entry.node.clone();
        let checkpoint = self.ledger.capture(self.touched_accounts(&node).iter());

        let outcome = apply_node(&mut self.ledger, &node, &self.params, |id| {
            if let Some(tx) = self.received.get(id) {
                Lookup::Available(&tx.transaction)
            } else if self.delivered.contains(id) {
                Lookup::AlreadyApplied
            } else {
                Lookup::Unknown
            }
        });

        if outcome.duplicates > 0 {
            tracing::warn!(
                node = %hash,
                count = outcome.duplicates,
                "node repeats transactions already delivered on this path"
            );
        }
        if outcome.missing > 0 {
            tracing::warn!(
                node = %hash,
                count = outcome.missing,
                "consistency gap: node references unknown transactions"
            );
        }
        if outcome.rejected > 0 {
            tracing::debug!(
                node = %hash,
                count = outcome.rejected,
                "transactions left in received after failed apply"
            );
        }

        for id in &outcome.applied {
            self.received.move_to(id, &mut self.delivered);
        }
        self.journal.push(AppliedNode {
            hash,
            checkpoint,
            delivered: outcome.applied,
        });
    }

    /// Rebuild ledger, pools and journal by replaying genesis→head.
    pub fn resync(&mut self) {
        self.delivered.transfer_all(&mut self.received);
        self.ledger = Ledger::new();
        self.journal.clear();
        let mut path = vec![self.genesis];
        path.extend(
            self.path_from_to(&self.genesis, &self.head)
                .unwrap_or_default(),
        );
        for hash in path {
            self.apply_all_transactions(hash);
        }
    }

    /// The ledger state after applying the path up to `hash`.
    pub fn ledger_at(&self, hash: &NodeHash) -> Option<Ledger> {
        if *hash == self.head {
            return Some(self.ledger.clone());
        }
        if let Some(position) = self.journal.iter().position(|e| e.hash == *hash) {
            let mut ledger = self.ledger.clone();
            for entry in self.journal[position + 1..].iter().rev() {
                ledger.restore(&entry.checkpoint);
            }
            return Some(ledger);
        }
        self.replay_to(hash)
    }

    /// Replay genesis→head into a fresh ledger without touching any state.
    pub fn replay_from_genesis(&self) -> Ledger {
        self.replay_to(&self.head).unwrap_or_default()
    }

    fn replay_to(&self, target: &NodeHash) -> Option<Ledger> {
        let mut path = vec![self.genesis];
        path.extend(self.path_from_to(&self.genesis, target)?);

        let mut ledger = Ledger::new();
        let mut applied: HashSet<TxId> = HashSet::new();
        for hash in &path {
            let node = &self.nodes.get(hash)?.node;
            let outcome = apply_node(&mut ledger, node, &self.params, |id| {
                if applied.contains(id) {
                    return Lookup::AlreadyApplied;
                }
                match self.received.get(id).or_else(|| self.delivered.get(id)) {
                    Some(tx) => Lookup::Available(&tx.transaction),
                    None => Lookup::Unknown,
                }
            });
            applied.extend(outcome.applied);
        }
        Some(ledger)
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Stage a transaction in `received` and check, on a copy of the
    /// ledger, that it still applies after the `pending` sequence. The live
    /// ledger is never touched.
    pub fn consider_transaction(
        &mut self,
        tx: SignedTransaction,
        pending: &[TxId],
    ) -> Result<(), TreeError> {
        let id = tx.id().clone();
        if self.delivered.contains(&id) {
            return Err(TreeError::AlreadyDelivered(id));
        }
        self.received.insert(tx);

        let mut scratch = self.ledger.clone();
        for pending_id in pending.iter().filter(|p| **p != id) {
            let Some(pending_tx) = self.received.get(pending_id) else {
                continue;
            };
            if let Err(e) = scratch.apply_with_fee(&pending_tx.transaction, self.params.fee) {
                tracing::trace!(tx = %pending_id, error = %e, "pending transaction no longer applies");
            }
        }
        if let Some(staged) = self.received.get(&id) {
            scratch.apply_with_fee(&staged.transaction, self.params.fee)?;
        }
        Ok(())
    }

    /// Filter a pending sequence down to what still applies, in order, on
    /// top of the head: delivered, unknown and unaffordable IDs drop out.
    pub fn admit_pending(&self, pending: &[TxId]) -> Vec<TxId> {
        let mut scratch = self.ledger.clone();
        let mut admitted: Vec<TxId> = Vec::with_capacity(pending.len());
        for id in pending {
            if admitted.contains(id) {
                continue;
            }
            let Some(tx) = self.received.get(id) else {
                continue;
            };
            if scratch
                .apply_with_fee(&tx.transaction, self.params.fee)
                .is_ok()
            {
                admitted.push(id.clone());
            }
        }
        admitted
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for leaf in &self.leaves {
            let mut path = vec![self.genesis];
            path.extend(self.path_from_to(&self.genesis, leaf).unwrap_or_default());
            let labels: Vec<String> = path
                .iter()
                .filter_map(|h| self.nodes.get(h))
                .map(|e| format!("{}:{}", e.node.slot, e.node.peer.short()))
                .collect();
            let marker = if *leaf == self.head { '*' } else { ' ' };
            writeln!(f, "{marker} {}", labels.join(" -> "))?;
        }
        Ok(())
    }
}
