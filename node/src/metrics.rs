//! Prometheus metrics for the drawtree node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] so several nodes can run in
//! one process (as the integration tests do) without name clashes.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Transactions handed to the processor, from peers or local submission.
    pub transactions_received: IntCounter,
    /// Transactions admitted to the pending sequence.
    pub transactions_admitted: IntCounter,
    /// Transactions refused by the processor or by the speculative check.
    pub transactions_rejected: IntCounter,
    pub candidates_received: IntCounter,
    pub candidates_rejected: IntCounter,
    /// Slot winners inserted into the tree.
    pub leaves_adopted: IntCounter,
    pub reorgs: IntCounter,
    /// Candidates or nodes referencing data this replica does not have.
    pub consistency_gaps: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub peer_count: IntGauge,
    pub tree_size: IntGauge,
    pub current_slot: IntGauge,
    pub head_depth: IntGauge,
    pub pending_transactions: IntGauge,
    pub buffered_candidates: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
                .unwrap_or_else(|e| panic!("failed to register {name} counter: {e}"))
        };
        let gauge = |name: &str, help: &str| {
            register_int_gauge_with_registry!(Opts::new(name, help), registry)
                .unwrap_or_else(|e| panic!("failed to register {name} gauge: {e}"))
        };

        let transactions_received = counter(
            "drawtree_transactions_received_total",
            "Total transactions received",
        );
        let transactions_admitted = counter(
            "drawtree_transactions_admitted_total",
            "Total transactions admitted to the pending sequence",
        );
        let transactions_rejected = counter(
            "drawtree_transactions_rejected_total",
            "Total transactions rejected",
        );
        let candidates_received = counter(
            "drawtree_candidates_received_total",
            "Total candidate nodes received",
        );
        let candidates_rejected = counter(
            "drawtree_candidates_rejected_total",
            "Total candidate nodes rejected",
        );
        let leaves_adopted = counter(
            "drawtree_leaves_adopted_total",
            "Total slot winners inserted into the tree",
        );
        let reorgs = counter("drawtree_reorgs_total", "Total head reorganisations");
        let consistency_gaps = counter(
            "drawtree_consistency_gaps_total",
            "Total references to unknown transactions or parents",
        );

        let peer_count = gauge("drawtree_peer_count", "Current number of open connections");
        let tree_size = gauge("drawtree_tree_size", "Current number of nodes in the tree");
        let current_slot = gauge("drawtree_current_slot", "Current slot number");
        let head_depth = gauge("drawtree_head_depth", "Path length from genesis to head");
        let pending_transactions = gauge(
            "drawtree_pending_transactions",
            "Transactions waiting for the next proposal",
        );
        let buffered_candidates = gauge(
            "drawtree_buffered_candidates",
            "Candidates buffered for a future slot or missing data",
        );

        Self {
            registry,
            transactions_received,
            transactions_admitted,
            transactions_rejected,
            candidates_received,
            candidates_rejected,
            leaves_adopted,
            reorgs,
            consistency_gaps,
            peer_count,
            tree_size,
            current_slot,
            head_depth,
            pending_transactions,
            buffered_candidates,
        }
    }

    /// Prometheus text exposition of every metric.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
