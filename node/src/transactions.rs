//! Transaction processor: the single entry point for transfers, from peers
//! and from local submission alike.
//!
//! A transaction is checked for freshness and validity, its ID marked
//! processed, and then it is forwarded to the sequencer and flooded to
//! every peer. The freshness check and the marking happen under one lock so
//! a transaction arriving twice at once is only processed once.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use drawtree_ledger::{PastMap, SignedTransaction};
use drawtree_messages::WireMessage;

use crate::gossip::Gossip;
use crate::metrics::NodeMetrics;
use crate::NodeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxVerdict {
    Accepted,
    /// Already processed.
    Old,
    InvalidSignature,
    NonPositiveAmount,
}

/// Judge a transaction against the processed set without recording it.
pub fn check_transaction(past: &PastMap, tx: &SignedTransaction) -> TxVerdict {
    if past.is_old(tx.id()) {
        TxVerdict::Old
    } else if tx.transaction.amount == 0 {
        TxVerdict::NonPositiveAmount
    } else if !tx.verify() {
        TxVerdict::InvalidSignature
    } else {
        TxVerdict::Accepted
    }
}

#[derive(Clone)]
pub struct TransactionProcessor {
    past: Arc<Mutex<PastMap>>,
    to_sequencer: mpsc::Sender<SignedTransaction>,
    gossip: Gossip,
    metrics: Arc<NodeMetrics>,
}

impl TransactionProcessor {
    pub fn new(
        past: Arc<Mutex<PastMap>>,
        to_sequencer: mpsc::Sender<SignedTransaction>,
        gossip: Gossip,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            past,
            to_sequencer,
            gossip,
            metrics,
        }
    }

    pub async fn process(&self, tx: SignedTransaction) -> Result<TxVerdict, NodeError> {
        self.metrics.transactions_received.inc();
        let verdict = {
            let mut past = self.past.lock().await;
            let verdict = check_transaction(&past, &tx);
            if verdict == TxVerdict::Accepted {
                past.mark_processed(tx.id().clone());
            }
            verdict
        };

        if verdict != TxVerdict::Accepted {
            if verdict != TxVerdict::Old {
                self.metrics.transactions_rejected.inc();
            }
            tracing::debug!(tx = %tx.id(), ?verdict, "transaction dropped");
            return Ok(verdict);
        }

        self.to_sequencer
            .send(tx.clone())
            .await
            .map_err(|_| NodeError::ChannelClosed("sequencer transactions"))?;
        self.gossip.broadcast(&WireMessage::Transaction(tx)).await;
        Ok(TxVerdict::Accepted)
    }
}

/// Run `processor` over `rx` until shutdown.
pub fn spawn_transaction_processor(
    processor: TransactionProcessor,
    mut rx: mpsc::Receiver<SignedTransaction>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("transaction processor shutting down");
                    break;
                }
                Some(tx) = rx.recv() => {
                    if let Err(e) = processor.process(tx).await {
                        tracing::warn!(error = %e, "transaction processor stopping");
                        break;
                    }
                }
                else => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawtree_crypto::keypair_from_seed;
    use drawtree_ledger::Transaction;
    use drawtree_network::Broadcaster;
    use drawtree_types::TxId;
    use tokio::sync::RwLock;

    use crate::connection_registry::ConnectionRegistry;

    fn transfer(index: u64, amount: u64) -> SignedTransaction {
        let from = keypair_from_seed(&[1; 32]);
        let to = keypair_from_seed(&[2; 32]);
        SignedTransaction::sign(
            Transaction {
                id: TxId::new(index, "10.0.0.1:4000"),
                from: from.account(),
                to: to.account(),
                amount,
            },
            &from.private,
        )
    }

    fn processor() -> (TransactionProcessor, mpsc::Receiver<SignedTransaction>) {
        let (seq_tx, seq_rx) = mpsc::channel(16);
        let (out_tx, _out_rx) = mpsc::channel(16);
        let gossip = Gossip::new(
            Broadcaster::new(out_tx),
            Arc::new(RwLock::new(ConnectionRegistry::new())),
        );
        let processor = TransactionProcessor::new(
            Arc::new(Mutex::new(PastMap::new())),
            seq_tx,
            gossip,
            Arc::new(NodeMetrics::new()),
        );
        (processor, seq_rx)
    }

    #[test]
    fn check_rejects_zero_amount_and_forgery() {
        let past = PastMap::new();
        assert_eq!(check_transaction(&past, &transfer(0, 5)), TxVerdict::Accepted);
        assert_eq!(
            check_transaction(&past, &transfer(0, 0)),
            TxVerdict::NonPositiveAmount
        );

        let mut forged = transfer(0, 5);
        forged.transaction.amount = 500;
        assert_eq!(
            check_transaction(&past, &forged),
            TxVerdict::InvalidSignature
        );
    }

    #[tokio::test]
    async fn accepted_transaction_reaches_sequencer_once() {
        let (processor, mut seq_rx) = processor();
        let tx = transfer(0, 5);

        assert_eq!(processor.process(tx.clone()).await.unwrap(), TxVerdict::Accepted);
        assert_eq!(processor.process(tx.clone()).await.unwrap(), TxVerdict::Old);

        assert_eq!(seq_rx.recv().await.unwrap(), tx);
        assert!(seq_rx.try_recv().is_err());
        assert_eq!(processor.metrics.transactions_received.get(), 2);
    }

    #[tokio::test]
    async fn locally_issued_id_passes_once() {
        let (processor, mut seq_rx) = processor();
        let id = processor.past.lock().await.next_id("10.0.0.1:4000");
        assert_eq!(id, TxId::new(0, "10.0.0.1:4000"));

        let tx = transfer(0, 5);
        assert_eq!(processor.process(tx).await.unwrap(), TxVerdict::Accepted);
        assert!(seq_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn invalid_transaction_counted_as_rejected() {
        let (processor, mut seq_rx) = processor();
        assert_eq!(
            processor.process(transfer(1, 0)).await.unwrap(),
            TxVerdict::NonPositiveAmount
        );
        assert_eq!(processor.metrics.transactions_rejected.get(), 1);
        assert!(seq_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_sequencer_channel_is_an_error() {
        let (processor, seq_rx) = processor();
        drop(seq_rx);
        assert!(matches!(
            processor.process(transfer(2, 5)).await,
            Err(NodeError::ChannelClosed(_))
        ));
    }
}
