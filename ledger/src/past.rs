//! Record of every transaction ID this peer has seen or issued.

use std::collections::HashMap;

use drawtree_types::TxId;

/// Tracks transaction IDs for freshness checks and local ID assignment.
///
/// An ID is *issued* when this peer assigns it to a local transaction and
/// *processed* once the transaction went through validation. Only processed
/// IDs count as old, so a locally issued transaction still passes the
/// freshness check the first time it is processed.
#[derive(Debug, Default)]
pub struct PastMap {
    processed: HashMap<TxId, bool>,
}

impl PastMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_old(&self, id: &TxId) -> bool {
        self.processed.get(id).copied().unwrap_or(false)
    }

    /// Mark an ID processed. Returns `false` if it already was.
    pub fn mark_processed(&mut self, id: TxId) -> bool {
        let previous = self.processed.insert(id, true);
        previous != Some(true)
    }

    /// Assign the next local ID, `"<count>-<address>"`.
    ///
    /// The count is the number of IDs recorded so far, which only grows, so
    /// indices never repeat for one address.
    pub fn next_id(&mut self, local_address: &str) -> TxId {
        let id = TxId::new(self.processed.len() as u64, local_address);
        self.processed.insert(id.clone(), false);
        id
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}
