use std::sync::{Arc, RwLock};

use accord_types::{
    Party, RecordId, RecordQuery, RecordRef, SignedTransaction, StateAndRef, TxId,
};

use crate::index::LedgerIndex;
use crate::{HistoryEntry, LedgerResult, LedgerStore};

/// Volatile ledger, used by tests and the in-process test network.
#[derive(Clone)]
pub struct MemLedger {
    index: Arc<RwLock<LedgerIndex>>,
}

impl std::fmt::Debug for MemLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.read().unwrap();
        f.debug_struct("MemLedger")
            .field("owner", &index.owner().name)
            .field("history", &index.history().len())
            .finish()
    }
}

impl MemLedger {
    pub fn new(owner: Party) -> Self {
        Self {
            index: Arc::new(RwLock::new(LedgerIndex::new(owner))),
        }
    }
}

impl LedgerStore for MemLedger {
    fn record_commit(&self, envelope: &SignedTransaction) -> LedgerResult<HistoryEntry> {
        let mut index = self.index.write().unwrap();
        if let Some(entry) = index.recorded(&envelope.id) {
            return Ok(entry);
        }
        let pending = index.prepare(envelope)?;
        let entry = pending.entry.clone();
        index.apply(pending, envelope.clone());
        log::debug!(
            "{} recorded {}: {} consumed, {} produced",
            index.owner().name,
            entry.tx_id,
            entry.consumed.len(),
            entry.produced.len()
        );
        Ok(entry)
    }

    fn current(&self, id: RecordId) -> LedgerResult<Option<StateAndRef>> {
        Ok(self.index.read().unwrap().current(id))
    }

    fn state(&self, reference: &RecordRef) -> LedgerResult<Option<StateAndRef>> {
        Ok(self.index.read().unwrap().state(reference))
    }

    fn is_consumed(&self, reference: &RecordRef) -> LedgerResult<bool> {
        Ok(self.index.read().unwrap().is_consumed(reference))
    }

    fn unconsumed(&self, query: &RecordQuery) -> LedgerResult<Vec<StateAndRef>> {
        Ok(self.index.read().unwrap().unconsumed(query))
    }

    fn transaction(&self, tx_id: &TxId) -> LedgerResult<Option<SignedTransaction>> {
        Ok(self.index.read().unwrap().transaction(tx_id))
    }

    fn history(&self) -> LedgerResult<Vec<HistoryEntry>> {
        Ok(self.index.read().unwrap().history())
    }
}
