use std::collections::BTreeMap;

use accord_types::{
    Party, RecordId, RecordQuery, RecordRef, SignedTransaction, StateAndRef, TxId,
};
use indexmap::IndexMap;

use crate::{HistoryEntry, LedgerError, LedgerResult};

/// What a commit will change, computed before anything is written.
pub(crate) struct PendingCommit {
    pub entry: HistoryEntry,
    pub produced: Vec<StateAndRef>,
}

/// In-memory view of one party's ledger. Both backends keep one of these and
/// only differ in whether a commit is journaled before it is applied.
#[derive(Debug)]
pub(crate) struct LedgerIndex {
    owner: Party,
    states: BTreeMap<RecordRef, StateAndRef>,
    consumed: BTreeMap<RecordRef, TxId>,
    current: IndexMap<RecordId, RecordRef>,
    transactions: BTreeMap<TxId, SignedTransaction>,
    history: Vec<HistoryEntry>,
}

impl LedgerIndex {
    pub fn new(owner: Party) -> Self {
        Self {
            owner,
            states: BTreeMap::new(),
            consumed: BTreeMap::new(),
            current: IndexMap::new(),
            transactions: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    pub fn owner(&self) -> &Party {
        &self.owner
    }

    /// History entry of an already recorded transaction.
    pub fn recorded(&self, tx_id: &TxId) -> Option<HistoryEntry> {
        if !self.transactions.contains_key(tx_id) {
            return None;
        }
        self.history.iter().find(|entry| entry.tx_id == *tx_id).cloned()
    }

    pub fn prepare(&self, envelope: &SignedTransaction) -> LedgerResult<PendingCommit> {
        envelope
            .verify_notarised()
            .map_err(|source| LedgerError::NotFinal {
                tx_id: envelope.id,
                source,
            })?;

        let consumed = envelope.tx.input_refs();
        for reference in &consumed {
            if let Some(by) = self.consumed.get(reference) {
                return Err(LedgerError::AlreadyConsumed {
                    reference: *reference,
                    by: *by,
                });
            }
        }

        let produced: Vec<StateAndRef> = envelope
            .output_states()
            .into_iter()
            .filter(|state| state.record.is_participant(&self.owner))
            .collect();

        Ok(PendingCommit {
            entry: HistoryEntry {
                seq: self.history.len() as u64,
                tx_id: envelope.id,
                command: envelope.tx.command,
                consumed,
                produced: produced.iter().map(|state| state.reference).collect(),
            },
            produced,
        })
    }

    pub fn apply(&mut self, pending: PendingCommit, envelope: SignedTransaction) {
        let PendingCommit { entry, produced } = pending;
        for reference in &entry.consumed {
            self.consumed.insert(*reference, entry.tx_id);
            if let Some(state) = self.states.get(reference) {
                let id = state.record.id;
                if self.current.get(&id) == Some(reference) {
                    self.current.shift_remove(&id);
                }
            }
        }
        for state in produced {
            self.current.insert(state.record.id, state.reference);
            self.states.insert(state.reference, state);
        }
        self.transactions.insert(entry.tx_id, envelope);
        self.history.push(entry);
    }

    pub fn current(&self, id: RecordId) -> Option<StateAndRef> {
        self.current
            .get(&id)
            .and_then(|reference| self.states.get(reference))
            .cloned()
    }

    pub fn state(&self, reference: &RecordRef) -> Option<StateAndRef> {
        self.states.get(reference).cloned()
    }

    pub fn is_consumed(&self, reference: &RecordRef) -> bool {
        self.consumed.contains_key(reference)
    }

    pub fn unconsumed(&self, query: &RecordQuery) -> Vec<StateAndRef> {
        self.current
            .values()
            .filter_map(|reference| self.states.get(reference))
            .filter(|state| query.matches(&state.record))
            .cloned()
            .collect()
    }

    pub fn transaction(&self, tx_id: &TxId) -> Option<SignedTransaction> {
        self.transactions.get(tx_id).cloned()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.clone()
    }
}
