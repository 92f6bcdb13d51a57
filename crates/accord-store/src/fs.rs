use std::path::Path;
use std::sync::RwLock;

use accord_types::{
    Party, Record, RecordId, RecordQuery, RecordRef, SignedTransaction, StateAndRef, TxId,
    codec::as_stored,
};
use serde::{Deserialize, Serialize};

use crate::index::{LedgerIndex, PendingCommit};
use crate::journal::FrameLog;
use crate::{HistoryEntry, LedgerError, LedgerResult, LedgerStore};

const LEDGER_DIR: &str = "ledger";
const LEDGER_FILE: &str = "commits.log";

#[derive(Serialize, Deserialize)]
struct StoredState {
    reference: RecordRef,
    #[serde(with = "as_stored")]
    record: Record,
}

/// One committed transaction as this party recorded it.
#[derive(Serialize, Deserialize)]
struct CommitFrame {
    entry: HistoryEntry,
    envelope: SignedTransaction,
    produced: Vec<StoredState>,
}

/// Ledger backed by a commit journal under `<root>/ledger/`. The index is
/// rebuilt by replaying the journal on open; a commit is journaled before it
/// becomes visible.
#[derive(Debug)]
pub struct FsLedger {
    log: FrameLog,
    index: RwLock<LedgerIndex>,
}

impl FsLedger {
    pub fn open(root: impl AsRef<Path>, owner: Party) -> LedgerResult<Self> {
        let log = FrameLog::open(root.as_ref().join(LEDGER_DIR).join(LEDGER_FILE))?;
        let mut index = LedgerIndex::new(owner);
        let frames: Vec<CommitFrame> = log.read_all()?;
        let replayed = frames.len();
        for (expected, frame) in frames.into_iter().enumerate() {
            if frame.entry.seq != expected as u64 {
                return Err(LedgerError::Corrupt(format!(
                    "commit frame {expected} carries seq {}",
                    frame.entry.seq
                )));
            }
            let pending = PendingCommit {
                entry: frame.entry,
                produced: frame
                    .produced
                    .into_iter()
                    .map(|stored| StateAndRef {
                        reference: stored.reference,
                        record: stored.record,
                    })
                    .collect(),
            };
            index.apply(pending, frame.envelope);
        }
        log::info!(
            "opened ledger for {} at {} ({replayed} commits)",
            index.owner().name,
            log.path().display()
        );
        Ok(Self {
            log,
            index: RwLock::new(index),
        })
    }
}

impl LedgerStore for FsLedger {
    fn record_commit(&self, envelope: &SignedTransaction) -> LedgerResult<HistoryEntry> {
        let mut index = self.index.write().unwrap();
        if let Some(entry) = index.recorded(&envelope.id) {
            return Ok(entry);
        }
        let pending = index.prepare(envelope)?;
        let frame = CommitFrame {
            entry: pending.entry.clone(),
            envelope: envelope.clone(),
            produced: pending
                .produced
                .iter()
                .map(|state| StoredState {
                    reference: state.reference,
                    record: state.record.clone(),
                })
                .collect(),
        };
        self.log.append(&frame)?;
        let entry = pending.entry.clone();
        index.apply(pending, frame.envelope);
        log::debug!(
            "{} journaled {} as commit {}",
            index.owner().name,
            entry.tx_id,
            entry.seq
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
