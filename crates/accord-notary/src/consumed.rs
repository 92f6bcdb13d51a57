//! Durable set of record refs the notary has seen consumed, keyed to the
//! transaction that consumed them.

use std::collections::BTreeMap;
use std::path::Path;

use accord_store::FrameLog;
use accord_types::{RecordRef, TxId};
use serde::{Deserialize, Serialize};

use crate::NotaryError;

const CONSUMED_DIR: &str = "notary";
const CONSUMED_FILE: &str = "consumed.log";

pub trait ConsumedSet: Send {
    /// Refs in `refs` already consumed by a transaction other than `tx_id`.
    fn conflicts(&self, refs: &[RecordRef], tx_id: &TxId) -> Vec<RecordRef>;

    fn insert_all(&mut self, refs: &[RecordRef], tx_id: TxId) -> Result<(), NotaryError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn conflicts_in(map: &BTreeMap<RecordRef, TxId>, refs: &[RecordRef], tx_id: &TxId) -> Vec<RecordRef> {
    refs.iter()
        .filter(|r| map.get(r).is_some_and(|by| by != tx_id))
        .copied()
        .collect()
}

#[derive(Debug, Default)]
pub struct MemConsumed {
    consumed: BTreeMap<RecordRef, TxId>,
}

impl MemConsumed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsumedSet for MemConsumed {
    fn conflicts(&self, refs: &[RecordRef], tx_id: &TxId) -> Vec<RecordRef> {
        conflicts_in(&self.consumed, refs, tx_id)
    }

    fn insert_all(&mut self, refs: &[RecordRef], tx_id: TxId) -> Result<(), NotaryError> {
        for reference in refs {
            self.consumed.insert(*reference, tx_id);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.consumed.len()
    }
}

#[derive(Serialize, Deserialize)]
struct ConsumedFrame {
    tx_id: TxId,
    refs: Vec<RecordRef>,
}

/// Consumed set persisted as a journal of one frame per notarised transaction.
#[derive(Debug)]
pub struct JournalConsumed {
    log: FrameLog,
    consumed: BTreeMap<RecordRef, TxId>,
}

impl JournalConsumed {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, NotaryError> {
        let log = FrameLog::open(root.as_ref().join(CONSUMED_DIR).join(CONSUMED_FILE))?;
        let mut consumed = BTreeMap::new();
        for frame in log.read_all::<ConsumedFrame>()? {
            for reference in frame.refs {
                consumed.insert(reference, frame.tx_id);
            }
        }
        tracing::info!(
            path = %log.path().display(),
            refs = consumed.len(),
            "replayed notary consumed set"
        );
        Ok(Self { log, consumed })
    }
}

impl ConsumedSet for JournalConsumed {
    fn conflicts(&self, refs: &[RecordRef], tx_id: &TxId) -> Vec<RecordRef> {
        conflicts_in(&self.consumed, refs, tx_id)
    }

    fn insert_all(&mut self, refs: &[RecordRef], tx_id: TxId) -> Result<(), NotaryError> {
        let fresh: Vec<RecordRef> = refs
            .iter()
            .filter(|r| !self.consumed.contains_key(r))
            .copied()
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }
        self.log.append(&ConsumedFrame {
            tx_id,
            refs: fresh.clone(),
        })?;
        for reference in fresh {
            self.consumed.insert(reference, tx_id);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.consumed.len()
    }
}
