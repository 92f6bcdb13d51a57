//! Per-party ledger: the current unconsumed version of every record this party
//! takes part in, the committed envelopes that produced them, and an
//! append-only history. In-memory and journal-backed backends share one index.

mod fs;
mod index;
pub mod journal;
mod mem;

pub use fs::FsLedger;
pub use journal::FrameLog;
pub use mem::MemLedger;

use std::{io, path::PathBuf, sync::Arc};

use accord_types::{
    Command, RecordId, RecordQuery, RecordRef, SignatureError, SignedTransaction, StateAndRef,
    TxId,
};
use serde::{Deserialize, Serialize};

pub type LedgerResult<T> = Result<T, LedgerError>;
pub type DynLedger = Arc<dyn LedgerStore>;

/// Storage contract used by the agreement protocol and the query surface.
pub trait LedgerStore: Send + Sync {
    /// Record a notarised envelope: consume the inputs this party holds and
    /// insert the outputs it participates in, all at once. Recording the same
    /// transaction twice returns the original history entry.
    fn record_commit(&self, envelope: &SignedTransaction) -> LedgerResult<HistoryEntry>;

    /// Current unconsumed version of `id`, if this party holds one.
    fn current(&self, id: RecordId) -> LedgerResult<Option<StateAndRef>>;

    /// Any version this party has held, consumed or not.
    fn state(&self, reference: &RecordRef) -> LedgerResult<Option<StateAndRef>>;

    fn is_consumed(&self, reference: &RecordRef) -> LedgerResult<bool>;

    /// Unconsumed records matching `query`, in commit order.
    fn unconsumed(&self, query: &RecordQuery) -> LedgerResult<Vec<StateAndRef>>;

    fn transaction(&self, tx_id: &TxId) -> LedgerResult<Option<SignedTransaction>>;

    fn history(&self) -> LedgerResult<Vec<HistoryEntry>>;
}

/// One line of the audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub seq: u64,
    pub tx_id: TxId,
    pub command: Command,
    pub consumed: Vec<RecordRef>,
    pub produced: Vec<RecordRef>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("journal corrupt: {0}")]
    Corrupt(String),
    #[error("transaction {tx_id} is not final: {source}")]
    NotFinal {
        tx_id: TxId,
        #[source]
        source: SignatureError,
    },
    #[error("input {reference} was already consumed by {by}")]
    AlreadyConsumed { reference: RecordRef, by: TxId },
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.into(),
        source: err,
    }
}
