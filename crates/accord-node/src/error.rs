use accord_contracts::RuleViolation;
use accord_store::LedgerError;
use accord_types::{PartyName, RecordId, RecordRef, SignatureError};
use thiserror::Error;

/// Why a message could not be carried to a peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no route to {0}")]
    UnknownPeer(PartyName),
    #[error("{0} hung up")]
    Disconnected(PartyName),
    #[error("{party} refused delivery: {reason}")]
    Refused { party: PartyName, reason: String },
}

/// Everything that can end an operation or an agreement flow short of commit.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("contract verification failed: {0}")]
    ContractVerification(#[from] RuleViolation),
    #[error("unknown party '{0}'")]
    UnresolvedParty(String),
    #[error("no unconsumed record with id {0}")]
    NoSuchRecord(RecordId),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{party} rejected the transaction: {reason}")]
    SignatureRejected { party: PartyName, reason: String },
    #[error("notarisation conflict on {}", join_refs(.0))]
    NotarizationConflict(Vec<RecordRef>),
    #[error("notary rejected the transaction: {0}")]
    NotaryRejected(String),
    #[error("timed out waiting for {party} during {stage}")]
    ProtocolTimeout { stage: &'static str, party: PartyName },
    #[error("flow aborted: {0}")]
    Aborted(String),
    #[error("envelope error: {0}")]
    Envelope(#[from] SignatureError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

fn join_refs(refs: &[RecordRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
