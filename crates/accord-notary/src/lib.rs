//! The ordering authority: verifies a fully signed envelope, atomically checks
//! and records its inputs as consumed, and stamps it final.

mod consumed;
mod service;

pub use consumed::{ConsumedSet, JournalConsumed, MemConsumed};
pub use service::{NotaryHandle, NotaryRequest, NotaryService};

use std::sync::Mutex;

use accord_store::LedgerError;
use accord_types::{
    Identity, Party, RecordRef, SignatureError, SignedTransaction, TransactionSignature, TxId,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("inputs already consumed by another transaction: {}", display_refs(.0))]
    Conflict(Vec<RecordRef>),
    #[error("invalid signatures on {tx_id}: {source}")]
    InvalidSignatures {
        tx_id: TxId,
        #[source]
        source: SignatureError,
    },
    #[error("transaction names notary {named}, not {actual}")]
    WrongNotary { named: Party, actual: Party },
    #[error("consumed-set storage: {0}")]
    Storage(#[from] LedgerError),
    #[error("notary service unavailable")]
    Unavailable,
}

fn display_refs(refs: &[RecordRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct Notary {
    identity: Identity,
    consumed: Mutex<Box<dyn ConsumedSet>>,
}

impl std::fmt::Debug for Notary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notary")
            .field("party", self.identity.party())
            .field("consumed", &self.consumed.lock().unwrap().len())
            .finish()
    }
}

impl Notary {
    pub fn new(identity: Identity, consumed: Box<dyn ConsumedSet>) -> Self {
        Self {
            identity,
            consumed: Mutex::new(consumed),
        }
    }

    pub fn in_memory(identity: Identity) -> Self {
        Self::new(identity, Box::new(MemConsumed::new()))
    }

    pub fn party(&self) -> &Party {
        self.identity.party()
    }

    /// Check-and-commit. On success every input ref is recorded as consumed
    /// by this transaction and the returned envelope carries the notary
    /// stamp; on failure nothing is recorded. Notarising the same
    /// transaction again succeeds with a fresh stamp.
    pub fn notarise(&self, envelope: &SignedTransaction) -> Result<SignedTransaction, NotaryError> {
        if envelope.tx.notary != *self.identity.party() {
            return Err(NotaryError::WrongNotary {
                named: envelope.tx.notary.clone(),
                actual: self.identity.party().clone(),
            });
        }
        envelope
            .verify_required_signatures()
            .map_err(|source| NotaryError::InvalidSignatures {
                tx_id: envelope.id,
                source,
            })?;

        let refs = envelope.tx.input_refs();
        {
            let mut consumed = self.consumed.lock().unwrap();
            let conflicts = consumed.conflicts(&refs, &envelope.id);
            if !conflicts.is_empty() {
                tracing::warn!(
                    tx_id = %envelope.id,
                    conflicts = conflicts.len(),
                    "rejecting double spend"
                );
                return Err(NotaryError::Conflict(conflicts));
            }
            consumed.insert_all(&refs, envelope.id)?;
        }

        let mut notarised = envelope.clone();
        notarised.notary_signature = Some(TransactionSignature::notarise(&self.identity, &envelope.id));
        tracing::info!(tx_id = %envelope.id, inputs = refs.len(), "notarised");
        Ok(notarised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_types::{
        Command, EnvelopeStatus, FundAction, FundState, Proposal, Record, RecordId, StateAndRef,
    };
    use std::collections::BTreeSet;
    use uuid::Uuid;

    struct Parties {
        alice: Identity,
        bob: Identity,
        notary: Identity,
    }

    fn parties() -> Parties {
        Parties {
            alice: Identity::from_seed("Alice", [1; 32]),
            bob: Identity::from_seed("Bob", [2; 32]),
            notary: Identity::from_seed("Notary", [9; 32]),
        }
    }

    fn spend(p: &Parties, input: RecordRef) -> SignedTransaction {
        let fund = Record::fund(
            RecordId::new(),
            FundState {
                value: 10,
                manager: p.alice.party().clone(),
                investors: vec![p.bob.party().clone()],
            },
        );
        let proposal = Proposal {
            inputs: vec![StateAndRef {
                reference: input,
                record: fund.clone(),
            }],
            outputs: vec![],
            command: Command::Fund(FundAction::Cancel),
            required_signers: BTreeSet::from([p.alice.public_key(), p.bob.public_key()]),
            notary: p.notary.party().clone(),
            salt: Uuid::new_v4(),
        };
        let mut envelope = SignedTransaction::new(proposal).unwrap();
        envelope.sign_with(&p.alice);
        envelope.sign_with(&p.bob);
        envelope
    }

    #[test]
    fn second_spend_of_a_ref_conflicts() {
        let p = parties();
        let notary = Notary::in_memory(p.notary.clone());
        let input = RecordRef::new(TxId::of_bytes(b"issue"), 0);

        let first = notary.notarise(&spend(&p, input)).unwrap();
        assert_eq!(first.status(), EnvelopeStatus::Notarised);
        first.verify_notarised().unwrap();

        match notary.notarise(&spend(&p, input)) {
            Err(NotaryError::Conflict(refs)) => assert_eq!(refs, vec![input]),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn renotarising_is_idempotent() {
        let p = parties();
        let notary = Notary::in_memory(p.notary.clone());
        let envelope = spend(&p, RecordRef::new(TxId::of_bytes(b"issue"), 0));
        notary.notarise(&envelope).unwrap();
        notary.notarise(&envelope).unwrap();
    }

    #[test]
    fn missing_signature_is_refused_without_consuming() {
        let p = parties();
        let notary = Notary::in_memory(p.notary.clone());
        let input = RecordRef::new(TxId::of_bytes(b"issue"), 0);
        let mut partial = spend(&p, input);
        partial.signatures.remove(&p.bob.public_key());

        let err = notary.notarise(&partial).unwrap_err();
        assert!(matches!(err, NotaryError::InvalidSignatures { .. }));
        notary.notarise(&spend(&p, input)).unwrap();
    }

    #[test]
    fn envelope_for_another_notary_is_refused() {
        let p = parties();
        let notary = Notary::in_memory(Identity::from_seed("Elsewhere", [7; 32]));
        let err = notary
            .notarise(&spend(&p, RecordRef::new(TxId::of_bytes(b"issue"), 0)))
            .unwrap_err();
        assert!(matches!(err, NotaryError::WrongNotary { .. }));
    }
}
