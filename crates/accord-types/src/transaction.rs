use std::collections::{BTreeMap, BTreeSet};

use accord_cbor::Digest;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::command::Command;
use crate::identity::{Identity, Party, PublicKey, Signature};
use crate::record::{Record, RecordRef, StateAndRef};

/// Transaction id: digest of the proposal's canonical encoding.
pub type TxId = Digest;

const PARTY_SIGNATURE_TAG: &[u8] = b"ACCORD:TX:";
const NOTARY_SIGNATURE_TAG: &[u8] = b"ACCORD:NOTARY:";

/// A request to consume some record versions and produce new ones under one
/// command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub inputs: Vec<StateAndRef>,
    pub outputs: Vec<Record>,
    pub command: Command,
    pub required_signers: BTreeSet<PublicKey>,
    pub notary: Party,
    /// Random salt so two otherwise identical proposals get distinct ids.
    pub salt: Uuid,
}

impl Proposal {
    pub fn id(&self) -> Result<TxId, serde_cbor::Error> {
        Digest::of_cbor(self)
    }

    pub fn input_refs(&self) -> Vec<RecordRef> {
        self.inputs.iter().map(|input| input.reference).collect()
    }

    /// Union of input and output participants, first-seen order.
    pub fn participants(&self) -> Vec<Party> {
        let mut seen = IndexSet::new();
        for record in self
            .inputs
            .iter()
            .map(|input| &input.record)
            .chain(self.outputs.iter())
        {
            seen.extend(record.participants());
        }
        seen.into_iter().collect()
    }

    pub fn output_participants(&self) -> Vec<Party> {
        let mut seen = IndexSet::new();
        for record in &self.outputs {
            seen.extend(record.participants());
        }
        seen.into_iter().collect()
    }
}

/// A signature by one key over a transaction id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PublicKey,
    pub signature: Signature,
}

impl TransactionSignature {
    pub fn sign(identity: &Identity, tx_id: &TxId) -> Self {
        Self {
            by: identity.public_key(),
            signature: identity.sign(&preimage(PARTY_SIGNATURE_TAG, tx_id)),
        }
    }

    /// Notary finality stamp; uses its own preimage so a party signature can
    /// never be replayed as a notarisation.
    pub fn notarise(notary: &Identity, tx_id: &TxId) -> Self {
        Self {
            by: notary.public_key(),
            signature: notary.sign(&preimage(NOTARY_SIGNATURE_TAG, tx_id)),
        }
    }

    pub fn verify(&self, tx_id: &TxId) -> bool {
        self.by
            .verify(&preimage(PARTY_SIGNATURE_TAG, tx_id), &self.signature)
    }

    pub fn verify_notarisation(&self, tx_id: &TxId) -> bool {
        self.by
            .verify(&preimage(NOTARY_SIGNATURE_TAG, tx_id), &self.signature)
    }
}

fn preimage(tag: &[u8], tx_id: &TxId) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(tag.len() + 32);
    bytes.extend_from_slice(tag);
    bytes.extend_from_slice(tx_id.as_bytes());
    bytes
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Unsigned,
    PartiallySigned,
    FullySigned,
    Notarised,
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("proposal encoding error: {0}")]
    Encoding(#[from] serde_cbor::Error),
    #[error("envelope claims id {claimed} but the proposal hashes to {actual}")]
    IdMismatch { claimed: TxId, actual: TxId },
    #[error("signature by {0} does not verify")]
    Invalid(PublicKey),
    #[error("missing signatures from {}", fmt_keys(.0))]
    Missing(Vec<PublicKey>),
    #[error("notary stamp missing")]
    NotNotarised,
    #[error("notary stamp by {found} does not verify for notary {expected}")]
    BadNotaryStamp { expected: PublicKey, found: PublicKey },
}

fn fmt_keys(keys: &[PublicKey]) -> String {
    keys.iter()
        .map(|k| k.to_hex()[..16].to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The proposal plus the signatures gathered for it so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub id: TxId,
    pub tx: Proposal,
    #[serde(default)]
    pub signatures: BTreeMap<PublicKey, Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notary_signature: Option<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: Proposal) -> Result<Self, SignatureError> {
        let id = tx.id()?;
        Ok(Self {
            id,
            tx,
            signatures: BTreeMap::new(),
            notary_signature: None,
        })
    }

    pub fn sign_with(&mut self, identity: &Identity) -> TransactionSignature {
        let sig = TransactionSignature::sign(identity, &self.id);
        self.signatures.insert(sig.by, sig.signature);
        sig
    }

    /// Add a signature received from someone else, rejecting it if it does not
    /// verify against this envelope's id.
    pub fn add_signature(&mut self, sig: TransactionSignature) -> Result<(), SignatureError> {
        if !sig.verify(&self.id) {
            return Err(SignatureError::Invalid(sig.by));
        }
        self.signatures.insert(sig.by, sig.signature);
        Ok(())
    }

    pub fn status(&self) -> EnvelopeStatus {
        if self.notary_signature.is_some() {
            EnvelopeStatus::Notarised
        } else if self.signatures.is_empty() {
            EnvelopeStatus::Unsigned
        } else if self.missing_signers().is_empty() {
            EnvelopeStatus::FullySigned
        } else {
            EnvelopeStatus::PartiallySigned
        }
    }

    pub fn missing_signers(&self) -> Vec<PublicKey> {
        self.tx
            .required_signers
            .iter()
            .filter(|key| !self.signatures.contains_key(key))
            .copied()
            .collect()
    }

    /// Recompute the id from the embedded proposal.
    pub fn verify_id(&self) -> Result<(), SignatureError> {
        let actual = self.tx.id()?;
        if actual != self.id {
            return Err(SignatureError::IdMismatch {
                claimed: self.id,
                actual,
            });
        }
        Ok(())
    }

    /// Check the id and every signature present, without requiring completeness.
    pub fn verify_signatures(&self) -> Result<(), SignatureError> {
        self.verify_id()?;
        for (by, signature) in &self.signatures {
            let sig = TransactionSignature {
                by: *by,
                signature: *signature,
            };
            if !sig.verify(&self.id) {
                return Err(SignatureError::Invalid(*by));
            }
        }
        Ok(())
    }

    /// Check the id, every signature present, and that no required signer is
    /// missing.
    pub fn verify_required_signatures(&self) -> Result<(), SignatureError> {
        self.verify_signatures()?;
        let missing = self.missing_signers();
        if !missing.is_empty() {
            return Err(SignatureError::Missing(missing));
        }
        Ok(())
    }

    /// Full finality check performed by every party before recording.
    pub fn verify_notarised(&self) -> Result<(), SignatureError> {
        self.verify_required_signatures()?;
        let stamp = self.notary_signature.ok_or(SignatureError::NotNotarised)?;
        if stamp.by != self.tx.notary.key || !stamp.verify_notarisation(&self.id) {
            return Err(SignatureError::BadNotaryStamp {
                expected: self.tx.notary.key,
                found: stamp.by,
            });
        }
        Ok(())
    }

    /// Outputs paired with the refs they will have once committed.
    pub fn output_states(&self) -> Vec<StateAndRef> {
        self.tx
            .outputs
            .iter()
            .enumerate()
            .map(|(index, record)| StateAndRef {
                reference: RecordRef::new(self.id, index as u32),
                record: record.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FundAction;
    use crate::record::{FundState, RecordId};

    fn identity(name: &str, seed: u8) -> Identity {
        Identity::from_seed(name, [seed; 32])
    }

    fn issue_proposal(manager: &Identity, investor: &Identity, notary: &Identity) -> Proposal {
        let fund = Record::fund(
            RecordId::new(),
            FundState {
                value: 1000,
                manager: manager.party().clone(),
                investors: vec![investor.party().clone()],
            },
        );
        Proposal {
            inputs: vec![],
            required_signers: fund.participants().iter().map(|p| p.key).collect(),
            outputs: vec![fund],
            command: Command::Fund(FundAction::Issue),
            notary: notary.party().clone(),
            salt: Uuid::new_v4(),
        }
    }

    #[test]
    fn status_follows_signature_collection() {
        let alice = identity("Alice", 1);
        let bob = identity("Bob", 2);
        let notary = identity("Notary", 9);
        let mut envelope = SignedTransaction::new(issue_proposal(&alice, &bob, &notary)).unwrap();
        assert_eq!(envelope.status(), EnvelopeStatus::Unsigned);

        envelope.sign_with(&alice);
        assert_eq!(envelope.status(), EnvelopeStatus::PartiallySigned);
        assert_eq!(envelope.missing_signers(), vec![bob.public_key()]);
        assert!(matches!(
            envelope.verify_required_signatures(),
            Err(SignatureError::Missing(_))
        ));

        let bob_sig = TransactionSignature::sign(&bob, &envelope.id);
        envelope.add_signature(bob_sig).unwrap();
        assert_eq!(envelope.status(), EnvelopeStatus::FullySigned);
        envelope.verify_required_signatures().unwrap();

        envelope.notary_signature = Some(TransactionSignature::notarise(&notary, &envelope.id));
        assert_eq!(envelope.status(), EnvelopeStatus::Notarised);
        envelope.verify_notarised().unwrap();
    }

    #[test]
    fn tampered_proposal_fails_id_check() {
        let alice = identity("Alice", 1);
        let bob = identity("Bob", 2);
        let notary = identity("Notary", 9);
        let mut envelope = SignedTransaction::new(issue_proposal(&alice, &bob, &notary)).unwrap();
        envelope.sign_with(&alice);
        if let Some(fund) = envelope.tx.outputs.get_mut(0) {
            fund.state = crate::record::RecordState::Fund(FundState {
                value: 9_999_999,
                manager: alice.party().clone(),
                investors: vec![bob.party().clone()],
            });
        }
        assert!(matches!(
            envelope.verify_signatures(),
            Err(SignatureError::IdMismatch { .. })
        ));
    }

    #[test]
    fn signature_for_another_tx_is_refused() {
        let alice = identity("Alice", 1);
        let bob = identity("Bob", 2);
        let notary = identity("Notary", 9);
        let mut first = SignedTransaction::new(issue_proposal(&alice, &bob, &notary)).unwrap();
        let second = SignedTransaction::new(issue_proposal(&alice, &bob, &notary)).unwrap();
        assert_ne!(first.id, second.id);
        let foreign = TransactionSignature::sign(&bob, &second.id);
        assert!(matches!(
            first.add_signature(foreign),
            Err(SignatureError::Invalid(_))
        ));
    }

    #[test]
    fn party_signature_is_not_a_notary_stamp() {
        let alice = identity("Alice", 1);
        let bob = identity("Bob", 2);
        let notary = identity("Notary", 9);
        let mut envelope = SignedTransaction::new(issue_proposal(&alice, &bob, &notary)).unwrap();
        envelope.sign_with(&alice);
        envelope.sign_with(&bob);
        envelope.notary_signature = Some(TransactionSignature::sign(&notary, &envelope.id));
        assert!(matches!(
            envelope.verify_notarised(),
            Err(SignatureError::BadNotaryStamp { .. })
        ));
    }
}
