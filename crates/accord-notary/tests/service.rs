use std::collections::BTreeSet;

use accord_notary::{JournalConsumed, Notary, NotaryError, NotaryService};
use accord_types::{
    Command, Identity, PropertyAction, PropertyState, Proposal, Record, RecordId, RecordRef,
    SignedTransaction, StateAndRef, TxId,
};
use tempfile::TempDir;
use uuid::Uuid;

fn deregister(owner: &Identity, notary: &Identity, input: RecordRef) -> SignedTransaction {
    let property = Record::property(
        RecordId::new(),
        PropertyState {
            address: "Santa Carla".into(),
            owner: owner.party().clone(),
        },
    );
    let proposal = Proposal {
        inputs: vec![StateAndRef {
            reference: input,
            record: property,
        }],
        outputs: vec![],
        command: Command::Property(PropertyAction::Deregister),
        required_signers: BTreeSet::from([owner.public_key()]),
        notary: notary.party().clone(),
        salt: Uuid::new_v4(),
    };
    let mut envelope = SignedTransaction::new(proposal).unwrap();
    envelope.sign_with(owner);
    envelope
}

#[tokio::test]
async fn concurrent_spends_of_one_ref_commit_exactly_once() {
    let owner = Identity::from_seed("Owner", [3; 32]);
    let notary_id = Identity::from_seed("Notary", [9; 32]);
    let (handle, _task) = NotaryService::spawn(Notary::in_memory(notary_id.clone()), 8);
    let input = RecordRef::new(TxId::of_bytes(b"register"), 0);

    let attempts: Vec<_> = (0..6)
        .map(|_| {
            let handle = handle.clone();
            let envelope = deregister(&owner, &notary_id, input);
            tokio::spawn(async move { handle.notarise(envelope).await })
        })
        .collect();

    let mut committed = 0;
    let mut conflicts = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(envelope) => {
                envelope.verify_notarised().unwrap();
                committed += 1;
            }
            Err(NotaryError::Conflict(refs)) => {
                assert_eq!(refs, vec![input]);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected notary error: {other}"),
        }
    }
    assert_eq!(committed, 1);
    assert_eq!(conflicts, 5);
}

#[tokio::test]
async fn journal_backed_notary_remembers_across_restarts() {
    let tmp = TempDir::new().unwrap();
    let owner = Identity::from_seed("Owner", [3; 32]);
    let notary_id = Identity::from_seed("Notary", [9; 32]);
    let input = RecordRef::new(TxId::of_bytes(b"register"), 0);

    {
        let consumed = JournalConsumed::open(tmp.path()).unwrap();
        let (handle, _task) = NotaryService::spawn(Notary::new(notary_id.clone(), Box::new(consumed)), 4);
        handle
            .notarise(deregister(&owner, &notary_id, input))
            .await
            .unwrap();
    }

    let consumed = JournalConsumed::open(tmp.path()).unwrap();
    let (handle, _task) = NotaryService::spawn(Notary::new(notary_id.clone(), Box::new(consumed)), 4);
    let err = handle
        .notarise(deregister(&owner, &notary_id, input))
        .await
        .unwrap_err();
    assert!(matches!(err, NotaryError::Conflict(_)));
}

#[tokio::test]
async fn dropped_service_reports_unavailable() {
    let owner = Identity::from_seed("Owner", [3; 32]);
    let notary_id = Identity::from_seed("Notary", [9; 32]);
    let (handle, task) = NotaryService::spawn(Notary::in_memory(notary_id.clone()), 1);
    task.abort();
    let _ = task.await;

    let err = handle
        .notarise(deregister(&owner, &notary_id, RecordRef::new(TxId::of_bytes(b"x"), 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, NotaryError::Unavailable));
}
