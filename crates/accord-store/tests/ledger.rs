use std::collections::BTreeSet;

use accord_store::{FsLedger, LedgerError, LedgerStore, MemLedger};
use accord_types::{
    Command, FieldFilter, FundAction, FundState, Identity, Proposal, Record, RecordId,
    RecordKind, RecordQuery, SignedTransaction, StateAndRef, TransactionSignature,
};
use tempfile::TempDir;
use uuid::Uuid;

struct Fixture {
    alice: Identity,
    bob: Identity,
    carol: Identity,
    notary: Identity,
}

impl Fixture {
    fn new() -> Self {
        Self {
            alice: Identity::from_seed("Alice", [1; 32]),
            bob: Identity::from_seed("Bob", [2; 32]),
            carol: Identity::from_seed("Carol", [3; 32]),
            notary: Identity::from_seed("Notary", [9; 32]),
        }
    }

    fn fund(&self, id: RecordId, value: i64, investor: &Identity) -> Record {
        Record::fund(
            id,
            FundState {
                value,
                manager: self.alice.party().clone(),
                investors: vec![investor.party().clone()],
            },
        )
    }

    /// Sign with every identity and stamp with the notary.
    fn finalise(
        &self,
        command: Command,
        inputs: Vec<StateAndRef>,
        outputs: Vec<Record>,
        signers: &[&Identity],
    ) -> SignedTransaction {
        let proposal = Proposal {
            inputs,
            outputs,
            command,
            required_signers: signers.iter().map(|i| i.public_key()).collect::<BTreeSet<_>>(),
            notary: self.notary.party().clone(),
            salt: Uuid::new_v4(),
        };
        let mut envelope = SignedTransaction::new(proposal).unwrap();
        for signer in signers {
            envelope.sign_with(signer);
        }
        envelope.notary_signature = Some(TransactionSignature::notarise(&self.notary, &envelope.id));
        envelope
    }

    fn issue(&self, id: RecordId, investor: &Identity) -> SignedTransaction {
        self.finalise(
            Command::Fund(FundAction::Issue),
            vec![],
            vec![self.fund(id, 1000, investor)],
            &[&self.alice, investor],
        )
    }

    fn swap(&self, input: StateAndRef, from: &Identity, to: &Identity) -> SignedTransaction {
        let id = input.record.id;
        self.finalise(
            Command::Fund(FundAction::ChangeOwner),
            vec![input],
            vec![self.fund(id, 1000, to)],
            &[&self.alice, from, to],
        )
    }
}

fn funds() -> RecordQuery {
    RecordQuery::kind(RecordKind::Fund)
}

fn ledger_contract(ledger: &dyn LedgerStore, fx: &Fixture) {
    let id = RecordId::new();
    let issue = fx.issue(id, &fx.bob);
    let entry = ledger.record_commit(&issue).unwrap();
    assert_eq!(entry.seq, 0);
    assert!(entry.consumed.is_empty());

    let first = ledger.current(id).unwrap().expect("issued fund is current");
    assert_eq!(first.reference.tx_id, issue.id);
    assert_eq!(ledger.unconsumed(&funds()).unwrap(), vec![first.clone()]);

    let swap = fx.swap(first.clone(), &fx.bob, &fx.carol);
    let entry = ledger.record_commit(&swap).unwrap();
    assert_eq!(entry.seq, 1);
    assert_eq!(entry.consumed, vec![first.reference]);
    assert!(ledger.is_consumed(&first.reference).unwrap());

    let second = ledger.current(id).unwrap().expect("swapped fund is current");
    assert_eq!(second.reference.tx_id, swap.id);
    assert_eq!(ledger.unconsumed(&funds()).unwrap(), vec![second]);
    assert_eq!(ledger.state(&first.reference).unwrap(), Some(first));
    assert_eq!(ledger.transaction(&swap.id).unwrap(), Some(swap));
    assert_eq!(ledger.history().unwrap().len(), 2);
}

#[test]
fn mem_ledger_consumes_and_replaces_versions() {
    let fx = Fixture::new();
    let ledger = MemLedger::new(fx.alice.party().clone());
    ledger_contract(&ledger, &fx);
}

#[test]
fn fs_ledger_consumes_and_replaces_versions() {
    let fx = Fixture::new();
    let tmp = TempDir::new().unwrap();
    let ledger = FsLedger::open(tmp.path(), fx.alice.party().clone()).unwrap();
    ledger_contract(&ledger, &fx);
}

#[test]
fn fs_ledger_replays_commits_on_open() {
    let fx = Fixture::new();
    let tmp = TempDir::new().unwrap();
    let id = RecordId::new();
    let (issue_id, current) = {
        let ledger = FsLedger::open(tmp.path(), fx.bob.party().clone()).unwrap();
        let issue = fx.issue(id, &fx.bob);
        ledger.record_commit(&issue).unwrap();
        (issue.id, ledger.current(id).unwrap())
    };

    let reopened = FsLedger::open(tmp.path(), fx.bob.party().clone()).unwrap();
    assert_eq!(reopened.current(id).unwrap(), current);
    assert!(reopened.transaction(&issue_id).unwrap().is_some());
    assert_eq!(reopened.history().unwrap().len(), 1);
}

#[test]
fn outgoing_participant_keeps_no_new_version() {
    let fx = Fixture::new();
    let bob = MemLedger::new(fx.bob.party().clone());
    let carol = MemLedger::new(fx.carol.party().clone());
    let id = RecordId::new();

    let issue = fx.issue(id, &fx.bob);
    bob.record_commit(&issue).unwrap();
    let held = bob.current(id).unwrap().unwrap();

    let swap = fx.swap(held.clone(), &fx.bob, &fx.carol);
    bob.record_commit(&swap).unwrap();
    carol.record_commit(&swap).unwrap();

    assert_eq!(bob.current(id).unwrap(), None);
    assert!(bob.is_consumed(&held.reference).unwrap());
    let now = carol.current(id).unwrap().unwrap();
    assert_eq!(now.reference.tx_id, swap.id);
}

#[test]
fn recording_twice_is_idempotent() {
    let fx = Fixture::new();
    let ledger = MemLedger::new(fx.alice.party().clone());
    let issue = fx.issue(RecordId::new(), &fx.bob);
    let first = ledger.record_commit(&issue).unwrap();
    let second = ledger.record_commit(&issue).unwrap();
    assert_eq!(first, second);
    assert_eq!(ledger.history().unwrap().len(), 1);
}

#[test]
fn unnotarised_envelope_changes_nothing() {
    let fx = Fixture::new();
    let ledger = MemLedger::new(fx.alice.party().clone());
    let mut issue = fx.issue(RecordId::new(), &fx.bob);
    issue.notary_signature = None;

    let err = ledger.record_commit(&issue).unwrap_err();
    assert!(matches!(err, LedgerError::NotFinal { .. }));
    assert!(ledger.history().unwrap().is_empty());
    assert!(ledger.unconsumed(&funds()).unwrap().is_empty());
}

#[test]
fn second_spend_of_a_held_input_is_refused() {
    let fx = Fixture::new();
    let ledger = MemLedger::new(fx.alice.party().clone());
    let id = RecordId::new();
    ledger.record_commit(&fx.issue(id, &fx.bob)).unwrap();
    let held = ledger.current(id).unwrap().unwrap();

    ledger
        .record_commit(&fx.swap(held.clone(), &fx.bob, &fx.carol))
        .unwrap();
    let err = ledger
        .record_commit(&fx.swap(held, &fx.bob, &fx.alice))
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyConsumed { .. }));
    assert_eq!(ledger.history().unwrap().len(), 2);
}

#[test]
fn query_filters_by_column() {
    let fx = Fixture::new();
    let ledger = MemLedger::new(fx.alice.party().clone());
    ledger.record_commit(&fx.issue(RecordId::new(), &fx.bob)).unwrap();
    ledger.record_commit(&fx.issue(RecordId::new(), &fx.carol)).unwrap();

    let by_carol = funds().with_filter(FieldFilter::new("investors", "Carol"));
    let hits = ledger.unconsumed(&by_carol).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].record.is_participant(fx.carol.party()));
    assert_eq!(ledger.unconsumed(&funds()).unwrap().len(), 2);
    assert!(
        ledger
            .unconsumed(&RecordQuery::kind(RecordKind::Property))
            .unwrap()
            .is_empty()
    );
}
