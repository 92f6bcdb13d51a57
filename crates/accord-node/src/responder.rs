//! Counterparty side of the agreement protocol: decide whether to countersign.

use accord_store::LedgerStore;
use accord_types::{Command, FundAction, Party, SignedTransaction};

use crate::config::AcceptancePolicy;

/// What the responder decided about a signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    Sign,
    Reject(String),
    /// Keep the requester waiting; it will eventually time out.
    Withhold,
}

/// Local facts a responder may consult.
pub struct ReviewContext<'a> {
    pub me: &'a Party,
    pub ledger: &'a dyn LedgerStore,
    pub acceptance: &'a AcceptancePolicy,
}

pub trait Responder: Send + Sync {
    fn review(&self, ctx: &ReviewContext<'_>, from: &Party, envelope: &SignedTransaction) -> Review;
}

/// Re-verifies everything independently of the initiator before signing.
#[derive(Debug, Default, Clone, Copy)]
pub struct VerifyingResponder;

impl Responder for VerifyingResponder {
    fn review(&self, ctx: &ReviewContext<'_>, from: &Party, envelope: &SignedTransaction) -> Review {
        match check(ctx, from, envelope) {
            Ok(()) => Review::Sign,
            Err(reason) => Review::Reject(reason),
        }
    }
}

fn check(ctx: &ReviewContext<'_>, from: &Party, envelope: &SignedTransaction) -> Result<(), String> {
    envelope.verify_signatures().map_err(|e| e.to_string())?;
    let proposal = &envelope.tx;
    if !proposal.required_signers.contains(&ctx.me.key) {
        return Err(format!("{} is not a required signer", ctx.me.name));
    }
    if !envelope.signatures.contains_key(&from.key) {
        return Err(format!("initiator {} has not signed", from.name));
    }

    accord_contracts::verify_proposal(proposal).map_err(|violation| violation.rule.to_string())?;

    // Spentness is left to the notary; only the content of held inputs is checked.
    for input in &proposal.inputs {
        let reference = &input.reference;
        let held = ctx.ledger.state(reference).map_err(|e| e.to_string())?;
        if held.is_some_and(|held| held.record != input.record) {
            return Err(format!("input {reference} does not match the local copy"));
        }
    }

    let issuing = proposal.command == Command::Fund(FundAction::Issue);
    if let (true, Some(limit)) = (issuing, ctx.acceptance.max_fund_value) {
        let mut funds = proposal.outputs.iter().filter_map(|r| r.as_fund());
        if let Some(fund) = funds.find(|fund| fund.value > limit) {
            return Err(format!(
                "fund value {} exceeds the accepted maximum of {limit}",
                fund.value
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_store::MemLedger;
    use accord_types::{FundState, Identity, Proposal, Record, RecordId, RecordRef, StateAndRef, TxId};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    struct Setup {
        alice: Identity,
        bob: Identity,
        ledger: MemLedger,
    }

    fn setup() -> Setup {
        let bob = Identity::from_seed("Bob", [2; 32]);
        Setup {
            alice: Identity::from_seed("Alice", [1; 32]),
            ledger: MemLedger::new(bob.party().clone()),
            bob,
        }
    }

    fn issue(s: &Setup, value: i64) -> SignedTransaction {
        let proposal = Proposal {
            inputs: vec![],
            outputs: vec![Record::fund(
                RecordId::new(),
                FundState {
                    value,
                    manager: s.alice.party().clone(),
                    investors: vec![s.bob.party().clone()],
                },
            )],
            command: Command::Fund(FundAction::Issue),
            required_signers: BTreeSet::from([s.alice.public_key(), s.bob.public_key()]),
            notary: Identity::from_seed("Notary", [9; 32]).party().clone(),
            salt: Uuid::new_v4(),
        };
        let mut envelope = SignedTransaction::new(proposal).unwrap();
        envelope.sign_with(&s.alice);
        envelope
    }

    fn review(s: &Setup, envelope: &SignedTransaction, acceptance: AcceptancePolicy) -> Review {
        let ctx = ReviewContext {
            me: s.bob.party(),
            ledger: &s.ledger,
            acceptance: &acceptance,
        };
        VerifyingResponder.review(&ctx, s.alice.party(), envelope)
    }

    #[test]
    fn signs_a_valid_issue() {
        let s = setup();
        assert_eq!(review(&s, &issue(&s, 1000), AcceptancePolicy::default()), Review::Sign);
    }

    #[test]
    fn rejects_rule_violations_with_rule_text() {
        let s = setup();
        let review = review(&s, &issue(&s, -1), AcceptancePolicy::default());
        assert_eq!(
            review,
            Review::Reject(accord_contracts::fund::VALUE_POSITIVE.to_string())
        );
    }

    #[test]
    fn applies_acceptance_limit() {
        let s = setup();
        let envelope = issue(&s, 200_000);
        assert!(matches!(
            review(&s, &envelope, AcceptancePolicy::default()),
            Review::Reject(_)
        ));
        let open = AcceptancePolicy {
            max_fund_value: None,
        };
        assert_eq!(review(&s, &envelope, open), Review::Sign);
    }

    #[test]
    fn acceptance_limit_covers_only_issuance() {
        let s = setup();
        let carol = Identity::from_seed("Carol", [3; 32]);
        let id = RecordId::new();
        let fund = |investor: &Identity| {
            Record::fund(
                id,
                FundState {
                    value: 200_000,
                    manager: s.alice.party().clone(),
                    investors: vec![investor.party().clone()],
                },
            )
        };
        let proposal = Proposal {
            inputs: vec![StateAndRef {
                reference: RecordRef::new(TxId::of_bytes(b"large issue"), 0),
                record: fund(&carol),
            }],
            outputs: vec![fund(&s.bob)],
            command: Command::Fund(FundAction::ChangeOwner),
            required_signers: BTreeSet::from([
                s.alice.public_key(),
                s.bob.public_key(),
                carol.public_key(),
            ]),
            notary: Identity::from_seed("Notary", [9; 32]).party().clone(),
            salt: Uuid::new_v4(),
        };
        let mut envelope = SignedTransaction::new(proposal).unwrap();
        envelope.sign_with(&s.alice);
        assert_eq!(review(&s, &envelope, AcceptancePolicy::default()), Review::Sign);
    }

    #[test]
    fn rejects_when_initiator_has_not_signed() {
        let s = setup();
        let mut envelope = issue(&s, 1000);
        envelope.signatures.clear();
        assert!(matches!(
            review(&s, &envelope, AcceptancePolicy::default()),
            Review::Reject(_)
        ));
    }
}
