//! The rule table: deterministic validity rules per (record kind, action).
//!
//! Every entry is an ordered list of named predicates. Verification walks the
//! list and reports the first predicate that does not hold, so a later rule may
//! assume every earlier one passed. Nothing here performs I/O; the same
//! proposal and signer set always produce the same verdict.

pub mod dividend;
pub mod fund;
pub mod property;
mod shape;
mod view;

use std::collections::BTreeSet;

use accord_types::{Command, DividendAction, FundAction, Proposal, PropertyAction, PublicKey};
use thiserror::Error;

pub use view::TxView;

/// Maximum fund value, exclusive.
pub const MAX_FUND_VALUE: i64 = 10_000_000;

pub const DISTINCT_INPUTS: &str = "Input references must be distinct.";

/// A failed predicate, carrying the rule text for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{rule}")]
pub struct RuleViolation {
    pub command: Command,
    pub rule: &'static str,
}

/// One named predicate.
#[derive(Clone, Copy)]
pub struct Rule {
    pub text: &'static str,
    check: fn(&TxView<'_>) -> bool,
}

impl Rule {
    pub const fn new(text: &'static str, check: fn(&TxView<'_>) -> bool) -> Self {
        Self { text, check }
    }

    pub fn holds(&self, tx: &TxView<'_>) -> bool {
        (self.check)(tx)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rule").field(&self.text).finish()
    }
}

/// Ordered rules governing `command`.
pub fn rules_for(command: Command) -> &'static [Rule] {
    match command {
        Command::Fund(FundAction::Issue) => fund::ISSUE,
        Command::Fund(FundAction::ChangeOwner) => fund::CHANGE_OWNER,
        Command::Fund(FundAction::Amend) => fund::AMEND,
        Command::Fund(FundAction::Cancel) => fund::CANCEL,
        Command::Property(PropertyAction::Register) => property::REGISTER,
        Command::Property(PropertyAction::ChangeManager) => property::CHANGE_MANAGER,
        Command::Property(PropertyAction::Deregister) => property::DEREGISTER,
        Command::Dividend(DividendAction::MakePayment) => dividend::MAKE_PAYMENT,
    }
}

fn distinct_inputs(tx: &TxView<'_>) -> bool {
    let refs: BTreeSet<_> = tx.proposal.inputs.iter().map(|i| i.reference).collect();
    refs.len() == tx.proposal.inputs.len()
}

/// Verify `proposal` as if signed by exactly `signers`.
pub fn verify(proposal: &Proposal, signers: &BTreeSet<PublicKey>) -> Result<(), RuleViolation> {
    let tx = TxView::new(proposal, signers);
    let generic = Rule::new(DISTINCT_INPUTS, distinct_inputs);
    let kind_rule = kind_rule(proposal.command);
    for rule in [generic, kind_rule].iter().chain(rules_for(proposal.command)) {
        if !rule.holds(&tx) {
            return Err(RuleViolation {
                command: proposal.command,
                rule: rule.text,
            });
        }
    }
    Ok(())
}

/// Verify against the proposal's own declared signer set.
pub fn verify_proposal(proposal: &Proposal) -> Result<(), RuleViolation> {
    verify(proposal, &proposal.required_signers)
}

fn kind_rule(command: Command) -> Rule {
    match command {
        Command::Fund(_) => fund::KIND_RULE,
        Command::Property(_) => property::KIND_RULE,
        Command::Dividend(_) => dividend::KIND_RULE,
    }
}
