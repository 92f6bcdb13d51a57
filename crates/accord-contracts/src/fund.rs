//! Fund share register rules.

use std::collections::BTreeSet;

use accord_types::{FundState, Party, RecordKind};

use crate::shape::{
    no_inputs, no_outputs, one_input, one_output, output_participants_signed, some_inputs,
    some_outputs,
};
use crate::{MAX_FUND_VALUE, Rule, TxView};

pub const KIND: &str = "All records must belong to the fund contract.";

pub const ISSUE_NO_INPUTS: &str = "No inputs should be consumed when issuing a fund.";
pub const ISSUE_ONE_OUTPUT: &str = "Only one output state should be created when issuing a fund.";
pub const ISSUE_HAS_INVESTOR: &str = "A fund must have at least one investor.";
pub const VALUE_POSITIVE: &str = "The fund's value must be non-negative.";
pub const VALUE_CEILING: &str = "The fund's value must not be greater than 10 million.";
pub const ISSUE_MANAGER_NOT_INVESTOR: &str =
    "The fund manager and an investor cannot be the same entity.";
pub const ISSUE_SIGNERS: &str = "All participants are required to sign when issuing a fund.";

pub const CHANGE_OWNER_INPUTS: &str =
    "At least one input should be consumed when changing ownership.";
pub const CHANGE_OWNER_OUTPUTS: &str =
    "At least one output should be created when changing ownership.";
pub const CHANGE_OWNER_ONE_SWAP: &str =
    "Exactly one investor must be replaced by exactly one new investor when changing ownership.";
pub const CHANGE_OWNER_SIGNERS: &str =
    "The fund manager, the outgoing investor and the incoming investor must sign when changing ownership.";

pub const AMEND_ONE_INPUT: &str = "Only one input should be consumed when amending a fund.";
pub const AMEND_ONE_OUTPUT: &str = "Only one output should be created when amending a fund.";
pub const AMEND_SAME_ID: &str = "An amendment must keep the fund's identifier.";
pub const AMEND_SIGNERS: &str = "All participants are required to sign when amending a fund.";

pub const CANCEL_ONE_INPUT: &str = "Only one input should be consumed when cancelling a fund.";
pub const CANCEL_NO_OUTPUTS: &str = "Zero outputs should be created when cancelling a fund.";

pub(crate) const KIND_RULE: Rule = Rule::new(KIND, all_funds);

pub(crate) const ISSUE: &[Rule] = &[
    Rule::new(ISSUE_NO_INPUTS, no_inputs),
    Rule::new(ISSUE_ONE_OUTPUT, one_output),
    Rule::new(ISSUE_HAS_INVESTOR, output_has_investor),
    Rule::new(VALUE_POSITIVE, output_value_positive),
    Rule::new(VALUE_CEILING, output_value_below_ceiling),
    Rule::new(ISSUE_MANAGER_NOT_INVESTOR, manager_not_investor),
    Rule::new(ISSUE_SIGNERS, output_participants_signed),
];

pub(crate) const CHANGE_OWNER: &[Rule] = &[
    Rule::new(CHANGE_OWNER_INPUTS, some_inputs),
    Rule::new(CHANGE_OWNER_OUTPUTS, some_outputs),
    Rule::new(CHANGE_OWNER_ONE_SWAP, exactly_one_swap),
    Rule::new(CHANGE_OWNER_SIGNERS, swap_parties_signed),
];

pub(crate) const AMEND: &[Rule] = &[
    Rule::new(AMEND_ONE_INPUT, one_input),
    Rule::new(AMEND_ONE_OUTPUT, one_output),
    Rule::new(AMEND_SAME_ID, same_id),
    Rule::new(VALUE_POSITIVE, output_value_positive),
    Rule::new(VALUE_CEILING, output_value_below_ceiling),
    Rule::new(AMEND_SIGNERS, output_participants_signed),
];

pub(crate) const CANCEL: &[Rule] = &[
    Rule::new(CANCEL_ONE_INPUT, one_input),
    Rule::new(CANCEL_NO_OUTPUTS, no_outputs),
];

fn all_funds(tx: &TxView<'_>) -> bool {
    tx.all_records().all(|r| r.kind() == RecordKind::Fund)
}

fn single_fund<'a>(tx: &TxView<'a>) -> Option<&'a FundState> {
    tx.single_output().and_then(|r| r.as_fund())
}

fn output_has_investor(tx: &TxView<'_>) -> bool {
    single_fund(tx).is_some_and(|fund| !fund.investors.is_empty())
}

fn output_value_positive(tx: &TxView<'_>) -> bool {
    single_fund(tx).is_some_and(|fund| fund.value > 0)
}

fn output_value_below_ceiling(tx: &TxView<'_>) -> bool {
    single_fund(tx).is_some_and(|fund| fund.value < MAX_FUND_VALUE)
}

fn manager_not_investor(tx: &TxView<'_>) -> bool {
    single_fund(tx).is_some_and(|fund| !fund.investors.contains(&fund.manager))
}

fn same_id(tx: &TxView<'_>) -> bool {
    match (tx.single_input(), tx.single_output()) {
        (Some(input), Some(output)) => input.id == output.id,
        _ => false,
    }
}

fn investors<'a>(funds: impl Iterator<Item = &'a FundState>) -> BTreeSet<&'a Party> {
    funds.flat_map(|fund| fund.investors.iter()).collect()
}

/// Investors added and removed across the whole transition.
fn swap<'a>(tx: &TxView<'a>) -> (Vec<&'a Party>, Vec<&'a Party>) {
    let before = investors(tx.fund_inputs());
    let after = investors(tx.fund_outputs());
    let incoming = after.difference(&before).copied().collect();
    let outgoing = before.difference(&after).copied().collect();
    (outgoing, incoming)
}

fn exactly_one_swap(tx: &TxView<'_>) -> bool {
    let (outgoing, incoming) = swap(tx);
    outgoing.len() == 1 && incoming.len() == 1
}

fn swap_parties_signed(tx: &TxView<'_>) -> bool {
    let (outgoing, incoming) = swap(tx);
    let managers = tx.fund_inputs().chain(tx.fund_outputs()).map(|f| &f.manager);
    tx.signed_by_all(managers) && tx.signed_by_all(outgoing) && tx.signed_by_all(incoming)
}
