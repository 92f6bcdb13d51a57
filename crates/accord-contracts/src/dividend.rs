//! Dividend payment rules.
//!
//! A payment emits one dividend record per paid investor and must be signed by
//! exactly as many parties as there are records, each of them a recipient.

use accord_types::RecordKind;

use crate::shape::{no_inputs, output_participants_signed};
use crate::{Rule, TxView};

pub const KIND: &str = "All records must belong to the dividend contract.";

pub const PAYMENT_NO_INPUTS: &str = "No inputs should be consumed when issuing dividend.";
pub const PAYMENT_COUNT: &str = "All signers must be issued dividend.";
pub const PAYMENT_AMOUNT: &str = "Dividend payable value must be non-negative.";
pub const PAYMENT_SIGNERS: &str = "All participants are required to sign when issuing dividend.";

pub(crate) const KIND_RULE: Rule = Rule::new(KIND, all_dividends);

pub(crate) const MAKE_PAYMENT: &[Rule] = &[
    Rule::new(PAYMENT_NO_INPUTS, no_inputs),
    Rule::new(PAYMENT_COUNT, one_output_per_signer),
    Rule::new(PAYMENT_AMOUNT, amounts_positive),
    Rule::new(PAYMENT_SIGNERS, output_participants_signed),
];

fn all_dividends(tx: &TxView<'_>) -> bool {
    tx.all_records().all(|r| r.kind() == RecordKind::Dividend)
}

fn one_output_per_signer(tx: &TxView<'_>) -> bool {
    tx.output_count() == tx.signers.len()
}

fn amounts_positive(tx: &TxView<'_>) -> bool {
    tx.dividend_outputs().all(|d| d.amount > 0)
}
