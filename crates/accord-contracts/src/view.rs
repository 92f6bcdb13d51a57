use std::collections::BTreeSet;

use accord_types::{DividendState, FundState, Party, PropertyState, Proposal, PublicKey, Record};

/// Read-only view of a proposal under verification.
pub struct TxView<'a> {
    pub proposal: &'a Proposal,
    pub signers: &'a BTreeSet<PublicKey>,
}

impl<'a> TxView<'a> {
    pub fn new(proposal: &'a Proposal, signers: &'a BTreeSet<PublicKey>) -> Self {
        Self { proposal, signers }
    }

    pub fn input_count(&self) -> usize {
        self.proposal.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.proposal.outputs.len()
    }

    pub fn input_records(&self) -> impl Iterator<Item = &'a Record> {
        self.proposal.inputs.iter().map(|input| &input.record)
    }

    pub fn output_records(&self) -> impl Iterator<Item = &'a Record> {
        self.proposal.outputs.iter()
    }

    pub fn all_records(&self) -> impl Iterator<Item = &'a Record> {
        self.input_records().chain(self.output_records())
    }

    pub fn fund_inputs(&self) -> impl Iterator<Item = &'a FundState> {
        self.input_records().filter_map(Record::as_fund)
    }

    pub fn fund_outputs(&self) -> impl Iterator<Item = &'a FundState> {
        self.output_records().filter_map(Record::as_fund)
    }

    pub fn property_outputs(&self) -> impl Iterator<Item = &'a PropertyState> {
        self.output_records().filter_map(Record::as_property)
    }

    pub fn dividend_outputs(&self) -> impl Iterator<Item = &'a DividendState> {
        self.output_records().filter_map(Record::as_dividend)
    }

    /// The only output, when there is exactly one.
    pub fn single_output(&self) -> Option<&'a Record> {
        match self.proposal.outputs.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn single_input(&self) -> Option<&'a Record> {
        match self.proposal.inputs.as_slice() {
            [only] => Some(&only.record),
            _ => None,
        }
    }

    pub fn signed_by(&self, party: &Party) -> bool {
        self.signers.contains(&party.key)
    }

    pub fn signed_by_all<'p>(&self, parties: impl IntoIterator<Item = &'p Party>) -> bool {
        parties.into_iter().all(|party| self.signed_by(party))
    }

    /// Every participant of every output has signed.
    pub fn output_participants_signed(&self) -> bool {
        self.output_records()
            .all(|record| record.participants().iter().all(|p| self.signed_by(p)))
    }
}
