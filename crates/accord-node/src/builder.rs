use std::collections::BTreeSet;

use accord_store::LedgerStore;
use accord_types::{
    Command, DividendAction, DividendState, FundAction, FundState, Party, PartyName,
    PropertyAction, PropertyState, Proposal, PublicKey, Record, RecordId, RecordKind,
    StateAndRef,
};
use uuid::Uuid;

use crate::{FlowError, NetworkMap};

/// Assembles proposals from caller intent against one party's view of the
/// ledger. The builder never signs and never contacts anyone.
pub struct TransactionBuilder<'a> {
    me: &'a Party,
    network: &'a NetworkMap,
    ledger: &'a dyn LedgerStore,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(me: &'a Party, network: &'a NetworkMap, ledger: &'a dyn LedgerStore) -> Self {
        Self {
            me,
            network,
            ledger,
        }
    }

    pub fn issue_fund(&self, value: i64, investors: &[PartyName]) -> Result<Proposal, FlowError> {
        let investors = self.resolve_all(investors)?;
        let fund = Record::fund(
            RecordId::new(),
            FundState {
                value,
                manager: self.me.clone(),
                investors,
            },
        );
        let signers = keys(&fund.participants());
        Ok(self.proposal(Command::Fund(FundAction::Issue), vec![], vec![fund], signers))
    }

    /// Replace `current` with `new` among the fund's investors.
    pub fn change_fund_investor(
        &self,
        fund_id: RecordId,
        current: &PartyName,
        new: &PartyName,
    ) -> Result<Proposal, FlowError> {
        let outgoing = self.network.resolve(current)?;
        let incoming = self.network.resolve(new)?;
        let input = self.current(fund_id, RecordKind::Fund)?;
        let mut fund = fund_of(&input)?.clone();
        let slot = fund
            .investors
            .iter()
            .position(|p| *p == outgoing)
            .ok_or_else(|| {
                FlowError::InvalidRequest(format!("{current} is not an investor in fund {fund_id}"))
            })?;
        fund.investors[slot] = incoming.clone();

        let signers = BTreeSet::from([fund.manager.key, outgoing.key, incoming.key]);
        let output = Record::fund(fund_id, fund);
        Ok(self.proposal(
            Command::Fund(FundAction::ChangeOwner),
            vec![input],
            vec![output],
            signers,
        ))
    }

    pub fn amend_fund(&self, fund_id: RecordId, value: i64) -> Result<Proposal, FlowError> {
        let input = self.current(fund_id, RecordKind::Fund)?;
        let mut fund = fund_of(&input)?.clone();
        fund.value = value;
        let output = Record::fund(fund_id, fund);
        let signers = keys(&output.participants());
        Ok(self.proposal(Command::Fund(FundAction::Amend), vec![input], vec![output], signers))
    }

    pub fn cancel_fund(&self, fund_id: RecordId) -> Result<Proposal, FlowError> {
        let input = self.current(fund_id, RecordKind::Fund)?;
        let signers = keys(&input.record.participants());
        Ok(self.proposal(Command::Fund(FundAction::Cancel), vec![input], vec![], signers))
    }

    /// One dividend record per investor of the fund, each signed for by its
    /// recipient. The fund itself is referenced, not consumed.
    pub fn pay_dividend(&self, amount: i64, fund_id: RecordId) -> Result<Proposal, FlowError> {
        let held = self.current(fund_id, RecordKind::Fund)?;
        let fund = fund_of(&held)?;
        let outputs: Vec<Record> = fund
            .investors
            .iter()
            .map(|investor| {
                Record::dividend(
                    RecordId::new(),
                    DividendState {
                        amount,
                        fund_id,
                        investors: vec![investor.clone()],
                    },
                )
            })
            .collect();
        let signers = keys(&fund.investors);
        Ok(self.proposal(
            Command::Dividend(DividendAction::MakePayment),
            vec![],
            outputs,
            signers,
        ))
    }

    pub fn register_property(&self, address: &str, manager: &PartyName) -> Result<Proposal, FlowError> {
        let owner = self.network.resolve(manager)?;
        let property = Record::property(
            RecordId::new(),
            PropertyState {
                address: address.to_string(),
                owner,
            },
        );
        let signers = keys(&property.participants());
        Ok(self.proposal(
            Command::Property(PropertyAction::Register),
            vec![],
            vec![property],
            signers,
        ))
    }

    /// Hand the property to a new manager; both old and new manager sign.
    pub fn transfer_property(
        &self,
        property_id: RecordId,
        new_manager: &PartyName,
    ) -> Result<Proposal, FlowError> {
        let owner = self.network.resolve(new_manager)?;
        let input = self.current(property_id, RecordKind::Property)?;
        let address = match input.record.as_property() {
            Some(property) => property.address.clone(),
            None => return Err(FlowError::NoSuchRecord(property_id)),
        };
        let output = Record::property(property_id, PropertyState { address, owner });
        let mut signers = keys(&input.record.participants());
        signers.extend(keys(&output.participants()));
        Ok(self.proposal(
            Command::Property(PropertyAction::ChangeManager),
            vec![input],
            vec![output],
            signers,
        ))
    }

    pub fn deregister_property(&self, property_id: RecordId) -> Result<Proposal, FlowError> {
        let input = self.current(property_id, RecordKind::Property)?;
        let signers = keys(&input.record.participants());
        Ok(self.proposal(
            Command::Property(PropertyAction::Deregister),
            vec![input],
            vec![],
            signers,
        ))
    }

    fn proposal(
        &self,
        command: Command,
        inputs: Vec<StateAndRef>,
        outputs: Vec<Record>,
        required_signers: BTreeSet<PublicKey>,
    ) -> Proposal {
        Proposal {
            inputs,
            outputs,
            command,
            required_signers,
            notary: self.network.notary().clone(),
            salt: Uuid::new_v4(),
        }
    }

    fn resolve_all(&self, names: &[PartyName]) -> Result<Vec<Party>, FlowError> {
        names.iter().map(|name| self.network.resolve(name)).collect()
    }

    /// The unconsumed version of `id`, which must be of `kind`.
    fn current(&self, id: RecordId, kind: RecordKind) -> Result<StateAndRef, FlowError> {
        match self.ledger.current(id)? {
            Some(state) if state.record.kind() == kind => Ok(state),
            _ => Err(FlowError::NoSuchRecord(id)),
        }
    }
}

fn fund_of(state: &StateAndRef) -> Result<&FundState, FlowError> {
    state
        .record
        .as_fund()
        .ok_or(FlowError::NoSuchRecord(state.record.id))
}

fn keys(parties: &[Party]) -> BTreeSet<PublicKey> {
    parties.iter().map(|party| party.key).collect()
}
