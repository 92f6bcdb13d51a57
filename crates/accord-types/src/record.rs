use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Party;
use crate::transaction::TxId;

/// Stable identifier shared by every version of one logical record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        RecordId(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RecordId(Uuid::parse_str(s)?))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Fund,
    Property,
    Dividend,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Fund, RecordKind::Property, RecordKind::Dividend];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Fund => "fund",
            RecordKind::Property => "property",
            RecordKind::Dividend => "dividend",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown record kind '{s}' (expected fund, property or dividend)"))
    }
}

/// A fund share register: one manager, an ordered list of investors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundState {
    pub value: i64,
    pub manager: Party,
    pub investors: Vec<Party>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyState {
    pub address: String,
    pub owner: Party,
}

/// A dividend claim paid against a fund.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendState {
    pub amount: i64,
    pub fund_id: RecordId,
    pub investors: Vec<Party>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordState {
    Fund(FundState),
    Property(PropertyState),
    Dividend(DividendState),
}

impl RecordState {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordState::Fund(_) => RecordKind::Fund,
            RecordState::Property(_) => RecordKind::Property,
            RecordState::Dividend(_) => RecordKind::Dividend,
        }
    }
}

/// One immutable version of a logical record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub state: RecordState,
}

impl Record {
    pub fn new(id: RecordId, state: RecordState) -> Self {
        Self { id, state }
    }

    pub fn fund(id: RecordId, fund: FundState) -> Self {
        Self::new(id, RecordState::Fund(fund))
    }

    pub fn property(id: RecordId, property: PropertyState) -> Self {
        Self::new(id, RecordState::Property(property))
    }

    pub fn dividend(id: RecordId, dividend: DividendState) -> Self {
        Self::new(id, RecordState::Dividend(dividend))
    }

    pub fn kind(&self) -> RecordKind {
        self.state.kind()
    }

    /// Parties that must be consulted for any transition touching this version.
    pub fn participants(&self) -> Vec<Party> {
        match &self.state {
            RecordState::Fund(fund) => std::iter::once(fund.manager.clone())
                .chain(fund.investors.iter().cloned())
                .collect(),
            RecordState::Property(property) => vec![property.owner.clone()],
            RecordState::Dividend(dividend) => dividend.investors.clone(),
        }
    }

    pub fn is_participant(&self, party: &Party) -> bool {
        self.participants().iter().any(|p| p == party)
    }

    pub fn as_fund(&self) -> Option<&FundState> {
        match &self.state {
            RecordState::Fund(fund) => Some(fund),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyState> {
        match &self.state {
            RecordState::Property(property) => Some(property),
            _ => None,
        }
    }

    pub fn as_dividend(&self) -> Option<&DividendState> {
        match &self.state {
            RecordState::Dividend(dividend) => Some(dividend),
            _ => None,
        }
    }
}

/// Names the output slot of a committed transaction that produced a version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl RecordRef {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.index)
    }
}

impl FromStr for RecordRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tx, index) = s
            .rsplit_once('#')
            .ok_or_else(|| format!("record ref '{s}' must look like <tx-id>#<index>"))?;
        let tx_id = tx.parse().map_err(|e| format!("record ref '{s}': {e}"))?;
        let index = index.parse().map_err(|e| format!("record ref '{s}': {e}"))?;
        Ok(RecordRef { tx_id, index })
    }
}

/// A record version together with the reference that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub reference: RecordRef,
    pub record: Record,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn party(name: &str, seed: u8) -> Party {
        Identity::from_seed(name, [seed; 32]).party().clone()
    }

    #[test]
    fn fund_participants_are_manager_then_investors() {
        let alice = party("Alice", 1);
        let bob = party("Bob", 2);
        let carol = party("Carol", 3);
        let fund = Record::fund(
            RecordId::new(),
            FundState {
                value: 1000,
                manager: alice.clone(),
                investors: vec![bob.clone(), carol.clone()],
            },
        );
        assert_eq!(fund.participants(), vec![alice, bob, carol]);
        assert_eq!(fund.kind(), RecordKind::Fund);
    }

    #[test]
    fn property_participant_is_the_owner() {
        let owner = party("Owner", 9);
        let property = Record::property(
            RecordId::new(),
            PropertyState {
                address: "Santa Carla".into(),
                owner: owner.clone(),
            },
        );
        assert_eq!(property.participants(), vec![owner.clone()]);
        assert!(property.is_participant(&owner));
    }

    #[test]
    fn record_kind_parses_case_insensitively() {
        assert_eq!("Fund".parse::<RecordKind>().unwrap(), RecordKind::Fund);
        assert_eq!("dividend".parse::<RecordKind>().unwrap(), RecordKind::Dividend);
        assert!("bond".parse::<RecordKind>().is_err());
    }

    #[test]
    fn record_ref_text_form_round_trips() {
        let reference = RecordRef::new(TxId::of_bytes(b"tx"), 3);
        let parsed: RecordRef = reference.to_string().parse().unwrap();
        assert_eq!(parsed, reference);
        assert!("no-index".parse::<RecordRef>().is_err());
    }
}
