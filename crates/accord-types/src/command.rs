use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::RecordKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundAction {
    Issue,
    ChangeOwner,
    Amend,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyAction {
    Register,
    ChangeManager,
    Deregister,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendAction {
    MakePayment,
}

/// The single action a proposal performs, scoped to the record kind whose
/// rules govern it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "contract", content = "action", rename_all = "snake_case")]
pub enum Command {
    Fund(FundAction),
    Property(PropertyAction),
    Dividend(DividendAction),
}

impl Command {
    pub fn record_kind(&self) -> RecordKind {
        match self {
            Command::Fund(_) => RecordKind::Fund,
            Command::Property(_) => RecordKind::Property,
            Command::Dividend(_) => RecordKind::Dividend,
        }
    }

    pub fn action_name(&self) -> &'static str {
        match self {
            Command::Fund(FundAction::Issue) => "Issue",
            Command::Fund(FundAction::ChangeOwner) => "ChangeOwner",
            Command::Fund(FundAction::Amend) => "Amend",
            Command::Fund(FundAction::Cancel) => "Cancel",
            Command::Property(PropertyAction::Register) => "Register",
            Command::Property(PropertyAction::ChangeManager) => "ChangeManager",
            Command::Property(PropertyAction::Deregister) => "Deregister",
            Command::Dividend(DividendAction::MakePayment) => "MakePayment",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.record_kind(), self.action_name())
    }
}
