use std::collections::BTreeMap;

use accord_types::{Party, PartyName, PublicKey};
use serde::{Deserialize, Serialize};

use crate::FlowError;

/// Well-known parties of the network plus its notary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMap {
    notary: Party,
    parties: BTreeMap<PartyName, Party>,
}

impl NetworkMap {
    pub fn new(notary: Party, parties: impl IntoIterator<Item = Party>) -> Self {
        let parties = parties
            .into_iter()
            .map(|party| (party.name.clone(), party))
            .collect();
        Self { notary, parties }
    }

    pub fn notary(&self) -> &Party {
        &self.notary
    }

    pub fn resolve(&self, name: &PartyName) -> Result<Party, FlowError> {
        self.parties
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::UnresolvedParty(name.to_string()))
    }

    pub fn by_key(&self, key: &PublicKey) -> Result<Party, FlowError> {
        self.parties
            .values()
            .find(|party| party.key == *key)
            .cloned()
            .ok_or_else(|| FlowError::UnresolvedParty(key.to_hex()))
    }

    /// Every party except `me` and the notary.
    pub fn peers(&self, me: &Party) -> Vec<Party> {
        self.parties
            .values()
            .filter(|party| *party != me && **party != self.notary)
            .cloned()
            .collect()
    }

    pub fn parties(&self) -> impl Iterator<Item = &Party> {
        self.parties.values()
    }
}
