//! Flat column projection of records, used by the ledger query surface.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::{Record, RecordKind, RecordState};

/// A projected column value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Equality for scalars, membership for lists. Integers compare
    /// numerically, so `value=1000` matches `Int(1000)`.
    pub fn matches(&self, needle: &str) -> bool {
        match self {
            FieldValue::Int(n) => needle.trim().parse::<i64>().is_ok_and(|v| v == *n),
            FieldValue::Text(s) => s == needle,
            FieldValue::List(items) => items.iter().any(|item| item == needle),
        }
    }
}

impl Record {
    /// Named columns of this record, keyed by column name.
    pub fn columns(&self) -> BTreeMap<&'static str, FieldValue> {
        let mut cols = BTreeMap::new();
        cols.insert("id", FieldValue::Text(self.id.to_string()));
        match &self.state {
            RecordState::Fund(fund) => {
                cols.insert("value", FieldValue::Int(fund.value));
                cols.insert("manager", FieldValue::Text(fund.manager.name.to_string()));
                cols.insert(
                    "investors",
                    FieldValue::List(fund.investors.iter().map(|p| p.name.to_string()).collect()),
                );
            }
            RecordState::Property(property) => {
                cols.insert("address", FieldValue::Text(property.address.clone()));
                cols.insert("owner", FieldValue::Text(property.owner.name.to_string()));
            }
            RecordState::Dividend(dividend) => {
                cols.insert("amount", FieldValue::Int(dividend.amount));
                cols.insert("fund_id", FieldValue::Text(dividend.fund_id.to_string()));
                cols.insert(
                    "investors",
                    FieldValue::List(
                        dividend.investors.iter().map(|p| p.name.to_string()).collect(),
                    ),
                );
            }
        }
        cols
    }
}

/// `field=value` equality predicate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// A record without the named column never matches.
    pub fn matches(&self, record: &Record) -> bool {
        record
            .columns()
            .get(self.field.as_str())
            .is_some_and(|value| value.matches(&self.value))
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

impl FromStr for FieldFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| format!("filter '{s}' must look like field=value"))?;
        if field.trim().is_empty() {
            return Err(format!("filter '{s}' has an empty field name"));
        }
        Ok(FieldFilter::new(field.trim(), value.trim()))
    }
}

/// Kind plus optional predicate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub kind: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FieldFilter>,
}

impl RecordQuery {
    pub fn kind(kind: RecordKind) -> Self {
        Self { kind, filter: None }
    }

    pub fn with_filter(mut self, filter: FieldFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.kind() == self.kind && self.filter.as_ref().is_none_or(|f| f.matches(record))
    }
}
