//! Versioned per-kind record codec.
//!
//! Stores persist records through this codec rather than through the serde
//! derive on [`Record`], so a storage backend never depends on the in-memory
//! layout of a state struct. Each kind owns a schema version; bumping it means
//! teaching `decode_body` about the old layout.

use accord_cbor::{from_canonical_cbor, to_canonical_cbor};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::record::{DividendState, FundState, PropertyState, Record, RecordId, RecordKind, RecordState};

#[derive(Debug, Error)]
pub enum RecordCodecError {
    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("unsupported {kind} schema version {version}")]
    UnsupportedVersion { kind: RecordKind, version: u32 },
}

/// Encoding of one record kind's payload.
pub trait RecordCodec: Sized {
    const KIND: RecordKind;
    const SCHEMA_VERSION: u32;

    fn encode_body(&self) -> Result<Vec<u8>, RecordCodecError>;
    fn decode_body(version: u32, bytes: &[u8]) -> Result<Self, RecordCodecError>;
}

fn decode_current<T: DeserializeOwned>(
    kind: RecordKind,
    expected: u32,
    version: u32,
    bytes: &[u8],
) -> Result<T, RecordCodecError> {
    if version != expected {
        return Err(RecordCodecError::UnsupportedVersion { kind, version });
    }
    Ok(from_canonical_cbor(bytes)?)
}

impl RecordCodec for FundState {
    const KIND: RecordKind = RecordKind::Fund;
    const SCHEMA_VERSION: u32 = 1;

    fn encode_body(&self) -> Result<Vec<u8>, RecordCodecError> {
        Ok(to_canonical_cbor(self)?)
    }

    fn decode_body(version: u32, bytes: &[u8]) -> Result<Self, RecordCodecError> {
        decode_current(Self::KIND, Self::SCHEMA_VERSION, version, bytes)
    }
}

impl RecordCodec for PropertyState {
    const KIND: RecordKind = RecordKind::Property;
    const SCHEMA_VERSION: u32 = 1;

    fn encode_body(&self) -> Result<Vec<u8>, RecordCodecError> {
        Ok(to_canonical_cbor(self)?)
    }

    fn decode_body(version: u32, bytes: &[u8]) -> Result<Self, RecordCodecError> {
        decode_current(Self::KIND, Self::SCHEMA_VERSION, version, bytes)
    }
}

impl RecordCodec for DividendState {
    const KIND: RecordKind = RecordKind::Dividend;
    const SCHEMA_VERSION: u32 = 1;

    fn encode_body(&self) -> Result<Vec<u8>, RecordCodecError> {
        Ok(to_canonical_cbor(self)?)
    }

    fn decode_body(version: u32, bytes: &[u8]) -> Result<Self, RecordCodecError> {
        decode_current(Self::KIND, Self::SCHEMA_VERSION, version, bytes)
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    kind: RecordKind,
    schema_version: u32,
    id: RecordId,
    #[serde(with = "serde_bytes")]
    body: Vec<u8>,
}

fn stored<T: RecordCodec>(id: RecordId, state: &T) -> Result<StoredRecord, RecordCodecError> {
    Ok(StoredRecord {
        kind: T::KIND,
        schema_version: T::SCHEMA_VERSION,
        id,
        body: state.encode_body()?,
    })
}

pub fn encode_record(record: &Record) -> Result<Vec<u8>, RecordCodecError> {
    let stored = match &record.state {
        RecordState::Fund(fund) => stored(record.id, fund)?,
        RecordState::Property(property) => stored(record.id, property)?,
        RecordState::Dividend(dividend) => stored(record.id, dividend)?,
    };
    Ok(to_canonical_cbor(&stored)?)
}

pub fn decode_record(bytes: &[u8]) -> Result<Record, RecordCodecError> {
    let stored: StoredRecord = from_canonical_cbor(bytes)?;
    let version = stored.schema_version;
    let state = match stored.kind {
        RecordKind::Fund => RecordState::Fund(FundState::decode_body(version, &stored.body)?),
        RecordKind::Property => {
            RecordState::Property(PropertyState::decode_body(version, &stored.body)?)
        }
        RecordKind::Dividend => {
            RecordState::Dividend(DividendState::decode_body(version, &stored.body)?)
        }
    };
    Ok(Record::new(stored.id, state))
}

/// Serde adapter that routes a `Record` field through the codec.
pub mod as_stored {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_bytes::ByteBuf;

    use super::{decode_record, encode_record};
    use crate::record::Record;

    pub fn serialize<S: Serializer>(record: &Record, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = encode_record(record).map_err(serde::ser::Error::custom)?;
        serializer.serialize_bytes(&bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Record, D::Error> {
        let buf = ByteBuf::deserialize(deserializer)?;
        decode_record(&buf).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn each_kind_decodes_to_the_same_record() {
        let owner = Identity::from_seed("Owner", [4u8; 32]).party().clone();
        let records = [
            Record::fund(
                RecordId::new(),
                FundState {
                    value: 42,
                    manager: owner.clone(),
                    investors: vec![],
                },
            ),
            Record::property(
                RecordId::new(),
                PropertyState {
                    address: "1 Main St".into(),
                    owner: owner.clone(),
                },
            ),
            Record::dividend(
                RecordId::new(),
                DividendState {
                    amount: 7,
                    fund_id: RecordId::new(),
                    investors: vec![owner],
                },
            ),
        ];
        for record in records {
            let bytes = encode_record(&record).unwrap();
            assert_eq!(decode_record(&bytes).unwrap(), record);
        }
    }

    #[test]
    fn unknown_schema_version_is_refused() {
        let owner = Identity::from_seed("Owner", [4u8; 32]).party().clone();
        let property = PropertyState {
            address: "1 Main St".into(),
            owner,
        };
        let stored = StoredRecord {
            kind: RecordKind::Property,
            schema_version: 99,
            id: RecordId::new(),
            body: property.encode_body().unwrap(),
        };
        let bytes = to_canonical_cbor(&stored).unwrap();
        match decode_record(&bytes) {
            Err(RecordCodecError::UnsupportedVersion { kind, version }) => {
                assert_eq!(kind, RecordKind::Property);
                assert_eq!(version, 99);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
