//! Canonical CBOR helpers and SHA-256 digests shared by every accord crate.
//!
//! Transaction ids, record references and signature preimages are all derived
//! from the canonical encoding produced here, so two parties that build the same
//! proposal independently always agree on its id.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_cbor::{ser::Write as CborWrite, value::Value as CborValue};
use sha2::{Digest as _, Sha256};
use std::{fmt, str::FromStr};

/// Prefix used by the textual form of a digest (`sha256:<64 hex chars>`).
pub const DIGEST_PREFIX: &str = "sha256:";

/// Serialize a value into canonical CBOR bytes.
///
/// The value is first lowered into a `serde_cbor::Value`, whose maps are
/// ordered, so struct field order and hash-map iteration order never leak into
/// the bytes.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    let mut buf = Vec::with_capacity(256);
    write_canonical_cbor(value, &mut buf)?;
    Ok(buf)
}

/// Serialize a value into an arbitrary CBOR writer using canonical settings.
pub fn write_canonical_cbor<T: Serialize, W>(value: &T, writer: W) -> Result<(), serde_cbor::Error>
where
    W: CborWrite,
{
    let canonical_value: CborValue = serde_cbor::value::to_value(value)?;
    let mut serializer = serde_cbor::ser::Serializer::new(writer);
    serializer.self_describe()?;
    canonical_value.serialize(&mut serializer)
}

/// Decode bytes produced by [`to_canonical_cbor`].
pub fn from_canonical_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_cbor::Error> {
    serde_cbor::from_slice(bytes)
}

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest of a value's canonical CBOR encoding.
    pub fn of_cbor<T: Serialize>(value: &T) -> Result<Self, serde_cbor::Error> {
        Ok(Self::of_bytes(&to_canonical_cbor(value)?))
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self::finish(hasher)
    }

    fn finish(hasher: Sha256) -> Self {
        let digest = hasher.finalize();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&digest);
        Digest(arr)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as `sha256:<hex>`.
    pub fn to_hex(&self) -> String {
        format!("{DIGEST_PREFIX}{}", hex::encode(self.0))
    }

    /// Parse the `sha256:`-prefixed form. A bare 64-char hex string is accepted
    /// too, since that is what users copy out of log lines.
    pub fn from_hex_str(s: &str) -> Result<Self, DigestParseError> {
        let rest = s.strip_prefix(DIGEST_PREFIX).unwrap_or(s);
        if rest.len() != 64 {
            return Err(DigestParseError::InvalidLength(rest.len()));
        }
        let mut buf = [0u8; 32];
        hex::decode_to_slice(rest, &mut buf)?;
        Ok(Digest(buf))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DigestLengthError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| DigestLengthError(bytes.len()))?;
        Ok(Digest(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Digest::from_hex_str(s)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(value: [u8; 32]) -> Self {
        Digest(value)
    }
}

impl From<Digest> for [u8; 32] {
    fn from(value: Digest) -> Self {
        value.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Digests travel as their textual form in JSON (CLI output, network.json) and
// as the same string in CBOR, so a digest reads identically everywhere.
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a digest string is malformed.
#[derive(Debug, thiserror::Error)]
pub enum DigestParseError {
    #[error("digest hex length must be 64, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Error returned when building a digest from the wrong number of bytes.
#[derive(Debug, thiserror::Error)]
#[error("digest must be 32 bytes, got {0}")]
pub struct DigestLengthError(pub usize);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Fund {
        value: i64,
        manager: String,
    }

    #[test]
    fn map_order_does_not_change_the_digest() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for (k, v) in [("alice", 1), ("bob", 2), ("carol", 3)] {
            a.insert(k.to_string(), v);
        }
        for (k, v) in [("carol", 3), ("alice", 1), ("bob", 2)] {
            b.insert(k.to_string(), v);
        }
        assert_eq!(Digest::of_cbor(&a).unwrap(), Digest::of_cbor(&b).unwrap());
    }

    #[test]
    fn canonical_bytes_decode_back() {
        let fund = Fund {
            value: 1000,
            manager: "PartyA".into(),
        };
        let bytes = to_canonical_cbor(&fund).unwrap();
        let decoded: Fund = from_canonical_cbor(&bytes).unwrap();
        assert_eq!(fund, decoded);
    }

    #[test]
    fn parse_accepts_prefixed_and_bare_forms() {
        let prefixed = "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        let digest: Digest = prefixed.parse().expect("parse");
        assert_eq!(digest.to_hex(), prefixed);
        let bare: Digest = prefixed[DIGEST_PREFIX.len()..].parse().expect("parse bare");
        assert_eq!(digest, bare);
        assert!(Digest::from_hex_str("sha256:0123").is_err());
        assert!(Digest::from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn serde_uses_text_form() {
        let digest = Digest::of_bytes(b"tx");
        let value = serde_json::to_value(digest).unwrap();
        assert_eq!(value, json!(digest.to_hex()));
        let back: Digest = serde_json::from_value(value).unwrap();
        assert_eq!(back, digest);
    }
}
