use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Human-facing party name as it appears in requests ("PartyA", "Notary").
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyName(String);

impl PartyName {
    pub fn new(name: impl Into<String>) -> Self {
        PartyName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartyName {
    fn from(value: &str) -> Self {
        PartyName(value.to_string())
    }
}

impl From<String> for PartyName {
    fn from(value: String) -> Self {
        PartyName(value)
    }
}

/// ed25519 verifying key bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PublicKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify `signature` over `message`. Malformed keys never verify.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        verifying_key.verify(message, &signature).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut buf = [0u8; 32];
        hex::decode_to_slice(s, &mut buf)?;
        Ok(PublicKey(buf))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Detached ed25519 signature bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Signature(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut buf = [0u8; 64];
        hex::decode_to_slice(&s, &mut buf).map_err(serde::de::Error::custom)?;
        Ok(Signature(buf))
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid key hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A network identity: well-known name plus owning key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    pub name: PartyName,
    pub key: PublicKey,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

/// A party together with its private signing key. Only ever held by the node
/// that owns it.
#[derive(Clone)]
pub struct Identity {
    party: Party,
    signing_key: SigningKey,
}

impl Identity {
    /// Fresh identity backed by a key from the OS RNG.
    pub fn generate(name: impl Into<PartyName>) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(name.into(), signing_key)
    }

    /// Restore an identity from its 32-byte secret seed.
    pub fn from_seed(name: impl Into<PartyName>, seed: [u8; 32]) -> Self {
        Self::from_signing_key(name.into(), SigningKey::from_bytes(&seed))
    }

    fn from_signing_key(name: PartyName, signing_key: SigningKey) -> Self {
        let key = PublicKey(signing_key.verifying_key().to_bytes());
        Self {
            party: Party { name, key },
            signing_key,
        }
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn name(&self) -> &PartyName {
        &self.party.name
    }

    pub fn public_key(&self) -> PublicKey {
        self.party.key
    }

    /// Secret seed, for persisting dev identities.
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity").field("party", &self.party).finish_non_exhaustive()
    }
}
