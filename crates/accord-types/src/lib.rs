//! Shared data model: parties and keys, versioned records, commands, proposals
//! and the signature envelope that carries a proposal through agreement.

pub mod codec;
pub mod command;
pub mod identity;
pub mod query;
pub mod record;
pub mod transaction;

pub use codec::{RecordCodec, RecordCodecError, decode_record, encode_record};
pub use command::{Command, DividendAction, FundAction, PropertyAction};
pub use identity::{Identity, KeyError, Party, PartyName, PublicKey, Signature};
pub use query::{FieldFilter, FieldValue, RecordQuery};
pub use record::{
    DividendState, FundState, PropertyState, Record, RecordId, RecordKind, RecordRef,
    RecordState, StateAndRef,
};
pub use transaction::{
    EnvelopeStatus, Proposal, SignatureError, SignedTransaction, TransactionSignature, TxId,
};
