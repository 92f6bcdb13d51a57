//! A party's node: builds proposals, runs the agreement flow as initiator,
//! answers signature requests as a counterparty and records commits.

pub mod builder;
pub mod config;
mod error;
pub mod flow;
pub mod network;
mod node;
pub mod responder;
pub mod transport;

pub use builder::TransactionBuilder;
pub use config::{AcceptancePolicy, ConfigError, NodeConfig};
pub use error::{FlowError, TransportError};
pub use flow::{FlowHandle, FlowOutcome, FlowState, FlowStep};
pub use network::NetworkMap;
pub use node::{LedgerUpdate, Node};
pub use responder::{Responder, Review, ReviewContext, VerifyingResponder};
pub use transport::{InProcessNetwork, PeerMessage, SignReply, Transport};
