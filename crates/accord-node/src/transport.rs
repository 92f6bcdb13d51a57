//! Messaging seam between parties, with an in-process implementation.
//!
//! Delivery is assumed reliable and authenticated: the `from` party on a
//! message is trusted to be the sender.

use std::collections::BTreeMap;
use std::sync::RwLock;

use accord_notary::{NotaryError, NotaryHandle};
use accord_types::{Party, PartyName, SignedTransaction, TransactionSignature, TxId};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::TransportError;

/// A counterparty's answer to a signature request.
#[derive(Debug, Clone)]
pub enum SignReply {
    Signed(TransactionSignature),
    Rejected(String),
}

/// Messages delivered to a node's inbox.
#[derive(Debug)]
pub enum PeerMessage {
    SignRequest {
        from: Party,
        envelope: SignedTransaction,
        resp: oneshot::Sender<SignReply>,
    },
    Commit {
        envelope: SignedTransaction,
        resp: oneshot::Sender<Result<(), String>>,
    },
    Aborted {
        from: Party,
        tx_id: TxId,
        reason: String,
    },
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request_signature(
        &self,
        from: &Party,
        to: &Party,
        envelope: SignedTransaction,
    ) -> Result<SignReply, TransportError>;

    async fn notarise(&self, envelope: SignedTransaction) -> Result<SignedTransaction, NotaryError>;

    async fn deliver_commit(
        &self,
        to: &Party,
        envelope: SignedTransaction,
    ) -> Result<(), TransportError>;

    async fn notify_abort(
        &self,
        from: &Party,
        to: &Party,
        tx_id: TxId,
        reason: String,
    ) -> Result<(), TransportError>;
}

/// Routes messages to node inboxes over tokio channels and forwards
/// notarisation to a [`NotaryHandle`].
#[derive(Debug)]
pub struct InProcessNetwork {
    inboxes: RwLock<BTreeMap<PartyName, mpsc::Sender<PeerMessage>>>,
    notary: NotaryHandle,
}

impl InProcessNetwork {
    pub fn new(notary: NotaryHandle) -> Self {
        Self {
            inboxes: RwLock::new(BTreeMap::new()),
            notary,
        }
    }

    /// Register `party` and return the receiving end of its inbox. A second
    /// connect for the same name replaces the first.
    pub fn connect(&self, party: &Party, capacity: usize) -> mpsc::Receiver<PeerMessage> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.inboxes
            .write()
            .unwrap()
            .insert(party.name.clone(), tx);
        rx
    }

    pub fn disconnect(&self, party: &PartyName) {
        self.inboxes.write().unwrap().remove(party);
    }

    fn inbox(&self, party: &Party) -> Result<mpsc::Sender<PeerMessage>, TransportError> {
        self.inboxes
            .read()
            .unwrap()
            .get(&party.name)
            .cloned()
            .ok_or_else(|| TransportError::UnknownPeer(party.name.clone()))
    }

    async fn send(&self, to: &Party, message: PeerMessage) -> Result<(), TransportError> {
        self.inbox(to)?
            .send(message)
            .await
            .map_err(|_| TransportError::Disconnected(to.name.clone()))
    }
}

#[async_trait]
impl Transport for InProcessNetwork {
    async fn request_signature(
        &self,
        from: &Party,
        to: &Party,
        envelope: SignedTransaction,
    ) -> Result<SignReply, TransportError> {
        let (resp, rx) = oneshot::channel();
        self.send(
            to,
            PeerMessage::SignRequest {
                from: from.clone(),
                envelope,
                resp,
            },
        )
        .await?;
        rx.await
            .map_err(|_| TransportError::Disconnected(to.name.clone()))
    }

    async fn notarise(&self, envelope: SignedTransaction) -> Result<SignedTransaction, NotaryError> {
        self.notary.notarise(envelope).await
    }

    async fn deliver_commit(
        &self,
        to: &Party,
        envelope: SignedTransaction,
    ) -> Result<(), TransportError> {
        let (resp, rx) = oneshot::channel();
        self.send(to, PeerMessage::Commit { envelope, resp }).await?;
        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(TransportError::Refused {
                party: to.name.clone(),
                reason,
            }),
            Err(_) => Err(TransportError::Disconnected(to.name.clone())),
        }
    }

    async fn notify_abort(
        &self,
        from: &Party,
        to: &Party,
        tx_id: TxId,
        reason: String,
    ) -> Result<(), TransportError> {
        self.send(
            to,
            PeerMessage::Aborted {
                from: from.clone(),
                tx_id,
                reason,
            },
        )
        .await
    }
}
