use std::sync::{Arc, RwLock};

use accord_store::{DynLedger, HistoryEntry, LedgerError};
use accord_types::{
    Command, FieldFilter, Identity, Party, PartyName, Proposal, RecordId, RecordKind,
    RecordQuery, RecordRef, SignedTransaction, StateAndRef, TxId,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::builder::TransactionBuilder;
use crate::flow::{self, FlowHandle};
use crate::responder::{Responder, Review, ReviewContext, VerifyingResponder};
use crate::transport::{PeerMessage, SignReply, Transport};
use crate::{FlowError, NetworkMap, NodeConfig};

const UPDATE_CAPACITY: usize = 256;

/// Notification published after this node records a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub tx_id: TxId,
    pub command: Command,
    pub consumed: Vec<RecordRef>,
    pub produced: Vec<StateAndRef>,
}

pub(crate) struct NodeInner {
    pub identity: Identity,
    pub network: NetworkMap,
    pub ledger: DynLedger,
    pub transport: Arc<dyn Transport>,
    pub config: NodeConfig,
    responder: RwLock<Arc<dyn Responder>>,
    updates: broadcast::Sender<LedgerUpdate>,
}

impl NodeInner {
    /// Record a notarised envelope in this node's ledger and announce it.
    pub fn record(&self, envelope: &SignedTransaction) -> Result<HistoryEntry, LedgerError> {
        let entry = self.ledger.record_commit(envelope)?;
        let produced = entry
            .produced
            .iter()
            .filter_map(|reference| self.ledger.state(reference).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        let _ = self.updates.send(LedgerUpdate {
            tx_id: entry.tx_id,
            command: entry.command,
            consumed: entry.consumed.clone(),
            produced,
        });
        Ok(entry)
    }

    fn review(&self, from: &Party, envelope: &SignedTransaction) -> Review {
        let responder = self.responder.read().unwrap().clone();
        let ctx = ReviewContext {
            me: self.identity.party(),
            ledger: self.ledger.as_ref(),
            acceptance: &self.config.acceptance,
        };
        responder.review(&ctx, from, envelope)
    }
}

/// One party's node: its identity, ledger and view of the network, plus the
/// external operations that drive agreement flows.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("party", self.inner.identity.party())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub fn new(
        identity: Identity,
        network: NetworkMap,
        ledger: DynLedger,
        transport: Arc<dyn Transport>,
        config: NodeConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            inner: Arc::new(NodeInner {
                identity,
                network,
                ledger,
                transport,
                config,
                responder: RwLock::new(Arc::new(VerifyingResponder)),
                updates,
            }),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn ledger(&self) -> &DynLedger {
        &self.inner.ledger
    }

    /// Replace how this node answers signature requests.
    pub fn set_responder(&self, responder: Arc<dyn Responder>) {
        *self.inner.responder.write().unwrap() = responder;
    }

    /// Handle inbound peer messages until the inbox closes.
    pub fn serve(&self, inbox: mpsc::Receiver<PeerMessage>) -> JoinHandle<()> {
        tokio::spawn(serve_inbox(self.inner.clone(), inbox))
    }

    /// Start an agreement flow for an already built proposal.
    pub fn start_flow(&self, proposal: Proposal) -> Result<FlowHandle, FlowError> {
        flow::start(self.inner.clone(), proposal)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn whoami(&self) -> &Party {
        self.inner.identity.party()
    }

    pub fn peers(&self) -> Vec<Party> {
        self.inner.network.peers(self.whoami())
    }

    pub fn notary(&self) -> &Party {
        self.inner.network.notary()
    }

    fn builder(&self) -> TransactionBuilder<'_> {
        TransactionBuilder::new(
            self.inner.identity.party(),
            &self.inner.network,
            self.inner.ledger.as_ref(),
        )
    }

    async fn run(&self, proposal: Proposal) -> Result<TxId, FlowError> {
        let outcome = self.start_flow(proposal)?.outcome().await?;
        Ok(outcome.tx_id)
    }

    pub async fn issue_fund(&self, value: i64, investors: &[PartyName]) -> Result<TxId, FlowError> {
        if value <= 0 {
            return Err(FlowError::InvalidRequest(format!(
                "fund value must be positive, got {value}"
            )));
        }
        if investors.is_empty() {
            return Err(FlowError::InvalidRequest("at least one investor is required".into()));
        }
        let proposal = self.builder().issue_fund(value, investors)?;
        self.run(proposal).await
    }

    pub async fn change_fund_investor(
        &self,
        current: &PartyName,
        new: &PartyName,
        fund_id: RecordId,
    ) -> Result<TxId, FlowError> {
        require_name("current investor", current)?;
        require_name("new investor", new)?;
        let proposal = self.builder().change_fund_investor(fund_id, current, new)?;
        self.run(proposal).await
    }

    pub async fn amend_fund(&self, fund_id: RecordId, value: i64) -> Result<TxId, FlowError> {
        if value <= 0 {
            return Err(FlowError::InvalidRequest(format!(
                "fund value must be positive, got {value}"
            )));
        }
        let proposal = self.builder().amend_fund(fund_id, value)?;
        self.run(proposal).await
    }

    pub async fn cancel_fund(&self, fund_id: RecordId) -> Result<TxId, FlowError> {
        let proposal = self.builder().cancel_fund(fund_id)?;
        self.run(proposal).await
    }

    pub async fn pay_dividend(&self, amount: i64, fund_id: RecordId) -> Result<TxId, FlowError> {
        if amount <= 0 {
            return Err(FlowError::InvalidRequest(format!(
                "dividend amount must be positive, got {amount}"
            )));
        }
        let proposal = self.builder().pay_dividend(amount, fund_id)?;
        self.run(proposal).await
    }

    pub async fn register_property(
        &self,
        address: &str,
        manager: &PartyName,
    ) -> Result<TxId, FlowError> {
        require_name("manager", manager)?;
        let proposal = self.builder().register_property(address, manager)?;
        self.run(proposal).await
    }

    pub async fn transfer_property(
        &self,
        property_id: RecordId,
        new_manager: &PartyName,
    ) -> Result<TxId, FlowError> {
        require_name("new manager", new_manager)?;
        let proposal = self.builder().transfer_property(property_id, new_manager)?;
        self.run(proposal).await
    }

    pub async fn deregister_property(&self, property_id: RecordId) -> Result<TxId, FlowError> {
        let proposal = self.builder().deregister_property(property_id)?;
        self.run(proposal).await
    }

    /// Unconsumed records of `kind` visible to this party. Bypasses the
    /// protocol entirely.
    pub fn list_unconsumed(
        &self,
        kind: RecordKind,
        filter: Option<FieldFilter>,
    ) -> Result<Vec<StateAndRef>, FlowError> {
        let mut query = RecordQuery::kind(kind);
        if let Some(filter) = filter {
            query = query.with_filter(filter);
        }
        Ok(self.inner.ledger.unconsumed(&query)?)
    }

    /// Funds this party manages.
    pub fn my_funds(&self) -> Result<Vec<StateAndRef>, FlowError> {
        let me = self.whoami().name.to_string();
        self.list_unconsumed(RecordKind::Fund, Some(FieldFilter::new("manager", me)))
    }

    pub fn transaction(&self, tx_id: &TxId) -> Result<Option<SignedTransaction>, FlowError> {
        Ok(self.inner.ledger.transaction(tx_id)?)
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>, FlowError> {
        Ok(self.inner.ledger.history()?)
    }
}

fn require_name(what: &str, name: &PartyName) -> Result<(), FlowError> {
    if name.as_str().trim().is_empty() {
        return Err(FlowError::InvalidRequest(format!("{what} is required")));
    }
    Ok(())
}

async fn serve_inbox(node: Arc<NodeInner>, mut inbox: mpsc::Receiver<PeerMessage>) {
    let me = node.identity.party().clone();
    // Withheld replies stay open; dropping one tells the requester.
    let mut withheld: Vec<oneshot::Sender<SignReply>> = Vec::new();
    tracing::debug!(party = %me, "inbox open");
    while let Some(message) = inbox.recv().await {
        match message {
            PeerMessage::SignRequest {
                from,
                envelope,
                resp,
            } => match node.review(&from, &envelope) {
                Review::Sign => {
                    let mut signed = envelope;
                    let sig = signed.sign_with(&node.identity);
                    tracing::debug!(tx_id = %signed.id, party = %me, initiator = %from, "countersigned");
                    let _ = resp.send(SignReply::Signed(sig));
                }
                Review::Reject(reason) => {
                    tracing::warn!(tx_id = %envelope.id, party = %me, initiator = %from, %reason, "refused to sign");
                    let _ = resp.send(SignReply::Rejected(reason));
                }
                Review::Withhold => withheld.push(resp),
            },
            PeerMessage::Commit { envelope, resp } => {
                let result = node.record(&envelope).map(|entry| {
                    tracing::info!(tx_id = %entry.tx_id, party = %me, seq = entry.seq, "recorded commit");
                });
                if let Err(err) = &result {
                    tracing::warn!(tx_id = %envelope.id, party = %me, %err, "could not record commit");
                }
                let _ = resp.send(result.map_err(|err| err.to_string()));
            }
            PeerMessage::Aborted {
                from,
                tx_id,
                reason,
            } => {
                tracing::warn!(%tx_id, party = %me, initiator = %from, %reason, "counterparty flow aborted");
            }
        }
    }
    tracing::debug!(party = %me, withheld = withheld.len(), "inbox closed");
}
