//! The agreement protocol, run by the initiating party.
//!
//! A flow walks `Built -> LocallyVerified -> LocallySigned ->
//! AwaitingCounterpartySignatures -> FullySigned -> AwaitingNotary ->
//! Committed`, or drops into `Aborted` from any non-terminal step. Nothing is
//! written to any ledger before the notary has stamped the envelope, so an
//! aborted flow leaves no trace beyond its own state.

use std::sync::Arc;

use accord_notary::NotaryError;
use accord_types::{Command, Party, PartyName, Proposal, SignedTransaction, TxId};
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::node::NodeInner;
use crate::transport::SignReply;
use crate::FlowError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowStep {
    Built,
    LocallyVerified,
    LocallySigned,
    AwaitingCounterpartySignatures,
    FullySigned,
    AwaitingNotary,
    Committed,
    Aborted,
}

impl FlowStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowStep::Committed | FlowStep::Aborted)
    }

    pub fn can_advance_to(self, next: FlowStep) -> bool {
        use FlowStep::*;
        match (self, next) {
            (from, Aborted) => !from.is_terminal(),
            (Built, LocallyVerified)
            | (LocallyVerified, LocallySigned)
            | (LocallySigned, AwaitingCounterpartySignatures)
            | (AwaitingCounterpartySignatures, FullySigned)
            | (FullySigned, AwaitingNotary)
            | (AwaitingNotary, Committed) => true,
            _ => false,
        }
    }

    /// Abort requests are honoured only before the envelope reaches the notary.
    pub fn abortable(self) -> bool {
        !self.is_terminal() && self != FlowStep::AwaitingNotary
    }
}

/// Observable state of one flow instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    pub tx_id: TxId,
    pub command: Command,
    pub step: FlowStep,
    pub counterparties: Vec<PartyName>,
    pub signed: Vec<PartyName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a committed flow.
#[derive(Clone, Debug)]
pub struct FlowOutcome {
    pub tx_id: TxId,
    pub envelope: SignedTransaction,
    /// Recipients whose ledgers could not be updated after notarisation.
    pub undelivered: Vec<PartyName>,
}

/// Handle to a running flow.
#[derive(Debug)]
pub struct FlowHandle {
    tx_id: TxId,
    state: watch::Receiver<FlowState>,
    abort: watch::Sender<bool>,
    task: JoinHandle<Result<FlowOutcome, FlowError>>,
}

impl FlowHandle {
    pub fn tx_id(&self) -> TxId {
        self.tx_id
    }

    pub fn step(&self) -> FlowStep {
        self.state.borrow().step
    }

    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state.
    pub fn watch(&self) -> watch::Receiver<FlowState> {
        self.state.clone()
    }

    /// Ask the flow to stop. Has no effect once the envelope is with the notary.
    pub fn abort(&self) {
        let _ = self.abort.send(true);
    }

    pub async fn outcome(self) -> Result<FlowOutcome, FlowError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(FlowError::Aborted(format!("flow task failed: {err}"))),
        }
    }
}

pub(crate) fn start(node: Arc<NodeInner>, proposal: Proposal) -> Result<FlowHandle, FlowError> {
    let envelope = SignedTransaction::new(proposal)?;
    let tx_id = envelope.id;
    let initial = FlowState {
        tx_id,
        command: envelope.tx.command,
        step: FlowStep::Built,
        counterparties: Vec::new(),
        signed: Vec::new(),
        error: None,
    };
    let (state_tx, state_rx) = watch::channel(initial);
    let (abort_tx, abort_rx) = watch::channel(false);
    let flow = Flow {
        node,
        state: state_tx,
        abort: abort_rx,
        contacted: Vec::new(),
    };
    let task = tokio::spawn(flow.run(envelope));
    Ok(FlowHandle {
        tx_id,
        state: state_rx,
        abort: abort_tx,
        task,
    })
}

struct Flow {
    node: Arc<NodeInner>,
    state: watch::Sender<FlowState>,
    abort: watch::Receiver<bool>,
    contacted: Vec<Party>,
}

impl Flow {
    async fn run(mut self, envelope: SignedTransaction) -> Result<FlowOutcome, FlowError> {
        let tx_id = envelope.id;
        match self.drive(envelope).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.fail(tx_id, &err).await;
                Err(err)
            }
        }
    }

    async fn drive(&mut self, mut envelope: SignedTransaction) -> Result<FlowOutcome, FlowError> {
        let me = self.node.identity.party().clone();
        tracing::debug!(tx_id = %envelope.id, party = %me, command = %envelope.tx.command, "flow started");

        accord_contracts::verify_proposal(&envelope.tx)?;
        self.advance(FlowStep::LocallyVerified)?;
        self.check_abort()?;

        envelope.sign_with(&self.node.identity);
        self.advance(FlowStep::LocallySigned)?;
        self.check_abort()?;

        let counterparties = envelope
            .tx
            .required_signers
            .iter()
            .filter(|key| **key != me.key)
            .map(|key| self.node.network.by_key(key))
            .collect::<Result<Vec<_>, _>>()?;
        self.state.send_modify(|state| {
            state.counterparties = counterparties.iter().map(|p| p.name.clone()).collect();
        });
        self.advance(FlowStep::AwaitingCounterpartySignatures)?;
        self.contacted = counterparties.clone();
        self.collect_signatures(&mut envelope, &counterparties).await?;

        envelope.verify_required_signatures()?;
        self.advance(FlowStep::FullySigned)?;
        self.check_abort()?;

        self.advance(FlowStep::AwaitingNotary)?;
        let notary = self.node.network.notary().clone();
        let notarised = match timeout(
            self.node.config.notary_timeout,
            self.node.transport.notarise(envelope),
        )
        .await
        {
            Err(_) => {
                return Err(FlowError::ProtocolTimeout {
                    stage: "notarisation",
                    party: notary.name,
                });
            }
            Ok(Err(NotaryError::Conflict(refs))) => return Err(FlowError::NotarizationConflict(refs)),
            Ok(Err(err)) => return Err(FlowError::NotaryRejected(err.to_string())),
            Ok(Ok(notarised)) => notarised,
        };
        notarised.verify_notarised()?;
        // Finalised: from here on failures are reported, never rolled back.
        self.contacted.clear();

        let undelivered = self.broadcast(&me, &notarised).await;
        self.advance(FlowStep::Committed)?;
        tracing::info!(
            tx_id = %notarised.id,
            party = %me,
            command = %notarised.tx.command,
            undelivered = undelivered.len(),
            "transaction committed"
        );
        Ok(FlowOutcome {
            tx_id: notarised.id,
            envelope: notarised,
            undelivered,
        })
    }

    async fn collect_signatures(
        &self,
        envelope: &mut SignedTransaction,
        counterparties: &[Party],
    ) -> Result<(), FlowError> {
        let me = self.node.identity.party();
        let wait = self.node.config.counterparty_timeout;
        let requests = counterparties.iter().map(|party| {
            let transport = self.node.transport.clone();
            let sent = envelope.clone();
            async move {
                match timeout(wait, transport.request_signature(me, party, sent)).await {
                    Err(_) => Err(FlowError::ProtocolTimeout {
                        stage: "counterparty signature",
                        party: party.name.clone(),
                    }),
                    Ok(Err(err)) => Err(FlowError::Transport(err)),
                    Ok(Ok(SignReply::Rejected(reason))) => Err(FlowError::SignatureRejected {
                        party: party.name.clone(),
                        reason,
                    }),
                    Ok(Ok(SignReply::Signed(sig))) if sig.by != party.key => {
                        Err(FlowError::SignatureRejected {
                            party: party.name.clone(),
                            reason: "signed with an unexpected key".into(),
                        })
                    }
                    Ok(Ok(SignReply::Signed(sig))) => Ok((party.name.clone(), sig)),
                }
            }
        });

        let mut abort = self.abort.clone();
        let replies = tokio::select! {
            replies = try_join_all(requests) => replies?,
            _ = abort_requested(&mut abort) => {
                return Err(FlowError::Aborted("aborted by initiator".into()));
            }
        };

        for (party, sig) in replies {
            envelope
                .add_signature(sig)
                .map_err(|err| FlowError::SignatureRejected {
                    party: party.clone(),
                    reason: err.to_string(),
                })?;
            tracing::debug!(tx_id = %envelope.id, %party, "counterparty signed");
            self.state.send_modify(|state| state.signed.push(party));
        }
        Ok(())
    }

    /// Record locally, then hand the envelope to every other implicated party.
    async fn broadcast(&self, me: &Party, envelope: &SignedTransaction) -> Vec<PartyName> {
        let mut undelivered = Vec::new();
        if let Err(err) = self.node.record(envelope) {
            tracing::error!(tx_id = %envelope.id, party = %me, %err, "local commit failed");
            undelivered.push(me.name.clone());
        }

        let recipients: Vec<Party> = envelope
            .tx
            .participants()
            .into_iter()
            .filter(|party| party != me)
            .collect();
        let deliveries = recipients.iter().map(|party| {
            let transport = self.node.transport.clone();
            let sent = envelope.clone();
            async move { (party, transport.deliver_commit(party, sent).await) }
        });
        for (party, result) in join_all(deliveries).await {
            if let Err(err) = result {
                tracing::warn!(tx_id = %envelope.id, party = %party, %err, "commit not delivered");
                undelivered.push(party.name.clone());
            }
        }
        undelivered
    }

    fn advance(&self, next: FlowStep) -> Result<(), FlowError> {
        let current = self.state.borrow().step;
        if !current.can_advance_to(next) {
            return Err(FlowError::Aborted(format!(
                "illegal transition {current:?} -> {next:?}"
            )));
        }
        self.state.send_modify(|state| state.step = next);
        tracing::debug!(tx_id = %self.state.borrow().tx_id, from = ?current, to = ?next, "flow step");
        Ok(())
    }

    fn check_abort(&self) -> Result<(), FlowError> {
        if self.state.borrow().step.abortable() && *self.abort.borrow() {
            return Err(FlowError::Aborted("aborted by initiator".into()));
        }
        Ok(())
    }

    async fn fail(&self, tx_id: TxId, err: &FlowError) {
        let from = self.state.borrow().step;
        self.state.send_modify(|state| {
            if state.step.can_advance_to(FlowStep::Aborted) {
                state.step = FlowStep::Aborted;
            }
            state.error = Some(err.to_string());
        });
        tracing::warn!(%tx_id, from = ?from, error = %err, "flow aborted");

        let me = self.node.identity.party();
        let reason = err.to_string();
        let notices = self.contacted.iter().map(|party| {
            let transport = self.node.transport.clone();
            let reason = reason.clone();
            async move {
                let sent = transport.notify_abort(me, party, tx_id, reason).await;
                (party, sent)
            }
        });
        for (party, result) in join_all(notices).await {
            if let Err(err) = result {
                tracing::debug!(%tx_id, party = %party, %err, "abort notice not delivered");
            }
        }
    }
}

/// Resolves once an abort has been requested; never resolves if the handle
/// is dropped without asking.
async fn abort_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
