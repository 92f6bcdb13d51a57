use accord_types::SignedTransaction;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{Notary, NotaryError};

/// One queued notarisation.
#[derive(Debug)]
pub struct NotaryRequest {
    pub envelope: SignedTransaction,
    pub resp: oneshot::Sender<Result<SignedTransaction, NotaryError>>,
}

/// Single task owning the notary; requests are handled strictly one at a time
/// in arrival order.
pub struct NotaryService {
    notary: Notary,
    rx: mpsc::Receiver<NotaryRequest>,
}

impl NotaryService {
    pub fn spawn(notary: Notary, capacity: usize) -> (NotaryHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let party = notary.party().clone();
        let service = Self { notary, rx };
        let task = tokio::spawn(service.run());
        (NotaryHandle { tx, party }, task)
    }

    async fn run(mut self) {
        tracing::info!(notary = %self.notary.party(), "notary service started");
        while let Some(request) = self.rx.recv().await {
            let result = self.notary.notarise(&request.envelope);
            if let Err(err) = &result {
                tracing::debug!(tx_id = %request.envelope.id, %err, "notarisation refused");
            }
            if request.resp.send(result).is_err() {
                tracing::debug!(tx_id = %request.envelope.id, "requester went away");
            }
        }
        tracing::info!(notary = %self.notary.party(), "notary service stopped");
    }
}

/// Cloneable client side of a [`NotaryService`].
#[derive(Clone, Debug)]
pub struct NotaryHandle {
    tx: mpsc::Sender<NotaryRequest>,
    party: accord_types::Party,
}

impl NotaryHandle {
    pub fn party(&self) -> &accord_types::Party {
        &self.party
    }

    pub async fn notarise(
        &self,
        envelope: SignedTransaction,
    ) -> Result<SignedTransaction, NotaryError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(NotaryRequest { envelope, resp })
            .await
            .map_err(|_| NotaryError::Unavailable)?;
        rx.await.map_err(|_| NotaryError::Unavailable)?
    }
}
