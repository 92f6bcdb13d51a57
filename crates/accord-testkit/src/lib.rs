//! In-process networks of nodes for exercising whole agreement flows.
//!
//! `TestNetwork` wires a notary service, an [`InProcessNetwork`] and one
//! [`Node`] per named party over in-memory ledgers. Identities are derived
//! from party names, so keys are stable across runs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use accord_node::{
    InProcessNetwork, NetworkMap, Node, NodeConfig, Responder, Review, ReviewContext,
    VerifyingResponder,
};
use accord_notary::{Notary, NotaryHandle, NotaryService};
use accord_store::MemLedger;
use accord_types::{Identity, Party, PartyName, SignedTransaction};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

pub const NOTARY: &str = "Notary";

/// Deterministic identity for `name`.
pub fn identity(name: &str) -> Identity {
    let seed: [u8; 32] = Sha256::digest(name.as_bytes()).into();
    Identity::from_seed(name, seed)
}

/// Config with timeouts short enough for tests that expect them to fire.
pub fn quick_config() -> NodeConfig {
    NodeConfig {
        counterparty_timeout: Duration::from_millis(300),
        notary_timeout: Duration::from_secs(2),
        inbox_capacity: 16,
        ..NodeConfig::default()
    }
}

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestNetwork {
    network: NetworkMap,
    transport: Arc<InProcessNetwork>,
    notary: NotaryHandle,
    nodes: BTreeMap<PartyName, Node>,
    tasks: Vec<JoinHandle<()>>,
}

impl TestNetwork {
    /// Must be called from within a tokio runtime.
    pub fn new(names: &[&str]) -> Self {
        Self::with_config(names, NodeConfig::default())
    }

    pub fn with_config(names: &[&str], config: NodeConfig) -> Self {
        init_tracing();
        let notary_id = identity(NOTARY);
        let (notary, notary_task) =
            NotaryService::spawn(Notary::in_memory(notary_id.clone()), config.inbox_capacity);
        let identities: Vec<Identity> = names.iter().map(|name| identity(name)).collect();
        let network = NetworkMap::new(
            notary_id.party().clone(),
            identities
                .iter()
                .map(|id| id.party().clone())
                .chain([notary_id.party().clone()]),
        );
        let transport = Arc::new(InProcessNetwork::new(notary.clone()));

        let mut tasks = vec![notary_task];
        let mut nodes = BTreeMap::new();
        for id in identities {
            let inbox = transport.connect(id.party(), config.inbox_capacity);
            let ledger = Arc::new(MemLedger::new(id.party().clone()));
            let name = id.name().clone();
            let node = Node::new(id, network.clone(), ledger, transport.clone(), config.clone());
            tasks.push(node.serve(inbox));
            nodes.insert(name, node);
        }
        Self {
            network,
            transport,
            notary,
            nodes,
            tasks,
        }
    }

    /// The node for `name`. Panics on an unknown name.
    pub fn node(&self, name: &str) -> &Node {
        self.nodes
            .get(&PartyName::from(name))
            .unwrap_or_else(|| panic!("no node named {name}"))
    }

    pub fn party(&self, name: &str) -> Party {
        self.node(name).whoami().clone()
    }

    pub fn network(&self) -> &NetworkMap {
        &self.network
    }

    pub fn transport(&self) -> Arc<InProcessNetwork> {
        self.transport.clone()
    }

    pub fn notary(&self) -> &NotaryHandle {
        &self.notary
    }

    /// Take `name` off the network; messages to it fail from now on.
    pub fn disconnect(&self, name: &str) {
        self.transport.disconnect(&PartyName::from(name));
    }
}

impl Drop for TestNetwork {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Refuses every signature request.
#[derive(Debug, Clone)]
pub struct AlwaysReject(pub String);

impl Responder for AlwaysReject {
    fn review(&self, _: &ReviewContext<'_>, _: &Party, _: &SignedTransaction) -> Review {
        Review::Reject(self.0.clone())
    }
}

/// Never answers, leaving the initiator to time out.
#[derive(Debug, Clone, Copy)]
pub struct NeverRespond;

impl Responder for NeverRespond {
    fn review(&self, _: &ReviewContext<'_>, _: &Party, _: &SignedTransaction) -> Review {
        Review::Withhold
    }
}

/// Verifies normally and counts how many requests it has seen.
#[derive(Debug, Default)]
pub struct CountingResponder {
    seen: AtomicUsize,
}

impl CountingResponder {
    pub fn seen(&self) -> usize {
        self.seen.load(Ordering::SeqCst)
    }
}

impl Responder for CountingResponder {
    fn review(&self, ctx: &ReviewContext<'_>, from: &Party, envelope: &SignedTransaction) -> Review {
        self.seen.fetch_add(1, Ordering::SeqCst);
        VerifyingResponder.review(ctx, from, envelope)
    }
}
