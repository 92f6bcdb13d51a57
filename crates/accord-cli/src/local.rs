//! The persistent local network behind every command: `network.json`, one
//! key seed per party and a journal-backed ledger per party, plus the
//! notary's consumed-set journal.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use accord_node::{InProcessNetwork, NetworkMap, Node, NodeConfig};
use accord_notary::{JournalConsumed, Notary, NotaryService};
use accord_store::FsLedger;
use accord_types::{Identity, PartyName};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::opts::NetOpts;

/// Contents of `network.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub notary: PartyName,
    pub parties: Vec<PartyName>,
}

impl NetworkConfig {
    pub fn load(opts: &NetOpts) -> Result<Self> {
        opts.ensure_initialised()?;
        let path = opts.network_file();
        let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn save(&self, opts: &NetOpts) -> Result<()> {
        let path = opts.network_file();
        let json = serde_json::to_string_pretty(self).context("serialize network config")?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))
    }

    pub fn all_names(&self) -> impl Iterator<Item = &PartyName> {
        self.parties.iter().chain([&self.notary])
    }
}

pub fn write_seed(keys_dir: &Path, identity: &Identity) -> Result<()> {
    let path = keys_dir.join(format!("{}.seed", identity.name()));
    fs::write(&path, hex::encode(identity.seed()))
        .with_context(|| format!("write {}", path.display()))
}

pub fn read_identity(keys_dir: &Path, name: &PartyName) -> Result<Identity> {
    let path = keys_dir.join(format!("{name}.seed"));
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let bytes = hex::decode(text.trim()).with_context(|| format!("decode {}", path.display()))?;
    let seed: [u8; 32] = match bytes.try_into() {
        Ok(seed) => seed,
        Err(bytes) => bail!("{} holds {} bytes, expected 32", path.display(), bytes.len()),
    };
    Ok(Identity::from_seed(name.clone(), seed))
}

/// Every party's node, live for the duration of one command.
pub struct LocalNetwork {
    nodes: BTreeMap<PartyName, Node>,
    tasks: Vec<JoinHandle<()>>,
}

impl LocalNetwork {
    /// Must be called from within the tokio runtime.
    pub fn open(opts: &NetOpts) -> Result<Self> {
        let config = NetworkConfig::load(opts)?;
        let node_config = NodeConfig::from_env().context("node configuration")?;
        let keys = opts.keys_dir();

        let notary_id = read_identity(&keys, &config.notary)?;
        let consumed = JournalConsumed::open(&opts.data_dir).context("open notary journal")?;
        let (notary, notary_task) = NotaryService::spawn(
            Notary::new(notary_id.clone(), Box::new(consumed)),
            node_config.inbox_capacity,
        );

        let identities = config
            .parties
            .iter()
            .map(|name| read_identity(&keys, name))
            .collect::<Result<Vec<_>>>()?;
        let map = NetworkMap::new(
            notary_id.party().clone(),
            identities
                .iter()
                .map(|id| id.party().clone())
                .chain([notary_id.party().clone()]),
        );
        let transport = Arc::new(InProcessNetwork::new(notary));

        let mut tasks = vec![notary_task];
        let mut nodes = BTreeMap::new();
        for identity in identities {
            let name = identity.name().clone();
            let ledger = FsLedger::open(opts.party_dir(&name), identity.party().clone())
                .with_context(|| format!("open ledger for {name}"))?;
            let inbox = transport.connect(identity.party(), node_config.inbox_capacity);
            let node = Node::new(
                identity,
                map.clone(),
                Arc::new(ledger),
                transport.clone(),
                node_config.clone(),
            );
            tasks.push(node.serve(inbox));
            nodes.insert(name, node);
        }
        tracing::debug!(parties = nodes.len(), data_dir = %opts.data_dir.display(), "local network up");
        Ok(Self { nodes, tasks })
    }

    pub fn node(&self, name: &PartyName) -> Result<&Node> {
        match self.nodes.get(name) {
            Some(node) => Ok(node),
            None => bail!("{name} is not a party of this network"),
        }
    }
}

impl Drop for LocalNetwork {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
