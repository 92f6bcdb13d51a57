//! Read-only subcommands. None of these run the agreement protocol.

use accord_types::{FieldFilter, RecordKind, StateAndRef, TxId};
use anyhow::{Result, bail};
use clap::Args;
use serde_json::{Value, json};

use crate::local::LocalNetwork;
use crate::opts::NetOpts;
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Record kind: fund, property or dividend
    pub kind: RecordKind,

    /// Column filter, e.g. investors=Bob or value=1000
    #[arg(long = "where")]
    pub filter: Option<FieldFilter>,

    /// Only funds the acting party manages
    #[arg(long)]
    pub mine: bool,
}

#[derive(Args, Debug)]
pub struct TxArgs {
    /// Transaction id (hex)
    pub tx_id: TxId,
}

pub async fn cmd_list(opts: &NetOpts, args: &ListArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let states = if args.mine {
        if args.kind != RecordKind::Fund || args.filter.is_some() {
            bail!("--mine lists funds only and takes no --where filter");
        }
        node.my_funds()?
    } else {
        node.list_unconsumed(args.kind, args.filter.clone())?
    };
    print_success(opts, states_json(&states)?, Vec::new())
}

pub async fn cmd_peers(opts: &NetOpts) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let peers: Vec<Value> = node
        .peers()
        .iter()
        .map(|peer| json!({ "name": peer.name, "key": peer.key.to_hex() }))
        .collect();
    let data = json!({
        "me": node.whoami().name,
        "notary": node.notary().name,
        "peers": peers,
    });
    print_success(opts, data, Vec::new())
}

pub async fn cmd_history(opts: &NetOpts) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let history = node.history()?;
    print_success(opts, serde_json::to_value(&history)?, Vec::new())
}

pub async fn cmd_tx(opts: &NetOpts, args: &TxArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    match node.transaction(&args.tx_id)? {
        Some(envelope) => print_success(opts, serde_json::to_value(&envelope)?, Vec::new()),
        None => bail!("no transaction {} in this party's ledger", args.tx_id),
    }
}

fn states_json(states: &[StateAndRef]) -> Result<Value> {
    let rows = states
        .iter()
        .map(|state| -> Result<Value> {
            Ok(json!({
                "ref": state.reference.to_string(),
                "id": state.record.id,
                "record": serde_json::to_value(&state.record.state)?,
            }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(rows))
}
