//! Property subcommands.

use accord_types::{PartyName, RecordId};
use anyhow::Result;
use clap::Args;

use super::fund::committed;
use crate::local::LocalNetwork;
use crate::opts::NetOpts;

#[derive(Args, Debug)]
pub struct RegisterPropertyArgs {
    /// Street address
    pub address: String,

    /// Managing party (defaults to the acting party)
    #[arg(long)]
    pub manager: Option<String>,
}

#[derive(Args, Debug)]
pub struct TransferPropertyArgs {
    /// Property id
    pub property: RecordId,

    /// New managing party
    #[arg(long)]
    pub to: String,
}

#[derive(Args, Debug)]
pub struct DeregisterPropertyArgs {
    /// Property id
    pub property: RecordId,
}

pub async fn cmd_register_property(opts: &NetOpts, args: &RegisterPropertyArgs) -> Result<()> {
    let me = opts.acting_party()?;
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&me)?;
    let manager = args
        .manager
        .as_deref()
        .map(|name| PartyName::from(name.trim()))
        .unwrap_or(me);
    let tx_id = node.register_property(&args.address, &manager).await?;
    committed(opts, "registered property", tx_id)
}

pub async fn cmd_transfer_property(opts: &NetOpts, args: &TransferPropertyArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let tx_id = node
        .transfer_property(args.property, &PartyName::from(args.to.trim()))
        .await?;
    committed(opts, "transferred property", tx_id)
}

pub async fn cmd_deregister_property(opts: &NetOpts, args: &DeregisterPropertyArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let tx_id = node.deregister_property(args.property).await?;
    committed(opts, "deregistered property", tx_id)
}
