//! Fund subcommands: issue, change investor, amend, cancel, pay dividend.

use accord_types::{PartyName, RecordId, TxId};
use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::local::LocalNetwork;
use crate::opts::NetOpts;
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct IssueFundArgs {
    /// Fund value
    #[arg(long, allow_negative_numbers = true)]
    pub value: i64,

    /// Investor party names (repeat or comma-separate)
    #[arg(long = "investor", value_delimiter = ',', required = true)]
    pub investors: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ChangeInvestorArgs {
    /// Fund id
    pub fund: RecordId,

    /// Investor being replaced
    #[arg(long)]
    pub from: String,

    /// Incoming investor
    #[arg(long)]
    pub to: String,
}

#[derive(Args, Debug)]
pub struct AmendFundArgs {
    /// Fund id
    pub fund: RecordId,

    /// New fund value
    #[arg(long, allow_negative_numbers = true)]
    pub value: i64,
}

#[derive(Args, Debug)]
pub struct CancelFundArgs {
    /// Fund id
    pub fund: RecordId,
}

#[derive(Args, Debug)]
pub struct PayDividendArgs {
    /// Fund id
    pub fund: RecordId,

    /// Amount paid to each investor
    #[arg(long, allow_negative_numbers = true)]
    pub amount: i64,
}

pub async fn cmd_issue_fund(opts: &NetOpts, args: &IssueFundArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let investors: Vec<PartyName> = args
        .investors
        .iter()
        .map(|name| PartyName::from(name.trim()))
        .collect();
    let tx_id = node.issue_fund(args.value, &investors).await?;
    committed(opts, "issued fund", tx_id)
}

pub async fn cmd_change_investor(opts: &NetOpts, args: &ChangeInvestorArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let tx_id = node
        .change_fund_investor(
            &PartyName::from(args.from.trim()),
            &PartyName::from(args.to.trim()),
            args.fund,
        )
        .await?;
    committed(opts, "changed investor", tx_id)
}

pub async fn cmd_amend_fund(opts: &NetOpts, args: &AmendFundArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let tx_id = node.amend_fund(args.fund, args.value).await?;
    committed(opts, "amended fund", tx_id)
}

pub async fn cmd_cancel_fund(opts: &NetOpts, args: &CancelFundArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let tx_id = node.cancel_fund(args.fund).await?;
    committed(opts, "cancelled fund", tx_id)
}

pub async fn cmd_pay_dividend(opts: &NetOpts, args: &PayDividendArgs) -> Result<()> {
    let net = LocalNetwork::open(opts)?;
    let node = net.node(&opts.acting_party()?)?;
    let tx_id = node.pay_dividend(args.amount, args.fund).await?;
    committed(opts, "paid dividend", tx_id)
}

pub(crate) fn committed(opts: &NetOpts, what: &str, tx_id: TxId) -> Result<()> {
    let data = if opts.json || opts.pretty {
        json!({ "tx_id": tx_id.to_hex() })
    } else {
        json!(format!("{what}: committed {tx_id}"))
    };
    print_success(opts, data, Vec::new())
}
