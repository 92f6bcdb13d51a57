mod commands;
mod local;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::fund::{
    AmendFundArgs, CancelFundArgs, ChangeInvestorArgs, IssueFundArgs, PayDividendArgs,
};
use commands::init::InitArgs;
use commands::property::{DeregisterPropertyArgs, RegisterPropertyArgs, TransferPropertyArgs};
use commands::query::{ListArgs, TxArgs};
use opts::NetOpts;

#[derive(Parser, Debug)]
#[command(name = "accord", version, about = "Multi-party fund and property ledger")]
struct Cli {
    #[command(flatten)]
    opts: NetOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a network of parties and a notary in the data directory
    Init(InitArgs),

    /// Issue a fund managed by the acting party
    IssueFund(IssueFundArgs),

    /// Replace one investor of a fund with another
    ChangeInvestor(ChangeInvestorArgs),

    /// Change a fund's value
    AmendFund(AmendFundArgs),

    /// Cancel a fund
    CancelFund(CancelFundArgs),

    /// Pay a dividend to every investor of a fund
    PayDividend(PayDividendArgs),

    /// Register a property
    RegisterProperty(RegisterPropertyArgs),

    /// Hand a property to a new manager
    TransferProperty(TransferPropertyArgs),

    /// Remove a property from the ledger
    DeregisterProperty(DeregisterPropertyArgs),

    /// List unconsumed records visible to the acting party
    List(ListArgs),

    /// Show the acting party, its peers and the notary
    Peers,

    /// Show the acting party's commit history
    History,

    /// Show a committed transaction
    Tx(TxArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = &cli.opts;

    match cli.command {
        Command::Init(args) => commands::init::cmd_init(opts, &args),
        Command::IssueFund(args) => commands::fund::cmd_issue_fund(opts, &args).await,
        Command::ChangeInvestor(args) => commands::fund::cmd_change_investor(opts, &args).await,
        Command::AmendFund(args) => commands::fund::cmd_amend_fund(opts, &args).await,
        Command::CancelFund(args) => commands::fund::cmd_cancel_fund(opts, &args).await,
        Command::PayDividend(args) => commands::fund::cmd_pay_dividend(opts, &args).await,
        Command::RegisterProperty(args) => {
            commands::property::cmd_register_property(opts, &args).await
        }
        Command::TransferProperty(args) => {
            commands::property::cmd_transfer_property(opts, &args).await
        }
        Command::DeregisterProperty(args) => {
            commands::property::cmd_deregister_property(opts, &args).await
        }
        Command::List(args) => commands::query::cmd_list(opts, &args).await,
        Command::Peers => commands::query::cmd_peers(opts).await,
        Command::History => commands::query::cmd_history(opts).await,
        Command::Tx(args) => commands::query::cmd_tx(opts, &args).await,
    }
}
