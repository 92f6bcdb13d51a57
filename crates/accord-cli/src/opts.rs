//! Global CLI options.

use std::path::PathBuf;

use anyhow::{Result, bail};
use accord_types::PartyName;
use clap::Args;

/// Options shared by every subcommand. Each can also be set via env vars.
#[derive(Args, Debug, Clone)]
pub struct NetOpts {
    /// Network data directory (env: ACCORD_DATA_DIR)
    #[arg(short = 'd', long, global = true, env = "ACCORD_DATA_DIR", default_value = ".accord")]
    pub data_dir: PathBuf,

    /// Party to act as (env: ACCORD_PARTY)
    #[arg(long = "as", global = true, env = "ACCORD_PARTY")]
    pub party: Option<String>,

    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output (implies --json)
    #[arg(long, global = true)]
    pub pretty: bool,
}

impl NetOpts {
    pub fn network_file(&self) -> PathBuf {
        self.data_dir.join("network.json")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    pub fn party_dir(&self, name: &PartyName) -> PathBuf {
        self.data_dir.join("parties").join(name.as_str())
    }

    /// The `--as` party, which every command except `init` requires.
    pub fn acting_party(&self) -> Result<PartyName> {
        match self.party.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(PartyName::from(name)),
            _ => bail!("no acting party; pass --as <name> or set ACCORD_PARTY"),
        }
    }

    pub fn ensure_initialised(&self) -> Result<()> {
        let file = self.network_file();
        if !file.exists() {
            bail!(
                "no network at {}; run `accord init` first",
                self.data_dir.display()
            );
        }
        Ok(())
    }
}
