//! `accord init`: lay out a fresh network in the data directory.

use std::fs;

use accord_types::{Identity, PartyName};
use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::json;

use crate::local::{NetworkConfig, write_seed};
use crate::opts::NetOpts;
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Party names, e.g. Alice Bob Carol
    #[arg(required = true)]
    pub parties: Vec<String>,

    /// Name of the notary
    #[arg(long, default_value = "Notary")]
    pub notary: String,

    /// Wipe an existing network in the data directory first
    #[arg(long)]
    pub force: bool,
}

pub fn cmd_init(opts: &NetOpts, args: &InitArgs) -> Result<()> {
    let mut warnings = Vec::new();
    if opts.network_file().exists() {
        if !args.force {
            bail!(
                "{} already holds a network; pass --force to replace it",
                opts.data_dir.display()
            );
        }
        fs::remove_dir_all(&opts.data_dir)
            .with_context(|| format!("remove {}", opts.data_dir.display()))?;
        warnings.push(format!("replaced the network in {}", opts.data_dir.display()));
    }

    let mut parties: Vec<PartyName> = Vec::new();
    for name in &args.parties {
        let name = PartyName::from(name.trim());
        if name.as_str().is_empty() || name.as_str() == args.notary {
            bail!("invalid party name '{name}'");
        }
        if !parties.contains(&name) {
            parties.push(name);
        }
    }
    let config = NetworkConfig {
        notary: PartyName::from(args.notary.trim()),
        parties,
    };

    let keys = opts.keys_dir();
    fs::create_dir_all(&keys).with_context(|| format!("create {}", keys.display()))?;
    for name in config.all_names() {
        write_seed(&keys, &Identity::generate(name.clone()))?;
        fs::create_dir_all(opts.party_dir(name))?;
    }
    config.save(opts)?;

    let data = if opts.json || opts.pretty {
        json!({ "notary": config.notary, "parties": config.parties })
    } else {
        json!(format!(
            "initialised {} with parties {} and notary {}",
            opts.data_dir.display(),
            config
                .parties
                .iter()
                .map(PartyName::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            config.notary
        ))
    };
    print_success(opts, data, warnings)
}
