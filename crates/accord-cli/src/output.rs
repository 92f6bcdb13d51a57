//! Shared output helpers for human and JSON modes.
//!
//! Human mode prints the primary data to stdout and notices to stderr. JSON
//! mode wraps responses in `{ data, warnings? }` and respects `--pretty`.

use std::io::Write;

use anyhow::Result;
use serde_json::{Value, json};

use crate::opts::NetOpts;

pub fn print_success(opts: &NetOpts, data: Value, warnings: Vec<String>) -> Result<()> {
    if opts.pretty || opts.json {
        print_json(opts, data, warnings)
    } else {
        print_human(data, warnings)
    }
}

fn print_json(opts: &NetOpts, data: Value, warnings: Vec<String>) -> Result<()> {
    let mut root = json!({ "data": data });
    if !warnings.is_empty() {
        root["warnings"] = warnings.into_iter().map(Value::String).collect();
    }
    if opts.pretty {
        println!("{}", serde_json::to_string_pretty(&root)?);
    } else {
        println!("{}", serde_json::to_string(&root)?);
    }
    Ok(())
}

fn print_human(data: Value, warnings: Vec<String>) -> Result<()> {
    let mut stderr = std::io::stderr();
    for w in warnings {
        writeln!(stderr, "notice: {w}")?;
    }
    match data {
        Value::String(s) => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}
