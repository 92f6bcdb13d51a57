use std::path::Path;
use std::process::{Command, Output};

use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn accord(dir: &Path, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("accord"))
        .arg("--data-dir")
        .arg(dir)
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("ACCORD_PARTY")
        .output()
        .expect("run accord")
}

fn json_data(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let root: Value = serde_json::from_slice(&output.stdout).expect("json on stdout");
    root["data"].clone()
}

#[test]
fn help_lists_the_operations() {
    let tmp = TempDir::new().unwrap();
    let output = accord(tmp.path(), &["--help"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for needle in ["init", "issue-fund", "change-investor", "pay-dividend", "list", "--as"] {
        assert!(
            predicate::str::contains(needle).eval(&text),
            "help output should mention '{needle}'"
        );
    }
}

#[test]
fn commands_need_an_initialised_network() {
    let tmp = TempDir::new().unwrap();
    let output = accord(tmp.path(), &["--as", "Alice", "peers"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("accord init"));
}

#[test]
fn fund_lifecycle_persists_between_invocations() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    json_data(&accord(dir, &["--json", "init", "Alice", "Bob", "Carol"]));

    let issued = json_data(&accord(
        dir,
        &["--json", "--as", "Alice", "issue-fund", "--value", "1000", "--investor", "Bob"],
    ));
    assert_eq!(issued["tx_id"].as_str().map(str::len), Some(64));

    let bobs = json_data(&accord(dir, &["--json", "--as", "Bob", "list", "fund"]));
    let rows = bobs.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["record"]["value"], 1000);
    let fund_id = rows[0]["id"].as_str().unwrap().to_string();

    json_data(&accord(
        dir,
        &["--json", "--as", "Alice", "change-investor", &fund_id, "--from", "Bob", "--to", "Carol"],
    ));
    let bobs = json_data(&accord(dir, &["--json", "--as", "Bob", "list", "fund"]));
    assert!(bobs.as_array().unwrap().is_empty());
    let carols = json_data(&accord(
        dir,
        &["--json", "--as", "Carol", "list", "fund", "--where", "investors=Carol"],
    ));
    assert_eq!(carols.as_array().unwrap().len(), 1);

    let history = json_data(&accord(dir, &["--json", "--as", "Alice", "history"]));
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[test]
fn rule_violations_surface_the_rule_text() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    json_data(&accord(dir, &["--json", "init", "Alice", "Bob"]));

    let output = accord(
        dir,
        &["--as", "Alice", "issue-fund", "--value", "20000000", "--investor", "Bob"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("10 million"));

    let output = accord(
        dir,
        &["--as", "Alice", "issue-fund", "--value", "-5", "--investor", "Bob"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid request"));
}
