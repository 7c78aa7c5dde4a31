#![allow(dead_code)]

use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;

/// Builds a CLI invocation against the given backend repository root.
pub fn cli_run(repository: &Path) -> Result<Command> {
    let bin_name = env!("CARGO_PKG_NAME");
    let mut cmd = Command::cargo_bin(bin_name)?;
    cmd.arg("--repository").arg(repository);
    cmd.arg("-vvv");
    Ok(cmd)
}

/// Initializes a fresh working tree at `tree` under archive `name`.
pub fn init_tree(tree: &Path, name: &str) -> Result<()> {
    Command::cargo_bin(env!("CARGO_PKG_NAME"))?
        .arg("init")
        .arg("--name")
        .arg(name)
        .arg(tree)
        .assert()
        .success();
    Ok(())
}
