use std::fs;

use anyhow::{Result, ensure};
use assert_cmd::Command;
use tempfile::tempdir;

mod common;

use common::*;

#[test]
fn ignore_rules_skip_matching_paths() -> Result<()> {
    let tree_dir = tempdir()?;
    let tree_path = tree_dir.path();
    let repo_dir = tempdir()?;
    let repo_path = repo_dir.path();

    init_tree(tree_path, "mytree")?;

    // Basename dialect: skip any "*.log" file wherever it lives.
    // Absolute-from-root dialect: skip exactly "build" at the tree root.
    // Suffix dialect: skip anything whose path ends in "cache/tmp".
    fs::write(
        tree_path.join(".hoard").join("ignore"),
        "debug.log\n/build\ncache/tmp\n",
    )?;

    fs::write(tree_path.join("debug.log"), b"noisy")?;
    fs::write(tree_path.join("keep.txt"), b"keep me")?;
    fs::create_dir(tree_path.join("build"))?;
    fs::write(tree_path.join("build").join("artifact.bin"), b"binary")?;
    fs::create_dir_all(tree_path.join("data/cache"))?;
    fs::write(tree_path.join("data/cache/tmp"), b"scratch")?;

    Command::cargo_bin(env!("CARGO_PKG_NAME"))?
        .current_dir(tree_path)
        .arg("--repository")
        .arg(repo_path)
        .arg("snapshot")
        .assert()
        .success();

    let versions = cli_run(repo_path)?.arg("versions").assert().success();
    let versions_output = String::from_utf8(versions.get_output().stdout.clone())?;
    let version_id = versions_output
        .lines()
        .nth(1)
        .expect("a version line")
        .split_whitespace()
        .next()
        .unwrap()
        .to_string();

    let dump = cli_run(repo_path)?
        .args(["cat", "mytree", &version_id])
        .assert()
        .success();
    let dump_output = String::from_utf8(dump.get_output().stdout.clone())?;

    ensure!(dump_output.contains("keep.txt"));
    ensure!(!dump_output.contains("debug.log"));
    ensure!(!dump_output.contains("build"));
    ensure!(!dump_output.contains("cache/tmp"));

    Ok(())
}
