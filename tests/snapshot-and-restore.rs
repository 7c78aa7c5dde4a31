use std::fs;

use anyhow::{Result, ensure};
use assert_cmd::Command;
use tempfile::tempdir;

mod common;

use common::*;

#[test]
fn snapshots_and_restores_a_small_tree() -> Result<()> {
    let tree_dir = tempdir()?;
    let tree_path = tree_dir.path();
    let repo_dir = tempdir()?;
    let repo_path = repo_dir.path();

    init_tree(tree_path, "mytree")?;

    fs::write(tree_path.join("hello.txt"), b"hello, world\n")?;
    fs::create_dir(tree_path.join("sub"))?;
    fs::write(tree_path.join("sub").join("nested.txt"), b"nested\n")?;

    let snapshot_out = Command::cargo_bin(env!("CARGO_PKG_NAME"))?
        .current_dir(tree_path)
        .arg("--repository")
        .arg(repo_path)
        .arg("snapshot")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let snapshot_line = String::from_utf8(snapshot_out)?;
    ensure!(
        snapshot_line.contains("3 entries"),
        "expected 3 entries (file, dir, nested file), got: {snapshot_line}"
    );

    let versions = cli_run(repo_path)?.arg("versions").assert().success();
    let versions_output = String::from_utf8(versions.get_output().stdout.clone())?;
    ensure!(versions_output.contains("mytree"));

    let version_id = versions_output
        .lines()
        .nth(1)
        .expect("a version line")
        .split_whitespace()
        .next()
        .expect("a version id")
        .to_string();

    let dest_dir = tempdir()?;
    cli_run(repo_path)?
        .args(["restore", "mytree", &version_id])
        .arg(dest_dir.path())
        .assert()
        .success();

    let restored = fs::read_to_string(dest_dir.path().join("hello.txt"))?;
    ensure!(restored == "hello, world\n");
    let restored_nested = fs::read_to_string(dest_dir.path().join("sub").join("nested.txt"))?;
    ensure!(restored_nested == "nested\n");

    Ok(())
}

#[test]
fn second_snapshot_reuses_unchanged_blocks() -> Result<()> {
    let tree_dir = tempdir()?;
    let tree_path = tree_dir.path();
    let repo_dir = tempdir()?;
    let repo_path = repo_dir.path();

    init_tree(tree_path, "mytree")?;
    fs::write(tree_path.join("a.txt"), b"same content\n")?;

    Command::cargo_bin(env!("CARGO_PKG_NAME"))?
        .current_dir(tree_path)
        .arg("--repository")
        .arg(repo_path)
        .arg("snapshot")
        .assert()
        .success();

    let second = Command::cargo_bin(env!("CARGO_PKG_NAME"))?
        .current_dir(tree_path)
        .arg("--repository")
        .arg(repo_path)
        .arg("snapshot")
        .assert()
        .success();
    let second_line = String::from_utf8(second.get_output().stdout.clone())?;
    ensure!(
        second_line.contains("0 blocks stored"),
        "expected the unchanged file's block to be reused, got: {second_line}"
    );

    Ok(())
}
