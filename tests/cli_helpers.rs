#![allow(dead_code)]

use anyhow::{bail, Result};
use assert_cmd::cargo;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn db_path(home: &TempDir) -> PathBuf {
    home.path().join(".strata").join("data.db")
}

/// `strata --no-color` isolated in a temporary HOME
pub fn base_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("strata"));
    cmd.env("HOME", home.path());
    cmd.env_remove("STRATA_DB");
    cmd.env_remove("RUST_LOG");
    cmd.arg("--no-color");
    cmd
}

pub fn run_cmd(home: &TempDir, args: &[&str]) -> Result<Output> {
    let mut cmd = base_cmd(home);
    cmd.args(args);
    let output = cmd.output()?;
    if !output.status.success() {
        bail!(
            "command failed: {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

pub fn run_json(home: &TempDir, args: &[&str]) -> Result<Value> {
    let mut full_args = vec!["--json"];
    full_args.extend_from_slice(args);
    let output = run_cmd(home, &full_args)?;
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Write a JSON input file next to the database and return its path
pub fn write_input(home: &TempDir, name: &str, body: &str) -> Result<String> {
    let path: &Path = home.path();
    let file = path.join(name);
    std::fs::write(&file, body)?;
    Ok(file.to_string_lossy().into_owned())
}
