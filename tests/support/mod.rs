#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn fixtures_doc_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Doc root whose implementor table lists crates out of alphabetical order.
pub fn unordered_doc_root() -> PathBuf {
    fixtures_doc_root().join("unordered")
}

pub fn implindex_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_implindex"))
}

/// Scratch doc root seeded with the recorded fixture tree.
pub fn scratch_doc_root() -> Result<TempDir> {
    let dir = TempDir::new().context("failed to allocate scratch doc root")?;
    copy_tree(&fixtures_doc_root().join("trait.impl"), &dir.path().join("trait.impl"))?;
    Ok(dir)
}

pub fn write_implementor_file(doc_root: &Path, relative: &str, contents: &str) -> Result<PathBuf> {
    let path = doc_root.join("trait.impl").join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from).with_context(|| format!("reading {}", from.display()))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
