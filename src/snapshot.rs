//! JSON snapshots of a loaded registry.
//!
//! A snapshot lets a consumer skip re-parsing a `trait.impl/` tree: the facts
//! are written once, grouped by crate in registry order, and read back later.
//! Imports are validated against `schema/registry_snapshot.schema.json` before
//! deserialization so a mismatched document fails with every violation listed.

use crate::catalog::{Fact, GroupKey, ImplRegistry};
use crate::schema_loader::compile_schema;
use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

const SNAPSHOT_SCHEMA: &str = include_str!("../schema/registry_snapshot.schema.json");

pub const SNAPSHOT_SCHEMA_VERSION: &str = "implindex_snapshot_v1";

#[derive(Serialize)]
struct SnapshotRef<'a> {
    schema_version: &'a str,
    groups: &'a IndexMap<GroupKey, Vec<Fact>>,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    groups: IndexMap<GroupKey, Vec<Fact>>,
}

/// Serialize `registry` as a snapshot document.
pub fn to_value(registry: &ImplRegistry) -> Result<Value> {
    Ok(serde_json::to_value(SnapshotRef {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        groups: registry.group_map(),
    })?)
}

/// Write a snapshot to `path`, replacing any existing file atomically.
pub fn export(registry: &ImplRegistry, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary snapshot in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(
            &mut writer,
            &SnapshotRef {
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                groups: registry.group_map(),
            },
        )
        .context("serializing snapshot")?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.persist(path)
        .map_err(|err| anyhow!("writing snapshot {}: {}", path.display(), err.error))?;
    info!(path = %path.display(), facts = registry.len(), "exported snapshot");
    Ok(())
}

/// Validate and load a snapshot document.
pub fn from_value(value: Value) -> Result<ImplRegistry> {
    let schema = compile_schema(SNAPSHOT_SCHEMA, "registry_snapshot.schema.json")?;
    schema.check_version(&value, "snapshot")?;
    schema.validate(&value, "snapshot")?;
    let snapshot: SnapshotOwned = serde_json::from_value(value).context("decoding snapshot")?;
    for (key, facts) in &snapshot.groups {
        if let Some(idx) = facts.iter().position(|fact| &fact.group != key) {
            bail!(
                "fact {} under group `{key}` belongs to group `{}`",
                idx + 1,
                facts[idx].group
            );
        }
    }
    Ok(ImplRegistry::from_groups(snapshot.groups))
}

/// Read a snapshot written by `export`.
pub fn import(path: &Path) -> Result<ImplRegistry> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    let registry = from_value(value).with_context(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), facts = registry.len(), "imported snapshot");
    Ok(registry)
}
