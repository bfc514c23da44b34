//! Trait implementor index built from rustdoc output.
//!
//! rustdoc writes one `trait.impl/<path>/trait.<Name>.js` file per trait,
//! listing which types in each documented crate implement it. This crate
//! decodes those files into `Fact`s, merges them into an `ImplRegistry` keyed
//! by crate, and renders or snapshots the result. Public functions here cover
//! doc-root discovery and the small helpers the `implindex` binary shares with
//! tests.

use anyhow::{Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub mod catalog;
pub mod handoff;
pub mod implementors;
pub mod render;
mod schema_loader;
pub mod snapshot;
pub mod snippet;

pub use catalog::{
    Batch, BatchReceipt, EntityRef, Fact, GroupKey, ImplRegistry, ItemKind, SharedRegistry,
    TraitPath, TraitRef,
};
pub use handoff::{BatchSink, DeliveryRecord, DeliveryState, Loader};
pub use implementors::{IMPLEMENTORS_DIR, ParseMode, collect_implementor_files, load_batch};
pub use render::Format;
pub use snippet::{SnippetError, parse_snippet};

/// Environment variable naming the rustdoc output directory.
pub const DOC_ROOT_ENV: &str = "IMPLINDEX_DOC_ROOT";

/// Where `cargo doc` places output relative to a workspace.
const CARGO_DOC_DIR: &str = "target/doc";

/// Returns true when `candidate` holds a `trait.impl/` directory.
fn is_doc_root(candidate: &Path) -> bool {
    candidate.join(IMPLEMENTORS_DIR).is_dir()
}

fn doc_root_from_hint(hint: &str) -> Option<PathBuf> {
    if hint.is_empty() {
        return None;
    }
    let hint_path = PathBuf::from(hint);
    if !is_doc_root(&hint_path) {
        return None;
    }
    fs::canonicalize(hint_path).ok()
}

/// Climb from `start` looking for a doc root, either the directory itself or
/// its `target/doc`.
fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if is_doc_root(&dir) {
            return Some(dir);
        }
        let cargo_doc = dir.join(CARGO_DOC_DIR);
        if is_doc_root(&cargo_doc) {
            return Some(cargo_doc);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locate the rustdoc output directory.
///
/// Search order: an explicit path (must be a doc root), `IMPLINDEX_DOC_ROOT`,
/// an upward search from the current directory, then the build-time hint.
pub fn find_doc_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if is_doc_root(path) {
            return Ok(fs::canonicalize(path)?);
        }
        bail!(
            "{} does not contain a {IMPLEMENTORS_DIR}/ directory",
            path.display()
        );
    }

    if let Ok(env_root) = env::var(DOC_ROOT_ENV) {
        if let Some(root) = doc_root_from_hint(&env_root) {
            return Ok(root);
        }
    }

    if let Ok(cwd) = env::current_dir() {
        if let Some(root) = search_upwards(&cwd) {
            return Ok(root);
        }
    }

    if let Some(hint) = option_env!("IMPLINDEX_DOC_ROOT_HINT") {
        if let Some(root) = doc_root_from_hint(hint) {
            return Ok(root);
        }
    }

    bail!(
        "Unable to locate rustdoc output. Run 'cargo doc' or set {DOC_ROOT_ENV} to a directory containing {IMPLEMENTORS_DIR}/."
    );
}

/// Split comma- or whitespace-delimited lists into tokens.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// Load every implementor file under `doc_root` into a fresh registry.
pub fn load_registry(doc_root: &Path, mode: ParseMode) -> Result<ImplRegistry> {
    let mut loader = Loader::attach(ImplRegistry::new()).with_mode(mode);
    loader.deliver_tree(&doc_root.join(IMPLEMENTORS_DIR))?;
    Ok(loader.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_list_accepts_commas_and_spaces() {
        assert_eq!(split_list("syn, memchr  serde_json,"), vec!["syn", "memchr", "serde_json"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn explicit_doc_root_must_hold_implementors() {
        let dir = TempDir::new().unwrap();
        assert!(find_doc_root(Some(dir.path())).is_err());

        fs::create_dir(dir.path().join(IMPLEMENTORS_DIR)).unwrap();
        let found = find_doc_root(Some(dir.path())).unwrap();
        assert_eq!(found, fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn upward_search_finds_cargo_doc_output() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join(CARGO_DOC_DIR);
        fs::create_dir_all(doc.join(IMPLEMENTORS_DIR)).unwrap();
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();

        let found = search_upwards(&nested).unwrap();
        assert_eq!(found, fs::canonicalize(&doc).unwrap());
    }
}
