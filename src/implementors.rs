//! Reading rustdoc `trait.impl/` implementor files.
//!
//! Each `trait.impl/<module path>/trait.<Name>.js` file is a small script that
//! embeds one table: crate name to a list of implementor entries. This module
//! locates that table inside the script, decodes it with `serde_json` in source
//! order, and turns every entry into a `Fact` of one `Batch`.
//!
//! Three table encodings are understood: the plain object literal
//! (`var implementors = {...}`), `Object.fromEntries([[crate, [...]], ...])`,
//! and `JSON.parse('...')` with a single-quoted JS string.

use crate::catalog::{Batch, GroupKey, TraitPath};
use crate::snippet::parse_snippet;
use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory rustdoc writes implementor files to, relative to the doc root.
pub const IMPLEMENTORS_DIR: &str = "trait.impl";

const TABLE_MARKER: &str = "implementors";
const FILE_PREFIX: &str = "trait.";
const FILE_SUFFIX: &str = ".js";

/// How to treat entries that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// First malformed entry fails the whole file.
    #[default]
    Strict,
    /// Malformed entries are logged and skipped.
    Lenient,
}

/// Derive the trait path from a file's location under the `trait.impl/` root.
///
/// `core/iter/traits/iterator/trait.Iterator.js` maps to
/// `core::iter::traits::iterator::Iterator`.
pub fn trait_path_for(root: &Path, file: &Path) -> Result<TraitPath> {
    let relative = file.strip_prefix(root).with_context(|| {
        format!("{} is not under {}", file.display(), root.display())
    })?;

    let mut segments = Vec::new();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            let segment = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| anyhow!("non UTF-8 path component in {}", file.display()))?;
            segments.push(segment.to_string());
        }
    }

    let name = relative
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(trait_name_from_file)
        .ok_or_else(|| {
            anyhow!(
                "{} is not named {FILE_PREFIX}<Name>{FILE_SUFFIX}",
                file.display()
            )
        })?;
    segments.push(name.to_string());
    Ok(TraitPath(segments.join("::")))
}

fn trait_name_from_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)
        .filter(|name| !name.is_empty() && !name.contains('.'))
}

/// Collect every implementor file under `root`, sorted by path.
///
/// Traversal is recursive; files that do not follow the `trait.<Name>.js`
/// naming are ignored.
pub fn collect_implementor_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("implementor directory not found: {}", root.display());
    }
    let mut files = Vec::new();
    collect_from_dir(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_from_dir(dir: &Path, acc: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_from_dir(&path, acc)?;
        } else if path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(trait_name_from_file)
            .is_some()
        {
            acc.push(path);
        }
    }
    Ok(())
}

/// Read one implementor file under `root` into a batch.
pub fn load_batch(root: &Path, file: &Path, mode: ParseMode) -> Result<Batch> {
    let trait_path = trait_path_for(root, file)?;
    let source =
        fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    parse_implementors(&source, &trait_path, mode)
        .with_context(|| format!("parsing {}", file.display()))
}

/// Decode the implementor table embedded in `source`.
pub fn parse_implementors(
    source: &str,
    trait_path: &TraitPath,
    mode: ParseMode,
) -> Result<Batch> {
    let table = extract_table(source)?;
    let mut batch = Batch::new(trait_path.clone());

    for (group, entries) in table {
        let key = GroupKey(group);
        let facts = batch.groups.entry(key.clone()).or_default();
        for (idx, entry) in entries.iter().enumerate() {
            let parsed = entry_parts(entry)
                .map_err(|reason| anyhow!("{reason}"))
                .and_then(|(html, synthetic)| {
                    parse_snippet(&key, trait_path, html, synthetic).map_err(anyhow::Error::from)
                });
            match (parsed, mode) {
                (Ok(fact), _) => facts.push(fact),
                (Err(err), ParseMode::Strict) => {
                    return Err(err.context(format!("entry {} of crate {key}", idx + 1)));
                }
                (Err(err), ParseMode::Lenient) => {
                    warn!(
                        group = %key,
                        entry = idx + 1,
                        error = %err,
                        "skipping implementor entry"
                    );
                }
            }
        }
    }

    debug!(
        trait_path = %trait_path,
        groups = batch.groups.len(),
        facts = batch.fact_count(),
        "decoded implementor table"
    );
    Ok(batch)
}

/// Split one table entry into its HTML snippet and synthetic flag.
///
/// Entries are arrays `[html, synthetic?, ...]`; older rustdoc emitted
/// objects with `text`/`synthetic` keys and bare strings are accepted as-is.
fn entry_parts(entry: &Value) -> Result<(&str, bool), String> {
    match entry {
        Value::String(html) => Ok((html.as_str(), false)),
        Value::Array(items) => {
            let html = items
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| "entry array does not start with an HTML string".to_string())?;
            Ok((html, items.get(1).is_some_and(truthy)))
        }
        Value::Object(map) => {
            let html = map
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| "entry object has no `text` string".to_string())?;
            Ok((html, map.get("synthetic").is_some_and(truthy)))
        }
        other => Err(format!("unsupported entry shape: {other}")),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

/// Locate and decode the crate table, preserving crate order.
fn extract_table(source: &str) -> Result<Vec<(String, Vec<Value>)>> {
    let marker = source
        .find(TABLE_MARKER)
        .ok_or_else(|| anyhow!("no `{TABLE_MARKER}` table in script"))?;
    let after = &source[marker + TABLE_MARKER.len()..];

    let bracket = after.find(['{', '[']);
    let json_parse = after
        .find("JSON.parse(")
        .filter(|&idx| bracket.is_none_or(|bracket| idx < bracket));

    let literal: String = match (json_parse, bracket) {
        (Some(idx), _) => {
            let start = idx + "JSON.parse(".len();
            unescape_js_string(after[start..].trim_start())?
        }
        (None, Some(start)) => {
            let end = balanced_end(after, start)
                .ok_or_else(|| anyhow!("unterminated table literal"))?;
            after[start..=end].to_string()
        }
        (None, None) => bail!("no table literal after `{TABLE_MARKER}`"),
    };

    let value: Value = serde_json::from_str(&literal).context("decoding implementor table")?;
    table_entries(value)
}

fn table_entries(value: Value) -> Result<Vec<(String, Vec<Value>)>> {
    match value {
        Value::Object(_) => {
            let map: IndexMap<String, Vec<Value>> = serde_json::from_value(value)
                .context("implementor table must map crates to arrays")?;
            Ok(map.into_iter().collect())
        }
        Value::Array(_) => serde_json::from_value(value)
            .context("implementor table must be a list of [crate, entries] pairs"),
        other => bail!("unsupported implementor table: {other}"),
    }
}

/// Index of the bracket closing the one at `start`, skipping JSON strings.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode a single-quoted JS string literal at the start of `text`.
fn unescape_js_string(text: &str) -> Result<String> {
    let body = text
        .strip_prefix('\'')
        .ok_or_else(|| anyhow!("JSON.parse argument is not a single-quoted string"))?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' => return Ok(out),
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }
    bail!("unterminated JSON.parse string")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SNIPPET: &str = r#"impl <a class=\"trait\" href=\"core/iter/trait.Iterator.html\" title=\"trait core::iter::Iterator\">Iterator</a> for <a class=\"struct\" href=\"demo/struct.Iter.html\" title=\"struct demo::Iter\">Iter</a>"#;

    fn trait_path() -> TraitPath {
        TraitPath::new("core::iter::Iterator")
    }

    #[test]
    fn classic_object_table() {
        let source = format!(
            r#"(function() {{var implementors = {{
"zeta":[["{SNIPPET}"]],"alpha":[["{SNIPPET}"],["{SNIPPET}",true]]
}};if (window.register_implementors) {{window.register_implementors(implementors);}} else {{window.pending_implementors = implementors;}}}})()"#
        );
        let batch = parse_implementors(&source, &trait_path(), ParseMode::Strict).unwrap();
        let keys: Vec<&str> = batch.groups.keys().map(GroupKey::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        let alpha = &batch.groups[&GroupKey::new("alpha")];
        assert_eq!(alpha.len(), 2);
        assert!(!alpha[0].synthetic);
        assert!(alpha[1].synthetic);
        assert_eq!(alpha[1].entity.path.as_deref(), Some("demo::Iter"));
    }

    #[test]
    fn from_entries_table() {
        let source = format!(
            r#"(function() {{var implementors = Object.fromEntries([["demo",[["{SNIPPET}",0,[]]]]]);if (window.register_implementors) {{}}}})()"#
        );
        let batch = parse_implementors(&source, &trait_path(), ParseMode::Strict).unwrap();
        assert_eq!(batch.fact_count(), 1);
        assert!(!batch.groups[&GroupKey::new("demo")][0].synthetic);
    }

    #[test]
    fn json_parse_table() {
        let source = r#"(function() {const implementors = JSON.parse('{"demo":[["impl <a class=\\"trait\\" href=\\"x.html\\" title=\\"trait core::iter::Iterator\\">Iterator</a> for Bob\'s"]]}');})()"#;
        let batch = parse_implementors(source, &trait_path(), ParseMode::Strict).unwrap();
        let fact = &batch.groups[&GroupKey::new("demo")][0];
        assert_eq!(fact.entity.display, "Bob's");
        assert_eq!(fact.trait_ref.href.as_deref(), Some("x.html"));
    }

    #[test]
    fn strict_fails_and_lenient_skips() {
        let source = format!(
            r#"var implementors = {{"demo":[["not an impl"],["{SNIPPET}"],[42]]}};"#
        );
        let err = parse_implementors(&source, &trait_path(), ParseMode::Strict).unwrap_err();
        assert!(format!("{err:#}").contains("entry 1 of crate demo"));

        let batch = parse_implementors(&source, &trait_path(), ParseMode::Lenient).unwrap();
        assert_eq!(batch.fact_count(), 1);
    }

    #[test]
    fn trailing_space_entry_loads_beside_broken_ones() {
        let source = format!(
            r#"var implementors = {{"demo":[["impl <a class=\"trait\" href=\"t.html\">T</a> for <a class=\"struct\" href=\"demo/struct.Foo.html\">Foo </a>"],["{SNIPPET}"],[42]]}};"#
        );
        let batch = parse_implementors(&source, &trait_path(), ParseMode::Lenient).unwrap();
        let demo = &batch.groups[&GroupKey::new("demo")];
        assert_eq!(demo.len(), 2);
        assert_eq!(demo[0].entity.name, "Foo");
        assert_eq!(demo[1].entity.name, "Iter");
    }

    #[test]
    fn missing_table_is_an_error() {
        assert!(parse_implementors("console.log(1)", &trait_path(), ParseMode::Lenient).is_err());
        assert!(
            parse_implementors("var implementors = {\"a\":[", &trait_path(), ParseMode::Lenient)
                .is_err()
        );
    }

    #[test]
    fn brackets_inside_strings_do_not_end_the_table() {
        let text = r#"{"a":["]}\"{"]} trailing"#;
        assert_eq!(balanced_end(text, 0), Some(text.find(" trailing").unwrap() - 1));
    }

    #[test]
    fn trait_path_from_location() {
        let root = Path::new("/docs/trait.impl");
        let file = root.join("core/iter/traits/iterator/trait.Iterator.js");
        assert_eq!(
            trait_path_for(root, &file).unwrap().as_str(),
            "core::iter::traits::iterator::Iterator"
        );
        assert!(trait_path_for(root, &root.join("core/search.js")).is_err());
        assert!(trait_path_for(Path::new("/elsewhere"), &file).is_err());
    }
}
