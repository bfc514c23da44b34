//! Serializable representation of implementor facts.
//!
//! A `Fact` is one row of a rustdoc implementor table after its HTML snippet
//! has been decoded. A `Batch` groups the facts of one implementor file (one
//! trait) by owning crate, in source order.

use crate::catalog::identity::{GroupKey, ItemKind, TraitPath};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Trait side of an implementation.
pub struct TraitRef {
    pub name: String,
    pub path: TraitPath,
    #[serde(default)]
    pub href: Option<String>,
    /// Rendered generic arguments following the trait name, such as `<T>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Type side of an implementation.
///
/// `display` is always present; the link fields are absent for types rustdoc
/// does not link (references, tuples, bare generic parameters).
pub struct EntityRef {
    pub name: String,
    pub display: String,
    #[serde(default)]
    pub kind: Option<ItemKind>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    /// Byte offset of `name` within `display` when the name is linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_offset: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// One "type implements trait" assertion owned by a crate.
pub struct Fact {
    pub group: GroupKey,
    #[serde(rename = "trait")]
    pub trait_ref: TraitRef,
    pub entity: EntityRef,
    #[serde(default)]
    pub generics: Vec<String>,
    #[serde(default)]
    pub negative: bool,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub where_clause: Option<String>,
    pub html: String,
}

impl Fact {
    /// Plain-text impl header, e.g. `impl<'s> Iterator for StripStr<'s>`.
    pub fn header(&self) -> String {
        let mut out = String::from("impl");
        if !self.generics.is_empty() {
            out.push('<');
            out.push_str(&self.generics.join(", "));
            out.push('>');
        }
        out.push(' ');
        if self.negative {
            out.push('!');
        }
        out.push_str(&self.trait_ref.name);
        out.push_str(&self.trait_ref.args);
        out.push_str(" for ");
        out.push_str(&self.entity.display);
        out
    }

    /// Identity used to collapse repeated listings of the same impl.
    pub(crate) fn identity(&self) -> (&TraitPath, Option<&str>, &str, &[String], bool) {
        (
            &self.trait_ref.path,
            self.entity.path.as_deref(),
            self.entity.display.as_str(),
            self.generics.as_slice(),
            self.negative,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Facts from one implementor file, keyed by owning crate.
pub struct Batch {
    pub trait_path: TraitPath,
    pub groups: IndexMap<GroupKey, Vec<Fact>>,
}

impl Batch {
    pub fn new(trait_path: TraitPath) -> Self {
        Self {
            trait_path,
            groups: IndexMap::new(),
        }
    }

    /// Append a fact under its own group, preserving arrival order.
    pub fn push(&mut self, fact: Fact) {
        self.groups
            .entry(fact.group.clone())
            .or_default()
            .push(fact);
    }

    /// Total number of facts across all groups.
    pub fn fact_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fact_count() == 0
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{batch, fact};
    use super::*;

    #[test]
    fn header_renders_generics_and_negation() {
        let mut f = fact("syn", "IntoPairs<T, P>", "core::iter::traits::iterator::Iterator");
        f.generics = vec!["T".into(), "P".into()];
        assert_eq!(f.header(), "impl<T, P> Iterator for IntoPairs<T, P>");

        f.negative = true;
        f.generics.clear();
        assert_eq!(f.header(), "impl !Iterator for IntoPairs<T, P>");
    }

    #[test]
    fn batch_groups_in_arrival_order() {
        let b = batch(
            "a::T",
            vec![
                fact("zeta", "X", "a::T"),
                fact("alpha", "Y", "a::T"),
                fact("zeta", "Z", "a::T"),
            ],
        );
        let keys: Vec<&str> = b.groups.keys().map(GroupKey::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(b.fact_count(), 3);
        assert_eq!(b.groups[&GroupKey::new("zeta")][1].entity.name, "Z");
    }

    #[test]
    fn fact_serializes_trait_field_name() {
        let value = serde_json::to_value(fact("memchr", "Memchr", "a::T")).unwrap();
        assert_eq!(
            value.pointer("/trait/path").and_then(|v| v.as_str()),
            Some("a::T")
        );
        assert!(value.pointer("/trait/args").is_none());
    }
}
