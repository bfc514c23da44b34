//! Accumulates implementor facts from every loaded batch, keyed by crate.
//!
//! Registration is an additive merge: each batch appends its facts to the
//! per-crate sequence, so batches registered in order read back as the
//! concatenation of their facts. Nothing is deduplicated; registering the same
//! batch twice lists its facts twice.

use crate::catalog::identity::{GroupKey, TraitPath};
use crate::catalog::model::{Batch, Fact};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Record of one merged batch.
pub struct BatchReceipt {
    pub trait_path: TraitPath,
    pub groups: usize,
    pub facts: usize,
}

#[derive(Clone, Debug, Default)]
/// In-memory store of facts keyed by `GroupKey`, in first-registration order.
pub struct ImplRegistry {
    groups: IndexMap<GroupKey, Vec<Fact>>,
    receipts: Vec<BatchReceipt>,
}

impl ImplRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch, appending each group's facts after any already present.
    ///
    /// Groups with no facts are not materialized, so an empty batch leaves the
    /// registry unchanged.
    pub fn register(&mut self, batch: &Batch) {
        let mut groups = 0;
        let mut facts = 0;
        for (key, batch_facts) in &batch.groups {
            if batch_facts.is_empty() {
                continue;
            }
            self.groups
                .entry(key.clone())
                .or_default()
                .extend(batch_facts.iter().cloned());
            groups += 1;
            facts += batch_facts.len();
        }
        if facts == 0 {
            return;
        }
        debug!(trait_path = %batch.trait_path, groups, facts, "registered batch");
        self.receipts.push(BatchReceipt {
            trait_path: batch.trait_path.clone(),
            groups,
            facts,
        });
    }

    /// Facts for `key` in insertion order; empty when the key is unknown.
    pub fn query(&self, key: &GroupKey) -> &[Fact] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Like `query`, with repeated listings of the same impl collapsed to the
    /// first occurrence.
    pub fn distinct(&self, key: &GroupKey) -> Vec<&Fact> {
        let mut seen = HashSet::new();
        self.query(key)
            .iter()
            .filter(|fact| seen.insert(fact.identity()))
            .collect()
    }

    /// Group keys in first-registration order.
    pub fn groups(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    /// Every fact for one trait across all groups, in registration order.
    pub fn implementors<'a>(
        &'a self,
        trait_path: &'a TraitPath,
    ) -> impl Iterator<Item = &'a Fact> {
        self.groups
            .values()
            .flatten()
            .filter(move |fact| &fact.trait_ref.path == trait_path)
    }

    /// Distinct trait paths implemented inside one group, first seen first.
    pub fn traits_for(&self, key: &GroupKey) -> Vec<&TraitPath> {
        self.query(key)
            .iter()
            .map(|fact| &fact.trait_ref.path)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn receipts(&self) -> &[BatchReceipt] {
        &self.receipts
    }

    /// Total number of facts held.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn group_map(&self) -> &IndexMap<GroupKey, Vec<Fact>> {
        &self.groups
    }

    /// Rebuild a registry from already-grouped facts (snapshot import).
    pub(crate) fn from_groups(groups: IndexMap<GroupKey, Vec<Fact>>) -> Self {
        let groups = groups
            .into_iter()
            .filter(|(_, facts)| !facts.is_empty())
            .collect();
        Self {
            groups,
            receipts: Vec::new(),
        }
    }
}
