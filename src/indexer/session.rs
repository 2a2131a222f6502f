//! Working state for one indexing call, and the per-file domain cache the
//! indexer keeps between calls.

use crate::indexer::composite::CompositeIndex;
use crate::indexer::registry::{RegistrySnapshot, StringRegistry};
use crate::model::Symbol;
use std::collections::HashMap;

/// Registry and lookup index for a single `index_file` / `index_batch`
/// call. Dropped when the call returns.
#[derive(Debug, Default)]
pub struct IndexSession {
    registry: StringRegistry,
    index: CompositeIndex,
    touched: Vec<String>,
}

impl IndexSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry_mut(&mut self) -> &mut StringRegistry {
        &mut self.registry
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    /// Replaces the lookup index with one built over `symbols`.
    pub fn rebuild_index(&mut self, symbols: &[Symbol]) -> &CompositeIndex {
        self.index = CompositeIndex::build(symbols, &mut self.registry);
        &self.index
    }

    pub fn index(&self) -> &CompositeIndex {
        &self.index
    }

    /// Records that `path` was rewritten during this session.
    pub fn touch(&mut self, path: &str) {
        self.touched.push(path.to_string());
    }

    pub fn touched(&self) -> &[String] {
        &self.touched
    }
}

/// Dominant domain per file, as last derived from classifier output.
///
/// Entries are dropped whenever their file is re-indexed, removed or has a
/// symbol reclassified; a miss means "ask the store".
#[derive(Debug, Default)]
pub struct DomainCache {
    entries: HashMap<String, Option<String>>,
}

impl DomainCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Option<&str>> {
        self.entries.get(path).map(Option::as_deref)
    }

    pub fn insert(&mut self, path: &str, domain: Option<String>) {
        self.entries.insert(path.to_string(), domain);
    }

    pub fn invalidate(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn invalidate_all<'a>(&mut self, paths: impl IntoIterator<Item = &'a String>) {
        for path in paths {
            self.entries.remove(path);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Most frequent domain among `symbols`; ties go to the name that sorts
/// first.
pub fn dominant_domain(symbols: &[Symbol]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for domain in symbols.iter().filter_map(|s| s.domain.as_deref()) {
        *counts.entry(domain).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(domain, _)| domain.to_string())
}
