//! In-memory lookup structure over persisted symbols.
//!
//! Rebuilt from the store for every indexing session; it owns no state the
//! store cannot reproduce.

use crate::indexer::registry::{StrId, StringRegistry};
use crate::model::{Symbol, SymbolKind};
use crate::util;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub db_id: i64,
    pub name_id: StrId,
    pub path_id: StrId,
    pub kind: SymbolKind,
    pub line: i64,
}

#[inline]
pub fn composite_key(path_id: StrId, name_id: StrId) -> u64 {
    ((path_id as u64) << 32) | name_id as u64
}

#[derive(Debug, Default)]
pub struct CompositeIndex {
    primary: HashMap<u64, i64>,
    by_name: HashMap<StrId, Vec<i64>>,
    by_path: HashMap<StrId, Vec<IndexEntry>>,
    module_aliases: HashMap<StrId, StrId>,
    len: usize,
}

impl CompositeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index over every persisted symbol, registering each
    /// file's module key along the way.
    pub fn build(symbols: &[Symbol], registry: &mut StringRegistry) -> Self {
        let mut index = CompositeIndex {
            primary: HashMap::with_capacity(symbols.len()),
            by_name: HashMap::with_capacity(symbols.len()),
            ..Default::default()
        };
        let mut last_path: Option<(&str, StrId)> = None;
        for symbol in symbols {
            let path_id = match last_path {
                Some((path, id)) if path == symbol.file_path => id,
                _ => {
                    let id = registry.intern(&symbol.file_path);
                    let key_id = registry.intern(&util::module_key(&symbol.file_path));
                    index.register_module(key_id, id);
                    last_path = Some((symbol.file_path.as_str(), id));
                    id
                }
            };
            index.register(IndexEntry {
                db_id: symbol.id,
                name_id: registry.intern(&symbol.name),
                path_id,
                kind: symbol.kind,
                line: symbol.start_line,
            });
        }
        index
    }

    /// Inserts into all lookup structures; the first symbol registered for
    /// a (path, name) pair keeps the exact slot.
    pub fn register(&mut self, entry: IndexEntry) {
        self.primary
            .entry(composite_key(entry.path_id, entry.name_id))
            .or_insert(entry.db_id);
        self.by_name.entry(entry.name_id).or_default().push(entry.db_id);
        self.by_path.entry(entry.path_id).or_default().push(entry);
        self.len += 1;
    }

    pub fn register_module(&mut self, module_key_id: StrId, path_id: StrId) {
        self.module_aliases.entry(module_key_id).or_insert(path_id);
    }

    pub fn lookup_exact(&self, path_id: StrId, name_id: StrId) -> Option<i64> {
        self.primary.get(&composite_key(path_id, name_id)).copied()
    }

    pub fn lookup_by_name(&self, name_id: StrId) -> &[i64] {
        self.by_name.get(&name_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lookup_by_path(&self, path_id: StrId) -> &[IndexEntry] {
        self.by_path.get(&path_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Path id of the file a module key stands for.
    pub fn module_path(&self, module_key_id: StrId) -> Option<StrId> {
        self.module_aliases.get(&module_key_id).copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(id: i64, name: &str, path: &str, line: i64) -> Symbol {
        Symbol {
            id,
            name: name.to_string(),
            kind: SymbolKind::Function,
            file_path: path.to_string(),
            start_line: line,
            start_col: 1,
            end_line: line,
            end_col: 2,
            complexity: 1,
            domain: None,
            risk_score: None,
        }
    }

    #[test]
    fn build_fills_every_map() {
        let symbols = vec![
            symbol(1, "helper", "/repo/a.ts", 1),
            symbol(2, "main", "/repo/a.ts", 2),
            symbol(3, "helper", "/repo/lib/index.ts", 1),
        ];
        let mut registry = StringRegistry::new();
        let index = CompositeIndex::build(&symbols, &mut registry);
        let a = registry.get("/repo/a.ts").unwrap();
        let helper = registry.get("helper").unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup_exact(a, helper), Some(1));
        assert_eq!(index.lookup_by_name(helper), &[1, 3]);
        assert_eq!(index.lookup_by_path(a).len(), 2);
        let lib_key = registry.get("/repo/lib").unwrap();
        assert_eq!(index.module_path(lib_key), registry.get("/repo/lib/index.ts"));
    }

    #[test]
    fn first_writer_wins_on_duplicate_pair() {
        let mut index = CompositeIndex::new();
        for (db_id, line) in [(10, 1), (11, 9)] {
            index.register(IndexEntry {
                db_id,
                name_id: 1,
                path_id: 0,
                kind: SymbolKind::Function,
                line,
            });
        }
        assert_eq!(index.lookup_exact(0, 1), Some(10));
        assert_eq!(index.lookup_by_name(1), &[10, 11]);
        assert!(index.lookup_by_name(99).is_empty());
    }

    #[test]
    fn composite_key_keeps_halves_apart() {
        assert_ne!(composite_key(1, 2), composite_key(2, 1));
        assert_eq!(composite_key(1, 0) >> 32, 1);
    }
}
