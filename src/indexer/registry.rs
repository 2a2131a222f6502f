//! String interning for file paths, symbol names and module keys.
//!
//! Ids are dense, start at 0 and never change for the lifetime of a
//! registry, so hot-path structures can key on `u32` instead of `String`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type StrId = u32;

#[derive(Debug, Clone, Default)]
pub struct StringRegistry {
    ids: HashMap<String, StrId>,
    strings: Vec<String>,
}

impl StringRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `value`, assigning the next free id on first sight.
    pub fn intern(&mut self, value: &str) -> StrId {
        if let Some(&id) = self.ids.get(value) {
            return id;
        }
        let id = self.strings.len() as StrId;
        self.strings.push(value.to_string());
        self.ids.insert(value.to_string(), id);
        id
    }

    pub fn get(&self, value: &str) -> Option<StrId> {
        self.ids.get(value).copied()
    }

    pub fn resolve(&self, id: StrId) -> Option<&str> {
        self.strings.get(id as usize).map(String::as_str)
    }

    pub fn has(&self, value: &str) -> bool {
        self.ids.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            strings: self.strings.clone(),
        }
    }
}

/// Read-only copy of a registry's id space, shareable with other workers.
///
/// Position in `strings` is the id, so serializing and reloading keeps the
/// assignment exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    strings: Vec<String>,
}

impl RegistrySnapshot {
    pub fn resolve(&self, id: StrId) -> Option<&str> {
        self.strings.get(id as usize).map(String::as_str)
    }

    /// Linear lookup; callers that need many reverse lookups should convert
    /// into a registry first.
    pub fn get(&self, value: &str) -> Option<StrId> {
        self.strings
            .iter()
            .position(|s| s == value)
            .map(|idx| idx as StrId)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl From<RegistrySnapshot> for StringRegistry {
    fn from(snapshot: RegistrySnapshot) -> Self {
        let mut ids = HashMap::with_capacity(snapshot.strings.len());
        for (idx, value) in snapshot.strings.iter().enumerate() {
            ids.entry(value.clone()).or_insert(idx as StrId);
        }
        StringRegistry {
            ids,
            strings: snapshot.strings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent_and_dense() {
        let mut registry = StringRegistry::new();
        let a = registry.intern("a.ts");
        let b = registry.intern("helper");
        let again = registry.intern("a.ts");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(again, a);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve(b), Some("helper"));
        assert_eq!(registry.resolve(7), None);
        assert!(registry.has("helper"));
        assert!(!registry.has("main"));
    }

    #[test]
    fn snapshot_round_trip_preserves_ids() {
        let mut registry = StringRegistry::new();
        for value in ["x", "y", "z"] {
            registry.intern(value);
        }
        let json = serde_json::to_string(&registry.snapshot()).unwrap();
        let snapshot: RegistrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.get("y"), Some(1));
        assert_eq!(snapshot.resolve(2), Some("z"));

        let mut rebuilt = StringRegistry::from(snapshot);
        assert_eq!(rebuilt.get("z"), Some(2));
        assert_eq!(rebuilt.intern("w"), 3);
    }
}
