//! Turns pending calls and imports into concrete edges.

use crate::error::IndexError;
use crate::indexer::composite::CompositeIndex;
use crate::indexer::extract::{CallerRef, PendingCall, PendingImport};
use crate::model::{EdgeKind, EdgeReason};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedEdge {
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
    pub reason: EdgeReason,
}

impl ResolvedEdge {
    pub fn confidence(&self) -> f64 {
        self.reason.confidence()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub import_bridge: usize,
    pub same_file: usize,
    pub global_fallback: usize,
    pub imports: usize,
    pub unresolved: usize,
    pub duplicates: usize,
    pub dropped_provisional: usize,
}

impl ResolutionStats {
    pub fn edges(&self) -> usize {
        self.import_bridge + self.same_file + self.global_fallback + self.imports
    }

    fn record(&mut self, reason: EdgeReason) {
        match reason {
            EdgeReason::ImportBridge => self.import_bridge += 1,
            EdgeReason::SameFile => self.same_file += 1,
            EdgeReason::GlobalFallback => self.global_fallback += 1,
            EdgeReason::Import => self.imports += 1,
        }
    }
}

#[inline]
fn pair_key(source: i64, target: i64) -> u128 {
    ((source as u64 as u128) << 64) | target as u64 as u128
}

fn persisted(caller: CallerRef, stats: &mut ResolutionStats) -> Option<i64> {
    match caller {
        CallerRef::Persisted(id) => Some(id),
        CallerRef::Provisional(local) => {
            stats.dropped_provisional += 1;
            tracing::warn!("{}, dropping call", IndexError::ResolutionInconsistency(local));
            None
        }
    }
}

/// Resolves each call with the first strategy that succeeds: import bridge,
/// then same file, then the first same-named symbol anywhere.
pub fn resolve_calls(
    pending: &[PendingCall],
    index: &CompositeIndex,
    stats: &mut ResolutionStats,
) -> Vec<ResolvedEdge> {
    let mut seen: HashSet<u128> = HashSet::with_capacity(pending.len());
    let mut edges = Vec::with_capacity(pending.len());
    for call in pending {
        let Some(source_id) = persisted(call.caller, stats) else {
            continue;
        };
        let Some((target_id, reason)) = resolve_call(call, source_id, index) else {
            stats.unresolved += 1;
            continue;
        };
        if !seen.insert(pair_key(source_id, target_id)) {
            stats.duplicates += 1;
            continue;
        }
        stats.record(reason);
        edges.push(ResolvedEdge {
            source_id,
            target_id,
            kind: EdgeKind::Call,
            reason,
        });
    }
    edges
}

fn resolve_call(call: &PendingCall, source_id: i64, index: &CompositeIndex) -> Option<(i64, EdgeReason)> {
    if let Some(module_id) = call.import_source_id {
        let name_id = call.imported_name_id.unwrap_or(call.callee_name_id);
        let target = index
            .module_path(module_id)
            .and_then(|path_id| index.lookup_exact(path_id, name_id))
            .filter(|&target| target != source_id);
        if let Some(target) = target {
            return Some((target, EdgeReason::ImportBridge));
        }
    }

    if let Some(entry) = index
        .lookup_by_path(call.caller_path_id)
        .iter()
        .find(|entry| entry.name_id == call.callee_name_id && entry.db_id != source_id)
    {
        return Some((entry.db_id, EdgeReason::SameFile));
    }

    index
        .lookup_by_name(call.callee_name_id)
        .iter()
        .copied()
        .find(|&target| target != source_id)
        .map(|target| (target, EdgeReason::GlobalFallback))
}

/// Maps import statements to edges; exact lookups only.
pub fn resolve_imports(
    pending: &[PendingImport],
    index: &CompositeIndex,
    stats: &mut ResolutionStats,
) -> Vec<ResolvedEdge> {
    let mut seen: HashSet<u128> = HashSet::with_capacity(pending.len());
    let mut edges = Vec::new();
    for import in pending {
        let Some(importer) = import.importer else {
            continue;
        };
        let Some(source_id) = persisted(importer, stats) else {
            continue;
        };
        let target = index
            .module_path(import.source_module_id)
            .and_then(|path_id| index.lookup_exact(path_id, import.imported_name_id))
            .filter(|&target| target != source_id);
        let Some(target_id) = target else {
            stats.unresolved += 1;
            continue;
        };
        if !seen.insert(pair_key(source_id, target_id)) {
            stats.duplicates += 1;
            continue;
        }
        stats.record(EdgeReason::Import);
        edges.push(ResolvedEdge {
            source_id,
            target_id,
            kind: EdgeKind::Import,
            reason: EdgeReason::Import,
        });
    }
    edges
}
