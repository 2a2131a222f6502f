use crate::model::Symbol;
use crate::subgraph::CallGraph;

/// Substrings that mark a symbol as a likely I/O boundary.
pub const SINK_MARKERS: &[&str] = &[
    "fetch",
    "query",
    "db",
    "sql",
    "http",
    "request",
    "axios",
    "api",
    "repository",
    "save",
    "write",
    "read",
    "socket",
    "storage",
];

/// `complexity × (outgoing calls + 1)`.
pub fn fragility(complexity: i64, outgoing_calls: usize) -> f64 {
    complexity.max(1) as f64 * (outgoing_calls as f64 + 1.0)
}

pub fn is_sink(name: &str, file_path: &str) -> bool {
    let name = name.to_ascii_lowercase();
    let path = file_path.to_ascii_lowercase();
    SINK_MARKERS
        .iter()
        .any(|marker| name.contains(marker) || path.contains(marker))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolMetrics {
    pub complexity: i64,
    pub fragility: f64,
    pub blast_radius: usize,
}

pub fn symbol_metrics(symbol: &Symbol, graph: &CallGraph, blast_depth: usize) -> SymbolMetrics {
    SymbolMetrics {
        complexity: symbol.complexity,
        fragility: fragility(symbol.complexity, graph.callees(symbol.id).len()),
        blast_radius: graph.blast_radius(symbol.id, blast_depth),
    }
}

/// Per-file roll-up: symbol count, mean complexity and fragility, max
/// blast radius.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FileAggregate {
    pub symbol_count: usize,
    pub complexity: f64,
    pub fragility: f64,
    pub blast_radius: usize,
}

impl FileAggregate {
    pub fn from_metrics(metrics: &[SymbolMetrics]) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }
        let n = metrics.len() as f64;
        FileAggregate {
            symbol_count: metrics.len(),
            complexity: metrics.iter().map(|m| m.complexity as f64).sum::<f64>() / n,
            fragility: metrics.iter().map(|m| m.fragility).sum::<f64>() / n,
            blast_radius: metrics.iter().map(|m| m.blast_radius).max().unwrap_or(0),
        }
    }

    /// Folder roll-up of child aggregates: counts and fragility add up,
    /// complexity is weighted by symbol count, blast radius is the max.
    pub fn combine(children: &[FileAggregate]) -> Self {
        let symbol_count: usize = children.iter().map(|c| c.symbol_count).sum();
        let weighted: f64 = children
            .iter()
            .map(|c| c.complexity * c.symbol_count as f64)
            .sum();
        FileAggregate {
            symbol_count,
            complexity: if symbol_count == 0 {
                0.0
            } else {
                weighted / symbol_count as f64
            },
            fragility: children.iter().map(|c| c.fragility).sum(),
            blast_radius: children.iter().map(|c| c.blast_radius).max().unwrap_or(0),
        }
    }
}
