use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Enum,
    Type,
    Variable,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Type => "type",
            SymbolKind::Variable => "variable",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "function" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "enum" => SymbolKind::Enum,
            "type" => SymbolKind::Type,
            "variable" => SymbolKind::Variable,
            other => anyhow::bail!("unknown symbol kind `{other}`"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Call,
    Import,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Call => "call",
            EdgeKind::Import => "import",
        }
    }
}

impl FromStr for EdgeKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "call" => Ok(EdgeKind::Call),
            "import" => Ok(EdgeKind::Import),
            other => anyhow::bail!("unknown edge kind `{other}`"),
        }
    }
}

/// Which resolution strategy produced an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeReason {
    ImportBridge,
    SameFile,
    GlobalFallback,
    Import,
}

impl EdgeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeReason::ImportBridge => "import_bridge",
            EdgeReason::SameFile => "same_file",
            EdgeReason::GlobalFallback => "global_fallback",
            EdgeReason::Import => "import",
        }
    }

    pub fn confidence(self) -> f64 {
        match self {
            EdgeReason::ImportBridge | EdgeReason::Import => 1.0,
            EdgeReason::SameFile => 0.8,
            EdgeReason::GlobalFallback => 0.3,
        }
    }
}

impl FromStr for EdgeReason {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "import_bridge" => EdgeReason::ImportBridge,
            "same_file" => EdgeReason::SameFile,
            "global_fallback" => EdgeReason::GlobalFallback,
            "import" => EdgeReason::Import,
            other => anyhow::bail!("unknown edge reason `{other}`"),
        })
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Symbol {
    pub id: i64,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub complexity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Edge {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
    pub reason: Option<EdgeReason>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Serialize, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub language: String,
    pub content_hash: Option<String>,
    pub last_indexed_at: Option<i64>,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexFileStats {
    pub symbol_count: usize,
    pub edge_count: usize,
    /// True when the stored fingerprint matched and nothing was rewritten.
    pub unchanged: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct BatchStats {
    pub total_symbols: usize,
    pub total_edges: usize,
    pub files_requested: usize,
    pub files_processed: usize,
    pub files_unchanged: usize,
    pub failures: Vec<FileFailure>,
    pub dropped_calls: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub symbol_count: i64,
    pub edge_count: i64,
    pub file_count: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct SymbolContext {
    pub symbol: Symbol,
    pub neighbors: Vec<Symbol>,
    pub incoming_edges: Vec<Edge>,
    pub outgoing_edges: Vec<Edge>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DomainSummary {
    pub domain: String,
    pub symbol_count: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct GraphExport {
    pub symbols: Vec<Symbol>,
    pub edges: Vec<Edge>,
    pub files: Vec<FileRecord>,
    pub domains: Vec<DomainSummary>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkeletonNodeKind {
    Folder,
    File,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SkeletonNode {
    pub id: String,
    pub name: String,
    pub kind: SkeletonNodeKind,
    pub parent: Option<String>,
    pub symbol_count: usize,
    pub complexity: f64,
    pub fragility: f64,
    pub blast_radius: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SkeletonEdge {
    pub source: String,
    pub target: String,
    pub weight: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ArchitectureSkeleton {
    pub nodes: Vec<SkeletonNode>,
    pub edges: Vec<SkeletonEdge>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceDirection {
    Root,
    Upstream,
    Downstream,
}

#[derive(Debug, Serialize, Clone)]
pub struct TraceNode {
    pub id: i64,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    /// Negative upstream, positive downstream, zero for the traced symbol.
    pub depth: i64,
    pub direction: TraceDirection,
    pub is_sink: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TraceEdge {
    pub source: i64,
    pub target: i64,
    pub kind: EdgeKind,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct FunctionTrace {
    pub nodes: Vec<TraceNode>,
    pub edges: Vec<TraceEdge>,
}
