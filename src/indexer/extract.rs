use crate::indexer::registry::{StrId, StringRegistry};
use crate::model::SymbolKind;
use tree_sitter::Tree;

/// Reference to the symbol a pending relationship originates from.
///
/// Extraction runs before any row exists, so callers start out as the index
/// into their file's symbol list and are translated to row ids once the
/// symbols have been flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerRef {
    Provisional(usize),
    Persisted(i64),
}

impl CallerRef {
    /// Shifts a provisional reference by the number of symbols buffered
    /// ahead of this file; persisted references are left alone.
    pub fn rebase(self, offset: usize) -> Self {
        match self {
            CallerRef::Provisional(local) => CallerRef::Provisional(local + offset),
            persisted => persisted,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSymbol {
    pub name: String,
    pub name_id: StrId,
    pub kind: SymbolKind,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub complexity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCall {
    pub caller: CallerRef,
    pub caller_path_id: StrId,
    pub callee_name_id: StrId,
    /// Module key of the import binding the callee name matched, if any.
    pub import_source_id: Option<StrId>,
    /// Exported (pre-alias) name of that binding.
    pub imported_name_id: Option<StrId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingImport {
    /// Representative symbol of the importing file; `None` when the file
    /// declares nothing.
    pub importer: Option<CallerRef>,
    pub importer_path_id: StrId,
    pub source_module_id: StrId,
    pub imported_name_id: StrId,
    pub local_name_id: StrId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Named,
    Default,
    Namespace,
}

/// One local name introduced by an import statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportBinding {
    pub kind: BindingKind,
    pub source_module_id: StrId,
    /// `None` for namespace bindings, which stand for the whole module.
    pub imported_name_id: Option<StrId>,
}

#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub path: String,
    pub path_id: StrId,
    pub symbols: Vec<ExtractedSymbol>,
    pub pending_calls: Vec<PendingCall>,
    pub pending_imports: Vec<PendingImport>,
    /// Malformed sub-trees skipped during traversal.
    pub skipped_nodes: usize,
}

impl ExtractedFile {
    pub fn new(path: &str, path_id: StrId) -> Self {
        Self {
            path: path.to_string(),
            path_id,
            symbols: Vec::new(),
            pending_calls: Vec::new(),
            pending_imports: Vec::new(),
            skipped_nodes: 0,
        }
    }

    /// Rebases every provisional caller in this file by `offset`.
    pub fn rebase(&mut self, offset: usize) {
        for call in &mut self.pending_calls {
            call.caller = call.caller.rebase(offset);
        }
        for import in &mut self.pending_imports {
            import.importer = import.importer.map(|caller| caller.rebase(offset));
        }
    }
}

pub trait LanguageExtractor {
    fn extract(
        &self,
        tree: &Tree,
        source: &str,
        file_path: &str,
        registry: &mut StringRegistry,
    ) -> ExtractedFile;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_only_moves_provisional_callers() {
        let mut file = ExtractedFile::new("a.ts", 0);
        file.pending_calls.push(PendingCall {
            caller: CallerRef::Provisional(2),
            caller_path_id: 0,
            callee_name_id: 3,
            import_source_id: None,
            imported_name_id: None,
        });
        file.pending_calls.push(PendingCall {
            caller: CallerRef::Persisted(42),
            caller_path_id: 0,
            callee_name_id: 3,
            import_source_id: None,
            imported_name_id: None,
        });
        file.pending_imports.push(PendingImport {
            importer: None,
            importer_path_id: 0,
            source_module_id: 4,
            imported_name_id: 3,
            local_name_id: 3,
        });
        file.rebase(10);
        assert_eq!(file.pending_calls[0].caller, CallerRef::Provisional(12));
        assert_eq!(file.pending_calls[1].caller, CallerRef::Persisted(42));
        assert_eq!(file.pending_imports[0].importer, None);
    }
}
