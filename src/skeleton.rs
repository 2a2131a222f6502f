//! Folder/file summary of the indexed tree with rolled-up metrics.

use crate::indexer::scan;
use crate::metrics::{self, FileAggregate, SymbolMetrics};
use crate::model::{
    ArchitectureSkeleton, EdgeKind, FileRecord, SkeletonEdge, SkeletonNode, SkeletonNodeKind,
    Symbol,
};
use crate::subgraph::CallGraph;
use crate::util;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub struct SkeletonInput<'a> {
    pub files: &'a [FileRecord],
    pub symbols: &'a [Symbol],
    pub graph: &'a CallGraph,
    /// `(source path, target path, kind)` for edges crossing files.
    pub cross_file_edges: &'a [(String, String, EdgeKind)],
    pub blast_radius_depth: usize,
}

struct FileEntry {
    folders: Vec<String>,
    name: String,
}

pub fn build(input: &SkeletonInput<'_>) -> ArchitectureSkeleton {
    let mut entries: BTreeMap<String, FileEntry> = BTreeMap::new();
    for file in input.files {
        let (dirs, name) = util::split_path(&file.path);
        if name.is_empty() || dirs.iter().any(|dir| scan::is_excluded_dir(dir)) {
            continue;
        }
        let absolute = file.path.starts_with('/');
        let mut folders = Vec::with_capacity(dirs.len());
        let mut prefix = String::new();
        for (depth, dir) in dirs.iter().enumerate() {
            if depth > 0 || absolute {
                prefix.push('/');
            }
            prefix.push_str(dir);
            folders.push(prefix.clone());
        }
        entries.insert(
            file.path.clone(),
            FileEntry {
                folders,
                name: name.to_string(),
            },
        );
    }

    // Folders shared by every file collapse into the single root folder.
    let shared = shared_prefix_len(entries.values().map(|e| e.folders.as_slice()));
    let root_depth = shared.saturating_sub(1);
    for entry in entries.values_mut() {
        if shared > 0 {
            entry.folders.drain(..root_depth);
        }
    }

    let mut per_file: HashMap<&str, Vec<SymbolMetrics>> = HashMap::new();
    for symbol in input.symbols {
        if entries.contains_key(&symbol.file_path) {
            per_file
                .entry(symbol.file_path.as_str())
                .or_default()
                .push(metrics::symbol_metrics(symbol, input.graph, input.blast_radius_depth));
        }
    }

    let mut imports: HashMap<&str, BTreeSet<String>> = HashMap::new();
    let mut file_edges: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut folder_edges: BTreeMap<(String, String), usize> = BTreeMap::new();
    for (source, target, kind) in input.cross_file_edges {
        let (Some(from), Some(to)) = (entries.get(source), entries.get(target)) else {
            continue;
        };
        if *kind == EdgeKind::Import {
            imports.entry(source.as_str()).or_default().insert(target.clone());
        }
        *file_edges.entry((source.clone(), target.clone())).or_default() += 1;

        let common = from
            .folders
            .iter()
            .zip(&to.folders)
            .take_while(|(a, b)| a == b)
            .count();
        for (a, b) in from.folders[common..].iter().zip(&to.folders[common..]) {
            *folder_edges.entry((a.clone(), b.clone())).or_default() += 1;
        }
    }

    let mut aggregates: BTreeMap<String, FileAggregate> = BTreeMap::new();
    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut parents: HashMap<String, Option<String>> = HashMap::new();
    let mut kinds: HashMap<String, SkeletonNodeKind> = HashMap::new();
    let mut names: HashMap<String, String> = HashMap::new();

    for (path, entry) in &entries {
        let metrics = per_file.get(path.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        aggregates.insert(path.clone(), FileAggregate::from_metrics(metrics));
        kinds.insert(path.clone(), SkeletonNodeKind::File);
        names.insert(path.clone(), entry.name.clone());
        parents.insert(path.clone(), entry.folders.last().cloned());

        let mut parent: Option<&String> = None;
        for folder in &entry.folders {
            if !kinds.contains_key(folder) {
                kinds.insert(folder.clone(), SkeletonNodeKind::Folder);
                names.insert(folder.clone(), folder_name(folder));
                parents.insert(folder.clone(), parent.cloned());
                if let Some(parent) = parent {
                    children.entry(parent.clone()).or_default().push(folder.clone());
                }
            }
            parent = Some(folder);
        }
        if let Some(parent) = entry.folders.last() {
            children.entry(parent.clone()).or_default().push(path.clone());
        }
    }

    // Deepest folders first so every child is final before its parent.
    let mut folders: Vec<&String> = kinds
        .iter()
        .filter(|(_, kind)| **kind == SkeletonNodeKind::Folder)
        .map(|(id, _)| id)
        .collect();
    folders.sort_by(|a, b| depth_of(b).cmp(&depth_of(a)).then_with(|| a.cmp(b)));
    for folder in folders {
        let child_aggregates: Vec<FileAggregate> = children
            .get(folder)
            .map(|ids| ids.iter().filter_map(|id| aggregates.get(id).copied()).collect())
            .unwrap_or_default();
        aggregates.insert(folder.clone(), FileAggregate::combine(&child_aggregates));
    }

    let nodes = aggregates
        .iter()
        .map(|(id, aggregate)| SkeletonNode {
            id: id.clone(),
            name: names.get(id).cloned().unwrap_or_default(),
            kind: kinds.get(id).copied().unwrap_or(SkeletonNodeKind::File),
            parent: parents.get(id).cloned().flatten(),
            symbol_count: aggregate.symbol_count,
            complexity: aggregate.complexity,
            fragility: aggregate.fragility,
            blast_radius: aggregate.blast_radius,
            imports: imports
                .get(id.as_str())
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default(),
        })
        .collect();

    let edges = file_edges
        .into_iter()
        .chain(folder_edges)
        .map(|((source, target), weight)| SkeletonEdge {
            source,
            target,
            weight,
        })
        .collect();

    ArchitectureSkeleton { nodes, edges }
}

fn shared_prefix_len<'a>(mut chains: impl Iterator<Item = &'a [String]>) -> usize {
    let Some(first) = chains.next() else {
        return 0;
    };
    let mut len = first.len();
    for chain in chains {
        len = len.min(
            first
                .iter()
                .zip(chain)
                .take_while(|(a, b)| a == b)
                .count(),
        );
    }
    len
}

fn folder_name(path: &str) -> String {
    path.rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or(path)
        .to_string()
}

fn depth_of(path: &str) -> usize {
    path.matches('/').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SymbolKind;

    fn file(id: i64, path: &str) -> FileRecord {
        FileRecord {
            id,
            path: path.to_string(),
            language: "typescript".into(),
            content_hash: None,
            last_indexed_at: None,
        }
    }

    fn symbol(id: i64, path: &str, complexity: i64) -> Symbol {
        Symbol {
            id,
            name: format!("s{id}"),
            kind: SymbolKind::Function,
            file_path: path.to_string(),
            start_line: 1,
            start_col: 1,
            end_line: 2,
            end_col: 1,
            complexity,
            domain: None,
            risk_score: None,
        }
    }

    fn node<'a>(skeleton: &'a ArchitectureSkeleton, id: &str) -> &'a SkeletonNode {
        skeleton.nodes.iter().find(|n| n.id == id).unwrap()
    }

    #[test]
    fn builds_rolled_up_tree() {
        let files = vec![
            file(1, "/repo/src/api/client.ts"),
            file(2, "/repo/src/ui/view.tsx"),
            file(3, "/repo/node_modules/dep/index.js"),
        ];
        let symbols = vec![
            symbol(1, "/repo/src/api/client.ts", 3),
            symbol(2, "/repo/src/ui/view.tsx", 1),
            symbol(3, "/repo/src/ui/view.tsx", 1),
        ];
        let mut graph = CallGraph::default();
        graph.add(2, 1);
        graph.add(3, 1);
        let cross = vec![
            ("/repo/src/ui/view.tsx".to_string(), "/repo/src/api/client.ts".to_string(), EdgeKind::Call),
            ("/repo/src/ui/view.tsx".to_string(), "/repo/src/api/client.ts".to_string(), EdgeKind::Import),
        ];
        let skeleton = build(&SkeletonInput {
            files: &files,
            symbols: &symbols,
            graph: &graph,
            cross_file_edges: &cross,
            blast_radius_depth: 5,
        });

        assert!(skeleton.nodes.iter().all(|n| !n.id.contains("node_modules")));
        let root = node(&skeleton, "/repo/src");
        assert_eq!(root.parent, None);
        assert_eq!(root.kind, SkeletonNodeKind::Folder);
        assert_eq!(root.symbol_count, 3);
        // (3 * 1 + 1 * 2) / 3
        assert!((root.complexity - 5.0 / 3.0).abs() < 1e-9);
        // client: 3 * 1, view: mean of 2 and 2
        assert_eq!(root.fragility, 5.0);
        assert_eq!(root.blast_radius, 2);

        let view = node(&skeleton, "/repo/src/ui/view.tsx");
        assert_eq!(view.parent.as_deref(), Some("/repo/src/ui"));
        assert_eq!(view.imports, vec!["/repo/src/api/client.ts".to_string()]);

        let weights: Vec<(&str, &str, usize)> = skeleton
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.weight))
            .collect();
        assert_eq!(
            weights,
            vec![
                ("/repo/src/ui/view.tsx", "/repo/src/api/client.ts", 2),
                ("/repo/src/ui", "/repo/src/api", 2),
            ]
        );
    }

    #[test]
    fn empty_index_gives_empty_skeleton() {
        let skeleton = build(&SkeletonInput {
            files: &[],
            symbols: &[],
            graph: &CallGraph::default(),
            cross_file_edges: &[],
            blast_radius_depth: 5,
        });
        assert_eq!(skeleton, ArchitectureSkeleton::default());
    }
}
