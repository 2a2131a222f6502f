use symgraph::db::META_SKELETON;
use symgraph::indexer::parser::Language;
use symgraph::model::{EdgeKind, SkeletonNodeKind, Symbol, TraceDirection};
use symgraph::{Indexer, SourceFile};
use tempfile::TempDir;

const CLIENT: &str = r#"
export function fetchUser(id: string) {
  return http(id);
}

function http(id: string) {
  return id;
}
"#;

const SERVICE: &str = r#"
import { fetchUser } from './client';

export function loadProfile(id: string) {
  return fetchUser(id);
}
"#;

const VIEW: &str = r#"
import { loadProfile } from '../api/service';

export function ProfileView() {
  return <div>{loadProfile("1")}</div>;
}

export function Page() {
  return ProfileView();
}
"#;

struct Fixture {
    temp: TempDir,
    indexer: Indexer,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut indexer = Indexer::open(&temp.path().join(".symgraph").join("graph.sqlite")).unwrap();
        let files = vec![
            SourceFile::new(path(&temp, "src/api/client.ts"), CLIENT, Language::TypeScript),
            SourceFile::new(path(&temp, "src/api/service.ts"), SERVICE, Language::TypeScript),
            SourceFile::new(path(&temp, "src/ui/view.tsx"), VIEW, Language::Tsx),
        ];
        let stats = indexer.index_batch(&files).unwrap();
        assert!(stats.failures.is_empty());
        Fixture { temp, indexer }
    }

    fn path(&self, rel: &str) -> String {
        path(&self.temp, rel)
    }

    fn symbol(&self, name: &str) -> Symbol {
        self.indexer
            .query_symbols_by_name(name)
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }
}

fn path(temp: &TempDir, rel: &str) -> String {
    temp.path().join(rel).to_string_lossy().to_string()
}

#[test]
fn blast_radius_counts_transitive_callers() {
    let fx = Fixture::new();
    assert_eq!(fx.indexer.blast_radius(fx.symbol("http").id).unwrap(), 4);
    assert_eq!(fx.indexer.blast_radius(fx.symbol("loadProfile").id).unwrap(), 2);
    assert_eq!(fx.indexer.blast_radius(fx.symbol("Page").id).unwrap(), 0);
    assert_eq!(fx.indexer.blast_radius(999_999).unwrap(), 0);
}

#[test]
fn symbol_context_lists_direct_neighbours() {
    let fx = Fixture::new();
    let load = fx.symbol("loadProfile");
    let context = fx.indexer.symbol_context(load.id).unwrap().unwrap();
    assert_eq!(context.symbol.id, load.id);
    let mut names: Vec<&str> = context.neighbors.iter().map(|s| s.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["ProfileView", "fetchUser"]);
    assert_eq!(context.incoming_edges.len(), 2);
    assert_eq!(context.outgoing_edges.len(), 2);
    assert!(fx.indexer.symbol_context(999_999).unwrap().is_none());
}

#[test]
fn function_trace_walks_callers_and_callees() {
    let fx = Fixture::new();
    let load = fx.symbol("loadProfile");
    let trace = fx.indexer.function_trace_with_depth(load.id, 3, None).unwrap();

    let by_name: Vec<(&str, i64)> = trace.nodes.iter().map(|n| (n.name.as_str(), n.depth)).collect();
    assert_eq!(by_name[0], ("loadProfile", 0));
    assert!(by_name.contains(&("fetchUser", 1)));
    assert!(by_name.contains(&("http", 2)));
    assert!(by_name.contains(&("ProfileView", -1)));
    assert!(by_name.contains(&("Page", -2)));
    assert_eq!(trace.edges.len(), 4);
    assert!(trace.edges.iter().all(|e| e.kind == EdgeKind::Call));

    let fetch = trace.nodes.iter().find(|n| n.name == "fetchUser").unwrap();
    assert!(fetch.is_sink);
    assert_eq!(fetch.direction, TraceDirection::Downstream);

    let shallow = fx.indexer.function_trace_with_depth(load.id, 1, Some(1)).unwrap();
    let names: Vec<&str> = shallow.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names.len(), 3);
    assert!(!names.contains(&"http"));
    assert!(!names.contains(&"Page"));
}

#[test]
fn skeleton_is_cached_until_the_index_changes() {
    let mut fx = Fixture::new();
    assert!(fx.indexer.db().get_meta(META_SKELETON).unwrap().is_none());

    let skeleton = fx.indexer.architecture_skeleton(false).unwrap();
    assert!(fx.indexer.db().get_meta(META_SKELETON).unwrap().is_some());
    assert_eq!(fx.indexer.architecture_skeleton(false).unwrap(), skeleton);

    let root = skeleton.nodes.iter().find(|n| n.parent.is_none()).unwrap();
    assert_eq!(root.id, fx.path("src"));
    assert_eq!(root.kind, SkeletonNodeKind::Folder);
    assert_eq!(root.symbol_count, 5);
    assert!(
        skeleton
            .edges
            .iter()
            .any(|e| e.source == fx.path("src/ui") && e.target == fx.path("src/api") && e.weight == 2)
    );
    let view = skeleton.nodes.iter().find(|n| n.id == fx.path("src/ui/view.tsx")).unwrap();
    assert_eq!(view.imports, vec![fx.path("src/api/service.ts")]);

    fx.indexer
        .index_file(&fx.path("src/api/extra.ts"), "export function extra() {}\n", Language::TypeScript)
        .unwrap();
    assert!(fx.indexer.db().get_meta(META_SKELETON).unwrap().is_none());
    let refreshed = fx.indexer.architecture_skeleton(true).unwrap();
    let root = refreshed.nodes.iter().find(|n| n.parent.is_none()).unwrap();
    assert_eq!(root.symbol_count, 6);
}

#[test]
fn export_includes_every_table() {
    let mut fx = Fixture::new();
    let export = fx.indexer.export_graph().unwrap();
    assert_eq!(export.symbols.len(), 5);
    assert_eq!(export.files.len(), 3);
    assert_eq!(export.edges.iter().filter(|e| e.kind == EdgeKind::Call).count(), 4);
    assert_eq!(export.edges.iter().filter(|e| e.kind == EdgeKind::Import).count(), 2);
    assert!(export.domains.is_empty());

    let fetch = fx.symbol("fetchUser");
    assert!(fx.indexer.set_symbol_domain(fetch.id, Some("users"), Some(0.4)).unwrap());
    let export = fx.indexer.export_graph().unwrap();
    assert_eq!(export.domains.len(), 1);
    assert_eq!(export.domains[0].domain, "users");
    assert_eq!(export.domains[0].symbol_count, 1);
    let json = serde_json::to_value(&export).unwrap();
    assert!(json["symbols"].as_array().unwrap().iter().any(|s| s["domain"] == "users"));
}

#[test]
fn file_domain_cache_follows_classification_and_reindex() {
    let mut fx = Fixture::new();
    let client = fx.path("src/api/client.ts");
    assert_eq!(fx.indexer.file_domain(&client).unwrap(), None);
    assert_eq!(fx.indexer.domain_cache().get(&client), Some(None));

    let fetch = fx.symbol("fetchUser");
    let http = fx.symbol("http");
    fx.indexer.set_symbol_domain(fetch.id, Some("users"), None).unwrap();
    assert_eq!(fx.indexer.domain_cache().get(&client), None);
    fx.indexer.set_symbol_domain(http.id, Some("users"), None).unwrap();
    assert_eq!(fx.indexer.file_domain(&client).unwrap().as_deref(), Some("users"));

    let changed = format!("{CLIENT}\nexport function retry() {{}}\n");
    fx.indexer.index_file(&client, &changed, Language::TypeScript).unwrap();
    assert_eq!(fx.indexer.domain_cache().get(&client), None);
    assert_eq!(fx.indexer.file_domain(&client).unwrap(), None);
}
