use criterion::{Criterion, black_box, criterion_group, criterion_main};
use symgraph::indexer::parser::Language;
use symgraph::{Indexer, SourceFile};
use tempfile::TempDir;

fn synthetic_repo(root: &std::path::Path, modules: usize) -> Vec<SourceFile> {
    (0..modules)
        .map(|i| {
            let import = if i == 0 {
                String::new()
            } else {
                format!("import {{ step{} }} from './mod{}';\n", i - 1, i - 1)
            };
            let call = if i == 0 { String::new() } else { format!("step{}(n - 1);", i - 1) };
            let content = format!(
                "{import}\nexport function step{i}(n: number) {{\n  if (n > 0 && n % 2 === 0) {{ {call} }}\n  return helper{i}(n);\n}}\n\nfunction helper{i}(n: number) {{\n  return n > 10 ? n : n + 1;\n}}\n"
            );
            SourceFile::new(
                root.join(format!("mod{i}.ts")).to_string_lossy().to_string(),
                content,
                Language::TypeScript,
            )
        })
        .collect()
}

fn bench_index_batch(c: &mut Criterion) {
    c.bench_function("index_batch_200_files", |b| {
        b.iter_with_setup(
            || {
                let temp = TempDir::new().unwrap();
                let files = synthetic_repo(temp.path(), 200);
                let indexer = Indexer::open(&temp.path().join("graph.sqlite")).unwrap();
                (temp, files, indexer)
            },
            |(_temp, files, mut indexer)| {
                let stats = indexer.index_batch(&files).unwrap();
                black_box(stats.total_edges);
            },
        )
    });
}

fn bench_unchanged_reindex(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let files = synthetic_repo(temp.path(), 200);
    let mut indexer = Indexer::open(&temp.path().join("graph.sqlite")).unwrap();
    indexer.index_batch(&files).unwrap();

    c.bench_function("reindex_unchanged_200_files", |b| {
        b.iter(|| black_box(indexer.index_batch(&files).unwrap().files_unchanged))
    });
}

fn bench_blast_radius(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let files = synthetic_repo(temp.path(), 200);
    let mut indexer = Indexer::open(&temp.path().join("graph.sqlite")).unwrap();
    indexer.index_batch(&files).unwrap();
    let target = indexer.query_symbols_by_name("helper0").unwrap()[0].id;

    c.bench_function("blast_radius_chain", |b| {
        b.iter(|| black_box(indexer.blast_radius(target).unwrap()))
    });
}

criterion_group!(benches, bench_index_batch, bench_unchanged_reindex, bench_blast_radius);
criterion_main!(benches);
