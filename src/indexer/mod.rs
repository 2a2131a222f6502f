use crate::config::Config;
use crate::db::{Db, FileWrite, META_SKELETON};
use crate::error::IndexError;
use crate::indexer::batch::{BatchConfig, BatchWriter, BufferedFile, ProvisionalMap};
use crate::indexer::extract::{ExtractedFile, LanguageExtractor, PendingCall, PendingImport};
use crate::indexer::parser::{Language, SyntaxParser};
use crate::indexer::registry::StringRegistry;
use crate::indexer::resolve::ResolutionStats;
use crate::indexer::session::{DomainCache, IndexSession};
use crate::model::{
    ArchitectureSkeleton, BatchStats, FileFailure, FunctionTrace, GraphExport, GraphStats,
    IndexFileStats, Symbol, SymbolContext,
};
use crate::skeleton;
use crate::subgraph::{self, CallGraph};
use crate::util;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub mod batch;
pub mod composite;
pub mod extract;
pub mod javascript;
pub mod parser;
pub mod registry;
pub mod resolve;
pub mod scan;
pub mod session;

/// A file handed to the indexer by its host.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    pub language: Language,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>, language: Language) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language,
        }
    }

    /// Reads a file from disk, detecting its language from the extension.
    pub fn read(path: &Path) -> Result<Self> {
        let display = path.to_string_lossy();
        let language = Language::from_path(&display)
            .ok_or_else(|| IndexError::UnsupportedLanguage(display.to_string()))?;
        let content = util::read_to_string(path)?;
        Ok(Self::new(util::normalize_path(&display), content, language))
    }
}

/// Shared flag a host sets to stop a batch between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress reported while a batch runs.
#[derive(Debug)]
pub enum Checkpoint<'a> {
    FileExtracted {
        path: &'a str,
        symbols: usize,
        unchanged: bool,
    },
    FileFailed {
        path: &'a str,
        error: &'a IndexError,
    },
    Flushed {
        files: usize,
        symbols: usize,
    },
    Resolved {
        edges: usize,
        dropped_calls: usize,
    },
}

enum Prepared {
    Unchanged,
    Extracted { file: ExtractedFile, fingerprint: String },
}

/// Everything gathered from flushed files, waiting for resolution.
#[derive(Default)]
struct Resolution {
    provisional: ProvisionalMap,
    calls: Vec<PendingCall>,
    imports: Vec<PendingImport>,
    carried: usize,
    fingerprints: Vec<(i64, String)>,
    attempted: usize,
    persisted: usize,
    last_error: Option<anyhow::Error>,
}

pub struct Indexer {
    db: Db,
    parser: SyntaxParser,
    extractors: HashMap<Language, Box<dyn LanguageExtractor>>,
    batch_config: BatchConfig,
    domains: DomainCache,
}

impl Indexer {
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(Db::new(db_path)?))
    }

    pub fn new(db: Db) -> Self {
        let mut extractors: HashMap<Language, Box<dyn LanguageExtractor>> = HashMap::new();
        extractors.insert(Language::JavaScript, Box::new(javascript::JavascriptExtractor::new()));
        extractors.insert(Language::TypeScript, Box::new(javascript::JavascriptExtractor::new()));
        extractors.insert(Language::Tsx, Box::new(javascript::JavascriptExtractor::new()));
        Self {
            db,
            parser: SyntaxParser::new(),
            extractors,
            batch_config: BatchConfig::default(),
            domains: DomainCache::new(),
        }
    }

    pub fn with_batch_config(mut self, config: BatchConfig) -> Self {
        self.batch_config = config;
        self
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn needs_reindex(&self, path: &str, content: &str) -> Result<bool> {
        self.db.needs_reindex(&util::normalize_path(path), content)
    }

    /// Indexes one file. Parse failures are returned as errors here rather
    /// than collected.
    pub fn index_file(&mut self, path: &str, content: &str, language: Language) -> Result<IndexFileStats> {
        let file = SourceFile::new(util::normalize_path(path), content, language);
        let stats = self.run(std::slice::from_ref(&file), &CancelFlag::new(), &mut |_| {}, true)?;
        if stats.files_unchanged == 1 {
            return Ok(IndexFileStats {
                symbol_count: self.db.symbols_by_file(&file.path)?.len(),
                edge_count: self.db.edge_count_for_file(&file.path)?,
                unchanged: true,
            });
        }
        Ok(IndexFileStats {
            symbol_count: stats.total_symbols,
            edge_count: stats.total_edges,
            unchanged: false,
        })
    }

    pub fn index_batch(&mut self, files: &[SourceFile]) -> Result<BatchStats> {
        self.index_batch_with_progress(files, &CancelFlag::new(), &mut |_| {})
    }

    pub fn index_batch_with_progress(
        &mut self,
        files: &[SourceFile],
        cancel: &CancelFlag,
        observer: &mut dyn FnMut(Checkpoint<'_>),
    ) -> Result<BatchStats> {
        self.run(files, cancel, observer, false)
    }

    fn run(
        &mut self,
        files: &[SourceFile],
        cancel: &CancelFlag,
        observer: &mut dyn FnMut(Checkpoint<'_>),
        strict: bool,
    ) -> Result<BatchStats> {
        let started = Instant::now();
        let Indexer {
            db,
            parser,
            extractors,
            batch_config,
            domains,
        } = self;
        let mut stats = BatchStats {
            files_requested: files.len(),
            ..Default::default()
        };
        let mut session = IndexSession::new();
        let mut writer = BatchWriter::new(batch_config.clone());
        let mut resolution = Resolution::default();
        let leftover = db.carried_edge_count()?;
        if leftover > 0 {
            tracing::info!("{leftover} incoming edges left over from an interrupted run");
        }
        let _bulk = if files.len() >= batch_config.bulk_threshold.max(1) {
            Some(db.bulk_mode()?)
        } else {
            None
        };

        for source in files {
            if cancel.is_cancelled() {
                tracing::info!("indexing cancelled after {} files", stats.files_processed);
                stats.cancelled = true;
                break;
            }
            let path = util::normalize_path(&source.path);
            let prepared = prepare(db, parser, extractors, session.registry_mut(), &path, source);
            match prepared {
                Ok(Prepared::Unchanged) => {
                    tracing::debug!("{path} unchanged, skipping");
                    stats.files_unchanged += 1;
                    stats.files_processed += 1;
                    observer(Checkpoint::FileExtracted {
                        path: &path,
                        symbols: 0,
                        unchanged: true,
                    });
                }
                Ok(Prepared::Extracted { file, fingerprint }) => {
                    tracing::debug!(
                        "extracted {path}: {} symbols, {} calls, {} imports",
                        file.symbols.len(),
                        file.pending_calls.len(),
                        file.pending_imports.len()
                    );
                    observer(Checkpoint::FileExtracted {
                        path: &path,
                        symbols: file.symbols.len(),
                        unchanged: false,
                    });
                    writer.add(file, source.language, fingerprint);
                    if writer.should_flush() {
                        flush(db, writer.take(), &mut session, &mut resolution, &mut stats, observer);
                    }
                }
                Err(err) if err.is_file_local() && !strict => {
                    tracing::warn!("skipping {path}: {err}");
                    observer(Checkpoint::FileFailed {
                        path: &path,
                        error: &err,
                    });
                    stats.failures.push(FileFailure {
                        path: path.clone(),
                        error: err.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
        if !writer.is_empty() {
            flush(db, writer.take(), &mut session, &mut resolution, &mut stats, observer);
        }

        if resolution.attempted > 0 && resolution.persisted == 0 {
            let source = resolution
                .last_error
                .take()
                .unwrap_or_else(|| anyhow::anyhow!("no file could be written"));
            return Err(IndexError::persistence("batch", source).into());
        }
        if strict {
            if let Some(failure) = stats.failures.first() {
                anyhow::bail!("index {}: {}", failure.path, failure.error);
            }
        }

        if resolution.persisted > 0 || leftover > 0 {
            let symbols = db.all_symbols()?;
            let index_size = session.rebuild_index(&symbols).len();
            tracing::debug!("composite index holds {index_size} symbols");

            let provisional = &resolution.provisional;
            for call in &mut resolution.calls {
                call.caller = provisional.translate(call.caller);
            }
            for import in &mut resolution.imports {
                import.importer = import.importer.map(|caller| provisional.translate(caller));
            }

            let mut resolve_stats = ResolutionStats::default();
            let index = session.index();
            let mut edges = resolve::resolve_calls(&resolution.calls, index, &mut resolve_stats);
            edges.extend(resolve::resolve_imports(&resolution.imports, index, &mut resolve_stats));

            let outcome = db
                .commit_resolution(&edges, &resolution.fingerprints)
                .map_err(|err| IndexError::persistence("edge resolution", err))?;
            stats.total_edges = outcome.edges_inserted;
            stats.dropped_calls = resolve_stats.dropped_provisional;
            tracing::debug!(
                "resolved {} edges (bridge {}, same file {}, fallback {}, import {}), {}/{} carried, {} unresolved",
                resolve_stats.edges(),
                resolve_stats.import_bridge,
                resolve_stats.same_file,
                resolve_stats.global_fallback,
                resolve_stats.imports,
                outcome.edges_carried,
                resolution.carried,
                resolve_stats.unresolved
            );
            observer(Checkpoint::Resolved {
                edges: outcome.edges_inserted,
                dropped_calls: stats.dropped_calls,
            });
        }

        domains.invalidate_all(session.touched());
        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "indexed {}/{} files ({} unchanged, {} failed): {} symbols, {} edges in {}ms",
            stats.files_processed,
            stats.files_requested,
            stats.files_unchanged,
            stats.failures.len(),
            stats.total_symbols,
            stats.total_edges,
            stats.duration_ms
        );
        Ok(stats)
    }

    pub fn query_symbols_by_name(&self, name: &str) -> Result<Vec<Symbol>> {
        self.db.symbols_by_name(name)
    }

    pub fn query_symbols_by_file(&self, path: &str) -> Result<Vec<Symbol>> {
        self.db.symbols_by_file(&util::normalize_path(path))
    }

    pub fn symbol_context(&self, symbol_id: i64) -> Result<Option<SymbolContext>> {
        self.db.symbol_context(symbol_id)
    }

    pub fn export_graph(&self) -> Result<GraphExport> {
        Ok(GraphExport {
            symbols: self.db.all_symbols()?,
            edges: self.db.all_edges()?,
            files: self.db.list_files()?,
            domains: self.db.domain_summary()?,
        })
    }

    pub fn stats(&self) -> Result<GraphStats> {
        self.db.stats()
    }

    pub fn clear_index(&mut self) -> Result<()> {
        self.db.clear()?;
        self.domains.clear();
        Ok(())
    }

    pub fn remove_file(&mut self, path: &str) -> Result<bool> {
        let path = util::normalize_path(path);
        self.domains.invalidate(&path);
        self.db.remove_file(&path)
    }

    pub fn set_symbol_domain(
        &mut self,
        symbol_id: i64,
        domain: Option<&str>,
        risk_score: Option<f64>,
    ) -> Result<bool> {
        if let Some(symbol) = self.db.symbol_by_id(symbol_id)? {
            self.domains.invalidate(&symbol.file_path);
        }
        self.db.set_symbol_domain(symbol_id, domain, risk_score)
    }

    /// Dominant domain of a file's symbols, cached until the file changes.
    pub fn file_domain(&mut self, path: &str) -> Result<Option<String>> {
        let path = util::normalize_path(path);
        if let Some(cached) = self.domains.get(&path) {
            return Ok(cached.map(str::to_string));
        }
        let domain = session::dominant_domain(&self.db.symbols_by_file(&path)?);
        self.domains.insert(&path, domain.clone());
        Ok(domain)
    }

    pub fn domain_cache(&self) -> &DomainCache {
        &self.domains
    }

    pub fn call_graph(&self) -> Result<CallGraph> {
        Ok(CallGraph::from_edges(&self.db.edges_of_kind(crate::model::EdgeKind::Call)?))
    }

    pub fn blast_radius(&self, symbol_id: i64) -> Result<usize> {
        Ok(self
            .call_graph()?
            .blast_radius(symbol_id, Config::get().blast_radius_depth))
    }

    /// Cached unless `refine` is set or nothing is cached yet.
    pub fn architecture_skeleton(&self, refine: bool) -> Result<ArchitectureSkeleton> {
        if !refine {
            if let Some(cached) = self.db.get_meta(META_SKELETON)? {
                match serde_json::from_str(&cached) {
                    Ok(skeleton) => return Ok(skeleton),
                    Err(err) => tracing::warn!("discarding unreadable skeleton cache: {err}"),
                }
            }
        }
        let files = self.db.list_files()?;
        let symbols = self.db.all_symbols()?;
        let graph = self.call_graph()?;
        let cross_file_edges = self.db.cross_file_edges()?;
        let skeleton = skeleton::build(&skeleton::SkeletonInput {
            files: &files,
            symbols: &symbols,
            graph: &graph,
            cross_file_edges: &cross_file_edges,
            blast_radius_depth: Config::get().blast_radius_depth,
        });
        let json = serde_json::to_string(&skeleton).context("serialize skeleton")?;
        self.db.set_meta(META_SKELETON, &json)?;
        Ok(skeleton)
    }

    pub fn function_trace(&self, symbol_id: i64) -> Result<FunctionTrace> {
        let config = Config::get();
        self.function_trace_with_depth(
            symbol_id,
            config.trace_downstream_depth,
            config.trace_upstream_depth,
        )
    }

    pub fn function_trace_with_depth(
        &self,
        symbol_id: i64,
        downstream_depth: usize,
        upstream_depth: Option<usize>,
    ) -> Result<FunctionTrace> {
        let graph = self.call_graph()?;
        let symbols: HashMap<i64, Symbol> = self
            .db
            .all_symbols()?
            .into_iter()
            .map(|symbol| (symbol.id, symbol))
            .collect();
        Ok(subgraph::function_trace(
            &graph,
            symbol_id,
            &symbols,
            downstream_depth,
            upstream_depth,
        ))
    }
}

fn prepare(
    db: &Db,
    parser: &mut SyntaxParser,
    extractors: &HashMap<Language, Box<dyn LanguageExtractor>>,
    registry: &mut StringRegistry,
    path: &str,
    source: &SourceFile,
) -> Result<Prepared, IndexError> {
    let limit = Config::get().max_file_bytes;
    if source.content.len() > limit {
        return Err(IndexError::FileTooLarge {
            path: path.to_string(),
            size: source.content.len(),
            limit,
        });
    }
    let fingerprint = util::fingerprint(&source.content);
    let stored = db
        .stored_fingerprint(path)
        .map_err(|err| IndexError::persistence(path, err))?;
    if stored.as_deref() == Some(fingerprint.as_str()) {
        return Ok(Prepared::Unchanged);
    }
    let extractor = extractors
        .get(&source.language)
        .ok_or_else(|| IndexError::UnsupportedLanguage(source.language.to_string()))?;
    let tree = parser.parse(path, &source.content, source.language)?;
    let file = extractor.extract(&tree, &source.content, path, registry);
    if file.skipped_nodes > 0 {
        tracing::debug!("{path}: skipped {} malformed sub-trees", file.skipped_nodes);
    }
    Ok(Prepared::Extracted { file, fingerprint })
}

/// Writes a buffered chunk in one transaction, falling back to one
/// transaction per file when the chunk fails.
fn flush(
    db: &Db,
    batch: Vec<BufferedFile>,
    session: &mut IndexSession,
    resolution: &mut Resolution,
    stats: &mut BatchStats,
    observer: &mut dyn FnMut(Checkpoint<'_>),
) {
    resolution.attempted += batch.len();
    let writes: Vec<FileWrite<'_>> = batch.iter().map(file_write).collect();
    match db.flush_files(&writes) {
        Ok(result) => {
            for (buffered, persisted) in batch.iter().zip(&result.files) {
                accept(buffered, persisted.file_id, &persisted.symbol_ids, session, resolution, stats);
            }
            resolution.carried += result.carried;
            observer(Checkpoint::Flushed {
                files: batch.len(),
                symbols: writes.iter().map(|w| w.symbols.len()).sum(),
            });
        }
        Err(err) => {
            tracing::warn!("batch flush of {} files failed, retrying per file: {err:#}", batch.len());
            for (buffered, write) in batch.iter().zip(&writes) {
                match db.flush_files(std::slice::from_ref(write)) {
                    Ok(result) => {
                        if let Some(persisted) = result.files.first() {
                            accept(buffered, persisted.file_id, &persisted.symbol_ids, session, resolution, stats);
                        }
                        resolution.carried += result.carried;
                        observer(Checkpoint::Flushed {
                            files: 1,
                            symbols: write.symbols.len(),
                        });
                    }
                    Err(err) => {
                        let error = IndexError::persistence(buffered.file.path.clone(), err);
                        tracing::warn!("{error}");
                        observer(Checkpoint::FileFailed {
                            path: &buffered.file.path,
                            error: &error,
                        });
                        stats.failures.push(FileFailure {
                            path: buffered.file.path.clone(),
                            error: error.to_string(),
                        });
                        if let IndexError::Persistence { source, .. } = error {
                            resolution.last_error = Some(source);
                        }
                    }
                }
            }
        }
    }
}

fn file_write(buffered: &BufferedFile) -> FileWrite<'_> {
    FileWrite {
        path: &buffered.file.path,
        language: buffered.language.name(),
        symbols: &buffered.file.symbols,
    }
}

fn accept(
    buffered: &BufferedFile,
    file_id: i64,
    symbol_ids: &[i64],
    session: &mut IndexSession,
    resolution: &mut Resolution,
    stats: &mut BatchStats,
) {
    resolution.provisional.assign(buffered.offset, symbol_ids);
    resolution.calls.extend_from_slice(&buffered.file.pending_calls);
    resolution.imports.extend_from_slice(&buffered.file.pending_imports);
    resolution.fingerprints.push((file_id, buffered.fingerprint.clone()));
    resolution.persisted += 1;
    session.touch(&buffered.file.path);
    stats.files_processed += 1;
    stats.total_symbols += symbol_ids.len();
}
