use crate::config::Config;
use crate::indexer::extract::ExtractedSymbol;
use crate::indexer::resolve::ResolvedEdge;
use crate::model::{
    DomainSummary, Edge, EdgeKind, EdgeReason, FileRecord, GraphStats, Symbol, SymbolContext,
    SymbolKind,
};
use crate::util;
use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod migrations;

pub const META_LAST_INDEXED: &str = "last_indexed";
pub const META_SKELETON: &str = "architecture_skeleton";

const SYMBOL_COLUMNS: &str = "s.id, f.path, s.name, s.kind, s.start_line, s.start_col,
     s.end_line, s.end_col, s.complexity, s.domain, s.risk_score";

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        Ok(())
    }

    fn on_release(&self, _conn: Connection) {}
}

/// One file's worth of freshly extracted symbols, ready to be written.
#[derive(Debug, Clone, Copy)]
pub struct FileWrite<'a> {
    pub path: &'a str,
    pub language: &'a str,
    pub symbols: &'a [ExtractedSymbol],
}

#[derive(Debug, Clone)]
pub struct PersistedFile {
    pub file_id: i64,
    pub path: String,
    /// Row ids in the same order as the symbols that were written.
    pub symbol_ids: Vec<i64>,
}

/// An incoming edge from a file outside the rewritten set, remembered by
/// the target's identity so it can be pointed at the re-inserted symbol.
///
/// Parked in `carried_edges` by the flush that deleted the old target and
/// drained by the next [`Db::commit_resolution`].
#[derive(Debug, Clone, PartialEq)]
pub struct CarriedEdge {
    pub source_id: i64,
    pub kind: EdgeKind,
    pub reason: Option<EdgeReason>,
    pub confidence: Option<f64>,
    pub target_path: String,
    pub target_name: String,
    pub target_line: i64,
}

#[derive(Debug, Default)]
pub struct FlushResult {
    pub files: Vec<PersistedFile>,
    /// Incoming edges parked for re-attachment.
    pub carried: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub edges_inserted: usize,
    pub edges_carried: usize,
}

pub struct Db {
    db_path: PathBuf,
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool<SqliteConnectionManager>,
}

impl Db {
    pub fn new(db_path: &Path) -> Result<Self> {
        util::ensure_parent_dir(db_path)?;

        let config = Config::get();
        tracing::debug!(
            "initializing connection pool (size: {}, min_idle: {})",
            config.pool_size,
            config.pool_min_idle
        );

        let write_conn = Connection::open(db_path)
            .with_context(|| format!("open sqlite db at {}", db_path.display()))?;
        write_conn.busy_timeout(Duration::from_secs(30))?;
        write_conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        migrations::migrate(&write_conn)?;

        let write_conn = Arc::new(Mutex::new(write_conn));

        let manager = SqliteConnectionManager::file(db_path);
        let read_pool = Pool::builder()
            .max_size(config.pool_size)
            .min_idle(Some(config.pool_min_idle))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .with_context(|| "create connection pool")?;

        Ok(Self {
            db_path: db_path.to_path_buf(),
            write_conn,
            read_pool,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn read_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.read_pool
            .get()
            .with_context(|| "get read connection from pool")
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.write_conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Relaxes durability on the write connection until the guard drops.
    pub fn bulk_mode(&self) -> Result<BulkMode<'_>> {
        self.conn().execute_batch(
            "
            PRAGMA synchronous = OFF;
            PRAGMA temp_store = MEMORY;
            PRAGMA cache_size = -65536;
            ",
        )?;
        tracing::debug!("bulk mode on");
        Ok(BulkMode { db: self })
    }

    pub fn write_pragma_i64(&self, pragma: &str) -> Result<i64> {
        let value = self
            .conn()
            .query_row(&format!("PRAGMA {pragma}"), [], |row| row.get(0))?;
        Ok(value)
    }

    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, path, language, content_hash, last_indexed_at FROM files ORDER BY path",
        )?;
        let rows = stmt.query_map([], file_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn stored_fingerprint(&self, path: &str) -> Result<Option<String>> {
        let hash: Option<Option<String>> = self
            .read_conn()?
            .query_row(
                "SELECT content_hash FROM files WHERE path = ?",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash.flatten())
    }

    /// True unless the stored fingerprint equals the fingerprint of `content`.
    pub fn needs_reindex(&self, path: &str, content: &str) -> Result<bool> {
        let stored = self.stored_fingerprint(path)?;
        Ok(stored.as_deref() != Some(util::fingerprint(content).as_str()))
    }

    /// Writes the symbols of every file in one transaction, replacing what
    /// each file had before. Fingerprints are cleared until
    /// [`Db::commit_resolution`] records them.
    pub fn flush_files(&self, files: &[FileWrite<'_>]) -> Result<FlushResult> {
        if files.is_empty() {
            return Ok(FlushResult::default());
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let result = write_files(&tx, files)?;
        tx.commit()?;
        Ok(result)
    }

    /// Inserts resolved edges, re-attaches every parked incoming edge,
    /// stamps fingerprints and drops derived caches, all in one
    /// transaction. Edges parked by an earlier, interrupted run are
    /// drained here as well.
    pub fn commit_resolution(
        &self,
        edges: &[ResolvedEdge],
        fingerprints: &[(i64, String)],
    ) -> Result<CommitOutcome> {
        let now = util::now_secs();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut outcome = CommitOutcome::default();
        {
            let mut insert = tx.prepare_cached(
                "INSERT OR IGNORE INTO edges (source_id, target_id, kind, reason, confidence)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for edge in edges {
                outcome.edges_inserted += insert.execute(params![
                    edge.source_id,
                    edge.target_id,
                    edge.kind,
                    edge.reason,
                    edge.confidence(),
                ])?;
            }

            let mut exact = tx.prepare_cached(
                "SELECT s.id FROM symbols s JOIN files f ON s.file_id = f.id
                 WHERE f.path = ? AND s.name = ? AND s.start_line = ?
                 ORDER BY s.id LIMIT 1",
            )?;
            let mut by_name = tx.prepare_cached(
                "SELECT s.id FROM symbols s JOIN files f ON s.file_id = f.id
                 WHERE f.path = ? AND s.name = ? LIMIT 2",
            )?;
            let mut carry = tx.prepare_cached(
                "INSERT OR IGNORE INTO edges (source_id, target_id, kind, reason, confidence)
                 SELECT ?1, ?2, ?3, ?4, ?5
                 WHERE EXISTS (SELECT 1 FROM symbols WHERE id = ?1) AND ?1 != ?2",
            )?;
            let carried = parked_edges(&tx)?;
            for edge in &carried {
                let target: Option<i64> = exact
                    .query_row(
                        params![edge.target_path, edge.target_name, edge.target_line],
                        |row| row.get(0),
                    )
                    .optional()?;
                let target = match target {
                    Some(id) => Some(id),
                    None => {
                        let ids = by_name
                            .query_map(params![edge.target_path, edge.target_name], |row| {
                                row.get::<_, i64>(0)
                            })?
                            .collect::<rusqlite::Result<Vec<_>>>()?;
                        if ids.len() == 1 { Some(ids[0]) } else { None }
                    }
                };
                let Some(target_id) = target else {
                    tracing::debug!(
                        "dropping edge into {}:{}, symbol is gone",
                        edge.target_path,
                        edge.target_name
                    );
                    continue;
                };
                outcome.edges_carried += carry.execute(params![
                    edge.source_id,
                    target_id,
                    edge.kind,
                    edge.reason,
                    edge.confidence,
                ])?;
            }

            let mut stamp = tx.prepare_cached(
                "UPDATE files SET content_hash = ?, last_indexed_at = ? WHERE id = ?",
            )?;
            for (file_id, hash) in fingerprints {
                stamp.execute(params![hash, now, file_id])?;
            }
        }
        tx.execute("DELETE FROM carried_edges", [])?;
        set_meta_tx(&tx, META_LAST_INDEXED, &now.to_string())?;
        tx.execute("DELETE FROM meta WHERE key = ?", params![META_SKELETON])?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Deletes a file with its symbols and every edge touching them.
    pub fn remove_file(&self, path: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM files WHERE path = ?", params![path])?;
        tx.execute(
            "DELETE FROM carried_edges WHERE target_path = ?",
            params![path],
        )?;
        if removed > 0 {
            tx.execute("DELETE FROM meta WHERE key = ?", params![META_SKELETON])?;
        }
        tx.commit()?;
        Ok(removed > 0)
    }

    pub fn clear(&self) -> Result<()> {
        self.conn().execute_batch(
            "
            BEGIN;
            DELETE FROM carried_edges;
            DELETE FROM edges;
            DELETE FROM symbols;
            DELETE FROM files;
            DELETE FROM meta WHERE key IN ('last_indexed', 'architecture_skeleton');
            COMMIT;
            ",
        )?;
        Ok(())
    }

    pub fn stats(&self) -> Result<GraphStats> {
        let conn = self.read_conn()?;
        let count = |table: &str| -> Result<i64> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        };
        Ok(GraphStats {
            symbol_count: count("symbols")?,
            edge_count: count("edges")?,
            file_count: count("files")?,
        })
    }

    pub fn symbols_by_name(&self, name: &str) -> Result<Vec<Symbol>> {
        self.query_symbols("WHERE s.name = ? ORDER BY s.id", params![name])
    }

    pub fn symbols_by_file(&self, path: &str) -> Result<Vec<Symbol>> {
        self.query_symbols("WHERE f.path = ? ORDER BY s.start_line, s.id", params![path])
    }

    pub fn all_symbols(&self) -> Result<Vec<Symbol>> {
        self.query_symbols("ORDER BY s.id", params![])
    }

    pub fn symbol_by_id(&self, id: i64) -> Result<Option<Symbol>> {
        Ok(self
            .query_symbols("WHERE s.id = ?", params![id])?
            .into_iter()
            .next())
    }

    pub fn symbols_by_ids(&self, ids: &[i64]) -> Result<Vec<Symbol>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        self.query_symbols(
            &format!("WHERE s.id IN ({placeholders}) ORDER BY s.id"),
            rusqlite::params_from_iter(ids.iter()),
        )
    }

    fn query_symbols<P: rusqlite::Params>(&self, tail: &str, params: P) -> Result<Vec<Symbol>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS}
             FROM symbols s JOIN files f ON s.file_id = f.id
             {tail}"
        ))?;
        let rows = stmt.query_map(params, symbol_from_row)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    pub fn incoming_edges(&self, symbol_id: i64) -> Result<Vec<Edge>> {
        self.query_edges("WHERE target_id = ? ORDER BY id", params![symbol_id])
    }

    pub fn outgoing_edges(&self, symbol_id: i64) -> Result<Vec<Edge>> {
        self.query_edges("WHERE source_id = ? ORDER BY id", params![symbol_id])
    }

    pub fn all_edges(&self) -> Result<Vec<Edge>> {
        self.query_edges("ORDER BY id", params![])
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> Result<Vec<Edge>> {
        self.query_edges("WHERE kind = ? ORDER BY id", params![kind])
    }

    /// Outgoing edge count of the given file's symbols.
    pub fn edge_count_for_file(&self, path: &str) -> Result<usize> {
        let count: i64 = self.read_conn()?.query_row(
            "SELECT COUNT(*) FROM edges e
             JOIN symbols s ON e.source_id = s.id
             JOIN files f ON s.file_id = f.id
             WHERE f.path = ?",
            params![path],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn query_edges<P: rusqlite::Params>(&self, tail: &str, params: P) -> Result<Vec<Edge>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, source_id, target_id, kind, reason, confidence FROM edges {tail}"
        ))?;
        let rows = stmt.query_map(params, edge_from_row)?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// 1-hop neighbourhood of a symbol; `None` when the id is unknown.
    pub fn symbol_context(&self, symbol_id: i64) -> Result<Option<SymbolContext>> {
        let Some(symbol) = self.symbol_by_id(symbol_id)? else {
            return Ok(None);
        };
        let incoming_edges = self.incoming_edges(symbol_id)?;
        let outgoing_edges = self.outgoing_edges(symbol_id)?;
        let neighbor_ids: BTreeSet<i64> = incoming_edges
            .iter()
            .map(|edge| edge.source_id)
            .chain(outgoing_edges.iter().map(|edge| edge.target_id))
            .filter(|&id| id != symbol_id)
            .collect();
        let neighbor_ids: Vec<i64> = neighbor_ids.into_iter().collect();
        let neighbors = self.symbols_by_ids(&neighbor_ids)?;
        Ok(Some(SymbolContext {
            symbol,
            neighbors,
            incoming_edges,
            outgoing_edges,
        }))
    }

    /// Records the external classifier's verdict for a symbol.
    pub fn set_symbol_domain(
        &self,
        symbol_id: i64,
        domain: Option<&str>,
        risk_score: Option<f64>,
    ) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE symbols SET domain = ?, risk_score = ? WHERE id = ?",
            params![domain, risk_score, symbol_id],
        )?;
        Ok(updated > 0)
    }

    pub fn domain_summary(&self) -> Result<Vec<DomainSummary>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT domain, COUNT(*) FROM symbols
             WHERE domain IS NOT NULL
             GROUP BY domain
             ORDER BY domain",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DomainSummary {
                domain: row.get(0)?,
                symbol_count: row.get(1)?,
            })
        })?;
        let mut domains = Vec::new();
        for row in rows {
            domains.push(row?);
        }
        Ok(domains)
    }

    /// Edges whose endpoints live in different files, as
    /// `(source path, target path, kind)`.
    pub fn cross_file_edges(&self) -> Result<Vec<(String, String, EdgeKind)>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT sf.path, tf.path, e.kind
             FROM edges e
             JOIN symbols s ON e.source_id = s.id
             JOIN symbols t ON e.target_id = t.id
             JOIN files sf ON s.file_id = sf.id
             JOIN files tf ON t.file_id = tf.id
             WHERE s.file_id != t.file_id
             ORDER BY e.id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.read_conn()?
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        set_meta_tx(&conn, key, value)
    }

    pub fn get_meta_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get_meta(key)?.and_then(|v| v.parse::<i64>().ok()))
    }

    /// Incoming edges parked by a flush and not yet re-attached.
    pub fn carried_edge_count(&self) -> Result<usize> {
        let count: i64 = self.read_conn()?.query_row(
            "SELECT COUNT(*) FROM carried_edges",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Restores the default durability pragmas when dropped.
pub struct BulkMode<'a> {
    db: &'a Db,
}

impl Drop for BulkMode<'_> {
    fn drop(&mut self) {
        let restored = self.db.conn().execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = DEFAULT;
            PRAGMA cache_size = -2000;
            ",
        );
        match restored {
            Ok(()) => tracing::debug!("bulk mode off"),
            Err(err) => tracing::warn!("failed to restore pragmas after bulk mode: {err}"),
        }
    }
}

fn write_files(tx: &Transaction<'_>, files: &[FileWrite<'_>]) -> Result<FlushResult> {
    let rewritten: HashSet<&str> = files.iter().map(|file| file.path).collect();
    let mut result = FlushResult {
        files: Vec::with_capacity(files.len()),
        carried: 0,
    };

    let mut upsert = tx.prepare_cached(
        "INSERT INTO files (path, language, content_hash, last_indexed_at)
         VALUES (?, ?, NULL, NULL)
         ON CONFLICT(path) DO UPDATE SET
            language = excluded.language,
            content_hash = NULL",
    )?;
    let mut file_id_stmt = tx.prepare_cached("SELECT id FROM files WHERE path = ?")?;
    let mut incoming = tx.prepare_cached(
        "SELECT e.source_id, e.kind, e.reason, e.confidence, t.name, t.start_line, sf.path
         FROM edges e
         JOIN symbols t ON e.target_id = t.id
         JOIN symbols s ON e.source_id = s.id
         JOIN files sf ON s.file_id = sf.id
         WHERE t.file_id = ?1 AND s.file_id != ?1",
    )?;
    let mut park = tx.prepare_cached(
        "INSERT OR IGNORE INTO carried_edges
         (source_id, kind, reason, confidence, target_path, target_name, target_line)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )?;
    let mut delete = tx.prepare_cached("DELETE FROM symbols WHERE file_id = ?")?;
    let mut insert = tx.prepare_cached(
        "INSERT INTO symbols
         (file_id, name, kind, start_line, start_col, end_line, end_col, complexity)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    for file in files {
        upsert.execute(params![file.path, file.language])?;
        let file_id: i64 = file_id_stmt.query_row(params![file.path], |row| row.get(0))?;

        let rows = incoming.query_map(params![file_id], |row| {
            let source_path: String = row.get(6)?;
            Ok((
                source_path,
                CarriedEdge {
                    source_id: row.get(0)?,
                    kind: row.get(1)?,
                    reason: row.get(2)?,
                    confidence: row.get(3)?,
                    target_path: file.path.to_string(),
                    target_name: row.get(4)?,
                    target_line: row.get(5)?,
                },
            ))
        })?;
        let mut carried = Vec::new();
        for row in rows {
            let (source_path, edge) = row?;
            if !rewritten.contains(source_path.as_str()) {
                carried.push(edge);
            }
        }
        for edge in &carried {
            result.carried += park.execute(params![
                edge.source_id,
                edge.kind,
                edge.reason,
                edge.confidence,
                edge.target_path,
                edge.target_name,
                edge.target_line,
            ])?;
        }

        delete.execute(params![file_id])?;
        let mut symbol_ids = Vec::with_capacity(file.symbols.len());
        for symbol in file.symbols {
            insert.execute(params![
                file_id,
                symbol.name,
                symbol.kind,
                symbol.start_line,
                symbol.start_col,
                symbol.end_line,
                symbol.end_col,
                symbol.complexity,
            ])?;
            symbol_ids.push(tx.last_insert_rowid());
        }
        result.files.push(PersistedFile {
            file_id,
            path: file.path.to_string(),
            symbol_ids,
        });
    }
    Ok(result)
}

fn parked_edges(conn: &Connection) -> Result<Vec<CarriedEdge>> {
    let mut stmt = conn.prepare(
        "SELECT source_id, kind, reason, confidence, target_path, target_name, target_line
         FROM carried_edges ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CarriedEdge {
            source_id: row.get(0)?,
            kind: row.get(1)?,
            reason: row.get(2)?,
            confidence: row.get(3)?,
            target_path: row.get(4)?,
            target_name: row.get(5)?,
            target_line: row.get(6)?,
        })
    })?;
    let mut edges = Vec::new();
    for row in rows {
        edges.push(row?);
    }
    Ok(edges)
}

fn set_meta_tx(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        language: row.get(2)?,
        content_hash: row.get(3)?,
        last_indexed_at: row.get(4)?,
    })
}

fn symbol_from_row(row: &Row<'_>) -> rusqlite::Result<Symbol> {
    Ok(Symbol {
        id: row.get(0)?,
        file_path: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        start_line: row.get(4)?,
        start_col: row.get(5)?,
        end_line: row.get(6)?,
        end_col: row.get(7)?,
        complexity: row.get(8)?,
        domain: row.get(9)?,
        risk_score: row.get(10)?,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    Ok(Edge {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        kind: row.get(3)?,
        reason: row.get(4)?,
        confidence: row.get(5)?,
    })
}

fn parse_column<T>(value: ValueRef<'_>) -> FromSqlResult<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    value
        .as_str()?
        .parse()
        .map_err(|err: anyhow::Error| FromSqlError::Other(err.into()))
}

impl FromSql for SymbolKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_column(value)
    }
}

impl ToSql for SymbolKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EdgeKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_column(value)
    }
}

impl ToSql for EdgeKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EdgeReason {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_column(value)
    }
}

impl ToSql for EdgeReason {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_db() -> (Db, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Db::new(&db_path).unwrap();
        (db, temp_dir)
    }

    fn make_test_symbol(name: &str, start_line: i64) -> ExtractedSymbol {
        ExtractedSymbol {
            name: name.to_string(),
            name_id: 0,
            kind: SymbolKind::Function,
            start_line,
            start_col: 1,
            end_line: start_line + 2,
            end_col: 2,
            complexity: 1,
        }
    }

    fn call(source_id: i64, target_id: i64) -> ResolvedEdge {
        ResolvedEdge {
            source_id,
            target_id,
            kind: EdgeKind::Call,
            reason: EdgeReason::SameFile,
        }
    }

    #[test]
    fn test_migration_records_schema_version() {
        let (db, _temp) = create_test_db();
        assert_eq!(
            db.get_meta_i64("schema_version").unwrap(),
            Some(migrations::SCHEMA_VERSION)
        );
        // reopening runs migrations again without error
        let reopened = Db::new(db.db_path()).unwrap();
        assert_eq!(reopened.stats().unwrap(), GraphStats::default());
    }

    #[test]
    fn test_flush_then_commit_stamps_fingerprint() {
        let (db, _temp) = create_test_db();
        let symbols = vec![make_test_symbol("helper", 1), make_test_symbol("main", 4)];
        let flushed = db
            .flush_files(&[FileWrite {
                path: "/repo/a.ts",
                language: "typescript",
                symbols: &symbols,
            }])
            .unwrap();
        let file = &flushed.files[0];
        assert_eq!(file.symbol_ids.len(), 2);
        assert!(db.needs_reindex("/repo/a.ts", "src").unwrap());

        let hash = util::fingerprint("src");
        let outcome = db
            .commit_resolution(
                &[call(file.symbol_ids[1], file.symbol_ids[0])],
                &[(file.file_id, hash)],
            )
            .unwrap();
        assert_eq!(outcome.edges_inserted, 1);
        assert!(!db.needs_reindex("/repo/a.ts", "src").unwrap());
        assert!(db.needs_reindex("/repo/a.ts", "src!").unwrap());
        assert!(db.get_meta_i64(META_LAST_INDEXED).unwrap().is_some());
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let (db, _temp) = create_test_db();
        let symbols = vec![make_test_symbol("a", 1), make_test_symbol("b", 4)];
        let flushed = db
            .flush_files(&[FileWrite {
                path: "/repo/x.js",
                language: "javascript",
                symbols: &symbols,
            }])
            .unwrap();
        let ids = &flushed.files[0].symbol_ids;
        let edge = call(ids[0], ids[1]);
        let outcome = db.commit_resolution(&[edge, edge], &[]).unwrap();
        assert_eq!(outcome.edges_inserted, 1);
        assert_eq!(db.stats().unwrap().edge_count, 1);
    }

    #[test]
    fn test_rewrite_carries_incoming_edges() {
        let (db, _temp) = create_test_db();
        let a = vec![make_test_symbol("helper", 1)];
        let b = vec![make_test_symbol("caller", 1)];
        let first = db
            .flush_files(&[
                FileWrite { path: "/repo/a.ts", language: "typescript", symbols: &a },
                FileWrite { path: "/repo/b.ts", language: "typescript", symbols: &b },
            ])
            .unwrap();
        let helper = first.files[0].symbol_ids[0];
        let caller = first.files[1].symbol_ids[0];
        db.commit_resolution(&[call(caller, helper)], &[]).unwrap();

        // helper moves down a few lines; the edge from b must follow it
        let moved = vec![make_test_symbol("helper", 7)];
        let second = db
            .flush_files(&[FileWrite { path: "/repo/a.ts", language: "typescript", symbols: &moved }])
            .unwrap();
        assert_eq!(second.carried, 1);
        assert_eq!(db.carried_edge_count().unwrap(), 1);
        assert_eq!(db.stats().unwrap().edge_count, 0);
        let outcome = db.commit_resolution(&[], &[]).unwrap();
        assert_eq!(outcome.edges_carried, 1);
        assert_eq!(db.carried_edge_count().unwrap(), 0);
        let new_helper = second.files[0].symbol_ids[0];
        let incoming = db.incoming_edges(new_helper).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source_id, caller);
    }

    #[test]
    fn test_parked_edges_survive_reopen() {
        let (db, _temp) = create_test_db();
        let a = vec![make_test_symbol("helper", 1)];
        let b = vec![make_test_symbol("caller", 1)];
        let c = vec![make_test_symbol("other", 1)];
        let first = db
            .flush_files(&[
                FileWrite { path: "/repo/a.ts", language: "typescript", symbols: &a },
                FileWrite { path: "/repo/b.ts", language: "typescript", symbols: &b },
                FileWrite { path: "/repo/c.ts", language: "typescript", symbols: &c },
            ])
            .unwrap();
        let helper = first.files[0].symbol_ids[0];
        let caller = first.files[1].symbol_ids[0];
        let other = first.files[2].symbol_ids[0];
        db.commit_resolution(&[call(caller, helper), call(other, helper)], &[])
            .unwrap();

        db.flush_files(&[FileWrite { path: "/repo/a.ts", language: "typescript", symbols: &a }])
            .unwrap();
        let path = db.db_path().to_path_buf();
        drop(db);

        let reopened = Db::new(&path).unwrap();
        assert_eq!(reopened.carried_edge_count().unwrap(), 2);
        // a parked edge whose caller disappears goes with it
        assert!(reopened.remove_file("/repo/c.ts").unwrap());
        assert_eq!(reopened.carried_edge_count().unwrap(), 1);

        let outcome = reopened.commit_resolution(&[], &[]).unwrap();
        assert_eq!(outcome.edges_carried, 1);
        let helper = reopened.symbols_by_name("helper").unwrap()[0].id;
        let incoming = reopened.incoming_edges(helper).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source_id, caller);
    }

    #[test]
    fn test_remove_file_cascades() {
        let (db, _temp) = create_test_db();
        let a = vec![make_test_symbol("helper", 1)];
        let b = vec![make_test_symbol("caller", 1)];
        let flushed = db
            .flush_files(&[
                FileWrite { path: "/repo/a.ts", language: "typescript", symbols: &a },
                FileWrite { path: "/repo/b.ts", language: "typescript", symbols: &b },
            ])
            .unwrap();
        let helper = flushed.files[0].symbol_ids[0];
        let caller = flushed.files[1].symbol_ids[0];
        db.commit_resolution(&[call(caller, helper)], &[]).unwrap();

        assert!(db.remove_file("/repo/a.ts").unwrap());
        assert!(!db.remove_file("/repo/a.ts").unwrap());
        let stats = db.stats().unwrap();
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.symbol_count, 1);
        assert_eq!(stats.edge_count, 0);
    }

    #[test]
    fn test_domains_and_context() {
        let (db, _temp) = create_test_db();
        let symbols = vec![
            make_test_symbol("load", 1),
            make_test_symbol("save", 5),
            make_test_symbol("render", 9),
        ];
        let flushed = db
            .flush_files(&[FileWrite { path: "/repo/s.ts", language: "typescript", symbols: &symbols }])
            .unwrap();
        let ids = flushed.files[0].symbol_ids.clone();
        db.commit_resolution(&[call(ids[0], ids[1]), call(ids[2], ids[0])], &[])
            .unwrap();
        assert!(db.set_symbol_domain(ids[0], Some("storage"), Some(0.5)).unwrap());
        assert!(db.set_symbol_domain(ids[1], Some("storage"), None).unwrap());
        assert!(!db.set_symbol_domain(999, Some("ui"), None).unwrap());

        let domains = db.domain_summary().unwrap();
        assert_eq!(
            domains,
            vec![DomainSummary { domain: "storage".into(), symbol_count: 2 }]
        );

        let context = db.symbol_context(ids[0]).unwrap().unwrap();
        assert_eq!(context.symbol.domain.as_deref(), Some("storage"));
        assert_eq!(context.incoming_edges.len(), 1);
        assert_eq!(context.outgoing_edges.len(), 1);
        let neighbor_ids: Vec<i64> = context.neighbors.iter().map(|s| s.id).collect();
        assert_eq!(neighbor_ids, vec![ids[1], ids[2]]);
        assert!(db.symbol_context(12345).unwrap().is_none());
    }

    #[test]
    fn test_bulk_mode_restores_synchronous() {
        let (db, _temp) = create_test_db();
        assert_eq!(db.write_pragma_i64("synchronous").unwrap(), 1);
        {
            let _bulk = db.bulk_mode().unwrap();
            assert_eq!(db.write_pragma_i64("synchronous").unwrap(), 0);
        }
        assert_eq!(db.write_pragma_i64("synchronous").unwrap(), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let (db, _temp) = create_test_db();
        let symbols = vec![make_test_symbol("a", 1)];
        db.flush_files(&[FileWrite { path: "/repo/a.js", language: "javascript", symbols: &symbols }])
            .unwrap();
        db.set_meta(META_SKELETON, "{}").unwrap();
        db.clear().unwrap();
        assert_eq!(db.stats().unwrap(), GraphStats::default());
        assert_eq!(db.get_meta(META_SKELETON).unwrap(), None);
    }
}
