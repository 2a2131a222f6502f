use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

pub const SCHEMA_VERSION: i64 = 4;

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        BEGIN;
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            language TEXT NOT NULL,
            content_hash TEXT,
            last_indexed_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS symbols (
            id INTEGER PRIMARY KEY,
            file_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            start_col INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            end_col INTEGER NOT NULL,
            complexity INTEGER NOT NULL DEFAULT 1,
            domain TEXT,
            FOREIGN KEY(file_id) REFERENCES files(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
        CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);

        CREATE TABLE IF NOT EXISTS edges (
            id INTEGER PRIMARY KEY,
            source_id INTEGER NOT NULL,
            target_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            reason TEXT,
            UNIQUE(source_id, target_id, kind),
            FOREIGN KEY(source_id) REFERENCES symbols(id) ON DELETE CASCADE,
            FOREIGN KEY(target_id) REFERENCES symbols(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
        COMMIT;
        ",
    )?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0).map(|v| v.parse::<i64>().unwrap_or(0)),
        )
        .optional()?;
    let existing = existing.unwrap_or(1);

    if existing < 2 {
        // Edge provenance: how confident the resolver was.
        if !has_column(conn, "edges", "confidence")? {
            conn.execute("ALTER TABLE edges ADD COLUMN confidence REAL", [])?;
        }
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges(kind)",
            [],
        )?;
    }

    if existing < 3 {
        // Risk score written by the external classifier next to the domain.
        if !has_column(conn, "symbols", "risk_score")? {
            conn.execute("ALTER TABLE symbols ADD COLUMN risk_score REAL", [])?;
        }
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_domain ON symbols(domain)",
            [],
        )?;
    }

    if existing < 4 {
        // Incoming edges waiting to be re-attached after their target file
        // was rewritten. Rows outlive a crash between flush and resolution.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS carried_edges (
                source_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                reason TEXT,
                confidence REAL,
                target_path TEXT NOT NULL,
                target_name TEXT NOT NULL,
                target_line INTEGER NOT NULL,
                UNIQUE(source_id, kind, target_path, target_name, target_line),
                FOREIGN KEY(source_id) REFERENCES symbols(id) ON DELETE CASCADE
            );
            ",
        )?;
    }

    if existing < SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [SCHEMA_VERSION.to_string()],
        )?;
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
