//! SQL migration definitions for the document index.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: documents, download_jobs",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per file in data/raw
CREATE TABLE IF NOT EXISTS documents (
    filename      TEXT PRIMARY KEY,
    filepath      TEXT NOT NULL,
    url           TEXT NOT NULL,
    doc_type      TEXT NOT NULL,
    source        TEXT NOT NULL,
    file_hash     TEXT NOT NULL,
    file_size_mb  REAL NOT NULL,
    download_date TEXT NOT NULL,
    cached        INTEGER NOT NULL DEFAULT 0,
    extra_json    TEXT
);

CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);
CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(file_hash);

-- Download run history
CREATE TABLE IF NOT EXISTS download_jobs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index documents by type",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_documents_doc_type ON documents(doc_type);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
