//! SQL migration definitions for the marketfeed database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: items, batch_jobs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Enriched item records, one row per persisted identifier
CREATE TABLE IF NOT EXISTS items (
    id                   TEXT PRIMARY KEY,
    price                REAL NOT NULL,
    created_at           TEXT NOT NULL,
    category_name        TEXT NOT NULL,
    currency_description TEXT NOT NULL,
    seller_nickname      TEXT NOT NULL,
    saved_at             TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_saved_at ON items(saved_at);

-- Batch job history
CREATE TABLE IF NOT EXISTS batch_jobs (
    id          TEXT PRIMARY KEY,
    source      TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
