//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Driftnet database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seed TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Latest extracted data for every crawled URL
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    final_url TEXT NOT NULL,
    domain TEXT NOT NULL,
    title TEXT NOT NULL,
    content_snippet TEXT NOT NULL,
    rendered_content TEXT,
    content_type TEXT,
    depth INTEGER NOT NULL,
    link_count INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_pages_domain ON pages(domain);
CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);

-- Every version of a page ever saved, for change detection
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    content_snippet TEXT NOT NULL,
    created_at TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_snapshots_url ON snapshots(url);

-- Downloaded media files per page
CREATE TABLE IF NOT EXISTS media (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_url TEXT NOT NULL,
    path TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    UNIQUE(page_url, path)
);

CREATE INDEX IF NOT EXISTS idx_media_page ON media(page_url);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
