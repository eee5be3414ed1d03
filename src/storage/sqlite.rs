//! SQLite storage implementation

use crate::crawler::PageRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, Snapshot, StoredPage};
use crate::DriftnetError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const PAGE_COLUMNS: &str = "id, url, final_url, domain, title, content_snippet, rendered_content, \
     content_type, depth, link_count, fetched_at, updated_at, run_id";

const SNAPSHOT_COLUMNS: &str = "id, url, title, content_snippet, created_at, run_id";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> Result<Self, DriftnetError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DriftnetError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        seed: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<StoredPage> {
    Ok(StoredPage {
        id: row.get(0)?,
        url: row.get(1)?,
        final_url: row.get(2)?,
        domain: row.get(3)?,
        title: row.get(4)?,
        content_snippet: row.get(5)?,
        rendered_content: row.get(6)?,
        content_type: row.get(7)?,
        depth: row.get(8)?,
        link_count: row.get(9)?,
        fetched_at: row.get(10)?,
        updated_at: row.get(11)?,
        run_id: row.get(12)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        content_snippet: row.get(3)?,
        created_at: row.get(4)?,
        run_id: row.get(5)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, seed: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (seed, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![seed, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, seed, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, seed, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Page Management =====

    fn save_record(&mut self, run_id: i64, record: &PageRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let fetched_at = record.fetched_at.to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO pages (url, final_url, domain, title, content_snippet, rendered_content,
                                content_type, depth, link_count, fetched_at, updated_at, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(url) DO UPDATE SET
                final_url = excluded.final_url,
                title = excluded.title,
                content_snippet = excluded.content_snippet,
                rendered_content = excluded.rendered_content,
                content_type = excluded.content_type,
                depth = excluded.depth,
                link_count = excluded.link_count,
                fetched_at = excluded.fetched_at,
                updated_at = excluded.updated_at,
                run_id = excluded.run_id",
            params![
                record.url,
                record.final_url,
                record.domain(),
                record.title,
                record.text_snippet,
                record.rendered_content,
                record.content_type,
                record.depth,
                record.links.len() as u32,
                fetched_at,
                now,
                run_id
            ],
        )?;

        tx.execute(
            "INSERT INTO snapshots (url, title, content_snippet, created_at, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![record.url, record.title, record.text_snippet, now, run_id],
        )?;

        for path in &record.media_refs {
            tx.execute(
                "INSERT OR IGNORE INTO media (page_url, path, run_id) VALUES (?1, ?2, ?3)",
                params![record.url, path, run_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<StoredPage>> {
        let page = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE url = ?1", PAGE_COLUMNS),
                params![url],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn list_pages(&self) -> StorageResult<Vec<StoredPage>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM pages ORDER BY url", PAGE_COLUMNS))?;
        let pages = stmt
            .query_map([], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn media_for_page(&self, url: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM media WHERE page_url = ?1 ORDER BY id")?;
        let paths = stmt
            .query_map(params![url], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    // ===== History =====

    fn latest_snapshot(&self, url: &str) -> StorageResult<Option<Snapshot>> {
        let snapshot = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM snapshots WHERE url = ?1 ORDER BY id DESC LIMIT 1",
                    SNAPSHOT_COLUMNS
                ),
                params![url],
                snapshot_from_row,
            )
            .optional()?;
        Ok(snapshot)
    }

    fn snapshots_for(&self, url: &str) -> StorageResult<Vec<Snapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE url = ?1 ORDER BY id DESC",
            SNAPSHOT_COLUMNS
        ))?;
        let snapshots = stmt
            .query_map(params![url], snapshot_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    fn urls_with_history(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM snapshots GROUP BY url HAVING COUNT(*) > 1 ORDER BY url",
        )?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    // ===== Statistics =====

    fn count_pages(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM pages")
    }

    fn count_pages_for_run(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_unique_domains(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(DISTINCT domain) FROM pages")
    }

    fn count_snapshots(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM snapshots")
    }

    fn count_media(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM media")
    }

    fn get_depth_breakdown(&self) -> StorageResult<HashMap<u32, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM pages GROUP BY depth ORDER BY depth")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)))?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }
        Ok(breakdown)
    }
}
