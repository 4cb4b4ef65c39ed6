//! SQLite-backed persistent store for the offline response cache.
//!
//! Responses are grouped into named caches. A cache name is a deployment
//! generation: installing a new name and activating it purges every other one.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use bytes::Bytes;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::net::Response;

/// SQLite-backed storage for cached responses.
///
/// The database is stored at `XDG_CACHE_HOME/galerie/offline.sqlite` by
/// default and uses WAL mode.
pub struct ResponseStore {
    conn: Connection,
}

/// Database statistics for debugging and monitoring.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub cache_count: i64,
    pub response_count: i64,
    pub body_bytes: i64,
}

impl ResponseStore {
    /// Opens or creates the database at the default XDG location.
    pub fn open_default() -> anyhow::Result<Self> {
        let db_path = Self::default_db_path()?;
        Ok(Self::open(&db_path)?)
    }

    /// Returns the default database path based on XDG directories.
    pub fn default_db_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "galerie")
            .context("Failed to determine project directories")?;

        let cache_dir = proj_dirs.cache_dir();
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", cache_dir))?;

        Ok(cache_dir.join("offline.sqlite"))
    }

    /// Opens or creates the database at the specified path.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(?parent, error = ?e, "Failed to create store directory");
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::configure(conn)?;
        info!("Opened response store at {:?}", path);
        Ok(store)
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), CacheError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS caches (
                name TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS responses (
                cache_name TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                content_type TEXT,
                body BLOB NOT NULL,
                stored_at INTEGER NOT NULL,
                PRIMARY KEY (cache_name, url),
                FOREIGN KEY (cache_name) REFERENCES caches(name) ON DELETE CASCADE
            );
            ",
        )?;

        debug!("Response store tables created/verified");
        Ok(())
    }

    // =========================================================================
    // Cache names
    // =========================================================================

    /// Creates the named cache if it doesn't exist.
    pub fn open_cache(&self, name: &str) -> Result<(), CacheError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
            params![name, Self::now()],
        )?;
        Ok(())
    }

    /// Returns all cache names, oldest first.
    pub fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name FROM caches ORDER BY created_at, name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Deletes a cache and every response in it.
    pub fn delete_cache(&self, name: &str) -> Result<bool, CacheError> {
        let rows = self
            .conn
            .execute("DELETE FROM caches WHERE name = ?1", params![name])?;
        Ok(rows > 0)
    }

    // =========================================================================
    // Responses
    // =========================================================================

    /// Looks up a stored response.
    pub fn match_url(&self, cache_name: &str, url: &str) -> Result<Option<Response>, CacheError> {
        let response = self
            .conn
            .query_row(
                "
            SELECT status, content_type, body
            FROM responses WHERE cache_name = ?1 AND url = ?2
            ",
                params![cache_name, url],
                |row| {
                    Ok(Response {
                        status: row.get(0)?,
                        content_type: row.get(1)?,
                        body: Bytes::from(row.get::<_, Vec<u8>>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(response)
    }

    /// Stores a response, replacing any older version for the same URL.
    pub fn put(&self, cache_name: &str, url: &str, response: &Response) -> Result<(), CacheError> {
        self.open_cache(cache_name)?;
        self.conn.execute(
            "
            INSERT INTO responses (cache_name, url, status, content_type, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(cache_name, url) DO UPDATE SET
                status = excluded.status,
                content_type = excluded.content_type,
                body = excluded.body,
                stored_at = excluded.stored_at
            ",
            params![
                cache_name,
                url,
                response.status,
                response.content_type,
                response.body.as_ref(),
                Self::now(),
            ],
        )?;
        Ok(())
    }

    /// Stores several responses in one transaction. Nothing is stored on error.
    pub fn put_all(&mut self, cache_name: &str, entries: &[(String, Response)]) -> Result<usize, CacheError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
            params![cache_name, Self::now()],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "
                INSERT INTO responses (cache_name, url, status, content_type, body, stored_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(cache_name, url) DO UPDATE SET
                    status = excluded.status,
                    content_type = excluded.content_type,
                    body = excluded.body,
                    stored_at = excluded.stored_at
                ",
            )?;
            for (url, response) in entries {
                stmt.execute(params![
                    cache_name,
                    url,
                    response.status,
                    response.content_type,
                    response.body.as_ref(),
                    Self::now(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(cache_name, count = entries.len(), "Batch stored responses");
        Ok(entries.len())
    }

    /// Number of responses stored under a cache name.
    #[cfg(test)]
    pub fn count(&self, cache_name: &str) -> Result<i64, CacheError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM responses WHERE cache_name = ?1",
            params![cache_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn get_stats(&self) -> Result<StoreStats, CacheError> {
        let cache_count = self
            .conn
            .query_row("SELECT COUNT(*) FROM caches", [], |r| r.get(0))?;
        let response_count = self
            .conn
            .query_row("SELECT COUNT(*) FROM responses", [], |r| r.get(0))?;
        let body_bytes = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(body)), 0) FROM responses",
            [],
            |r| r.get(0),
        )?;

        Ok(StoreStats {
            cache_count,
            response_count,
            body_bytes,
        })
    }

    /// Returns the current Unix timestamp.
    pub fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn png_response(body: &'static [u8]) -> Response {
        Response::new(200, Some("image/png".to_string()), body)
    }

    #[test]
    fn test_open_and_create() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("offline.sqlite");

        let store = ResponseStore::open(&db_path).unwrap();
        assert!(db_path.exists());

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.cache_count, 0);
        assert_eq!(stats.response_count, 0);
    }

    #[test]
    fn test_put_and_match() {
        let store = ResponseStore::open_in_memory().unwrap();
        let url = "http://localhost:3002/images/Tree.png";
        store.put("v1", url, &png_response(b"tree")).unwrap();

        let hit = store.match_url("v1", url).unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.content_type.as_deref(), Some("image/png"));
        assert_eq!(hit.body.as_ref(), b"tree");

        // Other cache names do not see it
        assert!(store.match_url("v2", url).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_previous_version() {
        let store = ResponseStore::open_in_memory().unwrap();
        let url = "http://localhost:3002/images/RGB.png";
        store.put("v1", url, &png_response(b"old")).unwrap();
        store.put("v1", url, &png_response(b"new")).unwrap();

        assert_eq!(store.count("v1").unwrap(), 1);
        let hit = store.match_url("v1", url).unwrap().unwrap();
        assert_eq!(hit.body.as_ref(), b"new");
    }

    #[test]
    fn test_delete_cache_cascades() {
        let store = ResponseStore::open_in_memory().unwrap();
        store.put("v1", "http://a/images/1.png", &png_response(b"1")).unwrap();
        store.put("v2", "http://a/images/2.png", &png_response(b"2")).unwrap();

        assert!(store.delete_cache("v1").unwrap());
        assert!(!store.delete_cache("v1").unwrap());
        assert_eq!(store.cache_names().unwrap(), vec!["v2".to_string()]);
        assert_eq!(store.count("v1").unwrap(), 0);
        assert_eq!(store.get_stats().unwrap().response_count, 1);
    }

    #[test]
    fn test_put_all_in_transaction() {
        let mut store = ResponseStore::open_in_memory().unwrap();
        let entries: Vec<(String, Response)> = (0..10)
            .map(|i| (format!("http://a/{}", i), Response::new(200, None, vec![i as u8])))
            .collect();

        assert_eq!(store.put_all("v1", &entries).unwrap(), 10);
        assert_eq!(store.count("v1").unwrap(), 10);
        assert_eq!(store.get_stats().unwrap().body_bytes, 10);
    }

    #[test]
    fn test_reopen_keeps_responses() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("offline.sqlite");
        {
            let store = ResponseStore::open(&db_path).unwrap();
            store.put("v1", "http://a/index.html", &Response::new(200, None, "<html>")).unwrap();
        }
        let store = ResponseStore::open(&db_path).unwrap();
        assert!(store.match_url("v1", "http://a/index.html").unwrap().is_some());
    }
}
