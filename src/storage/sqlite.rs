//! `SQLite` fingerprint store.
//!
//! Persists fingerprints in `submission_fingerprints` and the denormalized
//! feature index in `fingerprint_features`, mirroring the detector's two
//! lookup shapes: range scans by submit time and point lookups by
//! `(feature_type, feature_value)`.

use crate::models::{FingerprintStatus, SubmissionFingerprint};
use crate::storage::{ContentHashRow, FeatureOwner, FeatureRow, FingerprintStore};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (due to a panic in a previous critical section),
/// we recover the inner value and log a warning. This prevents cascading
/// failures when one operation panics.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

fn storage_error(operation: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::Storage {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

/// SQLite-backed [`FingerprintStore`].
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. `SQLite`'s WAL mode
/// and `busy_timeout` pragma mitigate contention: WAL allows concurrent
/// readers with a single writer, and the 5-second busy timeout waits for
/// locks instead of failing immediately.
pub struct SqliteStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the `SQLite` database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (or creates) a fingerprint store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(storage_error("open_sqlite"))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error("open_sqlite_memory"))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes pragmas and the schema. Idempotent; runs automatically
    /// in the constructors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if table creation fails.
    pub fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // WAL for concurrent reads; journal_mode returns a string result
        // which would trip execute_batch, so pragma_update is used and the
        // result ignored.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");

        conn.execute(
            "CREATE TABLE IF NOT EXISTS submission_fingerprints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                username TEXT,
                urls TEXT,
                tg_usernames TEXT,
                tg_links TEXT,
                phone_numbers TEXT,
                emails TEXT,
                bio_features TEXT,
                content_hash TEXT,
                content_length INTEGER,
                submit_time INTEGER NOT NULL,
                submission_id INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                fingerprint_version INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )
        .map_err(storage_error("create_fingerprints_table"))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS fingerprint_features (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint_id INTEGER NOT NULL,
                feature_type TEXT NOT NULL,
                feature_value TEXT NOT NULL,
                created_at INTEGER DEFAULT (strftime('%s', 'now')),
                FOREIGN KEY (fingerprint_id) REFERENCES submission_fingerprints(id)
            )",
            [],
        )
        .map_err(storage_error("create_features_table"))?;

        Self::create_indexes(&conn);

        Ok(())
    }

    /// Creates indexes for the detector's query patterns.
    fn create_indexes(conn: &Connection) {
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fp_user_id ON submission_fingerprints(user_id)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fp_submit_time ON submission_fingerprints(submit_time)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fp_content_hash ON submission_fingerprints(content_hash)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fp_status ON submission_fingerprints(status)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_ff_type_value ON fingerprint_features(feature_type, feature_value)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_ff_fingerprint ON fingerprint_features(fingerprint_id)",
            [],
        );
    }

    /// Total fingerprint rows (all statuses). Used by the CLI status output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on query failure.
    pub fn fingerprint_count(&self) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        conn.query_row("SELECT COUNT(*) FROM submission_fingerprints", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| u64::try_from(n).unwrap_or(0))
        .map_err(storage_error("fingerprint_count"))
    }

    /// Total feature-index rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on query failure.
    pub fn feature_count(&self) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        conn.query_row("SELECT COUNT(*) FROM fingerprint_features", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| u64::try_from(n).unwrap_or(0))
        .map_err(storage_error("feature_count"))
    }

    fn encode_list(list: &[String]) -> String {
        serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
    }
}

impl FingerprintStore for SqliteStore {
    fn insert_fingerprint(
        &self,
        fingerprint: &SubmissionFingerprint,
        status: FingerprintStatus,
        submission_id: Option<i64>,
    ) -> Result<i64> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(storage_error("insert_fingerprint"))?;

        let bio_features = serde_json::json!({
            "urls": fingerprint.bio_urls,
            "tg_links": fingerprint.bio_tg_links,
            "contacts": fingerprint.bio_contacts,
        })
        .to_string();

        // Empty hash is stored as NULL so hash scans can filter it out.
        let content_hash = if fingerprint.content_hash.is_empty() {
            None
        } else {
            Some(fingerprint.content_hash.as_str())
        };

        tx.execute(
            "INSERT INTO submission_fingerprints
             (user_id, username, urls, tg_usernames, tg_links,
              phone_numbers, emails, bio_features, content_hash,
              content_length, submit_time, submission_id, status, fingerprint_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                fingerprint.user_id,
                fingerprint.username,
                Self::encode_list(&fingerprint.urls),
                Self::encode_list(&fingerprint.tg_usernames),
                Self::encode_list(&fingerprint.tg_links),
                Self::encode_list(&fingerprint.phone_numbers),
                Self::encode_list(&fingerprint.emails),
                bio_features,
                content_hash,
                i64::try_from(fingerprint.content_length).unwrap_or(i64::MAX),
                fingerprint.submit_time,
                submission_id,
                status.as_str(),
                fingerprint.fingerprint_version,
            ],
        )
        .map_err(storage_error("insert_fingerprint"))?;

        let fingerprint_id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO fingerprint_features (fingerprint_id, feature_type, feature_value)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(storage_error("insert_feature"))?;
            for (kind, value) in fingerprint.all_features() {
                stmt.execute(params![fingerprint_id, kind.as_str(), value])
                    .map_err(storage_error("insert_feature"))?;
            }
        }

        tx.commit().map_err(storage_error("insert_fingerprint"))?;
        Ok(fingerprint_id)
    }

    fn count_approved_by_user_since(&self, user_id: i64, since: i64) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT COUNT(*) FROM submission_fingerprints
             WHERE user_id = ?1 AND submit_time > ?2 AND status = 'approved'",
            params![user_id, since],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| u64::try_from(n).unwrap_or(0))
        .map_err(storage_error("count_approved_by_user_since"))
    }

    fn scan_features_since(&self, since: i64) -> Result<Vec<FeatureRow>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT ff.feature_type, ff.feature_value, sf.id, sf.submit_time
                 FROM fingerprint_features ff
                 JOIN submission_fingerprints sf ON ff.fingerprint_id = sf.id
                 WHERE sf.submit_time > ?1 AND sf.status = 'approved'",
            )
            .map_err(storage_error("scan_features_since"))?;

        let rows = stmt
            .query_map(params![since], |row| {
                Ok(FeatureRow {
                    feature_type: row.get(0)?,
                    feature_value: row.get(1)?,
                    fingerprint_id: row.get(2)?,
                    submit_time: row.get(3)?,
                })
            })
            .map_err(storage_error("scan_features_since"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_error("scan_features_since"))?;

        Ok(rows)
    }

    fn scan_content_hashes_since(&self, since: i64) -> Result<Vec<ContentHashRow>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT id, content_hash, submit_time, user_id
                 FROM submission_fingerprints
                 WHERE submit_time > ?1 AND status = 'approved'
                   AND content_hash IS NOT NULL AND content_hash != ''
                 ORDER BY id",
            )
            .map_err(storage_error("scan_content_hashes_since"))?;

        let rows = stmt
            .query_map(params![since], |row| {
                Ok(ContentHashRow {
                    fingerprint_id: row.get(0)?,
                    content_hash: row.get(1)?,
                    submit_time: row.get(2)?,
                    user_id: row.get(3)?,
                })
            })
            .map_err(storage_error("scan_content_hashes_since"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_error("scan_content_hashes_since"))?;

        Ok(rows)
    }

    fn find_feature_excluding_user(
        &self,
        feature_type: &str,
        feature_value: &str,
        since: i64,
        exclude_user_id: i64,
    ) -> Result<Option<FeatureOwner>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT sf.id, sf.submit_time
             FROM fingerprint_features ff
             JOIN submission_fingerprints sf ON ff.fingerprint_id = sf.id
             WHERE ff.feature_type = ?1 AND ff.feature_value = ?2
               AND sf.submit_time > ?3 AND sf.status = 'approved'
               AND sf.user_id != ?4
             LIMIT 1",
            params![feature_type, feature_value, since, exclude_user_id],
            |row| {
                Ok(FeatureOwner {
                    fingerprint_id: row.get(0)?,
                    submit_time: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(storage_error("find_feature_excluding_user"))
    }

    fn delete_fingerprints_before(&self, cutoff: i64) -> Result<usize> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(storage_error("delete_fingerprints_before"))?;

        // Feature rows first: they reference the fingerprint rows.
        tx.execute(
            "DELETE FROM fingerprint_features
             WHERE fingerprint_id IN
               (SELECT id FROM submission_fingerprints WHERE submit_time < ?1)",
            params![cutoff],
        )
        .map_err(storage_error("delete_fingerprints_before"))?;

        let deleted = tx
            .execute(
                "DELETE FROM submission_fingerprints WHERE submit_time < ?1",
                params![cutoff],
            )
            .map_err(storage_error("delete_fingerprints_before"))?;

        tx.commit()
            .map_err(storage_error("delete_fingerprints_before"))?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FINGERPRINT_VERSION;

    fn fingerprint(user_id: i64, submit_time: i64) -> SubmissionFingerprint {
        SubmissionFingerprint {
            user_id,
            username: format!("user{user_id}"),
            urls: vec!["http://example.com/offer".to_string()],
            tg_usernames: vec![],
            tg_links: vec!["promo_chan".to_string()],
            phone_numbers: vec![],
            emails: vec![],
            content_hash: "00ff00ff00ff00ff".to_string(),
            bio_urls: vec![],
            bio_tg_links: vec!["bio_chan".to_string()],
            bio_contacts: vec![],
            submit_time,
            content_length: 24,
            fingerprint_version: FINGERPRINT_VERSION,
        }
    }

    #[test]
    fn test_insert_writes_fingerprint_and_features() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store
            .insert_fingerprint(&fingerprint(1, 1000), FingerprintStatus::Approved, Some(77))
            .unwrap();
        assert!(id > 0);
        assert_eq!(store.fingerprint_count().unwrap(), 1);
        // url + tg_link + bio_tg_link
        assert_eq!(store.feature_count().unwrap(), 3);
    }

    #[test]
    fn test_scan_features_filters_status_and_window() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_fingerprint(&fingerprint(1, 1000), FingerprintStatus::Approved, None)
            .unwrap();
        store
            .insert_fingerprint(&fingerprint(2, 1000), FingerprintStatus::Pending, None)
            .unwrap();
        store
            .insert_fingerprint(&fingerprint(3, 10), FingerprintStatus::Approved, None)
            .unwrap();

        let rows = store.scan_features_since(500).unwrap();
        // Only user 1's approved, in-window fingerprint contributes.
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.submit_time == 1000));
    }

    #[test]
    fn test_scan_content_hashes_skips_empty() {
        let store = SqliteStore::in_memory().unwrap();
        let mut no_hash = fingerprint(1, 1000);
        no_hash.content_hash = String::new();
        store
            .insert_fingerprint(&no_hash, FingerprintStatus::Approved, None)
            .unwrap();
        store
            .insert_fingerprint(&fingerprint(2, 1000), FingerprintStatus::Approved, None)
            .unwrap();

        let rows = store.scan_content_hashes_since(0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, 2);
        assert_eq!(rows[0].content_hash, "00ff00ff00ff00ff");
    }

    #[test]
    fn test_count_approved_by_user_since() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_fingerprint(&fingerprint(9, 1000), FingerprintStatus::Approved, None)
            .unwrap();
        store
            .insert_fingerprint(&fingerprint(9, 2000), FingerprintStatus::Approved, None)
            .unwrap();
        store
            .insert_fingerprint(&fingerprint(9, 3000), FingerprintStatus::Rejected, None)
            .unwrap();

        assert_eq!(store.count_approved_by_user_since(9, 0).unwrap(), 2);
        assert_eq!(store.count_approved_by_user_since(9, 1500).unwrap(), 1);
        assert_eq!(store.count_approved_by_user_since(8, 0).unwrap(), 0);
    }

    #[test]
    fn test_find_feature_excludes_user() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_fingerprint(&fingerprint(5, 1000), FingerprintStatus::Approved, None)
            .unwrap();

        // Same user excluded
        let hit = store
            .find_feature_excluding_user("url", "http://example.com/offer", 0, 5)
            .unwrap();
        assert!(hit.is_none());

        // Different user sees the match
        let hit = store
            .find_feature_excluding_user("url", "http://example.com/offer", 0, 6)
            .unwrap()
            .unwrap();
        assert_eq!(hit.submit_time, 1000);
    }

    #[test]
    fn test_delete_fingerprints_before_removes_features_too() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_fingerprint(&fingerprint(1, 100), FingerprintStatus::Approved, None)
            .unwrap();
        store
            .insert_fingerprint(&fingerprint(2, 9000), FingerprintStatus::Approved, None)
            .unwrap();
        assert_eq!(store.feature_count().unwrap(), 6);

        let deleted = store.delete_fingerprints_before(5000).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.fingerprint_count().unwrap(), 1);
        assert_eq!(store.feature_count().unwrap(), 3);
    }

    #[test]
    fn test_file_backed_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fingerprints.db");
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));

        store
            .insert_fingerprint(&fingerprint(1, 1000), FingerprintStatus::Approved, None)
            .unwrap();
        drop(store);

        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.fingerprint_count().unwrap(), 1);
    }
}
