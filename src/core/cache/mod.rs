//! # Cache Module
//!
//! Persists exact and perceptual fingerprints across runs so unchanged files
//! are never re-hashed.
//!
//! ## Invalidation
//! Rows are keyed by path but guarded by the full stat identity
//! (size, mtime_ns, dev, ino). A lookup returns the stored fingerprints only
//! when every identity component matches; an upsert that observes a changed
//! identity replaces all fingerprint fields atomically, nulls included, so a
//! stale hash can never be promoted onto new file content.
//!
//! ## Durability
//! One connection per run, WAL journal, writes batched in an explicit
//! transaction that becomes visible on `commit()`. A crash mid-batch rolls
//! the whole batch back; rows are never half-updated.
//!
//! ## Concurrency
//! Single writer: the orchestrator thread owns the cache, so every method
//! takes `&mut self` and there is no interior locking.

use crate::core::scanner::FileIdentity;
use crate::error::CacheError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Fingerprints stored for one file identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheRecord {
    pub quick_hash: Option<String>,
    pub full_hash: Option<String>,
    pub media_sig: Option<Vec<u8>>,
    pub media_meta: Option<Vec<u8>>,
}

/// Fingerprint fields carried by one upsert.
///
/// `None` means "leave the stored value alone" when the identity is
/// unchanged, and "store null" when the identity changed.
#[derive(Debug, Clone, Default)]
pub struct SignatureUpdate {
    pub quick_hash: Option<String>,
    pub full_hash: Option<String>,
    pub media_sig: Option<Vec<u8>>,
    pub media_meta: Option<Vec<u8>>,
}

impl From<CacheRecord> for SignatureUpdate {
    fn from(record: CacheRecord) -> Self {
        Self {
            quick_hash: record.quick_hash,
            full_hash: record.full_hash,
            media_sig: record.media_sig,
            media_meta: record.media_meta,
        }
    }
}

/// SQLite-backed signature store
pub struct SignatureCache {
    conn: Connection,
    db_path: PathBuf,
}

impl SignatureCache {
    /// Open or create the cache database and start the first write batch.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CacheError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| CacheError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS signatures (
                path TEXT PRIMARY KEY,
                size INTEGER NOT NULL,
                mtime_ns INTEGER NOT NULL,
                dev INTEGER NOT NULL,
                ino INTEGER NOT NULL,
                quick_hash TEXT,
                full_hash TEXT,
                media_sig BLOB,
                media_meta BLOB,
                last_seen_run TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signatures_seen
            ON signatures(last_seen_run);",
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        conn.execute_batch("BEGIN;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn,
            db_path: path.to_path_buf(),
        })
    }

    /// Path the cache was opened at.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Fetch the stored record, but only if the full identity matches.
    pub fn get(&mut self, identity: &FileIdentity) -> Result<Option<CacheRecord>, CacheError> {
        self.conn
            .query_row(
                "SELECT quick_hash, full_hash, media_sig, media_meta
                 FROM signatures
                 WHERE path = ?1
                   AND size = ?2
                   AND mtime_ns = ?3
                   AND dev = ?4
                   AND ino = ?5",
                params![
                    identity.path.to_string_lossy(),
                    identity.size as i64,
                    identity.mtime_ns,
                    identity.dev as i64,
                    identity.ino as i64,
                ],
                |row| {
                    Ok(CacheRecord {
                        quick_hash: row.get(0)?,
                        full_hash: row.get(1)?,
                        media_sig: row.get(2)?,
                        media_meta: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))
    }

    /// Insert or update the row for `identity`.
    ///
    /// When the stored identity differs, every fingerprint field takes the
    /// incoming value (clearing stale ones); when it matches, each field
    /// coalesces incoming-over-stored. `last_seen_run` is always stamped.
    pub fn upsert(
        &mut self,
        identity: &FileIdentity,
        update: SignatureUpdate,
        run_id: &str,
    ) -> Result<(), CacheError> {
        self.conn
            .execute(
                "INSERT INTO signatures (
                    path, size, mtime_ns, dev, ino,
                    quick_hash, full_hash, media_sig, media_meta, last_seen_run
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(path) DO UPDATE SET
                    size = excluded.size,
                    mtime_ns = excluded.mtime_ns,
                    dev = excluded.dev,
                    ino = excluded.ino,
                    quick_hash = CASE
                        WHEN (
                            signatures.size <> excluded.size OR
                            signatures.mtime_ns <> excluded.mtime_ns OR
                            signatures.dev <> excluded.dev OR
                            signatures.ino <> excluded.ino
                        ) THEN excluded.quick_hash
                        ELSE COALESCE(excluded.quick_hash, signatures.quick_hash)
                    END,
                    full_hash = CASE
                        WHEN (
                            signatures.size <> excluded.size OR
                            signatures.mtime_ns <> excluded.mtime_ns OR
                            signatures.dev <> excluded.dev OR
                            signatures.ino <> excluded.ino
                        ) THEN excluded.full_hash
                        ELSE COALESCE(excluded.full_hash, signatures.full_hash)
                    END,
                    media_sig = CASE
                        WHEN (
                            signatures.size <> excluded.size OR
                            signatures.mtime_ns <> excluded.mtime_ns OR
                            signatures.dev <> excluded.dev OR
                            signatures.ino <> excluded.ino
                        ) THEN excluded.media_sig
                        ELSE COALESCE(excluded.media_sig, signatures.media_sig)
                    END,
                    media_meta = CASE
                        WHEN (
                            signatures.size <> excluded.size OR
                            signatures.mtime_ns <> excluded.mtime_ns OR
                            signatures.dev <> excluded.dev OR
                            signatures.ino <> excluded.ino
                        ) THEN excluded.media_meta
                        ELSE COALESCE(excluded.media_meta, signatures.media_meta)
                    END,
                    last_seen_run = excluded.last_seen_run",
                params![
                    identity.path.to_string_lossy(),
                    identity.size as i64,
                    identity.mtime_ns,
                    identity.dev as i64,
                    identity.ino as i64,
                    update.quick_hash,
                    update.full_hash,
                    update.media_sig,
                    update.media_meta,
                    run_id,
                ],
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    /// Flush the current write batch durably and start the next one.
    pub fn commit(&mut self) -> Result<(), CacheError> {
        self.conn
            .execute_batch("COMMIT; BEGIN;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))
    }

    /// Delete every row not stamped with the current run identifier.
    pub fn prune_stale(&mut self, run_id: &str) -> Result<(), CacheError> {
        self.conn
            .execute(
                "DELETE FROM signatures WHERE last_seen_run <> ?1",
                params![run_id],
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        self.commit()
    }

    /// Commit outstanding writes and release the connection.
    pub fn close(self) -> Result<(), CacheError> {
        self.conn
            .execute_batch("COMMIT;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        self.conn
            .close()
            .map_err(|(_, e)| CacheError::QueryFailed(e.to_string()))
    }

    #[cfg(test)]
    fn row_count(&mut self) -> usize {
        self.conn
            .query_row("SELECT COUNT(*) FROM signatures", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count as usize)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity(path: &str, size: u64, mtime_ns: i64, dev: u64, ino: u64) -> FileIdentity {
        FileIdentity {
            path: PathBuf::from(path),
            size,
            mtime_ns,
            dev,
            ino,
        }
    }

    fn full_update() -> SignatureUpdate {
        SignatureUpdate {
            quick_hash: Some("quick".to_string()),
            full_hash: Some("full".to_string()),
            media_sig: Some(vec![1, 2, 3]),
            media_meta: Some(vec![4, 5, 6]),
        }
    }

    fn open_cache(dir: &TempDir) -> SignatureCache {
        SignatureCache::open(&dir.path().join("cache.sqlite")).unwrap()
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut cache = open_cache(&dir);
        let id = identity("/media/a.bin", 100, 111, 1, 2);

        cache.upsert(&id, full_update(), "run-a").unwrap();
        cache.commit().unwrap();

        let record = cache.get(&id).unwrap().unwrap();
        assert_eq!(record.quick_hash.as_deref(), Some("quick"));
        assert_eq!(record.full_hash.as_deref(), Some("full"));
        assert_eq!(record.media_sig, Some(vec![1, 2, 3]));
        assert_eq!(record.media_meta, Some(vec![4, 5, 6]));
    }

    #[test]
    fn get_rejects_any_identity_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut cache = open_cache(&dir);
        let id = identity("/media/a.bin", 100, 111, 1, 2);
        cache.upsert(&id, full_update(), "run-a").unwrap();
        cache.commit().unwrap();

        assert!(cache
            .get(&identity("/media/a.bin", 100, 222, 1, 2))
            .unwrap()
            .is_none());
        assert!(cache
            .get(&identity("/media/a.bin", 101, 111, 1, 2))
            .unwrap()
            .is_none());
        assert!(cache
            .get(&identity("/media/a.bin", 100, 111, 9, 2))
            .unwrap()
            .is_none());
        assert!(cache
            .get(&identity("/media/a.bin", 100, 111, 1, 9))
            .unwrap()
            .is_none());
        assert!(cache.get(&id).unwrap().is_some());
    }

    #[test]
    fn matching_identity_coalesces_missing_fields() {
        let dir = TempDir::new().unwrap();
        let mut cache = open_cache(&dir);
        let id = identity("/media/a.bin", 100, 111, 1, 2);

        cache.upsert(&id, full_update(), "run-a").unwrap();
        // Second upsert only carries a new quick hash; the rest must survive.
        cache
            .upsert(
                &id,
                SignatureUpdate {
                    quick_hash: Some("quick-2".to_string()),
                    ..Default::default()
                },
                "run-b",
            )
            .unwrap();
        cache.commit().unwrap();

        let record = cache.get(&id).unwrap().unwrap();
        assert_eq!(record.quick_hash.as_deref(), Some("quick-2"));
        assert_eq!(record.full_hash.as_deref(), Some("full"));
        assert_eq!(record.media_sig, Some(vec![1, 2, 3]));
    }

    #[test]
    fn changed_identity_destroys_prior_fingerprints() {
        let dir = TempDir::new().unwrap();
        let mut cache = open_cache(&dir);
        let old = identity("/media/a.bin", 100, 111, 1, 2);
        cache.upsert(&old, full_update(), "run-a").unwrap();

        // Same path, new mtime: only the incoming quick hash may survive.
        let new = identity("/media/a.bin", 100, 999, 1, 2);
        cache
            .upsert(
                &new,
                SignatureUpdate {
                    quick_hash: Some("fresh".to_string()),
                    ..Default::default()
                },
                "run-b",
            )
            .unwrap();
        cache.commit().unwrap();

        assert!(cache.get(&old).unwrap().is_none());
        let record = cache.get(&new).unwrap().unwrap();
        assert_eq!(record.quick_hash.as_deref(), Some("fresh"));
        assert_eq!(record.full_hash, None);
        assert_eq!(record.media_sig, None);
        assert_eq!(record.media_meta, None);
    }

    #[test]
    fn prune_stale_removes_rows_from_other_runs() {
        let dir = TempDir::new().unwrap();
        let mut cache = open_cache(&dir);
        cache
            .upsert(
                &identity("/media/old.bin", 1, 1, 1, 1),
                SignatureUpdate::default(),
                "run-a",
            )
            .unwrap();
        cache
            .upsert(
                &identity("/media/new.bin", 2, 2, 2, 2),
                SignatureUpdate::default(),
                "run-b",
            )
            .unwrap();
        cache.commit().unwrap();

        cache.prune_stale("run-b").unwrap();

        assert_eq!(cache.row_count(), 1);
        assert!(cache
            .get(&identity("/media/new.bin", 2, 2, 2, 2))
            .unwrap()
            .is_some());
    }

    #[test]
    fn close_persists_committed_rows() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("cache.sqlite");
        let id = identity("/media/a.bin", 100, 111, 1, 2);

        let mut cache = SignatureCache::open(&db_path).unwrap();
        cache.upsert(&id, full_update(), "run-a").unwrap();
        cache.close().unwrap();

        let mut reopened = SignatureCache::open(&db_path).unwrap();
        assert!(reopened.get(&id).unwrap().is_some());
    }
}
