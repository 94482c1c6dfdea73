//! SQLite-backed snapshot registry.
//!
//! Three tables:
//! - backupsets: machine_id, name, created_at, UNIQUE(machine_id, name)
//! - snapshots: identity + summary columns, UNIQUE(machine_id, backupset_name, snapshot_id)
//! - files: one row per FileRecord, keyed to its snapshot row
//!
//! The UNIQUE constraints make the duplicate checks atomic: under concurrent
//! `put_snapshot` calls for the same key, exactly one insert succeeds and
//! the rest surface `DuplicateSnapshot`. The connection lives behind a mutex;
//! the registry has an explicit lifecycle (opened at startup, passed to the
//! commands that need it) instead of process-wide global state.

pub mod diff;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::{DriftError, Result};
use crate::snapshot::{BackupSet, FileRecord, Snapshot, SnapshotSummary};

/// Get the database path (~/.local/share/driftscan/registry.db or platform
/// equivalent).
fn default_db_path() -> Result<PathBuf> {
    let data_dir = directories::ProjectDirs::from("", "", "driftscan")
        .ok_or_else(|| DriftError::Config {
            details: "could not determine data directory".to_string(),
        })?
        .data_dir()
        .to_path_buf();

    std::fs::create_dir_all(&data_dir).map_err(|e| DriftError::io(&data_dir, e))?;
    Ok(data_dir.join("registry.db"))
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS backupsets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            machine_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(machine_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            machine_id TEXT NOT NULL,
            backupset_name TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            file_count INTEGER NOT NULL,
            total_size INTEGER NOT NULL,
            error_count INTEGER NOT NULL,
            UNIQUE(machine_id, backupset_name, snapshot_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_row INTEGER NOT NULL,
            path TEXT NOT NULL,
            size INTEGER,
            mtime REAL,
            inode INTEGER,
            checksum TEXT,
            error TEXT,
            FOREIGN KEY(snapshot_row) REFERENCES snapshots(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_files_snapshot_row ON files(snapshot_row)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_set
         ON snapshots(machine_id, backupset_name, timestamp)",
        [],
    )?;

    Ok(())
}

/// Registry handle. Open once per process, share by reference.
pub struct Registry {
    conn: Mutex<Connection>,
}

impl Registry {
    /// Open the registry at the platform data directory.
    pub fn open() -> Result<Self> {
        Self::open_at(&default_db_path()?)
    }

    /// Open the registry at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Hermetic in-memory registry for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Registry {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // a poisoned mutex only means another thread panicked mid-query;
        // the connection itself is still usable
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a backup-set. Fails with `AlreadyExists` if the
    /// (machine, name) pair is already registered.
    pub fn register_backupset(&self, machine_id: &str, name: &str) -> Result<BackupSet> {
        let created_at = Utc::now().timestamp_millis();
        let conn = self.lock();

        conn.execute(
            "INSERT INTO backupsets (machine_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![machine_id, name, created_at],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                DriftError::AlreadyExists {
                    machine_id: machine_id.to_string(),
                    name: name.to_string(),
                }
            } else {
                DriftError::Sql(e)
            }
        })?;

        Ok(BackupSet {
            machine_id: machine_id.to_string(),
            name: name.to_string(),
            created_at,
        })
    }

    /// Store a snapshot immutably. The summary is recomputed from the file
    /// list before anything is written; an incoming summary is never trusted.
    pub fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let summary = SnapshotSummary::compute(&snapshot.files);

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let set_exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM backupsets WHERE machine_id = ?1 AND name = ?2)",
                params![snapshot.machine_id, snapshot.backupset_name],
                |row| row.get(0),
            )?;
        if !set_exists {
            return Err(DriftError::UnknownBackupSet {
                machine_id: snapshot.machine_id.clone(),
                name: snapshot.backupset_name.clone(),
            });
        }

        tx.execute(
            "INSERT INTO snapshots
                (machine_id, backupset_name, snapshot_id, timestamp, file_count, total_size, error_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot.machine_id,
                snapshot.backupset_name,
                snapshot.snapshot_id,
                snapshot.timestamp,
                summary.file_count,
                i64::try_from(summary.total_size).unwrap_or(i64::MAX),
                summary.error_count,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                DriftError::DuplicateSnapshot {
                    machine_id: snapshot.machine_id.clone(),
                    name: snapshot.backupset_name.clone(),
                    snapshot_id: snapshot.snapshot_id.clone(),
                }
            } else {
                DriftError::Sql(e)
            }
        })?;

        let snapshot_row = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO files (snapshot_row, path, size, mtime, inode, checksum, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for file in &snapshot.files {
                stmt.execute(params![
                    snapshot_row,
                    file.path,
                    file.size.map(|s| i64::try_from(s).unwrap_or(i64::MAX)),
                    file.mtime,
                    file.inode.map(|i| i64::try_from(i).unwrap_or(i64::MAX)),
                    file.checksum.as_deref(),
                    file.error.as_deref(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// All backup-sets for a machine, ordered by name for stable output.
    pub fn list_backupsets(&self, machine_id: &str) -> Result<Vec<BackupSet>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT machine_id, name, created_at FROM backupsets
             WHERE machine_id = ?1
             ORDER BY name",
        )?;

        let sets = stmt
            .query_map(params![machine_id], |row| {
                Ok(BackupSet {
                    machine_id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sets)
    }

    /// All snapshots for a backup-set, newest first. Equal timestamps fall
    /// back to snapshot id, descending, so the order is deterministic.
    pub fn list_snapshots(&self, machine_id: &str, name: &str) -> Result<Vec<Snapshot>> {
        self.select_snapshots(
            "SELECT id, machine_id, backupset_name, snapshot_id, timestamp FROM snapshots
             WHERE machine_id = ?1 AND backupset_name = ?2
             ORDER BY timestamp DESC, snapshot_id DESC",
            params![machine_id, name],
        )
    }

    /// The snapshot with the maximum timestamp; ties broken by the highest
    /// snapshot id lexically.
    pub fn latest(&self, machine_id: &str, name: &str) -> Result<Snapshot> {
        let mut rows = self.select_snapshots(
            "SELECT id, machine_id, backupset_name, snapshot_id, timestamp FROM snapshots
             WHERE machine_id = ?1 AND backupset_name = ?2
             ORDER BY timestamp DESC, snapshot_id DESC
             LIMIT 1",
            params![machine_id, name],
        )?;

        rows.pop().ok_or_else(|| DriftError::NotFound {
            machine_id: machine_id.to_string(),
            name: name.to_string(),
            snapshot_id: None,
        })
    }

    pub fn get(&self, machine_id: &str, name: &str, snapshot_id: &str) -> Result<Snapshot> {
        let mut rows = self.select_snapshots(
            "SELECT id, machine_id, backupset_name, snapshot_id, timestamp FROM snapshots
             WHERE machine_id = ?1 AND backupset_name = ?2 AND snapshot_id = ?3",
            params![machine_id, name, snapshot_id],
        )?;

        rows.pop().ok_or_else(|| DriftError::NotFound {
            machine_id: machine_id.to_string(),
            name: name.to_string(),
            snapshot_id: Some(snapshot_id.to_string()),
        })
    }

    /// Snapshots with timestamp in `[from, to]` inclusive (unix millis),
    /// newest first like `list_snapshots`.
    pub fn query_range(
        &self,
        machine_id: &str,
        name: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Snapshot>> {
        self.select_snapshots(
            "SELECT id, machine_id, backupset_name, snapshot_id, timestamp FROM snapshots
             WHERE machine_id = ?1 AND backupset_name = ?2
               AND timestamp >= ?3 AND timestamp <= ?4
             ORDER BY timestamp DESC, snapshot_id DESC",
            params![machine_id, name, from, to],
        )
    }

    fn select_snapshots(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Snapshot>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;

        let headers = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut snapshots = Vec::with_capacity(headers.len());
        for (row_id, machine_id, backupset_name, snapshot_id, timestamp) in headers {
            let files = load_files(&conn, row_id)?;
            snapshots.push(Snapshot {
                machine_id,
                backupset_name,
                snapshot_id,
                timestamp,
                summary: SnapshotSummary::compute(&files),
                files,
            });
        }

        Ok(snapshots)
    }
}

/// Load file records in insert order, which preserves the scan order the
/// snapshot was built with.
fn load_files(conn: &Connection, snapshot_row: i64) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT path, size, mtime, inode, checksum, error FROM files
         WHERE snapshot_row = ?1
         ORDER BY id",
    )?;

    let files = stmt
        .query_map(params![snapshot_row], |row| {
            Ok(FileRecord {
                path: row.get(0)?,
                size: row.get::<_, Option<i64>>(1)?.map(|s| s.max(0) as u64),
                mtime: row.get(2)?,
                inode: row.get::<_, Option<i64>>(3)?.map(|i| i.max(0) as u64),
                checksum: row.get(4)?,
                error: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(files)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord::complete(path.to_string(), size, 100.0, Some(1), "aa".repeat(32))
    }

    fn snapshot_at(set: &str, rfc3339: &str, files: Vec<FileRecord>) -> Snapshot {
        let at = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc);
        SnapshotBuilder::new("m1", set).build_at(files, at)
    }

    fn registry_with_set(set: &str) -> Registry {
        let registry = Registry::open_in_memory().unwrap();
        registry.register_backupset("m1", set).unwrap();
        registry
    }

    #[test]
    fn register_twice_fails_with_already_exists() {
        let registry = Registry::open_in_memory().unwrap();
        registry.register_backupset("m1", "daily").unwrap();

        let err = registry.register_backupset("m1", "daily").unwrap_err();
        assert!(matches!(err, DriftError::AlreadyExists { .. }));

        // same name on a different machine is a different backup-set
        registry.register_backupset("m2", "daily").unwrap();
    }

    #[test]
    fn put_into_unknown_set_fails() {
        let registry = Registry::open_in_memory().unwrap();
        let snapshot = snapshot_at("daily", "2026-08-30T10:00:00Z", vec![]);

        let err = registry.put_snapshot(&snapshot).unwrap_err();
        assert!(matches!(err, DriftError::UnknownBackupSet { .. }));
    }

    #[test]
    fn duplicate_snapshot_rejected() {
        let registry = registry_with_set("daily");
        let snapshot = snapshot_at("daily", "2026-08-30T10:00:00Z", vec![record("a", 1)]);

        registry.put_snapshot(&snapshot).unwrap();
        let err = registry.put_snapshot(&snapshot).unwrap_err();
        assert!(matches!(err, DriftError::DuplicateSnapshot { .. }));
    }

    #[test]
    fn roundtrip_preserves_files_and_order() {
        let registry = registry_with_set("daily");
        let files = vec![
            record("z/last.txt", 3),
            record("a/first.txt", 1),
            FileRecord::failed("m/broken".to_string(), "io error".to_string()),
        ];
        let snapshot = snapshot_at("daily", "2026-08-30T10:00:00Z", files.clone());
        registry.put_snapshot(&snapshot).unwrap();

        let loaded = registry.get("m1", "daily", &snapshot.snapshot_id).unwrap();
        assert_eq!(loaded.files, files);
        assert_eq!(loaded.summary.file_count, 3);
        assert_eq!(loaded.summary.total_size, 4);
        assert_eq!(loaded.summary.error_count, 1);
    }

    #[test]
    fn forged_summary_is_recomputed_on_put() {
        let registry = registry_with_set("daily");
        let mut snapshot = snapshot_at("daily", "2026-08-30T10:00:00Z", vec![record("a", 10)]);
        snapshot.summary.total_size = 12345;
        snapshot.summary.file_count = 999;

        registry.put_snapshot(&snapshot).unwrap();

        let loaded = registry.get("m1", "daily", &snapshot.snapshot_id).unwrap();
        assert_eq!(loaded.summary.total_size, 10);
        assert_eq!(loaded.summary.file_count, 1);
    }

    #[test]
    fn list_snapshots_newest_first() {
        let registry = registry_with_set("daily");
        for ts in [
            "2026-08-28T10:00:00Z",
            "2026-08-30T10:00:00Z",
            "2026-08-29T10:00:00Z",
        ] {
            registry
                .put_snapshot(&snapshot_at("daily", ts, vec![]))
                .unwrap();
        }

        let snapshots = registry.list_snapshots("m1", "daily").unwrap();
        let timestamps: Vec<i64> = snapshots.iter().map(|s| s.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(timestamps, sorted);
        assert_eq!(snapshots.len(), 3);
    }

    #[test]
    fn latest_returns_max_timestamp() {
        let registry = registry_with_set("daily");
        registry
            .put_snapshot(&snapshot_at("daily", "2026-08-28T10:00:00Z", vec![]))
            .unwrap();
        registry
            .put_snapshot(&snapshot_at("daily", "2026-08-30T10:00:00Z", vec![]))
            .unwrap();

        let latest = registry.latest("m1", "daily").unwrap();
        assert_eq!(latest.snapshot_id, "20260830T100000.000Z");
    }

    #[test]
    fn latest_ties_break_on_snapshot_id() {
        let registry = registry_with_set("daily");
        let at = DateTime::parse_from_rfc3339("2026-08-30T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        // two snapshots sharing a timestamp but with distinct ids
        let mut a = SnapshotBuilder::new("m1", "daily").build_at(vec![], at);
        a.snapshot_id = "20260830T100000.000Z-a".to_string();
        let mut b = SnapshotBuilder::new("m1", "daily").build_at(vec![], at);
        b.snapshot_id = "20260830T100000.000Z-b".to_string();

        registry.put_snapshot(&a).unwrap();
        registry.put_snapshot(&b).unwrap();

        let latest = registry.latest("m1", "daily").unwrap();
        assert_eq!(latest.snapshot_id, "20260830T100000.000Z-b");
    }

    #[test]
    fn latest_on_empty_set_is_not_found() {
        let registry = registry_with_set("daily");
        let err = registry.latest("m1", "daily").unwrap_err();
        assert!(matches!(err, DriftError::NotFound { .. }));
    }

    #[test]
    fn get_missing_snapshot_is_not_found() {
        let registry = registry_with_set("daily");
        let err = registry.get("m1", "daily", "nope").unwrap_err();
        assert!(matches!(
            err,
            DriftError::NotFound {
                snapshot_id: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn query_range_bounds_are_inclusive() {
        let registry = registry_with_set("daily");
        let timestamps = [
            "2026-08-28T10:00:00Z",
            "2026-08-29T10:00:00Z",
            "2026-08-30T10:00:00Z",
        ];
        let mut millis = Vec::new();
        for ts in timestamps {
            let snapshot = snapshot_at("daily", ts, vec![]);
            millis.push(snapshot.timestamp);
            registry.put_snapshot(&snapshot).unwrap();
        }

        // exact bounds at the first two snapshots
        let hits = registry
            .query_range("m1", "daily", millis[0], millis[1])
            .unwrap();
        assert_eq!(hits.len(), 2);

        // a window covering everything
        let all = registry
            .query_range("m1", "daily", 0, i64::MAX)
            .unwrap();
        assert_eq!(all.len(), 3);

        // a window covering nothing
        let none = registry
            .query_range("m1", "daily", millis[2] + 1, i64::MAX)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn list_backupsets_scoped_to_machine() {
        let registry = Registry::open_in_memory().unwrap();
        registry.register_backupset("m1", "daily").unwrap();
        registry.register_backupset("m1", "archive").unwrap();
        registry.register_backupset("m2", "daily").unwrap();

        let sets = registry.list_backupsets("m1").unwrap();
        let names: Vec<&str> = sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "daily"]);
    }

    #[test]
    fn concurrent_puts_have_exactly_one_winner() {
        let tmp = tempfile::TempDir::new().unwrap();
        let registry = Arc::new(Registry::open_at(&tmp.path().join("registry.db")).unwrap());
        registry.register_backupset("m1", "daily").unwrap();

        let snapshot = snapshot_at("daily", "2026-08-30T10:00:00Z", vec![record("a", 1)]);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let snapshot = snapshot.clone();
            handles.push(std::thread::spawn(move || {
                registry.put_snapshot(&snapshot).is_ok()
            }));
        }

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
