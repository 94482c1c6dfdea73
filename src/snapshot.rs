//! Snapshot data model and builder.
//!
//! A snapshot is an immutable record of one scan: identity (machine,
//! backup-set, id, timestamp), the ordered file list, and a summary that is
//! always recomputed from the file list. The summary is derived data; it is
//! never accepted from external input, so a forged or stale summary cannot
//! survive a round trip through the registry.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// One file as observed at scan time.
///
/// A record either carries a full fingerprint (size, mtime, checksum) or an
/// error explaining why it doesn't. It is never silently partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Modification time as fractional unix seconds, matching the artifact
    /// format of older agents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<f64>,

    /// Platform file identity. Auxiliary metadata only: inode numbers are not
    /// portable across filesystems or remounts, so drift classification never
    /// keys on them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inode: Option<u64>,

    /// Lowercase hex sha-256 of the file contents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileRecord {
    pub fn complete(
        path: String,
        size: u64,
        mtime: f64,
        inode: Option<u64>,
        checksum: String,
    ) -> Self {
        FileRecord {
            path,
            size: Some(size),
            mtime: Some(mtime),
            inode,
            checksum: Some(checksum),
            error: None,
        }
    }

    /// A record for a path that could not be fingerprinted. All metadata
    /// fields are absent; only the reason survives.
    pub fn failed(path: String, error: String) -> Self {
        FileRecord {
            path,
            size: None,
            mtime: None,
            inode: None,
            checksum: None,
            error: Some(error),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Derived totals for a snapshot. Always computed from the file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub file_count: usize,
    pub total_size: u64,
    pub error_count: usize,
}

impl SnapshotSummary {
    pub fn compute(files: &[FileRecord]) -> Self {
        let total_size = files
            .iter()
            .filter(|f| !f.has_error())
            .filter_map(|f| f.size)
            .fold(0u64, u64::saturating_add);

        SnapshotSummary {
            file_count: files.len(),
            total_size,
            error_count: files.iter().filter(|f| f.has_error()).count(),
        }
    }
}

/// Immutable point-in-time record of a directory's file fingerprints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub machine_id: String,
    pub backupset_name: String,
    /// Unique within a backup-set. Timestamp-derived and lexically sortable,
    /// so "latest" is a plain max and ties break deterministically.
    pub snapshot_id: String,
    /// Creation instant, unix milliseconds.
    pub timestamp: i64,
    pub summary: SnapshotSummary,
    /// Scan order is preserved for reproducible output; it carries no other
    /// meaning.
    pub files: Vec<FileRecord>,
}

impl Snapshot {
    /// Recompute the summary from the file list, discarding whatever the
    /// current summary claims.
    pub fn with_recomputed_summary(mut self) -> Self {
        self.summary = SnapshotSummary::compute(&self.files);
        self
    }
}

/// Logical grouping of snapshots for one machine. Registered once; identity
/// is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSet {
    pub machine_id: String,
    pub name: String,
    /// Registration instant, unix milliseconds.
    pub created_at: i64,
}

/// Generate a sortable snapshot id from a creation instant.
pub fn snapshot_id_at(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Wraps scan results with identity and a freshly computed summary.
pub struct SnapshotBuilder {
    machine_id: String,
    backupset_name: String,
}

impl SnapshotBuilder {
    pub fn new(machine_id: impl Into<String>, backupset_name: impl Into<String>) -> Self {
        SnapshotBuilder {
            machine_id: machine_id.into(),
            backupset_name: backupset_name.into(),
        }
    }

    /// Build a snapshot stamped with the current instant.
    pub fn build(&self, files: Vec<FileRecord>) -> Snapshot {
        self.build_at(files, Utc::now())
    }

    /// Deterministic variant: everything except the file contents comes from
    /// the arguments.
    pub fn build_at(&self, files: Vec<FileRecord>, at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            machine_id: self.machine_id.clone(),
            backupset_name: self.backupset_name.clone(),
            snapshot_id: snapshot_id_at(at),
            timestamp: at.timestamp_millis(),
            summary: SnapshotSummary::compute(&files),
            files,
        }
    }
}

/// The agent-side local artifact: a human-readable, diffable JSON document
/// with the scanned directory and the file list.
#[derive(Serialize)]
struct Artifact<'a> {
    timestamp: String,
    directory: String,
    files: &'a [FileRecord],
}

/// Write the snapshot artifact to `output` and keep a tracked copy under
/// `tracked_dir` when one is given (mirrors the agent convention of a
/// snapshots/ directory next to its state).
pub fn write_artifact(
    snapshot: &Snapshot,
    directory: &Path,
    output: &Path,
    tracked_dir: Option<&Path>,
) -> Result<()> {
    let doc = Artifact {
        timestamp: DateTime::<Utc>::from_timestamp_millis(snapshot.timestamp)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        directory: directory.display().to_string(),
        files: &snapshot.files,
    };

    let body = serde_json::to_string_pretty(&doc)?;
    fs::write(output, &body).map_err(|e| DriftError::io(output, e))?;

    if let Some(dir) = tracked_dir {
        fs::create_dir_all(dir).map_err(|e| DriftError::io(dir, e))?;
        let file_name = output
            .file_name()
            .unwrap_or_else(|| "snapshot.json".as_ref());
        let tracked = dir.join(file_name);
        if tracked != output {
            fs::copy(output, &tracked).map_err(|e| DriftError::io(&tracked, e))?;
        }
    }

    Ok(())
}

/// Default location for tracked artifact copies
/// (~/.local/share/driftscan/snapshots or platform equivalent).
pub fn tracked_snapshot_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "driftscan")
        .map(|dirs| dirs.data_dir().join("snapshots"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_record(path: &str, size: u64) -> FileRecord {
        FileRecord::complete(path.to_string(), size, 1000.0, Some(42), "ab".repeat(32))
    }

    #[test]
    fn summary_counts_match_file_list() {
        let files = vec![
            ok_record("a.txt", 10),
            ok_record("b.txt", 20),
            FileRecord::failed("c.txt".to_string(), "permission denied".to_string()),
        ];

        let summary = SnapshotSummary::compute(&files);
        assert_eq!(summary.file_count, 3);
        assert_eq!(summary.total_size, 30);
        assert_eq!(summary.error_count, 1);
    }

    #[test]
    fn summary_of_empty_scan_is_zero() {
        let summary = SnapshotSummary::compute(&[]);
        assert_eq!(summary.file_count, 0);
        assert_eq!(summary.total_size, 0);
        assert_eq!(summary.error_count, 0);
    }

    #[test]
    fn error_records_do_not_contribute_size() {
        // an error record never has a size, but make sure a pathological
        // hand-built one is still excluded
        let mut bad = FileRecord::failed("x".to_string(), "boom".to_string());
        bad.size = Some(999);

        let summary = SnapshotSummary::compute(&[ok_record("a", 5), bad]);
        assert_eq!(summary.total_size, 5);
        assert_eq!(summary.error_count, 1);
    }

    #[test]
    fn builder_stamps_identity_and_summary() {
        let at = DateTime::parse_from_rfc3339("2026-08-30T12:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);

        let snapshot = SnapshotBuilder::new("m1", "daily").build_at(vec![ok_record("a", 7)], at);

        assert_eq!(snapshot.machine_id, "m1");
        assert_eq!(snapshot.backupset_name, "daily");
        assert_eq!(snapshot.snapshot_id, "20260830T120000.123Z");
        assert_eq!(snapshot.timestamp, at.timestamp_millis());
        assert_eq!(snapshot.summary.file_count, 1);
        assert_eq!(snapshot.summary.total_size, 7);
    }

    #[test]
    fn snapshot_ids_sort_by_time() {
        let earlier = DateTime::parse_from_rfc3339("2026-08-30T12:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2026-08-30T12:00:01.000Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(snapshot_id_at(earlier) < snapshot_id_at(later));
    }

    #[test]
    fn recomputed_summary_overrides_forged_input() {
        let builder = SnapshotBuilder::new("m1", "daily");
        let mut snapshot = builder.build(vec![ok_record("a", 10)]);
        snapshot.summary.total_size = 9999;
        snapshot.summary.file_count = 50;

        let fixed = snapshot.with_recomputed_summary();
        assert_eq!(fixed.summary.total_size, 10);
        assert_eq!(fixed.summary.file_count, 1);
    }

    #[test]
    fn record_serialization_skips_absent_fields() {
        let record = FileRecord::failed("gone.txt".to_string(), "vanished".to_string());
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("checksum"));
        assert!(!json.contains("size"));
        assert!(json.contains("vanished"));

        let back: FileRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn artifact_written_and_tracked_copy_kept() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("snapshot.json");
        let tracked = tmp.path().join("tracked");

        let snapshot = SnapshotBuilder::new("m1", "daily").build(vec![ok_record("a.txt", 3)]);
        write_artifact(&snapshot, Path::new("/data"), &output, Some(&tracked)).unwrap();

        let body = fs::read_to_string(&output).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["directory"], "/data");
        assert_eq!(doc["files"][0]["path"], "a.txt");

        assert!(tracked.join("snapshot.json").exists());
    }
}
