//! Snapshot comparison engine.
//!
//! Compares two snapshots of the same backup-set and classifies every path:
//! - added / removed: present on only one side
//! - modified: checksum differs and the metadata moved with it
//! - corrupted: checksum differs while size AND mtime are unchanged; content
//!   changed without a metadata signal, the classic bit-rot indicator
//! - error transitions: a fingerprint appeared or disappeared because the
//!   file became (un)readable; no content comparison is possible there
//!
//! The caller designates which snapshot is older; the engine never infers
//! ordering from content. Unchanged paths are counted, not collected, so the
//! common no-drift case stays cheap to serialize.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{DriftError, Result};
use crate::snapshot::{FileRecord, Snapshot};

/// A path whose content changed, with both observations.
#[derive(Debug, Clone, Serialize)]
pub struct ChangedPair {
    pub old: FileRecord,
    pub new: FileRecord,
}

/// Transient comparison result; owned by the caller, never persisted.
#[derive(Debug, Serialize)]
pub struct DiffResult {
    pub from_id: String,
    pub to_id: String,
    pub from_timestamp: i64,
    pub to_timestamp: i64,
    pub added: Vec<FileRecord>,
    pub removed: Vec<FileRecord>,
    pub modified: Vec<ChangedPair>,
    pub corrupted: Vec<ChangedPair>,
    pub unchanged: usize,
    pub errors_introduced: Vec<String>,
    pub errors_resolved: Vec<String>,
}

impl DiffResult {
    /// True when no drift of any kind was detected.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.corrupted.is_empty()
            && self.errors_introduced.is_empty()
            && self.errors_resolved.is_empty()
    }
}

/// Compare two snapshots, `older` against `newer`.
///
/// Fails with `InvalidDiffInput` when the snapshots belong to different
/// backup-sets; everything else is classification, never an error.
pub fn compare(older: &Snapshot, newer: &Snapshot) -> Result<DiffResult> {
    if older.machine_id != newer.machine_id || older.backupset_name != newer.backupset_name {
        return Err(DriftError::InvalidDiffInput {
            machine_a: older.machine_id.clone(),
            set_a: older.backupset_name.clone(),
            machine_b: newer.machine_id.clone(),
            set_b: newer.backupset_name.clone(),
        });
    }

    let old_map: HashMap<&str, &FileRecord> =
        older.files.iter().map(|f| (f.path.as_str(), f)).collect();
    let new_map: HashMap<&str, &FileRecord> =
        newer.files.iter().map(|f| (f.path.as_str(), f)).collect();

    let mut result = DiffResult {
        from_id: older.snapshot_id.clone(),
        to_id: newer.snapshot_id.clone(),
        from_timestamp: older.timestamp,
        to_timestamp: newer.timestamp,
        added: Vec::new(),
        removed: Vec::new(),
        modified: Vec::new(),
        corrupted: Vec::new(),
        unchanged: 0,
        errors_introduced: Vec::new(),
        errors_resolved: Vec::new(),
    };

    for (path, new_record) in &new_map {
        match old_map.get(path) {
            None => result.added.push((*new_record).clone()),
            Some(old_record) => classify_pair(old_record, new_record, &mut result),
        }
    }

    for (path, old_record) in &old_map {
        if !new_map.contains_key(path) {
            result.removed.push((*old_record).clone());
        }
    }

    // hash map iteration order is arbitrary; sort every list by path so the
    // report is reproducible
    result.added.sort_by(|a, b| a.path.cmp(&b.path));
    result.removed.sort_by(|a, b| a.path.cmp(&b.path));
    result.modified.sort_by(|a, b| a.new.path.cmp(&b.new.path));
    result.corrupted.sort_by(|a, b| a.new.path.cmp(&b.new.path));
    result.errors_introduced.sort();
    result.errors_resolved.sort();

    Ok(result)
}

/// Classify one path present in both snapshots.
fn classify_pair(old: &FileRecord, new: &FileRecord, result: &mut DiffResult) {
    match (old.has_error(), new.has_error()) {
        // an error on either side means there is no checksum to compare;
        // report the transition instead of guessing modified vs corrupted
        (false, true) => result.errors_introduced.push(new.path.clone()),
        (true, false) => result.errors_resolved.push(new.path.clone()),
        // errored on both sides and no transition: unchanged with respect to
        // error state, not reported as drift
        (true, true) => result.unchanged += 1,
        (false, false) => {
            if old.checksum == new.checksum {
                result.unchanged += 1;
            } else if old.size == new.size && old.mtime == new.mtime {
                result.corrupted.push(ChangedPair {
                    old: old.clone(),
                    new: new.clone(),
                });
            } else {
                result.modified.push(ChangedPair {
                    old: old.clone(),
                    new: new.clone(),
                });
            }
        }
    }
}
