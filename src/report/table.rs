//! Terminal table rendering for snapshots, listings, and diffs.

use crate::snapshot::{BackupSet, Snapshot};
use crate::store::diff::DiffResult;

use super::{format_bytes, format_timestamp};

/// Summary block printed after a scan or `show`.
pub fn render_snapshot(snapshot: &Snapshot, verbose: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "snapshot {} ({})\n",
        snapshot.snapshot_id,
        format_timestamp(snapshot.timestamp)
    ));
    output.push_str(&format!(
        "  machine:    {}\n  backup-set: {}\n",
        snapshot.machine_id, snapshot.backupset_name
    ));
    output.push_str(&format!(
        "  files: {}   total: {}   errors: {}\n",
        snapshot.summary.file_count,
        format_bytes(snapshot.summary.total_size),
        snapshot.summary.error_count
    ));

    if verbose && snapshot.summary.error_count > 0 {
        output.push_str("\nper-file errors:\n");
        for file in snapshot.files.iter().filter(|f| f.has_error()) {
            output.push_str(&format!(
                "  {}: {}\n",
                file.path,
                file.error.as_deref().unwrap_or("unknown")
            ));
        }
    }

    output
}

pub fn render_backupsets(sets: &[BackupSet]) -> String {
    if sets.is_empty() {
        return String::from("No backup-sets registered for this machine.\n");
    }

    let mut output = String::new();
    output.push_str(&format!("{:<24} {:<20}\n", "Name", "Created"));
    output.push_str(&format!("{}\n", "-".repeat(44)));
    for set in sets {
        output.push_str(&format!(
            "{:<24} {:<20}\n",
            set.name,
            format_timestamp(set.created_at)
        ));
    }
    output
}

pub fn render_snapshot_list(snapshots: &[Snapshot]) -> String {
    if snapshots.is_empty() {
        return String::from("No snapshots found. Run 'driftscan scan' to create one.\n");
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<24} {:<20} {:>8} {:>12} {:>7}\n",
        "ID", "Date", "Files", "Total", "Errors"
    ));
    output.push_str(&format!("{}\n", "-".repeat(76)));

    for snapshot in snapshots {
        output.push_str(&format!(
            "{:<24} {:<20} {:>8} {:>12} {:>7}\n",
            snapshot.snapshot_id,
            format_timestamp(snapshot.timestamp),
            snapshot.summary.file_count,
            format_bytes(snapshot.summary.total_size),
            snapshot.summary.error_count
        ));
    }

    output
}

pub fn render_diff(result: &DiffResult) -> String {
    let mut output = String::new();

    output.push_str("\nComparing snapshots:\n");
    output.push_str(&format!(
        "  From: {} ({})\n",
        result.from_id,
        format_timestamp(result.from_timestamp)
    ));
    output.push_str(&format!(
        "  To:   {} ({})\n\n",
        result.to_id,
        format_timestamp(result.to_timestamp)
    ));

    if result.is_empty() {
        output.push_str(&format!(
            "No drift detected ({} unchanged files).\n",
            result.unchanged
        ));
        return output;
    }

    // corruption first: it is the signal this tool exists for
    if !result.corrupted.is_empty() {
        output.push_str("CORRUPTED (checksum changed, size and mtime did not):\n");
        for pair in &result.corrupted {
            output.push_str(&format!(
                "  [!!] {} checksum {} -> {}\n",
                pair.new.path,
                short_checksum(pair.old.checksum.as_deref()),
                short_checksum(pair.new.checksum.as_deref()),
            ));
        }
        output.push('\n');
    }

    if !result.modified.is_empty() {
        output.push_str("Modified:\n");
        for pair in &result.modified {
            output.push_str(&format!(
                "  [mod] {} ({} -> {})\n",
                pair.new.path,
                format_bytes(pair.old.size.unwrap_or(0)),
                format_bytes(pair.new.size.unwrap_or(0)),
            ));
        }
        output.push('\n');
    }

    if !result.added.is_empty() {
        output.push_str("Added:\n");
        for file in &result.added {
            output.push_str(&format!(
                "  [+] {} ({})\n",
                file.path,
                format_bytes(file.size.unwrap_or(0))
            ));
        }
        output.push('\n');
    }

    if !result.removed.is_empty() {
        output.push_str("Removed:\n");
        for file in &result.removed {
            output.push_str(&format!(
                "  [-] {} (was {})\n",
                file.path,
                format_bytes(file.size.unwrap_or(0))
            ));
        }
        output.push('\n');
    }

    if !result.errors_introduced.is_empty() {
        output.push_str("Errors introduced:\n");
        for path in &result.errors_introduced {
            output.push_str(&format!("  [err] {path}\n"));
        }
        output.push('\n');
    }

    if !result.errors_resolved.is_empty() {
        output.push_str("Errors resolved:\n");
        for path in &result.errors_resolved {
            output.push_str(&format!("  [ok] {path}\n"));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "unchanged: {}  added: {}  removed: {}  modified: {}  corrupted: {}\n",
        result.unchanged,
        result.added.len(),
        result.removed.len(),
        result.modified.len(),
        result.corrupted.len()
    ));

    output
}

fn short_checksum(checksum: Option<&str>) -> String {
    match checksum {
        Some(c) if c.len() > 12 => format!("{}...", &c[..12]),
        Some(c) => c.to_string(),
        None => "?".to_string(),
    }
}
