//! Recursive tree scanning with a bounded hashing worker pool.
//!
//! Discovery and hashing are split: the calling thread walks the tree and
//! feeds file paths into a bounded channel, worker threads fingerprint them
//! concurrently, and the aggregation step sorts the collected records by
//! path so the output is stable and total for a given tree regardless of
//! which worker finished first.
//!
//! A single unreadable file or directory never aborts the scan. Unlistable
//! directories are recorded as synthetic error entries for the directory
//! path, so no data is dropped silently.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel as channel;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{DriftError, Result};
use crate::fingerprint;
use crate::snapshot::FileRecord;

/// Pending file paths buffered between discovery and the hashing workers.
const WORK_QUEUE_DEPTH: usize = 1024;

/// Caller-held handle for aborting a scan in progress. An aborted scan
/// returns an error and publishes nothing, so a half-finished file list can
/// never reach the registry.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct ScanResult {
    /// All discovered records, sorted by path.
    pub files: Vec<FileRecord>,
    pub duration_ms: u128,
}

/// Scan a directory tree without a cancellation handle.
pub fn run(root: &Path, config: &Config) -> Result<ScanResult> {
    run_with_cancel(root, config, &CancelToken::new())
}

/// Scan a directory tree, fingerprinting every regular file reachable under
/// the configured traversal policy.
pub fn run_with_cancel(root: &Path, config: &Config, cancel: &CancelToken) -> Result<ScanResult> {
    let start = Instant::now();

    let root_meta = fs::metadata(root).map_err(|e| DriftError::io(root, e))?;
    if !root_meta.is_dir() {
        return Err(DriftError::InvalidScanRoot {
            root: root.to_path_buf(),
        });
    }
    let root_dev = device_id(&root_meta);

    let (work_tx, work_rx) = channel::bounded::<std::path::PathBuf>(WORK_QUEUE_DEPTH);
    let (result_tx, result_rx) = channel::unbounded::<FileRecord>();

    let aborted = thread::scope(|s| {
        for _ in 0..config.workers.max(1) {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            let max_file_size = config.max_file_size;

            s.spawn(move || {
                while let Ok(path) = work_rx.recv() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let _ = result_tx.send(fingerprint::fingerprint(&path, max_file_size));
                }
            });
        }
        drop(work_rx);

        let include_hidden = config.include_hidden;
        let cross_devices = config.cross_devices;

        let walker = WalkDir::new(root)
            .follow_links(config.follow_symlinks)
            .into_iter()
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if !include_hidden && is_hidden(entry.file_name()) {
                    return false;
                }
                // mount boundary check only matters for directories we would
                // descend into; a stat failure here surfaces as a walk error
                // on the next iteration instead
                if !cross_devices && entry.file_type().is_dir() {
                    if let Ok(meta) = entry.metadata() {
                        if device_id(&meta) != root_dev {
                            return false;
                        }
                    }
                }
                true
            });

        let mut aborted = false;
        for item in walker {
            if cancel.is_cancelled() {
                aborted = true;
                break;
            }

            match item {
                Ok(entry) => {
                    if entry.file_type().is_file() && work_tx.send(entry.into_path()).is_err() {
                        break;
                    }
                }
                // a directory that cannot be listed (or a file that cannot
                // be stat'd) becomes an error entry for the affected path
                Err(e) => {
                    let path = e
                        .path()
                        .unwrap_or(root)
                        .display()
                        .to_string();
                    let _ = result_tx.send(FileRecord::failed(path, format!("walk failed: {e}")));
                }
            }
        }

        drop(work_tx);
        aborted
    });
    drop(result_tx);

    if aborted || cancel.is_cancelled() {
        return Err(DriftError::ScanAborted {
            root: root.to_path_buf(),
        });
    }

    let mut files: Vec<FileRecord> = result_rx.iter().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(ScanResult {
        files,
        duration_ms: start.elapsed().as_millis(),
    })
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn device_id(meta: &fs::Metadata) -> u64 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        meta.dev()
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        0
    }
}
