//! Per-file fingerprinting: metadata plus a streaming sha-256 digest.
//!
//! Failures never escape this module. Permission errors, files vanishing
//! between discovery and read, and oversized files all come back as a
//! `FileRecord` with `error` set, so one bad file cannot abort a scan.
//!
//! Known limitation: the stat and the content read are not atomic. A file
//! mutated mid-read can yield a checksum computed over bytes inconsistent
//! with the recorded size/mtime.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use crate::snapshot::FileRecord;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Fingerprint one regular file. `max_file_size` is the per-file ceiling;
/// files above it are recorded as errors rather than hashed, so a single
/// huge file cannot stall the whole scan.
pub fn fingerprint(path: &Path, max_file_size: Option<u64>) -> FileRecord {
    let record_path = path.display().to_string();

    let metadata = match path.metadata() {
        Ok(m) => m,
        Err(e) => return FileRecord::failed(record_path, format!("stat failed: {e}")),
    };

    let size = metadata.len();
    if let Some(ceiling) = max_file_size {
        if size > ceiling {
            return FileRecord::failed(
                record_path,
                format!("file size {size} exceeds the {ceiling} byte ceiling, not hashed"),
            );
        }
    }

    let mtime = match metadata.modified() {
        Ok(t) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs_f64(),
            // pre-epoch mtimes exist on some filesystems; negate the distance
            Err(e) => -e.duration().as_secs_f64(),
        },
        Err(e) => return FileRecord::failed(record_path, format!("mtime unavailable: {e}")),
    };

    let checksum = match hash_contents(path) {
        Ok(hex) => hex,
        Err(e) => return FileRecord::failed(record_path, format!("read failed: {e}")),
    };

    FileRecord::complete(record_path, size, mtime, inode_of(&metadata), checksum)
}

/// Single sequential read of the full file contents. The digest is the
/// dominant scan cost, so the file is opened exactly once.
fn hash_contents(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_BUF_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex_string(&hasher.finalize()))
}

fn inode_of(metadata: &std::fs::Metadata) -> Option<u64> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Some(metadata.ino())
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        None
    }
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
