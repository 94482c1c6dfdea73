//! Error taxonomy for registry, diff, and scan failures.
//!
//! Per-file failures never show up here: the scanner converts them into
//! `FileRecord`s with the `error` field set so a bad file cannot abort a
//! scan. Everything in this enum is a caller-visible failure.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriftError>;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("backup-set '{name}' already exists for machine '{machine_id}'")]
    AlreadyExists { machine_id: String, name: String },

    #[error("backup-set '{name}' not found for machine '{machine_id}'")]
    UnknownBackupSet { machine_id: String, name: String },

    #[error("snapshot '{snapshot_id}' already exists in backup-set '{name}' for machine '{machine_id}'")]
    DuplicateSnapshot {
        machine_id: String,
        name: String,
        snapshot_id: String,
    },

    #[error("snapshot not found: machine '{machine_id}', backup-set '{name}'{}", match snapshot_id { Some(id) => format!(", id '{id}'"), None => String::new() })]
    NotFound {
        machine_id: String,
        name: String,
        snapshot_id: Option<String>,
    },

    #[error("cannot diff snapshots from different backup-sets: ({machine_a}, {set_a}) vs ({machine_b}, {set_b})")]
    InvalidDiffInput {
        machine_a: String,
        set_a: String,
        machine_b: String,
        set_b: String,
    },

    #[error("scan of {root} aborted before completion")]
    ScanAborted { root: PathBuf },

    #[error("scan root {root} is not a directory")]
    InvalidScanRoot { root: PathBuf },

    #[error("invalid configuration: {details}")]
    Config { details: String },

    #[error("io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database failure: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DriftError {
    /// Convenience constructor for io errors with a known path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DriftError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<toml::de::Error> for DriftError {
    fn from(value: toml::de::Error) -> Self {
        DriftError::Config {
            details: value.to_string(),
        }
    }
}
