//! driftscan: directory fingerprinting and drift detection.
//!
//! The pipeline is scan → build → store → diff. The scanner walks a tree
//! and fingerprints every regular file, the builder wraps the result in an
//! immutable snapshot, the registry stores snapshots per backup-set, and
//! the diff engine classifies the changes between any two snapshots of the
//! same backup-set, including the checksum-changed-but-metadata-didn't
//! signature of silent corruption.

pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod report;
pub mod scan;
pub mod snapshot;
pub mod store;
