//! Scan configuration: CLI flags layered over an optional config file.
//!
//! Traversal policy defaults are deliberate and documented here because
//! older agents left them implicit: symlinks are not followed, hidden files
//! are included, and the scan does not cross filesystem mount boundaries.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::cli::ScanArgs;
use crate::error::Result;

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    /// Follow symbolic links during traversal. Default: off, so a link loop
    /// or a link out of the tree cannot distort the snapshot.
    pub follow_symlinks: bool,
    /// Include dotfiles. Default: on; a backup validator that skips hidden
    /// files would miss real drift.
    pub include_hidden: bool,
    /// Descend into directories on other filesystems. Default: off.
    pub cross_devices: bool,
    /// Per-file byte ceiling; larger files are recorded as errors, not hashed.
    pub max_file_size: Option<u64>,
    /// Hashing worker threads.
    pub workers: usize,
    pub json_output: bool,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            follow_symlinks: false,
            include_hidden: true,
            cross_devices: false,
            max_file_size: None,
            workers: DEFAULT_WORKERS,
            json_output: false,
            verbose: false,
        }
    }
}

/// Optional on-disk config (~/.config/driftscan/config.toml). Every field
/// is optional; anything absent falls back to the built-in default, and CLI
/// flags win over the file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub follow_symlinks: Option<bool>,
    pub include_hidden: Option<bool>,
    pub cross_devices: Option<bool>,
    pub max_file_size: Option<u64>,
    pub workers: Option<usize>,
}

pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "driftscan")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn load_file_config() -> Result<FileConfig> {
    let Some(path) = config_file_path() else {
        return Ok(FileConfig::default());
    };

    match fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        // no config file is the common case, not an error
        Err(_) => Ok(FileConfig::default()),
    }
}

impl Config {
    pub fn from_scan_args(args: &ScanArgs) -> Result<Self> {
        let file = load_file_config()?;
        Ok(Self::merge(args, &file))
    }

    fn merge(args: &ScanArgs, file: &FileConfig) -> Self {
        let defaults = Config::default();

        Config {
            follow_symlinks: args.follow_symlinks
                || file.follow_symlinks.unwrap_or(defaults.follow_symlinks),
            include_hidden: if args.no_hidden {
                false
            } else {
                file.include_hidden.unwrap_or(defaults.include_hidden)
            },
            cross_devices: args.cross_devices
                || file.cross_devices.unwrap_or(defaults.cross_devices),
            max_file_size: args.max_file_size.or(file.max_file_size),
            workers: args
                .workers
                .or(file.workers)
                .unwrap_or(defaults.workers)
                .max(1),
            json_output: args.json,
            verbose: args.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_args() -> ScanArgs {
        ScanArgs {
            directory: PathBuf::from("/tmp"),
            machine: "m1".to_string(),
            set: "daily".to_string(),
            follow_symlinks: false,
            no_hidden: false,
            cross_devices: false,
            max_file_size: None,
            workers: None,
            output: None,
            no_store: false,
            json: false,
            verbose: false,
        }
    }

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert!(!config.follow_symlinks);
        assert!(config.include_hidden);
        assert!(!config.cross_devices);
        assert_eq!(config.max_file_size, None);
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn cli_flags_override_file_values() {
        let mut args = scan_args();
        args.no_hidden = true;
        args.workers = Some(8);

        let file = FileConfig {
            include_hidden: Some(true),
            workers: Some(2),
            ..FileConfig::default()
        };

        let config = Config::merge(&args, &file);
        assert!(!config.include_hidden);
        assert_eq!(config.workers, 8);
    }

    #[test]
    fn file_values_fill_in_when_flags_absent() {
        let args = scan_args();
        let file = FileConfig {
            follow_symlinks: Some(true),
            max_file_size: Some(1024),
            ..FileConfig::default()
        };

        let config = Config::merge(&args, &file);
        assert!(config.follow_symlinks);
        assert_eq!(config.max_file_size, Some(1024));
    }

    #[test]
    fn workers_never_zero() {
        let mut args = scan_args();
        args.workers = Some(0);
        let config = Config::merge(&args, &FileConfig::default());
        assert_eq!(config.workers, 1);
    }
}
