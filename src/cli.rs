use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "driftscan")]
#[command(about = "Directory fingerprinting and drift detection between snapshots")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan a directory, build a snapshot, and store it
    Scan(ScanArgs),

    /// Register a backup-set before storing snapshots under it
    Register(SetArgs),

    /// List backup-sets for a machine
    Sets(MachineArgs),

    /// List snapshots in a backup-set, newest first
    Snapshots(SetArgs),

    /// Show the most recent snapshot of a backup-set
    Latest(SetArgs),

    /// Show a specific snapshot by id
    Show(ShowArgs),

    /// List snapshots whose timestamp falls in a time range
    Query(QueryArgs),

    /// Compare two snapshots and classify the drift
    Diff(DiffArgs),
}

#[derive(Parser)]
pub struct ScanArgs {
    /// Directory to scan
    pub directory: PathBuf,

    /// Machine identifier the snapshot belongs to
    #[arg(long, default_value = "local")]
    pub machine: String,

    /// Backup-set name the snapshot belongs to
    #[arg(long)]
    pub set: String,

    /// Follow symbolic links during traversal
    #[arg(long, default_value_t = false)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories
    #[arg(long, default_value_t = false)]
    pub no_hidden: bool,

    /// Descend into directories on other filesystems
    #[arg(long, default_value_t = false)]
    pub cross_devices: bool,

    /// Per-file size ceiling in bytes; larger files are recorded as errors
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Hashing worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    /// Also write the snapshot artifact to this JSON file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Build the snapshot but do not store it in the registry
    #[arg(long, default_value_t = false)]
    pub no_store: bool,

    /// Output as JSON instead of a summary table
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Show detailed output including per-file errors
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

#[derive(Parser)]
pub struct MachineArgs {
    /// Machine identifier
    pub machine: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct SetArgs {
    /// Machine identifier
    pub machine: String,

    /// Backup-set name
    pub set: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Machine identifier
    pub machine: String,

    /// Backup-set name
    pub set: String,

    /// Snapshot id
    pub id: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct QueryArgs {
    /// Machine identifier
    pub machine: String,

    /// Backup-set name
    pub set: String,

    /// Range start, inclusive (RFC 3339, e.g. 2026-08-30T00:00:00Z)
    #[arg(long)]
    pub from: String,

    /// Range end, inclusive (RFC 3339)
    #[arg(long)]
    pub to: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Machine identifier
    pub machine: String,

    /// Backup-set name
    pub set: String,

    /// Older snapshot id (defaults to the second most recent)
    #[arg(long)]
    pub from: Option<String>,

    /// Newer snapshot id (defaults to the most recent)
    #[arg(long)]
    pub to: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
