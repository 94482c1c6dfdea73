use clap::Parser;
use driftscan::cli::{Cli, Command, DiffArgs, QueryArgs, ScanArgs};
use driftscan::config::Config;
use driftscan::error::{DriftError, Result};
use driftscan::report;
use driftscan::scan;
use driftscan::snapshot::{self, SnapshotBuilder};
use driftscan::store::{diff, Registry};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Scan(args) => cmd_scan(args),

        Command::Register(args) => {
            let registry = Registry::open()?;
            let set = registry.register_backupset(&args.machine, &args.set)?;
            println!(
                "Registered backup-set '{}' for machine '{}'.",
                set.name, set.machine_id
            );
            Ok(())
        }

        Command::Sets(args) => {
            let registry = Registry::open()?;
            let sets = registry.list_backupsets(&args.machine)?;
            if args.json {
                println!("{}", report::json::render(&sets)?);
            } else {
                print!("{}", report::table::render_backupsets(&sets));
            }
            Ok(())
        }

        Command::Snapshots(args) => {
            let registry = Registry::open()?;
            let snapshots = registry.list_snapshots(&args.machine, &args.set)?;
            if args.json {
                println!("{}", report::json::render(&snapshots)?);
            } else {
                print!("{}", report::table::render_snapshot_list(&snapshots));
            }
            Ok(())
        }

        Command::Latest(args) => {
            let registry = Registry::open()?;
            let latest = registry.latest(&args.machine, &args.set)?;
            if args.json {
                println!("{}", report::json::render(&latest)?);
            } else {
                print!("{}", report::table::render_snapshot(&latest, false));
            }
            Ok(())
        }

        Command::Show(args) => {
            let registry = Registry::open()?;
            let found = registry.get(&args.machine, &args.set, &args.id)?;
            if args.json {
                println!("{}", report::json::render(&found)?);
            } else {
                print!("{}", report::table::render_snapshot(&found, true));
            }
            Ok(())
        }

        Command::Query(args) => cmd_query(args),

        Command::Diff(args) => cmd_diff(args),
    }
}

fn cmd_scan(args: ScanArgs) -> Result<()> {
    let config = Config::from_scan_args(&args)?;
    let result = scan::run(&args.directory, &config)?;
    let duration_ms = result.duration_ms;

    let snapshot = SnapshotBuilder::new(&args.machine, &args.set).build(result.files);

    if let Some(output) = &args.output {
        let tracked = snapshot::tracked_snapshot_dir();
        snapshot::write_artifact(&snapshot, &args.directory, output, tracked.as_deref())?;
        if config.verbose {
            eprintln!("artifact written to {}", output.display());
        }
    }

    if !args.no_store {
        let registry = Registry::open()?;
        registry.put_snapshot(&snapshot)?;
    }

    if config.json_output {
        println!("{}", report::json::render(&snapshot)?);
    } else {
        print!("{}", report::table::render_snapshot(&snapshot, config.verbose));
        println!("\nscan completed in {:.2}s", duration_ms as f64 / 1000.0);
    }

    Ok(())
}

fn cmd_query(args: QueryArgs) -> Result<()> {
    let from = parse_instant(&args.from)?;
    let to = parse_instant(&args.to)?;

    let registry = Registry::open()?;
    let snapshots = registry.query_range(&args.machine, &args.set, from, to)?;

    if args.json {
        println!("{}", report::json::render(&snapshots)?);
    } else {
        print!("{}", report::table::render_snapshot_list(&snapshots));
    }
    Ok(())
}

fn cmd_diff(args: DiffArgs) -> Result<()> {
    let registry = Registry::open()?;

    let (older, newer) = match (&args.from, &args.to) {
        (Some(from), Some(to)) => (
            registry.get(&args.machine, &args.set, from)?,
            registry.get(&args.machine, &args.set, to)?,
        ),
        (None, None) => {
            // default to the two most recent snapshots
            let mut snapshots = registry.list_snapshots(&args.machine, &args.set)?;
            if snapshots.len() < 2 {
                return Err(DriftError::Config {
                    details: "need at least 2 snapshots to compare; run 'driftscan scan' again"
                        .to_string(),
                });
            }
            let newest = snapshots.remove(0);
            let second = snapshots.remove(0);
            (second, newest)
        }
        _ => {
            return Err(DriftError::Config {
                details: "both --from and --to must be specified together".to_string(),
            });
        }
    };

    let result = diff::compare(&older, &newer)?;

    if args.json {
        println!("{}", report::json::render(&result)?);
    } else {
        print!("{}", report::table::render_diff(&result));
    }
    Ok(())
}

fn parse_instant(value: &str) -> Result<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| DriftError::Config {
            details: format!("invalid timestamp '{value}': {e} (expected RFC 3339)"),
        })
}
