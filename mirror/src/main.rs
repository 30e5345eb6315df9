//! Snapshot mirror entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use debsnap_mirror::{Config, Ingester, IngestFlags, MirrorError, Selection, TimestampSelector};

/// Mirror point-in-time snapshots of an APT archive into a local,
/// content-addressed replica with full provenance tracking.
#[derive(Parser, Debug)]
#[command(name = "debsnap-mirror", version, about)]
struct Args {
    /// Local replica directory (falls back to SNAPSHOT_ROOT).
    local_directory: Option<PathBuf>,

    /// Archive to mirror (repeatable).
    #[arg(long = "archive", default_values_t = [String::from("debian")])]
    archives: Vec<String>,

    /// Timestamp or lo:hi range to mirror (repeatable; default: all).
    #[arg(long = "timestamp")]
    timestamps: Vec<String>,

    /// Suite to mirror (repeatable).
    #[arg(long = "suite", default_values_t = [String::from("unstable")])]
    suites: Vec<String>,

    /// Component to mirror (repeatable).
    #[arg(long = "component", default_values_t = [String::from("main")])]
    components: Vec<String>,

    /// Architecture to mirror (repeatable; default: all advertised).
    #[arg(long = "arch")]
    architectures: Vec<String>,

    /// Upstream snapshot service root (falls back to SNAPSHOT_UPSTREAM).
    #[arg(long, env = "SNAPSHOT_UPSTREAM")]
    upstream: Option<String>,

    /// Database connection string (falls back to SNAPSHOT_DB_URL).
    #[arg(long, env = "SNAPSHOT_DB_URL")]
    database_url: Option<String>,

    /// Re-hash on-disk files against the store; download nothing.
    #[arg(long)]
    check_only: bool,

    /// Record provenance in the database after downloading.
    #[arg(long)]
    provision_db: bool,

    /// Skip downloads; re-parse on-disk indexes and provision the database.
    #[arg(long)]
    provision_db_only: bool,

    /// Re-ingest tuples already marked as provisioned.
    #[arg(long)]
    ignore_provisioned: bool,

    /// Keep .part files of failed downloads.
    #[arg(long)]
    no_clean_part_file: bool,

    /// Do not mirror installer image files.
    #[arg(long)]
    skip_installer_files: bool,

    /// Log at debug level.
    #[arg(long)]
    verbose: bool,

    /// Log at trace level.
    #[arg(long)]
    debug: bool,
}

fn init_logging(verbose: bool, debug: bool) {
    let default = if debug {
        "trace"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.debug);

    match run(args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e @ MirrorError::InvalidArgument(_)) => {
            error!("{e}");
            std::process::exit(2);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<bool, MirrorError> {
    let flags = IngestFlags {
        check_only: args.check_only,
        provision_db: args.provision_db,
        provision_db_only: args.provision_db_only,
        ignore_provisioned: args.ignore_provisioned,
        skip_installer_files: args.skip_installer_files,
        no_clean_part_file: args.no_clean_part_file,
    };
    let config = Config::new(args.local_directory, args.upstream, args.database_url, flags)?;

    let timestamps = args
        .timestamps
        .iter()
        .map(|t| TimestampSelector::parse(t))
        .collect::<Result<Vec<_>, _>>()?;
    let selection = Selection {
        archives: args.archives,
        timestamps,
        suites: args.suites,
        components: args.components,
        architectures: args.architectures,
    };

    let ingester = Ingester::new(config).await?;
    let summary = ingester.run(&selection).await?;
    info!(
        ok = summary.tuples_ok,
        skipped = summary.tuples_skipped,
        failed = summary.tuples_failed,
        downloaded = summary.files_downloaded,
        file_failures = summary.files_failed,
        drifted = summary.files_drifted,
        "run finished"
    );
    Ok(summary.success())
}
