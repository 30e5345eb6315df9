//! Query service entry point.

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use debsnap_api::AppState;
use debsnap_store::Store;

/// Serve the read-only provenance API over the snapshot store.
#[derive(Parser, Debug)]
#[command(name = "debsnap-api", version, about)]
struct Args {
    /// Bind address.
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    bind: String,

    /// Database connection string (falls back to SNAPSHOT_DB_URL).
    #[arg(long, env = "SNAPSHOT_DB_URL")]
    database_url: String,

    /// Log at debug level.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let default = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();

    let store = match Store::connect(&args.database_url).await {
        Ok(store) => store,
        Err(e) => {
            error!("failed to open store: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = debsnap_api::web::serve(AppState { store }, &args.bind).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
