use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use ftdcwatch::report::render_table;
use ftdcwatch::server::{run_server, AppState};
use ftdcwatch::ServerConfig;
use ftdcwatch_analytics::assessment::MAX_WINDOW_MS;
use ftdcwatch_analytics::{Assessment, IngestOptions, IngestionOrchestrator, TimeSeriesStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ftdcwatch")]
#[command(about = "Analytics and dashboard datasource for MongoDB FTDC data")]
struct Args {
    /// `metrics.*` / `keyhole_stats.*` files, or directories holding them
    paths: Vec<PathBuf>,

    /// Port to serve the dashboard datasource on
    #[arg(short, long)]
    port: Option<u16>,

    /// Only load the latest N files
    #[arg(short, long)]
    latest: Option<usize>,

    /// Keep unscored assessment rows, show host names and log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the assessment of the last 24 hours of data and exit
    #[arg(long)]
    assess: bool,

    /// Ingestion worker threads
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.set_port(port);
    }
    config.verbose |= args.verbose;
    config.latest = args.latest.or(config.latest);
    config.workers = args.workers.or(config.workers);

    let options = IngestOptions {
        workers: config.workers,
        latest: config.latest,
    };
    let orchestrator = IngestionOrchestrator::new(TimeSeriesStore::new()).with_options(options);
    let state = Arc::new(AppState::new(orchestrator, config));

    if args.assess {
        if args.paths.is_empty() {
            bail!("--assess needs at least one file or directory");
        }
        return assess(state, args.paths).await;
    }

    if !args.paths.is_empty() {
        let ingest_state = state.clone();
        let paths = args.paths.clone();
        let result =
            tokio::task::spawn_blocking(move || ingest_state.orchestrator.ingest(&paths)).await?;
        match result {
            Ok(report) => {
                for endpoint in report.endpoints(&state.config.dashboards()) {
                    info!("http://{}{}", state.config.listen_addr, endpoint);
                }
            }
            Err(e) => error!("Ingestion failed: {}", e),
        }
    }

    run_server(state).await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

async fn assess(state: Arc<AppState>, paths: Vec<PathBuf>) -> Result<()> {
    let ingest_state = state.clone();
    let report =
        tokio::task::spawn_blocking(move || ingest_state.orchestrator.ingest(&paths)).await??;

    let (Some(first), Some(last)) = (report.first_ms, report.last_ms) else {
        bail!("No data points loaded");
    };
    let to = last as f64;
    let from = (first as f64).max(to - MAX_WINDOW_MS);

    let data = state.orchestrator.store().read();
    let table = Assessment::new(&data)
        .blocks(1)
        .verbose(state.config.verbose)
        .table(from, to);
    print!("{}", render_table(&table));
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "ftdcwatch=debug,ftdcwatch_analytics=debug"
    } else {
        "ftdcwatch=info,ftdcwatch_analytics=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}
