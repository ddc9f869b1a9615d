use anyhow::Result;
use clap::{Parser, Subcommand};
use missiond::{config::DaemonConfig, seed, storage::Storage, AppContext};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "missiond",
    about = "Mission Control — agent operations dashboard daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST API port
    #[arg(long, env = "MISSIOND_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "MISSIOND_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MISSIOND_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "MISSIOND_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "MISSIOND_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the dashboard daemon (default when no subcommand given).
    ///
    /// Runs missiond in the foreground, serving the REST API.
    ///
    /// Examples:
    ///   missiond serve
    ///   missiond
    Serve,
    /// Populate the database with the demo agent fleet.
    ///
    /// Creates five agents (upserted by name, safe to re-run) plus starter
    /// tasks, calendar events, and messages when those tables are empty.
    ///
    /// Examples:
    ///   missiond seed
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Arc::new(DaemonConfig::new(
        args.port,
        args.data_dir,
        args.log,
        args.bind_address,
    ));
    let _guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::Seed => run_seed(config).await,
    }
}

async fn run_server(config: Arc<DaemonConfig>) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "missiond starting");
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        bind = %config.bind_address,
        "config loaded"
    );

    let storage = Arc::new(
        Storage::new_with_slow_query(&config.data_dir, config.slow_query_threshold_ms).await?,
    );

    let ctx = Arc::new(AppContext {
        config,
        storage,
        started_at: std::time::Instant::now(),
    });

    missiond::rest::start_rest_server(ctx).await
}

async fn run_seed(config: Arc<DaemonConfig>) -> Result<()> {
    let storage = Storage::new(&config.data_dir).await?;
    let report = seed::run(&storage).await?;
    info!(
        agents = report.agents,
        tasks = report.tasks,
        events = report.events,
        messages = report.messages,
        "seed complete"
    );
    Ok(())
}

/// Initialise tracing. Returns the appender guard when logging to a file;
/// dropping it flushes buffered log lines on shutdown.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("missiond.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(log_level)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(log_level)
                    .compact()
                    .init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
                .init();
        }
        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
        None
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
        None
    }
}
