use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::env;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use seva::config::EngineConfig;
use seva::web::PgPool;

mod commands;

use commands::{
    build_engine, handle_migrate, handle_process_outbox, handle_scan_sla, handle_web,
    run_migrations, web::BackgroundSchedule,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const VERSION: &str = match option_env!("VERGEN_GIT_DESCRIBE") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

#[derive(Parser)]
#[command(name = "seva", version = VERSION, about = "Ritual booking lifecycle and payment reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API with periodic SLA scans and outbox passes
    Web {
        #[arg(long, default_value = "0.0.0.0")]
        interface: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Seconds between SLA sweeps
        #[arg(long, default_value_t = 300)]
        sla_scan_interval: u64,
        /// Seconds between outbox passes
        #[arg(long, default_value_t = 30)]
        outbox_interval: u64,
    },
    /// Run one SLA breach sweep and print the summary
    ScanSla,
    /// Run one pass over due outbox tasks
    ProcessOutbox,
    /// Apply pending database migrations
    Migrate,
}

fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = env::var("SENTRY_DSN").ok().filter(|dsn| !dsn.is_empty())?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: Some(VERSION.into()),
            environment: env::var("SEVA_ENV").ok().map(Into::into),
            ..Default::default()
        },
    )))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
}

fn create_pool() -> Result<PgPool> {
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(20)
        .connection_timeout(Duration::from_secs(10))
        .build(manager)
        .context("Failed to create database pool")
}

fn metrics_port() -> u16 {
    env::var("METRICS_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(9091)
}

async fn run(cli: Cli) -> Result<()> {
    let pool = create_pool()?;

    if let Commands::Migrate = cli.command {
        return handle_migrate(pool).await;
    }

    run_migrations(pool.clone()).await?;
    let config = EngineConfig::from_env()?;
    info!(?config, "Configuration loaded");
    let engine = build_engine(pool, &config)?;

    match cli.command {
        Commands::Web {
            interface,
            port,
            sla_scan_interval,
            outbox_interval,
        } => {
            let port_for_metrics = metrics_port();
            tokio::spawn(async move {
                if let Err(e) = seva::metrics::start_metrics_server(port_for_metrics).await {
                    error!(error = %e, "Metrics server stopped");
                }
            });

            let schedule = BackgroundSchedule {
                sla_scan: Duration::from_secs(sla_scan_interval),
                outbox: Duration::from_secs(outbox_interval),
            };
            handle_web(interface, port, engine, &config.jwt_secret, schedule).await
        }
        Commands::ScanSla => handle_scan_sla(engine).await,
        Commands::ProcessOutbox => handle_process_outbox(engine).await,
        Commands::Migrate => Ok(()),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Sentry must be initialised before the runtime starts its worker threads
    let _sentry = init_sentry();
    init_tracing();
    info!(version = VERSION, "Starting seva");

    let cli = Cli::parse();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(run(cli))
}
