//! ClimSystems agent entry point.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use climsys_agent::api::{create_router, AppState};
use climsys_agent::config::Config;
use climsys_agent::metrics;
use climsys_agent::store::Store;
use climsys_agent::utils::{shutdown_signal, wait_for_shutdown};
use climsys_agent::web::create_web_router;
use climsys_agent::worker::{spawn_supervised, DemoAnalyzer, Worker, WorkerConfig, WorkerExit};

/// ClimSystems agent API, worker and web placeholder.
#[derive(Parser, Debug)]
#[command(name = "climsys-agent")]
#[command(about = "ClimSystems AI agent API, background worker and web placeholder")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the API and run the background worker (default).
    Api {
        /// Listen port (defaults to PORT, then 8000).
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not spawn the background worker.
        #[arg(long)]
        no_worker: bool,
    },

    /// Serve the web placeholder page.
    Web {
        /// Listen port (defaults to PORT, then 3000).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Configuration carries the log filter, so it is read before logging starts.
    let loaded = Config::load_validated();
    let directives = match &loaded {
        Ok(config) => config.log_directives(args.verbose),
        Err(_) => Config::default().log_directives(args.verbose),
    };
    let (filter, rejected) = match EnvFilter::try_new(&directives) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("info"), Some(e)),
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if let Some(e) = rejected {
        warn!("Invalid log filter {:?}, using info: {}", directives, e);
    }

    let config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::Error::from(e)
    })?;

    match args.command {
        Some(Command::Api { port, no_worker }) => cmd_api(config, port, no_worker).await,
        Some(Command::Web { port }) => cmd_web(config, port).await,
        Some(Command::CheckConfig) => cmd_check_config(&config),
        None => cmd_api(config, None, false).await,
    }
}

/// Check configuration validity.
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("CLIMSYS AGENT - CONFIGURATION CHECK");
    println!("======================================================================");

    println!("Configuration Summary:");
    println!("  API port: {}", config.api_port());
    println!("  Web port: {}", config.web_port());
    println!("  API base: {}", config.api_base);
    println!("  Worker: {}", if config.embedded_worker { "embedded" } else { "disabled" });
    println!("  Worker ID: {}", config.worker_identity());
    println!("  Poll interval: {}ms", config.worker_poll_interval_ms);
    println!("  Log filter: {}", config.rust_log);
    println!("  Job max attempts: {}", config.job_max_attempts);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Serve the API, with the worker unless disabled.
async fn cmd_api(config: Config, port_override: Option<u16>, no_worker: bool) -> anyhow::Result<()> {
    let port = port_override.unwrap_or_else(|| config.api_port());

    let store = Arc::new(Store::new());
    let mut app_state = AppState::new(store.clone(), config.job_max_attempts);
    match metrics::install_recorder() {
        Ok(handle) => app_state = app_state.with_metrics(handle),
        Err(e) => warn!("Metrics recorder unavailable: {}", e),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("API listening on {}", addr);

    let server = axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
        .into_future();
    tokio::pin!(server);

    if !config.embedded_worker || no_worker {
        info!("Background worker disabled");
        server.await?;
        info!("API stopped");
        return Ok(());
    }

    let worker = Worker::new(store, DemoAnalyzer, WorkerConfig::from_config(&config));
    let mut supervisor = spawn_supervised(worker, shutdown_rx);

    // The API does not outlive its worker.
    tokio::select! {
        served = &mut server => {
            served?;
            match supervisor.await {
                Ok(WorkerExit::Stopped) => {}
                Ok(exit) => warn!("Worker ended before shutdown: {:?}", exit),
                Err(e) => error!("Worker supervisor failed: {}", e),
            }
        }
        exit = &mut supervisor => match exit {
            Ok(WorkerExit::Stopped) => server.await?,
            Ok(exit) => anyhow::bail!("background worker ended unexpectedly: {:?}", exit),
            Err(e) => anyhow::bail!("worker supervisor failed: {}", e),
        },
    }

    info!("API stopped");
    Ok(())
}

/// Serve the web placeholder.
async fn cmd_web(config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let port = port_override.unwrap_or_else(|| config.web_port());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Web listening on {} (API base {})", addr, config.api_base);

    axum::serve(listener, create_web_router(&config.api_base))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Web stopped");
    Ok(())
}
