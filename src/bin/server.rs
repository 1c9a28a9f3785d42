//! kvgate Server Binary
//!
//! Connects to the storage engine and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kvgate::{Config, KvRepository, KvService};
use tracing_subscriber::{fmt, EnvFilter};

/// kvgate Server
#[derive(Parser, Debug)]
#[command(name = "kvgate-server")]
#[command(about = "HTTP key-value gateway over a Tarantool-compatible engine")]
#[command(version)]
struct Args {
    /// Storage engine address (host:port)
    #[arg(short, long, env = "KVGATE_STORAGE_ADDR", default_value = "127.0.0.1:3301")]
    storage: String,

    /// Engine user; empty connects as guest
    #[arg(short, long, env = "KVGATE_USER", default_value = "")]
    user: String,

    /// Engine password
    #[arg(short, long, env = "KVGATE_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Space holding `[key, value]` tuples
    #[arg(long, env = "KVGATE_SPACE", default_value = kvgate::repository::DEFAULT_SPACE)]
    space: String,

    /// HTTP listen address (host:port)
    #[arg(short, long, env = "KVGATE_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Engine connect timeout in milliseconds
    #[arg(long, default_value = "1000")]
    connect_timeout_ms: u64,

    /// Per-request timeout in milliseconds (0 disables it)
    #[arg(long, default_value = "1000")]
    request_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvgate=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("kvgate Server v{}", kvgate::VERSION);
    tracing::info!("Storage address: {}", args.storage);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let request_timeout = match args.request_timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    let config = Config::builder()
        .storage_addr(&args.storage)
        .credentials(&args.user, &args.password)
        .space(&args.space)
        .connect_timeout(Duration::from_millis(args.connect_timeout_ms))
        .request_timeout(request_timeout)
        .listen_addr(&args.listen)
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // Storage must be reachable before we accept traffic
    let repo = match KvRepository::connect(&config) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::error!("Failed to connect to storage: {:?}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Storage connected, space {} has id {}",
        repo.space(),
        repo.space_id()
    );

    let service = Arc::new(KvService::new(repo));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            service.shutdown();
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
        kvgate::http::serve(listener, Arc::clone(&service), shutdown_signal()).await
    });

    // Drop the runtime first so no handler still holds the session
    drop(runtime);
    service.shutdown();

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining requests...");
}
