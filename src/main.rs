//! Image Previewer - an on-demand image resizing proxy.
//!
//! This binary starts the HTTP server and configures all components.

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_previewer::{
    config::Config,
    fetch::HttpFetcher,
    preview::PreviewService,
    server::{create_router, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to open log output {}: {}", config.log_output, e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Image Previewer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    if config.cache_capacity == 0 {
        info!("  Cache: disabled");
    } else {
        info!("  Cache: {} previews", config.cache_capacity);
    }
    info!("  Timeout: {}s", config.timeout);
    match config.log_file() {
        Some(path) => info!("  Logs: {}", path.display()),
        None => info!("  Logs: stdout"),
    }
    info!(
        "  Limits: {} byte sources, {}px max dimension",
        config.max_source_size, config.max_dimension
    );

    let fetcher = match HttpFetcher::with_limits(config.timeout(), config.max_source_size) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = Arc::new(PreviewService::with_cache_capacity(
        fetcher,
        config.cache_capacity,
    ));

    let router = create_router(Arc::clone(&service), build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  Try: curl -o preview.jpg http://{}/fill/300/200/<image-url>", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let stats = service.stats().await;
    service.clear().await;
    info!(
        hits = stats.hits,
        misses = stats.misses,
        "Server stopped, released {} cached previews",
        stats.entries
    );

    if let Err(e) = served {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stdout unless `--log-output` names a file, which is opened in
/// append mode.
fn init_logging(config: &Config) -> std::io::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter().into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_file() {
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
    }

    Ok(())
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_max_body_size(config.max_body_size)
        .with_timeout(config.timeout())
        .with_max_dimension(config.max_dimension)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received, draining connections");
}
