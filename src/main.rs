//! ip2country Server entry point.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use ip2country_http::AppState;
use ip2country_server::config::Config;
use ip2country_service::ServiceState;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        rate_limit_rps = config.rate_limit_rps,
        database_type = %config.database_type,
        database_path = %config.database_path.display(),
        "ip2country server starting",
    );

    let service = match ServiceState::new(&config.service_config()) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize database");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        entries = service.database().entry_count(),
        "Location database loaded"
    );

    let addr = match config.bind_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid bind address");
            return ExitCode::FAILURE;
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    let app = ip2country_http::router(AppState::new(
        service.clone(),
        config.trust_proxy_headers,
        config.request_timeout(),
    ));

    tracing::info!(%addr, "ip2country server ready");

    // Signalled once shutdown starts, to bound the graceful drain.
    let draining = Arc::new(Notify::new());
    let shutdown = {
        let draining = Arc::clone(&draining);
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    };
    let grace = config.shutdown_timeout();

    let result = tokio::select! {
        result = ip2country_http::serve(listener, app, shutdown) => result,
        () = async {
            draining.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(timeout_secs = grace.as_secs(), "Graceful shutdown timed out");
            Ok(())
        }
    };

    service.shutdown();

    match result {
        Ok(()) => {
            tracing::info!("ip2country server shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
