mod auth;
mod config;
mod envelope;
mod error;
mod gateway;
mod realtime;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use gateway::proxy::ServiceDirectory;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "taskcore_gateway=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "taskcore_gateway=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("TaskCore API gateway v{} starting", env!("CARGO_PKG_VERSION"));

    // Build application state with the development service stubs
    let services = Arc::new(ServiceDirectory::with_stubs());
    let app_state = AppState::new(config.jwt_secret.clone().into_bytes(), services);

    // Start the heartbeat emitter; runs until process shutdown
    realtime::heartbeat::spawn(
        app_state.clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
    );

    // Build router
    let app = gateway::routes::build_router(app_state, &config);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    tracing::info!("Health check available at http://{}/health", addr);
    tracing::info!("WebSocket endpoint ready at ws://{}/ws", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server closed");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM. axum stops accepting new connections
/// and lets in-flight requests drain before serve() returns.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT. Graceful shutdown..."),
        _ = terminate => tracing::info!("Received SIGTERM. Graceful shutdown..."),
    }
}
