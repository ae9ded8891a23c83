//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Opens the embedded database
//! - Starts the HTTP server with graceful shutdown support

use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use linkpulse::config::Config;
use linkpulse::database::Store;
use linkpulse::error::hide_internal_errors;
use linkpulse::route::create_app;
use linkpulse::state::AppState;

/// How often idle rate-limit buckets are evicted
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Application entry point
///
/// # Environment Variables
///
/// - `PORT` / `HOST` - Listen address (default: 0.0.0.0:8080)
/// - `DATABASE_URL` - Path to database file (default: "data.db")
/// - `BASE_URL` - Public origin used to build short links
/// - `JWT_SECRET`, `JWT_EXPIRY_HOURS` - Token signing
/// - `RUST_LOG` - Log filter (default: "linkpulse=debug,tower_http=debug")
///
/// See [`Config::from_env`] for the full list.
#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("linkpulse=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env();
    hide_internal_errors(config.production);

    let store = Store::open(&config.database_path).expect("Failed to initialize database");
    tracing::info!("Using database: {}", config.database_path);

    let addr = format!("{}:{}", config.host, config.port);
    let public_url = config.base_url.clone();
    let state = AppState::new(store, config);

    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.retain_recent();
        }
    });

    let app = create_app(state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", addr, e));
    tracing::info!("Server listening on {} (public URL {})", addr, public_url);

    // The server will continue running until it receives SIGTERM or SIGINT
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Resolves on Ctrl+C (SIGINT) or, on Unix, SIGTERM
///
/// Open connections are allowed to complete and in-flight write
/// transactions commit before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
