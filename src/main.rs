//! Application entry point and server initialization
//!
//! Loads configuration, opens the database, builds the location resolver
//! and serves the HTTP API until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use thankyou_qr::config::Config;
use thankyou_qr::database::{init_db, AppState, RedbStore};
use thankyou_qr::location::LocationResolver;
use thankyou_qr::route::create_app;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("thankyou_qr=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env();

    let db = init_db(&config.database_url).expect("Failed to initialize database");
    let locator = LocationResolver::from_config(&config).expect("Failed to build HTTP client");

    let port = config.port;
    let db_name = config.database_url.clone();
    let state = AppState::new(Arc::new(RedbStore::new(Arc::new(db))), locator, config);

    let app = create_app(state).layer(TraceLayer::new_for_http());

    // Bind to all network interfaces on the specified port
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");

    info!("Server running at http://localhost:{}", port);
    info!("Using database: {}", db_name);

    // Peer addresses feed the network-based location fallback
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM
///
/// In-flight requests are allowed to complete so no redb write transaction
/// is cut off halfway.
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

    info!("Shutdown signal received, stopping server.");
}
