//! Route definitions

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::database::AppState;
use crate::handler::{
    create_code, get_code, get_global_stats, get_qr, health, list_codes, scan_code,
};
use crate::middleware::auth_middleware;

/// Creates the application router
///
/// # Route Definitions
///
/// - `GET /health` - liveness
/// - `POST /scan/{code}` - records a scan (public, called by the scan page)
/// - `POST /api/codes` - generates a code (authorized)
/// - `GET /api/codes` - lists codes, optionally by `created_by` (authorized)
/// - `GET /api/codes/{code}` - statistics of one code, by id or short code
/// - `GET /api/codes/{code}/qr` - QR code as SVG
/// - `GET /api/stats` - statistics across all codes
///
/// # Example Usage
///
/// ```no_run
/// # use std::sync::Arc;
/// # use thankyou_qr::config::Config;
/// # use thankyou_qr::database::{init_db, AppState, RedbStore};
/// # use thankyou_qr::location::LocationResolver;
/// # use thankyou_qr::route::create_app;
/// let config = Config::default();
/// let db = init_db(&config.database_url).unwrap();
/// let locator = LocationResolver::from_config(&config).unwrap();
/// let state = AppState::new(Arc::new(RedbStore::new(Arc::new(db))), locator, config);
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let management_routes = Router::new()
        .route("/codes", get(list_codes).post(create_code))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let public_routes = Router::new()
        .route("/codes/{code}", get(get_code))
        .route("/codes/{code}/qr", get(get_qr))
        .route("/stats", get(get_global_stats));

    Router::new()
        .route("/health", get(health))
        .route("/scan/{code}", post(scan_code))
        .nest("/api", management_routes.merge(public_routes))
        .with_state(state)
}
