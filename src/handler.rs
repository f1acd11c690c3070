//! HTTP request handlers
//!
//! The scan endpoint runs the whole scan flow on behalf of the browser:
//! visitor cookies, location resolution and recording. The remaining
//! handlers create codes and read their statistics.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Extensions, HeaderMap, HeaderName, StatusCode,
    },
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::codes;
use crate::database::AppState;
use crate::error::AppError;
use crate::location::ReportedPosition;
use crate::model::{
    CodeRecord, CreateCodeRequest, CreateCodeResponse, ListParams, ScanRequest, ScanResponse,
};
use crate::qr::render_svg;
use crate::recorder::{ScanInput, ScanRecorder};
use crate::stats::{global_stats, GlobalStats};
use crate::visit::{CookieStore, VisitDeduplicator};

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Generates a new code
///
/// # Request Body
///
/// ```json
/// { "created_by": "uid_123" }
/// ```
///
/// # Response
///
/// - **201 Created** - `{ id, code, scan_url, created_at }`
/// - **503 Service Unavailable** - no free code found
pub async fn create_code(
    State(state): State<AppState>,
    Json(payload): Json<CreateCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created_by = payload.created_by.filter(|owner| !owner.is_empty());
    let record = codes::generate_code(state.store.as_ref(), created_by).await?;

    let response = CreateCodeResponse {
        scan_url: state.config.scan_url(&record.code),
        id: record.id,
        code: record.code,
        created_at: record.created_at,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Lists codes, newest first
///
/// `GET /api/codes?created_by=uid_123` restricts the list to one owner.
pub async fn list_codes(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<CodeRecord>>, AppError> {
    let records = match params.created_by.as_deref() {
        Some(owner) if !owner.is_empty() => {
            codes::codes_for_owner(state.store.as_ref(), owner).await?
        }
        _ => {
            let mut records = state.store.list().await?;
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            records
        }
    };

    Ok(Json(records))
}

/// Full record of a code, looked up by id or short code
pub async fn get_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CodeRecord>, AppError> {
    codes::find_stats(state.store.as_ref(), &code)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("code {}", code)))
}

/// QR code of the shareable scan URL as SVG
pub async fn get_qr(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = codes::find_stats(state.store.as_ref(), &code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("code {}", code)))?;

    let svg = render_svg(&state.config.scan_url(&record.code))?;
    Ok(([(CONTENT_TYPE, "image/svg+xml")], svg))
}

pub async fn get_global_stats(State(state): State<AppState>) -> Result<Json<GlobalStats>, AppError> {
    Ok(Json(global_stats(state.store.as_ref()).await?))
}

/// Records a scan of a short code
///
/// # Request Body
///
/// ```json
/// { "position": { "latitude": 40.0, "longitude": -74.0 } }
/// ```
/// or, when the browser could not position itself,
/// ```json
/// { "position_error": "User denied Geolocation" }
/// ```
///
/// # Response
///
/// - **200 OK** - `ScanResponse`, with `Set-Cookie` headers for the
///   visitor id and the per-code scanned flag
/// - **404 Not Found** - unknown code
pub async fn scan_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(payload): Json<ScanRequest>,
) -> Result<impl IntoResponse, AppError> {
    let code_id = codes::resolve_code(state.store.as_ref(), &code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("code {}", code)))?;

    let cookies = cookie_header(&headers);
    let mut visits = VisitDeduplicator::new(CookieStore::from_header(
        cookies.as_deref(),
        state.config.cookie_secure,
    ));
    let client_id = visits.get_or_create_client_id();
    let first_visit = visits.is_first_visit(&code_id);
    if first_visit {
        visits.mark_visited(&code_id);
    }

    let ip = client_ip(&headers, &extensions);
    let location = state
        .locator
        .resolve(&ReportedPosition::from_request(&payload), ip)
        .await;
    debug!("Resolved scan location for {}: {:?}", code, location);

    let recorder = ScanRecorder::new(state.store.clone());
    let recorded = recorder
        .record_scan(
            ScanInput {
                code_id: code_id.clone(),
                latitude: Some(location.latitude),
                longitude: Some(location.longitude),
                city: location.city.clone(),
                country: location.country.clone(),
                is_first_visit: Some(first_visit),
                user_id: Some(client_id),
            },
            &visits,
        )
        .await?;

    let scan_count = state
        .store
        .get(&code_id)
        .await?
        .map(|record| record.scan_count)
        .ok_or_else(|| AppError::NotFound(format!("code {}", code)))?;

    let set_cookies: Vec<(HeaderName, String)> = visits
        .into_store()
        .set_cookie_headers()
        .into_iter()
        .map(|cookie| (SET_COOKIE, cookie))
        .collect();

    let response = ScanResponse {
        code,
        recorded,
        first_visit,
        scan_count,
        location,
    };

    Ok((StatusCode::OK, AppendHeaders(set_cookies), Json(response)))
}

/// All `Cookie` headers joined into one value
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    (!values.is_empty()).then(|| values.join("; "))
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer
fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}
