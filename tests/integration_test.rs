//! Integration tests for the thank-you QR API
//!
//! These tests drive the router end to end:
//! - HTTP routing
//! - Visitor cookies on the scan endpoint
//! - Location resolution with stub providers
//! - Database operations

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{response_json, setup_test_app, KNOWN_IP};

async fn create_code(app: &Router, created_by: Option<&str>) -> Value {
    let payload = match created_by {
        Some(owner) => json!({ "created_by": owner }),
        None => json!({}),
    };

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/codes")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response.into_body()).await
}

fn scan_request(code: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/scan/{}", code))
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, response_json(response.into_body()).await)
}

/// `name=value` pairs of every `Set-Cookie` header, ready to send back
fn returned_cookies(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_health() {
    let (app, _temp_db) = setup_test_app();

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_code_success() {
    let (app, _temp_db) = setup_test_app();

    let body = create_code(&app, Some("uid_123")).await;

    let code = body["code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(!body["id"].as_str().unwrap().is_empty());
    assert_eq!(body["scan_url"], format!("http://thanks.test/scan/{}", code));
    assert!(body["created_at"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_get_code_by_code_and_id() {
    let (app, _temp_db) = setup_test_app();
    let created = create_code(&app, None).await;
    let id = created["id"].as_str().unwrap();
    let code = created["code"].as_str().unwrap();

    let (status, by_code) = get_json(&app, &format!("/api/codes/{}", code)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_code["id"], id);
    assert_eq!(by_code["scanCount"], 0);
    assert_eq!(by_code["scans"], json!([]));

    let (status, by_id) = get_json(&app, &format!("/api/codes/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["code"], code);
}

#[tokio::test]
async fn test_get_code_not_found() {
    let (app, _temp_db) = setup_test_app();

    let (status, body) = get_json(&app, "/api/codes/nope42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_scan_unknown_code() {
    let (app, _temp_db) = setup_test_app();

    let response = app
        .oneshot(scan_request("zz99zz", json!({}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response_too_long = setup_test_app()
        .0
        .oneshot(scan_request("far-too-long", json!({}), None))
        .await
        .unwrap();
    assert_eq!(response_too_long.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scan_flow_counts_unique_visitors() {
    let (app, _temp_db) = setup_test_app();
    let created = create_code(&app, Some("uid_123")).await;
    let code = created["code"].as_str().unwrap();
    let position = json!({ "position": { "latitude": 40.0, "longitude": -74.0 } });

    // First visit from a browser with a position fix
    let response = app
        .clone()
        .oneshot(scan_request(code, position.clone(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = returned_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().any(|c| c.starts_with("thank_you_qr_visitor_id=")));
    assert!(cookies
        .iter()
        .any(|c| c == &format!("qr_scanned_{}=true", created["id"].as_str().unwrap())));

    let body = response_json(response.into_body()).await;
    assert_eq!(body["recorded"], true);
    assert_eq!(body["first_visit"], true);
    assert_eq!(body["scan_count"], 1);
    assert_eq!(body["location"]["source"], "browser");
    assert_eq!(body["location"]["city"], "Newark");
    assert_eq!(body["location"]["country"], "United States");

    // Same browser again
    let cookie_header = cookies.join("; ");
    let response = app
        .clone()
        .oneshot(scan_request(code, position.clone(), Some(&cookie_header)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(returned_cookies(&response).is_empty());
    let body = response_json(response.into_body()).await;
    assert_eq!(body["first_visit"], false);
    assert_eq!(body["scan_count"], 1);

    // A different browser
    let response = app
        .clone()
        .oneshot(scan_request(code, position, None))
        .await
        .unwrap();
    let body = response_json(response.into_body()).await;
    assert_eq!(body["first_visit"], true);
    assert_eq!(body["scan_count"], 2);

    let (_, stats) = get_json(&app, &format!("/api/codes/{}", code)).await;
    assert_eq!(stats["scanCount"], 2);
    let users: Vec<&str> = stats["scans"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|scan| scan["userId"].as_str())
        .collect();
    assert!(users.len() >= 2);
    assert_ne!(users.first(), users.last());
}

#[tokio::test]
async fn test_scan_falls_back_to_network_location() {
    let (app, _temp_db) = setup_test_app();
    let created = create_code(&app, None).await;
    let code = created["code"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/scan/{}", code))
        .header("content-type", "application/json")
        .header("x-forwarded-for", KNOWN_IP)
        .body(Body::from(
            json!({ "position_error": "User denied Geolocation" }).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response.into_body()).await;
    assert_eq!(body["location"]["source"], "ip");
    assert_eq!(body["location"]["city"], "Lisbon");
    assert_eq!(body["scan_count"], 1);
}

#[tokio::test]
async fn test_scan_without_any_location() {
    let (app, _temp_db) = setup_test_app();
    let created = create_code(&app, None).await;
    let code = created["code"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(scan_request(code, json!({}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response.into_body()).await;
    assert_eq!(body["recorded"], true);
    assert_eq!(body["location"]["source"], "none");
    assert_eq!(body["location"]["latitude"], 0.0);
    assert_eq!(body["location"]["longitude"], 0.0);
    assert!(body["location"]["error"].is_string());

    let (_, stats) = get_json(&app, &format!("/api/codes/{}", code)).await;
    assert!(stats["scans"][0]["location"].get("city").is_none());
}

#[tokio::test]
async fn test_list_codes_by_owner() {
    let (app, _temp_db) = setup_test_app();
    create_code(&app, Some("owner_a")).await;
    create_code(&app, Some("owner_a")).await;
    create_code(&app, Some("owner_b")).await;

    let (status, body) = get_json(&app, "/api/codes?created_by=owner_a").await;
    assert_eq!(status, StatusCode::OK);
    let codes = body.as_array().unwrap();
    assert_eq!(codes.len(), 2);
    assert!(codes.iter().all(|c| c["createdBy"] == "owner_a"));

    let (_, all) = get_json(&app, "/api/codes").await;
    assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_qr_code_svg() {
    let (app, _temp_db) = setup_test_app();
    let created = create_code(&app, None).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/codes/{}/qr", created["code"].as_str().unwrap()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/svg+xml"
    );
}

#[tokio::test]
async fn test_global_stats() {
    let (app, _temp_db) = setup_test_app();
    let first = create_code(&app, None).await;
    create_code(&app, None).await;
    let position = json!({ "position": { "latitude": 40.0, "longitude": -74.0 } });

    app.clone()
        .oneshot(scan_request(first["code"].as_str().unwrap(), position, None))
        .await
        .unwrap();

    let (status, body) = get_json(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalQrCodes"], 2);
    assert_eq!(body["totalScans"], 1);
    assert_eq!(body["recentScans"].as_array().unwrap().len(), 1);
    assert_eq!(body["uniqueCountries"][0]["locationName"], "United States");
    assert_eq!(body["uniqueCountries"][0]["count"], 1);
}

#[tokio::test]
async fn test_scan_with_overflowing_position_keeps_record_readable() {
    let (app, _temp_db) = setup_test_app();
    let created = create_code(&app, None).await;
    let code = created["code"].as_str().unwrap();

    // Parses as a finite f64 but is no coordinate
    let response = app
        .clone()
        .oneshot(scan_request(
            code,
            json!({ "position": { "latitude": 1e307, "longitude": 1.0 } }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["location"]["source"], "none");
    assert_eq!(body["location"]["latitude"], 0.0);

    let (status, record) = get_json(&app, &format!("/api/codes/{}", code)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["scans"][0]["location"]["latitude"], 0.0);

    let (status, _) = get_json(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(scan_request(
            code,
            json!({ "position": { "latitude": 40.0, "longitude": -74.0 } }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["location"]["source"], "browser");
    assert_eq!(body["scan_count"], 2);
}

#[tokio::test]
async fn test_out_of_range_position_falls_back_to_network() {
    let (app, _temp_db) = setup_test_app();
    let created = create_code(&app, None).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/scan/{}", created["code"].as_str().unwrap()))
        .header("content-type", "application/json")
        .header("x-forwarded-for", KNOWN_IP)
        .body(Body::from(
            json!({ "position": { "latitude": 123.0, "longitude": 10.0 } }).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["location"]["source"], "ip");
    assert_eq!(body["location"]["city"], "Lisbon");
}
