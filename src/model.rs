//! Data models for the thank-you QR service
//!
//! Record types are stored as JSON documents with camelCase field names.
//! Request/response types are the HTTP payloads of the service.

use serde::{Deserialize, Serialize};

use crate::location::LocationResult;

/// One generated shareable link / QR code and its scan history
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    /// Opaque primary key (random UUID), never changes
    pub id: String,

    /// 6-character lowercase alphanumeric code used in shareable URLs
    pub code: String,

    /// Number of unique visitors, not total scan events
    #[serde(default)]
    pub scan_count: u64,

    /// Scan events in insertion order
    #[serde(default)]
    pub scans: Vec<ScanEvent>,

    /// Creation time in epoch milliseconds
    pub created_at: i64,

    /// Identifier of the owning user, if the code was created while signed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// A single activation of a code's link
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub id: String,
    pub qr_id: String,
    /// Epoch milliseconds at recording time
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub location: ScanLocation,
}

impl ScanEvent {
    /// Whether `self` repeats `earlier`: both fall within `window_ms` of
    /// each other and come from the same user. An event without a user
    /// repeats any event in the window.
    pub fn repeats(&self, earlier: &ScanEvent, window_ms: i64) -> bool {
        (earlier.timestamp - self.timestamp).abs() < window_ms
            && self
                .user_id
                .as_ref()
                .map_or(true, |user| earlier.user_id.as_ref() == Some(user))
    }
}

/// Stored scan location. `(0, 0)` means unknown.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScanLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ScanLocation {
    pub fn is_unknown(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// Request payload for generating a new code
///
/// # Example
/// ```json
/// { "created_by": "uid_123" }
/// ```
#[derive(Deserialize, Default)]
pub struct CreateCodeRequest {
    /// Optional identifier of the signed-in user creating the code
    pub created_by: Option<String>,
}

/// Response returned after a code has been generated
#[derive(Serialize)]
pub struct CreateCodeResponse {
    pub id: String,
    pub code: String,
    /// Shareable URL encoded in the QR code
    pub scan_url: String,
    pub created_at: i64,
}

/// Query parameters for listing codes
///
/// Query string: `?created_by=uid_123`
#[derive(Deserialize)]
pub struct ListParams {
    /// Restrict the listing to codes created by this user
    pub created_by: Option<String>,
}

/// Coordinates reported by the scanning device
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ReportedCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Request payload sent by the browser when a code is scanned
///
/// Either `position` (the device granted geolocation) or `position_error`
/// (denied, timed out, unsupported) is expected; both may be absent.
#[derive(Deserialize, Default, Debug)]
pub struct ScanRequest {
    pub position: Option<ReportedCoordinates>,
    pub position_error: Option<String>,
}

/// Response returned after a scan has been processed
#[derive(Serialize)]
pub struct ScanResponse {
    pub code: String,
    /// False only when the code vanished between lookup and write
    pub recorded: bool,
    pub first_visit: bool,
    pub scan_count: u64,
    pub location: LocationResult,
}
