//! Approximate client location
//!
//! Tries the position reported by the device first, falls back to
//! network-address estimation, and fuzzes whatever it finds before it is
//! stored or displayed. Failures never escape: the caller always gets a
//! `LocationResult`, possibly the `(0, 0)` "unknown" sentinel.

mod device;
mod fuzz;
mod network;
mod resolver;
mod reverse;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub use device::{DevicePositioning, PositionError, PositionOptions, ReportedPosition};
pub use fuzz::{apply_fuzzing, city_hash};
pub use network::{IpapiLocator, IpinfoLocator, NetworkLocator};
pub use resolver::{LocationResolver, DEVICE_SAFETY_TIMEOUT};
pub use reverse::{NominatimGeocoder, ReverseGeocoder};

const USER_AGENT: &str = concat!("thankyou-qr/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Finite, with latitude in [-90, 90] and longitude in [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }
}

/// City/country labels for a coordinate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Place {
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Coordinate estimate returned by a network provider
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub coordinates: Coordinates,
    pub place: Place,
}

impl Estimate {
    /// `(0, 0)` is what providers hand back when they know nothing
    pub fn is_usable(&self) -> bool {
        self.coordinates.is_valid()
            && !(self.coordinates.latitude == 0.0 && self.coordinates.longitude == 0.0)
    }
}

/// Where a location came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationSource {
    #[serde(rename = "browser")]
    Device,
    #[serde(rename = "ip")]
    Network,
    #[serde(rename = "none")]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationResult {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub source: LocationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LocationResult {
    pub fn located(coordinates: Coordinates, place: Place, source: LocationSource) -> Self {
        Self {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            city: place.city,
            country: place.country,
            source,
            error: None,
        }
    }

    /// The `(0, 0)` sentinel carrying the reason nothing was found
    pub fn unknown(error: impl Into<String>) -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            city: None,
            country: None,
            source: LocationSource::Unknown,
            error: Some(error.into()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.error.is_some() || (self.latitude == 0.0 && self.longitude == 0.0)
    }
}

/// Failures of the HTTP lookup services
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("client network address unknown")]
    NoAddress,
    #[error("no usable coordinates")]
    NoCoordinates,
}

/// HTTP client shared by the lookup services
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}
