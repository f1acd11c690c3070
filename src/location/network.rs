//! Network-address based location estimation
//!
//! Two independent providers are used as primary and backup. Both answer
//! with coordinates plus city/country for a client address.

use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

use super::{endpoint, Coordinates, Estimate, LookupError, Place};

#[async_trait]
pub trait NetworkLocator: Send + Sync {
    /// Estimates the location of `ip`
    async fn locate(&self, ip: Option<IpAddr>) -> Result<Estimate, LookupError>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// ipapi.co: `GET {base}/{ip}/json/`
pub struct IpapiLocator {
    client: reqwest::Client,
    base_url: String,
}

/// ipapi.co answers HTTP 200 with `"error": true` for reserved or unknown
/// addresses and when rate limited.
#[derive(Deserialize)]
struct IpapiResponse {
    #[serde(default)]
    error: bool,
    reason: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
    country_name: Option<String>,
}

impl IpapiLocator {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl NetworkLocator for IpapiLocator {
    async fn locate(&self, ip: Option<IpAddr>) -> Result<Estimate, LookupError> {
        let ip = ip.ok_or(LookupError::NoAddress)?;
        let url = endpoint(&self.base_url, &format!("{}/json/", ip));

        let body: IpapiResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.error {
            return Err(LookupError::Provider(
                body.reason.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        trace!(
            "ipapi lookup for {}: city={:?}, country={:?}",
            ip,
            body.city,
            body.country_name
        );

        Ok(Estimate {
            coordinates: Coordinates {
                latitude: body.latitude.unwrap_or(0.0),
                longitude: body.longitude.unwrap_or(0.0),
            },
            place: Place {
                city: body.city.filter(|c| !c.is_empty()),
                country: body.country_name.filter(|c| !c.is_empty()),
            },
        })
    }

    fn name(&self) -> &'static str {
        "ipapi"
    }
}

/// ipinfo.io: `GET {base}/{ip}/json`, coordinates as a `"lat,lng"` string
pub struct IpinfoLocator {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct IpinfoResponse {
    loc: Option<String>,
    city: Option<String>,
    country: Option<String>,
}

impl IpinfoLocator {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// Parses `"40.7128,-74.0060"`; unparseable parts become 0
fn parse_loc(loc: &str) -> Coordinates {
    let mut parts = loc.split(',').map(|part| part.trim().parse::<f64>().unwrap_or(0.0));
    Coordinates {
        latitude: parts.next().unwrap_or(0.0),
        longitude: parts.next().unwrap_or(0.0),
    }
}

#[async_trait]
impl NetworkLocator for IpinfoLocator {
    async fn locate(&self, ip: Option<IpAddr>) -> Result<Estimate, LookupError> {
        let ip = ip.ok_or(LookupError::NoAddress)?;
        let url = endpoint(&self.base_url, &format!("{}/json", ip));

        let body: IpinfoResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let coordinates = body.loc.as_deref().map(parse_loc).unwrap_or(Coordinates {
            latitude: 0.0,
            longitude: 0.0,
        });

        Ok(Estimate {
            coordinates,
            place: Place {
                city: body.city.filter(|c| !c.is_empty()),
                country: body.country.filter(|c| !c.is_empty()),
            },
        })
    }

    fn name(&self) -> &'static str {
        "ipinfo"
    }
}
