//! Reverse geocoding at city level

use async_trait::async_trait;
use serde::Deserialize;

use super::{endpoint, Coordinates, LookupError, Place};

/// Zoom 10 asks Nominatim for city-level detail only
const CITY_ZOOM: &str = "10";

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coordinates: Coordinates) -> Result<Place, LookupError>;
}

/// OpenStreetMap Nominatim: `GET {base}/reverse?format=json&lat=&lon=&zoom=10`
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, coordinates: Coordinates) -> Result<Place, LookupError> {
        let url = endpoint(&self.base_url, "reverse");
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();

        let body: NominatimResponse = self
            .client
            .get(&url)
            .query(&[
                ("format", "json"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("zoom", CITY_ZOOM),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(address) = body.address else {
            return Ok(Place::default());
        };

        let city = address
            .city
            .or(address.town)
            .or(address.village)
            .or(address.county)
            .or(address.state);

        Ok(Place {
            city,
            country: address.country,
        })
    }
}
