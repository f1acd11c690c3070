//! Location resolution pipeline
//!
//! Device report (bounded by `DEVICE_SAFETY_TIMEOUT`) -> reverse lookup ->
//! primary network provider -> backup provider -> `(0, 0)` sentinel. Every
//! located result is fuzzed before it leaves this module.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{
    apply_fuzzing, http_client, DevicePositioning, Estimate, IpapiLocator, IpinfoLocator,
    LocationResult, LocationSource, LookupError, NetworkLocator, NominatimGeocoder,
    PositionError, PositionOptions, ReverseGeocoder,
};
use crate::config::Config;

/// Outer bound on device positioning, on top of the device's own timeout
pub const DEVICE_SAFETY_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves an approximate, fuzzed location for a scanning client
pub struct LocationResolver {
    geocoder: Arc<dyn ReverseGeocoder>,
    primary: Arc<dyn NetworkLocator>,
    backup: Arc<dyn NetworkLocator>,
    options: PositionOptions,
}

impl LocationResolver {
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        primary: Arc<dyn NetworkLocator>,
        backup: Arc<dyn NetworkLocator>,
    ) -> Self {
        Self {
            geocoder,
            primary,
            backup,
            options: PositionOptions::default(),
        }
    }

    /// Nominatim for reverse lookups, ipapi.co with ipinfo.io as backup
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = http_client(config.lookup_timeout)?;

        Ok(Self::new(
            Arc::new(NominatimGeocoder::new(client.clone(), &config.nominatim_url)),
            Arc::new(IpapiLocator::new(client.clone(), &config.ipapi_url)),
            Arc::new(IpinfoLocator::new(client, &config.ipinfo_url)),
        ))
    }

    /// Resolves the location of one scanning client
    ///
    /// # Arguments
    ///
    /// * `device` - on-device positioning, tried first
    /// * `client_ip` - network address for the provider fallback
    ///
    /// # Returns
    ///
    /// A fuzzed `LocationResult`. Never fails: when nothing works the
    /// `(0, 0)` sentinel tagged `LocationSource::Unknown` is returned with
    /// an error message.
    pub async fn resolve(
        &self,
        device: &dyn DevicePositioning,
        client_ip: Option<IpAddr>,
    ) -> LocationResult {
        match self.device_location(device).await {
            Ok(location) => return apply_fuzzing(location),
            Err(e) => debug!("Device positioning failed ({}), trying network estimation", e),
        }

        match self.network_location(client_ip).await {
            Ok(estimate) => apply_fuzzing(LocationResult::located(
                estimate.coordinates,
                estimate.place,
                LocationSource::Network,
            )),
            Err(e) => {
                debug!("Network estimation failed: {}", e);
                LocationResult::unknown("Unable to determine location")
            }
        }
    }

    async fn device_location(
        &self,
        device: &dyn DevicePositioning,
    ) -> Result<LocationResult, PositionError> {
        let coordinates =
            tokio::time::timeout(DEVICE_SAFETY_TIMEOUT, device.current_position(&self.options))
                .await
                .map_err(|_| PositionError::Timeout)??;

        let place = match self.geocoder.reverse(coordinates).await {
            Ok(place) => place,
            Err(e) => {
                warn!("Reverse geocoding failed, keeping bare coordinates: {}", e);
                Default::default()
            }
        };

        Ok(LocationResult::located(
            coordinates,
            place,
            LocationSource::Device,
        ))
    }

    async fn network_location(&self, client_ip: Option<IpAddr>) -> Result<Estimate, LookupError> {
        match self.primary.locate(client_ip).await {
            Ok(estimate) if estimate.is_usable() => return Ok(estimate),
            Ok(_) => debug!("{} returned no usable coordinates", self.primary.name()),
            Err(e) => warn!("{} lookup failed: {}", self.primary.name(), e),
        }

        debug!("Trying backup provider {}", self.backup.name());
        match self.backup.locate(client_ip).await {
            Ok(estimate) if estimate.is_usable() => Ok(estimate),
            Ok(_) => Err(LookupError::NoCoordinates),
            Err(e) => {
                warn!("{} lookup failed: {}", self.backup.name(), e);
                Err(e)
            }
        }
    }
}
