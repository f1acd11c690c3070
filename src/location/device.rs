//! On-device positioning

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::Coordinates;
use crate::model::ScanRequest;

/// Options handed to the device, mirroring the browser geolocation API
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub timeout: Duration,
    pub high_accuracy: bool,
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            high_accuracy: false,
            maximum_age: Duration::from_secs(60),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("Geolocation is not supported by this client")]
    Unsupported,
    #[error("Geolocation request timed out")]
    Timeout,
    #[error("{0}")]
    Failed(String),
    #[error("Reported position is not a valid coordinate")]
    Invalid,
}

/// Permission-gated precise positioning
#[async_trait]
pub trait DevicePositioning: Send + Sync {
    async fn current_position(&self, options: &PositionOptions)
        -> Result<Coordinates, PositionError>;
}

/// The outcome of the browser's own geolocation request, as sent with a scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportedPosition {
    position: Option<Coordinates>,
    error: Option<String>,
}

impl ReportedPosition {
    pub fn new(position: Option<Coordinates>, error: Option<String>) -> Self {
        Self { position, error }
    }

    pub fn from_request(request: &ScanRequest) -> Self {
        Self {
            position: request.position.map(|p| Coordinates {
                latitude: p.latitude,
                longitude: p.longitude,
            }),
            error: request.position_error.clone(),
        }
    }
}

#[async_trait]
impl DevicePositioning for ReportedPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, PositionError> {
        match (&self.position, &self.error) {
            (Some(position), _) if position.is_valid() => Ok(*position),
            (Some(_), _) => Err(PositionError::Invalid),
            (None, Some(error)) if !error.is_empty() => Err(PositionError::Failed(error.clone())),
            (None, _) => Err(PositionError::Unsupported),
        }
    }
}
