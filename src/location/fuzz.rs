//! Deterministic coordinate fuzzing
//!
//! Stored and displayed locations never carry the precise position. The
//! perturbation depends only on the input, so the same city always lands on
//! the same point.

use super::LocationResult;

/// Sum over the characters of the city name of each one's leading UTF-16
/// code unit
///
/// Characters outside the BMP contribute their high surrogate only.
pub fn city_hash(city: &str) -> u64 {
    let mut buf = [0u16; 2];
    city.chars()
        .map(|c| u64::from(c.encode_utf16(&mut buf)[0]))
        .sum()
}

/// Rounds to 2 decimal places, halves towards +inf
fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Fuzzes a located result; error and `(0, 0)` results pass through.
///
/// With city and country known the offset is derived from the city name
/// (`hash % 57` and `hash % 73` thousandths of a degree, each mod 0.03°).
/// With bare coordinates a small sinusoidal jitter is added instead.
pub fn apply_fuzzing(location: LocationResult) -> LocationResult {
    if location.is_unknown() {
        return location;
    }

    let (lat_offset, lng_offset) = match (&location.city, &location.country) {
        (Some(city), Some(_)) => {
            let hash = city_hash(city);
            let lat = (hash % 57) as f64 * 0.001;
            let lng = (hash % 73) as f64 * 0.001;
            (lat % 0.03, lng % 0.03)
        }
        _ => (
            (location.latitude * 10.0).sin() * 0.01,
            (location.longitude * 10.0).cos() * 0.01,
        ),
    };

    LocationResult {
        latitude: round2(location.latitude) + lat_offset,
        longitude: round2(location.longitude) + lng_offset,
        ..location
    }
}
