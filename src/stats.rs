//! Aggregated scan statistics across every code

use std::collections::HashMap;

use serde::Serialize;

use crate::database::CodeStore;
use crate::error::StoreError;
use crate::model::{CodeRecord, ScanEvent};

pub const RECENT_SCANS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    City,
    Country,
}

/// Scans grouped under one city or country
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationBucket {
    pub location_name: String,
    pub location_type: LocationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub count: u64,
    /// Coordinates of the first scan seen for this bucket
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    /// Sum of unique-visitor counts
    pub total_scans: u64,
    pub unique_locations: Vec<LocationBucket>,
    pub unique_countries: Vec<LocationBucket>,
    pub recent_scans: Vec<ScanEvent>,
    pub total_qr_codes: usize,
}

/// Buckets in first-seen order
#[derive(Default)]
struct Buckets {
    index: HashMap<String, usize>,
    buckets: Vec<LocationBucket>,
}

impl Buckets {
    fn add(&mut self, key: String, scan: &ScanEvent, make: impl FnOnce() -> LocationBucket) {
        match self.index.get(&key) {
            Some(&i) => self.buckets[i].count += 1,
            None => {
                let mut bucket = make();
                bucket.count = 1;
                bucket.latitude = scan.location.latitude;
                bucket.longitude = scan.location.longitude;
                self.index.insert(key, self.buckets.len());
                self.buckets.push(bucket);
            }
        }
    }

    /// Highest count first; `sort_by` is stable so ties keep first-seen order
    fn into_sorted(mut self) -> Vec<LocationBucket> {
        self.buckets.sort_by(|a, b| b.count.cmp(&a.count));
        self.buckets
    }
}

pub fn aggregate(records: &[CodeRecord]) -> GlobalStats {
    let total_scans = records.iter().map(|r| r.scan_count).sum();

    let mut cities = Buckets::default();
    let mut countries = Buckets::default();

    for scan in records.iter().flat_map(|r| r.scans.iter()) {
        let location = &scan.location;

        if let (Some(city), Some(country)) = (&location.city, &location.country) {
            cities.add(format!("{}, {}", city, country), scan, || LocationBucket {
                location_name: city.clone(),
                location_type: LocationType::City,
                country: Some(country.clone()),
                count: 0,
                latitude: 0.0,
                longitude: 0.0,
            });
        }

        if let Some(country) = &location.country {
            countries.add(country.clone(), scan, || LocationBucket {
                location_name: country.clone(),
                location_type: LocationType::Country,
                country: None,
                count: 0,
                latitude: 0.0,
                longitude: 0.0,
            });
        }
    }

    let mut recent_scans: Vec<ScanEvent> = records
        .iter()
        .flat_map(|r| r.scans.iter().cloned())
        .collect();
    recent_scans.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent_scans.truncate(RECENT_SCANS);

    GlobalStats {
        total_scans,
        unique_locations: cities.into_sorted(),
        unique_countries: countries.into_sorted(),
        recent_scans,
        total_qr_codes: records.len(),
    }
}

pub async fn global_stats(store: &dyn CodeStore) -> Result<GlobalStats, StoreError> {
    let records = store.list().await?;
    Ok(aggregate(&records))
}
