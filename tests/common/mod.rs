//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::NamedTempFile;

use thankyou_qr::config::Config;
use thankyou_qr::database::{init_db, AppState, AppendOutcome, CodeStore, RedbStore};
use thankyou_qr::error::StoreError;
use thankyou_qr::location::{
    Coordinates, Estimate, LocationResolver, LookupError, NetworkLocator, Place, ReverseGeocoder,
};
use thankyou_qr::model::{CodeRecord, ScanEvent};
use thankyou_qr::route::create_app;

/// Address the stub network provider knows about
pub const KNOWN_IP: &str = "203.0.113.7";

pub fn temp_store() -> (RedbStore, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_db.path().to_str().unwrap();
    let db = init_db(db_path).expect("Failed to initialize test database");
    (RedbStore::new(Arc::new(db)), temp_db)
}

/// Geocoder that labels every coordinate as Newark
pub struct StubGeocoder;

#[async_trait]
impl ReverseGeocoder for StubGeocoder {
    async fn reverse(&self, _coordinates: Coordinates) -> Result<Place, LookupError> {
        Ok(Place {
            city: Some("Newark".to_string()),
            country: Some("United States".to_string()),
        })
    }
}

/// Network provider that only knows `KNOWN_IP`
pub struct StubLocator {
    pub known: bool,
}

#[async_trait]
impl NetworkLocator for StubLocator {
    async fn locate(&self, ip: Option<IpAddr>) -> Result<Estimate, LookupError> {
        let ip = ip.ok_or(LookupError::NoAddress)?;
        if self.known && ip.to_string() == KNOWN_IP {
            Ok(Estimate {
                coordinates: Coordinates {
                    latitude: 38.7223,
                    longitude: -9.1393,
                },
                place: Place {
                    city: Some("Lisbon".to_string()),
                    country: Some("Portugal".to_string()),
                },
            })
        } else {
            Err(LookupError::Provider("unknown address".to_string()))
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub fn stub_resolver() -> LocationResolver {
    LocationResolver::new(
        Arc::new(StubGeocoder),
        Arc::new(StubLocator { known: true }),
        Arc::new(StubLocator { known: false }),
    )
}

pub fn test_config() -> Config {
    Config {
        public_url: "http://thanks.test".to_string(),
        ..Config::default()
    }
}

/// Creates a test application with a temporary database
pub fn setup_test_app_with(config: Config) -> (axum::Router, NamedTempFile) {
    let (store, temp_db) = temp_store();
    let state = AppState::new(Arc::new(store), stub_resolver(), config);
    (create_app(state), temp_db)
}

pub fn setup_test_app() -> (axum::Router, NamedTempFile) {
    setup_test_app_with(test_config())
}

/// Parses a response body as JSON
pub async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

/// `CodeStore` wrapper counting reads and writes
pub struct CountingStore {
    inner: RedbStore,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: RedbStore) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeStore for CountingStore {
    async fn get(&self, id: &str) -> Result<Option<CodeRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }

    async fn create(&self, record: &CodeRecord) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create(record).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<CodeRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_code(code).await
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<CodeRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_owner(owner).await
    }

    async fn list(&self) -> Result<Vec<CodeRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list().await
    }

    async fn append_scan(
        &self,
        id: &str,
        scan: &ScanEvent,
        count_visitor: bool,
        duplicate_window_ms: i64,
    ) -> Result<AppendOutcome, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner
            .append_scan(id, scan, count_visitor, duplicate_window_ms)
            .await
    }
}
