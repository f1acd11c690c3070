//! Client-side visit deduplication
//!
//! A visitor is "new" for a code when their browser holds no scanned flag
//! for it. This only recognises repeat visits from the same browser; a
//! different device or cleared cookies looks like a new visitor.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

/// Cookie holding the per-browser client id
pub const CLIENT_ID_KEY: &str = "thank_you_qr_visitor_id";
/// Prefix of the per-code scanned flag
pub const SCANNED_KEY_PREFIX: &str = "qr_scanned_";

pub const CLIENT_ID_TTL: Duration = Duration::from_secs(730 * 24 * 60 * 60);
pub const SCANNED_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const SCANNED_VALUE: &str = "true";

/// Key/value storage persisted on the client
pub trait ClientStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str, ttl: Duration);
}

/// In-process `ClientStore` with expiring entries
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, (String, Instant)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(value, _)| value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }
}

/// `ClientStore` over the cookies of one HTTP exchange
///
/// Reads come from the request's `Cookie` header; writes are collected and
/// turned into `Set-Cookie` values for the response.
#[derive(Debug, Default)]
pub struct CookieStore {
    jar: CookieJar,
    secure: bool,
}

impl CookieStore {
    /// Parses a `Cookie` request header value; malformed pairs are skipped
    pub fn from_header(header: Option<&str>, secure: bool) -> Self {
        let mut jar = CookieJar::new();
        if let Some(header) = header {
            for cookie in Cookie::split_parse(header).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }
        Self { jar, secure }
    }

    /// `Set-Cookie` values for every cookie written through this store
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.jar.delta().map(|cookie| cookie.to_string()).collect()
    }
}

impl ClientStore for CookieStore {
    fn get(&self, key: &str) -> Option<String> {
        self.jar.get(key).map(|cookie| cookie.value().to_string())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) {
        let max_age = cookie::time::Duration::seconds(ttl.as_secs() as i64);
        let cookie = Cookie::build((key.to_string(), value.to_string()))
            .path("/")
            .max_age(max_age)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build();
        self.jar.add(cookie);
    }
}

/// First-visit detection for a single client
pub struct VisitDeduplicator<S> {
    store: S,
}

impl<S: ClientStore> VisitDeduplicator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the persisted client id, creating and persisting one if absent
    pub fn get_or_create_client_id(&mut self) -> String {
        if let Some(id) = self.store.get(CLIENT_ID_KEY).filter(|id| !id.is_empty()) {
            return id;
        }

        let id = Uuid::new_v4().to_string();
        self.store.set(CLIENT_ID_KEY, &id, CLIENT_ID_TTL);
        id
    }

    /// True iff this client holds no scanned flag for `code_id`
    pub fn is_first_visit(&self, code_id: &str) -> bool {
        self.store.get(&scanned_key(code_id)).as_deref() != Some(SCANNED_VALUE)
    }

    /// Records that this client has scanned `code_id`; repeated calls
    /// refresh the expiry.
    pub fn mark_visited(&mut self, code_id: &str) {
        self.store
            .set(&scanned_key(code_id), SCANNED_VALUE, SCANNED_TTL);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

fn scanned_key(code_id: &str) -> String {
    format!("{}{}", SCANNED_KEY_PREFIX, code_id)
}
