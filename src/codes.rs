//! Code generation and lookup

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::CodeStore;
use crate::error::{AppError, StoreError};
use crate::model::CodeRecord;

pub const CODE_LENGTH: usize = 6;
const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_ATTEMPTS: usize = 10;

/// Random 6-character lowercase alphanumeric code
pub fn generate_short_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

fn is_code_shaped(code: &str) -> bool {
    code.chars().count() == CODE_LENGTH
}

/// Creates a new code record with a unique short code
///
/// Codes are re-drawn while they collide with an existing record, giving
/// up after `MAX_ATTEMPTS`.
///
/// # Arguments
///
/// * `store` - where the record is created
/// * `created_by` - optional owner id, indexed for `codes_for_owner`
///
/// # Returns
///
/// - `Ok(record)` - the stored record, with no scans
/// - `Err(AppError::CodeSpaceExhausted)` - every drawn code was taken
/// - `Err(AppError::Store)` - the store failed
pub async fn generate_code(
    store: &dyn CodeStore,
    created_by: Option<String>,
) -> Result<CodeRecord, AppError> {
    for _ in 0..MAX_ATTEMPTS {
        let code = generate_short_code();
        if store.find_by_code(&code).await?.is_some() {
            debug!("Short code {} already taken, drawing another", code);
            continue;
        }

        let record = CodeRecord {
            id: Uuid::new_v4().to_string(),
            code,
            scan_count: 0,
            scans: Vec::new(),
            created_at: Utc::now().timestamp_millis(),
            created_by: created_by.clone(),
        };

        match store.create(&record).await {
            Ok(()) => {
                info!("Created code {} ({})", record.code, record.id);
                return Ok(record);
            }
            // Lost a race for the same code
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::CodeSpaceExhausted(MAX_ATTEMPTS))
}

/// Maps a short code to its record id
///
/// Anything that is not exactly 6 characters is rejected without touching
/// the store.
pub async fn resolve_code(store: &dyn CodeStore, code: &str) -> Result<Option<String>, StoreError> {
    if !is_code_shaped(code) {
        return Ok(None);
    }
    Ok(store.find_by_code(code).await?.map(|record| record.id))
}

/// Looks a record up by id, then by short code
pub async fn find_stats(
    store: &dyn CodeStore,
    id_or_code: &str,
) -> Result<Option<CodeRecord>, StoreError> {
    if let Some(record) = store.get(id_or_code).await? {
        return Ok(Some(record));
    }
    if is_code_shaped(id_or_code) {
        return store.find_by_code(id_or_code).await;
    }
    Ok(None)
}

/// Codes created by `owner`, newest first
pub async fn codes_for_owner(
    store: &dyn CodeStore,
    owner: &str,
) -> Result<Vec<CodeRecord>, StoreError> {
    let mut records = store.find_by_owner(owner).await?;
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
}
