//! Document store for code records
//!
//! Records live in an embedded redb database as JSON documents, with two
//! secondary index tables for lookups by short code and by owner.

use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::config::Config;
use crate::error::StoreError;
use crate::location::LocationResolver;
use crate::model::{CodeRecord, ScanEvent};

/// Main table for storing code records
///
/// Key: record id (UUID)
/// Value: JSON-serialized CodeRecord
pub const TABLE_CODES: TableDefinition<&str, &str> = TableDefinition::new("codes_v1");

/// Unique index from short code to record id
///
/// Key: 6-character code, e.g. "ab12cd"
/// Value: record id
pub const TABLE_CODE_INDEX: TableDefinition<&str, &str> = TableDefinition::new("code_index_v1");

/// Index for listing the codes of one owner
///
/// Key: "{created_by}:{created_at:020}:{id}"
/// Value: record id
///
/// The zero-padded timestamp keeps one owner's entries in creation order.
pub const TABLE_OWNER_INDEX: TableDefinition<&str, &str> = TableDefinition::new("owner_index_v1");

/// Initializes the embedded database and creates required tables
///
/// # Example
///
/// ```no_run
/// # use thankyou_qr::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_CODES)?;
        write_txn.open_table(TABLE_CODE_INDEX)?;
        write_txn.open_table(TABLE_OWNER_INDEX)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Operations the service needs from a document store
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Point read by record id
    async fn get(&self, id: &str) -> Result<Option<CodeRecord>, StoreError>;

    /// Creates a new record; fails with `Conflict` if the id or code is taken
    async fn create(&self, record: &CodeRecord) -> Result<(), StoreError>;

    /// Lookup through the unique code index
    async fn find_by_code(&self, code: &str) -> Result<Option<CodeRecord>, StoreError>;

    /// All records created by `owner`, oldest first
    async fn find_by_owner(&self, owner: &str) -> Result<Vec<CodeRecord>, StoreError>;

    /// Every record in the store
    async fn list(&self) -> Result<Vec<CodeRecord>, StoreError>;

    /// Appends `scan` to the record's scan list and, when `count_visitor`
    /// is set, increments its `scanCount`, both in one write.
    ///
    /// # Arguments
    ///
    /// * `id` - record id
    /// * `scan` - the new event, already timestamped
    /// * `count_visitor` - whether the scan counts as a new visitor
    /// * `duplicate_window_ms` - an event repeating a stored one within
    ///   this window (see [`ScanEvent::repeats`]) is not written
    ///
    /// # Returns
    ///
    /// The [`AppendOutcome`]; nothing is written unless it is `Appended`.
    async fn append_scan(
        &self,
        id: &str,
        scan: &ScanEvent,
        count_visitor: bool,
        duplicate_window_ms: i64,
    ) -> Result<AppendOutcome, StoreError>;
}

/// What `append_scan` did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// A stored event already covers this one
    Duplicate,
    NotFound,
}

/// `CodeStore` backed by redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn read_record(&self, id: &str) -> Result<Option<String>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_CODES)?;
        Ok(table.get(id)?.map(|guard| guard.value().to_string()))
    }

    fn lookup_code(&self, code: &str) -> Result<Option<String>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TABLE_CODE_INDEX)?;
        let Some(id) = index.get(code)?.map(|guard| guard.value().to_string()) else {
            return Ok(None);
        };
        let table = read_txn.open_table(TABLE_CODES)?;
        Ok(table.get(id.as_str())?.map(|guard| guard.value().to_string()))
    }

    fn owner_records(&self, owner: &str) -> Result<Vec<String>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TABLE_OWNER_INDEX)?;
        let table = read_txn.open_table(TABLE_CODES)?;

        // ';' sorts right after ':', bounding the owner's key range
        let start_key = format!("{}:", owner);
        let end_key = format!("{};", owner);

        let mut records = Vec::new();
        for entry in index.range(start_key.as_str()..end_key.as_str())? {
            let (_, id) = entry?;
            if let Some(json) = table.get(id.value())? {
                records.push(json.value().to_string());
            }
        }
        Ok(records)
    }

    fn all_records(&self) -> Result<Vec<String>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_CODES)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, json) = entry?;
            records.push(json.value().to_string());
        }
        Ok(records)
    }

    fn insert_record(&self, record: &CodeRecord, json: &str) -> Result<bool, redb::Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_CODES)?;
            let mut code_index = write_txn.open_table(TABLE_CODE_INDEX)?;

            if table.get(record.id.as_str())?.is_some()
                || code_index.get(record.code.as_str())?.is_some()
            {
                // Dropping the transaction aborts it
                return Ok(false);
            }

            table.insert(record.id.as_str(), json)?;
            code_index.insert(record.code.as_str(), record.id.as_str())?;

            if let Some(owner) = &record.created_by {
                let key = owner_key(owner, record.created_at, &record.id);
                let mut owner_index = write_txn.open_table(TABLE_OWNER_INDEX)?;
                owner_index.insert(key.as_str(), record.id.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Duplicate check, append and counter increment in one write
    /// transaction, so concurrent double submissions cannot both land.
    fn update_with_scan(
        &self,
        id: &str,
        scan: &ScanEvent,
        count_visitor: bool,
        duplicate_window_ms: i64,
    ) -> Result<AppendOutcome, StoreError> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = write_txn
                .open_table(TABLE_CODES)
                .map_err(redb::Error::from)?;
            let Some(json) = table
                .get(id)
                .map_err(redb::Error::from)?
                .map(|guard| guard.value().to_string())
            else {
                return Ok(AppendOutcome::NotFound);
            };

            let mut record = decode(&json)?;
            if record
                .scans
                .iter()
                .any(|existing| scan.repeats(existing, duplicate_window_ms))
            {
                // Dropping the transaction aborts it
                return Ok(AppendOutcome::Duplicate);
            }

            record.scans.push(scan.clone());
            if count_visitor {
                record.scan_count += 1;
            }

            let updated = serde_json::to_string(&record)?;
            table
                .insert(id, updated.as_str())
                .map_err(redb::Error::from)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(AppendOutcome::Appended)
    }
}

fn owner_key(owner: &str, created_at: i64, id: &str) -> String {
    format!("{}:{:020}:{}", owner, created_at.max(0), id)
}

fn decode(json: &str) -> Result<CodeRecord, StoreError> {
    Ok(serde_json::from_str(json)?)
}

#[async_trait]
impl CodeStore for RedbStore {
    async fn get(&self, id: &str) -> Result<Option<CodeRecord>, StoreError> {
        self.read_record(id)?.as_deref().map(decode).transpose()
    }

    async fn create(&self, record: &CodeRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        if self.insert_record(record, &json)? {
            Ok(())
        } else {
            Err(StoreError::Conflict(format!(
                "record {} or code {} already exists",
                record.id, record.code
            )))
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<CodeRecord>, StoreError> {
        self.lookup_code(code)?.as_deref().map(decode).transpose()
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<CodeRecord>, StoreError> {
        let records = self
            .owner_records(owner)?
            .iter()
            .map(|json| decode(json))
            .collect::<Result<Vec<_>, _>>()?;

        // Owners containing ':' can share a key range with a shorter owner
        Ok(records
            .into_iter()
            .filter(|record| record.created_by.as_deref() == Some(owner))
            .collect())
    }

    async fn list(&self) -> Result<Vec<CodeRecord>, StoreError> {
        self.all_records()?.iter().map(|json| decode(json)).collect()
    }

    async fn append_scan(
        &self,
        id: &str,
        scan: &ScanEvent,
        count_visitor: bool,
        duplicate_window_ms: i64,
    ) -> Result<AppendOutcome, StoreError> {
        self.update_with_scan(id, scan, count_visitor, duplicate_window_ms)
    }
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CodeStore>,
    pub locator: Arc<LocationResolver>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn CodeStore>, locator: LocationResolver, config: Config) -> Self {
        Self {
            store,
            locator: Arc::new(locator),
            config: Arc::new(config),
        }
    }
}
