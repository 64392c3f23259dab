//! Versioned catalog store over SQLite.
//!
//! Resources, fields and counts keep their full history: each key has at most
//! one `active = 1` row, and a changed value end-dates the active row before a
//! new one is inserted. Every read-compare-write sequence runs inside an
//! immediate transaction on a connection guarded by a mutex, and partial
//! unique indexes reject a second active row should anything bypass that.

mod counts;
mod fields;
mod resources;
mod runs;
mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::Clock;

pub use counts::CountRecord;
pub use fields::{DomainEntry, FieldRecord};
pub use resources::{NewResource, ResourceRecord};
pub use runs::RunRecord;

/// Format of `run_date` columns.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run {0} does not exist")]
    MissingRun(i64),
    #[error("invalid stored value {value:?} in {column}")]
    InvalidValue { column: &'static str, value: String },
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub url: String,
    pub short_name: Option<String>,
    pub description: Option<String>,
}

pub struct CatalogStore {
    conn: Mutex<Connection>,
    clock: Clock,
}

impl CatalogStore {
    /// Open (or create) the catalog database at `path`.
    pub fn open(path: &Path, clock: Clock) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 30000;
        "#,
        )?;
        Self::from_connection(conn, clock)
    }

    pub fn open_in_memory(clock: Clock) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, clock)
    }

    fn from_connection(conn: Connection, clock: Clock) -> Result<Self, StoreError> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    pub fn now(&self) -> DateTime<Local> {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub(crate) fn timestamp(&self) -> String {
        self.now().to_rfc3339()
    }

    // A panic while holding the lock cannot leave a transaction half-applied
    // (it rolls back on drop), so a poisoned connection is still usable.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a server entry.
    pub fn register_server(
        &self,
        url: &str,
        short_name: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO servers (url, short_name, description)
            VALUES (?1, ?2, ?3)
            "#,
            params![url, short_name, description],
        )?;
        Ok(())
    }

    pub fn server(&self, url: &str) -> Result<Option<ServerRecord>, StoreError> {
        let conn = self.lock();
        let record = conn
            .query_row(
                "SELECT url, short_name, description FROM servers WHERE url = ?1",
                params![url],
                |row| {
                    Ok(ServerRecord {
                        url: row.get(0)?,
                        short_name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

/// Run synchronous store work on tokio's blocking pool.
pub(crate) async fn blocking<T, F>(op: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op).await?
}

pub(crate) fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
