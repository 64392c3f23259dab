use cataloger_core::RunKind;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{CatalogStore, StoreError, DATE_FORMAT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: i64,
    pub server_url: String,
    pub run_date: String,
    pub start_timestamp: String,
    /// `None` while the run is in flight, or if it never finished.
    pub end_timestamp: Option<String>,
}

fn run_table(kind: RunKind) -> &'static str {
    match kind {
        RunKind::Crawl => "processing_runs",
        RunKind::Count => "count_runs",
    }
}

impl CatalogStore {
    /// Open a run dated today. Returns the new run id.
    pub fn start_run(&self, kind: RunKind, server_url: &str) -> Result<i64, StoreError> {
        let now = self.now();
        let run_date = now.date_naive().format(DATE_FORMAT).to_string();
        let conn = self.lock();
        conn.execute(
            &format!(
                "INSERT INTO {} (server_url, run_date, start_timestamp) VALUES (?1, ?2, ?3)",
                run_table(kind)
            ),
            params![server_url, run_date, now.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn end_run(&self, kind: RunKind, run_id: i64) -> Result<(), StoreError> {
        let now = self.timestamp();
        let conn = self.lock();
        let updated = conn.execute(
            &format!(
                "UPDATE {} SET end_timestamp = ?1 WHERE run_id = ?2",
                run_table(kind)
            ),
            params![now, run_id],
        )?;
        if updated == 0 {
            return Err(StoreError::MissingRun(run_id));
        }
        Ok(())
    }

    /// Most recent run date for a server, finished or not.
    pub fn last_run_date(
        &self,
        kind: RunKind,
        server_url: &str,
    ) -> Result<Option<NaiveDate>, StoreError> {
        let conn = self.lock();
        let last: Option<String> = conn
            .query_row(
                &format!(
                    "SELECT run_date FROM {} WHERE server_url = ?1 ORDER BY run_date DESC LIMIT 1",
                    run_table(kind)
                ),
                params![server_url],
                |row| row.get(0),
            )
            .optional()?;
        let Some(value) = last else {
            return Ok(None);
        };
        match NaiveDate::parse_from_str(&value, DATE_FORMAT) {
            Ok(date) => Ok(Some(date)),
            Err(_) => Err(StoreError::InvalidValue {
                column: "run_date",
                value,
            }),
        }
    }

    pub fn runs(&self, kind: RunKind, server_url: &str) -> Result<Vec<RunRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT run_id, server_url, run_date, start_timestamp, end_timestamp FROM {}
            WHERE server_url = ?1
            ORDER BY run_id
            "#,
            run_table(kind)
        ))?;
        let rows = stmt
            .query_map(params![server_url], |row| {
                Ok(RunRecord {
                    run_id: row.get(0)?,
                    server_url: row.get(1)?,
                    run_date: row.get(2)?,
                    start_timestamp: row.get(3)?,
                    end_timestamp: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
