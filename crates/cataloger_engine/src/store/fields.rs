use cataloger_core::{CodedValue, FieldSpec};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::{CatalogStore, StoreError};
use crate::VersionChange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRecord {
    pub id: i64,
    pub resource_url: String,
    pub field_name: String,
    pub field_type: Option<String>,
    pub alias: Option<String>,
    pub start_timestamp: String,
    pub end_timestamp: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub resource_url: String,
    pub field_name: String,
    pub domain_code: Option<String>,
    pub domain_value: Option<String>,
}

const FIELD_COLUMNS: &str =
    "id, resource_url, field_name, field_type, alias, start_timestamp, end_timestamp, active";

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<FieldRecord> {
    Ok(FieldRecord {
        id: row.get("id")?,
        resource_url: row.get("resource_url")?,
        field_name: row.get("field_name")?,
        field_type: row.get("field_type")?,
        alias: row.get("alias")?,
        start_timestamp: row.get("start_timestamp")?,
        end_timestamp: row.get("end_timestamp")?,
        active: row.get("active")?,
    })
}

impl CatalogStore {
    /// Version a field independently of its siblings and its owning resource,
    /// comparing `(field_type, alias)`.
    pub fn upsert_field(
        &self,
        resource_url: &str,
        field: &FieldSpec,
    ) -> Result<VersionChange, StoreError> {
        let now = self.timestamp();

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        type Current = (i64, Option<String>, Option<String>);
        let current: Option<Current> = tx
            .query_row(
                r#"
                SELECT id, field_type, alias FROM fields
                WHERE resource_url = ?1 AND field_name = ?2 AND active = 1
                "#,
                params![resource_url, field.name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let change = match current {
            Some((_, field_type, alias)) if field_type == field.field_type && alias == field.alias => {
                VersionChange::Unchanged
            }
            Some((id, _, _)) => {
                tx.execute(
                    "UPDATE fields SET end_timestamp = ?1, active = 0 WHERE id = ?2",
                    params![now, id],
                )?;
                VersionChange::Superseded
            }
            None => VersionChange::Inserted,
        };

        if change != VersionChange::Unchanged {
            tx.execute(
                r#"
                INSERT INTO fields (
                    resource_url, field_name, field_type, alias,
                    start_timestamp, end_timestamp, active
                )
                VALUES (?1, ?2, ?3, ?4, ?5, NULL, 1)
                "#,
                params![resource_url, field.name, field.field_type, field.alias, now],
            )?;
        }

        tx.commit()?;
        Ok(change)
    }

    /// Append one row per coded value. No deduplication: reprocessing an
    /// unchanged field appends the same pairs again.
    pub fn record_domain_entries(
        &self,
        resource_url: &str,
        field_name: &str,
        values: &[CodedValue],
    ) -> Result<usize, StoreError> {
        if values.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO domains (resource_url, field_name, domain_code, domain_value)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for value in values {
                stmt.execute(params![resource_url, field_name, value.code, value.value])?;
            }
        }
        tx.commit()?;
        Ok(values.len())
    }

    pub fn active_fields(&self, resource_url: &str) -> Result<Vec<FieldRecord>, StoreError> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE resource_url = ?1 AND active = 1 ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![resource_url], field_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Every version of one field, oldest first.
    pub fn field_versions(
        &self,
        resource_url: &str,
        field_name: &str,
    ) -> Result<Vec<FieldRecord>, StoreError> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE resource_url = ?1 AND field_name = ?2 ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![resource_url, field_name], field_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn domain_entries(
        &self,
        resource_url: &str,
        field_name: &str,
    ) -> Result<Vec<DomainEntry>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT resource_url, field_name, domain_code, domain_value FROM domains
            WHERE resource_url = ?1 AND field_name = ?2
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![resource_url, field_name], |row| {
                Ok(DomainEntry {
                    resource_url: row.get(0)?,
                    field_name: row.get(1)?,
                    domain_code: row.get(2)?,
                    domain_value: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Total rows, active or not, in `fields`.
    pub fn field_row_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fields", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
