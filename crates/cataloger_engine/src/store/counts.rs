use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::{to_sql_count, CatalogStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRecord {
    pub id: i64,
    pub layer_url: String,
    pub record_count: i64,
    pub timestamp: String,
    pub active: bool,
}

fn count_from_row(row: &Row<'_>) -> rusqlite::Result<CountRecord> {
    Ok(CountRecord {
        id: row.get("id")?,
        layer_url: row.get("layer_url")?,
        record_count: row.get("record_count")?,
        timestamp: row.get("timestamp")?,
        active: row.get("active")?,
    })
}

impl CatalogStore {
    /// Supersede the active count for `layer_url` with a new one. Every
    /// sample is a new version, even when the value is unchanged.
    pub fn record_count_snapshot(&self, layer_url: &str, count: u64) -> Result<(), StoreError> {
        let now = self.timestamp();
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE counts SET active = 0 WHERE layer_url = ?1 AND active = 1",
            params![layer_url],
        )?;
        tx.execute(
            r#"
            INSERT INTO counts (layer_url, record_count, timestamp, active)
            VALUES (?1, ?2, ?3, 1)
            "#,
            params![layer_url, to_sql_count(count), now],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn active_count(&self, layer_url: &str) -> Result<Option<CountRecord>, StoreError> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                r#"
                SELECT id, layer_url, record_count, timestamp, active FROM counts
                WHERE layer_url = ?1 AND active = 1
                "#,
                params![layer_url],
                count_from_row,
            )
            .optional()?)
    }

    /// Every count sample for `layer_url`, oldest first.
    pub fn count_snapshots(&self, layer_url: &str) -> Result<Vec<CountRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, layer_url, record_count, timestamp, active FROM counts
            WHERE layer_url = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![layer_url], count_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Active layers of a server that have at least one active field, with
    /// their stored metadata. Capability filtering happens in the caller.
    pub fn count_candidates(&self, server_url: &str) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT r.url, r.metadata
            FROM resources r
            WHERE r.server_url = ?1
              AND r.type = 'layer'
              AND r.active = 1
              AND EXISTS (
                  SELECT 1 FROM fields f WHERE f.resource_url = r.url AND f.active = 1
              )
            ORDER BY r.url
            "#,
        )?;
        let rows = stmt
            .query_map(params![server_url], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
