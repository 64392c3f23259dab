use cataloger_core::{canonical_json, Classification, DisplayInfo, ResourceType};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use serde_json::Value;

use super::{CatalogStore, StoreError};
use crate::VersionChange;

/// A node as observed by the current crawl.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub url: String,
    pub classification: Classification,
    pub parent_url: Option<String>,
    pub server_url: String,
    pub accessible: bool,
    /// Raw descriptor; compared across crawls in canonical serialization.
    pub metadata: Value,
    pub display: DisplayInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub id: i64,
    pub url: String,
    pub kind: ResourceType,
    pub subtype: Option<String>,
    pub parent_url: Option<String>,
    pub server_url: String,
    pub accessible: bool,
    pub metadata: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_timestamp: String,
    pub end_timestamp: Option<String>,
    pub active: bool,
}

impl ResourceRecord {
    pub fn metadata_value(&self) -> Result<Value, StoreError> {
        Ok(serde_json::from_str(&self.metadata)?)
    }
}

const RESOURCE_COLUMNS: &str = "id, url, type, subtype, parent_url, server_url, accessible, \
     metadata, name, description, start_timestamp, end_timestamp, active";

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceRecord> {
    let kind: String = row.get("type")?;
    Ok(ResourceRecord {
        id: row.get("id")?,
        url: row.get("url")?,
        kind: kind.parse().unwrap_or(ResourceType::Unknown),
        subtype: row.get("subtype")?,
        parent_url: row.get("parent_url")?,
        server_url: row.get("server_url")?,
        accessible: row.get("accessible")?,
        metadata: row.get("metadata")?,
        name: row.get("name")?,
        description: row.get("description")?,
        start_timestamp: row.get("start_timestamp")?,
        end_timestamp: row.get("end_timestamp")?,
        active: row.get("active")?,
    })
}

impl CatalogStore {
    /// Record `resource` under the slowly-changing-dimension discipline.
    ///
    /// Identical metadata is a no-op, including timestamps. Changed metadata
    /// end-dates the active row and inserts a new active one.
    pub fn upsert_resource(&self, resource: &NewResource) -> Result<VersionChange, StoreError> {
        let serialized = canonical_json(&resource.metadata);
        let now = self.timestamp();

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, metadata FROM resources WHERE url = ?1 AND active = 1",
                params![resource.url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let change = match current {
            Some((_, existing)) if existing == serialized => VersionChange::Unchanged,
            Some((id, _)) => {
                tx.execute(
                    "UPDATE resources SET end_timestamp = ?1, active = 0 WHERE id = ?2",
                    params![now, id],
                )?;
                VersionChange::Superseded
            }
            None => VersionChange::Inserted,
        };

        if change != VersionChange::Unchanged {
            tx.execute(
                r#"
                INSERT INTO resources (
                    url, type, subtype, parent_url, server_url, accessible, metadata,
                    name, description, start_timestamp, end_timestamp, active
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, 1)
                "#,
                params![
                    resource.url,
                    resource.classification.kind.as_str(),
                    resource.classification.subtype,
                    resource.parent_url,
                    resource.server_url,
                    resource.accessible,
                    serialized,
                    resource.display.name,
                    resource.display.description,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(change)
    }

    pub fn active_resource(&self, url: &str) -> Result<Option<ResourceRecord>, StoreError> {
        let conn = self.lock();
        let sql = format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE url = ?1 AND active = 1");
        Ok(conn
            .query_row(&sql, params![url], resource_from_row)
            .optional()?)
    }

    /// Every version of `url`, oldest first.
    pub fn resource_versions(&self, url: &str) -> Result<Vec<ResourceRecord>, StoreError> {
        let conn = self.lock();
        let sql = format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE url = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![url], resource_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn active_resources_for_server(
        &self,
        server_url: &str,
    ) -> Result<Vec<ResourceRecord>, StoreError> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE server_url = ?1 AND active = 1 ORDER BY url"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![server_url], resource_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Total rows, active or not, in `resources`.
    pub fn resource_row_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM resources", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
