//! libSQL storage layer for enriched item records.
//!
//! The [`Storage`] struct wraps a libSQL database holding the persisted
//! item records and the batch job history. Schema changes go through
//! versioned migrations applied on open.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use uuid::Uuid;

use marketfeed_shared::{ItemRecord, MarketFeedError, Result};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// A persisted item row: record plus storage metadata.
#[derive(Debug, Clone)]
pub struct StoredItem {
    /// Row identifier (UUID v7).
    pub id: String,
    /// Listing price.
    pub price: f64,
    /// When the listing was created upstream.
    pub created_at: chrono::DateTime<Utc>,
    /// Category name from enrichment.
    pub category_name: String,
    /// Currency description from enrichment.
    pub currency_description: String,
    /// Seller nickname from enrichment.
    pub seller_nickname: String,
    /// When the row was written.
    pub saved_at: chrono::DateTime<Utc>,
}

/// A batch job history row.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Job identifier.
    pub id: String,
    /// Input source description (file path or "stdin").
    pub source: String,
    /// When the job started.
    pub started_at: String,
    /// When the job finished, if it has.
    pub finished_at: Option<String>,
    /// Outcome stats as JSON, if recorded.
    pub stats_json: Option<String>,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MarketFeedError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        MarketFeedError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Item operations
    // -----------------------------------------------------------------------

    /// Insert a fully enriched record. Returns the generated row ID.
    pub async fn insert_item(&self, record: &ItemRecord) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO items (id, price, created_at, category_name, currency_description, seller_nickname, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.as_str(),
                    record.price,
                    record.created_at.to_rfc3339(),
                    record.category_name.as_str(),
                    record.currency_description.as_str(),
                    record.seller_nickname.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// List persisted items, most recent first.
    pub async fn list_items(&self, limit: u32) -> Result<Vec<StoredItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, price, created_at, category_name, currency_description, seller_nickname, saved_at
                 FROM items ORDER BY saved_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_stored_item(&row)?);
        }
        Ok(results)
    }

    /// Count persisted items.
    pub async fn count_items(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM items", params![])
            .await
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n as u64)
                .map_err(|e| MarketFeedError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(MarketFeedError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Batch job operations
    // -----------------------------------------------------------------------

    /// Insert a new batch job. Returns the generated job ID.
    pub async fn insert_batch_job(&self, source: &str) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO batch_jobs (id, source, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), source, now.as_str()],
            )
            .await
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Update a batch job with completion data.
    pub async fn update_batch_job(&self, job_id: &str, stats_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE batch_jobs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, job_id],
            )
            .await
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List batch jobs, most recent first.
    pub async fn list_batch_jobs(&self, limit: u32) -> Result<Vec<BatchJob>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source, started_at, finished_at, stats_json
                 FROM batch_jobs ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(BatchJob {
                id: row
                    .get::<String>(0)
                    .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
                source: row
                    .get::<String>(1)
                    .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
                started_at: row
                    .get::<String>(2)
                    .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
                finished_at: row.get::<String>(3).ok(),
                stats_json: row.get::<String>(4).ok(),
            });
        }
        Ok(results)
    }
}

/// Convert a database row to a [`StoredItem`].
fn row_to_stored_item(row: &libsql::Row) -> Result<StoredItem> {
    let parse_ts = |s: String| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MarketFeedError::Storage(format!("invalid date: {e}")))
    };

    Ok(StoredItem {
        id: row
            .get::<String>(0)
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
        price: row
            .get::<f64>(1)
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
        created_at: parse_ts(
            row.get::<String>(2)
                .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
        )?,
        category_name: row
            .get::<String>(3)
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
        currency_description: row
            .get::<String>(4)
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
        seller_nickname: row
            .get::<String>(5)
            .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
        saved_at: parse_ts(
            row.get::<String>(6)
                .map_err(|e| MarketFeedError::Storage(e.to_string()))?,
        )?,
    })
}
