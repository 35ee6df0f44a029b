//! Core domain types for marketfeed batch enrichment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BatchId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for batch job identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Generate a new time-sortable batch identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ItemRecord
// ---------------------------------------------------------------------------

/// The merged entity persisted per item — one row per enriched identifier.
///
/// The first five fields come from the primary item lookup; the last three
/// are populated by the seller, category, and currency lookups keyed off
/// fields the primary lookup provides. A record is only ever handed to
/// storage with all eight fields populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Listing price.
    pub price: f64,
    /// When the listing was created upstream.
    #[serde(rename = "date_created")]
    pub created_at: DateTime<Utc>,
    /// Category key, input to the category lookup.
    pub category_id: String,
    /// Currency key, input to the currency lookup.
    pub currency_id: String,
    /// Seller key, input to the seller lookup.
    pub seller_id: u64,
    /// Human-readable category name (category lookup).
    pub category_name: String,
    /// Human-readable currency description (currency lookup).
    pub currency_description: String,
    /// Seller display nickname (seller lookup).
    pub seller_nickname: String,
}

// ---------------------------------------------------------------------------
// BatchReport
// ---------------------------------------------------------------------------

/// Summary of a completed batch ingest.
///
/// The original upload flow acknowledged the caller before processing
/// finished and reported nothing afterwards; the report (plus the
/// `batch_jobs` table in storage) is the explicit completion channel.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Batch job identifier, matching the `batch_jobs` row.
    pub batch_id: BatchId,
    /// Number of records enriched and persisted.
    pub records_saved: usize,
    /// Number of identifiers skipped due to lookup failures.
    pub items_skipped: usize,
    /// Per-item lookup failures (identifier, error message).
    pub errors: Vec<(String, String)>,
    /// Total duration of the batch run.
    pub duration: std::time::Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_roundtrip() {
        let id = BatchId::new();
        let s = id.to_string();
        let parsed: BatchId = s.parse().expect("parse BatchId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn item_record_decodes_upstream_field_names() {
        // The primary lookup body uses `date_created`; our field is `created_at`.
        let json = r#"{
            "price": 10.0,
            "date_created": "2021-06-01T12:00:00Z",
            "category_id": "C1",
            "currency_id": "USD",
            "seller_id": 5,
            "category_name": "Cat1",
            "currency_description": "US Dollar",
            "seller_nickname": "Seller1"
        }"#;
        let record: ItemRecord = serde_json::from_str(json).expect("deserialize");
        assert_eq!(record.price, 10.0);
        assert_eq!(record.seller_id, 5);
        assert_eq!(record.category_name, "Cat1");
    }
}
