//! End-to-end batch enrichment pipeline: bytes → identifiers → records → storage.
//!
//! Failure contract:
//! - a validation failure (bad encoding, bad separator) aborts the batch
//!   before or at the offending line, and nothing after it is processed;
//! - a lookup failure skips that one identifier and the batch continues;
//! - a persistence failure aborts the batch immediately.

use std::time::Instant;

use tracing::{info, instrument, warn};

use marketfeed_lookup::ItemLookup;
use marketfeed_shared::{AppConfig, BatchId, BatchReport, MarketFeedError, Result, UploadConfig};
use marketfeed_storage::Storage;

use crate::reader::IdentifierReader;
use crate::traits::{ProgressReporter, RecordSink, RecordSource};

/// Run one batch over `raw`, enriching each identifier via `source` and
/// persisting completed records via `sink`.
///
/// Identifiers are processed sequentially, each to completion (including
/// persistence) before the next is considered; concurrency is fan-out
/// inside one identifier's aggregation, never across identifiers.
#[instrument(skip_all, fields(batch_id = %batch_id))]
pub async fn run_batch<S, P>(
    batch_id: BatchId,
    raw: &[u8],
    upload: &UploadConfig,
    source: &S,
    sink: &P,
    progress: &dyn ProgressReporter,
) -> Result<BatchReport>
where
    S: RecordSource,
    P: RecordSink,
{
    let start = Instant::now();

    progress.phase("Validating input");
    if !upload.is_allowed_encoding(raw) {
        return Err(MarketFeedError::validation(format!(
            "file content does not match required encoding `{}`",
            upload.encoding
        )));
    }
    // Lossless: the encoding gate above guarantees valid UTF-8.
    let text = String::from_utf8_lossy(raw);

    let mut records_saved: usize = 0;
    let mut items_skipped: usize = 0;
    let mut errors: Vec<(String, String)> = Vec::new();

    progress.phase("Enriching items");
    for (idx, entry) in IdentifierReader::new(&text, upload).enumerate() {
        // A reader error is a separator violation: fatal, stop here.
        let identifier = entry?;

        match source.fetch_record(&identifier).await {
            Ok(record) => {
                // A failed save is fatal to the batch, unlike a failed fetch.
                sink.save(&record).await?;
                records_saved += 1;
                progress.item_done(&identifier, idx + 1);
            }
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "lookup failed, skipping item");
                items_skipped += 1;
                errors.push((identifier, e.to_string()));
            }
        }
    }

    let report = BatchReport {
        batch_id,
        records_saved,
        items_skipped,
        errors,
        duration: start.elapsed(),
    };

    info!(
        records_saved = report.records_saved,
        items_skipped = report.items_skipped,
        duration_ms = report.duration.as_millis(),
        "batch complete"
    );

    progress.done(&report);
    Ok(report)
}

/// Run the full ingest workflow: open storage, record a batch job, build
/// the lookup client, run the batch, and persist the job outcome.
///
/// This is the composition boundary where the concrete collaborators are
/// constructed. The returned report — and the updated `batch_jobs` row —
/// are the batch's completion channel.
#[instrument(skip_all, fields(source = %source_name))]
pub async fn run_ingest(
    config: &AppConfig,
    source_name: &str,
    raw: &[u8],
    progress: &dyn ProgressReporter,
) -> Result<BatchReport> {
    let db_path = config.storage.resolved_db_path();
    let storage = Storage::open(&db_path).await?;
    let lookup = ItemLookup::new(config.endpoints.clone())?;

    let job_id = storage.insert_batch_job(source_name).await?;
    let batch_id: BatchId = job_id
        .parse()
        .map_err(|e| MarketFeedError::Storage(format!("invalid job id {job_id}: {e}")))?;

    info!(%batch_id, "starting ingest");

    let result = run_batch(batch_id, raw, &config.upload, &lookup, &storage, progress).await;

    let stats = match &result {
        Ok(report) => serde_json::json!({
            "status": if report.errors.is_empty() { "completed" } else { "completed_with_skips" },
            "records_saved": report.records_saved,
            "items_skipped": report.items_skipped,
            "errors": report.errors.len(),
        }),
        Err(e) => serde_json::json!({
            "status": "failed",
            "error": e.to_string(),
        }),
    };

    // Record the outcome even when the batch failed; the job row is the
    // out-of-band channel for fatal errors.
    if let Err(e) = storage.update_batch_job(&job_id, &stats.to_string()).await {
        warn!(%job_id, error = %e, "failed to record batch job outcome");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SilentProgress;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};
    use marketfeed_shared::{ItemRecord, LookupEndpoint};

    fn record(price: f64, nickname: &str) -> ItemRecord {
        ItemRecord {
            price,
            created_at: Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap(),
            category_id: "C1".into(),
            currency_id: "USD".into(),
            seller_id: 5,
            category_name: "Cat1".into(),
            currency_description: "US Dollar".into(),
            seller_nickname: nickname.into(),
        }
    }

    /// Source backed by a map; missing identifiers fail like remote 404s.
    /// Counts every fetch attempt.
    struct MapSource {
        records: HashMap<String, ItemRecord>,
        fetches: AtomicUsize,
    }

    impl MapSource {
        fn new(entries: Vec<(&str, ItemRecord)>) -> Self {
            Self {
                records: entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl RecordSource for MapSource {
        async fn fetch_record(&self, item_id: &str) -> Result<ItemRecord> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.records
                .get(item_id)
                .cloned()
                .ok_or_else(|| MarketFeedError::fetch(LookupEndpoint::Item, "HTTP 404"))
        }
    }

    /// Sink collecting saved records; optionally fails from the nth save on.
    struct VecSink {
        saved: Mutex<Vec<ItemRecord>>,
        fail_from: Option<usize>,
    }

    impl VecSink {
        fn new() -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                fail_from: None,
            }
        }

        fn failing_from(n: usize) -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                fail_from: Some(n),
            }
        }

        fn saved_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    impl RecordSink for VecSink {
        async fn save(&self, record: &ItemRecord) -> Result<()> {
            let mut saved = self.saved.lock().unwrap();
            if let Some(n) = self.fail_from {
                if saved.len() >= n {
                    return Err(MarketFeedError::Storage("insert failed".into()));
                }
            }
            saved.push(record.clone());
            Ok(())
        }
    }

    fn upload() -> UploadConfig {
        UploadConfig {
            separators: vec![",".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn saves_every_enriched_identifier() {
        let source = MapSource::new(vec![
            ("MLA1", record(10.0, "Seller1")),
            ("MLA2", record(20.0, "Seller2")),
        ]);
        let sink = VecSink::new();
        let raw = b"header\nMLA1,\nMLA2,";

        let report = run_batch(
            BatchId::new(),
            raw,
            &upload(),
            &source,
            &sink,
            &SilentProgress,
        )
        .await
        .expect("batch succeeds");

        assert_eq!(report.records_saved, 2);
        assert_eq!(report.items_skipped, 0);
        assert_eq!(sink.saved_count(), 2);

        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved[0].seller_nickname, "Seller1");
        assert_eq!(saved[1].seller_nickname, "Seller2");
    }

    #[tokio::test]
    async fn separator_violation_is_fatal_and_stops_processing() {
        let source = MapSource::new(vec![
            ("MLA1", record(10.0, "Seller1")),
            ("MLA2", record(20.0, "Seller2")),
        ]);
        let sink = VecSink::new();
        let raw = b"header\nMLA1|bad\nMLA2,";

        let err = run_batch(
            BatchId::new(),
            raw,
            &upload(),
            &source,
            &sink,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MarketFeedError::Validation { .. }));
        assert!(err.to_string().contains("MLA1|bad"));
        // Nothing fetched, nothing persisted.
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(sink.saved_count(), 0);
    }

    #[tokio::test]
    async fn lookup_failure_skips_item_but_batch_continues() {
        // MLA2 is unknown to the source and will fail its lookup.
        let source = MapSource::new(vec![
            ("MLA1", record(10.0, "Seller1")),
            ("MLA3", record(30.0, "Seller3")),
        ]);
        let sink = VecSink::new();
        let raw = b"header\nMLA1,\nMLA2,\nMLA3,";

        let report = run_batch(
            BatchId::new(),
            raw,
            &upload(),
            &source,
            &sink,
            &SilentProgress,
        )
        .await
        .expect("skips are not fatal");

        assert_eq!(report.records_saved, 2);
        assert_eq!(report.items_skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, "MLA2");
        assert_eq!(sink.saved_count(), 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistence_failure_halts_the_batch() {
        let source = MapSource::new(vec![
            ("MLA1", record(10.0, "Seller1")),
            ("MLA2", record(20.0, "Seller2")),
            ("MLA3", record(30.0, "Seller3")),
        ]);
        // First save succeeds, second fails.
        let sink = VecSink::failing_from(1);
        let raw = b"header\nMLA1,\nMLA2,\nMLA3,";

        let err = run_batch(
            BatchId::new(),
            raw,
            &upload(),
            &source,
            &sink,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MarketFeedError::Storage(_)));
        // MLA3 was never fetched: the batch stopped at the failed save.
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(sink.saved_count(), 1);
    }

    #[tokio::test]
    async fn header_only_batch_is_an_empty_success() {
        let source = MapSource::new(vec![]);
        let sink = VecSink::new();

        let report = run_batch(
            BatchId::new(),
            b"header\n",
            &upload(),
            &source,
            &sink,
            &SilentProgress,
        )
        .await
        .expect("empty batch is not an error");

        assert_eq!(report.records_saved, 0);
        assert_eq!(report.items_skipped, 0);
    }

    #[tokio::test]
    async fn invalid_encoding_is_fatal_before_any_line() {
        let source = MapSource::new(vec![("MLA1", record(10.0, "Seller1"))]);
        let sink = VecSink::new();

        let err = run_batch(
            BatchId::new(),
            &[0xff, 0xfe, b'x'],
            &upload(),
            &source,
            &sink,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MarketFeedError::Validation { .. }));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    // -----------------------------------------------------------------------
    // End-to-end: mock endpoints + real storage
    // -----------------------------------------------------------------------

    async fn mock_endpoints() -> (wiremock::MockServer, marketfeed_shared::EndpointConfig) {
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items/MLA1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "price": 10.0,
                "date_created": "2021-06-01T12:00:00Z",
                "category_id": "C1",
                "currency_id": "USD",
                "seller_id": 5
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/5"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"nickname": "Seller1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/categories/C1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Cat1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/currencies/USD"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"description": "US Dollar"})),
            )
            .mount(&server)
            .await;

        let base = server.uri();
        let endpoints = marketfeed_shared::EndpointConfig {
            items: format!("{base}/items/"),
            sellers: format!("{base}/users/"),
            categories: format!("{base}/categories/"),
            currencies: format!("{base}/currencies/"),
        };
        (server, endpoints)
    }

    #[tokio::test]
    async fn ingest_end_to_end_persists_one_merged_record() {
        let (_server, endpoints) = mock_endpoints().await;

        let db_path = std::env::temp_dir().join(format!(
            "mf_ingest_test_{}.db",
            uuid::Uuid::now_v7()
        ));
        let config = AppConfig {
            endpoints,
            storage: marketfeed_shared::StorageConfig {
                db_path: db_path.to_string_lossy().into_owned(),
            },
            ..Default::default()
        };

        let report = run_ingest(&config, "items.csv", b"header\nMLA1,", &SilentProgress)
            .await
            .expect("ingest succeeds");

        assert_eq!(report.records_saved, 1);
        assert_eq!(report.items_skipped, 0);

        let storage = Storage::open(&db_path).await.unwrap();
        let items = storage.list_items(10).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, 10.0);
        assert_eq!(items[0].category_name, "Cat1");
        assert_eq!(items[0].currency_description, "US Dollar");
        assert_eq!(items[0].seller_nickname, "Seller1");

        let jobs = storage.list_batch_jobs(10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, report.batch_id.to_string());
        assert!(jobs[0].stats_json.as_deref().unwrap().contains("completed"));

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn ingest_records_failed_job_outcome() {
        let (_server, endpoints) = mock_endpoints().await;

        let db_path = std::env::temp_dir().join(format!(
            "mf_ingest_fail_test_{}.db",
            uuid::Uuid::now_v7()
        ));
        let config = AppConfig {
            endpoints,
            storage: marketfeed_shared::StorageConfig {
                db_path: db_path.to_string_lossy().into_owned(),
            },
            ..Default::default()
        };

        // Second line uses a separator outside the allowed set.
        let err = run_ingest(
            &config,
            "items.csv",
            b"header\nMLA1|rest",
            &SilentProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketFeedError::Validation { .. }));

        let storage = Storage::open(&db_path).await.unwrap();
        assert_eq!(storage.count_items().await.unwrap(), 0);

        let jobs = storage.list_batch_jobs(10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].stats_json.as_deref().unwrap().contains("failed"));

        let _ = std::fs::remove_file(&db_path);
    }
}
