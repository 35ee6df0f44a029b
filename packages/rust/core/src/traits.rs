//! Capability seams between the pipeline and its collaborators.
//!
//! The pipeline only sees these traits; the concrete HTTP client and
//! database are wired in at the composition boundary ([`run_ingest`]) and
//! swapped for in-memory fakes in tests.
//!
//! [`run_ingest`]: crate::pipeline::run_ingest

use marketfeed_lookup::ItemLookup;
use marketfeed_shared::{BatchReport, ItemRecord, Result};
use marketfeed_storage::Storage;

/// Produces one fully merged record per identifier, or a fetch error.
pub trait RecordSource {
    /// Enrich `item_id` into a complete record.
    fn fetch_record(
        &self,
        item_id: &str,
    ) -> impl Future<Output = Result<ItemRecord>> + Send;
}

/// Persists completed records.
pub trait RecordSink {
    /// Persist one record. A failure here is fatal to the batch.
    fn save(&self, record: &ItemRecord) -> impl Future<Output = Result<()>> + Send;
}

impl RecordSource for ItemLookup {
    async fn fetch_record(&self, item_id: &str) -> Result<ItemRecord> {
        ItemLookup::fetch_record(self, item_id).await
    }
}

impl RecordSink for Storage {
    async fn save(&self, record: &ItemRecord) -> Result<()> {
        self.insert_item(record).await.map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after an identifier has been enriched and persisted.
    fn item_done(&self, identifier: &str, current: usize);
    /// Called when the batch completes.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item_done(&self, _identifier: &str, _current: usize) {}
    fn done(&self, _report: &BatchReport) {}
}
