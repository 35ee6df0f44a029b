//! Core batch enrichment pipeline for marketfeed.
//!
//! This crate ties together line-oriented ingestion, remote lookup
//! aggregation, and persistence into the end-to-end ingest workflow:
//! - [`reader`] — lazy identifier extraction with separator validation
//! - [`traits`] — capability seams ([`RecordSource`], [`RecordSink`])
//! - [`pipeline`] — [`run_batch`] and the [`run_ingest`] orchestrator

pub mod pipeline;
pub mod reader;
pub mod traits;

pub use pipeline::{run_batch, run_ingest};
pub use reader::IdentifierReader;
pub use traits::{ProgressReporter, RecordSink, RecordSource, SilentProgress};
