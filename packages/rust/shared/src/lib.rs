//! Shared types, error model, and configuration for marketfeed.
//!
//! This crate is the foundation depended on by all other marketfeed crates.
//! It provides:
//! - [`MarketFeedError`] — the unified error type
//! - Domain types ([`ItemRecord`], [`BatchReport`], [`BatchId`])
//! - Configuration ([`AppConfig`], endpoint/upload policies, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EndpointConfig, StorageConfig, UploadConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{LookupEndpoint, MarketFeedError, Result};
pub use types::{BatchId, BatchReport, ItemRecord};
