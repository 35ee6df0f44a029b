//! Application configuration for marketfeed.
//!
//! User config lives at `~/.marketfeed/marketfeed.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MarketFeedError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "marketfeed.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".marketfeed";

// ---------------------------------------------------------------------------
// Config structs (matching marketfeed.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Batch file acceptance policies.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Remote lookup endpoint base URLs.
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[upload]` section — which batch files are accepted and how lines split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Allowed line separators, checked in order (first match wins).
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,

    /// Allowed content types for uploaded batch files.
    #[serde(default = "default_content_types")]
    pub content_types: Vec<String>,

    /// Required input encoding.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            separators: default_separators(),
            content_types: default_content_types(),
            encoding: default_encoding(),
        }
    }
}

fn default_separators() -> Vec<String> {
    vec![",".into()]
}
fn default_content_types() -> Vec<String> {
    vec!["text/csv".into(), "text/plain".into()]
}
fn default_encoding() -> String {
    "utf-8".into()
}

impl UploadConfig {
    /// Return the first configured separator contained in `line`, if any.
    pub fn allowed_separator<'a>(&'a self, line: &str) -> Option<&'a str> {
        self.separators
            .iter()
            .map(String::as_str)
            .find(|sep| line.contains(sep))
    }

    /// Check that `value` is one of the allowed content types.
    pub fn is_allowed_content_type(&self, value: &str) -> bool {
        self.content_types.iter().any(|ct| ct == value)
    }

    /// Check that `raw` matches the configured encoding.
    /// Only `utf-8` is supported; anything else rejects all input.
    pub fn is_allowed_encoding(&self, raw: &[u8]) -> bool {
        self.encoding.eq_ignore_ascii_case("utf-8") && std::str::from_utf8(raw).is_ok()
    }
}

/// `[endpoints]` section — base URLs for the four remote lookups.
/// The relevant identifier is appended as the path suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Item-by-id (primary lookup).
    #[serde(default = "default_items_endpoint")]
    pub items: String,

    /// Seller-by-id.
    #[serde(default = "default_sellers_endpoint")]
    pub sellers: String,

    /// Category-by-id.
    #[serde(default = "default_categories_endpoint")]
    pub categories: String,

    /// Currency-by-id.
    #[serde(default = "default_currencies_endpoint")]
    pub currencies: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            items: default_items_endpoint(),
            sellers: default_sellers_endpoint(),
            categories: default_categories_endpoint(),
            currencies: default_currencies_endpoint(),
        }
    }
}

fn default_items_endpoint() -> String {
    "https://api.mercadolibre.com/items/".into()
}
fn default_sellers_endpoint() -> String {
    "https://api.mercadolibre.com/users/".into()
}
fn default_categories_endpoint() -> String {
    "https://api.mercadolibre.com/categories/".into()
}
fn default_currencies_endpoint() -> String {
    "https://api.mercadolibre.com/currencies/".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the local database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.marketfeed/marketfeed.db".into()
}

impl StorageConfig {
    /// Resolve the db path, expanding a leading `~/` against the home dir.
    pub fn resolved_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.marketfeed/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MarketFeedError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.marketfeed/marketfeed.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MarketFeedError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MarketFeedError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MarketFeedError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MarketFeedError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MarketFeedError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("separators"));
        assert!(toml_str.contains("api.mercadolibre.com"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.upload.separators, vec![","]);
        assert_eq!(parsed.upload.encoding, "utf-8");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[upload]
separators = [";", "|"]

[endpoints]
items = "http://localhost:9000/items/"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.upload.separators, vec![";", "|"]);
        // Unset fields fall back
        assert_eq!(config.upload.encoding, "utf-8");
        assert_eq!(config.endpoints.items, "http://localhost:9000/items/");
        assert!(config.endpoints.sellers.contains("mercadolibre"));
    }

    #[test]
    fn separator_first_match_wins() {
        let upload = UploadConfig {
            separators: vec![";".into(), ",".into()],
            ..Default::default()
        };
        // Line contains both; the first configured separator wins.
        assert_eq!(upload.allowed_separator("MLA1;rest,tail"), Some(";"));
        assert_eq!(upload.allowed_separator("MLA1,rest"), Some(","));
        assert_eq!(upload.allowed_separator("MLA1|rest"), None);
    }

    #[test]
    fn content_type_allow_list() {
        let upload = UploadConfig::default();
        assert!(upload.is_allowed_content_type("text/csv"));
        assert!(!upload.is_allowed_content_type("application/pdf"));
    }

    #[test]
    fn encoding_check() {
        let upload = UploadConfig::default();
        assert!(upload.is_allowed_encoding("header\nMLA1,rest".as_bytes()));
        assert!(!upload.is_allowed_encoding(&[0xff, 0xfe, 0x00]));

        let latin = UploadConfig {
            encoding: "latin-1".into(),
            ..Default::default()
        };
        assert!(!latin.is_allowed_encoding(b"anything"));
    }
}
