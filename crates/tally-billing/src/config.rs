//! # Counter Configuration
//!
//! Settings for one billing counter: which shop it sells for, where the
//! directory lives, how to reach the OCR service and how receipts come out.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_SHOP_ID=main                                                 │
//! │     TALLY_OCR_ENDPOINT=http://10.0.0.5:8000/ocr                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/tally-pos/tally.toml (Linux)                             │
//! │     ~/Library/Application Support/com.tally.pos/tally.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [shop]
//! id = "main"
//! name = "Corner Grocery"
//!
//! [database]
//! path = "./tally.db"
//!
//! [ocr]
//! endpoint = "http://127.0.0.1:8000/ocr"
//! timeout_secs = 20
//!
//! [resolver]
//! name_search_limit = 5
//!
//! [receipt]
//! output_dir = "./receipts"   # omit to print to the terminal
//! paper_width = 42
//! currency_symbol = "Rs "
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{BillingError, BillingResult};
use tally_core::DEFAULT_NAME_SEARCH_LIMIT;

/// Narrowest receipt the text renderer lays out sensibly.
pub const MIN_PAPER_WIDTH: usize = 24;

// =============================================================================
// Shop
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSettings {
    /// Shop whose batches this counter sells from.
    pub id: String,

    /// Display name used when the shop row has to be created.
    #[serde(default = "default_shop_name")]
    pub name: String,
}

fn default_shop_name() -> String {
    "Tally Shop".to_string()
}

impl Default for ShopSettings {
    fn default() -> Self {
        ShopSettings {
            id: "main".to_string(),
            name: default_shop_name(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:` for a throwaway directory.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "./tally.db".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

// =============================================================================
// OCR
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Full URL of the recognition endpoint.
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,

    /// Sent as a bearer token when present.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_ocr_timeout")]
    pub timeout_secs: u64,
}

fn default_ocr_endpoint() -> String {
    "http://127.0.0.1:8000/ocr".to_string()
}

fn default_ocr_timeout() -> u64 {
    20
}

impl Default for OcrSettings {
    fn default() -> Self {
        OcrSettings {
            endpoint: default_ocr_endpoint(),
            api_key: None,
            timeout_secs: default_ocr_timeout(),
        }
    }
}

impl OcrSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Resolver
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Maximum name candidates considered per scan.
    #[serde(default = "default_name_search_limit")]
    pub name_search_limit: u32,
}

fn default_name_search_limit() -> u32 {
    DEFAULT_NAME_SEARCH_LIMIT
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            name_search_limit: default_name_search_limit(),
        }
    }
}

// =============================================================================
// Receipt
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptSettings {
    /// Directory for HTML receipts. Unset means text receipts on stdout.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Characters per line for text receipts.
    #[serde(default = "default_paper_width")]
    pub paper_width: usize,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_paper_width() -> usize {
    42
}

fn default_currency_symbol() -> String {
    "Rs ".to_string()
}

impl Default for ReceiptSettings {
    fn default() -> Self {
        ReceiptSettings {
            output_dir: None,
            paper_width: default_paper_width(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete counter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub shop: ShopSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ocr: OcrSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub receipt: ReceiptSettings,
}

impl TallyConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tally.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> BillingResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| BillingError::Config(format!("{}: {}", path.display(), e)))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, config_path: Option<PathBuf>) -> BillingResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| BillingError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BillingError::Config(format!("{}: {}", parent.display(), e)))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| BillingError::Config(e.to_string()))?;
        std::fs::write(&path, contents)
            .map_err(|e| BillingError::Config(format!("{}: {}", path.display(), e)))?;

        info!(?path, "Config saved");
        Ok(path)
    }

    pub fn validate(&self) -> BillingResult<()> {
        if self.shop.id.trim().is_empty() {
            return Err(BillingError::Config("shop.id must not be empty".into()));
        }

        match url::Url::parse(&self.ocr.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(BillingError::Config(format!(
                    "ocr.endpoint must use http:// or https://, got: {}://",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(BillingError::Config(format!(
                    "ocr.endpoint is not a valid URL ({}): {}",
                    e, self.ocr.endpoint
                )))
            }
        }

        if self.ocr.timeout_secs == 0 {
            return Err(BillingError::Config(
                "ocr.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.resolver.name_search_limit == 0 {
            return Err(BillingError::Config(
                "resolver.name_search_limit must be greater than 0".into(),
            ));
        }

        if self.receipt.paper_width < MIN_PAPER_WIDTH {
            return Err(BillingError::Config(format!(
                "receipt.paper_width must be at least {}",
                MIN_PAPER_WIDTH
            )));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("TALLY_SHOP_ID") {
            debug!(shop_id = %id, "Overriding shop id from environment");
            self.shop.id = id;
        }

        if let Ok(name) = std::env::var("TALLY_SHOP_NAME") {
            self.shop.name = name;
        }

        if let Ok(path) = std::env::var("TALLY_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = path;
        }

        if let Ok(endpoint) = std::env::var("TALLY_OCR_ENDPOINT") {
            debug!(endpoint = %endpoint, "Overriding OCR endpoint from environment");
            self.ocr.endpoint = endpoint;
        }

        if let Ok(key) = std::env::var("TALLY_OCR_API_KEY") {
            self.ocr.api_key = Some(key).filter(|k| !k.is_empty());
        }

        if let Ok(timeout) = std::env::var("TALLY_OCR_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.ocr.timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring invalid TALLY_OCR_TIMEOUT_SECS"),
            }
        }

        if let Ok(limit) = std::env::var("TALLY_NAME_SEARCH_LIMIT") {
            match limit.parse::<u32>() {
                Ok(n) => self.resolver.name_search_limit = n,
                Err(_) => warn!(value = %limit, "Ignoring invalid TALLY_NAME_SEARCH_LIMIT"),
            }
        }

        if let Ok(dir) = std::env::var("TALLY_RECEIPT_DIR") {
            self.receipt.output_dir = Some(PathBuf::from(dir)).filter(|d| !d.as_os_str().is_empty());
        }

        if let Ok(width) = std::env::var("TALLY_PAPER_WIDTH") {
            match width.parse::<usize>() {
                Ok(w) => self.receipt.paper_width = w,
                Err(_) => warn!(value = %width, "Ignoring invalid TALLY_PAPER_WIDTH"),
            }
        }

        if let Ok(symbol) = std::env::var("TALLY_CURRENCY") {
            self.receipt.currency_symbol = symbol;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }

    pub fn shop_id(&self) -> &str {
        &self.shop.id
    }
}
