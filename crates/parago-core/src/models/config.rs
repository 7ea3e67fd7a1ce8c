//! Configuration structures for the scan pipeline.

use serde::{Deserialize, Serialize};

/// Main configuration for the parago pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// OCR vendor configuration.
    pub ocr: OcrConfig,

    /// Upload validation configuration.
    pub upload: UploadConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Categorization configuration.
    pub categorize: CategorizeConfig,

    /// Stale-receipt sweeper configuration.
    pub sweep: SweepConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            upload: UploadConfig::default(),
            extraction: ExtractionConfig::default(),
            categorize: CategorizeConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

/// Document-analysis vendor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Vendor endpoint base URL.
    pub endpoint: String,

    /// Subscription key sent with every request.
    pub api_key: String,

    /// Analysis model identifier.
    pub model_id: String,

    /// Vendor API version query parameter.
    pub api_version: String,

    /// Delay between job polls, in milliseconds.
    pub poll_interval_ms: u64,

    /// Polls performed before giving up on a job.
    pub max_polls: u32,

    /// Per-request HTTP timeout, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_id: "prebuilt-receipt".to_string(),
            api_version: "2024-11-30".to_string(),
            poll_interval_ms: 1000,
            max_polls: 50,
            http_timeout_secs: 30,
        }
    }
}

/// Upload validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Per-file size ceiling, in bytes.
    pub max_file_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Currency assumed when the document carries none.
    pub default_currency: String,

    /// Minimum accepted vendor-name length (inclusive).
    pub vendor_min_len: usize,

    /// Maximum accepted vendor-name length (exclusive).
    pub vendor_max_len: usize,

    /// Raw-text lines inspected by the vendor heuristic.
    pub vendor_scan_lines: usize,

    /// Longest vendor suggestion accepted from the language model.
    pub llm_vendor_max_len: usize,

    /// Raw-text excerpt length sent to the language model.
    pub llm_excerpt_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_currency: "PLN".to_string(),
            vendor_min_len: 3,
            vendor_max_len: 60,
            vendor_scan_lines: 5,
            llm_vendor_max_len: 100,
            llm_excerpt_chars: 2000,
        }
    }
}

/// Item categorization configuration. An empty `base_url` disables the
/// language-model passes entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizeConfig {
    /// Chat-completions endpoint base URL.
    pub base_url: String,

    /// Bearer token sent with every request.
    pub api_key: String,

    /// Model identifier.
    pub model: String,

    /// Per-request HTTP timeout, in seconds.
    pub http_timeout_secs: u64,

    /// Attempts per categorization job before giving up.
    pub max_attempts: u32,

    /// Base delay between attempts, in milliseconds. Doubles per retry.
    pub backoff_ms: u64,
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            http_timeout_secs: 60,
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

/// Stale-receipt sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Run the background sweeper.
    pub enabled: bool,

    /// Delay between sweeps, in seconds.
    pub interval_secs: u64,

    /// Age after which a pending receipt counts as abandoned, in seconds.
    pub stale_after_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 300,
            stale_after_secs: 3600,
        }
    }
}

impl ScanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Overlay secrets from the environment. Keys in the file lose to
    /// `PARAGO_OCR_KEY` and `PARAGO_LLM_KEY` when those are set.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("PARAGO_OCR_KEY") {
            self.ocr.api_key = key;
        }
        if let Ok(key) = std::env::var("PARAGO_LLM_KEY") {
            self.categorize.api_key = key;
        }
    }

    /// Whether a language-model client should be constructed.
    pub fn llm_enabled(&self) -> bool {
        !self.categorize.base_url.is_empty()
    }
}
