// =============================================================================
// Runtime Configuration: provider endpoint and chart output settings
// =============================================================================
//
// Loaded from a JSON file at startup. All fields carry `#[serde(default)]` so
// that a partial (or empty) file is valid. The API key is deliberately NOT a
// config field; it comes from the environment and is handed to the client.
//
// The rolling window length and band multiplier are fixed constants in
// `indicators::bollinger` and are not configurable.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "stock_chart.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_api_base_url() -> String {
    "https://data.nasdaq.com/api/v3".to_string()
}

fn default_datatable() -> String {
    "WIKI/PRICES".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_pages() -> u32 {
    50
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("charts")
}

fn default_chart_width() -> u32 {
    1600
}

fn default_chart_height() -> u32 {
    600
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Data provider ------------------------------------------------------

    /// Base URL of the datatables API, without trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Datatable holding one row per ticker per trading day.
    #[serde(default = "default_datatable")]
    pub datatable: String,

    /// Per-request timeout enforced by the HTTP client.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on cursor pages followed for a single fetch.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    // --- Chart output -------------------------------------------------------

    /// Directory PNG charts are written to. Created on demand.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_chart_width")]
    pub chart_width: u32,

    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            datatable: default_datatable(),
            request_timeout_secs: default_request_timeout_secs(),
            max_pages: default_max_pages(),
            output_dir: default_output_dir(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error; the caller decides whether to fall back to
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            datatable = %config.datatable,
            output_dir = %config.output_dir.display(),
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}
