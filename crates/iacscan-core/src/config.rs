use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::IacScanError;
use crate::types::Severity;

/// Top-level configuration loaded from `.iacscan.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
/// The binary applies the flag and environment layers on top of this struct.
///
/// # Examples
///
/// ```
/// use iacscan_core::IacScanConfig;
///
/// let config = IacScanConfig::default();
/// assert_eq!(config.scan.poll_interval_secs, 300);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IacScanConfig {
    /// Scanning service settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// File selection, polling and reporting behavior.
    #[serde(default)]
    pub scan: ScanConfig,
}

impl IacScanConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IacScanError::FileNotFound`] if the file does not exist,
    /// [`IacScanError::Io`] if it cannot be read, or [`IacScanError::Toml`]
    /// if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, IacScanError> {
        if !path.exists() {
            return Err(IacScanError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`IacScanError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use iacscan_core::{IacScanConfig, Severity};
    ///
    /// let toml = r#"
    /// [scan]
    /// minimum_severity = "high"
    /// timeout_secs = 600
    /// "#;
    /// let config = IacScanConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.scan.minimum_severity, Some(Severity::High));
    /// assert_eq!(config.scan.poll_cycles(), 2);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, IacScanError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Scanning service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the scanning service; the `URL` environment variable wins.
    pub url: Option<String>,
    /// Page that renders a full report, keyed by `?id=<summaryId>`.
    #[serde(default = "default_report_url")]
    pub report_url: String,
}

fn default_report_url() -> String {
    "https://app.6pillars.ai/template-scanner-results".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: None,
            report_url: default_report_url(),
        }
    }
}

/// File selection, polling and reporting behavior.
///
/// # Examples
///
/// ```
/// use iacscan_core::ScanConfig;
///
/// let config = ScanConfig::default();
/// assert_eq!(config.extensions, vec![".tf", ".ts", ".json", ".yaml"]);
/// assert_eq!(config.poll_cycles(), 4);
/// assert!(config.minimum_severity.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Accepted path suffixes.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Only paths containing this substring are scanned (empty: all).
    #[serde(default)]
    pub folder_path: String,
    /// Paths containing this substring are skipped (empty: none).
    #[serde(default)]
    pub exclude_folder: String,
    /// Minimum severity that fails the run and gets inline comments.
    #[serde(default, deserialize_with = "threshold")]
    pub minimum_severity: Option<Severity>,
    /// Total polling budget in seconds (default: 1200).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Wait between poll cycles in seconds (default: 300).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Explicit number of poll cycles, overriding the timeout-derived count.
    #[serde(default)]
    pub poll_cycles: Option<u32>,
    /// Do not post inline review comments.
    #[serde(default)]
    pub skip_comments: bool,
}

fn default_extensions() -> Vec<String> {
    [".tf", ".ts", ".json", ".yaml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 {
    1200
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn threshold<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(s) => Severity::parse_threshold(&s).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            folder_path: String::new(),
            exclude_folder: String::new(),
            minimum_severity: None,
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_cycles: None,
            skip_comments: false,
        }
    }
}

impl ScanConfig {
    /// Number of poll cycles: the explicit count, or `ceil(timeout / interval)`.
    pub fn poll_cycles(&self) -> u32 {
        if let Some(cycles) = self.poll_cycles {
            return cycles;
        }
        if self.poll_interval_secs == 0 {
            return 0;
        }
        let cycles = self.timeout_secs.div_ceil(self.poll_interval_secs);
        u32::try_from(cycles).unwrap_or(u32::MAX)
    }

    /// Wait between poll cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Check settings that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`IacScanError::Config`] for an empty extension list or a zero
    /// poll interval without an explicit cycle count.
    pub fn validate(&self) -> Result<(), IacScanError> {
        if self.extensions.is_empty() {
            return Err(IacScanError::Config(
                "scan.extensions must list at least one suffix".into(),
            ));
        }
        if self.poll_interval_secs == 0 && self.poll_cycles.is_none() {
            return Err(IacScanError::Config(
                "poll interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
