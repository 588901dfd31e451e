use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Prefix of the alias used to correlate an upload with its result query.
pub const FILE_ALIAS_PREFIX: &str = "Github-Action-Scan - ";

/// A file changed by a pull request, as seen at the pull request head.
///
/// # Examples
///
/// ```
/// use iacscan_core::ChangedFile;
///
/// let file = ChangedFile::new("infra/main.tf", "4f2a9c1");
/// assert_eq!(file.file_name(), "main.tf");
/// assert_eq!(file.alias(), "Github-Action-Scan - infra/main.tf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFile {
    /// Path relative to the repository root.
    pub path: String,
    /// Revision the content is read at.
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl ChangedFile {
    /// Create a changed file entry.
    pub fn new(path: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            git_ref: git_ref.into(),
        }
    }

    /// Last path component, which is what the scanning service calls the file name.
    pub fn file_name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }

    /// Alias sent with both the upload and the result query.
    pub fn alias(&self) -> String {
        format!("{FILE_ALIAS_PREFIX}{}", self.path)
    }
}

/// Severity of a scan finding.
///
/// Ordered from most to least severe: critical, high, medium, low.
///
/// # Examples
///
/// ```
/// use iacscan_core::Severity;
///
/// let s: Severity = serde_json::from_str("\"high\"").unwrap();
/// assert_eq!(s, Severity::High);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be fixed before merging.
    Critical,
    /// Serious misconfiguration.
    High,
    /// Worth fixing.
    Medium,
    /// Hardening advice.
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Returns `true` if `self` is at least as severe as `threshold`.
    ///
    /// # Examples
    ///
    /// ```
    /// use iacscan_core::Severity;
    ///
    /// assert!(Severity::Critical.meets_threshold(Severity::High));
    /// assert!(Severity::High.meets_threshold(Severity::High));
    /// assert!(!Severity::Medium.meets_threshold(Severity::High));
    /// ```
    pub fn meets_threshold(self, threshold: Severity) -> bool {
        self.rank() <= threshold.rank()
    }

    /// Parse a minimum-severity setting. `none` and the empty string mean no minimum.
    ///
    /// # Errors
    ///
    /// Returns a message naming the value when it is not a known severity.
    ///
    /// # Examples
    ///
    /// ```
    /// use iacscan_core::Severity;
    ///
    /// assert_eq!(Severity::parse_threshold("HIGH").unwrap(), Some(Severity::High));
    /// assert_eq!(Severity::parse_threshold("none").unwrap(), None);
    /// assert_eq!(Severity::parse_threshold("").unwrap(), None);
    /// ```
    pub fn parse_threshold(s: &str) -> Result<Option<Severity>, String> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(None),
            other => other.parse().map(Some),
        }
    }

    /// GitHub emoji shortcode used in review comments.
    pub fn emoji(self) -> &'static str {
        match self {
            Severity::Critical => ":red_circle:",
            Severity::High => ":orange_circle:",
            Severity::Medium => ":yellow_circle:",
            Severity::Low => ":green_circle:",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }
}

/// Returns `true` when `severity` is acted on under `threshold`.
///
/// No threshold means every finding is acted on.
pub fn within_threshold(severity: Severity, threshold: Option<Severity>) -> bool {
    threshold.map_or(true, |t| severity.meets_threshold(t))
}

/// Per-file summary returned by the scanning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// File name as the scanning service recorded it.
    #[serde(rename = "filename")]
    pub file_name: String,
    /// Identifier of the full report.
    #[serde(deserialize_with = "string_or_number")]
    pub summary_id: String,
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub critical: u64,
    #[serde(default)]
    pub high: u64,
    #[serde(default)]
    pub medium: u64,
    #[serde(default)]
    pub low: u64,
}

impl ScanSummary {
    /// Number of failed checks in the given severity bucket.
    pub fn count(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// Returns `true` if any bucket at or above `threshold` is non-zero.
    ///
    /// Without a threshold nothing breaches.
    ///
    /// # Examples
    ///
    /// ```
    /// use iacscan_core::{ScanSummary, Severity};
    ///
    /// let summary = ScanSummary {
    ///     file_name: "main.tf".into(),
    ///     summary_id: "42".into(),
    ///     passed: 10,
    ///     failed: 1,
    ///     critical: 0,
    ///     high: 0,
    ///     medium: 1,
    ///     low: 0,
    /// };
    /// assert!(summary.breaches(Some(Severity::Low)));
    /// assert!(!summary.breaches(Some(Severity::High)));
    /// assert!(!summary.breaches(None));
    /// ```
    pub fn breaches(&self, threshold: Option<Severity>) -> bool {
        let Some(threshold) = threshold else {
            return false;
        };
        Severity::ALL
            .iter()
            .any(|s| s.meets_threshold(threshold) && self.count(*s) > 0)
    }
}

/// Outcome of a single rule check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingStatus {
    Passed,
    Failed,
    /// Any other status the service reports, e.g. `SKIPPED`.
    #[serde(other)]
    Unknown,
}

/// A single rule check reported by the scanning service.
///
/// Missing or `null` text fields read as empty so one odd finding never
/// invalidates a finished scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule identifier.
    #[serde(rename = "id", default, deserialize_with = "lenient_string")]
    pub check_id: String,
    /// Severity as reported; may be a value this tool does not know.
    #[serde(default, deserialize_with = "lenient_string")]
    pub severity: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Line range in `start-end` form.
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub file_line_range: Option<String>,
    #[serde(default)]
    pub status: Option<FindingStatus>,
}

impl Finding {
    /// Parsed severity, or `None` when the service sent an unknown value.
    pub fn level(&self) -> Option<Severity> {
        self.severity.parse().ok()
    }

    /// Start line of the range, i.e. the integer before the first `-`.
    ///
    /// # Examples
    ///
    /// ```
    /// use iacscan_core::Finding;
    ///
    /// let finding = Finding {
    ///     check_id: "CKV_AWS_20".into(),
    ///     severity: "high".into(),
    ///     description: "S3 bucket is public".into(),
    ///     file_line_range: Some("12-30".into()),
    ///     status: None,
    /// };
    /// assert_eq!(finding.start_line(), Some(12));
    /// ```
    pub fn start_line(&self) -> Option<u64> {
        parse_start_line(self.file_line_range.as_deref()?)
    }
}

/// Parse the start line out of a `start-end` range.
pub fn parse_start_line(range: &str) -> Option<u64> {
    range.split('-').next()?.trim().parse().ok()
}

/// A terminal scan result: the summary plus every finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub summary: ScanSummary,
    #[serde(default)]
    pub results: Vec<Finding>,
}

/// Output format for the run outcome printed by the CLI.
///
/// # Examples
///
/// ```
/// use iacscan_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
}

impl From<Scalar> for String {
    fn from(raw: Scalar) -> Self {
        match raw {
            Scalar::Str(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Scalar::deserialize(deserializer)?.into())
}

/// Like `string_or_number`, but `null` reads as the empty string.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(critical: u64, high: u64, medium: u64, low: u64) -> ScanSummary {
        ScanSummary {
            file_name: "main.tf".into(),
            summary_id: "1".into(),
            passed: 3,
            failed: critical + high + medium + low,
            critical,
            high,
            medium,
            low,
        }
    }

    #[test]
    fn severity_from_str() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!("High".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("MEDIUM".parse::<Severity>().unwrap(), Severity::Medium);
        assert_eq!(" low ".parse::<Severity>().unwrap(), Severity::Low);
        assert!("info".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_meets_threshold() {
        assert!(Severity::Critical.meets_threshold(Severity::Critical));
        assert!(Severity::Critical.meets_threshold(Severity::Low));
        assert!(Severity::High.meets_threshold(Severity::High));
        assert!(Severity::High.meets_threshold(Severity::Medium));
        assert!(!Severity::High.meets_threshold(Severity::Critical));
        assert!(!Severity::Medium.meets_threshold(Severity::High));
        assert!(!Severity::Low.meets_threshold(Severity::Medium));
    }

    #[test]
    fn no_threshold_accepts_everything() {
        for s in Severity::ALL {
            assert!(within_threshold(s, None));
        }
        assert!(!within_threshold(Severity::Low, Some(Severity::Medium)));
    }

    #[test]
    fn parse_threshold_rejects_unknown() {
        assert!(Severity::parse_threshold("severe").is_err());
    }

    #[test]
    fn emoji_per_severity() {
        assert_eq!(Severity::Critical.emoji(), ":red_circle:");
        assert_eq!(Severity::High.emoji(), ":orange_circle:");
        assert_eq!(Severity::Medium.emoji(), ":yellow_circle:");
        assert_eq!(Severity::Low.emoji(), ":green_circle:");
    }

    #[test]
    fn summary_breach_is_at_or_above() {
        let s = summary(0, 1, 0, 0);
        assert!(s.breaches(Some(Severity::High)));
        assert!(s.breaches(Some(Severity::Low)));
        assert!(!s.breaches(Some(Severity::Critical)));
    }

    #[test]
    fn clean_summary_never_breaches() {
        let s = summary(0, 0, 0, 0);
        for t in Severity::ALL {
            assert!(!s.breaches(Some(t)));
        }
    }

    #[test]
    fn summary_accepts_numeric_id() {
        let json = r#"{"filename":"main.tf","summaryId":1234,"passed":5,"failed":2,
            "critical":1,"high":1,"medium":0,"low":0}"#;
        let s: ScanSummary = serde_json::from_str(json).unwrap();
        assert_eq!(s.summary_id, "1234");
        assert_eq!(s.file_name, "main.tf");
        assert_eq!(s.count(Severity::Critical), 1);
    }

    #[test]
    fn finding_parses_wire_names() {
        let json = r#"{"id":"CKV_AWS_1","severity":"CRITICAL","description":"open",
            "file_line_range":"4-9","status":"FAILED"}"#;
        let f: Finding = serde_json::from_str(json).unwrap();
        assert_eq!(f.check_id, "CKV_AWS_1");
        assert_eq!(f.level(), Some(Severity::Critical));
        assert_eq!(f.start_line(), Some(4));
        assert_eq!(f.status, Some(FindingStatus::Failed));
    }

    #[test]
    fn finding_without_range_or_status() {
        let json = r#"{"id":"CKV_AWS_2","severity":"info","description":"note"}"#;
        let f: Finding = serde_json::from_str(json).unwrap();
        assert_eq!(f.level(), None);
        assert_eq!(f.start_line(), None);
        assert_eq!(f.status, None);
    }

    #[test]
    fn finding_tolerates_missing_and_null_fields() {
        let json = r#"{"severity":null,"description":null,"file_line_range":12,"status":"SKIPPED"}"#;
        let f: Finding = serde_json::from_str(json).unwrap();
        assert_eq!(f.check_id, "");
        assert_eq!(f.severity, "");
        assert_eq!(f.description, "");
        assert_eq!(f.level(), None);
        assert_eq!(f.start_line(), Some(12));
        assert_eq!(f.status, Some(FindingStatus::Unknown));
    }

    #[test]
    fn finding_numeric_id() {
        let f: Finding = serde_json::from_str(r#"{"id":301,"status":null}"#).unwrap();
        assert_eq!(f.check_id, "301");
        assert_eq!(f.status, None);
    }

    #[test]
    fn start_line_rejects_garbage() {
        assert_eq!(parse_start_line("abc-9"), None);
        assert_eq!(parse_start_line("17"), Some(17));
    }

    #[test]
    fn changed_file_name_and_alias() {
        let f = ChangedFile::new("deploy/stack/template.yaml", "abc");
        assert_eq!(f.file_name(), "template.yaml");
        assert_eq!(f.alias(), "Github-Action-Scan - deploy/stack/template.yaml");
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }
}
