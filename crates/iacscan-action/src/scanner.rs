//! Client for the template scanning service.
//!
//! Two endpoints under a configured base URL: `templatescanner/upload-template`
//! accepts base64 file content, `templatescanner/result` answers with
//! `{"msg": "success", "summary": ..., "results": [...]}` once a scan is done.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use iacscan_core::{ChangedFile, Finding, IacScanError, ScanReport, ScanSummary};
use serde::{Deserialize, Serialize};

const UPLOAD_PATH: &str = "templatescanner/upload-template";
const RESULT_PATH: &str = "templatescanner/result";

/// Body of an upload request.
///
/// # Examples
///
/// ```
/// use iacscan_action::scanner::UploadRequest;
/// use iacscan_core::ChangedFile;
///
/// let file = ChangedFile::new("infra/main.tf", "abc123");
/// let req = UploadRequest::new(&file, b"resource {}");
/// assert_eq!(req.file_name, "main.tf");
/// assert_eq!(req.file_content_base64, "cmVzb3VyY2Uge30=");
/// assert_eq!(req.file_alias, "Github-Action-Scan - infra/main.tf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    #[serde(rename = "fileString")]
    pub file_content_base64: String,
    pub file_alias: String,
}

impl UploadRequest {
    /// Encode `content` and derive the name and alias from `file`.
    pub fn new(file: &ChangedFile, content: &[u8]) -> Self {
        Self {
            file_name: file.file_name(),
            file_content_base64: base64::engine::general_purpose::STANDARD.encode(content),
            file_alias: file.alias(),
        }
    }
}

/// Body of a result query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultQuery {
    pub file_alias: String,
    pub file_name: String,
}

impl ResultQuery {
    /// Query for the scan of `file`.
    pub fn for_file(file: &ChangedFile) -> Self {
        Self {
            file_alias: file.alias(),
            file_name: file.file_name(),
        }
    }
}

/// Answer to a result query.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The scan finished; summary and findings are final.
    Ready(ScanReport),
    /// Still processing, carrying the service's `msg` if any.
    Pending(Option<String>),
}

/// Operations the workflow needs from the scanning service.
#[async_trait]
pub trait ScanService: Send + Sync {
    /// Submit a file for scanning.
    async fn upload(&self, request: &UploadRequest) -> Result<(), IacScanError>;

    /// Ask for the result of an earlier upload.
    async fn fetch_result(&self, query: &ResultQuery) -> Result<PollOutcome, IacScanError>;
}

/// HTTP client for the scanning service with bearer-token authorization.
///
/// # Examples
///
/// ```
/// use iacscan_action::scanner::ScanApiClient;
///
/// let client = ScanApiClient::new("https://api.example.com/", "token");
/// assert!(client.is_ok());
/// ```
pub struct ScanApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ScanApiClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`IacScanError::Api`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, token: &str) -> Result<Self, IacScanError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| IacScanError::Api(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, IacScanError> {
        let url = format!("{}/{path}", self.base_url);
        self.http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| IacScanError::Api(format!("request to {url} failed: {e}")))
    }
}

#[async_trait]
impl ScanService for ScanApiClient {
    async fn upload(&self, request: &UploadRequest) -> Result<(), IacScanError> {
        let response = self.post(UPLOAD_PATH, request).await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(IacScanError::Api(format!(
                "failed to upload {}: status {status}: {body}",
                request.file_alias
            )));
        }
        Ok(())
    }

    async fn fetch_result(&self, query: &ResultQuery) -> Result<PollOutcome, IacScanError> {
        let response = self.post(RESULT_PATH, query).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IacScanError::Api(format!("failed to read result response: {e}")))?;
        if !status.is_success() {
            return Err(IacScanError::Api(format!(
                "result query for {} returned {status}: {body}",
                query.file_alias
            )));
        }
        parse_result_body(&body)
    }
}

#[derive(Deserialize)]
struct FinishedBody {
    summary: ScanSummary,
    #[serde(default)]
    results: Option<Vec<serde_json::Value>>,
}

/// Interpret a result response body.
///
/// A finding that does not parse is logged and dropped; the rest of the
/// report still counts as finished.
///
/// # Errors
///
/// Returns [`IacScanError::Serialization`] when the body is not JSON, or when
/// it claims success but the summary does not parse.
///
/// # Examples
///
/// ```
/// use iacscan_action::scanner::{parse_result_body, PollOutcome};
///
/// let pending = parse_result_body(r#"{"msg": "processing"}"#).unwrap();
/// assert_eq!(pending, PollOutcome::Pending(Some("processing".into())));
/// ```
pub fn parse_result_body(body: &str) -> Result<PollOutcome, IacScanError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let msg = value.get("msg").and_then(|m| m.as_str());
    if msg != Some("success") {
        return Ok(PollOutcome::Pending(msg.map(str::to_string)));
    }
    let FinishedBody { summary, results } = serde_json::from_value(value)?;
    let results = results
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<Finding>(raw) {
            Ok(finding) => Some(finding),
            Err(e) => {
                tracing::warn!(
                    file = %summary.file_name,
                    error = %e,
                    "skipping unreadable finding"
                );
                None
            }
        })
        .collect();
    Ok(PollOutcome::Ready(ScanReport { summary, results }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use iacscan_core::{FindingStatus, Severity};

    #[test]
    fn upload_request_uses_wire_names() {
        let file = ChangedFile::new("a/b/c.json", "sha");
        let json = serde_json::to_value(UploadRequest::new(&file, b"{}")).unwrap();
        assert_eq!(json["fileName"], "c.json");
        assert_eq!(json["fileString"], "e30=");
        assert_eq!(json["fileAlias"], "Github-Action-Scan - a/b/c.json");
    }

    #[test]
    fn result_query_uses_wire_names() {
        let file = ChangedFile::new("stack/app.ts", "sha");
        let json = serde_json::to_value(ResultQuery::for_file(&file)).unwrap();
        assert_eq!(json["fileAlias"], "Github-Action-Scan - stack/app.ts");
        assert_eq!(json["fileName"], "app.ts");
    }

    #[test]
    fn success_body_is_ready() {
        let body = r#"{
            "msg": "success",
            "summary": {"filename": "main.tf", "summaryId": "abc", "passed": 4,
                        "failed": 1, "critical": 1, "high": 0, "medium": 0, "low": 0},
            "results": [{"id": "CKV_1", "severity": "critical", "description": "d",
                         "file_line_range": "3-5", "status": "FAILED"}]
        }"#;
        let PollOutcome::Ready(report) = parse_result_body(body).unwrap() else {
            panic!("expected ready");
        };
        assert_eq!(report.summary.summary_id, "abc");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].level(), Some(Severity::Critical));
        assert_eq!(report.results[0].status, Some(FindingStatus::Failed));
    }

    #[test]
    fn odd_findings_do_not_block_a_finished_scan() {
        let body = r#"{
            "msg": "success",
            "summary": {"filename": "main.tf", "summaryId": 7, "passed": 0,
                        "failed": 3, "critical": 1, "high": 0, "medium": 0, "low": 0},
            "results": [
                {"severity": "critical", "description": "no id",
                 "file_line_range": "1-2", "status": "FAILED"},
                {"id": "CKV_2", "severity": null, "description": null, "status": "SKIPPED"},
                "not a finding",
                {"id": "CKV_3", "severity": "low", "description": "d", "file_line_range": "4-4",
                 "status": "FAILED"}
            ]
        }"#;
        let PollOutcome::Ready(report) = parse_result_body(body).unwrap() else {
            panic!("expected ready");
        };
        assert!(report.summary.breaches(Some(Severity::Critical)));
        let ids: Vec<&str> = report.results.iter().map(|f| f.check_id.as_str()).collect();
        assert_eq!(ids, vec!["", "CKV_2", "CKV_3"]);
        assert_eq!(report.results[1].status, Some(FindingStatus::Unknown));
    }

    #[test]
    fn null_results_is_an_empty_report() {
        let body = r#"{"msg": "success", "results": null,
            "summary": {"filename": "a.json", "summaryId": "x"}}"#;
        let PollOutcome::Ready(report) = parse_result_body(body).unwrap() else {
            panic!("expected ready");
        };
        assert!(report.results.is_empty());
    }

    #[test]
    fn missing_msg_is_pending() {
        assert_eq!(
            parse_result_body("{}").unwrap(),
            PollOutcome::Pending(None)
        );
    }

    #[test]
    fn success_without_summary_is_an_error() {
        assert!(parse_result_body(r#"{"msg": "success"}"#).is_err());
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(parse_result_body("<html>502</html>").is_err());
    }
}
