use async_trait::async_trait;
use iacscan_core::{ChangedFile, IacScanError};
use serde::{Deserialize, Serialize};

use crate::report::InlineComment;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const FILES_PER_PAGE: usize = 100;

/// Pull request the workflow runs against.
///
/// # Examples
///
/// ```
/// use iacscan_action::github::PullRequestRef;
///
/// let pr = PullRequestRef::parse("octocat/hello-world", 42).unwrap();
/// assert_eq!(pr.owner, "octocat");
/// assert_eq!(pr.repo, "hello-world");
/// assert_eq!(pr.number, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// Build from an `owner/repo` string (the `GITHUB_REPOSITORY` format) and a number.
    ///
    /// # Errors
    ///
    /// Returns [`IacScanError::Config`] if the repository is not `owner/repo`.
    pub fn parse(repository: &str, number: u64) -> Result<Self, IacScanError> {
        let invalid = || {
            IacScanError::Config(format!(
                "invalid repository '{repository}', expected owner/repo"
            ))
        };
        let (owner, repo) = repository.trim().split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Head revision of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestHead {
    /// Commit the review comments are anchored to.
    pub sha: String,
}

/// Operations the workflow needs from the source hosting service.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Resolve the pull request and its head revision.
    async fn pull_request_head(&self) -> Result<PullRequestHead, IacScanError>;

    /// Files changed by the pull request that still exist at `head`.
    async fn changed_files(&self, head: &PullRequestHead)
        -> Result<Vec<ChangedFile>, IacScanError>;

    /// Raw content of `file` at its ref.
    async fn file_content(&self, file: &ChangedFile) -> Result<Vec<u8>, IacScanError>;

    /// Post a comment on the pull request conversation.
    async fn post_issue_comment(&self, body: &str) -> Result<(), IacScanError>;

    /// Post a line-anchored review comment against `commit_sha`.
    async fn post_review_comment(
        &self,
        comment: &InlineComment,
        commit_sha: &str,
    ) -> Result<(), IacScanError>;
}

#[derive(Deserialize)]
struct PullResponse {
    head: PullRequestHead,
}

#[derive(Serialize)]
struct PageParams {
    per_page: usize,
    page: u32,
}

#[derive(Deserialize)]
struct PullFile {
    filename: String,
    status: String,
}

/// GitHub client bound to a single pull request.
///
/// # Examples
///
/// ```no_run
/// use iacscan_action::github::{GitHubClient, PullRequestRef};
///
/// let pr = PullRequestRef::parse("octocat/hello-world", 7).unwrap();
/// let client = GitHubClient::new("ghp_xxxx", None, pr).unwrap();
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    api_base: String,
    pr: PullRequestRef,
}

impl GitHubClient {
    /// Create a client for `pr`. `api_base` defaults to `https://api.github.com`.
    ///
    /// # Errors
    ///
    /// Returns [`IacScanError::Config`] for an empty token, or
    /// [`IacScanError::Host`] if the client cannot be built.
    pub fn new(
        token: &str,
        api_base: Option<&str>,
        pr: PullRequestRef,
    ) -> Result<Self, IacScanError> {
        if token.trim().is_empty() {
            return Err(IacScanError::Config(
                "GITHUB_TOKEN not set. Pass --github-token or set GITHUB_TOKEN env var".into(),
            ));
        }
        let api_base = api_base
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        let octocrab = octocrab::Octocrab::builder()
            .base_uri(api_base.as_str())
            .map_err(|e| IacScanError::Host(format!("invalid GitHub API URL {api_base}: {e}")))?
            .personal_token(token.to_string())
            .build()
            .map_err(|e| IacScanError::Host(format!("failed to create GitHub client: {e}")))?;

        Ok(Self {
            octocrab,
            http: reqwest::Client::new(),
            token: token.to_string(),
            api_base,
            pr,
        })
    }

    /// The pull request this client talks to.
    pub fn pull_request(&self) -> &PullRequestRef {
        &self.pr
    }

    fn repo_route(&self) -> String {
        format!("/repos/{}/{}", self.pr.owner, self.pr.repo)
    }

    /// Contents endpoint for `path`, each segment percent-encoded.
    fn contents_url(&self, path: &str) -> Result<reqwest::Url, IacScanError> {
        let base = format!("{}{}/contents", self.api_base, self.repo_route());
        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| IacScanError::Host(format!("invalid GitHub API URL {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| IacScanError::Host(format!("GitHub API URL {base} cannot take a path")))?
            .extend(path.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn pull_request_head(&self) -> Result<PullRequestHead, IacScanError> {
        let route = format!("{}/pulls/{}", self.repo_route(), self.pr.number);
        let pull: PullResponse = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| IacScanError::Host(format!("could not find pull request {}: {e}", self.pr)))?;
        Ok(pull.head)
    }

    async fn changed_files(
        &self,
        head: &PullRequestHead,
    ) -> Result<Vec<ChangedFile>, IacScanError> {
        let route = format!("{}/pulls/{}/files", self.repo_route(), self.pr.number);
        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let params = PageParams {
                per_page: FILES_PER_PAGE,
                page,
            };
            let batch: Vec<PullFile> = self
                .octocrab
                .get(&route, Some(&params))
                .await
                .map_err(|e| IacScanError::Host(format!("failed to list files of {}: {e}", self.pr)))?;
            let done = batch.len() < FILES_PER_PAGE;
            files.extend(
                batch
                    .into_iter()
                    .filter(|f| f.status != "removed")
                    .map(|f| ChangedFile::new(f.filename, head.sha.clone())),
            );
            if done {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    async fn file_content(&self, file: &ChangedFile) -> Result<Vec<u8>, IacScanError> {
        let url = self.contents_url(&file.path)?;
        let response = self
            .http
            .get(url)
            .query(&[("ref", file.git_ref.as_str())])
            .header("Accept", "application/vnd.github.raw")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "iacscan")
            .send()
            .await
            .map_err(|e| IacScanError::Host(format!("failed to fetch {}: {e}", file.path)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IacScanError::Host(format!(
                "GitHub API error {status} fetching {}: {body}",
                file.path
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IacScanError::Host(format!("failed to read {}: {e}", file.path)))?;
        Ok(bytes.to_vec())
    }

    async fn post_issue_comment(&self, body: &str) -> Result<(), IacScanError> {
        let route = format!("{}/issues/{}/comments", self.repo_route(), self.pr.number);
        let payload = serde_json::json!({ "body": body });
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| IacScanError::Host(format!("failed to post comment: {e}")))?;
        Ok(())
    }

    async fn post_review_comment(
        &self,
        comment: &InlineComment,
        commit_sha: &str,
    ) -> Result<(), IacScanError> {
        let route = format!("{}/pulls/{}/comments", self.repo_route(), self.pr.number);
        let payload = serde_json::json!({
            "body": comment.body,
            "commit_id": commit_sha,
            "path": comment.path,
            "line": comment.line,
            "side": "RIGHT",
        });
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| {
                IacScanError::Host(format!(
                    "failed to post review comment on {}:{}: {e}",
                    comment.path, comment.line
                ))
            })?;
        Ok(())
    }
}
