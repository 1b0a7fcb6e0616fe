//! The capability interface every platform adapter implements.
//!
//! Callers depend only on these traits and the canonical types in
//! [`crate::model`]. `repo` is an opaque identifier (`group/project` or a
//! numeric id on GitLab, `owner/repo` on GitHub); adapters reject shapes
//! they cannot address with a `BAD_REQUEST` error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::AuthProvider;
use crate::error::Result;
use crate::github::GitHubProvider;
use crate::gitlab::GitLabProvider;
use crate::model::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    GitLab,
    GitHub,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::GitLab => write!(f, "gitlab"),
            Platform::GitHub => write!(f, "github"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gitlab" => Ok(Platform::GitLab),
            "github" => Ok(Platform::GitHub),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

#[async_trait]
pub trait IssueProvider: Send + Sync {
    async fn get_issue(&self, repo: &str, iid: u64) -> Result<Issue>;

    async fn list_issues(&self, repo: &str, filter: &IssueFilter) -> Result<Vec<Issue>>;

    async fn create_issue(&self, repo: &str, params: &CreateIssueParams) -> Result<Issue>;

    async fn update_issue(&self, repo: &str, iid: u64, params: &UpdateIssueParams)
        -> Result<Issue>;

    async fn create_issue_comment(&self, repo: &str, iid: u64, body: &str) -> Result<Comment>;

    async fn list_issue_comments(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<Comment>>;
}

#[async_trait]
pub trait PullRequestProvider: Send + Sync {
    async fn get_pull_request(&self, repo: &str, iid: u64) -> Result<PullRequest>;

    async fn list_pull_requests(
        &self,
        repo: &str,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>>;

    async fn create_pull_request(
        &self,
        repo: &str,
        params: &CreatePullRequestParams,
    ) -> Result<PullRequest>;

    /// Per-file patches in backend order.
    async fn get_pull_request_diffs(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<FileDiff>>;

    async fn merge_pull_request(
        &self,
        repo: &str,
        iid: u64,
        params: &MergeParams,
    ) -> Result<PullRequest>;

    async fn create_pull_request_comment(
        &self,
        repo: &str,
        iid: u64,
        body: &str,
    ) -> Result<Comment>;

    async fn list_pull_request_comments(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<Comment>>;
}

#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    async fn get_content(&self, repo: &str, path: &str, ref_name: Option<&str>)
        -> Result<Content>;

    async fn get_tree(&self, repo: &str, params: &TreeParams) -> Result<Vec<TreeEntry>>;

    /// Apply the ordered file actions as a single commit on `params.branch`.
    async fn commit(&self, repo: &str, params: &CommitParams) -> Result<Commit>;

    async fn list_commits(&self, repo: &str, filter: &CommitFilter) -> Result<Vec<Commit>>;

    async fn create_branch(&self, repo: &str, name: &str, source_ref: &str) -> Result<Branch>;

    async fn list_branches(&self, repo: &str, filter: &BranchFilter) -> Result<Vec<Branch>>;

    /// Search file contents. `ref_name` may be ignored by platforms that only
    /// index one branch; each result names the ref that was actually searched.
    async fn search_code(
        &self,
        repo: &str,
        query: &str,
        ref_name: Option<&str>,
    ) -> Result<Vec<SearchCodeResult>>;
}

#[async_trait]
pub trait PipelineProvider: Send + Sync {
    async fn get_pipeline(&self, repo: &str, pipeline_id: u64) -> Result<Pipeline>;

    async fn list_pipelines(&self, repo: &str, filter: &PipelineFilter) -> Result<Vec<Pipeline>>;

    async fn list_jobs(&self, repo: &str, pipeline_id: u64, filter: &JobFilter)
        -> Result<Vec<Job>>;

    async fn get_job_log(&self, repo: &str, job_id: u64) -> Result<String>;
}

#[async_trait]
pub trait UserProvider: Send + Sync {
    /// The identity the auth provider authenticates as.
    async fn get_me(&self) -> Result<User>;
}

/// Full capability set of a hosting platform.
pub trait Provider:
    IssueProvider + PullRequestProvider + RepositoryProvider + PipelineProvider + UserProvider
{
    fn platform(&self) -> Platform;
}

/// Where and how to reach one platform.
#[derive(Clone)]
pub struct ProviderConfig {
    pub platform: Platform,
    pub base_url: String,
    pub timeout: Duration,
}

/// Construct the adapter for the configured platform.
pub fn create_provider(
    config: &ProviderConfig,
    auth: Arc<dyn AuthProvider>,
) -> Result<Box<dyn Provider>> {
    Ok(match config.platform {
        Platform::GitLab => Box::new(GitLabProvider::new(&config.base_url, auth, config.timeout)?),
        Platform::GitHub => Box::new(GitHubProvider::new(&config.base_url, auth, config.timeout)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenAuth;

    #[test]
    fn test_platform_parse_and_display() {
        assert_eq!("GitLab".parse::<Platform>().unwrap(), Platform::GitLab);
        assert_eq!("github".parse::<Platform>().unwrap(), Platform::GitHub);
        assert!("bitbucket".parse::<Platform>().is_err());
        assert_eq!(Platform::GitHub.to_string(), "github");
    }

    #[test]
    fn test_factory_selects_adapter() {
        for platform in [Platform::GitLab, Platform::GitHub] {
            let config = ProviderConfig {
                platform,
                base_url: "http://localhost".to_string(),
                timeout: Duration::from_secs(5),
            };
            let provider = create_provider(&config, Arc::new(StaticTokenAuth::anonymous())).unwrap();
            assert_eq!(provider.platform(), platform);
        }
    }
}
