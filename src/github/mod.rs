//! GitHub adapter (REST API v3).
//!
//! Repositories are addressed as `owner/repo`. Issues and pull requests share
//! one number space; comments on both go through the issue comments endpoint.
//! CI maps onto Actions: a pipeline is a workflow run.

pub mod commit;
pub mod tree;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, instrument, warn};

use crate::auth::AuthProvider;
use crate::error::{ErrorCode, ProviderError, Result};
use crate::http::{HttpClient, Query};
use crate::model::*;
use crate::provider::{
    IssueProvider, PipelineProvider, Platform, Provider, PullRequestProvider, RepositoryProvider,
    UserProvider,
};
use commit::{encode_path, CommitOrchestrator};
use types::*;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const TEXT_MATCH_MEDIA_TYPE: &str = "application/vnd.github.text-match+json";

#[derive(Debug, Clone)]
pub struct GitHubProvider {
    http: HttpClient,
}

impl GitHubProvider {
    pub fn new(base_url: &str, auth: Arc<dyn AuthProvider>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(
            Platform::GitHub,
            base_url,
            auth,
            timeout,
            &[
                ("Accept", "application/vnd.github+json"),
                ("X-GitHub-Api-Version", API_VERSION),
            ],
        )?;
        Ok(Self { http })
    }

    async fn list_comments(&self, repo: &str, number: u64, pagination: &Pagination) -> Result<Vec<Comment>> {
        let path = format!("{}/issues/{}/comments", repo_path(repo)?, number);
        let comments: Vec<GitHubComment> = self.http.get(&path, &pagination.query()).await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn create_comment(&self, repo: &str, number: u64, body: &str) -> Result<Comment> {
        let path = format!("{}/issues/{}/comments", repo_path(repo)?, number);
        let comment: GitHubComment = self
            .http
            .post(&path, &Query::new(), &CreateCommentRequest { body })
            .await?;
        Ok(comment.into())
    }

    async fn search_issues(&self, repo: &str, search: &str, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let mut query = filter.pagination.query();
        query.push(("q", issue_search_query(repo, search, filter)));
        if let Some(sort) = filter.sort {
            query.push(("sort", sort_field(sort).to_string()));
        }
        if let Some(direction) = filter.direction {
            query.push(("order", direction.as_str().to_string()));
        }
        let found: GitHubIssueSearch = self.http.get("/search/issues", &query).await?;
        Ok(found.items.into_iter().map(Issue::from).collect())
    }
}

/// `/repos/{owner}/{repo}` for an `owner/repo` identifier.
pub fn repo_path(repo: &str) -> Result<String> {
    let repo = repo.trim();
    match repo.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name]
            if !owner.is_empty()
                && !name.is_empty()
                && !repo.chars().any(char::is_whitespace) =>
        {
            Ok(format!("/repos/{}/{}", owner, name))
        }
        _ => Err(ProviderError::bad_request(
            Platform::GitHub,
            format!("invalid repository '{}': expected owner/repo", repo),
        )),
    }
}

fn owner(repo: &str) -> &str {
    repo.trim().split('/').next().unwrap_or_default()
}

fn sort_field(field: SortField) -> &'static str {
    match field {
        SortField::Created => "created",
        SortField::Updated => "updated",
    }
}

/// Search syntax equivalent of an issue filter, scoped to one repository.
fn issue_search_query(repo: &str, search: &str, filter: &IssueFilter) -> String {
    let mut terms = vec![format!("repo:{}", repo.trim()), "is:issue".to_string()];
    match filter.state {
        Some(IssueStateFilter::Open) => terms.push("state:open".to_string()),
        Some(IssueStateFilter::Closed) => terms.push("state:closed".to_string()),
        Some(IssueStateFilter::All) | None => {}
    }
    for label in &filter.labels {
        terms.push(format!("label:\"{}\"", label));
    }
    if let Some(assignee) = &filter.assignee {
        terms.push(format!("assignee:{}", assignee));
    }
    if let Some(author) = &filter.author {
        terms.push(format!("author:{}", author));
    }
    terms.push(search.to_string());
    terms.join(" ")
}

/// Workflow-run `status` query value for canonical statuses that map one to
/// one. The rest are only filtered locally.
fn run_status_query(status: PipelineStatus) -> Option<&'static str> {
    match status {
        PipelineStatus::Running => Some("in_progress"),
        PipelineStatus::Success => Some("success"),
        PipelineStatus::Canceled => Some("cancelled"),
        PipelineStatus::Skipped => Some("skipped"),
        PipelineStatus::Failed | PipelineStatus::Pending | PipelineStatus::Manual => None,
    }
}

fn decode_content(item: GitHubContentItem) -> Result<FileContent> {
    let raw = item.content.unwrap_or_default();
    let content = if item.encoding.as_deref() == Some("base64") {
        let cleaned: String = raw.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| {
                ProviderError::new(
                    Platform::GitHub,
                    ErrorCode::Platform,
                    format!("could not decode file content: {}", e),
                )
            })?;
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        raw
    };
    Ok(FileContent {
        name: item.name,
        path: item.path,
        content,
        size: item.size,
        sha: item.sha,
    })
}

#[async_trait]
impl IssueProvider for GitHubProvider {
    #[instrument(skip(self))]
    async fn get_issue(&self, repo: &str, iid: u64) -> Result<Issue> {
        let path = format!("{}/issues/{}", repo_path(repo)?, iid);
        let issue: GitHubIssue = self.http.get(&path, &Query::new()).await?;
        if issue.is_pull_request() {
            return Err(ProviderError::not_found(
                Platform::GitHub,
                format!("#{} is a pull request, not an issue", iid),
            ));
        }
        Ok(issue.into())
    }

    /// Free-text search goes through the search API; plain listings use the
    /// issues endpoint, which also returns pull requests and needs filtering.
    #[instrument(skip(self, filter))]
    async fn list_issues(&self, repo: &str, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let path = format!("{}/issues", repo_path(repo)?);
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            return self.search_issues(repo, search, filter).await;
        }

        let mut query = filter.pagination.query();
        if let Some(state) = filter.state {
            let state = match state {
                IssueStateFilter::Open => "open",
                IssueStateFilter::Closed => "closed",
                IssueStateFilter::All => "all",
            };
            query.push(("state", state.to_string()));
        }
        if !filter.labels.is_empty() {
            query.push(("labels", filter.labels.join(",")));
        }
        if let Some(assignee) = &filter.assignee {
            query.push(("assignee", assignee.clone()));
        }
        if let Some(author) = &filter.author {
            query.push(("creator", author.clone()));
        }
        if let Some(sort) = filter.sort {
            query.push(("sort", sort_field(sort).to_string()));
        }
        if let Some(direction) = filter.direction {
            query.push(("direction", direction.as_str().to_string()));
        }

        let items: Vec<GitHubIssue> = self.http.get(&path, &query).await?;
        let total = items.len();
        let issues: Vec<Issue> = items
            .into_iter()
            .filter(|i| !i.is_pull_request())
            .map(Issue::from)
            .collect();
        debug!(count = issues.len(), skipped = total - issues.len(), "listed issues");
        Ok(issues)
    }

    #[instrument(skip(self, params), fields(title = %params.title))]
    async fn create_issue(&self, repo: &str, params: &CreateIssueParams) -> Result<Issue> {
        let path = format!("{}/issues", repo_path(repo)?);
        let body = CreateIssueRequest {
            title: &params.title,
            body: params.description.as_deref(),
            labels: &params.labels,
            assignees: &params.assignees,
        };
        let issue: GitHubIssue = self.http.post(&path, &Query::new(), &body).await?;
        Ok(issue.into())
    }

    #[instrument(skip(self, params))]
    async fn update_issue(
        &self,
        repo: &str,
        iid: u64,
        params: &UpdateIssueParams,
    ) -> Result<Issue> {
        let path = format!("{}/issues/{}", repo_path(repo)?, iid);
        let body = UpdateIssueRequest {
            title: params.title.as_deref(),
            body: params.description.as_deref(),
            state: params.state,
            labels: params.labels.as_deref(),
            assignees: params.assignees.as_deref(),
        };
        let issue: GitHubIssue = self.http.patch(&path, &body).await?;
        Ok(issue.into())
    }

    #[instrument(skip(self, body))]
    async fn create_issue_comment(&self, repo: &str, iid: u64, body: &str) -> Result<Comment> {
        self.create_comment(repo, iid, body).await
    }

    #[instrument(skip(self, pagination))]
    async fn list_issue_comments(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<Comment>> {
        self.list_comments(repo, iid, pagination).await
    }
}

#[async_trait]
impl PullRequestProvider for GitHubProvider {
    #[instrument(skip(self))]
    async fn get_pull_request(&self, repo: &str, iid: u64) -> Result<PullRequest> {
        let path = format!("{}/pulls/{}", repo_path(repo)?, iid);
        let pr: GitHubPullRequest = self.http.get(&path, &Query::new()).await?;
        Ok(pr.into())
    }

    /// GitHub has no merged state filter: merged pull requests are listed as
    /// closed and told apart locally.
    #[instrument(skip(self, filter))]
    async fn list_pull_requests(
        &self,
        repo: &str,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>> {
        let path = format!("{}/pulls", repo_path(repo)?);
        let mut query = filter.pagination.query();
        if let Some(state) = filter.state {
            let state = match state {
                PullRequestStateFilter::Open => "open",
                PullRequestStateFilter::Closed | PullRequestStateFilter::Merged => "closed",
                PullRequestStateFilter::All => "all",
            };
            query.push(("state", state.to_string()));
        }
        if let Some(source) = &filter.source_branch {
            query.push(("head", format!("{}:{}", owner(repo), source)));
        }
        if let Some(target) = &filter.target_branch {
            query.push(("base", target.clone()));
        }
        if let Some(sort) = filter.sort {
            query.push(("sort", sort_field(sort).to_string()));
        }
        if let Some(direction) = filter.direction {
            query.push(("direction", direction.as_str().to_string()));
        }

        let prs: Vec<GitHubPullRequest> = self.http.get(&path, &query).await?;
        let keep = |pr: &PullRequest| match filter.state {
            Some(PullRequestStateFilter::Merged) => pr.state == PullRequestState::Merged,
            Some(PullRequestStateFilter::Closed) => pr.state == PullRequestState::Closed,
            _ => true,
        };
        Ok(prs.into_iter().map(PullRequest::from).filter(keep).collect())
    }

    #[instrument(skip(self, params), fields(source = %params.source_branch, target = %params.target_branch))]
    async fn create_pull_request(
        &self,
        repo: &str,
        params: &CreatePullRequestParams,
    ) -> Result<PullRequest> {
        let path = format!("{}/pulls", repo_path(repo)?);
        let body = CreatePullRequestRequest {
            title: &params.title,
            head: &params.source_branch,
            base: &params.target_branch,
            body: params.description.as_deref(),
            draft: params.draft,
        };
        let pr: GitHubPullRequest = self.http.post(&path, &Query::new(), &body).await?;
        Ok(pr.into())
    }

    #[instrument(skip(self, pagination))]
    async fn get_pull_request_diffs(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<FileDiff>> {
        let path = format!("{}/pulls/{}/files", repo_path(repo)?, iid);
        let files: Vec<GitHubPullFile> = self.http.get(&path, &pagination.query()).await?;
        Ok(files.into_iter().map(FileDiff::from).collect())
    }

    /// Merge, re-fetch the pull request, then optionally delete its head
    /// branch. The re-fetch supplies the branch name.
    #[instrument(skip(self, params))]
    async fn merge_pull_request(
        &self,
        repo: &str,
        iid: u64,
        params: &MergeParams,
    ) -> Result<PullRequest> {
        let base = repo_path(repo)?;
        let body = MergePullRequestRequest {
            commit_message: params.message.as_deref(),
            merge_method: if params.squash { "squash" } else { "merge" },
        };
        let result: GitHubMergeResult = self
            .http
            .put(&format!("{}/pulls/{}/merge", base, iid), &body)
            .await?;
        if !result.merged {
            return Err(ProviderError {
                status: Some(409),
                ..ProviderError::new(
                    Platform::GitHub,
                    ErrorCode::Conflict,
                    result
                        .message
                        .unwrap_or_else(|| format!("pull request #{} was not merged", iid)),
                )
            });
        }

        let merged = self.get_pull_request(repo, iid).await?;
        if params.delete_source_branch {
            let ref_path = format!("{}/git/refs/heads/{}", base, merged.source_branch);
            // The merge already happened; a failed cleanup is not a failed merge.
            if let Err(err) = self.http.delete(&ref_path).await {
                warn!(branch = %merged.source_branch, error = %err, "could not delete source branch");
            }
        }
        Ok(merged)
    }

    #[instrument(skip(self, body))]
    async fn create_pull_request_comment(
        &self,
        repo: &str,
        iid: u64,
        body: &str,
    ) -> Result<Comment> {
        self.create_comment(repo, iid, body).await
    }

    #[instrument(skip(self, pagination))]
    async fn list_pull_request_comments(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<Comment>> {
        self.list_comments(repo, iid, pagination).await
    }
}

#[async_trait]
impl RepositoryProvider for GitHubProvider {
    /// The contents endpoint answers with an object for a file and an array
    /// for a directory.
    #[instrument(skip(self))]
    async fn get_content(
        &self,
        repo: &str,
        path: &str,
        ref_name: Option<&str>,
    ) -> Result<Content> {
        let clean = path.trim_matches('/');
        let url = format!("{}/contents/{}", repo_path(repo)?, encode_path(clean));
        let mut query = Query::new();
        if let Some(ref_name) = ref_name {
            query.push(("ref", ref_name.to_string()));
        }
        let contents: GitHubContents = self.http.get(&url, &query).await?;
        match contents {
            GitHubContents::File(item) => Ok(Content::File(decode_content(item)?)),
            GitHubContents::Directory(items) => Ok(Content::Directory(DirectoryContent {
                path: clean.to_string(),
                entries: items.into_iter().map(TreeEntry::from).collect(),
            })),
        }
    }

    #[instrument(skip(self, params))]
    async fn get_tree(&self, repo: &str, params: &TreeParams) -> Result<Vec<TreeEntry>> {
        let base = repo_path(repo)?;
        let commit_sha = tree::resolve_ref(&self.http, &base, params.ref_name.as_deref()).await?;
        let items = tree::fetch_recursive_tree(&self.http, &base, &commit_sha).await?;
        debug!(commit = %commit_sha, entries = items.len(), "fetched full tree");
        Ok(tree::select_entries(
            items.into_iter().map(TreeEntry::from).collect(),
            params.path.as_deref(),
            params.recursive,
            params.pagination.page,
            params.pagination.per_page,
        ))
    }

    #[instrument(skip(self, params), fields(branch = %params.branch, actions = params.actions.len()))]
    async fn commit(&self, repo: &str, params: &CommitParams) -> Result<Commit> {
        let base = repo_path(repo)?;
        CommitOrchestrator::new(&self.http, &base).run(params).await
    }

    #[instrument(skip(self, filter))]
    async fn list_commits(&self, repo: &str, filter: &CommitFilter) -> Result<Vec<Commit>> {
        let path = format!("{}/commits", repo_path(repo)?);
        let mut query = filter.pagination.query();
        if let Some(ref_name) = &filter.ref_name {
            query.push(("sha", ref_name.clone()));
        }
        if let Some(file) = &filter.path {
            query.push(("path", file.clone()));
        }
        if let Some(author) = &filter.author {
            query.push(("author", author.clone()));
        }
        if let Some(since) = filter.since {
            query.push(("since", since.to_rfc3339()));
        }
        if let Some(until) = filter.until {
            query.push(("until", until.to_rfc3339()));
        }
        let commits: Vec<GitHubCommitListItem> = self.http.get(&path, &query).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, repo: &str, name: &str, source_ref: &str) -> Result<Branch> {
        let base = repo_path(repo)?;
        let sha = tree::resolve_ref(&self.http, &base, Some(source_ref)).await?;
        let body = CreateRefRequest {
            ref_name: format!("refs/heads/{}", name),
            sha: &sha,
        };
        let created: GitHubRef = self
            .http
            .post(&format!("{}/git/refs", base), &Query::new(), &body)
            .await?;
        Ok(Branch {
            name: name.to_string(),
            commit_sha: created.object.sha,
            protected: false,
            default: false,
        })
    }

    /// The branches endpoint has no search parameter, so `search` filters the
    /// returned page by substring.
    #[instrument(skip(self, filter))]
    async fn list_branches(&self, repo: &str, filter: &BranchFilter) -> Result<Vec<Branch>> {
        let base = repo_path(repo)?;
        let repository: GitHubRepository = self.http.get(&base, &Query::new()).await?;
        let branches: Vec<GitHubBranch> = self
            .http
            .get(&format!("{}/branches", base), &filter.pagination.query())
            .await?;
        Ok(branches
            .into_iter()
            .filter(|b| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |needle| b.name.contains(needle))
            })
            .map(|b| Branch {
                default: b.name == repository.default_branch,
                name: b.name,
                commit_sha: b.commit.sha,
                protected: b.protected,
            })
            .collect())
    }

    /// Code search only indexes the default branch, so `ref_name` is not
    /// forwarded and results report the default branch as the ref searched.
    #[instrument(skip(self))]
    async fn search_code(
        &self,
        repo: &str,
        query: &str,
        ref_name: Option<&str>,
    ) -> Result<Vec<SearchCodeResult>> {
        let base = repo_path(repo)?;
        let repository: GitHubRepository = self.http.get(&base, &Query::new()).await?;
        if let Some(requested) = ref_name {
            if requested != repository.default_branch {
                debug!(requested, searched = %repository.default_branch, "code search ignores ref");
            }
        }
        let params = vec![("q", format!("{} repo:{}", query, repo.trim()))];
        let found: GitHubCodeSearch = self
            .http
            .get_with_accept("/search/code", &params, TEXT_MATCH_MEDIA_TYPE)
            .await?;
        let ref_name = repository.default_branch;
        Ok(found
            .items
            .into_iter()
            .map(|item| SearchCodeResult {
                path: item.path,
                matches: item.text_matches.into_iter().map(|m| m.fragment).collect(),
                ref_name: ref_name.to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl PipelineProvider for GitHubProvider {
    #[instrument(skip(self))]
    async fn get_pipeline(&self, repo: &str, pipeline_id: u64) -> Result<Pipeline> {
        let path = format!("{}/actions/runs/{}", repo_path(repo)?, pipeline_id);
        let run: GitHubWorkflowRun = self.http.get(&path, &Query::new()).await?;
        Ok(run.into())
    }

    #[instrument(skip(self, filter))]
    async fn list_pipelines(&self, repo: &str, filter: &PipelineFilter) -> Result<Vec<Pipeline>> {
        let path = format!("{}/actions/runs", repo_path(repo)?);
        let mut query = filter.pagination.query();
        if let Some(status) = filter.status.and_then(run_status_query) {
            query.push(("status", status.to_string()));
        }
        if let Some(ref_name) = &filter.ref_name {
            query.push(("branch", ref_name.clone()));
        }
        if let Some(sha) = &filter.sha {
            query.push(("head_sha", sha.clone()));
        }
        let runs: GitHubWorkflowRuns = self.http.get(&path, &query).await?;
        Ok(runs
            .workflow_runs
            .into_iter()
            .map(Pipeline::from)
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .collect())
    }

    #[instrument(skip(self, filter))]
    async fn list_jobs(&self, repo: &str, pipeline_id: u64, filter: &JobFilter) -> Result<Vec<Job>> {
        let path = format!("{}/actions/runs/{}/jobs", repo_path(repo)?, pipeline_id);
        let jobs: GitHubJobs = self.http.get(&path, &filter.pagination.query()).await?;
        Ok(jobs
            .jobs
            .into_iter()
            .map(Job::from)
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_job_log(&self, repo: &str, job_id: u64) -> Result<String> {
        let path = format!("{}/actions/jobs/{}/logs", repo_path(repo)?, job_id);
        self.http.get_text(&path, &Query::new()).await
    }
}

#[async_trait]
impl UserProvider for GitHubProvider {
    #[instrument(skip(self))]
    async fn get_me(&self) -> Result<User> {
        let user: GitHubUser = self.http.get("/user", &Query::new()).await?;
        Ok(user.into())
    }
}

impl Provider for GitHubProvider {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }
}
