//! GitLab adapter (REST API v4).
//!
//! Projects are addressed by numeric id or by their full path, which GitLab
//! expects URL-encoded into a single path segment (`group%2Fproject`).

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, instrument};

use crate::auth::AuthProvider;
use crate::error::{ErrorCode, ProviderError, Result};
use crate::http::{HttpClient, Query};
use crate::model::*;
use crate::provider::{
    IssueProvider, PipelineProvider, Platform, Provider, PullRequestProvider, RepositoryProvider,
    UserProvider,
};
use types::*;

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4";

/// Ref used when the caller gives none; GitLab resolves it to the default branch.
const DEFAULT_REF: &str = "HEAD";

/// Pipeline `status` / job `scope[]` value for canonical statuses that map one
/// to one. Pending and canceled each cover several raw values and are only
/// filtered locally.
fn status_query(status: PipelineStatus) -> Option<&'static str> {
    match status {
        PipelineStatus::Running => Some("running"),
        PipelineStatus::Success => Some("success"),
        PipelineStatus::Failed => Some("failed"),
        PipelineStatus::Skipped => Some("skipped"),
        PipelineStatus::Manual => Some("manual"),
        PipelineStatus::Pending | PipelineStatus::Canceled => None,
    }
}

#[derive(Debug, Clone)]
pub struct GitLabProvider {
    http: HttpClient,
}

impl GitLabProvider {
    pub fn new(base_url: &str, auth: Arc<dyn AuthProvider>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(
            Platform::GitLab,
            base_url,
            auth,
            timeout,
            &[("Accept", "application/json")],
        )?;
        Ok(Self { http })
    }

    /// Look up numeric user ids for a list of usernames, one request each.
    async fn resolve_user_ids(&self, handles: &[String]) -> Result<Vec<u64>> {
        let mut ids = Vec::with_capacity(handles.len());
        for handle in handles {
            let query = vec![("username", handle.clone())];
            let found: Vec<GitLabUser> = self.http.get("/users", &query).await?;
            let user = found.into_iter().next().ok_or_else(|| ProviderError {
                status: Some(422),
                ..ProviderError::new(
                    Platform::GitLab,
                    ErrorCode::ValidationError,
                    format!("unknown user '{}'", handle),
                )
            })?;
            ids.push(user.id);
        }
        Ok(ids)
    }

    async fn list_notes(
        &self,
        project: &str,
        noteable: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<Comment>> {
        let path = format!("/projects/{}/{}/{}/notes", project, noteable, iid);
        let mut query = pagination.query();
        query.push(("sort", "asc".to_string()));
        let notes: Vec<GitLabNote> = self.http.get(&path, &query).await?;
        Ok(notes.into_iter().map(Comment::from).collect())
    }

    async fn create_note(&self, project: &str, noteable: &str, iid: u64, body: &str) -> Result<Comment> {
        let path = format!("/projects/{}/{}/{}/notes", project, noteable, iid);
        let note: GitLabNote = self
            .http
            .post(&path, &Query::new(), &CreateNoteRequest { body })
            .await?;
        Ok(note.into())
    }
}

/// Encode a repo identifier into GitLab's `:id` path segment.
pub fn project_path(repo: &str) -> Result<String> {
    let repo = repo.trim();
    let invalid = || {
        ProviderError::bad_request(
            Platform::GitLab,
            format!("invalid project identifier '{}': expected a numeric id or group/project", repo),
        )
    };
    if repo.is_empty() {
        return Err(invalid());
    }
    if repo.chars().all(|c| c.is_ascii_digit()) {
        return Ok(repo.to_string());
    }
    let segments: Vec<&str> = repo.split('/').collect();
    if segments.len() < 2
        || segments
            .iter()
            .any(|s| s.is_empty() || s.chars().any(char::is_whitespace))
    {
        return Err(invalid());
    }
    Ok(urlencoding::encode(repo).into_owned())
}

fn join_labels(labels: &[String]) -> Option<String> {
    (!labels.is_empty()).then(|| labels.join(","))
}

fn sort_field(field: SortField) -> &'static str {
    match field {
        SortField::Created => "created_at",
        SortField::Updated => "updated_at",
    }
}

fn decode_file(file: GitLabFile) -> Result<FileContent> {
    let content = if file.encoding == "base64" {
        let cleaned: String = file.content.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| {
                ProviderError::new(
                    Platform::GitLab,
                    ErrorCode::Platform,
                    format!("could not decode file content: {}", e),
                )
            })?;
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        file.content
    };
    Ok(FileContent {
        name: file.file_name,
        path: file.file_path,
        content,
        size: file.size,
        sha: file.blob_id,
    })
}

#[async_trait]
impl IssueProvider for GitLabProvider {
    #[instrument(skip(self))]
    async fn get_issue(&self, repo: &str, iid: u64) -> Result<Issue> {
        let path = format!("/projects/{}/issues/{}", project_path(repo)?, iid);
        let issue: GitLabIssue = self.http.get(&path, &Query::new()).await?;
        Ok(issue.into())
    }

    #[instrument(skip(self, filter))]
    async fn list_issues(&self, repo: &str, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let path = format!("/projects/{}/issues", project_path(repo)?);
        let mut query = filter.pagination.query();
        if let Some(state) = filter.state {
            let state = match state {
                IssueStateFilter::Open => "opened",
                IssueStateFilter::Closed => "closed",
                IssueStateFilter::All => "all",
            };
            query.push(("state", state.to_string()));
        }
        if let Some(labels) = join_labels(&filter.labels) {
            query.push(("labels", labels));
        }
        if let Some(search) = &filter.search {
            query.push(("search", search.clone()));
        }
        if let Some(assignee) = &filter.assignee {
            query.push(("assignee_username", assignee.clone()));
        }
        if let Some(author) = &filter.author {
            query.push(("author_username", author.clone()));
        }
        if let Some(sort) = filter.sort {
            query.push(("order_by", sort_field(sort).to_string()));
        }
        if let Some(direction) = filter.direction {
            query.push(("sort", direction.as_str().to_string()));
        }

        let issues: Vec<GitLabIssue> = self.http.get(&path, &query).await?;
        debug!(count = issues.len(), "listed issues");
        Ok(issues.into_iter().map(Issue::from).collect())
    }

    #[instrument(skip(self, params), fields(title = %params.title))]
    async fn create_issue(&self, repo: &str, params: &CreateIssueParams) -> Result<Issue> {
        let path = format!("/projects/{}/issues", project_path(repo)?);
        let assignee_ids = if params.assignees.is_empty() {
            None
        } else {
            Some(self.resolve_user_ids(&params.assignees).await?)
        };
        let body = CreateIssueRequest {
            title: params.title.clone(),
            description: params.description.clone(),
            labels: join_labels(&params.labels),
            assignee_ids,
        };
        let issue: GitLabIssue = self.http.post(&path, &Query::new(), &body).await?;
        Ok(issue.into())
    }

    #[instrument(skip(self, params))]
    async fn update_issue(
        &self,
        repo: &str,
        iid: u64,
        params: &UpdateIssueParams,
    ) -> Result<Issue> {
        let path = format!("/projects/{}/issues/{}", project_path(repo)?, iid);
        let assignee_ids = match &params.assignees {
            Some(handles) => Some(self.resolve_user_ids(handles).await?),
            None => None,
        };
        let body = UpdateIssueRequest {
            title: params.title.clone(),
            description: params.description.clone(),
            state_event: params.state.map(|state| match state {
                IssueState::Open => "reopen",
                IssueState::Closed => "close",
            }),
            // An explicit empty list clears labels.
            labels: params.labels.as_ref().map(|l| l.join(",")),
            assignee_ids,
        };
        let issue: GitLabIssue = self.http.put(&path, &body).await?;
        Ok(issue.into())
    }

    #[instrument(skip(self, body))]
    async fn create_issue_comment(&self, repo: &str, iid: u64, body: &str) -> Result<Comment> {
        self.create_note(&project_path(repo)?, "issues", iid, body).await
    }

    #[instrument(skip(self, pagination))]
    async fn list_issue_comments(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<Comment>> {
        self.list_notes(&project_path(repo)?, "issues", iid, pagination)
            .await
    }
}

#[async_trait]
impl PullRequestProvider for GitLabProvider {
    #[instrument(skip(self))]
    async fn get_pull_request(&self, repo: &str, iid: u64) -> Result<PullRequest> {
        let path = format!("/projects/{}/merge_requests/{}", project_path(repo)?, iid);
        let mr: GitLabMergeRequest = self.http.get(&path, &Query::new()).await?;
        Ok(mr.into())
    }

    #[instrument(skip(self, filter))]
    async fn list_pull_requests(
        &self,
        repo: &str,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>> {
        let path = format!("/projects/{}/merge_requests", project_path(repo)?);
        let mut query = filter.pagination.query();
        if let Some(state) = filter.state {
            let state = match state {
                PullRequestStateFilter::Open => "opened",
                PullRequestStateFilter::Closed => "closed",
                PullRequestStateFilter::Merged => "merged",
                PullRequestStateFilter::All => "all",
            };
            query.push(("state", state.to_string()));
        }
        if let Some(source) = &filter.source_branch {
            query.push(("source_branch", source.clone()));
        }
        if let Some(target) = &filter.target_branch {
            query.push(("target_branch", target.clone()));
        }
        if let Some(sort) = filter.sort {
            query.push(("order_by", sort_field(sort).to_string()));
        }
        if let Some(direction) = filter.direction {
            query.push(("sort", direction.as_str().to_string()));
        }

        let mrs: Vec<GitLabMergeRequest> = self.http.get(&path, &query).await?;
        Ok(mrs.into_iter().map(PullRequest::from).collect())
    }

    #[instrument(skip(self, params), fields(source = %params.source_branch, target = %params.target_branch))]
    async fn create_pull_request(
        &self,
        repo: &str,
        params: &CreatePullRequestParams,
    ) -> Result<PullRequest> {
        let path = format!("/projects/{}/merge_requests", project_path(repo)?);
        let title = if params.draft && !params.title.starts_with("Draft:") {
            format!("Draft: {}", params.title)
        } else {
            params.title.clone()
        };
        let body = CreateMergeRequestRequest {
            source_branch: params.source_branch.clone(),
            target_branch: params.target_branch.clone(),
            title,
            description: params.description.clone(),
        };
        let mr: GitLabMergeRequest = self.http.post(&path, &Query::new(), &body).await?;
        Ok(mr.into())
    }

    #[instrument(skip(self, pagination))]
    async fn get_pull_request_diffs(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<FileDiff>> {
        let path = format!("/projects/{}/merge_requests/{}/diffs", project_path(repo)?, iid);
        let diffs: Vec<GitLabDiff> = self.http.get(&path, &pagination.query()).await?;
        Ok(diffs.into_iter().map(FileDiff::from).collect())
    }

    #[instrument(skip(self, params))]
    async fn merge_pull_request(
        &self,
        repo: &str,
        iid: u64,
        params: &MergeParams,
    ) -> Result<PullRequest> {
        let path = format!("/projects/{}/merge_requests/{}/merge", project_path(repo)?, iid);
        let body = MergeRequestMergeRequest {
            merge_commit_message: params.message.clone(),
            squash: params.squash,
            should_remove_source_branch: params.delete_source_branch,
        };
        let mr: GitLabMergeRequest = self.http.put(&path, &body).await?;
        Ok(mr.into())
    }

    #[instrument(skip(self, body))]
    async fn create_pull_request_comment(
        &self,
        repo: &str,
        iid: u64,
        body: &str,
    ) -> Result<Comment> {
        self.create_note(&project_path(repo)?, "merge_requests", iid, body)
            .await
    }

    #[instrument(skip(self, pagination))]
    async fn list_pull_request_comments(
        &self,
        repo: &str,
        iid: u64,
        pagination: &Pagination,
    ) -> Result<Vec<Comment>> {
        self.list_notes(&project_path(repo)?, "merge_requests", iid, pagination)
            .await
    }
}

#[async_trait]
impl RepositoryProvider for GitLabProvider {
    /// Files and directories share a path space; a 404 on the file endpoint
    /// is retried as a directory listing.
    #[instrument(skip(self))]
    async fn get_content(
        &self,
        repo: &str,
        path: &str,
        ref_name: Option<&str>,
    ) -> Result<Content> {
        let project = project_path(repo)?;
        let clean = path.trim_matches('/');
        let ref_name = ref_name.unwrap_or(DEFAULT_REF);

        let file_path = format!(
            "/projects/{}/repository/files/{}",
            project,
            urlencoding::encode(clean)
        );
        let query = vec![("ref", ref_name.to_string())];
        if !clean.is_empty() {
            if let Some(file) = self.http.get_optional::<GitLabFile>(&file_path, &query).await? {
                return Ok(Content::File(decode_file(file)?));
            }
            debug!(path = clean, "file not found, trying directory listing");
        }

        let tree_path = format!("/projects/{}/repository/tree", project);
        let mut entries: Vec<GitLabTreeEntry> = Vec::new();
        // Walk pages until a short one; a directory is never returned truncated.
        for page in 1u32.. {
            let mut query = vec![
                ("ref", ref_name.to_string()),
                ("page", page.to_string()),
                ("per_page", MAX_PER_PAGE.to_string()),
            ];
            if !clean.is_empty() {
                query.push(("path", clean.to_string()));
            }
            let batch: Vec<GitLabTreeEntry> = self.http.get(&tree_path, &query).await?;
            let last = batch.len() < MAX_PER_PAGE as usize;
            entries.extend(batch);
            if last {
                break;
            }
        }
        if entries.is_empty() && !clean.is_empty() {
            return Err(ProviderError::not_found(
                Platform::GitLab,
                format!("path '{}' not found at ref '{}'", clean, ref_name),
            ));
        }
        Ok(Content::Directory(DirectoryContent {
            path: clean.to_string(),
            entries: entries.into_iter().map(TreeEntry::from).collect(),
        }))
    }

    #[instrument(skip(self, params))]
    async fn get_tree(&self, repo: &str, params: &TreeParams) -> Result<Vec<TreeEntry>> {
        let path = format!("/projects/{}/repository/tree", project_path(repo)?);
        let mut query = params.pagination.query();
        if let Some(dir) = params.path.as_deref().map(|p| p.trim_matches('/')) {
            if !dir.is_empty() {
                query.push(("path", dir.to_string()));
            }
        }
        if let Some(ref_name) = &params.ref_name {
            query.push(("ref", ref_name.clone()));
        }
        if params.recursive {
            query.push(("recursive", "true".to_string()));
        }
        let entries: Vec<GitLabTreeEntry> = self.http.get(&path, &query).await?;
        Ok(entries.into_iter().map(TreeEntry::from).collect())
    }

    /// GitLab applies all actions atomically in one call.
    #[instrument(skip(self, params), fields(branch = %params.branch, actions = params.actions.len()))]
    async fn commit(&self, repo: &str, params: &CommitParams) -> Result<Commit> {
        if params.actions.is_empty() {
            return Err(ProviderError::bad_request(
                Platform::GitLab,
                "commit requires at least one file action",
            ));
        }
        let path = format!("/projects/{}/repository/commits", project_path(repo)?);
        let body = CreateCommitRequest {
            branch: params.branch.clone(),
            commit_message: params.message.clone(),
            start_branch: params.base_branch.clone(),
            actions: params.actions.iter().map(CommitActionRequest::from).collect(),
            author_name: params.author.as_ref().map(|a| a.name.clone()),
            author_email: params.author.as_ref().map(|a| a.email.clone()),
        };
        let commit: GitLabCommit = self.http.post(&path, &Query::new(), &body).await?;
        Ok(commit.into())
    }

    #[instrument(skip(self, filter))]
    async fn list_commits(&self, repo: &str, filter: &CommitFilter) -> Result<Vec<Commit>> {
        let path = format!("/projects/{}/repository/commits", project_path(repo)?);
        let mut query = filter.pagination.query();
        if let Some(ref_name) = &filter.ref_name {
            query.push(("ref_name", ref_name.clone()));
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
        let commits: Vec<GitLabCommit> = self.http.get(&path, &query).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, repo: &str, name: &str, source_ref: &str) -> Result<Branch> {
        let path = format!("/projects/{}/repository/branches", project_path(repo)?);
        let body = CreateBranchRequest {
            branch: name,
            ref_name: source_ref,
        };
        let branch: GitLabBranch = self.http.post(&path, &Query::new(), &body).await?;
        Ok(branch.into())
    }

    #[instrument(skip(self, filter))]
    async fn list_branches(&self, repo: &str, filter: &BranchFilter) -> Result<Vec<Branch>> {
        let path = format!("/projects/{}/repository/branches", project_path(repo)?);
        let mut query = filter.pagination.query();
        if let Some(search) = &filter.search {
            query.push(("search", search.clone()));
        }
        let branches: Vec<GitLabBranch> = self.http.get(&path, &query).await?;
        Ok(branches.into_iter().map(Branch::from).collect())
    }

    #[instrument(skip(self))]
    async fn search_code(
        &self,
        repo: &str,
        query: &str,
        ref_name: Option<&str>,
    ) -> Result<Vec<SearchCodeResult>> {
        let path = format!("/projects/{}/search", project_path(repo)?);
        let mut params = vec![("scope", "blobs".to_string()), ("search", query.to_string())];
        if let Some(ref_name) = ref_name {
            params.push(("ref", ref_name.to_string()));
        }
        let matches: Vec<GitLabBlobMatch> = self.http.get(&path, &params).await?;
        Ok(matches.into_iter().map(SearchCodeResult::from).collect())
    }
}

#[async_trait]
impl PipelineProvider for GitLabProvider {
    #[instrument(skip(self))]
    async fn get_pipeline(&self, repo: &str, pipeline_id: u64) -> Result<Pipeline> {
        let path = format!("/projects/{}/pipelines/{}", project_path(repo)?, pipeline_id);
        let pipeline: GitLabPipeline = self.http.get(&path, &Query::new()).await?;
        Ok(pipeline.into())
    }

    #[instrument(skip(self, filter))]
    async fn list_pipelines(&self, repo: &str, filter: &PipelineFilter) -> Result<Vec<Pipeline>> {
        let path = format!("/projects/{}/pipelines", project_path(repo)?);
        let mut query = filter.pagination.query();
        if let Some(status) = filter.status.and_then(status_query) {
            query.push(("status", status.to_string()));
        }
        if let Some(ref_name) = &filter.ref_name {
            query.push(("ref", ref_name.clone()));
        }
        if let Some(sha) = &filter.sha {
            query.push(("sha", sha.clone()));
        }
        let pipelines: Vec<GitLabPipeline> = self.http.get(&path, &query).await?;
        Ok(pipelines
            .into_iter()
            .map(Pipeline::from)
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .collect())
    }

    #[instrument(skip(self, filter))]
    async fn list_jobs(&self, repo: &str, pipeline_id: u64, filter: &JobFilter) -> Result<Vec<Job>> {
        let path = format!(
            "/projects/{}/pipelines/{}/jobs",
            project_path(repo)?,
            pipeline_id
        );
        let mut query = filter.pagination.query();
        if let Some(status) = filter.status.and_then(status_query) {
            query.push(("scope[]", status.to_string()));
        }
        let jobs: Vec<GitLabJob> = self.http.get(&path, &query).await?;
        Ok(jobs
            .into_iter()
            .map(Job::from)
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_job_log(&self, repo: &str, job_id: u64) -> Result<String> {
        let path = format!("/projects/{}/jobs/{}/trace", project_path(repo)?, job_id);
        self.http.get_text(&path, &Query::new()).await
    }
}

#[async_trait]
impl UserProvider for GitLabProvider {
    #[instrument(skip(self))]
    async fn get_me(&self) -> Result<User> {
        let user: GitLabUser = self.http.get("/user", &Query::new()).await?;
        Ok(user.into())
    }
}

impl Provider for GitLabProvider {
    fn platform(&self) -> Platform {
        Platform::GitLab
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_path_encoding() {
        assert_eq!(project_path("42").unwrap(), "42");
        assert_eq!(project_path("group/project").unwrap(), "group%2Fproject");
        assert_eq!(
            project_path("group/sub/project").unwrap(),
            "group%2Fsub%2Fproject"
        );
    }

    #[test]
    fn test_project_path_rejects_malformed() {
        for bad in ["", "project", "group/", "/project", "a//b", "a b/c"] {
            let err = project_path(bad).unwrap_err();
            assert_eq!(err.code, ErrorCode::BadRequest, "{bad:?}");
            assert_eq!(err.status, Some(400));
        }
    }

    #[test]
    fn test_status_query_only_for_one_to_one_statuses() {
        assert_eq!(status_query(PipelineStatus::Failed), Some("failed"));
        assert_eq!(status_query(PipelineStatus::Manual), Some("manual"));
        assert_eq!(status_query(PipelineStatus::Pending), None);
        assert_eq!(status_query(PipelineStatus::Canceled), None);
    }

    #[test]
    fn test_decode_base64_file() {
        let file = GitLabFile {
            file_name: "a.txt".to_string(),
            file_path: "dir/a.txt".to_string(),
            size: 2,
            encoding: "base64".to_string(),
            content: "aGk=".to_string(),
            blob_id: "deadbeef".to_string(),
        };
        let decoded = decode_file(file).unwrap();
        assert_eq!(decoded.content, "hi");
        assert_eq!(decoded.sha, "deadbeef");
    }
}
