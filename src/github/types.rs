//! GitHub REST API payloads and their canonical conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::normalize::{self, RawLabel};

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl From<GitHubUser> for User {
    fn from(user: GitHubUser) -> Self {
        User {
            id: user.id,
            name: user.name.unwrap_or_else(|| user.login.clone()),
            username: user.login,
            avatar_url: user.avatar_url,
            web_url: user.html_url,
        }
    }
}

fn users(list: Vec<GitHubUser>) -> Vec<User> {
    list.into_iter().map(User::from).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<RawLabel>,
    pub user: GitHubUser,
    #[serde(default)]
    pub assignees: Vec<GitHubUser>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Present when the "issue" is really a pull request
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl GitHubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

impl From<GitHubIssue> for Issue {
    fn from(raw: GitHubIssue) -> Self {
        Issue {
            id: raw.id,
            iid: raw.number,
            title: raw.title,
            description: raw.body,
            state: normalize::map_issue_state(&raw.state),
            author: raw.user.into(),
            assignees: users(raw.assignees),
            labels: normalize::label_names(&raw.labels),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            closed_at: raw.closed_at,
            web_url: raw.html_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssueSearch {
    pub items: Vec<GitHubIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub id: u64,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    /// Only returned by the single pull request endpoint
    #[serde(default)]
    pub merged: Option<bool>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub mergeable: Option<bool>,
    pub head: GitHubBranchRef,
    pub base: GitHubBranchRef,
    pub user: GitHubUser,
    #[serde(default)]
    pub assignees: Vec<GitHubUser>,
    #[serde(default)]
    pub requested_reviewers: Vec<GitHubUser>,
    #[serde(default)]
    pub labels: Vec<RawLabel>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<GitHubPullRequest> for PullRequest {
    fn from(raw: GitHubPullRequest) -> Self {
        let state = normalize::reconcile_pull_request_state(
            &raw.state,
            raw.merged.unwrap_or(false),
            raw.merged_at.as_ref(),
        );
        PullRequest {
            id: raw.id,
            iid: raw.number,
            title: raw.title,
            description: raw.body,
            state,
            author: raw.user.into(),
            assignees: users(raw.assignees),
            reviewers: users(raw.requested_reviewers),
            labels: normalize::label_names(&raw.labels),
            source_branch: raw.head.ref_name,
            target_branch: raw.base.ref_name,
            // GitHub has no legacy work-in-progress field.
            draft: normalize::resolve_draft(raw.draft, None),
            mergeable: normalize::github_mergeable(raw.mergeable),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            closed_at: raw.closed_at,
            merged_at: raw.merged_at,
            web_url: raw.html_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    pub user: GitHubUser,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GitHubComment> for Comment {
    fn from(raw: GitHubComment) -> Self {
        Comment {
            id: raw.id,
            body: raw.body.unwrap_or_default(),
            author: raw.user.into(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullFile {
    pub filename: String,
    #[serde(default)]
    pub previous_filename: Option<String>,
    pub status: String,
    pub additions: usize,
    pub deletions: usize,
    #[serde(default)]
    pub patch: Option<String>,
}

impl From<GitHubPullFile> for FileDiff {
    fn from(raw: GitHubPullFile) -> Self {
        FileDiff {
            old_path: raw.previous_filename.unwrap_or_else(|| raw.filename.clone()),
            new_file: raw.status == "added",
            renamed_file: raw.status == "renamed",
            deleted_file: raw.status == "removed",
            new_path: raw.filename,
            diff: raw.patch.unwrap_or_default(),
            additions: raw.additions,
            deletions: raw.deletions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubMergeResult {
    pub merged: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubContentItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Tree mode for a contents-API item type, which carries no mode itself.
pub fn content_mode(item_type: &str) -> &'static str {
    match item_type {
        "dir" => "040000",
        "symlink" => "120000",
        "submodule" => "160000",
        _ => "100644",
    }
}

impl From<GitHubContentItem> for TreeEntry {
    fn from(raw: GitHubContentItem) -> Self {
        TreeEntry {
            mode: content_mode(&raw.item_type).to_string(),
            entry_type: if raw.item_type == "dir" {
                EntryType::Directory
            } else {
                EntryType::File
            },
            name: raw.name,
            path: raw.path,
            sha: Some(raw.sha),
        }
    }
}

/// The contents endpoint returns an array for directories and an object for files.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GitHubContents {
    Directory(Vec<GitHubContentItem>),
    File(GitHubContentItem),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubObject {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub object: GitHubObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubGitActor {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Commit as returned by the git data API and the contents write endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubGitCommit {
    pub sha: String,
    pub message: String,
    pub tree: GitHubObject,
    pub author: GitHubGitActor,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl From<GitHubGitCommit> for Commit {
    fn from(raw: GitHubGitCommit) -> Self {
        Commit {
            short_sha: Commit::abbreviate(&raw.sha),
            sha: raw.sha,
            message: raw.message,
            author_name: raw.author.name,
            author_email: raw.author.email,
            authored_at: raw.author.date,
            stats: None,
            web_url: raw.html_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubContentWrite {
    pub commit: GitHubGitCommit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubTreeItem {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub sha: Option<String>,
}

impl From<GitHubTreeItem> for TreeEntry {
    fn from(raw: GitHubTreeItem) -> Self {
        TreeEntry {
            name: raw.path.rsplit('/').next().unwrap_or(&raw.path).to_string(),
            entry_type: if raw.item_type == "tree" {
                EntryType::Directory
            } else {
                EntryType::File
            },
            path: raw.path,
            mode: raw.mode,
            sha: raw.sha,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubTree {
    pub sha: String,
    pub tree: Vec<GitHubTreeItem>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitDetail {
    pub message: String,
    #[serde(default)]
    pub author: Option<GitHubGitActor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitListItem {
    pub sha: String,
    pub commit: GitHubCommitDetail,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub stats: Option<GitHubStats>,
}

impl From<GitHubCommitListItem> for Commit {
    fn from(raw: GitHubCommitListItem) -> Self {
        let (author_name, author_email, authored_at) = match raw.commit.author {
            Some(author) => (author.name, author.email, author.date),
            None => (String::new(), String::new(), None),
        };
        Commit {
            short_sha: Commit::abbreviate(&raw.sha),
            sha: raw.sha,
            message: raw.commit.message,
            author_name,
            author_email,
            authored_at,
            stats: raw.stats.map(|s| CommitStats {
                additions: s.additions,
                deletions: s.deletions,
                total: s.total,
            }),
            web_url: raw.html_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranch {
    pub name: String,
    pub commit: GitHubObject,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepository {
    pub default_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubTextMatch {
    #[serde(default)]
    pub fragment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCodeItem {
    pub path: String,
    #[serde(default)]
    pub text_matches: Vec<GitHubTextMatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCodeSearch {
    pub items: Vec<GitHubCodeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubWorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub run_number: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    pub head_sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<GitHubWorkflowRun> for Pipeline {
    fn from(raw: GitHubWorkflowRun) -> Self {
        Pipeline {
            id: raw.id,
            number: raw.run_number,
            status: normalize::map_github_status(
                raw.status.as_deref().unwrap_or("queued"),
                raw.conclusion.as_deref(),
            ),
            ref_name: raw.head_branch.unwrap_or_default(),
            sha: raw.head_sha,
            web_url: raw.html_url,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubWorkflowRuns {
    pub workflow_runs: Vec<GitHubWorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubJob {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl From<GitHubJob> for Job {
    fn from(raw: GitHubJob) -> Self {
        Job {
            id: raw.id,
            // Actions has no stages; the workflow is the closest grouping.
            stage: raw.workflow_name.unwrap_or_else(|| raw.name.clone()),
            name: raw.name,
            status: normalize::map_github_status(&raw.status, raw.conclusion.as_deref()),
            duration_seconds: normalize::job_duration(raw.started_at.as_ref(), raw.completed_at.as_ref()),
            created_at: raw.created_at,
            started_at: raw.started_at,
            finished_at: raw.completed_at,
            web_url: raw.html_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubJobs {
    pub jobs: Vec<GitHubJob>,
}

// Request bodies

fn is_empty(list: &&[String]) -> bool {
    list.is_empty()
}

#[derive(Debug, Serialize)]
pub struct CreateIssueRequest<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty")]
    pub labels: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    pub assignees: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct UpdateIssueRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
pub struct CreateCommentRequest<'a> {
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreatePullRequestRequest<'a> {
    pub title: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    pub draft: bool,
}

#[derive(Debug, Serialize)]
pub struct MergePullRequestRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<&'a str>,
    pub merge_method: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ContentWriteRequest<'a> {
    pub message: &'a str,
    /// Base64-encoded file content
    pub content: String,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a CommitAuthor>,
}

#[derive(Debug, Serialize)]
pub struct CreateBlobRequest<'a> {
    pub content: &'a str,
    /// `utf-8` or `base64`
    pub encoding: &'static str,
}

/// Tree entry for the create-tree call. A `null` sha removes the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntryRequest {
    pub path: String,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub item_type: &'static str,
    pub sha: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTreeRequest<'a> {
    pub base_tree: &'a str,
    pub tree: &'a [TreeEntryRequest],
}

#[derive(Debug, Serialize)]
pub struct CreateGitCommitRequest<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a CommitAuthor>,
}

#[derive(Debug, Serialize)]
pub struct UpdateRefRequest<'a> {
    pub sha: &'a str,
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull_json(state: &str, merged: Option<bool>, merged_at: Option<&str>) -> String {
        serde_json::json!({
            "id": 1, "number": 5, "title": "t", "body": null, "state": state,
            "merged": merged, "merged_at": merged_at, "draft": false, "mergeable": null,
            "head": {"ref": "feat", "sha": "aaa"}, "base": {"ref": "main", "sha": "bbb"},
            "user": {"id": 9, "login": "octo"},
            "labels": [{"id": 1, "name": "bug", "color": "red"}],
            "html_url": "https://github.com/o/r/pull/5",
            "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
        })
        .to_string()
    }

    #[test]
    fn test_pull_request_merged_inference() {
        let raw: GitHubPullRequest = serde_json::from_str(&pull_json("closed", Some(true), None)).unwrap();
        assert_eq!(PullRequest::from(raw).state, PullRequestState::Merged);

        let raw: GitHubPullRequest =
            serde_json::from_str(&pull_json("closed", None, Some("2024-01-02T00:00:00Z"))).unwrap();
        assert_eq!(PullRequest::from(raw).state, PullRequestState::Merged);

        let raw: GitHubPullRequest = serde_json::from_str(&pull_json("closed", Some(false), None)).unwrap();
        let pr = PullRequest::from(raw);
        assert_eq!(pr.state, PullRequestState::Closed);
        assert!(!pr.mergeable);
        assert_eq!(pr.labels, vec!["bug".to_string()]);
        assert_eq!(pr.author.name, "octo");
        assert_eq!(pr.source_branch, "feat");
    }

    #[test]
    fn test_contents_shape_discrimination() {
        let dir: GitHubContents = serde_json::from_str(
            r#"[{"type":"dir","name":"src","path":"src","sha":"1","size":0}]"#,
        )
        .unwrap();
        assert!(matches!(dir, GitHubContents::Directory(ref items) if items.len() == 1));

        let file: GitHubContents = serde_json::from_str(
            r#"{"type":"file","name":"a","path":"a","sha":"2","size":2,"content":"aGk=\n","encoding":"base64"}"#,
        )
        .unwrap();
        assert!(matches!(file, GitHubContents::File(_)));
    }

    #[test]
    fn test_tree_item_name_is_last_segment() {
        let item = GitHubTreeItem {
            path: "src/bin/main.rs".to_string(),
            mode: "100644".to_string(),
            item_type: "blob".to_string(),
            sha: Some("x".to_string()),
        };
        let entry = TreeEntry::from(item);
        assert_eq!(entry.name, "main.rs");
        assert_eq!(entry.entry_type, EntryType::File);
    }

    #[test]
    fn test_delete_entry_serializes_null_sha() {
        let entry = TreeEntryRequest {
            path: "gone.txt".to_string(),
            mode: "100644",
            item_type: "blob",
            sha: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json["sha"].is_null());
        assert!(json.as_object().unwrap().contains_key("sha"));
    }

    #[test]
    fn test_job_stage_and_duration() {
        let raw: GitHubJob = serde_json::from_str(
            r#"{"id":3,"name":"build","status":"completed","conclusion":"failure",
                "workflow_name":"CI","started_at":"2024-01-01T00:00:00Z",
                "completed_at":"2024-01-01T00:01:30Z"}"#,
        )
        .unwrap();
        let job = Job::from(raw);
        assert_eq!(job.stage, "CI");
        assert_eq!(job.status, PipelineStatus::Failed);
        assert_eq!(job.duration_seconds, Some(90));
    }
}
