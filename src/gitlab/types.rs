//! GitLab REST API v4 payloads and their canonical conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diff;
use crate::model::*;
use crate::normalize::{self, RawLabel};

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

impl From<GitLabUser> for User {
    fn from(user: GitLabUser) -> Self {
        User {
            id: user.id,
            name: user.name.unwrap_or_else(|| user.username.clone()),
            username: user.username,
            avatar_url: user.avatar_url,
            web_url: user.web_url,
        }
    }
}

fn users(list: Vec<GitLabUser>) -> Vec<User> {
    list.into_iter().map(User::from).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabIssue {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<RawLabel>,
    pub author: GitLabUser,
    #[serde(default)]
    pub assignees: Vec<GitLabUser>,
    pub web_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<GitLabIssue> for Issue {
    fn from(raw: GitLabIssue) -> Self {
        Issue {
            id: raw.id,
            iid: raw.iid,
            title: raw.title,
            description: raw.description,
            state: normalize::map_issue_state(&raw.state),
            author: raw.author.into(),
            assignees: users(raw.assignees),
            labels: normalize::label_names(&raw.labels),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            closed_at: raw.closed_at,
            web_url: raw.web_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabMergeRequest {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    pub source_branch: String,
    pub target_branch: String,
    pub author: GitLabUser,
    #[serde(default)]
    pub assignees: Vec<GitLabUser>,
    #[serde(default)]
    pub reviewers: Vec<GitLabUser>,
    #[serde(default)]
    pub labels: Vec<RawLabel>,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub work_in_progress: Option<bool>,
    #[serde(default)]
    pub merge_status: Option<String>,
    #[serde(default)]
    pub detailed_merge_status: Option<String>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    pub web_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GitLabMergeRequest> for PullRequest {
    fn from(raw: GitLabMergeRequest) -> Self {
        // GitLab has no separate merged flag; `state == "merged"` carries it.
        let state = normalize::reconcile_pull_request_state(&raw.state, false, raw.merged_at.as_ref());
        PullRequest {
            id: raw.id,
            iid: raw.iid,
            title: raw.title,
            description: raw.description,
            state,
            author: raw.author.into(),
            assignees: users(raw.assignees),
            reviewers: users(raw.reviewers),
            labels: normalize::label_names(&raw.labels),
            source_branch: raw.source_branch,
            target_branch: raw.target_branch,
            draft: normalize::resolve_draft(raw.draft, raw.work_in_progress),
            mergeable: normalize::gitlab_mergeable(
                raw.merge_status.as_deref(),
                raw.detailed_merge_status.as_deref(),
            ),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            closed_at: raw.closed_at,
            merged_at: raw.merged_at,
            web_url: raw.web_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabNote {
    pub id: u64,
    pub body: String,
    pub author: GitLabUser,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<GitLabNote> for Comment {
    fn from(raw: GitLabNote) -> Self {
        Comment {
            id: raw.id,
            body: raw.body,
            author: raw.author.into(),
            updated_at: raw.updated_at.unwrap_or(raw.created_at),
            created_at: raw.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabDiff {
    pub old_path: String,
    pub new_path: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
    #[serde(default)]
    pub diff: String,
}

impl From<GitLabDiff> for FileDiff {
    fn from(raw: GitLabDiff) -> Self {
        let (additions, deletions) = diff::line_stats(&raw.diff).unwrap_or_else(|e| {
            warn!(path = %raw.new_path, error = %e, "could not count diff lines");
            (0, 0)
        });
        FileDiff {
            old_path: raw.old_path,
            new_path: raw.new_path,
            new_file: raw.new_file,
            renamed_file: raw.renamed_file,
            deleted_file: raw.deleted_file,
            diff: raw.diff,
            additions,
            deletions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabFile {
    pub file_name: String,
    pub file_path: String,
    pub size: u64,
    pub encoding: String,
    pub content: String,
    pub blob_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabTreeEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub path: String,
    pub mode: String,
}

impl From<GitLabTreeEntry> for TreeEntry {
    fn from(raw: GitLabTreeEntry) -> Self {
        TreeEntry {
            name: raw.name,
            path: raw.path,
            entry_type: if raw.entry_type == "tree" {
                EntryType::Directory
            } else {
                EntryType::File
            },
            mode: raw.mode,
            sha: Some(raw.id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabCommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabCommit {
    pub id: String,
    #[serde(default)]
    pub short_id: Option<String>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    #[serde(default)]
    pub authored_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: Option<GitLabCommitStats>,
    #[serde(default)]
    pub web_url: Option<String>,
}

impl From<GitLabCommit> for Commit {
    fn from(raw: GitLabCommit) -> Self {
        Commit {
            short_sha: Commit::abbreviate(&raw.id),
            sha: raw.id,
            message: raw.message,
            author_name: raw.author_name,
            author_email: raw.author_email,
            authored_at: raw.authored_date,
            stats: raw.stats.map(|s| CommitStats {
                additions: s.additions,
                deletions: s.deletions,
                total: s.total,
            }),
            web_url: raw.web_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabBranchCommit {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabBranch {
    pub name: String,
    pub commit: GitLabBranchCommit,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub default: bool,
}

impl From<GitLabBranch> for Branch {
    fn from(raw: GitLabBranch) -> Self {
        Branch {
            name: raw.name,
            commit_sha: raw.commit.id,
            protected: raw.protected,
            default: raw.default,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabPipeline {
    pub id: u64,
    #[serde(default)]
    pub iid: Option<u64>,
    pub status: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    #[serde(default)]
    pub web_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<GitLabPipeline> for Pipeline {
    fn from(raw: GitLabPipeline) -> Self {
        Pipeline {
            id: raw.id,
            number: raw.iid,
            status: normalize::map_gitlab_status(&raw.status),
            ref_name: raw.ref_name,
            sha: raw.sha,
            web_url: raw.web_url,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabJob {
    pub id: u64,
    pub name: String,
    pub stage: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub web_url: Option<String>,
}

impl From<GitLabJob> for Job {
    fn from(raw: GitLabJob) -> Self {
        Job {
            id: raw.id,
            name: raw.name,
            stage: raw.stage,
            status: normalize::map_gitlab_status(&raw.status),
            duration_seconds: normalize::job_duration(raw.started_at.as_ref(), raw.finished_at.as_ref()),
            created_at: raw.created_at,
            started_at: raw.started_at,
            finished_at: raw.finished_at,
            web_url: raw.web_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabBlobMatch {
    pub path: String,
    pub data: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

impl From<GitLabBlobMatch> for SearchCodeResult {
    fn from(raw: GitLabBlobMatch) -> Self {
        SearchCodeResult {
            path: raw.path,
            matches: raw
                .data
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
            ref_name: raw.ref_name,
        }
    }
}

// Request bodies

#[derive(Debug, Serialize)]
pub struct CreateIssueRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Comma-separated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_ids: Option<Vec<u64>>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateIssueRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `close` or `reopen`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_event: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_ids: Option<Vec<u64>>,
}

#[derive(Debug, Serialize)]
pub struct CreateNoteRequest<'a> {
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateMergeRequestRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MergeRequestMergeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_commit_message: Option<String>,
    pub squash: bool,
    pub should_remove_source_branch: bool,
}

#[derive(Debug, Serialize)]
pub struct CommitActionRequest {
    pub action: &'static str,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<&'static str>,
}

impl From<&FileAction> for CommitActionRequest {
    fn from(action: &FileAction) -> Self {
        CommitActionRequest {
            action: action.action.as_str(),
            file_path: action.file_path.clone(),
            previous_path: action.previous_path.clone(),
            content: action.content.clone(),
            encoding: action.content.as_ref().map(|_| match action.encoding {
                ContentEncoding::Text => "text",
                ContentEncoding::Base64 => "base64",
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateCommitRequest {
    pub branch: String,
    pub commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_branch: Option<String>,
    pub actions: Vec<CommitActionRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateBranchRequest<'a> {
    pub branch: &'a str,
    #[serde(rename = "ref")]
    pub ref_name: &'a str,
}
