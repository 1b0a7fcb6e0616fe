//! Parameter and filter types accepted by the capability interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{IssueState, PipelineStatus};

/// Upper bound both platforms accept for `per_page`.
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// Query pairs for the backend. Values pass through, with `page` floored at 1
    /// and `per_page` clamped into 1..=100.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page", page.max(1).to_string()));
        }
        if let Some(per_page) = self.per_page {
            query.push(("per_page", per_page.clamp(1, MAX_PER_PAGE).to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStateFilter {
    Open,
    Closed,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestStateFilter {
    Open,
    Closed,
    Merged,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFilter {
    pub state: Option<IssueStateFilter>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub search: Option<String>,
    /// Assignee handle
    pub assignee: Option<String>,
    /// Author handle
    pub author: Option<String>,
    pub sort: Option<SortField>,
    pub direction: Option<SortDirection>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIssueParams {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Assignee handles
    #[serde(default)]
    pub assignees: Vec<String>,
}

/// Fields left as `None` keep their server-side value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIssueParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state: Option<IssueState>,
    pub labels: Option<Vec<String>>,
    pub assignees: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestFilter {
    pub state: Option<PullRequestStateFilter>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub sort: Option<SortField>,
    pub direction: Option<SortDirection>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePullRequestParams {
    pub title: String,
    pub source_branch: String,
    pub target_branch: String,
    pub description: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeParams {
    /// Merge commit message
    pub message: Option<String>,
    #[serde(default)]
    pub squash: bool,
    #[serde(default)]
    pub delete_source_branch: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub path: Option<String>,
    pub ref_name: Option<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileActionKind {
    Create,
    Update,
    Delete,
    Move,
}

impl FileActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileActionKind::Create => "create",
            FileActionKind::Update => "update",
            FileActionKind::Delete => "delete",
            FileActionKind::Move => "move",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Text,
    Base64,
}

/// One file change within a multi-file commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAction {
    pub action: FileActionKind,
    pub file_path: String,
    /// Source path of a move
    pub previous_path: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

impl FileAction {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: FileActionKind::Create,
            file_path: path.into(),
            previous_path: None,
            content: Some(content.into()),
            encoding: ContentEncoding::Text,
        }
    }

    pub fn update(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: FileActionKind::Update,
            ..Self::create(path, content)
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            action: FileActionKind::Delete,
            file_path: path.into(),
            previous_path: None,
            content: None,
            encoding: ContentEncoding::Text,
        }
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            action: FileActionKind::Move,
            file_path: to.into(),
            previous_path: Some(from.into()),
            content: None,
            encoding: ContentEncoding::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitParams {
    pub branch: String,
    pub message: String,
    /// Applied in order
    pub actions: Vec<FileAction>,
    /// Branch to start from when `branch` does not exist yet
    pub base_branch: Option<String>,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFilter {
    pub ref_name: Option<String>,
    pub path: Option<String>,
    pub author: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFilter {
    pub search: Option<String>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFilter {
    pub status: Option<PipelineStatus>,
    pub ref_name: Option<String>,
    pub sha: Option<String>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    pub status: Option<PipelineStatus>,
    #[serde(default)]
    pub pagination: Pagination,
}
