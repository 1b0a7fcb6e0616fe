//! Platform-agnostic entities and the parameter types used to query them.

pub mod params;
pub mod types;

pub use params::{
    BranchFilter, CommitAuthor, CommitFilter, CommitParams, ContentEncoding, CreateIssueParams,
    CreatePullRequestParams, FileAction, FileActionKind, IssueFilter, IssueStateFilter, JobFilter,
    MergeParams, Pagination, PipelineFilter, PullRequestFilter, PullRequestStateFilter,
    SortDirection, SortField, TreeParams, UpdateIssueParams, MAX_PER_PAGE,
};
pub use types::{
    Branch, Comment, Commit, CommitStats, Content, DirectoryContent, EntryType, FileContent,
    FileDiff, Issue, IssueState, Job, Pipeline, PipelineStatus, PullRequest, PullRequestState,
    SearchCodeResult, TreeEntry, User,
};
