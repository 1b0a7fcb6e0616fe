//! Multi-file commits on GitHub.
//!
//! A lone create or update goes through the contents endpoint in one call,
//! after branching from the base when the target branch does not exist yet.
//! Everything else is built with the git data API: resolve the base branch,
//! read its tree, upload blobs, write a tree on top of the base tree, create
//! the commit and move (or create) the branch ref. Each remote step tags its
//! error with the step name so a partial failure can be located.

use std::fmt;

use base64::Engine;
use tracing::{debug, info, instrument};

use crate::error::{ProviderError, Result};
use crate::http::{HttpClient, Query};
use crate::model::*;
use crate::provider::Platform;

use super::tree::{branch_head, branch_head_optional};
use super::types::*;

const FILE_MODE: &str = "100644";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStrategy {
    /// Contents endpoint, one file
    SingleFile,
    /// Git data API, any number of actions
    GitData,
}

pub fn select_strategy(actions: &[FileAction]) -> Result<CommitStrategy> {
    match actions {
        [] => Err(ProviderError::bad_request(
            Platform::GitHub,
            "commit requires at least one file action",
        )),
        [only] if matches!(only.action, FileActionKind::Create | FileActionKind::Update) => {
            Ok(CommitStrategy::SingleFile)
        }
        _ => Ok(CommitStrategy::GitData),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitStep {
    ResolveBaseBranch,
    FetchBaseTree,
    ReadMovedFile,
    CreateBlob,
    CreateTree,
    CreateCommit,
    CreateBranchRef,
    UpdateBranchRef,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommitStep::ResolveBaseBranch => "resolve base branch",
            CommitStep::FetchBaseTree => "fetch base tree",
            CommitStep::ReadMovedFile => "read moved file",
            CommitStep::CreateBlob => "create blob",
            CommitStep::CreateTree => "create tree",
            CommitStep::CreateCommit => "create commit",
            CommitStep::CreateBranchRef => "create branch ref",
            CommitStep::UpdateBranchRef => "update branch ref",
        };
        write!(f, "{}", s)
    }
}

fn require_content(action: &FileAction) -> Result<&str> {
    action.content.as_deref().ok_or_else(|| {
        ProviderError::bad_request(
            Platform::GitHub,
            format!("{} of '{}' requires content", action.action.as_str(), action.file_path),
        )
    })
}

pub(super) fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Replace any earlier entry for the same path; the last action on a path wins.
fn push_entry(entries: &mut Vec<TreeEntryRequest>, path: &str, sha: Option<String>) {
    entries.retain(|e| e.path != path);
    entries.push(TreeEntryRequest {
        path: path.to_string(),
        mode: FILE_MODE,
        item_type: "blob",
        sha,
    });
}

pub struct CommitOrchestrator<'a> {
    http: &'a HttpClient,
    /// `/repos/{owner}/{repo}`
    repo_path: &'a str,
}

impl<'a> CommitOrchestrator<'a> {
    pub fn new(http: &'a HttpClient, repo_path: &'a str) -> Self {
        Self { http, repo_path }
    }

    #[instrument(skip(self, params), fields(repo = self.repo_path, branch = %params.branch))]
    pub async fn run(&self, params: &CommitParams) -> Result<Commit> {
        match select_strategy(&params.actions)? {
            CommitStrategy::SingleFile => self.single_file(params, &params.actions[0]).await,
            CommitStrategy::GitData => self.git_data(params).await,
        }
    }

    async fn single_file(&self, params: &CommitParams, action: &FileAction) -> Result<Commit> {
        let content = require_content(action)?;
        let encoded = match action.encoding {
            ContentEncoding::Base64 => content.to_string(),
            ContentEncoding::Text => base64::engine::general_purpose::STANDARD.encode(content),
        };
        let path = format!("{}/contents/{}", self.repo_path, encode_path(&action.file_path));
        let read_ref = self.ensure_branch(params).await?;

        // Updates must name the blob they replace. An absent file is written as new.
        let sha = if action.action == FileActionKind::Update {
            let query = vec![("ref", read_ref)];
            let existing: Option<GitHubContentItem> = self.http.get_optional(&path, &query).await?;
            if existing.is_none() {
                debug!(path = %action.file_path, "file absent, writing as create");
            }
            existing.map(|item| item.sha)
        } else {
            None
        };

        let body = ContentWriteRequest {
            message: &params.message,
            content: encoded,
            branch: &params.branch,
            sha,
            author: params.author.as_ref(),
        };
        let written: GitHubContentWrite = self.http.put(&path, &body).await?;
        info!(sha = %written.commit.sha, "committed single file");
        Ok(written.commit.into())
    }

    /// The contents endpoint only writes to existing branches. When the target
    /// branch is missing and a different base is given, branch it from the
    /// base head first. Returns the ref existing files should be read from.
    async fn ensure_branch(&self, params: &CommitParams) -> Result<String> {
        let base_branch = match params.base_branch.as_deref() {
            Some(base) if base != params.branch => base,
            _ => return Ok(params.branch.clone()),
        };
        let existing = branch_head_optional(self.http, self.repo_path, &params.branch)
            .await
            .map_err(|e| e.context(CommitStep::ResolveBaseBranch))?;
        if existing.is_some() {
            return Ok(params.branch.clone());
        }

        let base_sha = branch_head(self.http, self.repo_path, base_branch)
            .await
            .map_err(|e| e.context(CommitStep::ResolveBaseBranch))?;
        debug!(branch = %params.branch, base = base_branch, "branch absent, creating ref from base");
        self.create_ref(&params.branch, &base_sha)
            .await
            .map_err(|e| e.context(CommitStep::CreateBranchRef))?;
        Ok(base_sha)
    }

    async fn git_data(&self, params: &CommitParams) -> Result<Commit> {
        let base_branch = params.base_branch.as_deref().unwrap_or(&params.branch);

        let base_sha = branch_head(self.http, self.repo_path, base_branch)
            .await
            .map_err(|e| e.context(CommitStep::ResolveBaseBranch))?;

        let base_commit: GitHubGitCommit = self
            .http
            .get(&format!("{}/git/commits/{}", self.repo_path, base_sha), &Query::new())
            .await
            .map_err(|e| e.context(CommitStep::FetchBaseTree))?;
        let base_tree = base_commit.tree.sha;

        let mut entries: Vec<TreeEntryRequest> = Vec::with_capacity(params.actions.len());
        for action in &params.actions {
            match action.action {
                FileActionKind::Delete => push_entry(&mut entries, &action.file_path, None),
                FileActionKind::Create | FileActionKind::Update => {
                    let blob = self.create_blob(require_content(action)?, action.encoding).await?;
                    push_entry(&mut entries, &action.file_path, Some(blob));
                }
                FileActionKind::Move => {
                    let previous = action.previous_path.as_deref().ok_or_else(|| {
                        ProviderError::bad_request(
                            Platform::GitHub,
                            format!("move to '{}' requires previous_path", action.file_path),
                        )
                    })?;
                    let sha = match action.content.as_deref() {
                        Some(content) => self.create_blob(content, action.encoding).await?,
                        None => self.existing_blob(previous, &base_sha).await?,
                    };
                    push_entry(&mut entries, previous, None);
                    push_entry(&mut entries, &action.file_path, Some(sha));
                }
            }
        }

        let tree: GitHubTree = self
            .http
            .post(
                &format!("{}/git/trees", self.repo_path),
                &Query::new(),
                &CreateTreeRequest {
                    base_tree: &base_tree,
                    tree: &entries,
                },
            )
            .await
            .map_err(|e| e.context(CommitStep::CreateTree))?;

        let commit: GitHubGitCommit = self
            .http
            .post(
                &format!("{}/git/commits", self.repo_path),
                &Query::new(),
                &CreateGitCommitRequest {
                    message: &params.message,
                    tree: &tree.sha,
                    parents: vec![&base_sha],
                    author: params.author.as_ref(),
                },
            )
            .await
            .map_err(|e| e.context(CommitStep::CreateCommit))?;

        self.move_branch(&params.branch, base_branch, &commit.sha)
            .await
            .map_err(|e| e.context(CommitStep::UpdateBranchRef))?;

        info!(sha = %commit.sha, entries = entries.len(), "committed via git data API");
        Ok(commit.into())
    }

    async fn create_blob(&self, content: &str, encoding: ContentEncoding) -> Result<String> {
        let body = CreateBlobRequest {
            content,
            encoding: match encoding {
                ContentEncoding::Text => "utf-8",
                ContentEncoding::Base64 => "base64",
            },
        };
        let blob: GitHubObject = self
            .http
            .post(&format!("{}/git/blobs", self.repo_path), &Query::new(), &body)
            .await
            .map_err(|e| e.context(CommitStep::CreateBlob))?;
        Ok(blob.sha)
    }

    /// Blob sha of a file at the base commit, for moves without new content.
    async fn existing_blob(&self, path: &str, base_sha: &str) -> Result<String> {
        let url = format!("{}/contents/{}", self.repo_path, encode_path(path));
        let query = vec![("ref", base_sha.to_string())];
        let item: GitHubContentItem = self
            .http
            .get(&url, &query)
            .await
            .map_err(|e| e.context(CommitStep::ReadMovedFile))?;
        Ok(item.sha)
    }

    /// Fast-forward `branch` to `sha`, creating it when it only exists as a base.
    async fn move_branch(&self, branch: &str, base_branch: &str, sha: &str) -> Result<()> {
        let exists = branch == base_branch
            || branch_head_optional(self.http, self.repo_path, branch)
                .await?
                .is_some();

        if exists {
            let _: GitHubRef = self
                .http
                .patch(
                    &format!("{}/git/refs/heads/{}", self.repo_path, branch),
                    &UpdateRefRequest { sha, force: false },
                )
                .await?;
        } else {
            debug!(branch, "branch absent, creating ref");
            self.create_ref(branch, sha).await?;
        }
        Ok(())
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let _: GitHubRef = self
            .http
            .post(
                &format!("{}/git/refs", self.repo_path),
                &Query::new(),
                &CreateRefRequest {
                    ref_name: format!("refs/heads/{}", branch),
                    sha,
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_strategy_selection() {
        let err = select_strategy(&[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);

        assert_eq!(
            select_strategy(&[FileAction::create("a", "x")]).unwrap(),
            CommitStrategy::SingleFile
        );
        assert_eq!(
            select_strategy(&[FileAction::update("a", "x")]).unwrap(),
            CommitStrategy::SingleFile
        );
        assert_eq!(
            select_strategy(&[FileAction::delete("a")]).unwrap(),
            CommitStrategy::GitData
        );
        assert_eq!(
            select_strategy(&[FileAction::rename("a", "b")]).unwrap(),
            CommitStrategy::GitData
        );
        assert_eq!(
            select_strategy(&[FileAction::create("a", "x"), FileAction::create("b", "y")]).unwrap(),
            CommitStrategy::GitData
        );
    }

    #[test]
    fn test_last_write_wins_on_duplicate_paths() {
        let mut entries = Vec::new();
        push_entry(&mut entries, "a.txt", Some("1".to_string()));
        push_entry(&mut entries, "b.txt", Some("2".to_string()));
        push_entry(&mut entries, "a.txt", None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "b.txt");
        assert_eq!(entries[1].path, "a.txt");
        assert_eq!(entries[1].sha, None);
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(CommitStep::ResolveBaseBranch.to_string(), "resolve base branch");
        assert_eq!(CommitStep::UpdateBranchRef.to_string(), "update branch ref");
        assert_eq!(CommitStep::ReadMovedFile.to_string(), "read moved file");
        assert_eq!(CommitStep::CreateBranchRef.to_string(), "create branch ref");
    }

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(encode_path("/docs/a b.md"), "docs/a%20b.md");
    }
}
