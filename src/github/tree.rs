//! Ref resolution and in-memory tree paging.
//!
//! GitHub's tree endpoint has no server-side path filter or pagination, so
//! `get_tree` always fetches the whole recursive tree of the resolved commit
//! and slices it locally. Cost is proportional to repository size regardless
//! of the page requested.

use tracing::{debug, warn};

use crate::error::Result;
use crate::http::{HttpClient, Query};
use crate::model::{TreeEntry, MAX_PER_PAGE};

use super::types::{GitHubGitCommit, GitHubRef, GitHubTree, GitHubTreeItem};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_TREE_PAGE_SIZE: u32 = 20;

const PRIMARY_BRANCH: &str = "main";
const FALLBACK_BRANCH: &str = "master";

pub fn is_commit_sha(value: &str) -> bool {
    value.len() == 40 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Head commit sha of a branch.
pub async fn branch_head(http: &HttpClient, repo_path: &str, branch: &str) -> Result<String> {
    let path = format!("{}/git/ref/heads/{}", repo_path, branch);
    let found: GitHubRef = http.get(&path, &Query::new()).await?;
    Ok(found.object.sha)
}

/// Like [`branch_head`] but an absent branch yields `None`.
pub async fn branch_head_optional(
    http: &HttpClient,
    repo_path: &str,
    branch: &str,
) -> Result<Option<String>> {
    let path = format!("{}/git/ref/heads/{}", repo_path, branch);
    let found: Option<GitHubRef> = http.get_optional(&path, &Query::new()).await?;
    Ok(found.map(|r| r.object.sha))
}

/// Turn a ref (commit sha, branch name, `HEAD` or nothing) into a commit sha.
///
/// Without an explicit ref the conventional primary branch is tried first,
/// then the legacy one.
pub async fn resolve_ref(http: &HttpClient, repo_path: &str, ref_name: Option<&str>) -> Result<String> {
    match ref_name {
        Some(sha) if is_commit_sha(sha) => Ok(sha.to_string()),
        Some(branch) if branch != "HEAD" => branch_head(http, repo_path, branch).await,
        _ => match branch_head(http, repo_path, PRIMARY_BRANCH).await {
            Ok(sha) => Ok(sha),
            Err(err) => {
                debug!(error = %err, "primary branch lookup failed, trying {}", FALLBACK_BRANCH);
                branch_head(http, repo_path, FALLBACK_BRANCH).await
            }
        },
    }
}

/// Every entry reachable from a commit's root tree.
pub async fn fetch_recursive_tree(
    http: &HttpClient,
    repo_path: &str,
    commit_sha: &str,
) -> Result<Vec<GitHubTreeItem>> {
    let commit: GitHubGitCommit = http
        .get(&format!("{}/git/commits/{}", repo_path, commit_sha), &Query::new())
        .await?;
    let query = vec![("recursive", "1".to_string())];
    let tree: GitHubTree = http
        .get(&format!("{}/git/trees/{}", repo_path, commit.tree.sha), &query)
        .await?;
    if tree.truncated {
        warn!(tree = %tree.sha, "tree listing truncated by GitHub");
    }
    Ok(tree.tree)
}

/// Keep entries under `path` (direct children only unless `recursive`) and
/// return the requested page.
pub fn select_entries(
    entries: Vec<TreeEntry>,
    path: Option<&str>,
    recursive: bool,
    page: Option<u32>,
    per_page: Option<u32>,
) -> Vec<TreeEntry> {
    let prefix = path.map(|p| p.trim_matches('/')).unwrap_or("");
    let page = page.unwrap_or(1).max(1) as usize;
    let per_page = per_page
        .unwrap_or(DEFAULT_TREE_PAGE_SIZE)
        .clamp(1, MAX_PER_PAGE) as usize;

    entries
        .into_iter()
        .filter(|entry| {
            let relative = if prefix.is_empty() {
                Some(entry.path.as_str())
            } else {
                entry
                    .path
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('/'))
            };
            match relative {
                Some(rest) if !rest.is_empty() => recursive || !rest.contains('/'),
                _ => false,
            }
        })
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryType;

    fn entry(path: &str, dir: bool) -> TreeEntry {
        TreeEntry {
            name: path.rsplit('/').next().unwrap().to_string(),
            path: path.to_string(),
            entry_type: if dir { EntryType::Directory } else { EntryType::File },
            mode: if dir { "040000" } else { "100644" }.to_string(),
            sha: None,
        }
    }

    fn sample() -> Vec<TreeEntry> {
        vec![
            entry("README.md", false),
            entry("src", true),
            entry("src/lib.rs", false),
            entry("src/net", true),
            entry("src/net/http.rs", false),
            entry("srcx.txt", false),
        ]
    }

    fn paths(entries: &[TreeEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_root_direct_children() {
        let selected = select_entries(sample(), None, false, None, None);
        assert_eq!(paths(&selected), vec!["README.md", "src", "srcx.txt"]);
    }

    #[test]
    fn test_prefix_filter_respects_segment_boundary() {
        let selected = select_entries(sample(), Some("src/"), false, None, None);
        assert_eq!(paths(&selected), vec!["src/lib.rs", "src/net"]);

        let selected = select_entries(sample(), Some("src"), true, None, None);
        assert_eq!(
            paths(&selected),
            vec!["src/lib.rs", "src/net", "src/net/http.rs"]
        );
    }

    #[test]
    fn test_paging_slices_after_filtering() {
        let all: Vec<TreeEntry> = (0..45).map(|i| entry(&format!("f{:02}", i), false)).collect();
        let first = select_entries(all.clone(), None, false, None, None);
        assert_eq!(first.len(), DEFAULT_TREE_PAGE_SIZE as usize);
        assert_eq!(first[0].path, "f00");

        let third = select_entries(all.clone(), None, false, Some(3), Some(20));
        assert_eq!(paths(&third), vec!["f40", "f41", "f42", "f43", "f44"]);

        let beyond = select_entries(all, None, false, Some(9), Some(20));
        assert!(beyond.is_empty());
    }

    #[test]
    fn test_commit_sha_detection() {
        assert!(is_commit_sha("0123456789abcdef0123456789abcdef01234567"));
        assert!(!is_commit_sha("main"));
        assert!(!is_commit_sha("0123456"));
    }
}
