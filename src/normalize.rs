//! Translation of platform vocabularies into the canonical model.
//!
//! GitLab and GitHub model overlapping concepts with different cardinality
//! (two-valued issue state vs. three-valued pull request state, flat CI status
//! vs. status + conclusion). Every rule here is a pure function so adapters can
//! share it and tests can cover the full input space.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{IssueState, PipelineStatus, PullRequestState};

/// Issue state. GitLab sends `opened`/`closed`, GitHub `open`/`closed`.
/// Total: anything other than `closed`/`locked` is treated as open.
pub fn map_issue_state(raw: &str) -> IssueState {
    match raw {
        "closed" | "locked" => IssueState::Closed,
        _ => IssueState::Open,
    }
}

/// Pull request state. `merged` wins whenever the merge flag is set or a
/// merge timestamp exists, whatever the raw state says. GitLab's `locked`
/// folds into `closed`.
pub fn reconcile_pull_request_state(
    raw: &str,
    merged: bool,
    merged_at: Option<&DateTime<Utc>>,
) -> PullRequestState {
    if merged || merged_at.is_some() {
        return PullRequestState::Merged;
    }
    match raw {
        "merged" => PullRequestState::Merged,
        "closed" | "locked" => PullRequestState::Closed,
        _ => PullRequestState::Open,
    }
}

/// Draft flag: explicit `draft` when present, else the legacy
/// `work_in_progress` field, else false. An explicit `draft: false` is not
/// overridden by `work_in_progress: true`.
pub fn resolve_draft(draft: Option<bool>, work_in_progress: Option<bool>) -> bool {
    draft.or(work_in_progress).unwrap_or(false)
}

/// GitLab mergeability from its status enums.
pub fn gitlab_mergeable(merge_status: Option<&str>, detailed_merge_status: Option<&str>) -> bool {
    match detailed_merge_status {
        Some(detailed) => detailed == "mergeable",
        None => merge_status == Some("can_be_merged"),
    }
}

/// GitHub mergeability; `null` (not yet computed) collapses to false.
pub fn github_mergeable(mergeable: Option<bool>) -> bool {
    mergeable.unwrap_or(false)
}

/// GitLab pipeline/job status (flat enum).
pub fn map_gitlab_status(raw: &str) -> PipelineStatus {
    match raw {
        "running" => PipelineStatus::Running,
        "success" => PipelineStatus::Success,
        "failed" => PipelineStatus::Failed,
        "canceled" | "canceling" => PipelineStatus::Canceled,
        "skipped" => PipelineStatus::Skipped,
        "manual" => PipelineStatus::Manual,
        _ => PipelineStatus::Pending,
    }
}

/// GitHub workflow run/job status. The conclusion is only consulted once the
/// status reaches `completed`.
pub fn map_github_status(status: &str, conclusion: Option<&str>) -> PipelineStatus {
    match status {
        "completed" => match conclusion {
            Some("success") => PipelineStatus::Success,
            Some("failure") | Some("timed_out") => PipelineStatus::Failed,
            Some("cancelled") => PipelineStatus::Canceled,
            Some("skipped") => PipelineStatus::Skipped,
            _ => PipelineStatus::Pending,
        },
        "in_progress" => PipelineStatus::Running,
        _ => PipelineStatus::Pending,
    }
}

/// Job duration in whole seconds. Negative deltas from backend clock skew are
/// passed through unchanged.
pub fn job_duration(
    started_at: Option<&DateTime<Utc>>,
    finished_at: Option<&DateTime<Utc>>,
) -> Option<i64> {
    match (started_at, finished_at) {
        (Some(start), Some(end)) => Some((*end - *start).num_seconds()),
        _ => None,
    }
}

/// A label as sent by a backend: a bare name or a richer object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawLabel {
    Name(String),
    Object { name: String },
}

/// Flatten labels to their names, keeping backend order.
pub fn label_names(labels: &[RawLabel]) -> Vec<String> {
    labels
        .iter()
        .map(|label| match label {
            RawLabel::Name(name) => name.clone(),
            RawLabel::Object { name } => name.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_issue_state_is_total() {
        assert_eq!(map_issue_state("opened"), IssueState::Open);
        assert_eq!(map_issue_state("open"), IssueState::Open);
        assert_eq!(map_issue_state("reopened"), IssueState::Open);
        assert_eq!(map_issue_state("closed"), IssueState::Closed);
        assert_eq!(map_issue_state("locked"), IssueState::Closed);
        assert_eq!(map_issue_state(""), IssueState::Open);
        assert_eq!(map_issue_state("something-new"), IssueState::Open);
    }

    #[test]
    fn test_pull_request_state_cross_product() {
        let raws = ["opened", "open", "closed", "locked", "merged"];
        let merged_at = ts(0);
        for raw in raws {
            for merged in [false, true] {
                for at in [None, Some(&merged_at)] {
                    let state = reconcile_pull_request_state(raw, merged, at);
                    let expected = if merged || at.is_some() {
                        PullRequestState::Merged
                    } else {
                        match raw {
                            "opened" | "open" => PullRequestState::Open,
                            "closed" | "locked" => PullRequestState::Closed,
                            _ => PullRequestState::Merged,
                        }
                    };
                    assert_eq!(state, expected, "raw={raw} merged={merged} at={at:?}");
                }
            }
        }
    }

    #[test]
    fn test_closed_with_merge_timestamp_is_merged() {
        let at = ts(10);
        assert_eq!(
            reconcile_pull_request_state("closed", false, Some(&at)),
            PullRequestState::Merged
        );
    }

    #[test]
    fn test_draft_fallback() {
        assert!(resolve_draft(Some(true), None));
        assert!(resolve_draft(Some(true), Some(false)));
        assert!(resolve_draft(None, Some(true)));
        assert!(!resolve_draft(None, None));
        assert!(!resolve_draft(None, Some(false)));
        // An explicit false is kept even when the legacy flag says otherwise.
        assert!(!resolve_draft(Some(false), Some(true)));
    }

    #[test]
    fn test_mergeable_rules() {
        assert!(gitlab_mergeable(Some("can_be_merged"), None));
        assert!(!gitlab_mergeable(Some("cannot_be_merged"), None));
        assert!(gitlab_mergeable(Some("checking"), Some("mergeable")));
        assert!(!gitlab_mergeable(Some("can_be_merged"), Some("ci_still_running")));
        assert!(!gitlab_mergeable(None, None));
        assert!(github_mergeable(Some(true)));
        assert!(!github_mergeable(Some(false)));
        assert!(!github_mergeable(None));
    }

    #[test]
    fn test_gitlab_status_mapping() {
        assert_eq!(map_gitlab_status("running"), PipelineStatus::Running);
        assert_eq!(map_gitlab_status("success"), PipelineStatus::Success);
        assert_eq!(map_gitlab_status("failed"), PipelineStatus::Failed);
        assert_eq!(map_gitlab_status("canceled"), PipelineStatus::Canceled);
        assert_eq!(map_gitlab_status("skipped"), PipelineStatus::Skipped);
        assert_eq!(map_gitlab_status("manual"), PipelineStatus::Manual);
        for raw in ["created", "pending", "preparing", "scheduled", "waiting_for_resource", "weird"] {
            assert_eq!(map_gitlab_status(raw), PipelineStatus::Pending, "{raw}");
        }
    }

    #[test]
    fn test_github_status_phase_and_conclusion() {
        assert_eq!(map_github_status("queued", None), PipelineStatus::Pending);
        assert_eq!(map_github_status("in_progress", None), PipelineStatus::Running);
        assert_eq!(map_github_status("waiting", None), PipelineStatus::Pending);
        assert_eq!(map_github_status("requested", Some("success")), PipelineStatus::Pending);
        assert_eq!(map_github_status("completed", Some("success")), PipelineStatus::Success);
        assert_eq!(map_github_status("completed", Some("failure")), PipelineStatus::Failed);
        assert_eq!(map_github_status("completed", Some("timed_out")), PipelineStatus::Failed);
        assert_eq!(map_github_status("completed", Some("cancelled")), PipelineStatus::Canceled);
        assert_eq!(map_github_status("completed", Some("skipped")), PipelineStatus::Skipped);
        assert_eq!(map_github_status("completed", Some("neutral")), PipelineStatus::Pending);
        assert_eq!(map_github_status("completed", None), PipelineStatus::Pending);
    }

    #[test]
    fn test_job_duration() {
        let start = ts(0);
        let end = ts(95);
        assert_eq!(job_duration(Some(&start), Some(&end)), Some(95));
        assert_eq!(job_duration(None, Some(&end)), None);
        assert_eq!(job_duration(Some(&start), None), None);
        assert_eq!(job_duration(None, None), None);
        // Clock skew stays negative.
        assert_eq!(job_duration(Some(&end), Some(&start)), Some(-95));
    }

    #[test]
    fn test_job_duration_truncates_to_whole_seconds() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let end = Utc.timestamp_opt(1_700_000_002, 900_000_000).unwrap();
        assert_eq!(job_duration(Some(&start), Some(&end)), Some(2));
    }

    #[test]
    fn test_label_names_from_mixed_shapes() {
        let labels: Vec<RawLabel> =
            serde_json::from_str(r#"["bug", {"id": 1, "name": "ui", "color": "fff"}]"#).unwrap();
        assert_eq!(label_names(&labels), vec!["bug".to_string(), "ui".to_string()]);
    }
}
