//! Human-readable rendering of canonical entities for the CLI: coloured
//! terminal output by default, markdown when written to a file.

pub mod types;

pub use types::{Badge, Item, Report, Tone};

use crate::model::*;
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

pub fn issue_tone(state: IssueState) -> Tone {
    match state {
        IssueState::Open => Tone::Good,
        IssueState::Closed => Tone::Bad,
    }
}

pub fn pull_request_tone(state: PullRequestState) -> Tone {
    match state {
        PullRequestState::Open => Tone::Good,
        PullRequestState::Closed => Tone::Bad,
        PullRequestState::Merged => Tone::Merged,
    }
}

pub fn status_tone(status: PipelineStatus) -> Tone {
    match status {
        PipelineStatus::Success => Tone::Good,
        PipelineStatus::Failed => Tone::Bad,
        PipelineStatus::Running | PipelineStatus::Pending => Tone::Waiting,
        PipelineStatus::Canceled | PipelineStatus::Skipped | PipelineStatus::Manual => Tone::Neutral,
    }
}

fn state_label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn user(user: &User) -> Report {
    let mut report = Report::new(format!("{} (@{})", user.name, user.username));
    report.summary = Some(format!("id {}", user.id));
    if let Some(url) = &user.web_url {
        report.body = Some(url.clone());
    }
    report
}

pub fn issue(issue: &Issue) -> Report {
    let mut report = Report::new(format!("Issue #{}: \"{}\"", issue.iid, issue.title));
    report.summary = Some(format!(
        "Author: {} | State: {} | Labels: {}",
        issue.author.username,
        state_label(&issue.state),
        if issue.labels.is_empty() { "-".to_string() } else { issue.labels.join(", ") }
    ));
    report.items = issue
        .assignees
        .iter()
        .map(|a| Item {
            badge: None,
            text: format!("assignee @{}", a.username),
            detail: None,
        })
        .collect();
    report.body = issue.description.clone().filter(|d| !d.trim().is_empty());
    report
}

pub fn issues(issues: &[Issue]) -> Report {
    let mut report = Report::new("Issues");
    report.summary = Some(format!("{} result(s)", issues.len()));
    report.items = issues
        .iter()
        .map(|i| Item {
            badge: Some(Badge::new(state_label(&i.state), issue_tone(i.state))),
            text: format!("#{} {}", i.iid, i.title),
            detail: Some(format!("@{}", i.author.username)),
        })
        .collect();
    report
}

pub fn pull_request(pr: &PullRequest) -> Report {
    let mut report = Report::new(format!("PR #{}: \"{}\"", pr.iid, pr.title));
    report.summary = Some(format!(
        "Author: {} | {} -> {} | State: {}{}",
        pr.author.username,
        pr.source_branch,
        pr.target_branch,
        state_label(&pr.state),
        if pr.draft { " (draft)" } else { "" }
    ));
    report.items = vec![Item {
        badge: Some(Badge::new(state_label(&pr.state), pull_request_tone(pr.state))),
        text: if pr.mergeable { "mergeable".to_string() } else { "not mergeable".to_string() },
        detail: pr.merged_at.map(|t| format!("merged at {}", t.to_rfc3339())),
    }];
    report.body = pr.description.clone().filter(|d| !d.trim().is_empty());
    report
}

pub fn pull_requests(prs: &[PullRequest]) -> Report {
    let mut report = Report::new("Pull requests");
    report.summary = Some(format!("{} result(s)", prs.len()));
    report.items = prs
        .iter()
        .map(|pr| Item {
            badge: Some(Badge::new(state_label(&pr.state), pull_request_tone(pr.state))),
            text: format!("#{} {}", pr.iid, pr.title),
            detail: Some(format!("{} -> {}", pr.source_branch, pr.target_branch)),
        })
        .collect();
    report
}

pub fn diffs(diffs: &[FileDiff]) -> Report {
    let additions: usize = diffs.iter().map(|d| d.additions).sum();
    let deletions: usize = diffs.iter().map(|d| d.deletions).sum();
    let mut report = Report::new("Changes");
    report.summary = Some(format!(
        "Files changed: {} | +{} -{}",
        diffs.len(),
        additions,
        deletions
    ));
    report.items = diffs
        .iter()
        .map(|d| {
            let (label, tone) = if d.new_file {
                ("added", Tone::Good)
            } else if d.deleted_file {
                ("deleted", Tone::Bad)
            } else if d.renamed_file {
                ("renamed", Tone::Merged)
            } else {
                ("modified", Tone::Neutral)
            };
            Item {
                badge: Some(Badge::new(label, tone)),
                text: if d.renamed_file {
                    format!("{} -> {}", d.old_path, d.new_path)
                } else {
                    d.new_path.clone()
                },
                detail: Some(format!("+{} -{}", d.additions, d.deletions)),
            }
        })
        .collect();
    report
}

fn entry_item(entry: &TreeEntry) -> Item {
    Item {
        badge: None,
        text: match entry.entry_type {
            EntryType::Directory => format!("{}/", entry.path),
            EntryType::File => entry.path.clone(),
        },
        detail: Some(entry.mode.clone()),
    }
}

pub fn content(content: &Content) -> Report {
    match content {
        Content::File(file) => {
            let mut report = Report::new(file.path.clone());
            report.summary = Some(format!("{} bytes | blob {}", file.size, file.sha));
            report.body = Some(file.content.clone());
            report
        }
        Content::Directory(dir) => {
            let title = if dir.path.is_empty() { "/".to_string() } else { format!("{}/", dir.path) };
            let mut report = Report::new(title);
            report.summary = Some(format!("{} entries", dir.entries.len()));
            report.items = dir.entries.iter().map(entry_item).collect();
            report
        }
    }
}

pub fn tree(entries: &[TreeEntry]) -> Report {
    let mut report = Report::new("Tree");
    report.summary = Some(format!("{} entries", entries.len()));
    report.items = entries.iter().map(entry_item).collect();
    report
}

pub fn branches(branches: &[Branch]) -> Report {
    let mut report = Report::new("Branches");
    report.items = branches
        .iter()
        .map(|b| Item {
            badge: if b.default {
                Some(Badge::new("default", Tone::Good))
            } else if b.protected {
                Some(Badge::new("protected", Tone::Waiting))
            } else {
                None
            },
            text: b.name.clone(),
            detail: Some(Commit::abbreviate(&b.commit_sha)),
        })
        .collect();
    report
}

pub fn commits(commits: &[Commit]) -> Report {
    let mut report = Report::new("Commits");
    report.items = commits
        .iter()
        .map(|c| Item {
            badge: None,
            text: format!("{} {}", c.short_sha, c.message.lines().next().unwrap_or_default()),
            detail: Some(c.author_name.clone()),
        })
        .collect();
    report
}

pub fn pipelines(pipelines: &[Pipeline]) -> Report {
    let mut report = Report::new("Pipelines");
    report.items = pipelines
        .iter()
        .map(|p| Item {
            badge: Some(Badge::new(p.status, status_tone(p.status))),
            text: format!("#{} {}", p.id, p.ref_name),
            detail: Some(Commit::abbreviate(&p.sha)),
        })
        .collect();
    report
}

pub fn jobs(jobs: &[Job]) -> Report {
    let mut report = Report::new("Jobs");
    report.items = jobs
        .iter()
        .map(|j| Item {
            badge: Some(Badge::new(j.status, status_tone(j.status))),
            text: format!("{} ({})", j.name, j.stage),
            detail: j.duration_seconds.map(|s| format!("{}s", s)),
        })
        .collect();
    report
}

pub fn job_log(job_id: u64, log: &str) -> Report {
    let mut report = Report::new(format!("Job {} log", job_id));
    report.body = Some(log.to_string());
    report
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(title = %report.title, items = report.items.len()))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

fn colorize_badge(badge: &Badge) -> colored::ColoredString {
    let text = badge.to_string();
    match badge.tone {
        Tone::Good => text.green().bold(),
        Tone::Bad => text.red().bold(),
        Tone::Merged => text.magenta().bold(),
        Tone::Waiting => text.yellow().bold(),
        Tone::Neutral => text.normal(),
    }
}

fn print_terminal_report(report: &Report) {
    println!();
    println!("{}", report.title.bold());
    if let Some(summary) = &report.summary {
        println!("{}", summary);
    }
    println!();

    for item in &report.items {
        let badge = item
            .badge
            .as_ref()
            .map(|b| format!("{} ", colorize_badge(b)))
            .unwrap_or_default();
        match &item.detail {
            Some(detail) => println!("  {}{} {}", badge, item.text, detail.dimmed()),
            None => println!("  {}{}", badge, item.text),
        }
    }

    if let Some(body) = &report.body {
        if !report.items.is_empty() {
            println!();
        }
        println!("{}", body);
    }
    println!();
}

/// Markdown form of a report.
pub fn render_markdown(report: &Report) -> String {
    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", report.title));
    if let Some(summary) = &report.summary {
        md.push_str(&format!("**{}**\n\n", summary));
    }

    for item in &report.items {
        md.push_str("- ");
        if let Some(badge) = &item.badge {
            md.push_str(&format!("**{}** ", badge));
        }
        md.push_str(&item.text);
        if let Some(detail) = &item.detail {
            md.push_str(&format!(" (`{}`)", detail));
        }
        md.push('\n');
    }
    if !report.items.is_empty() {
        md.push('\n');
    }

    if let Some(body) = &report.body {
        md.push_str("```\n");
        md.push_str(body);
        if !body.ends_with('\n') {
            md.push('\n');
        }
        md.push_str("```\n");
    }
    md
}

fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    std::fs::write(path, render_markdown(report))?;
    Ok(())
}
