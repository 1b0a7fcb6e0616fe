use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use forge_bridge::config::Config;
use forge_bridge::model::*;
use forge_bridge::report::{self, Report};
use forge_bridge::{create_provider, AuthProvider, Platform, Provider, ProviderConfig, StaticTokenAuth};

/// forge-bridge: query GitLab or GitHub through one set of commands.
#[derive(Parser, Debug)]
#[command(name = "forge-bridge", version, about)]
struct Cli {
    /// Platform to talk to (overrides config and FORGE_BRIDGE_PLATFORM)
    #[arg(long, global = true)]
    platform: Option<Platform>,

    /// Write the result to this file (markdown, or JSON with --json)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Emit canonical JSON instead of a formatted report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the authenticated user
    Me,
    #[command(subcommand)]
    Issue(IssueCommand),
    #[command(subcommand)]
    Pr(PrCommand),
    /// Show a file or list a directory
    Content {
        repo: String,
        #[arg(default_value = "")]
        path: String,
        #[arg(long = "ref")]
        ref_name: Option<String>,
    },
    /// List repository tree entries
    Tree {
        repo: String,
        #[arg(long)]
        path: Option<String>,
        #[arg(long = "ref")]
        ref_name: Option<String>,
        #[arg(short, long)]
        recursive: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    Branches {
        repo: String,
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Commits {
        repo: String,
        #[arg(long = "ref")]
        ref_name: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Pipelines {
        repo: String,
        #[arg(long)]
        status: Option<StatusArg>,
        #[arg(long = "ref")]
        ref_name: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Jobs {
        repo: String,
        pipeline: u64,
        #[arg(long)]
        status: Option<StatusArg>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Print the raw log of a CI job
    JobLog { repo: String, job: u64 },
}

#[derive(Subcommand, Debug)]
enum IssueCommand {
    Get {
        repo: String,
        iid: u64,
    },
    List {
        repo: String,
        #[arg(long)]
        state: Option<IssueStateArg>,
        #[arg(long = "label")]
        labels: Vec<String>,
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand, Debug)]
enum PrCommand {
    Get {
        repo: String,
        iid: u64,
    },
    List {
        repo: String,
        #[arg(long)]
        state: Option<PrStateArg>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Per-file changes of a pull request
    Diffs {
        repo: String,
        iid: u64,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct PageArgs {
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    per_page: Option<u32>,
}

impl From<PageArgs> for Pagination {
    fn from(args: PageArgs) -> Self {
        Pagination {
            page: args.page,
            per_page: args.per_page,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum IssueStateArg {
    Open,
    Closed,
    All,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PrStateArg {
    Open,
    Closed,
    Merged,
    All,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum StatusArg {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
}

impl From<StatusArg> for PipelineStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => PipelineStatus::Pending,
            StatusArg::Running => PipelineStatus::Running,
            StatusArg::Success => PipelineStatus::Success,
            StatusArg::Failed => PipelineStatus::Failed,
            StatusArg::Canceled => PipelineStatus::Canceled,
            StatusArg::Skipped => PipelineStatus::Skipped,
            StatusArg::Manual => PipelineStatus::Manual,
        }
    }
}

/// A command's result, kept both as canonical JSON and as a report.
struct Rendered {
    json: serde_json::Value,
    report: Report,
}

fn rendered<T: serde::Serialize>(value: &T, report: Report) -> Result<Rendered, serde_json::Error> {
    Ok(Rendered {
        json: serde_json::to_value(value)?,
        report,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = Config::load()?;
    let platform = cli.platform.unwrap_or(config.platform);
    let _main_span = info_span!("forge_bridge", platform = %platform).entered();

    let auth: Arc<dyn AuthProvider> = match (platform, config.token(platform)) {
        (Platform::GitLab, Some(token)) => Arc::new(StaticTokenAuth::named("PRIVATE-TOKEN", token)),
        (Platform::GitHub, Some(token)) => Arc::new(StaticTokenAuth::bearer(token)),
        (_, None) => {
            debug!("no token configured, using anonymous access");
            Arc::new(StaticTokenAuth::anonymous())
        }
    };
    let provider = create_provider(
        &ProviderConfig {
            platform,
            base_url: config.base_url(platform),
            timeout: config.timeout(),
        },
        auth,
    )?;

    let result = run(provider.as_ref(), cli.command).await?;

    if cli.json {
        let text = serde_json::to_string_pretty(&result.json)?;
        match &cli.output {
            Some(path) => std::fs::write(path, text + "\n")?,
            None => println!("{}", text),
        }
    } else {
        report::output(&result.report, cli.output.as_deref())?;
    }
    info!("done");

    Ok(())
}

async fn run(provider: &dyn Provider, command: Command) -> Result<Rendered, Box<dyn std::error::Error>> {
    let out = match command {
        Command::Me => {
            let me = provider.get_me().await?;
            rendered(&me, report::user(&me))?
        }
        Command::Issue(IssueCommand::Get { repo, iid }) => {
            let issue = provider.get_issue(&repo, iid).await?;
            rendered(&issue, report::issue(&issue))?
        }
        Command::Issue(IssueCommand::List { repo, state, labels, search, page }) => {
            let filter = IssueFilter {
                state: state.map(|s| match s {
                    IssueStateArg::Open => IssueStateFilter::Open,
                    IssueStateArg::Closed => IssueStateFilter::Closed,
                    IssueStateArg::All => IssueStateFilter::All,
                }),
                labels,
                search,
                pagination: page.into(),
                ..Default::default()
            };
            let issues = provider.list_issues(&repo, &filter).await?;
            rendered(&issues, report::issues(&issues))?
        }
        Command::Pr(PrCommand::Get { repo, iid }) => {
            let pr = provider.get_pull_request(&repo, iid).await?;
            rendered(&pr, report::pull_request(&pr))?
        }
        Command::Pr(PrCommand::List { repo, state, page }) => {
            let filter = PullRequestFilter {
                state: state.map(|s| match s {
                    PrStateArg::Open => PullRequestStateFilter::Open,
                    PrStateArg::Closed => PullRequestStateFilter::Closed,
                    PrStateArg::Merged => PullRequestStateFilter::Merged,
                    PrStateArg::All => PullRequestStateFilter::All,
                }),
                pagination: page.into(),
                ..Default::default()
            };
            let prs = provider.list_pull_requests(&repo, &filter).await?;
            rendered(&prs, report::pull_requests(&prs))?
        }
        Command::Pr(PrCommand::Diffs { repo, iid, page }) => {
            let diffs = provider
                .get_pull_request_diffs(&repo, iid, &page.into())
                .await?;
            rendered(&diffs, report::diffs(&diffs))?
        }
        Command::Content { repo, path, ref_name } => {
            let content = provider.get_content(&repo, &path, ref_name.as_deref()).await?;
            rendered(&content, report::content(&content))?
        }
        Command::Tree { repo, path, ref_name, recursive, page } => {
            let params = TreeParams {
                path,
                ref_name,
                recursive,
                pagination: page.into(),
            };
            let entries = provider.get_tree(&repo, &params).await?;
            rendered(&entries, report::tree(&entries))?
        }
        Command::Branches { repo, search, page } => {
            let filter = BranchFilter {
                search,
                pagination: page.into(),
            };
            let branches = provider.list_branches(&repo, &filter).await?;
            rendered(&branches, report::branches(&branches))?
        }
        Command::Commits { repo, ref_name, path, page } => {
            let filter = CommitFilter {
                ref_name,
                path,
                pagination: page.into(),
                ..Default::default()
            };
            let commits = provider.list_commits(&repo, &filter).await?;
            rendered(&commits, report::commits(&commits))?
        }
        Command::Pipelines { repo, status, ref_name, page } => {
            let filter = PipelineFilter {
                status: status.map(PipelineStatus::from),
                ref_name,
                pagination: page.into(),
                ..Default::default()
            };
            let pipelines = provider.list_pipelines(&repo, &filter).await?;
            rendered(&pipelines, report::pipelines(&pipelines))?
        }
        Command::Jobs { repo, pipeline, status, page } => {
            let filter = JobFilter {
                status: status.map(PipelineStatus::from),
                pagination: page.into(),
            };
            let jobs = provider.list_jobs(&repo, pipeline, &filter).await?;
            rendered(&jobs, report::jobs(&jobs))?
        }
        Command::JobLog { repo, job } => {
            let log = provider.get_job_log(&repo, job).await?;
            rendered(&log, report::job_log(job, &log))?
        }
    };
    Ok(out)
}
