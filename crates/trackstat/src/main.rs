//! trackstat - Issue-tracker statistics from the command line

mod cli;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use trackstat_core::{JsonIssueSource, StatisticsAggregator, StatisticsQuery, StatsConfig};

#[derive(Parser)]
#[command(
    name = "trackstat",
    version,
    about = "Issue-tracker statistics, reopened bugs and status transitions",
    long_about = "Computes project statistics from a Jira search export (JSON).\n\
                  \n\
                  Examples:\n\
                    trackstat stats ABC                       # Whole project\n\
                    trackstat stats ABC --since 30d           # Updated in the last 30 days\n\
                    trackstat stats ABC -p 5b10ac8d82e05b22   # Issues involving one participant\n\
                    trackstat reopened ABC WEB                # Reopened bugs in two projects\n\
                    trackstat transitions ABC -n 100          # Status transitions of recent bugs\n\
                  \n\
                  Environment Variables:\n\
                    TRACKSTAT_ISSUES                 # Path to the issue export\n\
                    TRACKSTAT_CONFIG                 # Path to a TOML config file\n\
                    TRACKSTAT_NO_COLOR               # Disable ANSI colors\n\
                    RUST_LOG                         # Log filter (default: warn)"
)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Issue export: {\"issues\": [...]} or a bare array
    #[arg(long, env = "TRACKSTAT_ISSUES", global = true)]
    issues: Option<PathBuf>,

    /// TOML config file (default: <config dir>/trackstat/config.toml if present)
    #[arg(long, env = "TRACKSTAT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "TRACKSTAT_NO_COLOR", global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Print project statistics
    Stats {
        /// Project key
        project: String,
        /// Lower bound on last update: 7d, 3m, 1y, YYYY-MM-DD
        #[arg(long, short = 's')]
        since: Option<String>,
        /// Upper bound on last update: 7d, 3m, 1y, YYYY-MM-DD
        #[arg(long, short = 'u')]
        until: Option<String>,
        /// Restrict to issues a participant is involved in (account id, key or name)
        #[arg(long, short = 'p')]
        participant: Option<String>,
        /// Classify issues on a single thread
        #[arg(long)]
        sequential: bool,
    },
    /// List reopened bugs across projects
    Reopened {
        /// Project keys
        #[arg(required = true)]
        projects: Vec<String>,
    },
    /// Count status transitions of a project's recent bugs
    Transitions {
        /// Project key
        project: String,
        /// Number of most recently updated bugs to examine
        #[arg(long, short = 'n', default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let issues = cli
        .issues
        .context("No issue export given (use --issues or TRACKSTAT_ISSUES)")?;
    let aggregator = StatisticsAggregator::with_derived_participants(
        Arc::new(JsonIssueSource::new(issues)),
        config,
    )
    .context("Invalid configuration")?;

    let output = match cli.mode {
        Mode::Stats {
            project,
            since,
            until,
            participant,
            sequential,
        } => {
            let today = Local::now().date_naive();
            let (start, end) = cli::parse_window(since.as_deref(), until.as_deref(), today)?;

            let mut query = StatisticsQuery::new(project.clone()).window(start, end);
            if let Some(participant) = participant {
                query = query.participant(participant);
            }
            if sequential {
                query = query.sequential();
            }

            let stats = aggregator
                .get_project_statistics(&query)
                .await
                .with_context(|| format!("Cannot compute statistics for {}", project))?;
            cli::format_statistics(&project.to_uppercase(), &stats, cli.json, cli.no_color)
        }
        Mode::Reopened { projects } => {
            let bugs = aggregator
                .find_reopened_bugs(projects.as_slice())
                .await
                .context("Cannot list reopened bugs")?;
            cli::format_reopened(&bugs, cli.json, cli.no_color)
        }
        Mode::Transitions { project, limit } => {
            let report = aggregator
                .status_transitions(&project, limit)
                .await
                .with_context(|| format!("Cannot count transitions for {}", project))?;
            cli::format_transitions(&report, cli.json, cli.no_color)
        }
    };

    println!("{}", output);
    Ok(())
}

/// Explicit path, else the per-user config file if it exists, else defaults
fn load_config(explicit: Option<&Path>) -> Result<StatsConfig> {
    if let Some(path) = explicit {
        return StatsConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()));
    }

    let default_path = dirs::config_dir().map(|d| d.join("trackstat").join("config.toml"));
    match default_path {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "Using user config");
            StatsConfig::load(&path)
                .with_context(|| format!("Failed to load config: {}", path.display()))
        }
        _ => Ok(StatsConfig::default()),
    }
}
