//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use jobflow_core::{Orchestrator, Reconciler, RetentionSweeper, Scheduler, WorkflowStore};
use jobflow_shared::{
    AppConfig, JobRecord, WorkflowRun, init_config, load_config, load_config_from,
};
use jobflow_sources::AdapterRegistry;
use jobflow_storage::{JobFilter, JobListing, JobPage, JobStats, JobStore, Storage};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Jobflow: scheduled job-posting ingestion.
#[derive(Parser)]
#[command(
    name = "jobflow",
    version,
    about = "Fetch, deduplicate, score, and store job postings from multiple boards.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.jobflow/jobflow.toml.
    #[arg(long, env = "JOBFLOW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the scheduler until interrupted.
    Serve,

    /// Trigger an on-demand workflow run and wait for it to finish.
    Fetch {
        /// Platforms to fetch (repeatable or comma-separated). Defaults from config.
        #[arg(short, long = "platform", value_delimiter = ',')]
        platforms: Vec<String>,

        /// Location to search. Defaults from config.
        #[arg(short, long)]
        location: Option<String>,

        /// Search keywords (repeatable or comma-separated). Defaults from config.
        #[arg(short, long = "keyword", value_delimiter = ',')]
        keywords: Vec<String>,

        /// Print the finished run as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored job postings.
    Jobs {
        #[arg(long)]
        platform: Option<String>,

        /// Location substring. `remote` matches every location.
        #[arg(long)]
        location: Option<String>,

        /// Only remote postings.
        #[arg(long)]
        remote: bool,

        /// Match any keyword in title or description (repeatable or comma-separated).
        #[arg(short, long = "keyword", value_delimiter = ',')]
        keywords: Vec<String>,

        /// Minimum lower salary bound.
        #[arg(long)]
        salary_min: Option<i64>,

        /// Only postings from the last N hours.
        #[arg(long, default_value = "24", value_parser = hours_parser())]
        hours: i64,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        limit: u32,

        /// Print the page as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one stored posting.
    Job {
        /// Storage identifier, as listed by `jobflow jobs`.
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Show aggregate counts over a recency window.
    Stats {
        /// Window size in hours.
        #[arg(long, default_value = "24", value_parser = hours_parser())]
        hours: i64,

        #[arg(long)]
        json: bool,
    },

    /// Purge postings older than the retention window.
    Sweep,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Largest accepted `--hours` window (ten years).
const MAX_HOURS: i64 = 87_600;

fn hours_parser() -> clap::builder::RangedI64ValueParser<i64> {
    clap::value_parser!(i64).range(1..=MAX_HOURS)
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "jobflow=info",
        1 => "jobflow=debug",
        _ => "jobflow=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Serve => cmd_serve(&resolve_config(config_path)?).await,
        Command::Fetch {
            platforms,
            location,
            keywords,
            json,
        } => {
            let config = resolve_config(config_path)?;
            cmd_fetch(&config, non_empty(platforms), location, non_empty(keywords), json).await
        }
        Command::Jobs {
            platform,
            location,
            remote,
            keywords,
            salary_min,
            hours,
            page,
            limit,
            json,
        } => {
            let filter = JobFilter {
                platform,
                location,
                remote_only: remote,
                keywords,
                salary_min,
                posted_within_hours: hours,
                page,
                limit,
            };
            cmd_jobs(&resolve_config(config_path)?, &filter, json).await
        }
        Command::Job { id, json } => cmd_job(&resolve_config(config_path)?, &id, json).await,
        Command::Stats { hours, json } => {
            cmd_stats(&resolve_config(config_path)?, hours, json).await
        }
        Command::Sweep => cmd_sweep(&resolve_config(config_path)?).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() { None } else { Some(values) }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

async fn open_storage(config: &AppConfig) -> Result<Arc<Storage>> {
    let path = config.database_path()?;
    info!(path = %path.display(), "opening database");
    Ok(Arc::new(Storage::open(&path).await?))
}

async fn open_storage_readonly(config: &AppConfig) -> Result<Storage> {
    let path = config.database_path()?;
    if !path.exists() {
        return Err(eyre!(
            "no database at '{}': run `jobflow fetch` first",
            path.display()
        ));
    }
    Ok(Storage::open_readonly(&path).await?)
}

async fn build_scheduler(config: &AppConfig) -> Result<Scheduler> {
    let store: Arc<dyn JobStore> = open_storage(config).await?;
    let registry = AdapterRegistry::from_config(config)?;
    info!(platforms = ?registry.platforms(), "adapters ready");

    let orchestrator = Orchestrator::from_parts(
        registry,
        Reconciler::new(store.clone()).with_ttl_days(config.retention.job_ttl_days)?,
        RetentionSweeper::new(store).with_days(config.retention.days)?,
        Arc::new(WorkflowStore::new()),
    );
    Ok(Scheduler::new(orchestrator, config)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config: &AppConfig) -> Result<()> {
    let scheduler = build_scheduler(config).await?;

    println!("Scheduler running (cron \"{}\"). Press Ctrl-C to stop.", config.schedule.cron);
    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;

    let runs = scheduler.orchestrator().list_all();
    println!("Stopped after {} workflow run(s).", runs.len());
    Ok(())
}

async fn cmd_fetch(
    config: &AppConfig,
    platforms: Option<Vec<String>>,
    location: Option<String>,
    keywords: Option<Vec<String>>,
    json: bool,
) -> Result<()> {
    let scheduler = build_scheduler(config).await?;
    let id = scheduler.trigger(platforms, location, keywords)?;
    info!(workflow_id = %id, "workflow triggered");

    let orchestrator = scheduler.orchestrator();
    let progress = CliProgress::new();
    let run = loop {
        let run = orchestrator
            .status(id)
            .ok_or_else(|| eyre!("workflow {id} disappeared"))?;
        if run.status.is_terminal() {
            break run;
        }
        progress.update(&run);
        tokio::time::sleep(Duration::from_millis(100)).await;
    };
    progress.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
    }
    Ok(())
}

async fn cmd_jobs(config: &AppConfig, filter: &JobFilter, json: bool) -> Result<()> {
    let storage = open_storage_readonly(config).await?;
    let page = storage.list_jobs(filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print_jobs(&page);
    }
    Ok(())
}

async fn cmd_job(config: &AppConfig, id: &str, json: bool) -> Result<()> {
    let storage = open_storage_readonly(config).await?;
    let listing = storage
        .get_job(id)
        .await?
        .ok_or_else(|| eyre!("no stored job with id '{id}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        print_job(&listing);
    }
    Ok(())
}

async fn cmd_stats(config: &AppConfig, hours: i64, json: bool) -> Result<()> {
    let storage = open_storage_readonly(config).await?;
    let stats = storage.job_stats(hours, Utc::now()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

async fn cmd_sweep(config: &AppConfig) -> Result<()> {
    let storage = open_storage(config).await?;
    let deleted = RetentionSweeper::new(storage)
        .with_days(config.retention.days)?
        .sweep(Utc::now())
        .await;
    println!(
        "Removed {deleted} posting(s) older than {} days.",
        config.retention.days
    );
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_run(run: &WorkflowRun) {
    println!();
    println!("  Workflow {}", run.id);
    println!("  Status:    {}", run.status);
    println!(
        "  Platforms: {} ok, {} failed, {} total",
        run.progress.completed, run.progress.failed, run.progress.total
    );
    println!("  Stored:    {}", run.jobs_stored);
    println!("  Skipped:   {}", run.jobs_skipped);
    if let Some(finished) = run.completed_at {
        let elapsed = finished - run.started_at;
        println!("  Time:      {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    }
    if let Some(error) = &run.error {
        println!("  Error:     {error}");
    }
    println!();
}

fn print_jobs(page: &JobPage) {
    if page.jobs.is_empty() {
        println!("No jobs match.");
        return;
    }

    for listing in &page.jobs {
        let job = &listing.job;
        let record = &job.record;
        let organization = listing.organization_name.as_deref().unwrap_or("-");
        let salary = salary_range(record);

        println!(
            "{:>3}  {:<10} {} @ {} ({})",
            job.relevance_score, record.platform, record.title, organization, record.location
        );
        if !salary.is_empty() {
            println!("     {salary}");
        }
        println!("     {}", record.source_url);
        println!("     id {}", job.id);
    }

    println!();
    println!(
        "Page {}/{} ({} total)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
}

fn print_job(listing: &JobListing) {
    let job = &listing.job;
    let record = &job.record;

    println!();
    println!("  {}", record.title);
    println!("  Organization: {}", listing.organization_name.as_deref().unwrap_or("-"));
    println!("  Platform:     {} ({})", record.platform, record.external_id);
    println!("  Location:     {}{}", record.location, if record.is_remote { ", remote" } else { "" });
    let salary = salary_range(record);
    if !salary.is_empty() {
        println!("  Salary:       {salary}");
    }
    println!("  Score:        {}", job.relevance_score);
    println!("  Posted:       {}", record.posted_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Expires:      {}", job.expires_at.format("%Y-%m-%d %H:%M UTC"));
    if !record.requirements.is_empty() {
        println!("  Requirements: {}", record.requirements.join(", "));
    }
    println!("  URL:          {}", record.source_url);
    if !record.description.is_empty() {
        println!();
        println!("  {}", record.description);
    }
    println!();
}

fn salary_range(record: &JobRecord) -> String {
    match (record.salary_min, record.salary_max) {
        (Some(min), Some(max)) => format!("{min}-{max} {}", record.currency),
        (Some(min), None) => format!("{min}+ {}", record.currency),
        (None, Some(max)) => format!("up to {max} {}", record.currency),
        (None, None) => String::new(),
    }
}

fn print_stats(stats: &JobStats) {
    println!("Last {} hours", stats.hours);
    println!("  Total:  {}", stats.total_jobs);
    println!("  Remote: {}", stats.remote_jobs);
    for (platform, count) in &stats.platform_distribution {
        println!("  {platform:<10} {count}");
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner showing a running workflow's platform progress.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn update(&self, run: &WorkflowRun) {
        let done = run.progress.completed + run.progress.failed;
        self.spinner.set_message(format!(
            "Fetching [{done}/{}] platforms, {} stored",
            run.progress.total, run.jobs_stored
        ));
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_flags_accept_lists() {
        let cli = Cli::try_parse_from([
            "jobflow",
            "fetch",
            "--platform",
            "indeed,linkedin",
            "-p",
            "glassdoor",
            "--keyword",
            "rust",
        ])
        .unwrap();

        match cli.command {
            Command::Fetch {
                platforms,
                location,
                keywords,
                json,
            } => {
                assert_eq!(platforms, vec!["indeed", "linkedin", "glassdoor"]);
                assert!(location.is_none());
                assert_eq!(keywords, vec!["rust"]);
                assert!(!json);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn jobs_defaults() {
        let cli = Cli::try_parse_from(["jobflow", "jobs"]).unwrap();
        match cli.command {
            Command::Jobs {
                hours, page, limit, remote, ..
            } => {
                assert_eq!(hours, 24);
                assert_eq!(page, 1);
                assert_eq!(limit, 20);
                assert!(!remote);
            }
            _ => panic!("expected jobs"),
        }
    }

    #[test]
    fn hours_must_be_a_positive_bounded_window() {
        for hours in ["0", "-1", "87601", "9223372036854775807"] {
            assert!(
                Cli::try_parse_from(["jobflow", "jobs", "--hours", hours]).is_err(),
                "jobs --hours {hours} should be rejected"
            );
            assert!(
                Cli::try_parse_from(["jobflow", "stats", "--hours", hours]).is_err(),
                "stats --hours {hours} should be rejected"
            );
        }

        let cli = Cli::try_parse_from(["jobflow", "stats", "--hours", "87600"]).unwrap();
        assert!(matches!(cli.command, Command::Stats { hours: 87_600, .. }));
    }

    #[test]
    fn job_takes_an_id() {
        let cli = Cli::try_parse_from(["jobflow", "job", "0192f1c2-aaaa", "--json"]).unwrap();
        match cli.command {
            Command::Job { id, json } => {
                assert_eq!(id, "0192f1c2-aaaa");
                assert!(json);
            }
            _ => panic!("expected job"),
        }
        assert!(Cli::try_parse_from(["jobflow", "job"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["jobflow", "stats", "-vv", "--config", "/tmp/j.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/j.toml")));
    }

    #[test]
    fn empty_lists_fall_back_to_defaults() {
        assert_eq!(non_empty(Vec::new()), None);
        assert_eq!(non_empty(vec!["a".into()]), Some(vec!["a".to_string()]));
    }
}
