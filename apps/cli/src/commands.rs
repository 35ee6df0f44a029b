//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use marketfeed_core::pipeline::run_ingest;
use marketfeed_core::traits::ProgressReporter;
use marketfeed_shared::{
    AppConfig, BatchReport, config_file_path, init_config, load_config, load_config_from,
};
use marketfeed_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// marketfeed — enrich batch files of item identifiers into persisted records.
#[derive(Parser)]
#[command(
    name = "marketfeed",
    version,
    about = "Enrich batch files of marketplace item identifiers and persist the merged records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path (defaults to ~/.marketfeed/marketfeed.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

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
    /// Ingest a batch file and persist the enriched records.
    Ingest {
        /// Path to the batch file (header line, then one identifier per line).
        file: PathBuf,
    },

    /// List persisted item records.
    Items {
        /// Maximum number of records to show.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// List batch job history.
    Jobs {
        /// Maximum number of jobs to show.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "marketfeed=info",
        1 => "marketfeed=debug",
        _ => "marketfeed=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Ingest { file } => cmd_ingest(&config, &file).await,
        Command::Items { limit } => cmd_items(&config, limit).await,
        Command::Jobs { limit } => cmd_jobs(&config, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// Load config from an explicit path or the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(config: &AppConfig, file: &Path) -> Result<()> {
    // The original upload endpoint gated on the multipart Content-Type
    // header; from the CLI the file extension stands in for it.
    let content_type = content_type_for(file);
    if !config.upload.is_allowed_content_type(content_type) {
        return Err(eyre!(
            "unsupported file type '{content_type}' for {} (allowed: {})",
            file.display(),
            config.upload.content_types.join(", ")
        ));
    }

    let raw = std::fs::read(file)
        .map_err(|e| eyre!("cannot read {}: {e}", file.display()))?;

    info!(file = %file.display(), bytes = raw.len(), "ingesting batch file");

    let progress = SpinnerProgress::new();
    let report = run_ingest(
        config,
        &file.display().to_string(),
        &raw,
        &progress,
    )
    .await?;

    println!(
        "Batch {} finished in {:.1}s: {} saved, {} skipped",
        report.batch_id,
        report.duration.as_secs_f64(),
        report.records_saved,
        report.items_skipped,
    );
    for (identifier, message) in &report.errors {
        println!("  skipped {identifier}: {message}");
    }

    Ok(())
}

/// Map a file extension to the content type checked against the allow-list.
fn content_type_for(file: &Path) -> &'static str {
    match file.extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv",
        _ => "text/plain",
    }
}

async fn cmd_items(config: &AppConfig, limit: u32) -> Result<()> {
    let storage = Storage::open(&config.storage.resolved_db_path()).await?;
    let items = storage.list_items(limit).await?;

    if items.is_empty() {
        println!("No records persisted yet. Run `marketfeed ingest <file>` first.");
        return Ok(());
    }

    for item in items {
        println!(
            "{}  {:>10.2}  {}  {}  {}  (created {})",
            item.id,
            item.price,
            item.category_name,
            item.currency_description,
            item.seller_nickname,
            item.created_at.to_rfc3339(),
        );
    }
    Ok(())
}

async fn cmd_jobs(config: &AppConfig, limit: u32) -> Result<()> {
    let storage = Storage::open(&config.storage.resolved_db_path()).await?;
    let jobs = storage.list_batch_jobs(limit).await?;

    if jobs.is_empty() {
        println!("No batch jobs recorded yet.");
        return Ok(());
    }

    for job in jobs {
        let status = match (&job.finished_at, &job.stats_json) {
            (Some(_), Some(stats)) => stats.clone(),
            (Some(_), None) => "finished".into(),
            (None, _) => "running".into(),
        };
        println!("{}  {}  started {}  {status}", job.id, job.source, job.started_at);
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let path = config_file_path()?;
    println!("# resolved from {}", path.display());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Spinner-backed progress reporter for interactive runs.
struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressReporter for SpinnerProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn item_done(&self, identifier: &str, current: usize) {
        self.bar.set_message(format!("[{current}] saved {identifier}"));
    }

    fn done(&self, report: &BatchReport) {
        self.bar.finish_with_message(format!(
            "{} saved, {} skipped",
            report.records_saved, report.items_skipped
        ));
    }
}
