use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use chrono::Local;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::{error, info, warn};

mod cache;
mod config;
mod db;
mod export;
mod fetch;
mod merge;
mod models;
mod notify;
mod pipeline;
mod report;
mod roster;
mod sheet;
mod source;
mod style;
mod throttle;

use config::{LogFormat, LoggingConfig, TrackerConfig};
use notify::SmtpNotifier;
use pipeline::{Pipeline, RunMode};
use sheet::ROSTER_SHEET;
use source::LeetCodeClient;
use throttle::Throttle;

#[derive(Parser)]
#[command(name = "practice-tracker")]
#[command(about = "Daily LeetCode progress tracker for a cohort", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .args(["fetch", "email"])
        .multiple(false)
))]
struct Cli {
    /// TOML config file (defaults to $TRACKER_CONFIG or ./tracker.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Fetch and update the report only, caching today's numbers for --email
    #[arg(long)]
    fetch: bool,
    /// Send the daily email from cached numbers, fetching first if needed
    #[arg(long)]
    email: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new report file with an empty roster
    Init,
    /// Replace the roster sheet with rows from a CSV file
    ImportRoster {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Re-render the HTML and CSV exports from the stored report
    Export,
    /// List recent runs recorded in the report file
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

fn init_tracing(config: &LoggingConfig) {
    use std::sync::Mutex;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match config.format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Text => fmt::layer().boxed(),
    });

    let file_error = match config.open_file() {
        Ok(Some(file)) => {
            layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            );
            None
        }
        Ok(None) => None,
        Err(err) => Some(err),
    };

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init();

    if let Some(err) = file_error {
        warn!(error = format!("{err:#}"), "log file unavailable, logging to stdout only");
    }
}

/// Loads the config. In run mode a failure is logged and `None` comes back so
/// the process still exits cleanly; maintenance commands get the error.
fn load_config(path: Option<&Path>, run_mode: bool) -> anyhow::Result<Option<TrackerConfig>> {
    match TrackerConfig::load(path) {
        Ok(config) => {
            init_tracing(&config.logging);
            Ok(Some(config))
        }
        Err(err) if run_mode => {
            init_tracing(&LoggingConfig::default());
            error!(error = format!("{err:#}"), "failed to load config, run aborted");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(config) = load_config(cli.config.as_deref(), cli.command.is_none())? else {
        return Ok(());
    };

    let Some(command) = cli.command else {
        let mode = if cli.fetch {
            RunMode::FetchOnly
        } else if cli.email {
            RunMode::EmailOnly
        } else {
            RunMode::Full
        };
        run_tracker(&config, mode).await;
        return Ok(());
    };

    if cli.fetch || cli.email {
        bail!("--fetch and --email cannot be combined with a subcommand");
    }

    match command {
        Commands::Init => {
            let pool = db::create_report(&config.paths.report).await?;
            let workbook = db::load_workbook(&pool).await?;
            pool.close().await;
            println!(
                "Report ready at {} ({}).",
                config.paths.report.display(),
                workbook.sheet_names().join(", ")
            );
        }
        Commands::ImportRoster { csv } => {
            let users = roster::read_roster_csv(&csv)?;
            let pool = db::open_report(&config.paths.report).await?;
            let mut workbook = db::load_workbook(&pool).await?;
            roster::write_roster(workbook.ensure_sheet(ROSTER_SHEET), &users);
            db::save_workbook(&pool, &workbook).await?;
            pool.close().await;

            let tracked = workbook
                .sheet(ROSTER_SHEET)
                .map(|sheet| roster::load_roster(sheet).len())
                .unwrap_or(0);
            println!(
                "Imported {} rows from {} ({tracked} tracked).",
                users.len(),
                csv.display()
            );
        }
        Commands::Export => {
            let pool = db::open_report(&config.paths.report).await?;
            let workbook = db::load_workbook(&pool).await?;
            pool.close().await;
            let files =
                export::export_workbook(&workbook, &config.paths.export_dir, &config.styles)?;
            println!("Report written to {}.", files.html.display());
            for path in files.csv {
                println!("- {}", path.display());
            }
        }
        Commands::Runs { limit } => {
            let pool = db::open_report(&config.paths.report).await?;
            let runs = db::recent_runs(&pool, limit).await?;
            pool.close().await;

            if runs.is_empty() {
                println!("No runs recorded yet.");
                return Ok(());
            }

            println!("Recent runs:");
            for run in runs {
                println!(
                    "- {} {} ({} users) at {} [{}]",
                    run.run_date,
                    run.mode,
                    run.user_count,
                    run.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                    run.id
                );
            }
        }
    }

    Ok(())
}

/// Runs one tracker pass. Failures are logged, never surfaced as a process
/// error.
async fn run_tracker(config: &TrackerConfig, mode: RunMode) {
    let today = Local::now().date_naive();
    info!(mode = %mode, date = %today, report = %config.paths.report.display(), "tracker starting");

    let lookup_throttle = Arc::new(Throttle::from_millis(config.api.lookup_delay_ms));
    let source = match LeetCodeClient::new(&config.api, lookup_throttle) {
        Ok(source) => source,
        Err(err) => {
            error!(error = %err, "failed to build API client");
            return;
        }
    };
    let notifier = SmtpNotifier::new(config.email.clone());
    let user_throttle = Throttle::from_millis(config.api.user_delay_ms);

    let pipeline = Pipeline::new(config, &source, &notifier, &user_throttle);
    match pipeline.run(mode, today).await {
        Ok(outcome) => info!(
            users = outcome.users,
            fetched = outcome.fetched,
            delivery = ?outcome.delivery,
            "all done"
        ),
        Err(err) => error!(error = format!("{err:#}"), "run aborted"),
    }
}
