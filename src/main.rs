use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use skywatch_core::Config;
use skywatch_services::{
    CycleOutcome, ReadingQuery, ReadingStore, Scheduler, SqliteWeatherStore, SummaryQuery,
    SummaryStore, WeatherPipeline,
};
use tokio_util::sync::CancellationToken;

/// Periodic weather collection with daily summaries
#[derive(Parser)]
#[command(name = "skywatch", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and aggregate on the configured interval (default)
    Run,
    /// Run a single fetch/aggregate cycle and exit
    Once {
        /// City to query instead of the configured default
        #[arg(short, long)]
        location: Option<String>,
    },
    /// List stored readings, newest first
    Readings {
        /// Exact condition label, e.g. "Rain"
        #[arg(short, long)]
        condition: Option<String>,
        /// UTC date, YYYY-MM-DD
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Case-insensitive search on the condition label
        #[arg(short, long)]
        search: Option<String>,
        /// Maximum rows to print; all rows when omitted
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// List daily summaries, newest first
    Summaries {
        /// UTC date, YYYY-MM-DD
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Case-insensitive search on the dominant condition
        #[arg(short, long)]
        search: Option<String>,
        /// Maximum rows to print; all rows when omitted
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

fn open_store(config: &Config) -> Result<SqliteWeatherStore> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;
    let path = config.database_path();
    tracing::debug!("Opening database at {}", path.display());
    SqliteWeatherStore::open(&path).context("Failed to open weather database")
}

async fn run_scheduler(config: &Config) -> Result<()> {
    let store = open_store(config)?.into_shared();
    let pipeline = WeatherPipeline::from_config(&config.weather, store)
        .context("Failed to build weather pipeline")?;
    let scheduler = Scheduler::new(Arc::new(pipeline), config.scheduler.interval());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutdown requested");
        signal.cancel();
    });

    scheduler.run(shutdown).await;
    Ok(())
}

async fn run_once(config: &Config, location: Option<&str>) -> Result<()> {
    let store = open_store(config)?.into_shared();
    let pipeline = WeatherPipeline::from_config(&config.weather, store)
        .context("Failed to build weather pipeline")?;

    match pipeline
        .run_cycle_for(location, Utc::now().date_naive())
        .await
        .context("Weather cycle failed")?
    {
        CycleOutcome::FetchFailed => println!("Fetch failed; no reading stored"),
        CycleOutcome::Aggregated(Some(summary)) => println!("{}", summary),
        CycleOutcome::Aggregated(None) => {
            println!("Reading stored; nothing to aggregate for today")
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    skywatch_core::init()?;
    let args = Args::parse();
    let (config, _) = Config::load_validated()?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_scheduler(&config).await?,
        Command::Once { location } => run_once(&config, location.as_deref()).await?,
        Command::Readings {
            condition,
            date,
            search,
            limit,
        } => {
            let query = ReadingQuery {
                condition,
                date,
                search,
                limit,
            };
            for reading in open_store(&config)?.query_readings(&query)? {
                println!("{}", reading);
            }
        }
        Command::Summaries {
            date,
            search,
            limit,
        } => {
            let query = SummaryQuery {
                date,
                search,
                limit,
            };
            for summary in open_store(&config)?.query_summaries(&query)? {
                println!("{}", summary);
            }
        }
    }

    Ok(())
}
