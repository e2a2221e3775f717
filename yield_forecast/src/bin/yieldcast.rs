//! # yieldcast
//!
//! Command-line front end for the yield forecasting engine.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yield_forecast::synthetic::{seasonal_observations, SeriesShape};
use yield_forecast::{
    Algorithm, DataLoader, Dataset, EngineConfig, ForecastEngine, ForecastError, Result,
};

#[derive(Parser)]
#[command(name = "yieldcast")]
#[command(about = "Monthly yield forecasting", long_about = None)]
struct Cli {
    /// JSON configuration file (default: YIELDCAST_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Import observations from a CSV file
    Import {
        /// CSV with date, category and value columns
        input: PathBuf,
    },

    /// Generate and import a synthetic seasonal series
    Synth {
        #[arg(long)]
        category: String,

        /// First month
        #[arg(long, default_value = "2019-01-01")]
        start: NaiveDate,

        #[arg(long, default_value = "48")]
        months: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show stored observations
    Dataset {
        /// Category prefix
        prefix: Option<String>,

        /// Monthly sums instead of raw rows
        #[arg(long)]
        monthly: bool,

        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
    },

    /// Train a model for a category
    Train {
        /// SARIMA or DECOMPOSITION
        algorithm: Algorithm,

        category: String,

        /// Acting user, recorded in logs
        #[arg(long)]
        user: Option<String>,
    },

    /// Show the live artifact for a category
    Check {
        algorithm: Algorithm,

        category: String,
    },

    /// Validate and forecast from the trained model
    Predict {
        algorithm: Algorithm,

        category: String,

        /// Forecast one month instead of twelve
        #[arg(long)]
        single_month: bool,

        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,

        /// Acting user, recorded in logs
        #[arg(long)]
        user: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ForecastError::DataError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_csv<T: Serialize>(rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ForecastError::DataError(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::from_env()?,
    };
    let engine = ForecastEngine::from_config(&config).await?;

    let outcome = execute(&engine, cli.command).await;
    let closed = engine.close().await;
    outcome.and(closed)
}

async fn execute(engine: &ForecastEngine, command: Commands) -> Result<()> {
    match command {
        Commands::Import { input } => {
            let rows = DataLoader::from_csv(&input)?;
            let ids = engine.import(&rows).await?;
            println!("imported {} rows from {}", ids.len(), input.display());
        }
        Commands::Synth {
            category,
            start,
            months,
            seed,
        } => {
            let rows = seasonal_observations(&category, start, months, SeriesShape::default(), seed)?;
            let ids = engine.import(&rows).await?;
            println!("imported {} synthetic rows for {}", ids.len(), category);
        }
        Commands::Dataset {
            prefix,
            monthly,
            format,
        } => {
            let dataset = engine.dataset(prefix.as_deref(), monthly).await?;
            match (format, &dataset) {
                (Format::Json, _) => print_json(&dataset)?,
                (Format::Csv, Dataset::Daily(rows)) => print_csv(rows)?,
                (Format::Csv, Dataset::Monthly(rows)) => print_csv(rows)?,
            }
        }
        Commands::Train {
            algorithm,
            category,
            user,
        } => {
            let metadata = engine.train(algorithm, &category, user.as_deref()).await?;
            print_json(&metadata)?;
        }
        Commands::Check {
            algorithm,
            category,
        } => match engine.check(algorithm, &category).await? {
            Some(metadata) => print_json(&metadata)?,
            None => println!("{} has not been trained for {}", algorithm, category),
        },
        Commands::Predict {
            algorithm,
            category,
            single_month,
            format,
            user,
        } => {
            let result = engine
                .predict(algorithm, &category, single_month, user.as_deref())
                .await?;
            match format {
                Format::Json => print_json(&result)?,
                Format::Csv => print_csv(&result.rows())?,
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yieldcast=info,yield_forecast=info".into()),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ ForecastError::NotTrained { .. }) => {
            eprintln!("not trained: {}. Run `yieldcast train` first.", err);
            ExitCode::from(3)
        }
        Err(err @ ForecastError::ArtifactUnavailable { .. }) => {
            eprintln!("artifact unavailable: {}. Retrain to replace it.", err);
            ExitCode::from(4)
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
