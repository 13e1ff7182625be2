// climax v0.2
use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod errors;
mod helpers;
mod services;

use config::AppConfig;
use db::source::{MySqlTrialSource, TrialSnapshot};
use errors::ClimateError;
use services::climate::{analyze_trial, AnalysisSettings, StressReport, TrialParams};
use services::overrides::TrialOverrides;
use services::soil_water::SoilProfile;
use services::thermal_time::{weekly_climate_for_trial, DEFAULT_SAMPLE_WEEKDAY};

/// Cold, heat, drought and light stress indicators for field trials.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Cold stress lower bound in °C (overrides CLIMAX_TLB)
    #[arg(long, global = true)]
    tlb: Option<f64>,

    /// Heat stress upper bound in °C (overrides CLIMAX_TUB)
    #[arg(long, global = true)]
    tub: Option<f64>,

    /// Soil water level below which a day counts as drought-stressed
    /// (overrides CLIMAX_DROUGHT_THRESHOLD)
    #[arg(long, global = true)]
    drought_threshold: Option<f64>,

    /// Write logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse a single trial from the database
    Trial {
        culture_id: i64,
        #[command(flatten)]
        site: SiteArgs,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Also write every fetched feed to this JSON file
        #[arg(long, value_name = "PATH")]
        save_snapshot: Option<PathBuf>,
    },
    /// Analyse every line of a tab-separated parameter file
    Batch {
        /// culture id, flowering date, soil volume, field capacity per line
        input: PathBuf,
        /// Output file; stdout when omitted
        output: Option<PathBuf>,
    },
    /// Analyse a trial from a saved snapshot, without a database
    Replay {
        snapshot: PathBuf,
        #[command(flatten)]
        site: SiteArgs,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Weekly thermal time and midday vapour pressure deficit of a trial
    Weekly {
        culture_id: i64,
        /// Output file; stdout when omitted
        output: Option<PathBuf>,
        /// Day whose cumulative heat sum stands for the week
        #[arg(long, default_value_t = DEFAULT_SAMPLE_WEEKDAY)]
        weekday: Weekday,
        /// Read the feeds from a saved snapshot instead of the database
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SiteArgs {
    /// Flowering date (YYYY-MM-DD)
    flowering_date: NaiveDate,
    /// Soil water capacity (mm)
    soil_volume: f64,
    available_moisture_capacity: f64,
}

impl SiteArgs {
    fn params(&self, culture_id: i64) -> Result<TrialParams, ClimateError> {
        Ok(TrialParams {
            culture_id,
            flowering_date: self.flowering_date,
            soil: SoilProfile::new(self.soil_volume, self.available_moisture_capacity)?,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries reports.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "climax=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = AppConfig::from_env();
    if let Some(tlb) = cli.tlb {
        config.thresholds.tlb = tlb;
    }
    if let Some(tub) = cli.tub {
        config.thresholds.tub = tub;
    }
    if let Some(threshold) = cli.drought_threshold {
        config.thresholds.drought_threshold = threshold;
    }

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(kind = e.kind(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &AppConfig) -> Result<ExitCode, ClimateError> {
    let settings = AnalysisSettings {
        thresholds: config.thresholds,
        overrides: TrialOverrides::default(),
    };

    match command {
        Command::Trial {
            culture_id,
            site,
            json,
            save_snapshot,
        } => {
            let params = site.params(culture_id)?;
            let source = MySqlTrialSource::new(connect(config).await?);
            let report = match save_snapshot {
                Some(path) => {
                    let snapshot = TrialSnapshot::capture(&source, culture_id).await?;
                    snapshot.save(&path)?;
                    tracing::info!(culture_id, path = %path.display(), "Snapshot saved");
                    analyze_trial(&snapshot, &params, &settings).await?
                }
                None => analyze_trial(&source, &params, &settings).await?,
            };
            print_report(&report, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Batch { input, output } => {
            let lines = services::batch::read_parameter_file(&input)?;
            tracing::info!(path = %input.display(), lines = lines.len(), "Parameter file read");

            let source = MySqlTrialSource::new(connect(config).await?);
            let outcome = services::batch::run_batch(
                &source,
                lines,
                &settings,
                config.max_concurrent_trials,
            )
            .await;

            match output {
                Some(path) => services::report::write_tsv(File::create(&path)?, &outcome.reports)?,
                None => services::report::write_tsv(std::io::stdout().lock(), &outcome.reports)?,
            }

            if !outcome.failures.is_empty() {
                tracing::warn!(
                    failed_lines = ?outcome.failed_lines(),
                    by_kind = ?outcome.failures_by_kind(),
                    "Trials skipped"
                );
            }
            if outcome.all_failed() {
                tracing::error!(failed = outcome.failures.len(), "Every trial failed");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Replay {
            snapshot,
            site,
            json,
        } => {
            let snapshot = TrialSnapshot::load(&snapshot)?;
            let params = site.params(snapshot.culture_id)?;
            let report = analyze_trial(&snapshot, &params, &settings).await?;
            print_report(&report, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Weekly {
            culture_id,
            output,
            weekday,
            snapshot,
        } => {
            let weeks = match snapshot {
                Some(path) => {
                    let snapshot = TrialSnapshot::load(&path)?;
                    weekly_climate_for_trial(&snapshot, culture_id, weekday).await?
                }
                None => {
                    let source = MySqlTrialSource::new(connect(config).await?);
                    weekly_climate_for_trial(&source, culture_id, weekday).await?
                }
            };
            tracing::info!(culture_id, weeks = weeks.len(), "Weekly climate ready");
            match output {
                Some(path) => services::report::write_weekly_tsv(File::create(&path)?, &weeks)?,
                None => services::report::write_weekly_tsv(std::io::stdout().lock(), &weeks)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Set up the database pool and check that the server answers.
async fn connect(config: &AppConfig) -> Result<MySqlPool, ClimateError> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(config.database_url()?)
        .await?;
    db::queries::ping(&pool).await?;
    tracing::debug!(max_connections = config.db_max_connections, "Database pool ready");
    Ok(pool)
}

fn print_report(report: &StressReport, json: bool) -> Result<(), ClimateError> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", services::report::render_text(report));
    }
    Ok(())
}
