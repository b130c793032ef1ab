//! Exposure risk command-line front end.
//!
//! # Usage
//!
//! ```bash
//! exposure-risk risk <input.json> [--now <rfc3339>]
//! exposure-risk import-config --db <path> <config.json>
//! exposure-risk evaluate --db <path> --tracing-days <n> [--summary <summary.json>] [--now <rfc3339>]
//! exposure-risk device-time --db <path> --server-time <rfc3339> [--device-time <rfc3339>]
//! ```
//!
//! Results are printed to stdout as JSON, logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exposure_risk::adapters::sanitize::SanitizingMakeWriter;
use exposure_risk::adapters::SqliteStore;
use exposure_risk::application::{risk_calculation, DeviceTimeCheck, RiskProvider};
use exposure_risk::domain::{
    ApplicationConfiguration, ExposureDetectionSummary, ExposureManagerState,
    ExposureNotificationStatus,
};
use exposure_risk::ports::AppConfigCaching;
use exposure_risk::{ExposureRiskError, RiskCalculationInput};

const USAGE: &str = "Usage:
  exposure-risk risk <input.json> [--now <rfc3339>]
  exposure-risk import-config --db <path> <config.json>
  exposure-risk evaluate --db <path> --tracing-days <n> [--summary <summary.json>] [--now <rfc3339>]
  exposure-risk device-time --db <path> --server-time <rfc3339> [--device-time <rfc3339>]";

#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Risk {
        input: PathBuf,
        now: Option<DateTime<Utc>>,
    },
    ImportConfig {
        db: PathBuf,
        config: PathBuf,
    },
    Evaluate {
        db: PathBuf,
        tracing_days: u32,
        summary: Option<PathBuf>,
        now: Option<DateTime<Utc>>,
    },
    DeviceTime {
        db: PathBuf,
        server_time: DateTime<Utc>,
        device_time: Option<DateTime<Utc>>,
    },
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid RFC 3339 date: {value}"))
}

fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(subcommand) = args.next() else {
        bail!("Missing command\n{USAGE}");
    };
    if matches!(subcommand.as_str(), "-h" | "--help" | "help") {
        return Ok(Command::Help);
    }

    let mut db: Option<PathBuf> = None;
    let mut now: Option<DateTime<Utc>> = None;
    let mut server_time: Option<DateTime<Utc>> = None;
    let mut device_time: Option<DateTime<Utc>> = None;
    let mut tracing_days: Option<u32> = None;
    let mut summary: Option<PathBuf> = None;
    let mut positional: Vec<PathBuf> = Vec::new();

    while let Some(arg) = args.next() {
        let mut value = || args.next().with_context(|| format!("Missing value for {arg}\n{USAGE}"));
        match arg.as_str() {
            "--db" => db = Some(PathBuf::from(value()?)),
            "--now" => now = Some(parse_time(&value()?)?),
            "--server-time" => server_time = Some(parse_time(&value()?)?),
            "--device-time" => device_time = Some(parse_time(&value()?)?),
            "--summary" => summary = Some(PathBuf::from(value()?)),
            "--tracing-days" => {
                let days = value()?;
                tracing_days = Some(
                    days.parse()
                        .with_context(|| format!("Invalid number of days: {days}"))?,
                );
            }
            flag if flag.starts_with("--") => bail!("Unknown arg: {flag}\n{USAGE}"),
            _ => positional.push(PathBuf::from(&arg)),
        }
    }

    let db = || db.clone().with_context(|| format!("Missing --db\n{USAGE}"));
    let single_positional = |what: &str| -> Result<PathBuf> {
        match positional.as_slice() {
            [path] => Ok(path.clone()),
            _ => bail!("Expected exactly one {what}\n{USAGE}"),
        }
    };

    match subcommand.as_str() {
        "risk" => Ok(Command::Risk {
            input: single_positional("input file")?,
            now,
        }),
        "import-config" => Ok(Command::ImportConfig {
            db: db()?,
            config: single_positional("configuration file")?,
        }),
        "evaluate" => Ok(Command::Evaluate {
            db: db()?,
            tracing_days: tracing_days.with_context(|| format!("Missing --tracing-days\n{USAGE}"))?,
            summary,
            now,
        }),
        "device-time" => Ok(Command::DeviceTime {
            db: db()?,
            server_time: server_time.with_context(|| format!("Missing --server-time\n{USAGE}"))?,
            device_time,
        }),
        other => bail!("Unknown command: {other}\n{USAGE}"),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Help => println!("{USAGE}"),
        Command::Risk { input, now } => {
            let input: RiskCalculationInput = read_json(&input)?;
            let risk = risk_calculation::risk_at(&input, now.unwrap_or_else(Utc::now))?;
            print_json(&risk)?;
        }
        Command::ImportConfig { db, config } => {
            let config: ApplicationConfiguration = read_json(&config)?;
            if config.low_class().is_none() || config.high_class().is_none() {
                return Err(ExposureRiskError::Validation(
                    "Configuration needs LOW and HIGH risk score classes".to_string(),
                )
                .into());
            }
            let store = SqliteStore::new(&db)?;
            store.set_app_config(&config)?;
        }
        Command::Evaluate {
            db,
            tracing_days,
            summary,
            now,
        } => {
            let now = now.unwrap_or_else(Utc::now);
            let provider = RiskProvider::new(Arc::new(SqliteStore::new(&db)?));
            if let Some(path) = summary {
                let summary: ExposureDetectionSummary = read_json(&path)?;
                provider.record_detection(&Ok(summary), now)?;
            }
            let preconditions =
                ExposureManagerState::new(true, true, ExposureNotificationStatus::Active);
            let risk = provider.evaluate(preconditions, tracing_days, now)?;
            print_json(&risk)?;
        }
        Command::DeviceTime {
            db,
            server_time,
            device_time,
        } => {
            let store = Arc::new(SqliteStore::new(&db)?);
            let check = DeviceTimeCheck::new(Arc::clone(&store));
            check.check_and_persist_device_time_flags(
                server_time,
                device_time.unwrap_or_else(Utc::now),
            )?;
            print_json(&serde_json::json!({
                "deviceTimeIsCorrect": store.device_time_is_correct()?,
                "deviceTimeErrorWasShown": store.device_time_error_was_shown()?,
            }))?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // stdout carries the JSON results
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    let command = parse_args(std::env::args().skip(1))?;
    tracing::debug!("Running {:?}", command);
    run(command)
}
