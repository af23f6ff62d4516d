//! Chair CLI - Command-line interface for chair-flux
//!
//! Commands:
//! - decode: Decode a wire frame into calibrated values
//! - encode: Encode 12 pressure values into a wire frame
//! - current: Poll the current posture once
//! - day: Print or export one day of readings
//! - last-active: Summarize the last day the chair was used
//! - grid: Render seat and backrest grids
//! - doctor: Diagnose configuration and store health

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

use chair_flux::codec;
use chair_flux::export::write_csv;
use chair_flux::store::{MemoryStore, RemoteStore, StoreLayout};
use chair_flux::types::CHANNEL_COUNT;
use chair_flux::{
    ChairError, ChairPipeline, PipelineConfig, PostureClassifier, SensorPoint, SpatialGrid,
    TemplateClassifier, PRODUCER_NAME, VERSION,
};

/// Chair - posture telemetry ingestion and preparation
#[derive(Parser)]
#[command(name = "chair")]
#[command(version = VERSION)]
#[command(about = "Decode, poll and summarize posture-chair telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read the reading tree from a JSON export instead of the remote store
    #[arg(long, global = true)]
    dump: Option<PathBuf>,

    /// Prototype set for the template classifier (JSON)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Override the store value layout
    #[arg(long, global = true, value_enum)]
    layout: Option<LayoutArg>,

    /// Override the local UTC offset, in minutes
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset: Option<i32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a wire frame into calibrated values
    Decode {
        /// Frame text, e.g. "~PAA__"
        frame: String,
    },

    /// Encode 12 raw pressure values into a wire frame
    Encode {
        /// Pressure values p00..p11 (0-4095)
        #[arg(required = true, value_delimiter = ',')]
        values: Vec<u16>,
    },

    /// Poll the current posture once
    Current {
        /// Include seat and backrest grids
        #[arg(long)]
        grid: bool,
    },

    /// Print or export the readings of one day
    Day {
        /// Day to read (YYYY-MM-DD); defaults to today
        date: Option<NaiveDate>,

        /// Remove glitch rows with the outlier filter
        #[arg(long)]
        filter: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: DayFormat,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize the last day the chair was used
    LastActive,

    /// Render seat and backrest grids
    Grid {
        /// Channel values p00..p11; the current reading is used if omitted
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        values: Option<Vec<f64>>,
    },

    /// Diagnose configuration and store health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Legacy,
    Encoded,
    Delimited,
}

impl From<LayoutArg> for StoreLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Legacy => StoreLayout::Legacy,
            LayoutArg::Encoded => StoreLayout::Encoded,
            LayoutArg::Delimited => StoreLayout::Delimited,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DayFormat {
    /// Pretty-printed JSON table
    Json,
    /// CSV with one row per reading
    Csv,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ChairCliError> {
    match &cli.command {
        Commands::Decode { frame } => cmd_decode(frame),
        Commands::Encode { values } => cmd_encode(values),
        Commands::Current { grid } => {
            let pipeline = build_pipeline(&cli)?;
            cmd_current(&pipeline, *grid)
        }
        Commands::Day {
            date,
            filter,
            format,
            output,
        } => {
            let pipeline = build_pipeline(&cli)?;
            cmd_day(&pipeline, *date, *filter, *format, output.as_deref())
        }
        Commands::LastActive => {
            let pipeline = build_pipeline(&cli)?;
            cmd_last_active(&pipeline)
        }
        Commands::Grid { values } => {
            let pipeline = build_pipeline(&cli)?;
            cmd_grid(&pipeline, values.as_deref())
        }
        Commands::Doctor { json } => cmd_doctor(&cli, *json),
    }
}

fn cmd_decode(frame: &str) -> Result<(), ChairCliError> {
    let decoded = codec::decode(frame)?;
    let mut out = serde_json::Map::new();
    for (tag, values) in decoded.iter() {
        out.insert(tag.as_char().to_string(), serde_json::json!(values));
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_encode(values: &[u16]) -> Result<(), ChairCliError> {
    if values.len() != CHANNEL_COUNT {
        return Err(ChairCliError::ChannelCount(values.len()));
    }
    println!("{}", codec::encode_pressure(values)?);
    Ok(())
}

fn cmd_current(pipeline: &ChairPipeline, grid: bool) -> Result<(), ChairCliError> {
    let output = if grid {
        serde_json::to_string_pretty(&pipeline.current_view()?)?
    } else {
        serde_json::to_string_pretty(&pipeline.current_reading()?)?
    };
    println!("{}", output);
    Ok(())
}

fn cmd_day(
    pipeline: &ChairPipeline,
    date: Option<NaiveDate>,
    filter: bool,
    format: DayFormat,
    output: Option<&Path>,
) -> Result<(), ChairCliError> {
    let day = match date {
        Some(day) => day,
        None => pipeline.today()?,
    };

    let table = if filter {
        let outcome = pipeline.filtered_day(day)?;
        info!(%day, dropped = outcome.dropped.len(), "filtered day");
        outcome.table
    } else {
        pipeline.day_table(day)?
    };

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        DayFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &table)?;
            writeln!(writer)?;
        }
        DayFormat::Csv => write_csv(&table, &mut writer)?,
    }
    writer.flush()?;
    Ok(())
}

fn cmd_last_active(pipeline: &ChairPipeline) -> Result<(), ChairCliError> {
    let report = pipeline.last_active_day()?.ok_or(ChairCliError::NoActiveDay(
        pipeline.config().max_lookback_days,
    ))?;

    if let Some(summary) = &report.summary {
        info!(day = %summary.day, grade = %summary.grade, "last active day");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_grid(pipeline: &ChairPipeline, values: Option<&[f64]>) -> Result<(), ChairCliError> {
    let grid = match values {
        Some(values) => {
            let values: [f64; CHANNEL_COUNT] = values
                .try_into()
                .map_err(|_| ChairCliError::ChannelCount(values.len()))?;
            pipeline.grid_for(&values)
        }
        None => {
            let current = pipeline.current_reading()?;
            let reading = current.reading.ok_or(ChairCliError::NoCurrentReading)?;
            pipeline.mapper().generate_grid(&reading)
        }
    };
    let output = GridOutput {
        grid,
        points: pipeline.mapper().points(),
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn cmd_doctor(cli: &Cli, json: bool) -> Result<(), ChairCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("chair-flux version {}", VERSION),
    });

    let config = match load_config(cli) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "layout {}, utc offset {} min, polling {} ms, freshness {} ms",
                    config.layout.as_str(),
                    config.utc_offset_minutes,
                    config.polling_interval_ms,
                    config.freshness_threshold_ms
                ),
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            });
            None
        }
    };

    match load_classifier(cli) {
        Ok(classifier) => checks.push(DoctorCheck {
            name: "classifier".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "{} ({} prototypes over {} postures)",
                match &cli.model {
                    Some(path) => format!("Prototype set loaded from {}", path.display()),
                    None => "Using built-in prototypes".to_string(),
                },
                classifier.prototypes().len(),
                classifier.label_histogram().len()
            ),
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "classifier".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        }),
    }

    if let Some(config) = &config {
        let check = match build_store(cli, config).and_then(|store| Ok(store.list_days()?)) {
            Ok(days) => DoctorCheck {
                name: "store".to_string(),
                status: if days.is_empty() {
                    CheckStatus::Warning
                } else {
                    CheckStatus::Ok
                },
                message: format!("{} day bucket(s) available", days.len()),
            },
            Err(ChairCliError::NoSource) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "No reading source configured".to_string(),
            },
            Err(e) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            },
        };
        checks.push(check);
    }

    let tty_check = if atty::is(atty::Stream::Stdout) {
        DoctorCheck {
            name: "stdout".to_string(),
            status: CheckStatus::Ok,
            message: "stdout is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdout".to_string(),
            status: CheckStatus::Ok,
            message: "stdout is a pipe (machine-readable output)".to_string(),
        }
    };
    checks.push(tty_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Chair Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ChairCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_config(cli: &Cli) -> Result<PipelineConfig, ChairCliError> {
    let mut config = match &cli.config {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            PipelineConfig::from_json(&fs::read_to_string(path)?)?
        }
        None => PipelineConfig::default(),
    };

    if let Some(layout) = cli.layout {
        config.layout = layout.into();
    }
    if let Some(offset) = cli.utc_offset {
        config.utc_offset_minutes = offset;
    }
    config.validate()?;
    Ok(config)
}

fn load_classifier(cli: &Cli) -> Result<TemplateClassifier, ChairCliError> {
    match &cli.model {
        Some(path) => Ok(TemplateClassifier::from_json(&fs::read_to_string(path)?)?),
        None => Ok(TemplateClassifier::default()),
    }
}

fn build_store(cli: &Cli, config: &PipelineConfig) -> Result<Arc<dyn RemoteStore>, ChairCliError> {
    if let Some(path) = &cli.dump {
        let store = MemoryStore::from_json(&fs::read_to_string(path)?)?;
        info!(days = store.day_count(), "loaded reading tree from dump");
        return Ok(Arc::new(store));
    }

    match &config.firebase {
        #[cfg(feature = "firebase")]
        Some(firebase) => Ok(Arc::new(chair_flux::FirebaseStore::new(firebase.clone())?)),
        #[cfg(not(feature = "firebase"))]
        Some(_) => Err(ChairCliError::FirebaseDisabled),
        None => Err(ChairCliError::NoSource),
    }
}

fn build_pipeline(cli: &Cli) -> Result<ChairPipeline, ChairCliError> {
    let config = load_config(cli)?;
    let store = build_store(cli, &config)?;
    let classifier: Arc<dyn PostureClassifier> = Arc::new(load_classifier(cli)?);
    Ok(ChairPipeline::new(store, classifier, config)?)
}

// Error types

#[derive(Debug)]
enum ChairCliError {
    Io(io::Error),
    Chair(ChairError),
    Json(serde_json::Error),
    NoSource,
    #[cfg_attr(feature = "firebase", allow(dead_code))]
    FirebaseDisabled,
    NoActiveDay(u32),
    NoCurrentReading,
    ChannelCount(usize),
    DoctorFailed,
}

impl From<io::Error> for ChairCliError {
    fn from(e: io::Error) -> Self {
        ChairCliError::Io(e)
    }
}

impl From<ChairError> for ChairCliError {
    fn from(e: ChairError) -> Self {
        ChairCliError::Chair(e)
    }
}

impl From<serde_json::Error> for ChairCliError {
    fn from(e: serde_json::Error) -> Self {
        ChairCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ChairCliError> for CliError {
    fn from(e: ChairCliError) -> Self {
        match e {
            ChairCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ChairCliError::Chair(e) => {
                let (code, hint) = match &e {
                    ChairError::InvalidFrame(_)
                    | ChairError::UnboundTag(_)
                    | ChairError::UnknownTag(_)
                    | ChairError::InvalidSymbol { .. } => {
                        ("FRAME_ERROR", "Frames are '~' + tag followed by 2-symbol values")
                    }
                    ChairError::ValueOutOfRange { .. } => {
                        ("RANGE_ERROR", "Raw values must be between 0 and 4095")
                    }
                    ChairError::Store(_) => {
                        ("STORE_ERROR", "Check the database URL, token and network")
                    }
                    ChairError::Config(_) => ("CONFIG_ERROR", "Run 'chair doctor' for details"),
                    ChairError::Classifier(_) | ChairError::UnknownLabel(_) => {
                        ("CLASSIFIER_ERROR", "Check the prototype set passed with --model")
                    }
                    ChairError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    _ => ("CHAIR_ERROR", "Run with --log-level debug for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ChairCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ChairCliError::NoSource => CliError {
                code: "NO_SOURCE".to_string(),
                message: "No reading source configured".to_string(),
                hint: Some("Pass --dump <file> or add a firebase block to the config".to_string()),
            },
            ChairCliError::FirebaseDisabled => CliError {
                code: "FIREBASE_DISABLED".to_string(),
                message: "Remote store support is not compiled in".to_string(),
                hint: Some("Rebuild with --features firebase or use --dump".to_string()),
            },
            ChairCliError::NoActiveDay(days) => CliError {
                code: "NO_ACTIVE_DAY".to_string(),
                message: format!("No readings in the last {} days", days),
                hint: Some("Raise max_lookback_days or check the store layout".to_string()),
            },
            ChairCliError::NoCurrentReading => CliError {
                code: "NOT_SITTING".to_string(),
                message: "No fresh reading to render".to_string(),
                hint: Some("Pass --values to render a fixed vector".to_string()),
            },
            ChairCliError::ChannelCount(n) => CliError {
                code: "CHANNEL_COUNT".to_string(),
                message: format!("Expected {} values, got {}", CHANNEL_COUNT, n),
                hint: None,
            },
            ChairCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct GridOutput {
    #[serde(flatten)]
    grid: SpatialGrid,
    points: Vec<SensorPoint>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
