//! Nirbhay CLI - Command-line interface for the behavioral fraud check
//!
//! Commands:
//! - predict: Score one set of feature values
//! - batch: Score NDJSON requests from a file or stdin
//! - normalize: Show the model-ready vector for raw values
//! - config: Print the default configuration
//! - doctor: Diagnose model and configuration health

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use nirbhay_core::encoder::VerdictEncoder;
use nirbhay_core::pipeline::parse_inputs;
use nirbhay_core::{
    ClassifierHandle, DetectError, DetectorConfig, FraudDetector, OnnxRuntime, RawInputs,
    DEFAULT_MODEL_ASSET, NIRBHAY_VERSION, PRODUCER_NAME,
};

/// Nirbhay - On-device behavioral-biometric fraud check
#[derive(Parser)]
#[command(name = "nirbhay")]
#[command(author = "NirbhayNet Contributors")]
#[command(version = NIRBHAY_VERSION)]
#[command(about = "Score behavioral biometrics with a fraud classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one set of feature values
    Predict {
        /// Typing speed (characters per interval)
        #[arg(long, default_value = "")]
        typing_speed: String,

        /// Swipe speed (pixels per interval)
        #[arg(long, default_value = "")]
        swipe_speed: String,

        /// Tap pressure
        #[arg(long, default_value = "")]
        tap_pressure: String,

        /// Device tilt angle in degrees
        #[arg(long, default_value = "")]
        device_angle: String,

        /// Model asset path
        #[arg(short, long, default_value = DEFAULT_MODEL_ASSET)]
        model: PathBuf,

        /// Detector configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output the verdict report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score NDJSON requests (one object with the four fields per line)
    Batch {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Model asset path
        #[arg(short, long, default_value = DEFAULT_MODEL_ASSET)]
        model: PathBuf,

        /// Detector configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Buffer output instead of flushing after each record
        #[arg(long)]
        no_flush: bool,
    },

    /// Print the normalized vector for raw values (no model required)
    Normalize {
        #[arg(long, default_value = "")]
        typing_speed: String,

        #[arg(long, default_value = "")]
        swipe_speed: String,

        #[arg(long, default_value = "")]
        tap_pressure: String,

        #[arg(long, default_value = "")]
        device_angle: String,

        /// Detector configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration as JSON
    Config,

    /// Diagnose model and configuration health
    Doctor {
        /// Model asset path
        #[arg(short, long, default_value = DEFAULT_MODEL_ASSET)]
        model: PathBuf,

        /// Detector configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), NirbhayCliError> {
    match cli.command {
        Commands::Predict {
            typing_speed,
            swipe_speed,
            tap_pressure,
            device_angle,
            model,
            config,
            json,
        } => {
            let raw = RawInputs::new(typing_speed, swipe_speed, tap_pressure, device_angle);
            cmd_predict(&raw, &model, config.as_deref(), json)
        }

        Commands::Batch {
            input,
            output,
            model,
            config,
            no_flush,
        } => cmd_batch(&input, &output, &model, config.as_deref(), !no_flush),

        Commands::Normalize {
            typing_speed,
            swipe_speed,
            tap_pressure,
            device_angle,
            config,
        } => {
            let raw = RawInputs::new(typing_speed, swipe_speed, tap_pressure, device_angle);
            cmd_normalize(&raw, config.as_deref())
        }

        Commands::Config => {
            println!("{}", DetectorConfig::default().to_json()?);
            Ok(())
        }

        Commands::Doctor {
            model,
            config,
            json,
        } => cmd_doctor(&model, config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<DetectorConfig, NirbhayCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(DetectorConfig::from_json(&json)?)
        }
        None => Ok(DetectorConfig::default()),
    }
}

fn cmd_predict(
    raw: &RawInputs,
    model: &Path,
    config: Option<&Path>,
    json: bool,
) -> Result<(), NirbhayCliError> {
    let config = load_config(config)?;

    // Reject malformed input before paying for model acquisition
    parse_inputs(raw)?;

    let mut detector = FraudDetector::open::<OnnxRuntime>(&config, model)?;
    let prediction = detector.predict(raw)?;
    detector.release();

    if json {
        let encoder = VerdictEncoder::new();
        println!("{}", serde_json::to_string_pretty(&encoder.encode(&prediction))?);
    } else {
        println!("{}", prediction.verdict);
    }

    Ok(())
}

fn cmd_batch(
    input: &Path,
    output: &Path,
    model: &Path,
    config: Option<&Path>,
    flush: bool,
) -> Result<(), NirbhayCliError> {
    let config = load_config(config)?;
    let mut detector = FraudDetector::open::<OnnxRuntime>(&config, model)?;
    let encoder = VerdictEncoder::new();

    let reader: Box<dyn BufRead> = if input.to_string_lossy() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(fs::File::open(input)?))
    };

    let mut writer: Box<dyn Write> = if output.to_string_lossy() == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(fs::File::create(output)?)
    };

    let mut failed = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let result = serde_json::from_str::<RawInputs>(trimmed)
            .map_err(DetectError::JsonError)
            .and_then(|raw| detector.predict(&raw))
            .and_then(|prediction| encoder.encode_to_json(&prediction));

        match result {
            Ok(report) => writeln!(writer, "{}", report)?,
            Err(e) => {
                failed += 1;
                if e.is_input_error() {
                    log::warn!("record {} rejected: {}", index + 1, e);
                } else {
                    log::error!("record {} failed: {}", index + 1, e);
                }
                let record = BatchError {
                    line: index + 1,
                    code: e.kind().to_string(),
                    field: e.field().map(str::to_string),
                    message: e.to_string(),
                };
                writeln!(writer, "{}", serde_json::to_string(&record)?)?;
            }
        }

        if flush {
            writer.flush()?;
        }
    }

    writer.flush()?;
    detector.release();

    if failed > 0 {
        Err(NirbhayCliError::BatchFailed(failed))
    } else {
        Ok(())
    }
}

fn cmd_normalize(raw: &RawInputs, config: Option<&Path>) -> Result<(), NirbhayCliError> {
    let config = load_config(config)?;
    let normalizer = config.normalizer.build()?;

    let features = parse_inputs(raw)?;
    let normalized = normalizer.transform(&features)?;

    println!("{}", serde_json::to_string(&normalized)?);
    Ok(())
}

fn cmd_doctor(model: &Path, config: Option<&Path>, json: bool) -> Result<(), NirbhayCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, NIRBHAY_VERSION),
    });

    // Check configuration
    match load_config(config) {
        Ok(cfg) => {
            let normalizer = cfg
                .normalizer
                .build()
                .map(|n| n.name())
                .unwrap_or("invalid");
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} (normalizer={}, threshold={}, confidence={:?})",
                    config.map_or("defaults".to_string(), |p| p.display().to_string()),
                    normalizer,
                    cfg.interpret.threshold,
                    cfg.interpret.confidence
                ),
            });
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid configuration: {}", CliError::from(e).message),
            });
        }
    }

    // Check model asset
    if model.exists() {
        match ClassifierHandle::open::<OnnxRuntime>(model) {
            Ok(mut handle) => {
                let size = handle.asset().map(|a| a.len()).unwrap_or(0);
                handle.release();
                checks.push(DoctorCheck {
                    name: "model".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("{} loads ({} bytes)", model.display(), size),
                });
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "model".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                });
            }
        }
    } else {
        checks.push(DoctorCheck {
            name: "model".to_string(),
            status: CheckStatus::Error,
            message: format!("Model asset {} does not exist", model.display()),
        });
    }

    // Check stdin is available (for batch mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (batch mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: NIRBHAY_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Nirbhay Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
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
        Err(NirbhayCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum NirbhayCliError {
    Io(io::Error),
    Detect(DetectError),
    Json(serde_json::Error),
    BatchFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for NirbhayCliError {
    fn from(e: io::Error) -> Self {
        NirbhayCliError::Io(e)
    }
}

impl From<DetectError> for NirbhayCliError {
    fn from(e: DetectError) -> Self {
        NirbhayCliError::Detect(e)
    }
}

impl From<serde_json::Error> for NirbhayCliError {
    fn from(e: serde_json::Error) -> Self {
        NirbhayCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<NirbhayCliError> for CliError {
    fn from(e: NirbhayCliError) -> Self {
        match e {
            NirbhayCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            NirbhayCliError::Detect(e) => {
                let hint = match &e {
                    DetectError::MissingField { field } => {
                        format!("Provide a value for --{}", field.replace('_', "-"))
                    }
                    _ if e.is_input_error() => "Please enter valid numbers".to_string(),
                    DetectError::ModelLoad(_) => {
                        "Run 'nirbhay doctor' to check the model asset".to_string()
                    }
                    DetectError::Inference(_) => "Retry the prediction".to_string(),
                    _ => "Run 'nirbhay config' for a valid configuration".to_string(),
                };
                CliError {
                    code: e.kind().to_uppercase(),
                    message: e.to_string(),
                    hint: Some(hint),
                }
            }
            NirbhayCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            NirbhayCliError::BatchFailed(count) => CliError {
                code: "BATCH_FAILED".to_string(),
                message: format!("{} records could not be scored", count),
                hint: Some("See the error records in the output".to_string()),
            },
            NirbhayCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct BatchError {
    line: usize,
    code: String,
    field: Option<String>,
    message: String,
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
    Error,
}
