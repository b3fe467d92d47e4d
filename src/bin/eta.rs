//! eta CLI - Command-line interface for delivery-eta
//!
//! Commands:
//! - predict: Estimate delivery times for a batch of orders
//! - validate: Encode orders against a model schema and report failures
//! - schema: Print a model's feature order and codebook
//! - doctor: Diagnose model artifact and metadata consistency

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use delivery_eta::codebook::CategoricalField;
use delivery_eta::encoder::{EncoderConfig, FeatureEncoder};
use delivery_eta::model::{validate_against, LinearRegressor, Regressor};
use delivery_eta::pipeline::{parse_inputs, parse_ndjson, EtaProcessor};
use delivery_eta::schema::{ColumnKind, FeatureSchema, ModelMetadata};
use delivery_eta::types::{EstimateReport, RawOrderInput};
use delivery_eta::{EtaError, ETA_VERSION, PRODUCER_NAME};

/// eta - Delivery-time estimation from trained regression models
#[derive(Parser)]
#[command(name = "eta")]
#[command(version = ETA_VERSION)]
#[command(about = "Encode delivery orders and estimate delivery times", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate delivery times for a batch of orders
    Predict {
        /// Linear model artifact (JSON)
        #[arg(long, env = "ETA_MODEL")]
        model: PathBuf,

        /// Model metadata sidecar (JSON)
        #[arg(long, env = "ETA_METADATA")]
        metadata: PathBuf,

        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Fill missing features with this value instead of failing
        #[arg(long)]
        sentinel: Option<f64>,
    },

    /// Encode orders against a model schema and report failures
    Validate {
        /// Model metadata sidecar (JSON)
        #[arg(long, env = "ETA_METADATA")]
        metadata: PathBuf,

        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a model's feature order and codebook
    Schema {
        /// Model metadata sidecar (JSON); the reference layout when omitted
        #[arg(long, env = "ETA_METADATA")]
        metadata: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose model artifact and metadata consistency
    Doctor {
        /// Linear model artifact (JSON)
        #[arg(long, env = "ETA_MODEL")]
        model: Option<PathBuf>,

        /// Model metadata sidecar (JSON)
        #[arg(long, env = "ETA_METADATA")]
        metadata: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one order per line)
    Ndjson,
    /// JSON array of orders, or a single order object
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

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

fn run(cli: Cli) -> Result<(), EtaCliError> {
    match cli.command {
        Commands::Predict {
            model,
            metadata,
            input,
            output,
            input_format,
            output_format,
            sentinel,
        } => cmd_predict(
            &model,
            &metadata,
            &input,
            &output,
            input_format,
            output_format,
            sentinel,
        ),

        Commands::Validate {
            metadata,
            input,
            input_format,
            json,
        } => cmd_validate(&metadata, &input, input_format, json),

        Commands::Schema { metadata, json } => cmd_schema(metadata.as_deref(), json),

        Commands::Doctor {
            model,
            metadata,
            json,
        } => cmd_doctor(model.as_deref(), metadata.as_deref(), json),
    }
}

fn cmd_predict(
    model: &Path,
    metadata: &Path,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    sentinel: Option<f64>,
) -> Result<(), EtaCliError> {
    let config = match sentinel {
        Some(value) => EncoderConfig::sentinel(value)?,
        None => EncoderConfig::default(),
    };
    let processor = EtaProcessor::from_paths(model, metadata, config)?;

    let orders = read_orders(input, &input_format)?;
    if orders.is_empty() {
        return Err(EtaCliError::NoOrders);
    }

    let reports: Vec<EstimateReport> = orders.iter().map(|o| processor.report(o)).collect();
    let failed = reports.iter().filter(|r| r.failure.is_some()).count();
    tracing::info!(orders = reports.len(), failed, "predictions complete");

    let output_data = format_output(&reports, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(
    metadata: &Path,
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), EtaCliError> {
    let schema = ModelMetadata::load(metadata)?.schema()?;
    let encoder = FeatureEncoder::new(schema);
    let orders = read_orders(input, &input_format)?;

    let errors: Vec<ValidationErrorDetail> = orders
        .iter()
        .enumerate()
        .filter_map(|(index, order)| {
            encoder
                .encode(order)
                .err()
                .map(|e| ValidationErrorDetail {
                    index,
                    code: e.kind().to_string(),
                    error: e.to_string(),
                })
        })
        .collect();

    let report = ValidationReport {
        total_orders: orders.len(),
        valid_orders: orders.len() - errors.len(),
        invalid_orders: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total orders:   {}", report.total_orders);
        println!("Valid orders:   {}", report.valid_orders);
        println!("Invalid orders: {}", report.invalid_orders);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Order {} [{}]: {}", err.index, err.code, err.error);
            }
        }
    }

    if report.invalid_orders > 0 {
        Err(EtaCliError::ValidationFailed(report.invalid_orders))
    } else {
        Ok(())
    }
}

fn cmd_schema(metadata: Option<&Path>, json: bool) -> Result<(), EtaCliError> {
    let schema = match metadata {
        Some(path) => ModelMetadata::load(path)?.schema()?,
        None => FeatureSchema::standard()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    println!("Feature Schema: {}", schema.version());
    println!();
    for (index, column) in schema.columns().iter().enumerate() {
        let kind = match &column.kind {
            ColumnKind::Numeric { field } => format!("numeric ({})", field.as_str()),
            ColumnKind::Categorical { field } => format!("code ({field})"),
            ColumnKind::Indicator { field, label } => format!("one-hot ({field} = {label})"),
            ColumnKind::Derived { feature } => format!("derived ({})", feature.as_str()),
        };
        println!("  {:>2}. {:<32} {}", index, column.name, kind);
    }

    println!();
    println!("Codebook:");
    for field in CategoricalField::ALL {
        let entries: Vec<String> = schema
            .codebook()
            .labels(field)
            .into_iter()
            .map(|label| {
                let code = schema.codebook().table(field)[label];
                format!("{label}={code}")
            })
            .collect();
        println!("  {:<11} {}", field.as_str(), entries.join(", "));
    }

    Ok(())
}

fn cmd_doctor(model: Option<&Path>, metadata: Option<&Path>, json: bool) -> Result<(), EtaCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "eta_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("delivery-eta version {}", ETA_VERSION),
    });

    let schema = match metadata {
        Some(path) => match ModelMetadata::load(path).and_then(|m| m.schema()) {
            Ok(schema) => {
                checks.push(DoctorCheck {
                    name: "metadata".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Schema {} declares {} features",
                        schema.version(),
                        schema.len()
                    ),
                });
                Some(schema)
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "metadata".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                });
                None
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "metadata".to_string(),
                status: CheckStatus::Warning,
                message: "No metadata given; encoders cannot be validated".to_string(),
            });
            None
        }
    };

    let model = match model {
        Some(path) => match LinearRegressor::load(path) {
            Ok(model) => {
                checks.push(DoctorCheck {
                    name: "model".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Model {} expects {} features",
                        model.name(),
                        model.n_features()
                    ),
                });
                Some(model)
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "model".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                });
                None
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "model".to_string(),
                status: CheckStatus::Warning,
                message: "No model given".to_string(),
            });
            None
        }
    };

    if let (Some(model), Some(schema)) = (&model, &schema) {
        checks.push(match validate_against(model, schema) {
            Ok(()) => DoctorCheck {
                name: "consistency".to_string(),
                status: CheckStatus::Ok,
                message: "Model feature order matches metadata".to_string(),
            },
            Err(e) => DoctorCheck {
                name: "consistency".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        });
    }

    // Check stdin is available (for piping orders into predict)
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
            message: "stdin is a pipe (batch input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ETA_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("eta Doctor Report");
        println!("=================");
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
        Err(EtaCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_orders(input: &Path, format: &InputFormat) -> Result<Vec<RawOrderInput>, EtaCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let orders = match format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => parse_inputs(&input_data)?,
    };
    Ok(orders)
}

fn format_output(reports: &[EstimateReport], format: &OutputFormat) -> Result<String, EtaCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for report in reports {
                lines.push(serde_json::to_string(report)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(reports)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(reports)?),
    }
}

// Error types

#[derive(Debug)]
enum EtaCliError {
    Io(io::Error),
    Eta(EtaError),
    Json(serde_json::Error),
    NoOrders,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for EtaCliError {
    fn from(e: io::Error) -> Self {
        EtaCliError::Io(e)
    }
}

impl From<EtaError> for EtaCliError {
    fn from(e: EtaError) -> Self {
        EtaCliError::Eta(e)
    }
}

impl From<serde_json::Error> for EtaCliError {
    fn from(e: serde_json::Error) -> Self {
        EtaCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EtaCliError> for CliError {
    fn from(e: EtaCliError) -> Self {
        match e {
            EtaCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EtaCliError::Eta(e) => {
                let hint = match &e {
                    EtaError::UnknownCategory { field, .. } => {
                        Some(format!("Run 'eta schema' to list valid {field} labels"))
                    }
                    EtaError::SchemaMismatch(_) | EtaError::ModelUnavailable(_) => {
                        Some("Run 'eta doctor' to check the model and metadata".to_string())
                    }
                    EtaError::MissingFeature(_) => {
                        Some("Supply the field or pass --sentinel".to_string())
                    }
                    _ => None,
                };
                CliError {
                    code: e.kind().to_string(),
                    message: e.to_string(),
                    hint,
                }
            }
            EtaCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EtaCliError::NoOrders => CliError {
                code: "NO_ORDERS".to_string(),
                message: "No orders found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            EtaCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} orders failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            EtaCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_orders: usize,
    valid_orders: usize,
    invalid_orders: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    code: String,
    error: String,
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
