//! Inhaler CLI - Command-line interface for Inhaler Insights
//!
//! Commands:
//! - analyze: Run the full analysis on an input document
//! - summary: Print the prioritized dashboard summary
//! - classify: Classify a single inhalation
//! - status: Decode an inhale status bitmask
//! - config: Print the default analysis configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inhaler_insights::effort::{is_high_flow, InhalationEffort};
use inhaler_insights::pipeline::{AnalysisInput, AnalysisProcessor};
use inhaler_insights::status::{decode, format_error_codes, system_error_codes};
use inhaler_insights::{AnalysisConfig, AnalysisError, VERSION};

/// Inhaler - On-device analysis of connected inhaler telemetry
#[derive(Parser)]
#[command(name = "inhaler")]
#[command(version = VERSION)]
#[command(about = "Analyze connected inhaler events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and print the report
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Load analysis configuration from file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Print the prioritized dashboard summary
    Summary {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Load analysis configuration from file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only print the highest-priority message
        #[arg(long)]
        top: bool,
    },

    /// Classify a single inhalation
    Classify {
        /// Peak inspiratory flow in device units
        #[arg(long)]
        pif: u32,

        /// Raw status bitmask
        #[arg(long, default_value = "0")]
        status: u32,

        /// Treat the inhalation as invalid
        #[arg(long)]
        invalid: bool,
    },

    /// Decode an inhale status bitmask
    Status {
        /// Raw status bitmask
        bitmask: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default analysis configuration
    Config,
}

fn main() -> ExitCode {
    init_logging();
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

/// Log to stderr, filtered by RUST_LOG (warnings by default)
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<(), InhalerCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            config,
            pretty,
        } => cmd_analyze(&input, &output, config.as_deref(), pretty),

        Commands::Summary { input, config, top } => cmd_summary(&input, config.as_deref(), top),

        Commands::Classify { pif, status, invalid } => cmd_classify(pif, status, !invalid),

        Commands::Status { bitmask, json } => cmd_status(bitmask, json),

        Commands::Config => cmd_config(),
    }
}

fn read_input(input: &Path) -> Result<String, InhalerCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            warn!("reading analysis input from an interactive terminal");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_processor(config: Option<&Path>) -> Result<AnalysisProcessor, InhalerCliError> {
    let mut processor = AnalysisProcessor::new();
    if let Some(path) = config {
        debug!(path = %path.display(), "loading analysis configuration");
        let json = fs::read_to_string(path)?;
        processor.load_config(&json)?;
    }
    Ok(processor)
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    pretty: bool,
) -> Result<(), InhalerCliError> {
    let input_data = read_input(input)?;
    let processor = load_processor(config)?;

    let analysis_input: AnalysisInput = serde_json::from_str(&input_data)?;
    let report = processor.analyze(&analysis_input)?;

    let output_data = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_summary(input: &Path, config: Option<&Path>, top: bool) -> Result<(), InhalerCliError> {
    let input_data = read_input(input)?;
    let processor = load_processor(config)?;

    let analysis_input: AnalysisInput = serde_json::from_str(&input_data)?;
    let report = processor.analyze(&analysis_input)?;

    let limit = if top { 1 } else { report.summary.len() };
    for message in report.summary.iter().take(limit) {
        let parameters = message
            .parameters
            .iter()
            .flatten()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(" ");

        if parameters.is_empty() {
            println!("{}", message.id.as_str());
        } else {
            println!("{} {}", message.id.as_str(), parameters);
        }
    }

    println!(
        "reliever inhalations today: {} ({})",
        report.today.reliever_inhalations,
        report.today.reliever_usage.as_str()
    );

    Ok(())
}

fn cmd_classify(pif: u32, status: u32, is_valid_inhale: bool) -> Result<(), InhalerCliError> {
    let effort = InhalationEffort::classify(is_valid_inhale, &decode(status), pif);

    println!("effort:     {}", effort.as_str());
    println!("acceptable: {}", effort.is_acceptable());
    println!("high flow:  {}", is_high_flow(pif));

    Ok(())
}

fn cmd_status(bitmask: u32, json: bool) -> Result<(), InhalerCliError> {
    let flags = decode(bitmask);
    let codes = system_error_codes(&flags);

    if json {
        let report = StatusReport {
            bitmask,
            flags: flags.iter().map(|f| f.as_str().to_string()).collect(),
            system_error_codes: codes.iter().map(|c| c.code()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Status {:#04x}", bitmask);
        if flags.is_empty() {
            println!("  no flags set");
        }
        for flag in &flags {
            println!("  {}", flag.as_str());
        }
        if !codes.is_empty() {
            println!("System error codes: {}", format_error_codes(&codes));
        }
    }

    Ok(())
}

fn cmd_config() -> Result<(), InhalerCliError> {
    println!("{}", AnalysisConfig::default().to_json()?);
    Ok(())
}

// Error handling

#[derive(Debug)]
enum InhalerCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
}

impl From<io::Error> for InhalerCliError {
    fn from(e: io::Error) -> Self {
        InhalerCliError::Io(e)
    }
}

impl From<AnalysisError> for InhalerCliError {
    fn from(e: AnalysisError) -> Self {
        InhalerCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for InhalerCliError {
    fn from(e: serde_json::Error) -> Self {
        InhalerCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InhalerCliError> for CliError {
    fn from(e: InhalerCliError) -> Self {
        match e {
            InhalerCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InhalerCliError::Analysis(AnalysisError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'inhaler config' to see the default configuration".to_string()),
            },
            InhalerCliError::Analysis(e) => CliError {
                code: "ANALYSIS_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the history range and input records".to_string()),
            },
            InhalerCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct StatusReport {
    bitmask: u32,
    flags: Vec<String>,
    system_error_codes: Vec<u8>,
}
