//! Ethochain CLI - Command-line interface for the behavior-transition engine
//!
//! Commands:
//! - run: Process every job in a JSON configuration file
//! - aggregate: Aggregate a single cohort directory
//! - validate: Load a cohort's logs and report per-file problems

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

use ethochain::encoder::TableEncoder;
use ethochain::transition::adapter::{discover_logs, load_sequence};
use ethochain::transition::counts::retained_events;
use ethochain::{aggregate_cohort, run_jobs, EthoError, GroupingPolicy, RunConfig, ETHOCHAIN_VERSION};

/// Ethochain - Markov-chain tables from ethogram observation logs
#[derive(Parser)]
#[command(name = "ethochain")]
#[command(version = ETHOCHAIN_VERSION)]
#[command(about = "Aggregate behavior transitions from ethogram logs", long_about = None)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every job in a configuration file
    Run {
        /// Path to the JSON job configuration
        config: PathBuf,
    },

    /// Aggregate one cohort directory
    Aggregate {
        /// Directory of .csv/.tsv observation logs
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory; tables land in <DIR>/<GROUP_BY>/ (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Grouping policy
        #[arg(long, value_enum, default_value = "basic")]
        group_by: PolicyArg,

        /// Output format on stdout; with a directory, which written paths to print
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Load every log in a cohort and report problems
    Validate {
        /// Directory of .csv/.tsv observation logs
        #[arg(short, long)]
        input: PathBuf,

        /// Grouping policy the logs will be used with
        #[arg(long, value_enum, default_value = "basic")]
        group_by: PolicyArg,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// No extra partition
    Basic,
    /// Partition by hour
    Time,
    /// Carry behavioral category
    Category,
}

impl From<PolicyArg> for GroupingPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Basic => GroupingPolicy::Basic,
            PolicyArg::Time => GroupingPolicy::Time,
            PolicyArg::Category => GroupingPolicy::Category,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// CSV tables (requires an output directory)
    Csv,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

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

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), EthoCliError> {
    match cli.command {
        Commands::Run { config } => cmd_run(&config),
        Commands::Aggregate {
            input,
            output,
            group_by,
            format,
        } => cmd_aggregate(&input, &output, group_by.into(), format),
        Commands::Validate {
            input,
            group_by,
            json,
        } => cmd_validate(&input, group_by.into(), json),
    }
}

fn cmd_run(config_path: &Path) -> Result<(), EthoCliError> {
    let config = RunConfig::load(config_path)?;
    if config.jobs.is_empty() {
        return Err(EthoCliError::NoJobs);
    }

    let encoder = TableEncoder::new();
    let outcomes = run_jobs(&config, &encoder);

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(paths) => println!(
                "[OK]  {}: {}, {}",
                outcome.name,
                paths.behaviors.display(),
                paths.transitions.display()
            ),
            Err(e) => {
                failed += 1;
                println!("[ERR] {}: {}", outcome.name, e);
            }
        }
    }

    if failed > 0 {
        Err(EthoCliError::JobsFailed(failed))
    } else {
        Ok(())
    }
}

fn cmd_aggregate(
    input: &Path,
    output: &Path,
    policy: GroupingPolicy,
    format: OutputFormat,
) -> Result<(), EthoCliError> {
    let tables = aggregate_cohort(input, policy)?;
    let encoder = TableEncoder::new();
    let to_stdout = output.to_string_lossy() == "-";

    if !to_stdout {
        let paths = encoder.write_tables_to_dir(output, &tables)?;
        match format {
            OutputFormat::Csv => {
                println!("{}", paths.behaviors.display());
                println!("{}", paths.transitions.display());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                println!("{}", paths.manifest.display());
            }
        }
        return Ok(());
    }

    let pretty = match format {
        OutputFormat::Csv => return Err(EthoCliError::CsvNeedsDirectory),
        OutputFormat::Json => false,
        OutputFormat::JsonPretty => true,
    };
    let json = encoder.encode_to_json(&tables, pretty)?;
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_validate(input: &Path, policy: GroupingPolicy, json: bool) -> Result<(), EthoCliError> {
    let logs = discover_logs(input)?;

    let files: Vec<FileReport> = logs
        .iter()
        .map(|path| match load_sequence(path, policy) {
            Ok(sequence) => FileReport {
                file: path.display().to_string(),
                events: sequence.events.len(),
                retained: retained_events(&sequence).count(),
                error: None,
            },
            Err(e) => FileReport {
                file: path.display().to_string(),
                events: 0,
                retained: 0,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let report = ValidationReport {
        cohort: input.display().to_string(),
        policy,
        total_files: files.len(),
        invalid_files: files.iter().filter(|f| f.error.is_some()).count(),
        files,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Cohort:        {}", report.cohort);
        println!("Policy:        {}", report.policy);
        println!("Total files:   {}", report.total_files);
        println!("Invalid files: {}", report.invalid_files);

        for file in &report.files {
            match &file.error {
                None => println!(
                    "  [OK]  {} ({} events, {} retained)",
                    file.file, file.events, file.retained
                ),
                Some(err) => println!("  [ERR] {}: {}", file.file, err),
            }
        }
    }

    if report.invalid_files > 0 {
        Err(EthoCliError::ValidationFailed(report.invalid_files))
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum EthoCliError {
    Io(io::Error),
    Engine(EthoError),
    Json(serde_json::Error),
    NoJobs,
    JobsFailed(usize),
    ValidationFailed(usize),
    CsvNeedsDirectory,
}

impl From<io::Error> for EthoCliError {
    fn from(e: io::Error) -> Self {
        EthoCliError::Io(e)
    }
}

impl From<EthoError> for EthoCliError {
    fn from(e: EthoError) -> Self {
        EthoCliError::Engine(e)
    }
}

impl From<serde_json::Error> for EthoCliError {
    fn from(e: serde_json::Error) -> Self {
        EthoCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EthoCliError> for CliError {
    fn from(e: EthoCliError) -> Self {
        match e {
            EthoCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EthoCliError::Engine(e) => {
                let (code, hint) = match &e {
                    EthoError::MissingColumn { .. } | EthoError::MissingCategory { .. } => (
                        "MISSING_COLUMN",
                        "Logs need 'Behavior' and 'Time' columns, plus 'Behavioral category' for category grouping",
                    ),
                    EthoError::TimeParse { .. } => {
                        ("TIME_PARSE_ERROR", "Time values must be numeric seconds")
                    }
                    EthoError::InvalidConfig(_) | EthoError::UnknownGroupingPolicy(_) => {
                        ("CONFIG_ERROR", "Check the job configuration file")
                    }
                    _ => ("ENGINE_ERROR", "Run 'ethochain validate' for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            EthoCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EthoCliError::NoJobs => CliError {
                code: "NO_JOBS".to_string(),
                message: "Configuration contains no jobs".to_string(),
                hint: Some("Add at least one entry under JOBS".to_string()),
            },
            EthoCliError::JobsFailed(count) => CliError {
                code: "JOBS_FAILED".to_string(),
                message: format!("{} job(s) failed", count),
                hint: Some("Review the job report above".to_string()),
            },
            EthoCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} file(s) failed validation", count),
                hint: Some("Fix the listed files and retry".to_string()),
            },
            EthoCliError::CsvNeedsDirectory => CliError {
                code: "CSV_NEEDS_DIRECTORY".to_string(),
                message: "CSV output writes two files and cannot go to stdout".to_string(),
                hint: Some("Pass --output <DIR> or use --format json".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    cohort: String,
    policy: GroupingPolicy,
    total_files: usize,
    invalid_files: usize,
    files: Vec<FileReport>,
}

#[derive(serde::Serialize)]
struct FileReport {
    file: String,
    events: usize,
    retained: usize,
    error: Option<String>,
}
