mod summarize;

use champsum_parse::{
    applicable_counts, parse_log_file, ErrorCode, ErrorRecord, LabelMap, ParsedLog, PipelineError, WriteError,
    DEFAULT_GLOB, DEFAULT_LABEL_MAP,
};
use clap::{error::ErrorKind, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTDIR: &str = "summary_out";

#[derive(Parser, Debug)]
#[command(
    name = "champsum",
    version,
    about = "Summarize ChampSim logs into fixed-schema CSV tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short = 'j', global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse every matching log under a directory and write the CSV tables.
    Summarize {
        log_dir: PathBuf,
        #[arg(long, default_value = DEFAULT_GLOB)]
        glob: String,
        #[arg(long, default_value = DEFAULT_OUTDIR)]
        outdir: PathBuf,
        /// Comma-separated `substring:label` pairs; the first match wins.
        #[arg(long, default_value = DEFAULT_LABEL_MAP)]
        label_map: String,
        /// Also write normalized_ipc.csv relative to this configuration label.
        #[arg(long)]
        baseline: Option<String>,
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Show how one log is classified and what it yields.
    Classify {
        log_file: PathBuf,
        #[arg(long, default_value = DEFAULT_LABEL_MAP)]
        label_map: String,
    },
}

#[derive(Clone, Copy, Debug)]
enum AppErrorKind {
    Usage,
    Dependency,
    Internal,
}

#[derive(Clone, Debug)]
pub(crate) struct AppError {
    kind: AppErrorKind,
    code: &'static str,
    message: String,
    details: Box<Value>,
}

impl AppError {
    fn new(kind: AppErrorKind, code: &'static str, message: String) -> Self {
        Self {
            kind,
            code,
            message,
            details: Box::new(Value::Null),
        }
    }

    pub(crate) fn usage(message: String) -> Self {
        Self::new(AppErrorKind::Usage, "CLI_USAGE", message)
    }

    pub(crate) fn input_dir_unreadable(message: String) -> Self {
        Self::new(AppErrorKind::Dependency, "INPUT_DIR_UNREADABLE", message)
    }

    pub(crate) fn input_file_unreadable(message: String) -> Self {
        Self::new(AppErrorKind::Dependency, "INPUT_FILE_UNREADABLE", message)
    }

    pub(crate) fn output_write_failed(message: String) -> Self {
        Self::new(AppErrorKind::Dependency, "OUTPUT_WRITE_FAILED", message)
    }

    pub(crate) fn dependency(message: String) -> Self {
        Self::new(AppErrorKind::Dependency, "DEPENDENCY_ERROR", message)
    }

    pub(crate) fn internal(message: String) -> Self {
        Self::new(AppErrorKind::Internal, "INTERNAL_ERROR", message)
    }

    fn exit_code(&self) -> i32 {
        match self.kind {
            AppErrorKind::Usage => 1,
            AppErrorKind::Dependency | AppErrorKind::Internal => 2,
        }
    }

    pub(crate) fn with_details(mut self, details: Value) -> Self {
        self.details = Box::new(details);
        self
    }
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        match &value {
            PipelineError::Pattern(_) => AppError::usage(value.to_string()),
            PipelineError::InputDir { path, .. } | PipelineError::NotADirectory(path) => {
                AppError::input_dir_unreadable(value.to_string())
                    .with_details(json!({ "path": path.display().to_string() }))
            }
        }
    }
}

impl From<WriteError> for AppError {
    fn from(value: WriteError) -> Self {
        let path = value.path().display().to_string();
        AppError::output_write_failed(value.to_string()).with_details(json!({ "path": path }))
    }
}

#[derive(Serialize)]
pub(crate) struct JsonEnvelope {
    status: String,
    error: Option<ErrorEnvelope>,
    data: Option<Value>,
}

impl JsonEnvelope {
    pub(crate) fn ok(data: Value) -> Self {
        Self {
            status: "OK".to_string(),
            error: None,
            data: Some(data),
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: String,
    message: String,
    details: Value,
}

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let wants_json = args.iter().any(|arg| arg == "--json" || arg == "-j");

    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            let json = cli.json || wants_json;
            match run(cli, json) {
                Ok(envelope) => {
                    if json {
                        print_json(&envelope);
                    }
                    std::process::exit(0);
                }
                Err(err) => {
                    let exit_code = err.exit_code();
                    if json {
                        print_json(&error_envelope(&err));
                    } else {
                        eprintln!("{}", err.message);
                    }
                    std::process::exit(exit_code);
                }
            }
        }
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                std::process::exit(0);
            }
            _ => {
                if wants_json {
                    let usage = AppError::usage(err.to_string());
                    print_json(&error_envelope(&usage));
                } else {
                    let _ = err.print();
                }
                std::process::exit(1);
            }
        },
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli, json: bool) -> Result<JsonEnvelope, AppError> {
    match cli.command {
        Commands::Summarize {
            log_dir,
            glob,
            outdir,
            label_map,
            baseline,
            threads,
            no_progress,
        } => summarize::run(summarize::SummarizeCommand {
            log_dir,
            glob,
            outdir,
            label_map,
            baseline,
            threads,
            show_progress: !no_progress && !json,
            json_output: json,
        }),
        Commands::Classify {
            log_file,
            label_map,
        } => classify(log_file, &label_map, json),
    }
}

#[derive(Serialize)]
struct ClassifyReport<'a> {
    file: &'a str,
    bench: &'a str,
    config: &'a str,
    log_format: &'a str,
    wp_mode: &'a str,
    inst: u64,
    cycles: u64,
    ipc: Option<f64>,
    wp_cycles: Option<u64>,
    fields_present: usize,
    fields_applicable: usize,
    warnings: &'a [String],
}

fn classify(log_file: PathBuf, label_map: &str, json: bool) -> Result<JsonEnvelope, AppError> {
    let labels = LabelMap::parse(label_map);
    match parse_log_file(&log_file, &labels) {
        Ok(log) => {
            let report = classify_report(&log);
            if !json {
                print_classify_report(&report);
            }
            Ok(JsonEnvelope::ok(json!(report)))
        }
        Err(record) => rejected_log(&log_file, record, json),
    }
}

fn classify_report(log: &ParsedLog) -> ClassifyReport<'_> {
    ClassifyReport {
        file: &log.identity.file,
        bench: &log.identity.bench,
        config: &log.identity.config,
        log_format: log.classification.log_format().as_str(),
        wp_mode: log.classification.wp_mode().as_str(),
        inst: log.roi.inst,
        cycles: log.roi.cycles,
        ipc: log.roi.ipc,
        wp_cycles: log.roi.wp_cycles,
        fields_present: log.extraction.metrics.present().count(),
        fields_applicable: applicable_counts(log.classification).values().sum(),
        warnings: &log.extraction.warnings,
    }
}

fn rejected_log(
    log_file: &Path,
    record: ErrorRecord,
    json: bool,
) -> Result<JsonEnvelope, AppError> {
    if record.error_code == ErrorCode::UnreadableFile {
        return Err(AppError::input_file_unreadable(format!(
            "cannot read {}: {}",
            log_file.display(),
            record.detail
        )));
    }
    if !json {
        println!(
            "{}: rejected ({}) {}",
            record.file, record.error_code, record.detail
        );
    }
    Ok(JsonEnvelope::ok(json!({ "rejected": record })))
}

fn print_classify_report(report: &ClassifyReport<'_>) {
    println!("file:       {}", report.file);
    println!("bench:      {}", report.bench);
    println!("config:     {}", report.config);
    println!("log_format: {}", report.log_format);
    println!("wp_mode:    {}", report.wp_mode);
    match report.ipc {
        Some(ipc) => println!(
            "roi:        inst={} cycles={} ipc={:.6}",
            report.inst, report.cycles, ipc
        ),
        None => println!("roi:        inst={} cycles={} ipc=-", report.inst, report.cycles),
    }
    if let Some(wp_cycles) = report.wp_cycles {
        println!("wp_cycles:  {wp_cycles}");
    }
    println!(
        "fields:     {} of {} applicable",
        report.fields_present, report.fields_applicable
    );
    if report.warnings.is_empty() {
        println!("warnings:   none");
    } else {
        println!("warnings:   {}", report.warnings.join(", "));
    }
}

fn error_envelope(err: &AppError) -> JsonEnvelope {
    JsonEnvelope {
        status: "ERROR".to_string(),
        error: Some(ErrorEnvelope {
            code: err.code.to_string(),
            message: err.message.clone(),
            details: (*err.details).clone(),
        }),
        data: None,
    }
}

fn print_json(envelope: &JsonEnvelope) {
    match serde_json::to_string(envelope) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize json: {err}"),
    }
}
