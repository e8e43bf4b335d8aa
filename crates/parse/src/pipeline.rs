//! Two-phase batch processing.
//!
//! Phase 1 turns one log file into a [`LogOutcome`] and touches nothing shared,
//! so callers may run it on any number of threads. Phase 2,
//! [`assemble_batch`], needs every outcome at once: the schema is voted over
//! the whole batch before the first row is rendered.

use crate::classify::{classify, Classification};
use crate::extract::{extract_metrics, Extraction};
use crate::identity::{LabelMap, LogIdentity};
use crate::roi::{extract_roi, RoiRecord};
use crate::row::Row;
use crate::select::select_schema;
use crate::sink::{ErrorCode, ErrorRecord, ErrorSink};
use crate::SummarizeConfig;
use champsum_schema::SchemaKind;
use std::fmt;
use std::path::{Path, PathBuf};

/// A log that passed classification and ROI extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedLog {
    pub path: PathBuf,
    pub identity: LogIdentity,
    pub classification: Classification,
    pub roi: RoiRecord,
    pub extraction: Extraction,
}

pub type LogOutcome = Result<ParsedLog, ErrorRecord>;

pub fn parse_log_text(path: &Path, text: &str, labels: &LabelMap) -> LogOutcome {
    let identity = LogIdentity::resolve(path, Some(text), labels);
    let classification = classify(text);
    tracing::debug!(
        file = %identity.file,
        format = classification.log_format().as_str(),
        wp_mode = classification.wp_mode().as_str(),
        "classified log"
    );
    if !classification.is_known() {
        return Err(ErrorRecord::new(
            identity,
            ErrorCode::UnknownFormat,
            "no wrong-path or baseline statistics signature",
        ));
    }
    let Some(roi) = extract_roi(text) else {
        return Err(ErrorRecord::new(
            identity,
            ErrorCode::MissingRoi,
            "no CPU 0 cumulative IPC line outside warmup",
        ));
    };
    let extraction = extract_metrics(text, classification, &roi);
    Ok(ParsedLog {
        path: path.to_path_buf(),
        identity,
        classification,
        roi,
        extraction,
    })
}

/// Read one log (invalid UTF-8 replaced) and run phase 1 on it.
pub fn parse_log_file(path: &Path, labels: &LabelMap) -> LogOutcome {
    match std::fs::read(path) {
        Ok(bytes) => parse_log_text(path, &String::from_utf8_lossy(&bytes), labels),
        Err(err) => Err(ErrorRecord::new(
            LogIdentity::from_path(path, labels),
            ErrorCode::UnreadableFile,
            err.to_string(),
        )),
    }
}

/// Rendered rows and rejected logs of one batch, both in input order.
#[derive(Clone, Debug)]
pub struct Batch {
    pub schema: SchemaKind,
    pub rows: Vec<Row>,
    pub errors: ErrorSink,
}

impl Batch {
    pub fn accepted(&self) -> usize {
        self.rows.len()
    }

    pub fn rejected(&self) -> usize {
        self.errors.len()
    }

    pub fn warned(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| !row.warnings().is_empty())
            .count()
    }
}

/// Phase 2: vote the schema over all accepted logs, then render rows.
pub fn assemble_batch<I>(outcomes: I) -> Batch
where
    I: IntoIterator<Item = LogOutcome>,
{
    let mut parsed = Vec::new();
    let mut errors = ErrorSink::default();
    for outcome in outcomes {
        match outcome {
            Ok(log) => parsed.push(log),
            Err(record) => errors.push(record),
        }
    }

    let schema = select_schema(parsed.iter().map(|log| &log.classification));
    let rows = parsed
        .iter()
        .map(|log| {
            Row::build(
                schema.schema(),
                &log.identity,
                log.classification,
                &log.extraction,
            )
        })
        .collect::<Vec<_>>();

    tracing::info!(
        schema = schema.as_str(),
        accepted = rows.len(),
        rejected = errors.len(),
        "batch assembled"
    );
    Batch {
        schema,
        rows,
        errors,
    }
}

#[derive(Debug)]
pub enum PipelineError {
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    NotADirectory(PathBuf),
    Pattern(glob::PatternError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputDir { path, source } => {
                write!(f, "cannot read log directory {}: {source}", path.display())
            }
            Self::NotADirectory(path) => write!(f, "{} is not a directory", path.display()),
            Self::Pattern(err) => write!(f, "invalid glob pattern: {err}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InputDir { source, .. } => Some(source),
            Self::NotADirectory(_) => None,
            Self::Pattern(err) => Some(err),
        }
    }
}

impl From<glob::PatternError> for PipelineError {
    fn from(value: glob::PatternError) -> Self {
        Self::Pattern(value)
    }
}

/// Regular files under `dir` matching `pattern`, in sorted path order.
pub fn discover_logs(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let meta = std::fs::metadata(dir).map_err(|source| PipelineError::InputDir {
        path: dir.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(PipelineError::NotADirectory(dir.to_path_buf()));
    }
    std::fs::read_dir(dir).map_err(|source| PipelineError::InputDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", root.trim_end_matches('/'), pattern);
    let mut paths = Vec::new();
    for entry in glob::glob(&full)? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(err) => tracing::warn!(path = %err.path().display(), "skipping unreadable entry: {err}"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Phase 1 then phase 2 on the calling thread.
pub fn summarize_dir(dir: &Path, config: &SummarizeConfig) -> Result<Batch, PipelineError> {
    let paths = discover_logs(dir, &config.glob)?;
    let outcomes = paths
        .iter()
        .map(|path| parse_log_file(path, &config.label_map))
        .collect::<Vec<_>>();
    Ok(assemble_batch(outcomes))
}
