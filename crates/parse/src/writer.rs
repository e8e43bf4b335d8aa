use crate::normalize::NormalizedIpc;
use crate::pipeline::Batch;
use champsum_schema::ERROR_COLUMNS;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const FULL_METRICS_FILE: &str = "full_metrics.csv";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const PARSE_ERRORS_FILE: &str = "parse_errors.csv";
pub const NORMALIZED_IPC_FILE: &str = "normalized_ipc.csv";

const RATIO_DECIMALS: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub full_metrics_csv: PathBuf,
    pub summary_csv: PathBuf,
    pub parse_errors_csv: PathBuf,
}

#[derive(Debug)]
pub enum WriteError {
    Io { path: PathBuf, source: std::io::Error },
    Csv { path: PathBuf, source: csv::Error },
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error on {}: {}", path.display(), source),
            Self::Csv { path, source } => write!(f, "csv error on {}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
        }
    }
}

impl WriteError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Csv { path, .. } => path,
        }
    }
}

struct CsvFile {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
}

impl CsvFile {
    fn create(path: PathBuf) -> Result<Self, WriteError> {
        let file = File::create(&path).map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;
        let writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(BufWriter::new(file));
        Ok(Self { path, writer })
    }

    fn record<I, T>(&mut self, cells: I) -> Result<(), WriteError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(cells)
            .map_err(|source| WriteError::Csv {
                path: self.path.clone(),
                source,
            })
    }

    fn finish(self) -> Result<PathBuf, WriteError> {
        let Self { path, mut writer } = self;
        writer.flush().map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;
        drop(writer);
        tracing::info!(path = %path.display(), "wrote file");
        Ok(path)
    }
}

/// Write `full_metrics.csv`, `summary.csv` and `parse_errors.csv` from one
/// walk over the batch. Every file gets its header even when it has no rows.
pub fn write_batch_artifacts<P: AsRef<Path>>(
    out_dir: P,
    batch: &Batch,
) -> Result<ArtifactPaths, WriteError> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir).map_err(|source| WriteError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let schema = batch.schema.schema();
    let mut full = CsvFile::create(out_dir.join(FULL_METRICS_FILE))?;
    let mut summary = CsvFile::create(out_dir.join(SUMMARY_FILE))?;
    full.record(schema.header())?;
    summary.record(schema.summary_header())?;
    for row in &batch.rows {
        full.record(row.cells())?;
        summary.record(row.summary_cells())?;
    }
    let full_metrics_csv = full.finish()?;
    let summary_csv = summary.finish()?;

    let mut errors = CsvFile::create(out_dir.join(PARSE_ERRORS_FILE))?;
    errors.record(ERROR_COLUMNS)?;
    for record in batch.errors.records() {
        errors.record(record.cells())?;
    }
    let parse_errors_csv = errors.finish()?;

    Ok(ArtifactPaths {
        full_metrics_csv,
        summary_csv,
        parse_errors_csv,
    })
}

pub fn write_normalized_ipc<P: AsRef<Path>>(
    out_dir: P,
    normalized: &NormalizedIpc,
) -> Result<PathBuf, WriteError> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir).map_err(|source| WriteError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let mut out = CsvFile::create(out_dir.join(NORMALIZED_IPC_FILE))?;
    out.record(["bench".to_string(), "config".to_string(), normalized.column_name()])?;
    for row in &normalized.rows {
        let ratio = row
            .ratio
            .map(|value| format!("{:.*}", RATIO_DECIMALS, value))
            .unwrap_or_default();
        out.record([row.bench.as_str(), row.config.as_str(), ratio.as_str()])?;
    }
    out.finish()
}
