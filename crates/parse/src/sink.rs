use crate::identity::LogIdentity;
use serde::Serialize;
use std::fmt;

/// Why a log produced no row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnreadableFile,
    UnknownFormat,
    MissingRoi,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnreadableFile => "unreadable_file",
            Self::UnknownFormat => "unknown_format",
            Self::MissingRoi => "missing_roi",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `parse_errors.csv`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub file: String,
    pub bench: String,
    pub config: String,
    pub error_code: ErrorCode,
    pub detail: String,
}

impl ErrorRecord {
    pub fn new(identity: LogIdentity, error_code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            file: identity.file,
            bench: identity.bench,
            config: identity.config,
            error_code,
            detail: detail.into(),
        }
    }

    pub fn cells(&self) -> [&str; 5] {
        [
            &self.file,
            &self.bench,
            &self.config,
            self.error_code.as_str(),
            &self.detail,
        ]
    }
}

/// Rejected logs of a batch, in input order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorSink {
    records: Vec<ErrorRecord>,
}

impl ErrorSink {
    pub fn push(&mut self, record: ErrorRecord) {
        tracing::warn!(
            file = %record.file,
            code = %record.error_code,
            detail = %record.detail,
            "log rejected"
        );
        self.records.push(record);
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, code: ErrorCode) -> usize {
        self.records
            .iter()
            .filter(|record| record.error_code == code)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(file: &str) -> LogIdentity {
        LogIdentity {
            file: file.to_string(),
            bench: "mcf".to_string(),
            config: "latest".to_string(),
        }
    }

    #[test]
    fn records_keep_input_order_and_codes() {
        let mut sink = ErrorSink::default();
        sink.push(ErrorRecord::new(identity("a.txt"), ErrorCode::UnknownFormat, "no signature"));
        sink.push(ErrorRecord::new(identity("b.txt"), ErrorCode::MissingRoi, "no roi line"));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[0].file, "a.txt");
        assert_eq!(sink.count(ErrorCode::MissingRoi), 1);
        assert_eq!(
            sink.records()[1].cells(),
            ["b.txt", "mcf", "latest", "missing_roi", "no roi line"]
        );
    }
}
