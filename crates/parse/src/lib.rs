use serde::{Deserialize, Serialize};

mod classify;
mod extract;
mod identity;
mod matcher;
mod normalize;
mod pipeline;
mod roi;
mod row;
mod select;
mod sink;
mod value;
mod writer;

pub use classify::{classify, Classification, LogFormat, WpMode};
pub use extract::{
    applicable_counts, applies, extract_metrics, Extraction, MetricMap,
    IPC_CROSSCHECK_TOLERANCE, IPC_CROSSCHECK_WARNING, IPC_FROM_COUNTS_WARNING,
};
pub use identity::{
    bench_from_name, file_name, LabelMap, LabelRule, LogIdentity, DEFAULT_LABEL_MAP, UNKNOWN,
};
pub use matcher::{
    global_rules, level_rules, Binding, CompiledRule, FormatGate, Level, LevelKind, LineRule,
    CACHE_RULES, GLOBAL_RULES, LEVELS, TLB_RULES,
};
pub use normalize::{geomean, normalize_ipc, NormalizedIpc, NormalizedRow, GEOMEAN_BENCH};
pub use pipeline::{
    assemble_batch, discover_logs, parse_log_file, parse_log_text, summarize_dir, Batch,
    LogOutcome, ParsedLog, PipelineError,
};
pub use roi::{extract_roi, RoiRecord};
pub use row::{Row, WARNING_SEPARATOR};
pub use select::select_schema;
pub use sink::{ErrorCode, ErrorRecord, ErrorSink};
pub use value::{format_general, parse_token, render_real, FieldValue, ValueKind};
pub use writer::{
    write_batch_artifacts, write_normalized_ipc, ArtifactPaths, WriteError, FULL_METRICS_FILE,
    NORMALIZED_IPC_FILE, PARSE_ERRORS_FILE, SUMMARY_FILE,
};

pub const DEFAULT_GLOB: &str = "*.txt";

/// Inputs that change what a summarize run produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeConfig {
    pub glob: String,
    pub label_map: LabelMap,
    pub baseline: Option<String>,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            glob: DEFAULT_GLOB.to_string(),
            label_map: LabelMap::default(),
            baseline: None,
        }
    }
}

pub fn jcs_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_jcs::to_vec(value)
}

pub fn blake3_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// blake3 of the canonical JSON of the config, with the schema version mixed in.
pub fn config_hash(config: &SummarizeConfig) -> Result<String, serde_json::Error> {
    #[derive(Serialize)]
    struct Hashed<'a> {
        schema_version: &'static str,
        config: &'a SummarizeConfig,
    }
    let bytes = jcs_bytes(&Hashed {
        schema_version: champsum_schema::SCHEMA_VERSION,
        config,
    })?;
    Ok(blake3_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_hash_is_stable_and_sensitive() {
        let config = SummarizeConfig::default();
        let a = config_hash(&config).expect("hash");
        let b = config_hash(&config.clone()).expect("hash");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let other = SummarizeConfig {
            baseline: Some("latest".to_string()),
            ..SummarizeConfig::default()
        };
        assert_ne!(a, config_hash(&other).expect("hash"));
    }

    #[test]
    fn jcs_sorts_keys() {
        let bytes = jcs_bytes(&SummarizeConfig::default()).expect("jcs");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.starts_with("{\"baseline\":null,\"glob\":\"*.txt\",\"label_map\":["));
    }
}
