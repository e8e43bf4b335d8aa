//! Benchmark and configuration labels of a log.
//!
//! Both come from the file name first. When the name carries nothing usable
//! the log body is consulted, and the literal `unknown` is the last resort.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const UNKNOWN: &str = "unknown";

pub const DEFAULT_LABEL_MAP: &str = "resche2:schedcost_on,resche_:schedcost_off,ChampSim:latest";

static BINARY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_ChampSim.*$").expect("valid binary suffix regex"));
static RUN_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+_").expect("valid run index regex"));
static TRACE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^CPU\s+0\s+runs\s+(\S+)").expect("valid trace line regex"));

/// One `substring:label` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    pub key: String,
    pub label: String,
}

/// Ordered substring-to-label rules; the first rule whose key occurs wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap {
    rules: Vec<LabelRule>,
}

impl LabelMap {
    /// Parse `key:label,key2:label2`; a bare `key` labels itself and empty
    /// entries are skipped.
    pub fn parse(text: &str) -> Self {
        let rules = text
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let (key, label) = entry.split_once(':').unwrap_or((entry, entry));
                (!key.is_empty()).then(|| LabelRule {
                    key: key.to_string(),
                    label: label.to_string(),
                })
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[LabelRule] {
        &self.rules
    }

    pub fn lookup<'a>(&'a self, haystacks: &[&str]) -> Option<&'a str> {
        self.rules
            .iter()
            .find(|rule| haystacks.iter().any(|hay| hay.contains(rule.key.as_str())))
            .map(|rule| rule.label.as_str())
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::parse(DEFAULT_LABEL_MAP)
    }
}

impl fmt::Display for LabelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .rules
            .iter()
            .map(|rule| format!("{}:{}", rule.key, rule.label))
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogIdentity {
    pub file: String,
    pub bench: String,
    pub config: String,
}

impl LogIdentity {
    /// Labels from the path alone, used when the body could not be read.
    pub fn from_path(path: &Path, labels: &LabelMap) -> Self {
        Self::resolve(path, None, labels)
    }

    pub fn resolve(path: &Path, body: Option<&str>, labels: &LabelMap) -> Self {
        let file = file_name(path);
        let bench = Some(bench_from_name(&file))
            .filter(|bench| !bench.is_empty())
            .or_else(|| body.and_then(bench_from_body))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let full_path = path.to_string_lossy();
        let config = labels
            .lookup(&[&*full_path, file.as_str()])
            .or_else(|| body.and_then(|text| config_from_body(text, labels)))
            .unwrap_or(UNKNOWN)
            .to_string();
        Self {
            file,
            bench,
            config,
        }
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Benchmark name from a log file name: extension, `_ChampSim…` suffix,
/// leading run index and a `.gz` tail removed.
pub fn bench_from_name(file: &str) -> String {
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    let stem = BINARY_SUFFIX.replace(stem, "");
    let stem = RUN_INDEX.replace(&stem, "");
    stem.strip_suffix(".gz").unwrap_or(&*stem).to_string()
}

fn bench_from_body(text: &str) -> Option<String> {
    let trace = TRACE_LINE.captures(text)?.get(1)?.as_str();
    let base = trace.rsplit(['/', '\\']).next().unwrap_or(trace);
    let name = base.split('.').next().unwrap_or(base);
    (!name.is_empty()).then(|| name.to_string())
}

fn config_from_body<'a>(text: &str, labels: &'a LabelMap) -> Option<&'a str> {
    let header = text
        .lines()
        .take_while(|line| {
            let line = line.trim_start();
            !(line.starts_with("Warmup") || line.starts_with("Heartbeat") || line.starts_with("==="))
        })
        .filter(|line| !line.trim_start().starts_with("***"))
        .collect::<Vec<_>>();
    labels.lookup(&header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn bench_strips_suffix_index_and_gz() {
        assert_eq!(bench_from_name("03_mcf_250B_ChampSim_wp.txt"), "mcf_250B");
        assert_eq!(bench_from_name("gcc.gz.txt"), "gcc");
        assert_eq!(bench_from_name("12_lbm.txt"), "lbm");
        assert_eq!(bench_from_name("plain"), "plain");
    }

    #[test]
    fn label_map_parsing() {
        let map = LabelMap::parse(" a:x , ,b ,:skip,c:");
        assert_eq!(
            map.rules(),
            &[
                LabelRule {
                    key: "a".into(),
                    label: "x".into()
                },
                LabelRule {
                    key: "b".into(),
                    label: "b".into()
                },
                LabelRule {
                    key: "c".into(),
                    label: "".into()
                },
            ]
        );
        assert_eq!(LabelMap::default().to_string(), DEFAULT_LABEL_MAP);
    }

    #[test]
    fn first_matching_key_wins() {
        let map = LabelMap::default();
        let id = LogIdentity::from_path(&PathBuf::from("logs/01_mcf_ChampSim_resche2.txt"), &map);
        assert_eq!(id.config, "schedcost_on");
        assert_eq!(id.bench, "mcf");
        assert_eq!(id.file, "01_mcf_ChampSim_resche2.txt");
    }

    #[test]
    fn directory_names_count_for_config() {
        let map = LabelMap::parse("resche_:off");
        let id = LogIdentity::from_path(&PathBuf::from("runs/resche_x/lbm.txt"), &map);
        assert_eq!(id.config, "off");
    }

    #[test]
    fn body_fallback_for_bench_and_config() {
        let map = LabelMap::parse("wp_sched:wp");
        let body = "\
*** ChampSim Multicore Out-of-Order Simulator built with wp_sched ***
binary: /opt/bin/wp_sched_champsim
CPU 0 runs /traces/602.gcc_s-734B.champsimtrace.xz
Warmup complete CPU 0 instructions: 10
config wp_sched ignored after warmup
";
        let id = LogIdentity::resolve(&PathBuf::from("_ChampSim.txt"), Some(body), &map);
        assert_eq!(id.bench, "602");
        assert_eq!(id.config, "wp");
    }

    #[test]
    fn banner_and_post_warmup_lines_do_not_label() {
        let map = LabelMap::parse("wp_sched:wp");
        let body = "\
*** built with wp_sched ***
Warmup complete
wp_sched
";
        let id = LogIdentity::resolve(&PathBuf::from("x.txt"), Some(body), &map);
        assert_eq!(id.config, UNKNOWN);
        assert_eq!(id.bench, "x");
    }

    #[test]
    fn unresolvable_identity_is_unknown() {
        let id = LogIdentity::resolve(&PathBuf::from("_ChampSim.txt"), Some(""), &LabelMap::parse("zz"));
        assert_eq!(id.bench, UNKNOWN);
        assert_eq!(id.config, UNKNOWN);
    }
}
