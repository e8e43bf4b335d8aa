use crate::row::Row;
use serde::Serialize;
use std::collections::BTreeMap;

pub const GEOMEAN_BENCH: &str = "__geomean__";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub bench: String,
    pub config: String,
    pub ratio: Option<f64>,
}

/// IPC of every configuration relative to a baseline configuration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedIpc {
    pub baseline: String,
    pub rows: Vec<NormalizedRow>,
}

impl NormalizedIpc {
    pub fn column_name(&self) -> String {
        format!("ipc_norm_vs_{}", self.baseline)
    }

    pub fn geomeans(&self) -> impl Iterator<Item = &NormalizedRow> {
        self.rows.iter().filter(|row| row.bench == GEOMEAN_BENCH)
    }
}

/// Per bench with a positive baseline IPC, each configuration's IPC ratio;
/// then one geometric-mean row per non-baseline configuration. A later row
/// for the same bench and configuration replaces an earlier one.
pub fn normalize_ipc(rows: &[Row], baseline: &str) -> NormalizedIpc {
    let mut by_bench: BTreeMap<&str, BTreeMap<&str, Option<f64>>> = BTreeMap::new();
    for row in rows {
        by_bench
            .entry(row.bench())
            .or_default()
            .insert(row.config(), row.ipc());
    }

    let mut out = Vec::new();
    let mut ratios: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (bench, configs) in &by_bench {
        let Some(base) = configs.get(baseline).copied().flatten().filter(|v| *v > 0.0) else {
            continue;
        };
        for (config, ipc) in configs {
            let ratio = ipc.filter(|v| *v != 0.0).map(|v| v / base);
            if let Some(ratio) = ratio {
                if *config != baseline {
                    ratios.entry(*config).or_default().push(ratio);
                }
            }
            out.push(NormalizedRow {
                bench: bench.to_string(),
                config: config.to_string(),
                ratio,
            });
        }
    }
    for (config, values) in ratios {
        out.push(NormalizedRow {
            bench: GEOMEAN_BENCH.to_string(),
            config: config.to_string(),
            ratio: geomean(&values),
        });
    }

    NormalizedIpc {
        baseline: baseline.to_string(),
        rows: out,
    }
}

/// Geometric mean of the positive values; `None` when there are none.
pub fn geomean(values: &[f64]) -> Option<f64> {
    let positive: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if positive.is_empty() {
        return None;
    }
    let log_sum: f64 = positive.iter().map(|v| v.ln()).sum();
    Some((log_sum / positive.len() as f64).exp())
}
