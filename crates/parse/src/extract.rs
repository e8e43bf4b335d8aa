use crate::classify::{Classification, LogFormat, WpMode};
use crate::matcher::{global_rules, level_rules, CompiledRule, LevelKind, LEVELS};
use crate::roi::RoiRecord;
use crate::value::FieldValue;
use champsum_schema::{
    catalog, Availability, Column, ColumnGroup, SchemaKind, FULL_COLUMN_COUNT,
};
use std::collections::HashMap;

/// Relative deviation of `inst / cycles` from the printed IPC that is still
/// accepted.
pub const IPC_CROSSCHECK_TOLERANCE: f64 = 0.01;

pub const IPC_CROSSCHECK_WARNING: &str = "ipc_crosscheck_mismatch";

/// The printed IPC was not a finite number and `inst / cycles` stands in.
pub const IPC_FROM_COUNTS_WARNING: &str = "ipc_from_counts";

/// Every catalog metric of one log, indexed in full-schema order.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricMap {
    values: Vec<FieldValue>,
}

impl Default for MetricMap {
    fn default() -> Self {
        Self {
            values: vec![FieldValue::Absent; FULL_COLUMN_COUNT],
        }
    }
}

impl MetricMap {
    pub fn get(&self, name: &str) -> FieldValue {
        index_of(name)
            .map(|idx| self.values[idx])
            .unwrap_or(FieldValue::Absent)
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        if let Some(idx) = index_of(name) {
            self.values[idx] = value;
        }
    }

    /// First anchor occurrence wins: a value is only stored over `Absent`.
    fn fill(&mut self, name: &str, value: FieldValue) {
        if let Some(idx) = index_of(name) {
            if self.values[idx].is_absent() {
                self.values[idx] = value;
            }
        }
    }

    fn clear(&mut self, idx: usize) {
        self.values[idx] = FieldValue::Absent;
    }

    /// Present values paired with their column, in catalog order.
    pub fn present(&self) -> impl Iterator<Item = (&'static Column, FieldValue)> + '_ {
        catalog()
            .iter()
            .zip(self.values.iter().copied())
            .filter(|(_, value)| value.is_present())
    }
}

// The full schema is the catalog in order, so its positions index `values`.
fn index_of(name: &str) -> Option<usize> {
    SchemaKind::Full.schema().position(name)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    pub metrics: MetricMap,
    pub warnings: Vec<String>,
}

/// Pull every metric the log's format prints, then apply the availability
/// policy of each column uniformly.
pub fn extract_metrics(text: &str, classification: Classification, roi: &RoiRecord) -> Extraction {
    let format = classification.log_format();
    let mut metrics = MetricMap::default();

    metrics.set("inst", FieldValue::Count(roi.inst));
    metrics.set("cycles", FieldValue::Count(roi.cycles));
    let ipc_from_counts = roi.ipc.is_none() && roi.computed_ipc().is_some();
    metrics.set(
        "ipc",
        roi.display_ipc()
            .map(FieldValue::Real)
            .unwrap_or(FieldValue::Unparseable),
    );
    if let Some(wp_cycles) = roi.wp_cycles {
        metrics.set("wp_cycles", FieldValue::Count(wp_cycles));
    }

    for compiled in global_rules(format) {
        apply_rule(&mut metrics, compiled, text, |field| field.to_string());
    }
    for level in LEVELS {
        for compiled in level_rules(level, format) {
            apply_rule(&mut metrics, compiled, text, |field| level.column_name(field));
        }
    }

    for level in LEVELS {
        let (miss, derived) = match level.kind {
            LevelKind::Cache => (level.column_name("load_miss"), level.column_name("load_mpki")),
            LevelKind::Tlb => (level.column_name("miss"), level.column_name("mpki")),
        };
        if let Some(value) = per_kilo_instruction(metrics.get(&miss), roi.inst) {
            metrics.set(&derived, FieldValue::Real(value));
        }
    }

    let mut warnings = Vec::new();
    for (idx, column) in catalog().iter().enumerate() {
        if column.is_text() {
            continue;
        }
        if !applies(column.availability, classification) {
            metrics.clear(idx);
            continue;
        }
        if !metrics.values[idx].is_present() && !is_derived(column) {
            metrics.clear(idx);
            warnings.push(format!("missing_{}", column.name));
        }
    }

    if ipc_from_counts {
        warnings.push(IPC_FROM_COUNTS_WARNING.to_string());
    }
    if ipc_mismatch(roi) {
        warnings.push(IPC_CROSSCHECK_WARNING.to_string());
    }

    Extraction { metrics, warnings }
}

fn apply_rule(
    metrics: &mut MetricMap,
    compiled: &CompiledRule,
    text: &str,
    column_for: impl Fn(&str) -> String,
) {
    if let Some(values) = compiled.capture(text) {
        for (binding, value) in compiled.rule.bindings.iter().zip(values) {
            metrics.fill(&column_for(binding.field), value);
        }
    }
}

/// Whether a column of this class carries a value for the classified log.
pub fn applies(availability: Availability, classification: Classification) -> bool {
    match availability {
        Availability::Both => true,
        Availability::WpZeroPreserved => classification.log_format() == LogFormat::WpCapable,
        Availability::WpSuppressedWhenOff => {
            classification.log_format() == LogFormat::WpCapable
                && classification.wp_mode() == WpMode::On
        }
    }
}

fn is_derived(column: &Column) -> bool {
    match column.group {
        ColumnGroup::Cache => column.name.ends_with("_load_mpki"),
        ColumnGroup::Tlb => column.name.ends_with("_mpki"),
        _ => false,
    }
}

fn per_kilo_instruction(miss: FieldValue, inst: u64) -> Option<f64> {
    let miss = miss.as_f64()?;
    (inst > 0).then(|| miss * 1000.0 / inst as f64)
}

fn ipc_mismatch(roi: &RoiRecord) -> bool {
    let (Some(printed), Some(computed)) = (roi.ipc, roi.computed_ipc()) else {
        return false;
    };
    if printed == 0.0 {
        return computed != 0.0;
    }
    ((computed - printed) / printed).abs() > IPC_CROSSCHECK_TOLERANCE
}

/// Number of catalog columns per availability class that apply to the log.
pub fn applicable_counts(classification: Classification) -> HashMap<Availability, usize> {
    let mut counts = HashMap::new();
    for column in catalog().iter().filter(|c| !c.is_text()) {
        if applies(column.availability, classification) {
            *counts.entry(column.availability).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::roi::extract_roi;
    use approx::assert_abs_diff_eq;

    const WP_LOG: &str = "\
Wrong path enabled
CPU 0 cumulative IPC: 0.5 instructions: 2000 cycles: 4000 wp_cycles: 300
wrong_path_insts: 90 wrong_path_insts_skipped: 10 wrong_path_insts_executed: 80
LLC LOAD      ACCESS:        100  HIT:         60  MISS:         40
LLC WRONG-PATH ACCESS:        10  LOAD:        4  USEFULL:        2  FILL:        3  USELESS:        1
LLC POLLUTION: 0.25  WP_FILL: 3  WP_MISS: 4  CP_FILL: 5  CP_MISS: 0
LLC AVERAGE MISS LATENCY: 99 cycles
LLC AVERAGE DATA MISS LATENCY: 120.5 cycles
LLC AVERAGE WP DATA MISS LATENCY: -nan cycles
LLC LOAD      ACCESS:        999  HIT:         0  MISS:         999
";

    fn extract(text: &str) -> Extraction {
        let classification = classify(text);
        let roi = extract_roi(text).expect("roi");
        extract_metrics(text, classification, &roi)
    }

    #[test]
    fn first_anchor_occurrence_is_read() {
        let out = extract(WP_LOG);
        assert_eq!(out.metrics.get("llc_load_access"), FieldValue::Count(100));
        assert_eq!(out.metrics.get("llc_load_miss"), FieldValue::Count(40));
        assert_abs_diff_eq!(out.metrics.get("llc_load_mpki").as_f64().expect("mpki"), 20.0);
    }

    #[test]
    fn data_latency_shadows_aggregate_on_wrong_path_logs() {
        let out = extract(WP_LOG);
        assert_eq!(out.metrics.get("llc_miss_lat"), FieldValue::Real(120.5));
        assert_eq!(out.metrics.get("llc_wp_miss_lat"), FieldValue::Absent);
        assert!(out.warnings.contains(&"missing_llc_wp_miss_lat".to_string()));
    }

    #[test]
    fn aggregate_latency_is_the_fallback() {
        let text = WP_LOG.replace("LLC AVERAGE DATA MISS LATENCY: 120.5 cycles\n", "");
        let out = extract(&text);
        assert_eq!(out.metrics.get("llc_miss_lat"), FieldValue::Real(99.0));
    }

    #[test]
    fn wrong_path_activity_is_suppressed_when_off() {
        let text = WP_LOG.replace("Wrong path enabled\n", "");
        let out = extract(&text);
        assert_eq!(out.metrics.get("llc_wp_access"), FieldValue::Absent);
        assert_eq!(out.metrics.get("llc_pollution"), FieldValue::Absent);
        assert_eq!(out.metrics.get("llc_pol_cp_miss"), FieldValue::Count(0));
        assert_eq!(out.metrics.get("wp_insts_total"), FieldValue::Count(90));
        assert!(!out.warnings.iter().any(|w| w == "missing_llc_wp_access"));

        let on = extract(WP_LOG);
        assert_eq!(on.metrics.get("llc_wp_access"), FieldValue::Count(10));
        assert_eq!(on.metrics.get("llc_wp_fill"), FieldValue::Count(3));
        assert_abs_diff_eq!(on.metrics.get("llc_pollution").as_f64().expect("pollution"), 0.25);
    }

    #[test]
    fn normal_logs_have_no_wrong_path_fields_or_warnings() {
        let text = "\
CPU 0 cumulative IPC: 1.0 instructions: 1000 cycles: 1000
cpu0->LLC LOAD      ACCESS:        100  HIT:         60  MISS:         40
cpu0->LLC WRONG-PATH ACCESS:        10  LOAD:        4  USEFULL:        2  FILL:        3  USELESS:        1
";
        let out = extract(text);
        assert_eq!(out.metrics.get("llc_load_hit"), FieldValue::Count(60));
        assert_eq!(out.metrics.get("llc_wp_access"), FieldValue::Absent);
        assert!(!out.warnings.iter().any(|w| w.contains("wp_")));
        assert!(!out.warnings.iter().any(|w| w.ends_with("_mpki") && w.contains("llc")));
        assert!(out.warnings.contains(&"missing_l1d_load_access".to_string()));
    }

    #[test]
    fn missing_wp_cycles_is_warned_on_wrong_path_logs() {
        let text = WP_LOG.replace(" wp_cycles: 300", "");
        let out = extract(&text);
        assert_eq!(out.warnings.first().map(String::as_str), Some("missing_wp_cycles"));
    }

    #[test]
    fn zero_instructions_leave_mpki_blank() {
        let text = "\
CPU 0 cumulative IPC: 0 instructions: 0 cycles: 10
cpu0->LLC LOAD      ACCESS:        1  HIT:         0  MISS:         1
";
        let out = extract(text);
        assert_eq!(out.metrics.get("llc_load_mpki"), FieldValue::Absent);
        assert!(!out.warnings.contains(&IPC_CROSSCHECK_WARNING.to_string()));
    }

    #[test]
    fn ipc_crosscheck_flags_large_deviation() {
        let text = "\
CPU 0 cumulative IPC: 0.9 instructions: 1000 cycles: 1000
cpu0->LLC LOAD      ACCESS:        1  HIT:         0  MISS:         1
";
        let out = extract(text);
        assert_eq!(out.warnings.last().map(String::as_str), Some(IPC_CROSSCHECK_WARNING));
        assert_eq!(out.metrics.get("ipc"), FieldValue::Real(0.9));

        let text = text.replace("IPC: 0.9", "IPC: 0.995");
        assert!(!extract(&text).warnings.contains(&IPC_CROSSCHECK_WARNING.to_string()));
    }

    #[test]
    fn non_finite_printed_ipc_falls_back_to_counts() {
        let text = "\
CPU 0 cumulative IPC: -nan instructions: 3000 cycles: 2000
cpu0->LLC LOAD      ACCESS:        100  HIT:         60  MISS:         30
";
        let out = extract(text);
        assert_eq!(out.metrics.get("ipc"), FieldValue::Real(1.5));
        assert!(out.warnings.contains(&IPC_FROM_COUNTS_WARNING.to_string()));
        assert!(!out.warnings.iter().any(|w| w == "missing_ipc"));
        assert!(!out.warnings.contains(&IPC_CROSSCHECK_WARNING.to_string()));

        let zero_cycles = text.replace("cycles: 2000", "cycles: 0");
        let out = extract(&zero_cycles);
        assert_eq!(out.metrics.get("ipc"), FieldValue::Absent);
        assert!(out.warnings.iter().any(|w| w == "missing_ipc"));
        assert!(!out.warnings.contains(&IPC_FROM_COUNTS_WARNING.to_string()));
    }

    #[test]
    fn applicable_counts_follow_classification() {
        let normal = Classification::new(LogFormat::Normal, false);
        assert_eq!(applicable_counts(normal).get(&Availability::Both), Some(&76));
        assert_eq!(applicable_counts(normal).get(&Availability::WpZeroPreserved), None);

        let off = Classification::new(LogFormat::WpCapable, false);
        assert_eq!(applicable_counts(off).get(&Availability::WpSuppressedWhenOff), None);
        let on = Classification::new(LogFormat::WpCapable, true);
        assert_eq!(applicable_counts(on).get(&Availability::WpSuppressedWhenOff), Some(&49));
    }
}
