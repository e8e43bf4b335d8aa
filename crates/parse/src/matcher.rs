//! Declarative table of statistics-line rules.
//!
//! Each rule binds one anchor pattern to the fields captured from it, in
//! capture-group order. Per-level rules are matched at line start after the
//! level prefix of the log's format (`cpu0->cpu0_L1D` for the baseline binary,
//! `cpu0_L1D` for the wrong-path binary); global rules match anywhere.

use crate::classify::LogFormat;
use crate::value::{parse_token, FieldValue, ValueKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LevelKind {
    Cache,
    Tlb,
}

/// A cache or TLB level: its column prefix and the label the simulator prints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Level {
    pub column: &'static str,
    pub label: &'static str,
    pub kind: LevelKind,
}

impl Level {
    pub fn prefix(&self, format: LogFormat) -> Option<String> {
        match format {
            LogFormat::Normal => Some(format!("cpu0->{}", self.label)),
            LogFormat::WpCapable => Some(self.label.to_string()),
            LogFormat::Unknown => None,
        }
    }

    pub fn column_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.column, suffix)
    }
}

pub const LEVELS: &[Level] = &[
    Level {
        column: "l1d",
        label: "cpu0_L1D",
        kind: LevelKind::Cache,
    },
    Level {
        column: "l1i",
        label: "cpu0_L1I",
        kind: LevelKind::Cache,
    },
    Level {
        column: "l2c",
        label: "cpu0_L2C",
        kind: LevelKind::Cache,
    },
    Level {
        column: "llc",
        label: "LLC",
        kind: LevelKind::Cache,
    },
    Level {
        column: "dtlb",
        label: "cpu0_DTLB",
        kind: LevelKind::Tlb,
    },
    Level {
        column: "itlb",
        label: "cpu0_ITLB",
        kind: LevelKind::Tlb,
    },
    Level {
        column: "stlb",
        label: "cpu0_STLB",
        kind: LevelKind::Tlb,
    },
];

/// Which producer binaries print the anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatGate {
    Any,
    WpCapable,
}

impl FormatGate {
    pub fn admits(self, format: LogFormat) -> bool {
        match self {
            Self::Any => matches!(format, LogFormat::Normal | LogFormat::WpCapable),
            Self::WpCapable => format == LogFormat::WpCapable,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Binding {
    /// Column name for global rules, column suffix for per-level rules.
    pub field: &'static str,
    pub kind: ValueKind,
}

const fn count(field: &'static str) -> Binding {
    Binding {
        field,
        kind: ValueKind::Count,
    }
}

const fn real(field: &'static str) -> Binding {
    Binding {
        field,
        kind: ValueKind::Real,
    }
}

#[derive(Debug)]
pub struct LineRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub bindings: &'static [Binding],
    pub gate: FormatGate,
}

pub const GLOBAL_RULES: &[LineRule] = &[
    LineRule {
        name: "wrong_path_insts",
        pattern: r"wrong_path_insts:[ \t]*(\S+)[ \t]+wrong_path_insts_skipped:[ \t]*(\S+)[ \t]+wrong_path_insts_executed:[ \t]*(\S+)",
        bindings: &[
            count("wp_insts_total"),
            count("wp_insts_skipped"),
            count("wp_insts_executed"),
        ],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "footprint",
        pattern: r"instr_foot_print:[ \t]*(\S+)[ \t]+data_foot_print:[ \t]*(\S+)",
        bindings: &[count("instr_footprint"), count("data_footprint")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "is_prefetch",
        pattern: r"is_prefetch_insts:[ \t]*(\S+)[ \t]+is_prefetch_skipped:[ \t]*(\S+)",
        bindings: &[count("is_prefetch_insts"), count("is_prefetch_skipped")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "branch_accuracy",
        pattern: r"Branch Prediction Accuracy:[ \t]*([^%\s]+)%[ \t]*MPKI:[ \t]*(\S+)",
        bindings: &[real("branch_acc_percent"), real("branch_mpki")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "branch_direct_jump",
        pattern: r"BRANCH_DIRECT_JUMP:[ \t]*(\S+)",
        bindings: &[real("br_direct_jump_mpki")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "branch_indirect",
        pattern: r"BRANCH_INDIRECT:[ \t]*(\S+)",
        bindings: &[real("br_indirect_mpki")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "branch_conditional",
        pattern: r"BRANCH_CONDITIONAL:[ \t]*(\S+)",
        bindings: &[real("br_conditional_mpki")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "branch_direct_call",
        pattern: r"BRANCH_DIRECT_CALL:[ \t]*(\S+)",
        bindings: &[real("br_direct_call_mpki")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "branch_indirect_call",
        pattern: r"BRANCH_INDIRECT_CALL:[ \t]*(\S+)",
        bindings: &[real("br_indirect_call_mpki")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "branch_return",
        pattern: r"BRANCH_RETURN:[ \t]*(\S+)",
        bindings: &[real("br_return_mpki")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "exec_only_wp_cycles",
        pattern: r"Execute Only WP Cycles[ \t]+(\S+)",
        bindings: &[count("exec_only_wp_cycles")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "exec_only_cp_cycles",
        pattern: r"Execute Only CP Cycles[ \t]+(\S+)",
        bindings: &[count("exec_only_cp_cycles")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "exec_cp_wp_cycles",
        pattern: r"Execute CP WP Cycles[ \t]+(\S+)",
        bindings: &[count("exec_cp_wp_cycles")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "rob_full_cycles",
        pattern: r"ROB Full Cycles[ \t]+(\S+)",
        bindings: &[count("rob_full_cycles")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "rob_empty_cycles",
        pattern: r"ROB Empty Cycles[ \t]+(\S+)",
        bindings: &[count("rob_empty_cycles")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "rob_full_events",
        pattern: r"ROB Full Events[ \t]+(\S+)",
        bindings: &[count("rob_full_events")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "rob_empty_events",
        pattern: r"ROB Empty Events[ \t]+(\S+)",
        bindings: &[count("rob_empty_events")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "resteer_events",
        pattern: r"Resteer Events[ \t]+(\S+)",
        bindings: &[count("resteer_events")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "resteer_penalty",
        pattern: r"Resteer Penalty[ \t]+([^%\s]+)%",
        bindings: &[real("resteer_penalty_pct")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "wp_not_available",
        pattern: r"WP Not Available Count[ \t]+\S+[ \t]+Cycles[ \t]+\S+[ \t]+\(([^%\s]+)%\)",
        bindings: &[real("wp_not_avail_cycles_pct")],
        gate: FormatGate::WpCapable,
    },
    // ROW_BUFFER_MISS is printed on the following, indented line.
    LineRule {
        name: "dram_row_buffer",
        pattern: r"Channel 0 RQ ROW_BUFFER_HIT:[ \t]*(\S+)\s+ROW_BUFFER_MISS:[ \t]*(\S+)",
        bindings: &[count("dram_rq_row_hit"), count("dram_rq_row_miss")],
        gate: FormatGate::Any,
    },
];

// Latency rules come in preference order: the first anchor found for a field
// wins, so the data-split latency shadows the aggregate one on wrong-path logs.
pub const CACHE_RULES: &[LineRule] = &[
    LineRule {
        name: "load",
        pattern: r"LOAD[ \t]+ACCESS:[ \t]*(\S+)[ \t]+HIT:[ \t]*(\S+)[ \t]+MISS:[ \t]*(\S+)",
        bindings: &[count("load_access"), count("load_hit"), count("load_miss")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "prefetch",
        pattern: r"PREFETCH[ \t]+ACCESS:[ \t]*(\S+)[ \t]+HIT:[ \t]*(\S+)[ \t]+MISS:[ \t]*(\S+)",
        bindings: &[count("pf_access"), count("pf_hit"), count("pf_miss")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "prefetch_requested",
        pattern: r"PREFETCH[ \t]+REQUESTED:[ \t]*(\S+)[ \t]+ISSUED:[ \t]*(\S+)[ \t]+USEFUL:[ \t]*(\S+)[ \t]+USELESS:[ \t]*(\S+)",
        bindings: &[
            count("pf_requested"),
            count("pf_issued"),
            count("pf_useful"),
            count("pf_useless"),
        ],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "wrong_path",
        pattern: r"WRONG-PATH[ \t]+ACCESS:[ \t]*(\S+)[ \t]+LOAD:[ \t]*\S+[ \t]+USEFULL:[ \t]*(\S+)[ \t]+FILL:[ \t]*(\S+)[ \t]+USELESS:[ \t]*(\S+)",
        bindings: &[
            count("wp_access"),
            count("wp_useful"),
            count("wp_fill"),
            count("wp_useless"),
        ],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "pollution",
        pattern: r"POLLUTION:[ \t]*(\S+)[ \t]+WP_FILL:[ \t]*(\S+)[ \t]+WP_MISS:[ \t]*(\S+)[ \t]+CP_FILL:[ \t]*(\S+)[ \t]+CP_MISS:[ \t]*(\S+)",
        bindings: &[
            real("pollution"),
            count("pol_wp_fill"),
            count("pol_wp_miss"),
            count("pol_cp_fill"),
            count("pol_cp_miss"),
        ],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "data_req",
        pattern: r"DATA[ \t]+REQ:[ \t]*(\S+)[ \t]+HIT:[ \t]*(\S+)[ \t]+MISS:[ \t]*(\S+)[ \t]+WP_REQ:[ \t]*(\S+)[ \t]+WP_HIT:[ \t]*(\S+)[ \t]+WP_MISS:[ \t]*(\S+)",
        bindings: &[
            count("data_req"),
            count("data_hit"),
            count("data_miss"),
            count("data_wp_req"),
            count("data_wp_hit"),
            count("data_wp_miss"),
        ],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "data_miss_latency",
        pattern: r"AVERAGE DATA MISS LATENCY:[ \t]*(\S+)[ \t]+cycles",
        bindings: &[real("miss_lat")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "miss_latency",
        pattern: r"AVERAGE MISS LATENCY:[ \t]*(\S+)[ \t]+cycles",
        bindings: &[real("miss_lat")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "wp_data_miss_latency",
        pattern: r"AVERAGE WP DATA MISS LATENCY:[ \t]*(\S+)[ \t]+cycles",
        bindings: &[real("wp_miss_lat")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "cp_data_miss_latency",
        pattern: r"AVERAGE CP DATA MISS LATENCY:[ \t]*(\S+)[ \t]+cycles",
        bindings: &[real("cp_miss_lat")],
        gate: FormatGate::WpCapable,
    },
];

pub const TLB_RULES: &[LineRule] = &[
    LineRule {
        name: "load",
        pattern: r"LOAD[ \t]+ACCESS:[ \t]*(\S+)[ \t]+HIT:[ \t]*(\S+)[ \t]+MISS:[ \t]*(\S+)",
        bindings: &[count("access"), count("hit"), count("miss")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "wrong_path",
        pattern: r"WRONG-PATH[ \t]+ACCESS:[ \t]*(\S+)[ \t]+LOAD:[ \t]*\S+[ \t]+USEFULL:[ \t]*(\S+)[ \t]+FILL:[ \t]*\S+[ \t]+USELESS:[ \t]*(\S+)",
        bindings: &[count("wp_access"), count("wp_useful"), count("wp_useless")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "data_miss_latency",
        pattern: r"AVERAGE DATA MISS LATENCY:[ \t]*(\S+)[ \t]+cycles",
        bindings: &[real("miss_lat")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "miss_latency",
        pattern: r"AVERAGE MISS LATENCY:[ \t]*(\S+)[ \t]+cycles",
        bindings: &[real("miss_lat")],
        gate: FormatGate::Any,
    },
    LineRule {
        name: "wp_data_miss_latency",
        pattern: r"AVERAGE WP DATA MISS LATENCY:[ \t]*(\S+)[ \t]+cycles",
        bindings: &[real("wp_miss_lat")],
        gate: FormatGate::WpCapable,
    },
    LineRule {
        name: "cp_data_miss_latency",
        pattern: r"AVERAGE CP DATA MISS LATENCY:[ \t]*(\S+)[ \t]+cycles",
        bindings: &[real("cp_miss_lat")],
        gate: FormatGate::WpCapable,
    },
];

/// A rule with its pattern compiled for one prefix.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: &'static LineRule,
    regex: Regex,
}

impl CompiledRule {
    fn global(rule: &'static LineRule) -> Self {
        let regex = Regex::new(rule.pattern).expect("valid global rule regex");
        Self { rule, regex }
    }

    fn anchored(rule: &'static LineRule, prefix: &str) -> Self {
        let pattern = format!(r"(?m)^{}[ \t]+{}", regex::escape(prefix), rule.pattern);
        let regex = Regex::new(&pattern).expect("valid level rule regex");
        Self { rule, regex }
    }

    /// Values of the first matching line, one per binding; `None` when the
    /// anchor does not occur.
    pub fn capture(&self, text: &str) -> Option<Vec<FieldValue>> {
        let caps = self.regex.captures(text)?;
        Some(
            self.rule
                .bindings
                .iter()
                .enumerate()
                .map(|(idx, binding)| {
                    caps.get(idx + 1)
                        .map(|m| parse_token(m.as_str(), binding.kind))
                        .unwrap_or(FieldValue::Unparseable)
                })
                .collect(),
        )
    }
}

static GLOBAL_COMPILED: Lazy<Vec<CompiledRule>> =
    Lazy::new(|| GLOBAL_RULES.iter().map(CompiledRule::global).collect());

static LEVEL_COMPILED: Lazy<HashMap<(&'static str, LogFormat), Vec<CompiledRule>>> =
    Lazy::new(|| {
        let mut out = HashMap::new();
        for level in LEVELS {
            for format in [LogFormat::Normal, LogFormat::WpCapable] {
                let Some(prefix) = level.prefix(format) else {
                    continue;
                };
                let rules = rules_for(level.kind)
                    .iter()
                    .filter(|rule| rule.gate.admits(format))
                    .map(|rule| CompiledRule::anchored(rule, &prefix))
                    .collect();
                out.insert((level.column, format), rules);
            }
        }
        out
    });

pub fn rules_for(kind: LevelKind) -> &'static [LineRule] {
    match kind {
        LevelKind::Cache => CACHE_RULES,
        LevelKind::Tlb => TLB_RULES,
    }
}

/// Global rules the given format prints, in table order.
pub fn global_rules(format: LogFormat) -> impl Iterator<Item = &'static CompiledRule> {
    GLOBAL_COMPILED
        .iter()
        .filter(move |compiled| compiled.rule.gate.admits(format))
}

/// Per-level rules for the given format, prefix already applied.
pub fn level_rules(level: &Level, format: LogFormat) -> &'static [CompiledRule] {
    LEVEL_COMPILED
        .get(&(level.column, format))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use champsum_schema::find_column;

    #[test]
    fn every_binding_targets_a_catalog_column() {
        for rule in GLOBAL_RULES {
            for binding in rule.bindings {
                assert!(find_column(binding.field).is_some(), "{}", binding.field);
            }
        }
        for level in LEVELS {
            for rule in rules_for(level.kind) {
                for binding in rule.bindings {
                    let column = level.column_name(binding.field);
                    assert!(find_column(&column).is_some(), "{column}");
                }
            }
        }
    }

    #[test]
    fn level_rules_use_format_prefix() {
        let llc = LEVELS[3];
        let normal = "cpu0->LLC LOAD      ACCESS:     100  HIT:      60  MISS:      40\n";
        let wp = "LLC LOAD      ACCESS:     100  HIT:      70  MISS:      30\n";

        let rule = &level_rules(&llc, LogFormat::Normal)[0];
        assert_eq!(
            rule.capture(normal),
            Some(vec![
                FieldValue::Count(100),
                FieldValue::Count(60),
                FieldValue::Count(40)
            ])
        );
        assert_eq!(rule.capture(wp), None);

        let rule = &level_rules(&llc, LogFormat::WpCapable)[0];
        assert_eq!(
            rule.capture(wp).map(|values| values[2]),
            Some(FieldValue::Count(30))
        );
        assert_eq!(rule.capture(normal), None);
    }

    #[test]
    fn wrong_path_rules_are_not_compiled_for_normal_logs() {
        let l2c = LEVELS[2];
        assert!(level_rules(&l2c, LogFormat::Normal)
            .iter()
            .all(|compiled| compiled.rule.gate == FormatGate::Any));
        assert!(level_rules(&l2c, LogFormat::Unknown).is_empty());
        assert_eq!(global_rules(LogFormat::Unknown).count(), 0);
    }

    #[test]
    fn branch_indirect_does_not_match_indirect_call() {
        let text = "BRANCH_INDIRECT_CALL: 0.5\nBRANCH_INDIRECT: 0.25\n";
        let rule = global_rules(LogFormat::Normal)
            .find(|compiled| compiled.rule.name == "branch_indirect")
            .expect("rule");
        assert_eq!(rule.capture(text), Some(vec![FieldValue::Real(0.25)]));
    }

    #[test]
    fn dram_rule_spans_the_continuation_line() {
        let text = " Channel 0 RQ ROW_BUFFER_HIT:      1234\n  ROW_BUFFER_MISS:      567\n";
        let rule = global_rules(LogFormat::Normal)
            .find(|compiled| compiled.rule.name == "dram_row_buffer")
            .expect("rule");
        assert_eq!(
            rule.capture(text),
            Some(vec![FieldValue::Count(1234), FieldValue::Count(567)])
        );
    }

    #[test]
    fn latency_nan_marker_is_captured_as_unparseable() {
        let l1d = LEVELS[0];
        let text = "cpu0_L1D AVERAGE WP DATA MISS LATENCY: -nan cycles\n";
        let rule = level_rules(&l1d, LogFormat::WpCapable)
            .iter()
            .find(|compiled| compiled.rule.name == "wp_data_miss_latency")
            .expect("rule");
        assert_eq!(rule.capture(text), Some(vec![FieldValue::Unparseable]));
    }
}
