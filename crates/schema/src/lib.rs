use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SCHEMA_VERSION: &str = "champsum_columns_v1";

pub const FULL_COLUMN_COUNT: usize = 183;
pub const REDUCED_COLUMN_COUNT: usize = 82;

/// Column prefixes of the four cache levels, in output order.
pub const CACHE_LEVELS: &[&str] = &["l1d", "l1i", "l2c", "llc"];

/// Column prefixes of the three TLB levels, in output order.
pub const TLB_LEVELS: &[&str] = &["dtlb", "itlb", "stlb"];

pub const IDENTIFICATION_COLUMNS: &[&str] = &[
    "bench",
    "config",
    "file",
    "log_format",
    "wp_mode",
    "parse_warnings",
];

pub const ROI_COLUMNS: &[(&str, Availability)] = &[
    ("cycles", Availability::Both),
    ("inst", Availability::Both),
    ("ipc", Availability::Both),
    ("wp_cycles", Availability::WpZeroPreserved),
    ("wp_insts_total", Availability::WpZeroPreserved),
    ("wp_insts_skipped", Availability::WpZeroPreserved),
    ("wp_insts_executed", Availability::WpZeroPreserved),
    ("instr_footprint", Availability::WpZeroPreserved),
    ("data_footprint", Availability::WpZeroPreserved),
    ("is_prefetch_insts", Availability::WpZeroPreserved),
    ("is_prefetch_skipped", Availability::WpZeroPreserved),
];

pub const BRANCH_COLUMNS: &[&str] = &[
    "branch_acc_percent",
    "branch_mpki",
    "br_direct_jump_mpki",
    "br_indirect_mpki",
    "br_conditional_mpki",
    "br_direct_call_mpki",
    "br_indirect_call_mpki",
    "br_return_mpki",
];

/// Execute/ROB counters only the wrong-path binary prints.
pub const PIPELINE_COLUMNS: &[&str] = &[
    "exec_only_wp_cycles",
    "exec_only_cp_cycles",
    "exec_cp_wp_cycles",
    "rob_full_cycles",
    "rob_empty_cycles",
    "rob_full_events",
    "rob_empty_events",
    "resteer_events",
    "resteer_penalty_pct",
    "wp_not_avail_cycles_pct",
];

pub const CACHE_FIELDS: &[(&str, Availability)] = &[
    ("load_access", Availability::Both),
    ("load_hit", Availability::Both),
    ("load_miss", Availability::Both),
    ("load_mpki", Availability::Both),
    ("pf_access", Availability::Both),
    ("pf_hit", Availability::Both),
    ("pf_miss", Availability::Both),
    ("pf_requested", Availability::Both),
    ("pf_issued", Availability::Both),
    ("pf_useful", Availability::Both),
    ("pf_useless", Availability::Both),
    ("wp_access", Availability::WpSuppressedWhenOff),
    ("wp_useful", Availability::WpSuppressedWhenOff),
    ("wp_fill", Availability::WpSuppressedWhenOff),
    ("wp_useless", Availability::WpSuppressedWhenOff),
    ("pollution", Availability::WpSuppressedWhenOff),
    ("pol_wp_fill", Availability::WpSuppressedWhenOff),
    ("pol_wp_miss", Availability::WpSuppressedWhenOff),
    ("pol_cp_fill", Availability::WpZeroPreserved),
    ("pol_cp_miss", Availability::WpZeroPreserved),
    ("data_req", Availability::WpZeroPreserved),
    ("data_hit", Availability::WpZeroPreserved),
    ("data_miss", Availability::WpZeroPreserved),
    ("data_wp_req", Availability::WpSuppressedWhenOff),
    ("data_wp_hit", Availability::WpSuppressedWhenOff),
    ("data_wp_miss", Availability::WpSuppressedWhenOff),
    ("miss_lat", Availability::Both),
    ("wp_miss_lat", Availability::WpZeroPreserved),
    ("cp_miss_lat", Availability::WpZeroPreserved),
];

// TLB wrong-path FILL and the pollution/data-request lines are not columns in
// this schema version; adding them means appending after the DRAM group.
pub const TLB_FIELDS: &[(&str, Availability)] = &[
    ("access", Availability::Both),
    ("hit", Availability::Both),
    ("miss", Availability::Both),
    ("mpki", Availability::Both),
    ("wp_access", Availability::WpSuppressedWhenOff),
    ("wp_useful", Availability::WpSuppressedWhenOff),
    ("wp_useless", Availability::WpSuppressedWhenOff),
    ("miss_lat", Availability::Both),
    ("wp_miss_lat", Availability::WpZeroPreserved),
    ("cp_miss_lat", Availability::WpZeroPreserved),
];

pub const DRAM_COLUMNS: &[&str] = &["dram_rq_row_hit", "dram_rq_row_miss"];

/// Summary header under the full schema. The reduced summary keeps the same
/// order and drops every column the reduced schema does not carry.
pub const SUMMARY_COLUMNS: &[&str] = &[
    "bench",
    "config",
    "log_format",
    "wp_mode",
    "parse_warnings",
    "cycles",
    "wp_cycles",
    "inst",
    "ipc",
    "branch_mpki",
    "llc_load_miss",
    "llc_load_mpki",
    "llc_miss_lat",
    "llc_pf_useful",
    "llc_pf_useless",
    "llc_wp_access",
    "llc_wp_useful",
    "llc_pol_cp_miss",
    "l2c_pf_useful",
    "l2c_pf_useless",
    "l2c_pollution",
];

pub const ERROR_COLUMNS: &[&str] = &["file", "bench", "config", "error_code", "detail"];

/// How a column behaves when the log does not carry wrong-path statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Printed by both binaries.
    Both,
    /// Wrong-path activity: blank unless the log is wrong-path capable and
    /// wrong-path execution was enabled for the run.
    WpSuppressedWhenOff,
    /// Correct-path counters of the wrong-path binary: always computed, so
    /// zeros are real values even when wrong-path execution was off.
    WpZeroPreserved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnGroup {
    Identification,
    Roi,
    Branch,
    Pipeline,
    Cache,
    Tlb,
    Dram,
}

/// Rendering precision of a real-valued cell, derived from the column name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberStyle {
    /// Four significant digits, `%g` style.
    Latency,
    /// Four decimals.
    Mpki,
    /// Two decimals.
    Percent,
    /// Six decimals.
    Ipc,
    /// Four decimals.
    Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub group: ColumnGroup,
    pub availability: Availability,
}

impl Column {
    fn new(name: impl Into<String>, group: ColumnGroup, availability: Availability) -> Self {
        Self {
            name: name.into(),
            group,
            availability,
        }
    }

    pub fn is_text(&self) -> bool {
        self.group == ColumnGroup::Identification
    }

    pub fn number_style(&self) -> NumberStyle {
        number_style_for(&self.name)
    }
}

pub fn number_style_for(name: &str) -> NumberStyle {
    if name.contains("_lat") {
        NumberStyle::Latency
    } else if name.contains("_mpki") {
        NumberStyle::Mpki
    } else if name.contains("_percent") || name.contains("_pct") {
        NumberStyle::Percent
    } else if name == "ipc" {
        NumberStyle::Ipc
    } else {
        NumberStyle::Decimal
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    Full,
    Reduced,
}

impl SchemaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
        }
    }

    pub fn schema(self) -> &'static Schema {
        match self {
            Self::Full => &FULL_SCHEMA,
            Self::Reduced => &REDUCED_SCHEMA,
        }
    }
}

/// An ordered, fixed column layout plus its summary projection.
#[derive(Debug)]
pub struct Schema {
    kind: SchemaKind,
    columns: Vec<Column>,
    positions: HashMap<String, usize>,
    summary: Vec<usize>,
}

impl Schema {
    fn from_columns(kind: SchemaKind, columns: Vec<Column>) -> Self {
        let positions = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| (column.name.clone(), idx))
            .collect::<HashMap<_, _>>();
        let summary = SUMMARY_COLUMNS
            .iter()
            .filter_map(|name| positions.get(*name).copied())
            .collect();
        Self {
            kind,
            columns,
            positions,
            summary,
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn header(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Indexes into [`Schema::columns`] of the summary projection, in summary order.
    pub fn summary_positions(&self) -> &[usize] {
        &self.summary
    }

    pub fn summary_header(&self) -> Vec<&str> {
        self.summary
            .iter()
            .map(|&idx| self.columns[idx].name.as_str())
            .collect()
    }
}

static CATALOG: Lazy<Vec<Column>> = Lazy::new(build_catalog);
static FULL_SCHEMA: Lazy<Schema> =
    Lazy::new(|| Schema::from_columns(SchemaKind::Full, catalog().to_vec()));
static REDUCED_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    let columns = catalog()
        .iter()
        .filter(|column| column.availability == Availability::Both)
        .cloned()
        .collect();
    Schema::from_columns(SchemaKind::Reduced, columns)
});

/// Every column the extractor knows about, in full-schema order.
pub fn catalog() -> &'static [Column] {
    &CATALOG
}

pub fn find_column(name: &str) -> Option<&'static Column> {
    FULL_SCHEMA.position(name).map(|idx| &catalog()[idx])
}

fn build_catalog() -> Vec<Column> {
    let mut columns = Vec::with_capacity(FULL_COLUMN_COUNT);
    for name in IDENTIFICATION_COLUMNS {
        columns.push(Column::new(
            *name,
            ColumnGroup::Identification,
            Availability::Both,
        ));
    }
    for (name, availability) in ROI_COLUMNS {
        columns.push(Column::new(*name, ColumnGroup::Roi, *availability));
    }
    for name in BRANCH_COLUMNS {
        columns.push(Column::new(*name, ColumnGroup::Branch, Availability::Both));
    }
    for name in PIPELINE_COLUMNS {
        columns.push(Column::new(
            *name,
            ColumnGroup::Pipeline,
            Availability::WpZeroPreserved,
        ));
    }
    for level in CACHE_LEVELS {
        for (field, availability) in CACHE_FIELDS {
            columns.push(Column::new(
                format!("{level}_{field}"),
                ColumnGroup::Cache,
                *availability,
            ));
        }
    }
    for level in TLB_LEVELS {
        for (field, availability) in TLB_FIELDS {
            columns.push(Column::new(
                format!("{level}_{field}"),
                ColumnGroup::Tlb,
                *availability,
            ));
        }
    }
    for name in DRAM_COLUMNS {
        columns.push(Column::new(*name, ColumnGroup::Dram, Availability::Both));
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn schema_sizes_are_fixed() {
        assert_eq!(SchemaKind::Full.schema().len(), FULL_COLUMN_COUNT);
        assert_eq!(SchemaKind::Reduced.schema().len(), REDUCED_COLUMN_COUNT);
    }

    #[test]
    fn column_names_are_unique() {
        let names: HashSet<&str> = catalog().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), catalog().len());
    }

    #[test]
    fn full_schema_order_is_stable() {
        let header = SchemaKind::Full.schema().header();
        assert_eq!(&header[..6], IDENTIFICATION_COLUMNS);
        assert_eq!(header[6], "cycles");
        assert_eq!(header[35], "l1d_load_access");
        assert_eq!(header[151], "dtlb_access");
        assert_eq!(header[181], "dram_rq_row_hit");
        assert_eq!(header[182], "dram_rq_row_miss");
    }

    #[test]
    fn reduced_schema_is_the_both_class_in_full_order() {
        let reduced = SchemaKind::Reduced.schema();
        let full = SchemaKind::Full.schema();
        let mut last = None;
        for column in reduced.columns() {
            assert_eq!(column.availability, Availability::Both, "{}", column.name);
            let pos = full.position(&column.name).expect("column in full schema");
            assert!(last.map_or(true, |prev| pos > prev));
            last = Some(pos);
        }
        assert!(reduced.contains("llc_miss_lat"));
        assert!(!reduced.contains("llc_wp_miss_lat"));
        assert!(!reduced.contains("wp_cycles"));
    }

    #[test]
    fn naming_conventions_hold() {
        for column in catalog() {
            let name = column.name.as_str();
            if name.contains("mpki") {
                assert!(name.ends_with("_mpki"), "{name}");
            }
            if name.contains("_lat") {
                assert!(name.ends_with("_miss_lat"), "{name}");
            }
            if name.contains("pol_") {
                assert!(name.contains("_pol_"), "{name}");
            }
        }
        assert_eq!(number_style_for("llc_wp_miss_lat"), NumberStyle::Latency);
        assert_eq!(number_style_for("branch_acc_percent"), NumberStyle::Percent);
        assert_eq!(number_style_for("resteer_penalty_pct"), NumberStyle::Percent);
        assert_eq!(number_style_for("ipc"), NumberStyle::Ipc);
        assert_eq!(number_style_for("llc_pollution"), NumberStyle::Decimal);
    }

    #[test]
    fn summary_projection_follows_schema() {
        let full = SchemaKind::Full.schema();
        assert_eq!(full.summary_header(), SUMMARY_COLUMNS);

        let reduced = SchemaKind::Reduced.schema();
        assert_eq!(
            reduced.summary_header(),
            vec![
                "bench",
                "config",
                "log_format",
                "wp_mode",
                "parse_warnings",
                "cycles",
                "inst",
                "ipc",
                "branch_mpki",
                "llc_load_miss",
                "llc_load_mpki",
                "llc_miss_lat",
                "llc_pf_useful",
                "llc_pf_useless",
                "l2c_pf_useful",
                "l2c_pf_useless",
            ]
        );
    }

    #[test]
    fn wrong_path_classes_match_catalog() {
        let llc_wp_access = find_column("llc_wp_access").expect("llc_wp_access");
        assert_eq!(
            llc_wp_access.availability,
            Availability::WpSuppressedWhenOff
        );
        let llc_pol_cp_miss = find_column("llc_pol_cp_miss").expect("llc_pol_cp_miss");
        assert_eq!(llc_pol_cp_miss.availability, Availability::WpZeroPreserved);
        let llc_data_req = find_column("llc_data_req").expect("llc_data_req");
        assert_eq!(llc_data_req.availability, Availability::WpZeroPreserved);
        assert!(find_column("dtlb_wp_fill").is_none());
    }
}
