use crate::classify::Classification;
use crate::extract::Extraction;
use crate::identity::LogIdentity;
use champsum_schema::{Schema, SchemaKind};

pub const WARNING_SEPARATOR: &str = "|";

/// One accepted log rendered against the batch schema. Both CSVs and the
/// normalizer read the same cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    schema: SchemaKind,
    cells: Vec<String>,
    ipc: Option<f64>,
}

impl Row {
    pub fn build(
        schema: &Schema,
        identity: &LogIdentity,
        classification: Classification,
        extraction: &Extraction,
    ) -> Self {
        let cells = schema
            .columns()
            .iter()
            .map(|column| match column.name.as_str() {
                "bench" => identity.bench.clone(),
                "config" => identity.config.clone(),
                "file" => identity.file.clone(),
                "log_format" => classification.log_format().as_str().to_string(),
                "wp_mode" => classification.wp_mode().as_str().to_string(),
                "parse_warnings" => extraction.warnings.join(WARNING_SEPARATOR),
                name => extraction
                    .metrics
                    .get(name)
                    .render(column.number_style()),
            })
            .collect();
        Self {
            schema: schema.kind(),
            cells,
            ipc: extraction.metrics.get("ipc").as_f64(),
        }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.schema
            .schema()
            .position(name)
            .map(|idx| self.cells[idx].as_str())
    }

    /// The summary projection, in summary-header order.
    pub fn summary_cells(&self) -> impl Iterator<Item = &str> + '_ {
        self.schema
            .schema()
            .summary_positions()
            .iter()
            .map(move |&idx| self.cells[idx].as_str())
    }

    pub fn bench(&self) -> &str {
        self.get("bench").unwrap_or_default()
    }

    pub fn config(&self) -> &str {
        self.get("config").unwrap_or_default()
    }

    /// Printed IPC as parsed, unrounded.
    pub fn ipc(&self) -> Option<f64> {
        self.ipc
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.get("parse_warnings")
            .filter(|cell| !cell.is_empty())
            .map(|cell| cell.split(WARNING_SEPARATOR).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LogFormat;
    use crate::extract::MetricMap;
    use crate::value::FieldValue;

    fn extraction() -> Extraction {
        let mut metrics = MetricMap::default();
        metrics.set("ipc", FieldValue::Real(1.5));
        metrics.set("cycles", FieldValue::Count(2000));
        metrics.set("llc_miss_lat", FieldValue::Real(123.456));
        metrics.set("llc_wp_access", FieldValue::Count(7));
        Extraction {
            metrics,
            warnings: vec!["missing_inst".into(), "ipc_crosscheck_mismatch".into()],
        }
    }

    fn identity() -> LogIdentity {
        LogIdentity {
            file: "01_mcf_ChampSim.txt".into(),
            bench: "mcf".into(),
            config: "latest".into(),
        }
    }

    #[test]
    fn cells_follow_schema_order() {
        let schema = SchemaKind::Full.schema();
        let row = Row::build(
            schema,
            &identity(),
            Classification::new(LogFormat::WpCapable, true),
            &extraction(),
        );
        assert_eq!(row.cells().len(), schema.len());
        assert_eq!(&row.cells()[..5], ["mcf", "latest", "01_mcf_ChampSim.txt", "wp_capable", "on"]);
        assert_eq!(row.get("ipc"), Some("1.500000"));
        assert_eq!(row.get("llc_miss_lat"), Some("123.5"));
        assert_eq!(row.get("llc_wp_access"), Some("7"));
        assert_eq!(row.get("inst"), Some(""));
        assert_eq!(row.warnings(), vec!["missing_inst", "ipc_crosscheck_mismatch"]);
        assert_eq!(row.ipc(), Some(1.5));
    }

    #[test]
    fn reduced_rows_drop_wrong_path_columns() {
        let row = Row::build(
            SchemaKind::Reduced.schema(),
            &identity(),
            Classification::new(LogFormat::Normal, false),
            &extraction(),
        );
        assert_eq!(row.get("llc_wp_access"), None);
        let summary: Vec<&str> = row.summary_cells().collect();
        assert_eq!(summary.len(), 16);
        assert_eq!(summary[0], "mcf");
        assert_eq!(summary[3], "off");
        assert_eq!(summary[5], "2000");
    }
}
