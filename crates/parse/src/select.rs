use crate::classify::Classification;
use champsum_schema::SchemaKind;

/// One schema for the whole batch: full as soon as any accepted log is wrong-path
/// capable, reduced otherwise (including the empty batch).
pub fn select_schema<'a, I>(classifications: I) -> SchemaKind
where
    I: IntoIterator<Item = &'a Classification>,
{
    if classifications
        .into_iter()
        .any(|classification| classification.is_wp_capable())
    {
        SchemaKind::Full
    } else {
        SchemaKind::Reduced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LogFormat;

    #[test]
    fn one_wrong_path_log_selects_full() {
        let batch = [
            Classification::new(LogFormat::Normal, false),
            Classification::new(LogFormat::Normal, false),
            Classification::new(LogFormat::WpCapable, false),
        ];
        assert_eq!(select_schema(&batch), SchemaKind::Full);
        assert_eq!(select_schema(&batch[..2]), SchemaKind::Reduced);
    }

    #[test]
    fn empty_batch_selects_reduced() {
        assert_eq!(select_schema(&[]), SchemaKind::Reduced);
    }

    #[test]
    fn unknown_logs_do_not_vote() {
        let batch = [Classification::new(LogFormat::Unknown, true)];
        assert_eq!(select_schema(&batch), SchemaKind::Reduced);
    }
}
