//! The fixed transform stage run by the pipeline

use super::{DEFAULT_NULL_THRESHOLD, NullPolicy, clean, convert_types, standardize_columns};
use crate::etl::Transformer;
use crate::record::{Column, ColumnKind, RecordSet, Value};
use chrono::{NaiveDateTime, Utc};
use eyre::Result;
use indexmap::IndexMap;

/// Column stamped with the time the transform ran
pub const LOADED_AT_COLUMN: &str = "etl_loaded_at";

/// Column stamped with the run identifier
pub const BATCH_ID_COLUMN: &str = "etl_batch_id";

/// Clean (duplicates + fill), standardize names, convert configured types and
/// stamp run metadata.
///
/// # Example
/// ```
/// use tabular_etl::etl::Transformer;
/// use tabular_etl::record::{Column, RecordSet};
/// use tabular_etl::transform::StandardTransform;
///
/// let records = RecordSet::from_columns([
///     ("Order Date", Column::texts([Some("2024-01-01")])),
/// ]).unwrap();
///
/// let transform = StandardTransform::new("20240101000000")
///     .with_type_conversion("order_date", "datetime");
/// let output = transform.transform(records).unwrap();
/// assert_eq!(
///     output.column_names(),
///     vec!["order_date", "etl_loaded_at", "etl_batch_id"]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StandardTransform {
    run_id: String,
    type_conversions: IndexMap<String, String>,
    null_threshold: f64,
}

impl StandardTransform {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            type_conversions: IndexMap::new(),
            null_threshold: DEFAULT_NULL_THRESHOLD,
        }
    }

    /// Convert `column` (named after standardization) to the type `tag`
    pub fn with_type_conversion(mut self, column: impl Into<String>, tag: impl Into<String>) -> Self {
        self.type_conversions.insert(column.into(), tag.into());
        self
    }

    pub fn with_type_conversions(mut self, conversions: IndexMap<String, String>) -> Self {
        self.type_conversions = conversions;
        self
    }

    pub fn with_null_threshold(mut self, threshold: f64) -> Self {
        self.null_threshold = threshold;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run the stage with an explicit load timestamp
    pub fn transform_at(&self, records: RecordSet, loaded_at: NaiveDateTime) -> Result<RecordSet> {
        let records = clean(records, true, NullPolicy::Fill, self.null_threshold)?;
        let records = standardize_columns(records, None, true, true)?;
        let mut records = if self.type_conversions.is_empty() {
            records
        } else {
            convert_types(records, &self.type_conversions)
        };

        let rows = records.len();
        records.set_column(
            LOADED_AT_COLUMN,
            Column::new(ColumnKind::Timestamp, vec![Value::Timestamp(loaded_at); rows]),
        )?;
        records.set_column(
            BATCH_ID_COLUMN,
            Column::new(ColumnKind::Text, vec![Value::from(self.run_id.as_str()); rows]),
        )?;
        Ok(records)
    }
}

impl Transformer for StandardTransform {
    type Input = RecordSet;
    type Output = RecordSet;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        self.transform_at(input, Utc::now().naive_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_sequence() {
        let records = RecordSet::from_columns([
            ("Order ID", Column::integers([Some(1), Some(2), Some(2), Some(3)])),
            ("Amount", Column::floats([Some(10.0), Some(30.0), Some(30.0), None])),
            ("Shipped", Column::texts([Some("2024-02-01"), None, None, Some("2024-02-03")])),
        ])
        .unwrap();

        let loaded_at = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let output = StandardTransform::new("run-42")
            .with_type_conversion("shipped", "datetime")
            .transform_at(records, loaded_at)
            .unwrap();

        assert_eq!(output.len(), 3);
        assert_eq!(
            output.column_names(),
            vec!["order_id", "amount", "shipped", "etl_loaded_at", "etl_batch_id"]
        );
        assert_eq!(output.column("amount").unwrap().get(2), Some(&Value::Float(20.0)));
        assert_eq!(output.column("shipped").unwrap().kind(), ColumnKind::Timestamp);
        assert_eq!(
            output.column("etl_loaded_at").unwrap().get(0),
            Some(&Value::Timestamp(loaded_at))
        );
        assert_eq!(
            output.column("etl_batch_id").unwrap().get(2),
            Some(&Value::from("run-42"))
        );
    }
}
