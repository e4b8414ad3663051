//! Derived columns and data quality checks

use crate::record::{Column, RecordSet};
use eyre::Result;
use indexmap::IndexMap;
use owo_colors::OwoColorize;

/// Computes a new column from the whole record set
pub type Derivation = Box<dyn Fn(&RecordSet) -> Result<Column> + Send + Sync>;

/// A named predicate over the whole record set
pub type Check = Box<dyn Fn(&RecordSet) -> Result<bool> + Send + Sync>;

/// Add (or replace) columns computed by `derivations`, in order.
///
/// Each derivation sees the columns added before it. A derivation that fails,
/// or returns a column of the wrong length, is logged and skipped.
///
/// # Example
/// ```
/// use tabular_etl::record::{Column, RecordSet, Value};
/// use tabular_etl::transform::{Derivation, add_derived_columns};
/// use indexmap::IndexMap;
///
/// let records = RecordSet::from_columns([
///     ("revenue", Column::floats([Some(100.0)])),
///     ("quantity", Column::integers([Some(4)])),
/// ]).unwrap();
///
/// let mut derivations: IndexMap<String, Derivation> = IndexMap::new();
/// derivations.insert(
///     "unit_price".to_string(),
///     Box::new(|r: &RecordSet| {
///         let revenue = r.column("revenue").ok_or_else(|| eyre::eyre!("no revenue"))?;
///         let quantity = r.column("quantity").ok_or_else(|| eyre::eyre!("no quantity"))?;
///         Ok(Column::floats(revenue.values().iter().zip(quantity.values()).map(
///             |(r, q)| Some(r.as_f64()? / q.as_f64()?),
///         )))
///     }),
/// );
///
/// let records = add_derived_columns(records, &derivations);
/// assert_eq!(records.column("unit_price").unwrap().get(0), Some(&Value::Float(25.0)));
/// ```
pub fn add_derived_columns(
    mut records: RecordSet,
    derivations: &IndexMap<String, Derivation>,
) -> RecordSet {
    log::info!("Adding {} derived columns", derivations.len());

    for (name, derive) in derivations {
        let added = derive(&records).and_then(|column| records.set_column(name.clone(), column));
        match added {
            Ok(()) => log::info!("Added derived column: {}", name),
            Err(e) => log::error!("Failed to create {}: {}", name, e),
        }
    }
    records
}

/// Run every check and report name → passed.
///
/// A check that returns an error is recorded as failed.
pub fn validate_data(
    records: &RecordSet,
    checks: &IndexMap<String, Check>,
) -> IndexMap<String, bool> {
    log::info!("Running data validations");

    checks
        .iter()
        .map(|(name, check)| {
            let passed = match check(records) {
                Ok(true) => {
                    log::info!("{} Validation passed: {}", "✓".green(), name);
                    true
                }
                Ok(false) => {
                    log::warn!("{} Validation failed: {}", "✗".red(), name);
                    false
                }
                Err(e) => {
                    log::error!("Validation error in {}: {}", name, e);
                    false
                }
            };
            (name.clone(), passed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn sample() -> RecordSet {
        RecordSet::from_columns([
            ("a", Column::integers([Some(1), Some(2)])),
            ("b", Column::integers([Some(10), Some(20)])),
        ])
        .unwrap()
    }

    fn sum_ab(records: &RecordSet) -> Result<Column> {
        let a = records.column("a").ok_or_else(|| eyre::eyre!("missing a"))?;
        let b = records.column("b").ok_or_else(|| eyre::eyre!("missing b"))?;
        Ok(Column::integers(
            a.values()
                .iter()
                .zip(b.values())
                .map(|(x, y)| Some(x.as_i64()? + y.as_i64()?)),
        ))
    }

    #[test]
    fn test_failing_derivation_is_skipped() {
        let mut derivations: IndexMap<String, Derivation> = IndexMap::new();
        derivations.insert("broken".to_string(), Box::new(|_: &RecordSet| Err(eyre::eyre!("boom"))));
        derivations.insert("total".to_string(), Box::new(sum_ab));
        derivations.insert(
            "short".to_string(),
            Box::new(|_: &RecordSet| Ok(Column::integers([Some(1)]))),
        );

        let records = add_derived_columns(sample(), &derivations);
        assert_eq!(records.column_names(), vec!["a", "b", "total"]);
        assert_eq!(records.column("total").unwrap().get(1), Some(&Value::Integer(22)));
    }

    #[test]
    fn test_derivations_see_earlier_columns() {
        let mut derivations: IndexMap<String, Derivation> = IndexMap::new();
        derivations.insert("a".to_string(), Box::new(sum_ab));
        derivations.insert("a_again".to_string(), Box::new(sum_ab));

        let records = add_derived_columns(sample(), &derivations);
        assert_eq!(records.column("a").unwrap().get(0), Some(&Value::Integer(11)));
        assert_eq!(records.column("a_again").unwrap().get(0), Some(&Value::Integer(21)));
    }

    #[test]
    fn test_validate_data() {
        let mut checks: IndexMap<String, Check> = IndexMap::new();
        checks.insert("not_empty".to_string(), Box::new(|r: &RecordSet| Ok(!r.is_empty())));
        checks.insert(
            "positive_a".to_string(),
            Box::new(|r: &RecordSet| {
                let a = r.column("a").ok_or_else(|| eyre::eyre!("missing a"))?;
                Ok(a.values().iter().all(|v| v.as_f64().is_some_and(|x| x > 1.0)))
            }),
        );
        checks.insert(
            "raises".to_string(),
            Box::new(|r: &RecordSet| {
                r.column("missing").ok_or_else(|| eyre::eyre!("missing column"))?;
                Ok(true)
            }),
        );

        let results = validate_data(&sample(), &checks);
        assert_eq!(results.get("not_empty"), Some(&true));
        assert_eq!(results.get("positive_a"), Some(&false));
        assert_eq!(results.get("raises"), Some(&false));
    }
}
