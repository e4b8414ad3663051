//! Group-by aggregation

use super::clean::median;
use crate::error::PipelineError;
use crate::record::{Column, ColumnKind, RecordSet, Value};
use eyre::{Result, bail, eyre};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Aggregation applied to one column within each group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    Nunique,
    First,
    Last,
}

impl AggFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Median => "median",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::Nunique => "nunique",
            AggFunc::First => "first",
            AggFunc::Last => "last",
        }
    }

    fn requires_numeric(self) -> bool {
        matches!(self, AggFunc::Sum | AggFunc::Mean | AggFunc::Median)
    }

    fn output_kind(self, input: ColumnKind) -> ColumnKind {
        match self {
            AggFunc::Sum => input,
            AggFunc::Mean | AggFunc::Median => ColumnKind::Float,
            AggFunc::Count | AggFunc::Nunique => ColumnKind::Integer,
            AggFunc::Min | AggFunc::Max | AggFunc::First | AggFunc::Last => input,
        }
    }

    /// Apply to the non-null values of one group
    fn apply(self, values: &[&Value]) -> Value {
        let present = || values.iter().copied().filter(|v| !v.is_null());
        match self {
            AggFunc::Sum => {
                let float_sum = || Value::Float(present().filter_map(Value::as_f64).sum());
                if present().all(|v| matches!(v, Value::Integer(_))) {
                    match present()
                        .filter_map(Value::as_i64)
                        .try_fold(0i64, i64::checked_add)
                    {
                        Some(total) => Value::Integer(total),
                        None => {
                            log::warn!("Integer sum overflowed, summing as float instead");
                            float_sum()
                        }
                    }
                } else {
                    float_sum()
                }
            }
            AggFunc::Mean => {
                let numbers: Vec<f64> = present().filter_map(Value::as_f64).collect();
                if numbers.is_empty() {
                    Value::Null
                } else {
                    Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AggFunc::Median => median(present().filter_map(Value::as_f64).collect()).into(),
            AggFunc::Min => present().min_by(|a, b| a.total_cmp(b)).cloned().into(),
            AggFunc::Max => present().max_by(|a, b| a.total_cmp(b)).cloned().into(),
            AggFunc::Count => Value::Integer(present().count() as i64),
            AggFunc::Nunique => Value::Integer(present().collect::<HashSet<_>>().len() as i64),
            AggFunc::First => present().next().cloned().into(),
            AggFunc::Last => present().last().cloned().into(),
        }
    }
}

impl FromStr for AggFunc {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(AggFunc::Sum),
            "mean" | "avg" => Ok(AggFunc::Mean),
            "median" => Ok(AggFunc::Median),
            "min" => Ok(AggFunc::Min),
            "max" => Ok(AggFunc::Max),
            "count" => Ok(AggFunc::Count),
            "nunique" => Ok(AggFunc::Nunique),
            "first" => Ok(AggFunc::First),
            "last" => Ok(AggFunc::Last),
            other => Err(eyre!("Unknown aggregation function: {}", other)),
        }
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Group rows by `group_by` and aggregate the columns named in `aggregations`.
///
/// Rows group by the exact tuple of key values; null is a key like any other.
/// Output has the key columns first, then one column per (column, function).
/// When any column asks for several functions every output column is named
/// `{column}_{function}`; otherwise the column keeps its name. Groups come out
/// sorted by key, nulls last.
///
/// # Errors
/// - [`PipelineError::MissingColumns`] for absent key or aggregated columns
/// - sum, mean and median on a non-numeric column
pub fn aggregate(
    records: &RecordSet,
    group_by: &[&str],
    aggregations: &IndexMap<String, Vec<AggFunc>>,
) -> Result<RecordSet> {
    log::info!("Aggregating by {:?}", group_by);

    let missing: Vec<String> = group_by
        .iter()
        .copied()
        .chain(aggregations.keys().map(String::as_str))
        .filter(|name| !records.has_column(name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns(missing).into());
    }

    let keys: Vec<&Column> = group_by
        .iter()
        .filter_map(|name| records.column(name))
        .collect();
    let mut groups: IndexMap<Vec<&Value>, Vec<usize>> = IndexMap::new();
    for row in 0..records.len() {
        let key: Vec<&Value> = keys.iter().filter_map(|column| column.get(row)).collect();
        groups.entry(key).or_default().push(row);
    }
    groups.sort_by(|a, _, b, _| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| x.total_cmp(y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut output = RecordSet::new();
    for (position, (name, column)) in group_by.iter().zip(&keys).enumerate() {
        let values = groups
            .keys()
            .map(|key| key.get(position).copied().cloned().unwrap_or(Value::Null))
            .collect();
        output.push_column(*name, Column::new(column.kind(), values))?;
    }

    let flatten = aggregations.values().any(|funcs| funcs.len() > 1);
    for (name, funcs) in aggregations {
        let Some(column) = records.column(name) else {
            continue;
        };
        for func in funcs {
            if func.requires_numeric() && !column.kind().is_numeric() {
                bail!(
                    "Cannot apply {} to non-numeric column '{}' ({})",
                    func,
                    name,
                    column.kind()
                );
            }
            let values: Vec<Value> = groups
                .values()
                .map(|rows| {
                    let group: Vec<&Value> =
                        rows.iter().filter_map(|&row| column.get(row)).collect();
                    func.apply(&group)
                })
                .collect();
            let label = if flatten {
                format!("{}_{}", name, func)
            } else {
                name.clone()
            };
            let mut kind = func.output_kind(column.kind());
            // An overflowed integer sum comes back as a float
            if kind == ColumnKind::Integer && values.iter().any(|v| matches!(v, Value::Float(_))) {
                kind = ColumnKind::Float;
            }
            output.push_column(label, Column::new(kind, values))?;
        }
    }

    log::info!("Aggregation completed. Rows: {}", groups.len());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> RecordSet {
        RecordSet::from_columns([
            (
                "region",
                Column::texts([Some("south"), Some("north"), Some("south"), None, None]),
            ),
            ("qty", Column::integers([Some(1), Some(2), Some(3), Some(4), None])),
            ("price", Column::floats([Some(1.5), Some(2.0), Some(2.5), None, Some(1.0)])),
        ])
        .unwrap()
    }

    fn aggs(pairs: &[(&str, &[AggFunc])]) -> IndexMap<String, Vec<AggFunc>> {
        pairs
            .iter()
            .map(|(name, funcs)| (name.to_string(), funcs.to_vec()))
            .collect()
    }

    #[test]
    fn test_integer_sum_overflow_widens_to_float() {
        let records = RecordSet::from_columns([
            ("k", Column::texts([Some("a"), Some("a"), Some("b")])),
            ("v", Column::integers([Some(i64::MAX), Some(1), Some(7)])),
        ])
        .unwrap();

        let result = aggregate(&records, &["k"], &aggs(&[("v", &[AggFunc::Sum])])).unwrap();
        let sums = result.column("v").unwrap();
        assert_eq!(sums.kind(), ColumnKind::Float);
        assert_eq!(
            sums.values(),
            &[Value::Float(i64::MAX as f64 + 1.0), Value::Float(7.0)]
        );
    }

    #[test]
    fn test_single_function_keeps_names() {
        let result = aggregate(
            &sales(),
            &["region"],
            &aggs(&[("qty", &[AggFunc::Sum]), ("price", &[AggFunc::Mean])]),
        )
        .unwrap();

        assert_eq!(result.column_names(), vec!["region", "qty", "price"]);
        assert_eq!(
            result.column("region").unwrap().values(),
            &[Value::from("north"), Value::from("south"), Value::Null]
        );
        assert_eq!(
            result.column("qty").unwrap().values(),
            &[Value::Integer(2), Value::Integer(4), Value::Integer(4)]
        );
        assert_eq!(
            result.column("price").unwrap().values(),
            &[Value::Float(2.0), Value::Float(2.0), Value::Float(1.0)]
        );
    }

    #[test]
    fn test_multiple_functions_flatten() {
        let result = aggregate(
            &sales(),
            &["region"],
            &aggs(&[
                ("qty", &[AggFunc::Min, AggFunc::Max, AggFunc::Count]),
                ("price", &[AggFunc::Sum]),
            ]),
        )
        .unwrap();
        assert_eq!(
            result.column_names(),
            vec!["region", "qty_min", "qty_max", "qty_count", "price_sum"]
        );
        assert_eq!(result.column("qty_count").unwrap().get(2), Some(&Value::Integer(1)));
        assert_eq!(result.column("qty_max").unwrap().get(1), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_missing_column() {
        let err = aggregate(&sales(), &["nope"], &aggs(&[("qty", &[AggFunc::Sum])])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingColumns(cols)) if cols == &vec!["nope".to_string()]
        ));
    }

    #[test]
    fn test_numeric_function_on_text_fails() {
        assert!(aggregate(&sales(), &["qty"], &aggs(&[("region", &[AggFunc::Mean])])).is_err());
        let result =
            aggregate(&sales(), &["qty"], &aggs(&[("region", &[AggFunc::Nunique])])).unwrap();
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn test_parse_functions() {
        assert_eq!("AVG".parse::<AggFunc>().unwrap(), AggFunc::Mean);
        assert!("mode".parse::<AggFunc>().is_err());
    }
}
