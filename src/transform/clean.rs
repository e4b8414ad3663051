//! Duplicate removal and null handling

use crate::record::{Column, ColumnKind, RecordSet, Value};
use chrono::NaiveDateTime;
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Largest null fraction a column may have before [`clean`] drops it
pub const DEFAULT_NULL_THRESHOLD: f64 = 0.5;

/// Fill value for textual columns with no observed value
pub const UNKNOWN: &str = "Unknown";

/// What [`clean`] does with the nulls left after column pruning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPolicy {
    /// Remove every row holding a null
    Drop,
    /// Impute per column: median for numbers and timestamps, mode for text
    #[default]
    Fill,
    /// Leave nulls as they are
    Keep,
}

impl FromStr for NullPolicy {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "fill" => Ok(Self::Fill),
            "keep" => Ok(Self::Keep),
            other => Err(eyre!("Unknown null policy '{}' (expected drop, fill or keep)", other)),
        }
    }
}

/// Clean a record set.
///
/// 1. With `remove_duplicates`, rows identical across all columns collapse to
///    their first occurrence.
/// 2. Columns whose null fraction exceeds `null_threshold` are dropped.
/// 3. `null_policy` is applied to the remaining nulls.
pub fn clean(
    records: RecordSet,
    remove_duplicates: bool,
    null_policy: NullPolicy,
    null_threshold: f64,
) -> Result<RecordSet> {
    log::info!("Starting data cleaning");
    let initial_rows = records.len();

    let mut records = if remove_duplicates {
        let deduped = drop_duplicates(&records);
        log::info!("Removed {} duplicate rows", initial_rows - deduped.len());
        deduped
    } else {
        records
    };

    if !records.is_empty() {
        let total = records.len() as f64;
        let sparse: Vec<String> = records
            .columns()
            .filter(|(_, column)| column.null_count() as f64 / total > null_threshold)
            .map(|(name, _)| name.to_string())
            .collect();
        if !sparse.is_empty() {
            log::warn!(
                "Dropping columns with >{:.0}% nulls: {}",
                null_threshold * 100.0,
                sparse.join(", ")
            );
            for name in &sparse {
                records.remove_column(name);
            }
        }
    }

    let records = match null_policy {
        NullPolicy::Drop => {
            let keep: Vec<usize> = (0..records.len())
                .filter(|&i| records.row(i).iter().all(|v| !v.is_null()))
                .collect();
            let kept = records.take_rows(&keep);
            log::info!("Dropped rows with nulls. Remaining: {}", kept.len());
            kept
        }
        NullPolicy::Fill => fill_nulls(records),
        NullPolicy::Keep => records,
    };

    log::info!("Cleaning completed. Final rows: {}", records.len());
    Ok(records)
}

fn drop_duplicates(records: &RecordSet) -> RecordSet {
    let mut seen = HashSet::with_capacity(records.len());
    let keep: Vec<usize> = (0..records.len())
        .filter(|&i| seen.insert(records.row(i)))
        .collect();
    records.take_rows(&keep)
}

fn fill_nulls(mut records: RecordSet) -> RecordSet {
    let names: Vec<String> = records
        .columns()
        .filter(|(_, column)| column.null_count() > 0)
        .map(|(name, _)| name.to_string())
        .collect();

    for name in names {
        if let Some(slot) = records.column_mut(&name) {
            let kind = slot.kind();
            let column = std::mem::replace(slot, Column::nulls(kind, 0));
            *slot = fill_column(column);
        }
    }
    records
}

fn fill_column(mut column: Column) -> Column {
    match column.kind() {
        ColumnKind::Integer | ColumnKind::Float => {
            let Some(median) = median(column.values().iter().filter_map(Value::as_f64).collect())
            else {
                return column;
            };
            if column.kind() == ColumnKind::Integer && median.fract() == 0.0 {
                column.fill_nulls(&Value::Integer(median as i64));
            } else {
                column = column.with_kind(ColumnKind::Float);
                column.fill_nulls(&Value::Float(median));
            }
        }
        ColumnKind::Text | ColumnKind::Category => {
            let fill = mode(column.values()).unwrap_or_else(|| Value::from(UNKNOWN));
            column.fill_nulls(&fill);
        }
        ColumnKind::Timestamp => {
            let mut stamps: Vec<NaiveDateTime> =
                column.values().iter().filter_map(Value::as_timestamp).collect();
            stamps.sort();
            let n = stamps.len();
            if n > 0 {
                let median = if n % 2 == 1 {
                    stamps[n / 2]
                } else {
                    let (low, high) = (stamps[n / 2 - 1], stamps[n / 2]);
                    low + (high - low) / 2
                };
                column.fill_nulls(&Value::Timestamp(median));
            }
        }
    }
    column
}

/// Median of a sample, `None` when empty
pub(crate) fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    Some(if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    })
}

/// Most frequent non-null value; ties go to the smallest
fn mode(values: &[Value]) -> Option<Value> {
    let mut counts: HashMap<&Value, usize> = HashMap::new();
    for value in values.iter().filter(|v| !v.is_null()) {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.total_cmp(a)))
        .map(|(value, _)| value.clone())
}
