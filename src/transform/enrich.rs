//! Lookup joins

use crate::error::PipelineError;
use crate::record::{Column, RecordSet, Value};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Join kind for [`enrich_with_lookup`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Left,
    Right,
    Inner,
    Outer,
}

impl FromStr for JoinKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "left" => Ok(JoinKind::Left),
            "right" => Ok(JoinKind::Right),
            "inner" => Ok(JoinKind::Inner),
            "outer" => Ok(JoinKind::Outer),
            other => Err(eyre!("Unknown join type: {}", other)),
        }
    }
}

/// Join `records` with `lookup` on `on`.
///
/// Output columns are the left columns followed by the lookup's non-key
/// columns; names present on both sides get `_x` (left) and `_y` (lookup)
/// suffixes. Null keys match each other. Row order follows the left side,
/// except for `right` joins which follow the lookup; `outer` appends the
/// unmatched lookup rows after the left rows.
///
/// A `left` join that changes the row count (duplicate lookup keys) is logged
/// as a warning.
///
/// # Errors
/// [`PipelineError::MissingColumns`] if either side lacks the join column
pub fn enrich_with_lookup(
    records: &RecordSet,
    lookup: &RecordSet,
    on: &str,
    how: JoinKind,
) -> Result<RecordSet> {
    log::info!("Enriching data with lookup on '{}'", on);

    let (Some(left_key), Some(right_key)) = (records.column(on), lookup.column(on)) else {
        return Err(PipelineError::MissingColumns(vec![on.to_string()]).into());
    };

    let pairs = match_rows(left_key, right_key, how);

    let mut output = RecordSet::new();
    for (name, column) in records.columns() {
        if name == on {
            let kind = left_key.kind().unify(right_key.kind());
            let values = pairs
                .iter()
                .map(|&(left, right)| match (left, right) {
                    (Some(i), _) => cell(left_key, i),
                    (None, Some(j)) => cell(right_key, j),
                    (None, None) => Value::Null,
                })
                .collect();
            output.push_column(name, Column::new(kind, values))?;
            continue;
        }
        let label = if lookup.has_column(name) {
            format!("{}_x", name)
        } else {
            name.to_string()
        };
        let values = pairs
            .iter()
            .map(|&(left, _)| left.map_or(Value::Null, |i| cell(column, i)))
            .collect();
        output.push_column(label, Column::new(column.kind(), values))?;
    }
    for (name, column) in lookup.columns().filter(|(name, _)| *name != on) {
        let label = if records.has_column(name) {
            format!("{}_y", name)
        } else {
            name.to_string()
        };
        let values = pairs
            .iter()
            .map(|&(_, right)| right.map_or(Value::Null, |j| cell(column, j)))
            .collect();
        output.push_column(label, Column::new(column.kind(), values))?;
    }

    if how == JoinKind::Left && pairs.len() != records.len() {
        log::warn!(
            "Row count changed after join: {} -> {}",
            records.len(),
            pairs.len()
        );
    }
    log::info!("Enrichment completed");
    Ok(output)
}

fn cell(column: &Column, row: usize) -> Value {
    column.get(row).cloned().unwrap_or(Value::Null)
}

/// Row index pairs (left, lookup) of the joined output, in output order
fn match_rows(left: &Column, right: &Column, how: JoinKind) -> Vec<(Option<usize>, Option<usize>)> {
    let index = |column: &Column| {
        let mut index: HashMap<Value, Vec<usize>> = HashMap::new();
        for (row, value) in column.values().iter().enumerate() {
            index.entry(value.clone()).or_default().push(row);
        }
        index
    };

    let mut pairs = Vec::new();
    match how {
        JoinKind::Right => {
            let left_index = index(left);
            for (j, key) in right.values().iter().enumerate() {
                match left_index.get(key) {
                    Some(rows) => pairs.extend(rows.iter().map(|&i| (Some(i), Some(j)))),
                    None => pairs.push((None, Some(j))),
                }
            }
        }
        JoinKind::Left | JoinKind::Inner | JoinKind::Outer => {
            let right_index = index(right);
            let mut matched = vec![false; right.len()];
            for (i, key) in left.values().iter().enumerate() {
                match right_index.get(key) {
                    Some(rows) => {
                        for &j in rows {
                            matched[j] = true;
                            pairs.push((Some(i), Some(j)));
                        }
                    }
                    None if how != JoinKind::Inner => pairs.push((Some(i), None)),
                    None => {}
                }
            }
            if how == JoinKind::Outer {
                pairs.extend(
                    matched
                        .iter()
                        .enumerate()
                        .filter(|(_, hit)| !**hit)
                        .map(|(j, _)| (None, Some(j))),
                );
            }
        }
    }
    pairs
}
