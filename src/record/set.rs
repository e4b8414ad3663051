//! Columnar record sets

use super::{Column, ColumnKind, Value};
use crate::error::PipelineError;
use eyre::{Context, Result};
use indexmap::IndexMap;
use std::path::Path;

/// An in-memory columnar table.
///
/// Columns keep their insertion order, names are unique and every column has
/// exactly [`RecordSet::len`] values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    columns: IndexMap<String, Column>,
    rows: usize,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record set from named columns, validating names and lengths
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for (name, column) in columns {
            set.push_column(name, column)?;
        }
        Ok(set)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), column))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Mutable access for in-place rewrites that keep the column length
    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Append a new column at the end
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(PipelineError::DuplicateColumn(name).into());
        }
        self.check_length(&name, &column)?;
        if self.columns.is_empty() {
            self.rows = column.len();
        }
        self.columns.insert(name, column);
        Ok(())
    }

    /// Insert or replace a column; a replaced column keeps its position
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        self.check_length(&name, &column)?;
        if self.columns.is_empty() {
            self.rows = column.len();
        }
        self.columns.insert(name, column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        self.columns.shift_remove(name)
    }

    fn check_length(&self, name: &str, column: &Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.rows {
            return Err(PipelineError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows,
                actual: column.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Values of one row, in column order
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns
            .values()
            .filter_map(|column| column.get(index))
            .collect()
    }

    /// Iterate rows as vectors of borrowed values
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Keep only the rows at `indices`, in that order
    pub fn take_rows(&self, indices: &[usize]) -> RecordSet {
        RecordSet {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.take(indices)))
                .collect(),
            rows: indices.len(),
        }
    }

    /// Project onto `names`, in the requested order
    pub fn select(&self, names: &[&str]) -> Result<RecordSet> {
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingColumns(missing).into());
        }
        let mut selected = RecordSet::new();
        for name in names {
            if let Some(column) = self.column(name) {
                selected.push_column(*name, column.clone())?;
            }
        }
        if selected.column_count() == 0 {
            selected.rows = self.rows;
        }
        Ok(selected)
    }

    /// Rename every column at once; the new names must be unique
    pub(crate) fn rename_all(&mut self, names: Vec<String>) -> Result<()> {
        let mut renamed = IndexMap::with_capacity(names.len());
        for (name, (_, column)) in names.into_iter().zip(std::mem::take(&mut self.columns)) {
            if renamed.contains_key(&name) {
                return Err(PipelineError::DuplicateColumn(name).into());
            }
            renamed.insert(name, column);
        }
        self.columns = renamed;
        Ok(())
    }

    /// Stack record sets vertically.
    ///
    /// Columns are unioned in first-seen order, missing cells become nulls and
    /// conflicting kinds are unified (integer + float is float, otherwise text).
    pub fn concat(sets: Vec<RecordSet>) -> RecordSet {
        let mut kinds: IndexMap<String, ColumnKind> = IndexMap::new();
        for set in &sets {
            for (name, column) in set.columns() {
                kinds
                    .entry(name.to_string())
                    .and_modify(|kind| *kind = kind.unify(column.kind()))
                    .or_insert(column.kind());
            }
        }

        let mut merged: IndexMap<String, Column> = kinds
            .iter()
            .map(|(name, kind)| (name.clone(), Column::nulls(*kind, 0)))
            .collect();
        let mut rows = 0;
        for mut set in sets {
            for (name, column) in merged.iter_mut() {
                let kind = column.kind();
                let part = set
                    .columns
                    .shift_remove(name)
                    .unwrap_or_else(|| Column::nulls(kind, set.rows));
                column.extend(part);
            }
            rows += set.rows;
        }

        RecordSet {
            columns: merged,
            rows,
        }
    }

    /// Build a record set from JSON records.
    ///
    /// Object keys are unioned in first-seen order. Numbers keep their integer or
    /// float kind, booleans and strings become text and nested values are stored
    /// as their JSON text. A non-object record lands in a `value` column.
    pub fn from_json_records(records: &[serde_json::Value]) -> RecordSet {
        let mut cells: IndexMap<String, Vec<Value>> = IndexMap::new();
        for (row, record) in records.iter().enumerate() {
            let fields: Vec<(&str, &serde_json::Value)> = match record {
                serde_json::Value::Object(map) => {
                    map.iter().map(|(k, v)| (k.as_str(), v)).collect()
                }
                other => vec![("value", other)],
            };
            for (key, value) in fields {
                let column = cells
                    .entry(key.to_string())
                    .or_insert_with(|| vec![Value::Null; row]);
                column.resize(row, Value::Null);
                column.push(json_to_value(value));
            }
        }

        let rows = records.len();
        let columns = cells
            .into_iter()
            .map(|(name, mut values)| {
                values.resize(rows, Value::Null);
                (name, Column::infer(values))
            })
            .collect();
        RecordSet { columns, rows }
    }

    /// Write the record set as CSV with a header row
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        writer.write_record(self.columns.keys())?;
        for row in self.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        Ok(())
    }
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Text(b.to_string()),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        nested => Value::Text(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RecordSet {
        RecordSet::from_columns([
            ("id", Column::integers([Some(1), Some(2), Some(3)])),
            ("name", Column::texts([Some("a"), None, Some("c")])),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_validates_lengths() {
        let result = RecordSet::from_columns([
            ("a", Column::integers([Some(1)])),
            ("b", Column::integers([Some(1), Some(2)])),
        ]);
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut set = sample();
        assert!(set.push_column("id", Column::integers([None, None, None])).is_err());
    }

    #[test]
    fn test_set_column_keeps_position() {
        let mut set = sample();
        set.set_column("id", Column::texts([Some("x"), Some("y"), Some("z")]))
            .unwrap();
        assert_eq!(set.column_names(), vec!["id", "name"]);
        assert_eq!(set.column("id").unwrap().kind(), ColumnKind::Text);
    }

    #[test]
    fn test_take_rows() {
        let set = sample().take_rows(&[2, 0]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.row(0), vec![&Value::Integer(3), &Value::from("c")]);
    }

    #[test]
    fn test_select_missing() {
        assert!(sample().select(&["id", "nope"]).is_err());
        let selected = sample().select(&["name"]).unwrap();
        assert_eq!(selected.column_names(), vec!["name"]);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_concat_unions_columns() {
        let other = RecordSet::from_columns([
            ("id", Column::floats([Some(4.5)])),
            ("extra", Column::texts([Some("e")])),
        ])
        .unwrap();

        let merged = RecordSet::concat(vec![sample(), other]);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.column_names(), vec!["id", "name", "extra"]);
        assert_eq!(merged.column("id").unwrap().kind(), ColumnKind::Float);
        assert_eq!(merged.column("extra").unwrap().null_count(), 3);
        assert_eq!(merged.column("name").unwrap().get(3), Some(&Value::Null));
    }

    #[test]
    fn test_from_json_records() {
        let records = vec![
            json!({"id": 1, "score": 2, "tags": ["x"]}),
            json!({"id": 2, "score": 2.5, "active": true}),
        ];
        let set = RecordSet::from_json_records(&records);

        assert_eq!(set.len(), 2);
        assert_eq!(set.column_names(), vec!["id", "score", "tags", "active"]);
        assert_eq!(set.column("id").unwrap().kind(), ColumnKind::Integer);
        assert_eq!(set.column("score").unwrap().kind(), ColumnKind::Float);
        assert_eq!(set.column("tags").unwrap().get(0), Some(&Value::from("[\"x\"]")));
        assert_eq!(set.column("tags").unwrap().get(1), Some(&Value::Null));
        assert_eq!(set.column("active").unwrap().get(0), Some(&Value::Null));
        assert_eq!(set.column("active").unwrap().get(1), Some(&Value::from("true")));
    }

    #[test]
    fn test_write_csv() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        sample().write_csv(temp.path()).unwrap();
        let content = std::fs::read_to_string(temp.path()).unwrap();
        assert_eq!(content, "id,name\n1,a\n2,\n3,c\n");
    }
}
