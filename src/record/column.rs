//! Typed columns

use super::{ColumnKind, Value};

/// A sequence of values that all fit one [`ColumnKind`]
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    kind: ColumnKind,
    values: Vec<Value>,
}

impl Column {
    /// Build a column of a known kind.
    ///
    /// Values that do not fit the kind are coerced: integers widen to floats in
    /// float columns, and anything else non-null is rendered as text in textual
    /// columns or nulled in numeric/timestamp columns.
    pub fn new(kind: ColumnKind, values: Vec<Value>) -> Self {
        let values = values
            .into_iter()
            .map(|value| coerce(kind, value))
            .collect();
        Self { kind, values }
    }

    /// Build a column choosing the narrowest kind that holds every value
    pub fn infer(values: Vec<Value>) -> Self {
        let kind = values
            .iter()
            .filter_map(|v| match v {
                Value::Null => None,
                Value::Integer(_) => Some(ColumnKind::Integer),
                Value::Float(_) => Some(ColumnKind::Float),
                Value::Text(_) => Some(ColumnKind::Text),
                Value::Timestamp(_) => Some(ColumnKind::Timestamp),
            })
            .reduce(ColumnKind::unify)
            .unwrap_or(ColumnKind::Text);
        Self::new(kind, values)
    }

    /// A column of `len` nulls
    pub fn nulls(kind: ColumnKind, len: usize) -> Self {
        Self {
            kind,
            values: vec![Value::Null; len],
        }
    }

    pub fn integers<I: IntoIterator<Item = Option<i64>>>(values: I) -> Self {
        Self::new(ColumnKind::Integer, values.into_iter().map(Value::from).collect())
    }

    pub fn floats<I: IntoIterator<Item = Option<f64>>>(values: I) -> Self {
        Self::new(ColumnKind::Float, values.into_iter().map(Value::from).collect())
    }

    pub fn texts<S: Into<String>, I: IntoIterator<Item = Option<S>>>(values: I) -> Self {
        Self::new(
            ColumnKind::Text,
            values
                .into_iter()
                .map(|v| v.map(|s| Value::Text(s.into())).unwrap_or(Value::Null))
                .collect(),
        )
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Replace every null with `fill`
    pub fn fill_nulls(&mut self, fill: &Value) {
        let fill = coerce(self.kind, fill.clone());
        for value in self.values.iter_mut().filter(|v| v.is_null()) {
            *value = fill.clone();
        }
    }

    /// Rebuild the column under another kind, coercing values
    pub fn with_kind(self, kind: ColumnKind) -> Self {
        Self::new(kind, self.values)
    }

    /// Select rows by index, in the given order
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            kind: self.kind,
            values: indices
                .iter()
                .map(|&i| self.values.get(i).cloned().unwrap_or(Value::Null))
                .collect(),
        }
    }

    pub(crate) fn extend(&mut self, other: Column) {
        let kind = self.kind;
        self.values
            .extend(other.values.into_iter().map(|v| coerce(kind, v)));
    }
}

fn coerce(kind: ColumnKind, value: Value) -> Value {
    match (kind, value) {
        (_, Value::Null) => Value::Null,
        (ColumnKind::Float, Value::Integer(i)) => Value::Float(i as f64),
        (k, v) if k.admits(&v) => v,
        (ColumnKind::Text | ColumnKind::Category, v) => Value::Text(v.to_string()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_promotes_integers() {
        let column = Column::infer(vec![Value::Integer(1), Value::Null, Value::Float(2.5)]);
        assert_eq!(column.kind(), ColumnKind::Float);
        assert_eq!(column.values()[0], Value::Float(1.0));
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn test_infer_mixed_falls_back_to_text() {
        let column = Column::infer(vec![Value::Integer(1), Value::from("x")]);
        assert_eq!(column.kind(), ColumnKind::Text);
        assert_eq!(column.values()[0], Value::from("1"));
    }

    #[test]
    fn test_all_null_is_text() {
        let column = Column::infer(vec![Value::Null, Value::Null]);
        assert_eq!(column.kind(), ColumnKind::Text);
        assert_eq!(column.len(), 2);
    }

    #[test]
    fn test_take_and_fill() {
        let mut column = Column::integers([Some(1), None, Some(3)]);
        column.fill_nulls(&Value::Integer(9));
        assert_eq!(column.take(&[2, 1]).values(), &[Value::Integer(3), Value::Integer(9)]);
    }
}
