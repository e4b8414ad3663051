//! Best-effort column type conversion

use crate::error::PipelineError;
use crate::record::{Column, ColumnKind, RecordSet, Value, parse_timestamp};
use chrono::{DateTime, NaiveDateTime};
use indexmap::IndexMap;
use std::str::FromStr;

/// Parse a type tag into the column kind it converts to
impl FromStr for ColumnKind {
    type Err = PipelineError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_lowercase().as_str() {
            "datetime" | "datetime64" | "timestamp" => Ok(ColumnKind::Timestamp),
            "category" => Ok(ColumnKind::Category),
            "int" | "int64" | "integer" => Ok(ColumnKind::Integer),
            "float" | "float64" | "double" => Ok(ColumnKind::Float),
            "str" | "string" | "object" | "text" => Ok(ColumnKind::Text),
            other => Err(PipelineError::Conversion {
                column: String::new(),
                target: other.to_string(),
                reason: "unsupported type tag".to_string(),
            }),
        }
    }
}

/// Convert columns to the kinds named in `type_map` (column → type tag).
///
/// Absent columns are skipped with a warning and an unknown tag is logged as a
/// conversion failure for that column alone. Individual values that cannot be
/// converted become null.
pub fn convert_types(mut records: RecordSet, type_map: &IndexMap<String, String>) -> RecordSet {
    log::info!("Converting data types");

    for (name, tag) in type_map {
        let Some(slot) = records.column_mut(name) else {
            log::warn!("Column {} not found, skipping", name);
            continue;
        };
        let target = match tag.parse::<ColumnKind>() {
            Ok(kind) => kind,
            Err(PipelineError::Conversion { target, reason, .. }) => {
                let err = PipelineError::Conversion {
                    column: name.clone(),
                    target,
                    reason,
                };
                log::error!("{}", err);
                continue;
            }
            Err(err) => {
                log::error!("{}", err);
                continue;
            }
        };

        let before = slot.len() - slot.null_count();
        let converted = convert_column(slot, target);
        let lost = before.saturating_sub(converted.len() - converted.null_count());
        if lost > 0 {
            log::warn!(
                "{} value(s) in {} could not be converted to {} and were nulled",
                lost,
                name,
                target
            );
        }
        *slot = converted;
        log::info!("Converted {} to {}", name, tag);
    }

    records
}

/// Convert one column to `target`, nulling values that do not convert
pub fn convert_column(column: &Column, target: ColumnKind) -> Column {
    if column.kind() == target {
        return column.clone();
    }
    let values = column
        .values()
        .iter()
        .map(|value| convert_value(value, target))
        .collect();
    Column::new(target, values)
}

fn convert_value(value: &Value, target: ColumnKind) -> Value {
    match (target, value) {
        (_, Value::Null) => Value::Null,
        (ColumnKind::Text | ColumnKind::Category, v) => Value::Text(v.to_string()),

        (ColumnKind::Integer, Value::Integer(i)) => Value::Integer(*i),
        (ColumnKind::Integer, Value::Float(f)) => float_to_integer(*f),
        (ColumnKind::Integer, Value::Text(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => s.parse::<f64>().map_or(Value::Null, float_to_integer),
            }
        }
        (ColumnKind::Integer, Value::Timestamp(t)) => Value::Integer(t.and_utc().timestamp()),

        (ColumnKind::Float, Value::Integer(i)) => Value::Float(*i as f64),
        (ColumnKind::Float, Value::Float(f)) => Value::Float(*f),
        (ColumnKind::Float, Value::Text(s)) => {
            s.trim().parse::<f64>().map_or(Value::Null, Value::Float)
        }
        (ColumnKind::Float, Value::Timestamp(t)) => {
            Value::Float(t.and_utc().timestamp_micros() as f64 / 1_000_000.0)
        }

        (ColumnKind::Timestamp, Value::Timestamp(t)) => Value::Timestamp(*t),
        (ColumnKind::Timestamp, Value::Text(s)) => parse_timestamp(s).into(),
        (ColumnKind::Timestamp, Value::Integer(secs)) => from_unix(*secs, 0).into(),
        (ColumnKind::Timestamp, Value::Float(secs)) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            from_unix(whole as i64, nanos.min(999_999_999)).into()
        }
        (ColumnKind::Timestamp, Value::Float(_)) => Value::Null,
    }
}

fn float_to_integer(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Value::Integer(f as i64)
    } else {
        Value::Null
    }
}

fn from_unix(secs: i64, nanos: u32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordSet {
        RecordSet::from_columns([
            ("date", Column::texts([Some("2024-01-15"), Some("not a date"), None])),
            ("qty", Column::texts([Some("3"), Some("4.0"), Some("x")])),
            ("price", Column::integers([Some(10), Some(20), None])),
            ("region", Column::texts([Some("north"), Some("south"), Some("north")])),
        ])
        .unwrap()
    }

    fn map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_type_tags() {
        assert_eq!("datetime".parse::<ColumnKind>().unwrap(), ColumnKind::Timestamp);
        assert_eq!("Int64".parse::<ColumnKind>().unwrap(), ColumnKind::Integer);
        assert_eq!("object".parse::<ColumnKind>().unwrap(), ColumnKind::Text);
        assert!("complex128".parse::<ColumnKind>().is_err());
    }

    #[test]
    fn test_convert_types() {
        let converted = convert_types(
            sample(),
            &map(&[
                ("date", "datetime"),
                ("qty", "int"),
                ("price", "float"),
                ("region", "category"),
            ]),
        );

        let date = converted.column("date").unwrap();
        assert_eq!(date.kind(), ColumnKind::Timestamp);
        assert_eq!(
            date.get(0),
            Some(&Value::Timestamp(
                chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            ))
        );
        assert_eq!(date.get(1), Some(&Value::Null));

        let qty = converted.column("qty").unwrap();
        assert_eq!(
            qty.values(),
            &[Value::Integer(3), Value::Integer(4), Value::Null]
        );

        assert_eq!(converted.column("price").unwrap().get(0), Some(&Value::Float(10.0)));
        assert_eq!(converted.column("region").unwrap().kind(), ColumnKind::Category);
    }

    #[test]
    fn test_missing_column_and_bad_tag_are_isolated() {
        let converted = convert_types(
            sample(),
            &map(&[("nope", "int"), ("qty", "complex128"), ("price", "float")]),
        );
        assert_eq!(converted.column("qty").unwrap().kind(), ColumnKind::Text);
        assert_eq!(converted.column("price").unwrap().kind(), ColumnKind::Float);
        assert_eq!(converted.column_names(), sample().column_names());
    }

    #[test]
    fn test_unix_seconds() {
        let column = Column::integers([Some(0), Some(86_400)]);
        let converted = convert_column(&column, ColumnKind::Timestamp);
        assert_eq!(converted.get(1).unwrap().to_string(), "1970-01-02 00:00:00");
    }

    #[test]
    fn test_fractional_float_to_integer_is_null() {
        let column = Column::floats([Some(2.0), Some(2.5)]);
        let converted = convert_column(&column, ColumnKind::Integer);
        assert_eq!(converted.values(), &[Value::Integer(2), Value::Null]);
    }

    #[test]
    fn test_float_out_of_integer_range_is_null() {
        let two_pow_63 = 9_223_372_036_854_775_808.0;
        let column = Column::floats([Some(two_pow_63), Some(-two_pow_63), Some(f64::MAX)]);
        let converted = convert_column(&column, ColumnKind::Integer);
        assert_eq!(
            converted.values(),
            &[Value::Null, Value::Integer(i64::MIN), Value::Null]
        );
    }
}
