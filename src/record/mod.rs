//! Tabular record sets
//!
//! The record set is the unit of data handed from one pipeline stage to the
//! next. Each column carries a [`ColumnKind`] decided when the column is built,
//! so downstream operations never re-inspect individual values to learn a type.

mod column;
mod set;
mod value;

pub use column::Column;
pub use set::RecordSet;
pub use value::{ColumnKind, TIMESTAMP_FORMAT, Value, parse_timestamp};
