//! Record set transformations
//!
//! Every operation here is pure: it takes a record set and returns a new one
//! (or a report) without touching the network or the sink. Per-column and
//! per-derivation failures are logged and absorbed so a partially bad input
//! still produces output.

mod aggregate;
mod clean;
mod columns;
mod convert;
mod derive;
mod enrich;
mod standard;

pub use aggregate::{AggFunc, aggregate};
pub use clean::{DEFAULT_NULL_THRESHOLD, NullPolicy, UNKNOWN, clean};
pub use columns::standardize_columns;
pub use convert::{convert_column, convert_types};
pub use derive::{Check, Derivation, add_derived_columns, validate_data};
pub use enrich::{JoinKind, enrich_with_lookup};
pub use standard::{BATCH_ID_COLUMN, LOADED_AT_COLUMN, StandardTransform};
