//! Column name standardization

use crate::record::RecordSet;
use eyre::Result;
use std::collections::HashMap;

/// Rename columns: explicit renames first, then lowercase, then spaces to
/// underscores.
///
/// Renames naming an absent column are ignored. Applying the same flags twice
/// gives the same names as applying them once.
///
/// # Errors
/// [`PipelineError::DuplicateColumn`](crate::error::PipelineError::DuplicateColumn)
/// if two columns end up with the same name
///
/// # Example
/// ```
/// use tabular_etl::record::{Column, RecordSet};
/// use tabular_etl::transform::standardize_columns;
///
/// let records = RecordSet::from_columns([
///     ("Order ID", Column::integers([Some(1)])),
/// ]).unwrap();
/// let records = standardize_columns(records, None, true, true).unwrap();
/// assert_eq!(records.column_names(), vec!["order_id"]);
/// ```
pub fn standardize_columns(
    mut records: RecordSet,
    rename_map: Option<&HashMap<String, String>>,
    lowercase: bool,
    replace_spaces: bool,
) -> Result<RecordSet> {
    log::info!("Standardizing column names");

    let names: Vec<String> = records
        .column_names()
        .into_iter()
        .map(|name| {
            let mut name = rename_map
                .and_then(|map| map.get(name))
                .map_or_else(|| name.to_string(), Clone::clone);
            if lowercase {
                name = name.to_lowercase();
            }
            if replace_spaces {
                name = name.replace(' ', "_");
            }
            name
        })
        .collect();

    records.rename_all(names)?;
    log::info!("Columns standardized: {:?}", records.column_names());
    Ok(records)
}
