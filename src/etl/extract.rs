//! Extractor trait for pulling record sets from sources

use crate::record::RecordSet;
use eyre::Result;

/// Extractor trait for extracting a record set from a source
///
/// Implementors define how to read one source, such as:
/// - Delimited files
/// - Paginated REST APIs
///
/// # Example
/// ```no_run
/// use tabular_etl::etl::Extractor;
/// use tabular_etl::record::RecordSet;
/// use eyre::Result;
///
/// struct EmptySource;
///
/// impl Extractor for EmptySource {
///     fn source_name(&self) -> &str {
///         "empty"
///     }
///
///     async fn extract(&self) -> Result<RecordSet> {
///         Ok(RecordSet::new())
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// Short label written to the `source` column of every extracted row
    fn source_name(&self) -> &str;

    /// Extract records from the source
    ///
    /// # Errors
    /// Returns an error if extraction fails (network, I/O, parsing, etc.)
    fn extract(&self) -> impl std::future::Future<Output = Result<RecordSet>> + Send;
}
