//! Loader trait for writing record sets to a sink

use crate::record::RecordSet;
use eyre::Result;

/// Loader trait for loading a record set into a destination
///
/// # Example
/// ```no_run
/// use tabular_etl::etl::Loader;
/// use tabular_etl::record::RecordSet;
/// use eyre::Result;
///
/// struct CountingLoader;
///
/// impl Loader for CountingLoader {
///     async fn load(&self, records: RecordSet) -> Result<usize> {
///         Ok(records.len())
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// Load records into the destination
    ///
    /// Returns the number of rows presented for loading
    ///
    /// # Errors
    /// Returns an error if loading fails; the destination is left as it was
    fn load(&self, records: RecordSet) -> impl std::future::Future<Output = Result<usize>> + Send;
}
