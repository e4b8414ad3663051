//! Transformer trait for record set transformation

use eyre::Result;

/// Transformer trait for transforming a stage artifact
///
/// Implementors define how to transform the extracted records:
/// - Cleaning (duplicates, nulls)
/// - Renaming and type conversion
/// - Enrichment with run metadata
///
/// # Example
/// ```no_run
/// use tabular_etl::etl::Transformer;
/// use tabular_etl::record::RecordSet;
/// use eyre::Result;
///
/// struct ColumnDropper {
///     columns: Vec<String>,
/// }
///
/// impl Transformer for ColumnDropper {
///     type Input = RecordSet;
///     type Output = RecordSet;
///
///     fn transform(&self, mut input: Self::Input) -> Result<Self::Output> {
///         for column in &self.columns {
///             input.remove_column(column);
///         }
///         Ok(input)
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input artifact type
    type Input: Send;

    /// Output artifact type after transformation
    type Output: Send;

    /// Transform the input
    ///
    /// # Errors
    /// Returns an error if transformation fails (validation, conversion, etc.)
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;
}

/// Identity transformer that passes its input through unchanged
pub struct IdentityTransformer<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for IdentityTransformer<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> IdentityTransformer<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send + Sync> Transformer for IdentityTransformer<T> {
    type Input = T;
    type Output = T;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(input)
    }
}
