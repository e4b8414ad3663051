//! Tabular ETL
//!
//! A scheduled extract-transform-load pipeline for tabular records: delimited
//! files and paginated REST APIs are extracted concurrently, cleaned and
//! normalized, then written to PostgreSQL or SQLite under an append, replace
//! or upsert strategy.

pub mod config;
pub mod error;
pub mod etl;
pub mod extract;
pub mod load;
pub mod record;
pub mod transform;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use etl::{
    ConfiguredPipeline, Extractor, IdentityTransformer, Loader, Pipeline, RunContext, RunSummary,
    SourceSelection, Transformer,
};
pub use extract::{ApiExtractor, FileExtractor};
pub use load::{DatabaseLoader, LoadSpec, LoadStrategy};
pub use record::{Column, ColumnKind, RecordSet, Value};
