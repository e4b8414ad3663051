//! Core ETL (Extract, Transform, Load) abstractions
//!
//! Trait definitions for the three stages plus the [`Pipeline`] that drives
//! them through one run and reports a [`RunSummary`].

mod extract;
mod load;
mod pipeline;
mod summary;
mod transform;

pub use extract::Extractor;
pub use load::Loader;
pub use pipeline::{ConfiguredPipeline, Pipeline, SOURCE_COLUMN, SourceSelection};
pub use summary::{RunContext, RunSummary, Stage};
pub use transform::{IdentityTransformer, Transformer};
