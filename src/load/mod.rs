//! Relational sink loading
//!
//! [`DatabaseLoader`] writes record sets under one of three strategies, each in
//! a single transaction. [`TableLoader`] binds a loader to a configured target
//! for the pipeline's LOAD stage.

mod database;
mod dialect;

pub use database::DatabaseLoader;
pub use dialect::{Dialect, MAX_BIND_PARAMS, quote};

use crate::error::PipelineError;
use crate::etl::Loader;
use crate::record::RecordSet;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Write discipline used when materializing a record set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Insert every row, creating the table if missing
    #[default]
    Append,
    /// Drop and recreate the table with the record set's schema and rows
    Replace,
    /// Insert, updating non-key columns of rows whose key already exists
    Upsert,
}

impl FromStr for LoadStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(LoadStrategy::Append),
            "replace" => Ok(LoadStrategy::Replace),
            "upsert" => Ok(LoadStrategy::Upsert),
            _ => Err(PipelineError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStrategy::Append => "append",
            LoadStrategy::Replace => "replace",
            LoadStrategy::Upsert => "upsert",
        };
        write!(f, "{}", name)
    }
}

/// Target and write options of one load call
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSpec {
    pub table_name: String,
    pub schema: String,
    pub strategy: LoadStrategy,
    pub batch_size: usize,
    /// Conflict key for upserts; empty means the first column
    pub key_columns: Vec<String>,
    /// Columns indexed after a successful load
    pub index_columns: Vec<String>,
}

impl LoadSpec {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            strategy: LoadStrategy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            key_columns: Vec::new(),
            index_columns: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_key_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.index_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// [`Loader`] that writes every record set to one configured table.
///
/// The strategy is kept as text and parsed on each load, so a misconfigured
/// strategy fails the LOAD stage with
/// [`PipelineError::UnknownStrategy`].
pub struct TableLoader {
    database: DatabaseLoader,
    spec: LoadSpec,
    strategy: String,
}

impl TableLoader {
    pub fn new(database: DatabaseLoader, spec: LoadSpec, strategy: impl Into<String>) -> Self {
        Self {
            database,
            spec,
            strategy: strategy.into(),
        }
    }

    pub fn database(&self) -> &DatabaseLoader {
        &self.database
    }

    pub fn spec(&self) -> &LoadSpec {
        &self.spec
    }
}

impl Loader for TableLoader {
    async fn load(&self, records: RecordSet) -> Result<usize> {
        let strategy: LoadStrategy = self.strategy.parse()?;
        let spec = self.spec.clone().with_strategy(strategy);
        self.database.load(&records, &spec).await
    }
}
