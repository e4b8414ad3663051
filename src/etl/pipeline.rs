//! Pipeline orchestration: EXTRACT → TRANSFORM → LOAD → NOTIFY

use super::summary::{RunContext, RunSummary, Stage};
use super::{Extractor, Loader, Transformer};
use crate::config::{OutputConfig, PipelineConfig};
use crate::error::PipelineError;
use crate::extract::{ApiSource, FileSource};
use crate::load::TableLoader;
use crate::record::{Column, ColumnKind, RecordSet, Value};
use crate::transform::StandardTransform;
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Instant;

/// Column tagging every extracted row with the extractor it came from
pub const SOURCE_COLUMN: &str = "source";

/// Which configured extractors take part in a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceSelection {
    Csv,
    Api,
    #[default]
    All,
}

impl SourceSelection {
    pub fn includes_csv(self) -> bool {
        matches!(self, SourceSelection::Csv | SourceSelection::All)
    }

    pub fn includes_api(self) -> bool {
        matches!(self, SourceSelection::Api | SourceSelection::All)
    }
}

/// The pipeline assembled from a [`PipelineConfig`]
pub type ConfiguredPipeline = Pipeline<FileSource, ApiSource, StandardTransform, TableLoader>;

/// ETL pipeline running up to two extractors, one transformer and one loader
///
/// # Type Parameters
/// - `F`: file extractor
/// - `A`: API extractor
/// - `T`: transformer from the merged extraction to the loaded record set
/// - `L`: loader
///
/// # Example
/// ```no_run
/// use tabular_etl::config::PipelineConfig;
/// use tabular_etl::etl::{ConfiguredPipeline, RunContext, SourceSelection};
///
/// # async fn example() -> eyre::Result<()> {
/// let config = PipelineConfig::load("config/pipeline.yaml")?;
/// let mut pipeline =
///     ConfiguredPipeline::from_config(&config, RunContext::generate(), SourceSelection::All)?;
///
/// if !pipeline.run().await {
///     eprintln!("Run failed: {:?}", pipeline.summary().error);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<F, A, T, L> {
    context: RunContext,
    file_source: Option<F>,
    api_source: Option<A>,
    transformer: T,
    loader: L,
    output: OutputConfig,
    summary: RunSummary,
}

impl ConfiguredPipeline {
    /// Build the sources, transform and loader named by `config`.
    ///
    /// A source that is selected but not configured, or whose settings are
    /// invalid, is skipped with a log line; the run then reports the empty
    /// extraction if nothing else contributes.
    ///
    /// # Errors
    /// Returns an error if the sink connection string is unusable
    pub fn from_config(
        config: &PipelineConfig,
        context: RunContext,
        selection: SourceSelection,
    ) -> Result<Self> {
        let transformer = config.transform.standard_transform(context.run_id());
        let loader = config.load.database.table_loader()?;
        let mut pipeline = Pipeline::new(context, transformer, loader)
            .with_output(config.output.clone());

        if selection.includes_csv() {
            if !config.extract.csv.is_configured() {
                log::warn!("No CSV files configured, skipping CSV extraction");
            } else {
                match config.extract.csv.source() {
                    Ok(source) => pipeline = pipeline.with_file_source(source),
                    Err(e) => log::error!("Invalid CSV source settings: {:#}", e),
                }
            }
        }

        if selection.includes_api() {
            if !config.extract.api.is_configured() {
                log::warn!("No API base URL configured, skipping API extraction");
            } else {
                match config.extract.api.source() {
                    Ok(source) => pipeline = pipeline.with_api_source(source),
                    Err(e) => log::error!("Invalid API source settings: {:#}", e),
                }
            }
        }

        Ok(pipeline)
    }
}

impl<F, A, T, L> Pipeline<F, A, T, L>
where
    F: Extractor,
    A: Extractor,
    T: Transformer<Input = RecordSet, Output = RecordSet>,
    L: Loader,
{
    /// Create a pipeline with no sources and no snapshot output
    pub fn new(context: RunContext, transformer: T, loader: L) -> Self {
        let summary = RunSummary::start(context.run_id());
        Self {
            context,
            file_source: None,
            api_source: None,
            transformer,
            loader,
            output: OutputConfig::default(),
            summary,
        }
    }

    pub fn with_file_source(mut self, source: F) -> Self {
        self.file_source = Some(source);
        self
    }

    pub fn with_api_source(mut self, source: A) -> Self {
        self.api_source = Some(source);
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Summary of the latest run
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Run every stage once.
    ///
    /// Never fails: every failure is logged, recorded in the
    /// [`RunSummary`] and reported as `false`.
    pub async fn run(&mut self) -> bool {
        let started = Instant::now();
        self.summary = RunSummary::start(self.context.run_id());
        log::info!("Starting ETL pipeline run {}", self.context.run_id().cyan());

        let error = match self.execute().await {
            Ok(()) => None,
            Err(e) => {
                log::error!(
                    "Pipeline aborted during {}: {:#}",
                    self.summary.stage.to_string().red(),
                    e
                );
                Some(format!("{:#}", e))
            }
        };
        self.summary.finish(started.elapsed(), error);
        self.notify();
        self.summary.success
    }

    async fn execute(&mut self) -> Result<()> {
        self.summary.stage = Stage::Extract;
        let raw = self.extract().await?;
        self.summary.rows_extracted = raw.len();
        self.snapshot(&raw, self.output.raw_dir.as_deref(), "raw");

        self.summary.stage = Stage::Transform;
        log::info!("Transforming {} rows", raw.len());
        let processed = self.transformer.transform(raw)?;
        self.summary.rows_transformed = processed.len();
        log::info!("Transformation complete: {} rows", processed.len());
        self.snapshot(&processed, self.output.processed_dir.as_deref(), "processed");

        self.summary.stage = Stage::Load;
        let loaded = self.loader.load(processed).await?;
        self.summary.rows_loaded = loaded;

        self.summary.stage = Stage::Notify;
        Ok(())
    }

    /// Run the selected extractors concurrently and merge what they return
    async fn extract(&self) -> Result<RecordSet> {
        log::info!("Extracting data");
        let (files, api) = tokio::join!(
            extract_tagged(self.file_source.as_ref()),
            extract_tagged(self.api_source.as_ref()),
        );

        let merged = RecordSet::concat([files, api].into_iter().flatten().collect());
        if merged.is_empty() {
            return Err(PipelineError::EmptyResult("no data extracted".to_string()).into());
        }
        log::info!("Extraction complete: {} rows", merged.len());
        Ok(merged)
    }

    fn snapshot(&self, records: &RecordSet, dir: Option<&Path>, label: &str) {
        let Some(dir) = dir else {
            return;
        };
        let path = dir.join(format!("{}_{}.csv", label, self.context.run_id()));
        let written = std::fs::create_dir_all(dir)
            .map_err(eyre::Report::from)
            .and_then(|()| records.write_csv(&path));
        match written {
            Ok(()) => log::info!("Saved {} snapshot to {}", label, path.display().bright_black()),
            Err(e) => log::warn!("Failed to save {} snapshot: {:#}", label, e),
        }
    }

    fn notify(&self) {
        let summary = &self.summary;
        if summary.success {
            log::info!("{}", "=".repeat(50));
            log::info!("Pipeline run {} {}", summary.run_id, "SUCCEEDED".green());
            log::info!("  Rows extracted:   {}", summary.rows_extracted);
            log::info!("  Rows transformed: {}", summary.rows_transformed);
            log::info!("  Rows loaded:      {}", summary.rows_loaded);
            log::info!("  Duration:         {:.2}s", summary.duration_secs);
            log::info!("{}", "=".repeat(50));
        } else {
            log::error!(
                "Pipeline run {} {} after {:.2}s",
                summary.run_id,
                "FAILED".red(),
                summary.duration_secs
            );
        }

        if let Some(path) = &self.output.summary_path {
            match summary.write(path) {
                Ok(()) => log::debug!("Run summary written to {}", path.display()),
                Err(e) => log::warn!("Failed to write run summary: {:#}", e),
            }
        }
    }
}

/// Extract from one source and tag its rows; failures are logged and yield nothing
async fn extract_tagged<E: Extractor>(source: Option<&E>) -> Option<RecordSet> {
    let source = source?;
    let name = source.source_name();
    match source.extract().await {
        Ok(mut records) => {
            if records.is_empty() {
                log::warn!("No records extracted from {}", name);
                return None;
            }
            let tag = Column::new(ColumnKind::Text, vec![Value::from(name); records.len()]);
            if let Err(e) = records.set_column(SOURCE_COLUMN, tag) {
                log::warn!("Failed to tag rows from {}: {}", name, e);
            }
            log::info!("Extracted {} rows from {}", records.len(), name.bright_blue());
            Some(records)
        }
        Err(e) => {
            log::error!("Extraction from {} failed: {:#}", name, e);
            None
        }
    }
}
