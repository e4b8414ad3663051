//! Run identity and per-run reporting

use chrono::{DateTime, Local, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Identity of one scheduled run, passed explicitly to every stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    run_id: String,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// Run identifier from the local clock (`YYYYMMDDHHMMSS`)
    pub fn generate() -> Self {
        Self::new(Local::now().format("%Y%m%d%H%M%S").to_string())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// States of the orchestrator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Extract,
    Transform,
    Load,
    Notify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
            Stage::Notify => "notify",
        };
        write!(f, "{}", name)
    }
}

/// Row counts and outcome of one run.
///
/// `stage` is the last stage entered: [`Stage::Notify`] for a successful run,
/// otherwise the stage the run aborted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub stage: Stage,
    pub rows_extracted: usize,
    pub rows_transformed: usize,
    pub rows_loaded: usize,
    pub success: bool,
    pub error: Option<String>,
}

impl RunSummary {
    pub fn start(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: 0.0,
            stage: Stage::Extract,
            rows_extracted: 0,
            rows_transformed: 0,
            rows_loaded: 0,
            success: false,
            error: None,
        }
    }

    pub(crate) fn finish(&mut self, duration: Duration, error: Option<String>) {
        self.finished_at = Some(Utc::now());
        self.duration_secs = duration.as_secs_f64();
        self.success = error.is_none();
        self.error = error;
    }

    /// Persist as pretty JSON, creating parent directories
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run summary: {}", path.display()))?;
        Ok(())
    }
}
