//! Extraction from flat files and REST APIs
//!
//! [`FileExtractor`] and [`ApiExtractor`] are usable on their own.
//! [`FileSource`] and [`ApiSource`] bind them to concrete inputs so the
//! pipeline can drive them through the [`Extractor`](crate::etl::Extractor) trait.

mod api;
mod encoding;
mod file;
mod shape;

pub use api::{
    ApiExtractor, DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, ExtractionRequest,
};
pub use encoding::{DecodingReader, SAMPLE_SIZE, detect_encoding};
pub use file::{FileExtractor, FileInfo, SOURCE_FILE_COLUMN, TypeHints, validate_schema};
pub use shape::{CONTAINER_KEYS, Cursor, DEFAULT_LIMIT, Pagination, ResponseShape};

use crate::etl::Extractor;
use crate::record::RecordSet;
use eyre::{Result, WrapErr};
use std::path::PathBuf;

/// A fixed list of delimited files read with one [`FileExtractor`]
#[derive(Debug, Clone)]
pub struct FileSource {
    extractor: FileExtractor,
    files: Vec<PathBuf>,
}

impl FileSource {
    pub fn new(extractor: FileExtractor, files: Vec<PathBuf>) -> Self {
        Self { extractor, files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Extractor for FileSource {
    fn source_name(&self) -> &str {
        "csv"
    }

    /// Reads the files on the blocking pool
    async fn extract(&self) -> Result<RecordSet> {
        let extractor = self.extractor.clone();
        let files = self.files.clone();
        tokio::task::spawn_blocking(move || extractor.extract_multiple(files.as_slice(), None))
            .await
            .wrap_err("File extraction task failed")?
    }
}

/// One API request bound to an [`ApiExtractor`]
#[derive(Debug, Clone)]
pub struct ApiSource {
    extractor: ApiExtractor,
    request: ExtractionRequest,
}

impl ApiSource {
    pub fn new(extractor: ApiExtractor, request: ExtractionRequest) -> Self {
        Self { extractor, request }
    }

    pub fn request(&self) -> &ExtractionRequest {
        &self.request
    }
}

impl Extractor for ApiSource {
    fn source_name(&self) -> &str {
        "api"
    }

    async fn extract(&self) -> Result<RecordSet> {
        self.extractor.extract_request(&self.request).await
    }
}
