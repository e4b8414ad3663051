//! Paginated JSON extraction over HTTP
//!
//! [`ApiExtractor`] fetches one page at a time, retrying each page with
//! exponential backoff, and follows the pagination signals of every body until
//! the source reports its last page.

use super::shape::{Pagination, ResponseShape};
use crate::error::PipelineError;
use crate::record::RecordSet;
use eyre::{Context, Result};
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use reqwest::{Client, Method};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// One extraction call: endpoint, query parameters and method.
///
/// The parameters are the starting cursor state; pagination derives the
/// parameters of every following page from them.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub endpoint: String,
    pub params: IndexMap<String, String>,
    pub method: Method,
}

impl ExtractionRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: IndexMap::new(),
            method: Method::GET,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: IndexMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// HTTP extractor for paginated JSON collections.
///
/// # Example
/// ```no_run
/// use tabular_etl::extract::{ApiExtractor, ExtractionRequest};
/// use std::time::Duration;
///
/// # async fn example() -> eyre::Result<()> {
/// let extractor = ApiExtractor::try_new("https://api.example.com/v1", Some("secret"))?
///     .with_timeout(Duration::from_secs(10))?
///     .with_max_retries(5);
///
/// let request = ExtractionRequest::new("weather").with_param("city", "London");
/// let records = extractor.extract_request(&request).await?;
/// println!("Fetched {} rows", records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ApiExtractor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    max_retries: u32,
    backoff_unit: Duration,
    max_pages: Option<usize>,
}

impl ApiExtractor {
    /// Create an extractor for `base_url`.
    ///
    /// When `api_key` is set every request carries an
    /// `Authorization: Bearer <key>` header.
    ///
    /// # Errors
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be built
    pub fn try_new(base_url: &str, api_key: Option<&str>) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;
        let api_key = api_key.map(str::to_string);
        Ok(Self {
            client: build_client(api_key.as_deref(), DEFAULT_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            max_pages: None,
        })
    }

    /// Set the per-request timeout; an elapsed timeout counts as a failed attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(self.api_key.as_deref(), timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Total attempts per page (at least one)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Base of the exponential backoff: attempt `n` waits `unit * 2^n`
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Stop following pagination after this many pages
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Resolve `{base_url}/{endpoint}`
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        let endpoint = endpoint.trim_start_matches('/');
        let raw = if endpoint.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, endpoint)
        };
        Url::parse(&raw).with_context(|| format!("Invalid endpoint URL: {}", raw))
    }

    /// Fetch every page of `endpoint` and return the merged records
    pub async fn extract(
        &self,
        endpoint: &str,
        params: IndexMap<String, String>,
        method: Method,
    ) -> Result<RecordSet> {
        let request = ExtractionRequest::new(endpoint)
            .with_params(params)
            .with_method(method);
        self.extract_request(&request).await
    }

    pub async fn extract_request(&self, request: &ExtractionRequest) -> Result<RecordSet> {
        let records = self.fetch_records(request).await?;
        Ok(RecordSet::from_json_records(&records))
    }

    /// Fetch every page and return the raw JSON records in page order
    pub async fn fetch_records(&self, request: &ExtractionRequest) -> Result<Vec<serde_json::Value>> {
        let url = self.endpoint_url(&request.endpoint)?;
        log::info!("Extracting from {}", url.as_str().bright_blue());

        let mut records = Vec::new();
        let mut params = request.params.clone();
        let mut pages = 0usize;
        loop {
            let body = self.fetch_page(&url, &request.method, &params).await?;
            pages += 1;

            let page = ResponseShape::resolve(&body).into_records();
            log::debug!("Page {} returned {} record(s)", pages, page.len());
            records.extend(page);

            let pagination = Pagination::resolve(&body);
            if !pagination.has_next {
                break;
            }
            if let Some(max_pages) = self.max_pages
                && pages >= max_pages
            {
                log::warn!(
                    "Stopping pagination of {} at the {} page limit",
                    url,
                    max_pages
                );
                break;
            }
            match pagination.next_params(&params) {
                Some(next) => params = next,
                None => {
                    log::warn!(
                        "{} reports another page but carries no page or offset field, stopping",
                        url
                    );
                    break;
                }
            }
        }

        log::info!(
            "Extracted {} record(s) in {} page(s) from {}",
            records.len(),
            pages,
            url
        );
        Ok(records)
    }

    /// Fetch every page and write the records to `path` as a pretty JSON array.
    ///
    /// Returns the number of records written.
    pub async fn extract_to_file(
        &self,
        request: &ExtractionRequest,
        path: impl AsRef<Path>,
    ) -> Result<usize> {
        let path = path.as_ref();
        let records = self.fetch_records(request).await?;
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!(
            "Saved {} record(s) to {}",
            records.len(),
            path.display().bright_black()
        );
        Ok(records.len())
    }

    /// Wait before retrying after failed attempt `attempt` (counted from 0)
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Fetch one page, retrying transport errors, timeouts and non-2xx statuses
    async fn fetch_page(
        &self,
        url: &Url,
        method: &Method,
        params: &IndexMap<String, String>,
    ) -> Result<serde_json::Value> {
        let mut attempt = 0u32;
        let bytes = loop {
            match self.send(url, method, params).await {
                Ok(bytes) => break bytes,
                Err(err) if attempt + 1 < self.max_retries => {
                    let wait = self.backoff_delay(attempt);
                    log::warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt + 1,
                        self.max_retries,
                        url,
                        err,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    log::error!(
                        "All {} attempt(s) for {} failed",
                        self.max_retries,
                        url.as_str().red()
                    );
                    return Err(PipelineError::RequestExhausted {
                        url: url.to_string(),
                        attempts: self.max_retries,
                        source: err,
                    }
                    .into());
                }
            }
        };

        serde_json::from_slice(&bytes).map_err(|err| {
            PipelineError::MalformedResponse {
                url: url.to_string(),
                reason: err.to_string(),
            }
            .into()
        })
    }

    async fn send(
        &self,
        url: &Url,
        method: &Method,
        params: &IndexMap<String, String>,
    ) -> std::result::Result<Vec<u8>, reqwest::Error> {
        let response = self
            .client
            .request(method.clone(), url.clone())
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn build_client(api_key: Option<&str>, timeout: Duration) -> Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(reqwest::header::ACCEPT, "application/json".parse()?);
    if let Some(key) = api_key {
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", key)
                .parse()
                .with_context(|| "API key is not a valid header value")?,
        );
    }
    let client = Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}
