//! Delimited file extraction

use super::encoding::{DecodingReader, SAMPLE_SIZE, detect_encoding};
use crate::error::PipelineError;
use crate::record::{Column, ColumnKind, RecordSet, Value, parse_timestamp};
use eyre::{Context, Result, eyre};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Column name → kind overrides applied while reading
pub type TypeHints = HashMap<String, ColumnKind>;

/// Cell spellings read as null
const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NULL", "null", "NaN", "nan", "None"];

/// Name of the column tagging each row with the file it came from
pub const SOURCE_FILE_COLUMN: &str = "source_file";

/// Extractor for delimited text files
///
/// # Example
/// ```no_run
/// use tabular_etl::extract::FileExtractor;
///
/// # fn example() -> eyre::Result<()> {
/// let extractor = FileExtractor::new().with_chunk_size(10_000);
/// let records = extractor.extract("data/raw/sales.csv", None, None)?;
/// println!("{} rows", records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileExtractor {
    delimiter: u8,
    encoding: Option<&'static encoding_rs::Encoding>,
    chunk_size: Option<usize>,
}

impl Default for FileExtractor {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: None,
            chunk_size: None,
        }
    }
}

/// Summary of a delimited file, gathered without a full extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub file_name: String,
    pub size_bytes: u64,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub kinds: Vec<ColumnKind>,
}

impl FileExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter (default `,`)
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Force an encoding by label (e.g. `latin1`, `utf-16le`) instead of detecting it
    pub fn with_encoding(mut self, label: &str) -> Result<Self> {
        let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| eyre!("Unknown encoding label: {}", label))?;
        self.encoding = Some(encoding);
        Ok(self)
    }

    /// Read in chunks of `rows` rows to bound memory use
    pub fn with_chunk_size(mut self, rows: usize) -> Self {
        self.chunk_size = Some(rows.max(1));
        self
    }

    /// Extract a delimited file into a record set
    ///
    /// # Arguments
    /// * `path` - File to read
    /// * `columns` - Optional projection; every listed column must exist
    /// * `type_hints` - Optional kinds forced on named columns
    ///
    /// # Errors
    /// - [`PipelineError::NotFound`] if the file does not exist
    /// - [`PipelineError::MissingColumns`] if a projected column is absent
    /// - I/O and CSV parse errors
    pub fn extract(
        &self,
        path: impl AsRef<Path>,
        columns: Option<&[&str]>,
        type_hints: Option<&TypeHints>,
    ) -> Result<RecordSet> {
        let path = path.as_ref();
        log::info!("Starting extraction from {}", path.display());

        if !path.exists() {
            return Err(PipelineError::NotFound(format!("File not found: {}", path.display())).into());
        }

        let encoding = match self.encoding {
            Some(encoding) => encoding,
            None => self.detect_encoding(path)?,
        };
        log::debug!("Reading {} as {}", path.display(), encoding.name());

        let records = match self.chunk_size {
            Some(chunk_size) => self.read_in_chunks(path, encoding, columns, type_hints, chunk_size)?,
            None => self.read_all(path, encoding, columns, type_hints)?,
        };

        log::info!(
            "Extraction completed. Rows: {}, Columns: {}",
            records.len(),
            records.column_count()
        );
        Ok(records)
    }

    /// Guess a file's encoding from its first bytes
    pub fn detect_encoding(&self, path: &Path) -> Result<&'static encoding_rs::Encoding> {
        let mut sample = Vec::with_capacity(SAMPLE_SIZE);
        File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .take(SAMPLE_SIZE as u64)
            .read_to_end(&mut sample)?;
        let complete = sample.len() < SAMPLE_SIZE;
        let encoding = detect_encoding(&sample, complete);
        log::info!("Detected encoding: {}", encoding.name());
        Ok(encoding)
    }

    fn open(
        &self,
        path: &Path,
        encoding: &'static encoding_rs::Encoding,
    ) -> Result<csv::Reader<DecodingReader<BufReader<File>>>> {
        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        Ok(csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_reader(DecodingReader::new(BufReader::new(file), encoding)))
    }

    fn read_all(
        &self,
        path: &Path,
        encoding: &'static encoding_rs::Encoding,
        columns: Option<&[&str]>,
        type_hints: Option<&TypeHints>,
    ) -> Result<RecordSet> {
        let mut reader = self.open(path, encoding)?;
        let layout = Layout::resolve(reader.headers()?, columns)?;

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); layout.names.len()];
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Failed to parse row in {}", path.display()))?;
            layout.push_row(&record, &mut cells);
        }

        let kinds = layout.kinds(type_hints, |i| {
            let mut sniffer = KindSniffer::default();
            cells[i].iter().flatten().for_each(|cell| sniffer.observe(cell));
            sniffer.kind()
        });
        layout.build(&kinds, cells)
    }

    /// Two passes: the first settles every column's kind, the second parses
    /// chunk by chunk with those kinds, so the result matches [`Self::read_all`].
    fn read_in_chunks(
        &self,
        path: &Path,
        encoding: &'static encoding_rs::Encoding,
        columns: Option<&[&str]>,
        type_hints: Option<&TypeHints>,
        chunk_size: usize,
    ) -> Result<RecordSet> {
        log::info!("Reading file in chunks of {} rows", chunk_size);

        let mut reader = self.open(path, encoding)?;
        let layout = Layout::resolve(reader.headers()?, columns)?;
        let mut sniffers = vec![KindSniffer::default(); layout.names.len()];
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Failed to parse row in {}", path.display()))?;
            for (sniffer, &index) in sniffers.iter_mut().zip(&layout.indices) {
                if let Some(cell) = record.get(index).filter(|cell| !is_null_token(cell)) {
                    sniffer.observe(cell);
                }
            }
        }
        let kinds = layout.kinds(type_hints, |i| sniffers[i].kind());

        let mut reader = self.open(path, encoding)?;
        reader.headers()?;
        let mut chunks = Vec::new();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); layout.names.len()];
        let mut buffered = 0;
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Failed to parse row in {}", path.display()))?;
            layout.push_row(&record, &mut cells);
            buffered += 1;
            if buffered == chunk_size {
                let full = std::mem::replace(&mut cells, vec![Vec::new(); layout.names.len()]);
                chunks.push(layout.build(&kinds, full)?);
                buffered = 0;
            }
        }
        if buffered > 0 || chunks.is_empty() {
            chunks.push(layout.build(&kinds, cells)?);
        }

        log::info!("Combined {} chunks", chunks.len());
        Ok(RecordSet::concat(chunks))
    }

    /// Extract several files into one record set.
    ///
    /// Each row is tagged with its file name in [`SOURCE_FILE_COLUMN`]. Files
    /// that fail to read are logged and skipped.
    ///
    /// # Errors
    /// [`PipelineError::EmptyResult`] if no file could be read
    pub fn extract_multiple<P: AsRef<Path>>(
        &self,
        paths: &[P],
        columns: Option<&[&str]>,
    ) -> Result<RecordSet> {
        log::info!("Extracting from {} files", paths.len());

        let mut sets = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match self.extract(path, columns, None) {
                Ok(mut records) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let tag = Column::texts(vec![Some(name); records.len()]);
                    records.set_column(SOURCE_FILE_COLUMN, tag)?;
                    sets.push(records);
                }
                Err(e) => {
                    log::warn!("Failed to extract {}: {}", path.display(), e);
                }
            }
        }

        if sets.is_empty() {
            return Err(PipelineError::EmptyResult(
                "No files were successfully extracted".to_string(),
            )
            .into());
        }

        let combined = RecordSet::concat(sets);
        log::info!("Combined extraction completed. Total rows: {}", combined.len());
        Ok(combined)
    }

    /// Describe a file: name, size, row count, header and sampled kinds
    pub fn file_info(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::NotFound(format!("File not found: {}", path.display())).into());
        }
        let encoding = match self.encoding {
            Some(encoding) => encoding,
            None => self.detect_encoding(path)?,
        };

        let mut reader = self.open(path, encoding)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut sniffers = vec![KindSniffer::default(); columns.len()];
        let mut row_count = 0;
        for record in reader.records() {
            let record = record?;
            if row_count < 5 {
                for (sniffer, cell) in sniffers.iter_mut().zip(record.iter()) {
                    if !is_null_token(cell) {
                        sniffer.observe(cell);
                    }
                }
            }
            row_count += 1;
        }

        let info = FileInfo {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: std::fs::metadata(path)?.len(),
            row_count,
            columns,
            kinds: sniffers.iter().map(KindSniffer::kind).collect(),
        };
        log::info!("File info: {:?}", info);
        Ok(info)
    }
}

/// True iff every expected column is present; extra columns are reported but tolerated
pub fn validate_schema(records: &RecordSet, expected_columns: &[&str]) -> bool {
    let missing: Vec<&str> = expected_columns
        .iter()
        .copied()
        .filter(|name| !records.has_column(name))
        .collect();
    let extra: Vec<&str> = records
        .column_names()
        .into_iter()
        .filter(|name| !expected_columns.contains(name))
        .collect();

    if !missing.is_empty() {
        log::error!("Missing columns: {:?}", missing);
        return false;
    }
    if !extra.is_empty() {
        log::warn!("Extra columns found: {:?}", extra);
    }
    log::info!("Schema validation passed");
    true
}

fn is_null_token(cell: &str) -> bool {
    NULL_TOKENS.contains(&cell.trim())
}

/// Which source fields become which output columns
struct Layout {
    names: Vec<String>,
    indices: Vec<usize>,
}

impl Layout {
    fn resolve(headers: &csv::StringRecord, columns: Option<&[&str]>) -> Result<Self> {
        // Repeated header names get a numeric suffix to stay unique
        let mut seen: HashMap<String, usize> = HashMap::new();
        let header: Vec<String> = headers
            .iter()
            .map(|name| {
                let count = seen.entry(name.to_string()).or_insert(0);
                *count += 1;
                match *count {
                    1 => name.to_string(),
                    n => format!("{}.{}", name, n - 1),
                }
            })
            .collect();

        match columns {
            None => Ok(Self {
                indices: (0..header.len()).collect(),
                names: header,
            }),
            Some(wanted) => {
                let missing: Vec<String> = wanted
                    .iter()
                    .filter(|w| !header.iter().any(|h| h.as_str() == **w))
                    .map(|w| w.to_string())
                    .collect();
                if !missing.is_empty() {
                    return Err(PipelineError::MissingColumns(missing).into());
                }
                // Projection keeps file order
                let (indices, names): (Vec<usize>, Vec<String>) = header
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| wanted.contains(&h.as_str()))
                    .map(|(i, h)| (i, h.clone()))
                    .unzip();
                Ok(Self { names, indices })
            }
        }
    }

    fn push_row(&self, record: &csv::StringRecord, cells: &mut [Vec<Option<String>>]) {
        for (column, &index) in cells.iter_mut().zip(&self.indices) {
            let cell = record
                .get(index)
                .filter(|cell| !is_null_token(cell))
                .map(str::to_string);
            column.push(cell);
        }
    }

    fn kinds(&self, hints: Option<&TypeHints>, mut sniff: impl FnMut(usize) -> ColumnKind) -> Vec<ColumnKind> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| match hints.and_then(|h| h.get(name)) {
                Some(kind) => *kind,
                None => sniff(i),
            })
            .collect()
    }

    fn build(&self, kinds: &[ColumnKind], cells: Vec<Vec<Option<String>>>) -> Result<RecordSet> {
        let mut records = RecordSet::new();
        for ((name, kind), raw) in self.names.iter().zip(kinds).zip(cells) {
            let values = raw
                .into_iter()
                .map(|cell| cell.map_or(Value::Null, |c| parse_cell(*kind, &c)))
                .collect();
            records.push_column(name.clone(), Column::new(*kind, values))?;
        }
        Ok(records)
    }
}

/// Narrowest kind that parses every non-null cell seen so far
#[derive(Debug, Clone)]
struct KindSniffer {
    integer: bool,
    float: bool,
}

impl Default for KindSniffer {
    fn default() -> Self {
        Self {
            integer: true,
            float: true,
        }
    }
}

impl KindSniffer {
    fn observe(&mut self, cell: &str) {
        let cell = cell.trim();
        if self.integer && cell.parse::<i64>().is_err() {
            self.integer = false;
        }
        if self.float && !self.integer && cell.parse::<f64>().is_err() {
            self.float = false;
        }
    }

    fn kind(&self) -> ColumnKind {
        match (self.integer, self.float) {
            (true, _) => ColumnKind::Integer,
            (false, true) => ColumnKind::Float,
            _ => ColumnKind::Text,
        }
    }
}

fn parse_cell(kind: ColumnKind, raw: &str) -> Value {
    let trimmed = raw.trim();
    match kind {
        ColumnKind::Integer => trimmed
            .parse::<i64>()
            .ok()
            .or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            })
            .map_or(Value::Null, Value::Integer),
        ColumnKind::Float => trimmed.parse::<f64>().map_or(Value::Null, Value::Float),
        ColumnKind::Timestamp => parse_timestamp(trimmed).map_or(Value::Null, Value::Timestamp),
        ColumnKind::Text | ColumnKind::Category => Value::Text(raw.to_string()),
    }
}
