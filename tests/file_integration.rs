//! Integration tests for delimited file extraction and cleaning

use std::collections::HashMap;
use std::fs;
use tabular_etl::error::PipelineError;
use tabular_etl::etl::Extractor;
use tabular_etl::extract::{FileExtractor, FileSource, SOURCE_FILE_COLUMN, validate_schema};
use tabular_etl::record::{ColumnKind, Value};
use tabular_etl::transform::{DEFAULT_NULL_THRESHOLD, NullPolicy, clean};
use tempfile::TempDir;

const SALES: &str = "id,amount,region\n1,10.0,north\n2,20.0,south\n2,20.0,south\n3,,east\n";

fn write(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_duplicates_and_null_median_fill() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "sales.csv", SALES.as_bytes());

    let records = FileExtractor::new().extract(&path, None, None).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records.column("amount").unwrap().kind(), ColumnKind::Float);

    let cleaned = clean(records, true, NullPolicy::Fill, DEFAULT_NULL_THRESHOLD).unwrap();
    assert_eq!(cleaned.len(), 3);
    let amounts: Vec<Value> = cleaned.column("amount").unwrap().values().to_vec();
    assert_eq!(
        amounts,
        vec![Value::Float(10.0), Value::Float(20.0), Value::Float(15.0)]
    );
}

#[test]
fn test_chunked_read_matches_full_read() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "mixed.csv",
        b"id,value,label\n1,1,a\n2,2,b\n3,2.5,\n4,NA,d\n5,7,e\n",
    );

    let full = FileExtractor::new().extract(&path, None, None).unwrap();
    let chunked = FileExtractor::new()
        .with_chunk_size(2)
        .extract(&path, None, None)
        .unwrap();

    assert_eq!(full, chunked);
    // Kind is settled over the whole file, not the first chunk
    assert_eq!(chunked.column("value").unwrap().kind(), ColumnKind::Float);
    assert_eq!(chunked.column("value").unwrap().get(3), Some(&Value::Null));
}

#[test]
fn test_multiple_files_union_and_tag() {
    let dir = TempDir::new().unwrap();
    let jan = write(&dir, "jan.csv", b"id,amount\n1,5\n2,6\n");
    let feb = write(&dir, "feb.csv", b"id,amount,note\n3,7.5,late\n");
    let missing = dir.path().join("mar.csv");

    let records = FileExtractor::new()
        .extract_multiple(&[jan, feb, missing], None)
        .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(
        records.column_names(),
        vec!["id", "amount", SOURCE_FILE_COLUMN, "note"]
    );
    assert_eq!(records.column("amount").unwrap().kind(), ColumnKind::Float);
    assert_eq!(records.column("note").unwrap().get(0), Some(&Value::Null));
    assert_eq!(
        records.column(SOURCE_FILE_COLUMN).unwrap().get(2),
        Some(&Value::from("feb.csv"))
    );
}

#[test]
fn test_latin1_and_semicolon_delimiter() {
    let dir = TempDir::new().unwrap();
    // "name;city\nJosé;Málaga\n" in ISO-8859-1
    let path = write(
        &dir,
        "latin1.csv",
        b"name;city\nJos\xe9;M\xe1laga\n",
    );

    let records = FileExtractor::new()
        .with_delimiter(b';')
        .with_encoding("latin1")
        .unwrap()
        .extract(&path, None, None)
        .unwrap();

    assert_eq!(records.column("name").unwrap().get(0), Some(&Value::from("José")));
    assert_eq!(records.column("city").unwrap().get(0), Some(&Value::from("Málaga")));

    let detected = FileExtractor::new()
        .with_delimiter(b';')
        .extract(&path, None, None)
        .unwrap();
    assert_eq!(detected, records);
}

#[test]
fn test_cyrillic_windows_1251_is_detected() {
    let dir = TempDir::new().unwrap();
    let mut text = String::from("имя,город\n");
    for _ in 0..40 {
        text.push_str("Иван,Москва\nМария,Санкт-Петербург\nОльга,Екатеринбург\n");
    }
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(&text);
    let path = write(&dir, "cp1251.csv", &bytes);

    let extractor = FileExtractor::new();
    assert_eq!(extractor.detect_encoding(&path).unwrap(), encoding_rs::WINDOWS_1251);
    let records = extractor.extract(&path, None, None).unwrap();
    assert_eq!(records.column_names(), vec!["имя", "город"]);
    assert_eq!(records.len(), 120);
    assert_eq!(records.column("город").unwrap().get(0), Some(&Value::from("Москва")));
}

#[test]
fn test_bomless_utf16_is_detected() {
    let dir = TempDir::new().unwrap();
    let bytes: Vec<u8> = "id,name\n1,a\n2,b\n"
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    let path = write(&dir, "utf16.csv", &bytes);

    let records = FileExtractor::new().extract(&path, None, None).unwrap();
    assert_eq!(records.column_names(), vec!["id", "name"]);
    assert_eq!(records.column("name").unwrap().get(1), Some(&Value::from("b")));
}

#[test]
fn test_projection_hints_and_schema_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "orders.csv",
        b"id,name,ordered_at,extra\n1,a,2024-01-05,x\n2,b,not a date,y\n",
    );

    let mut hints = HashMap::new();
    hints.insert("ordered_at".to_string(), ColumnKind::Timestamp);
    let records = FileExtractor::new()
        .extract(&path, Some(&["id", "name", "ordered_at"][..]), Some(&hints))
        .unwrap();

    assert_eq!(records.column_names(), vec!["id", "name", "ordered_at"]);
    let ordered_at = records.column("ordered_at").unwrap();
    assert_eq!(ordered_at.kind(), ColumnKind::Timestamp);
    assert_eq!(ordered_at.get(1), Some(&Value::Null));

    assert!(validate_schema(&records, &["id", "name"]));
    assert!(!validate_schema(&records, &["id", "name", "missing"]));

    let err = FileExtractor::new()
        .extract(&path, Some(&["id", "price"][..]), None)
        .unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::MissingColumns(columns)) => assert_eq!(columns, &vec!["price"]),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_file_is_not_found() {
    let err = FileExtractor::new()
        .extract("does/not/exist.csv", None, None)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NotFound(_))
    ));
}

#[test]
fn test_file_info() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "sales.csv", SALES.as_bytes());

    let info = FileExtractor::new().file_info(&path).unwrap();
    assert_eq!(info.file_name, "sales.csv");
    assert_eq!(info.row_count, 4);
    assert_eq!(info.columns, vec!["id", "amount", "region"]);
    assert_eq!(info.size_bytes, SALES.len() as u64);
}

#[tokio::test]
async fn test_file_source_adapter() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "sales.csv", SALES.as_bytes());

    let source = FileSource::new(FileExtractor::new(), vec![path]);
    assert_eq!(source.source_name(), "csv");
    let records = source.extract().await.unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.has_column(SOURCE_FILE_COLUMN));
}
