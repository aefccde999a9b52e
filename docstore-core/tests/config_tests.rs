// Configuration loading from disk
use docstore_core::{DatabaseCore, DocStoreError, LogLevel, StoreConfig};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_database_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
database_name = "transport"
default_batch_size = 3
log_level = "debug"
"#
    )
    .unwrap();

    let config = StoreConfig::from_file(file.path()).unwrap();
    assert_eq!(config.log_level(), LogLevel::Debug);

    let db = DatabaseCore::from_config(&config);
    assert_eq!(db.name(), "transport");

    let coll = db.collection("stops").unwrap();
    coll.create_documents((1..=7).map(|i| json!({"_id": i})).collect())
        .unwrap();

    let mut sizes = Vec::new();
    let pages = db
        .batch_query("stops", &json!({}), None, |page, _| {
            sizes.push(page.len());
            Ok(())
        })
        .unwrap();
    assert_eq!(pages, 3);
    assert_eq!(sizes, vec![3, 3, 1]);
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StoreConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, DocStoreError::Io(_)));
}

#[test]
fn test_malformed_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "default_batch_size = \"many\"").unwrap();
    let err = StoreConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, DocStoreError::Config(_)));
}

#[test]
fn test_config_installs_logging_once() {
    let config = StoreConfig::from_toml_str("log_level = \"info\"").unwrap();
    let _ = config.init_logging();
    assert!(!config.init_logging());
}
