use super::*;

#[test]
fn upload_names_are_validated() {
    let config = AnalyticalConfig::default();

    assert_eq!(validate_upload_name("sample.db", &config), Ok("sample.db"));
    assert_eq!(validate_upload_name(" data.SQLITE ", &config), Ok("data.SQLITE"));
    assert_eq!(validate_upload_name("warehouse.duckdb", &config), Ok("warehouse.duckdb"));

    assert!(validate_upload_name("", &config).is_err());
    assert!(validate_upload_name("notes.txt", &config).is_err());
    assert!(validate_upload_name("noextension", &config).is_err());
    assert!(validate_upload_name("../escape.db", &config).is_err());
    assert!(validate_upload_name("nested/file.db", &config).is_err());
    assert!(validate_upload_name("nested\\file.db", &config).is_err());
}

#[test]
fn store_upload_copies_into_unique_subdirectories() {
    let source_dir = TempDir::new().expect("should create temp dir");
    let source = source_dir.path().join("input.bin");
    fs::write(&source, b"database bytes").expect("should write source file");

    let scratch = ScratchDir::new(Some(source_dir.path())).expect("should create scratch dir");
    let config = AnalyticalConfig::default();

    let first = scratch
        .store_upload(&source, "sample.db", &config)
        .expect("should store upload");
    let second = scratch
        .store_upload(&source, "sample.db", &config)
        .expect("should store upload");

    assert_eq!(first.file_name, "sample.db");
    assert_eq!(first.file_size, 14);
    assert!(first.path.starts_with(scratch.path()));
    assert!(first.path.ends_with("sample.db"));
    assert_ne!(first.path, second.path);
    assert_eq!(
        fs::read(&second.path).expect("should read stored copy"),
        b"database bytes"
    );
}

#[test]
fn store_upload_rejects_missing_source() {
    let scratch = ScratchDir::new(None).expect("should create scratch dir");
    let result = scratch.store_upload(
        &scratch.path().join("missing.db"),
        "missing.db",
        &AnalyticalConfig::default(),
    );
    assert!(matches!(
        result,
        Err(ScopeError::Validation(ValidationError::InvalidUpload(_)))
    ));
}

#[test]
fn cleanup_removes_directory() {
    let mut scratch = ScratchDir::new(None).expect("should create scratch dir");
    let path = scratch.path().to_path_buf();
    assert!(path.is_dir());

    scratch.cleanup().expect("should remove scratch dir");
    assert!(!path.exists());

    // Second cleanup is a no-op
    scratch.cleanup().expect("should be idempotent");
}
