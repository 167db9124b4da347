#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// End-to-end tests for the JSON-lines service
use arrow::array::{FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use dbscope::config::Config;
use dbscope::database::registry::BackendRegistry;
use dbscope::service::{Response, Service};
use serde_json::{Value, json};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::BufReader;

async fn seed_vectors(dir: &Path) {
    let item = Arc::new(Field::new("item", DataType::Float32, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("embedding", DataType::FixedSizeList(Arc::clone(&item), 3), false),
    ]));

    let vectors = FixedSizeListArray::try_new(
        item,
        3,
        Arc::new(Float32Array::from(vec![
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ])),
        None,
    )
    .expect("should build vectors");
    let batch = RecordBatch::try_new(
        Arc::clone(&schema),
        vec![Arc::new(Int64Array::from(vec![10, 20, 30])), Arc::new(vectors)],
    )
    .expect("should build batch");

    let connection = lancedb::connect(&dir.to_string_lossy())
        .execute()
        .await
        .expect("should open store");
    let table = connection
        .create_empty_table("points", Arc::clone(&schema))
        .execute()
        .await
        .expect("should create collection");
    table
        .add(RecordBatchIterator::new(std::iter::once(Ok(batch)), schema))
        .execute()
        .await
        .expect("should add points");
}

async fn seed_database(dir: &Path) -> PathBuf {
    let path = dir.join("upload-source");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("should create database");

    for statement in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
        "CREATE TABLE logs (id INTEGER PRIMARY KEY, message TEXT)",
        "INSERT INTO users (name) VALUES ('alice'), ('bob'), ('carol')",
    ] {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("should run fixture statement");
    }

    pool.close().await;
    path
}

async fn run_session(service: &Service, requests: &[Value]) -> Vec<Response> {
    let mut input = requests
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    input.push('\n');
    let mut output = Vec::new();
    service
        .serve(BufReader::new(input.as_bytes()), &mut output)
        .await
        .expect("should serve requests");

    String::from_utf8(output)
        .expect("output is utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is a response"))
        .collect()
}

#[tokio::test]
async fn full_session_over_both_backends() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = temp_dir.path().join("vectors");
    std::fs::create_dir_all(&store).expect("should create store dir");
    seed_vectors(&store).await;
    let source = seed_database(temp_dir.path()).await;

    let mut config = Config::default();
    config.server.scratch_dir = Some(temp_dir.path().join("scratch"));
    let service = Service::new(Arc::new(
        BackendRegistry::new(config).expect("should create registry"),
    ));

    let responses = run_session(
        &service,
        &[
            json!({"op": "connect", "path": store}),
            json!({"op": "list_collections"}),
            json!({"op": "describe_collection", "name": "points"}),
            json!({"op": "search", "name": "points", "vectors": [[0.0, 0.9, 0.1]], "limit": 2}),
            json!({"op": "search", "name": "points", "vectors": [[1.0, 0.0]]}),
            json!({"op": "scan_collection", "name": "ghost"}),
            json!({"op": "upload_database", "path": source, "file_name": "sample.db"}),
            json!({"op": "list_tables"}),
            json!({"op": "scan_table", "name": "logs", "limit": 100}),
            json!({"op": "execute", "query": "SELECT 1 AS x"}),
            json!({"op": "execute", "query": "SELECT 1; drop table users"}),
            json!({"op": "health"}),
            json!({"op": "disconnect"}),
            json!({"op": "list_collections"}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 14);

    assert_eq!(responses[0].status, 200);
    assert_eq!(responses[0].body["collections_count"], json!(1));

    assert_eq!(
        responses[1].body,
        json!({"collections": ["points"], "total_count": 1})
    );

    assert_eq!(responses[2].body["num_entities"], json!(3));
    assert_eq!(responses[2].body["schema"]["fields"][1]["dimension"], json!(3));

    let hits = &responses[3].body["search_results"][0];
    assert_eq!(hits.as_array().map(Vec::len), Some(2));
    assert_eq!(hits[0]["id"], json!(20));
    assert_eq!(hits[0]["entity"], json!({"id": 20}));

    assert_eq!(responses[4].status, 400);
    assert_eq!(responses[5].status, 404);

    assert_eq!(responses[6].status, 200);
    assert_eq!(responses[6].body["tables_count"], json!(2));

    assert_eq!(
        responses[7].body,
        json!({"tables": ["users", "logs"], "total_count": 2})
    );

    assert_eq!(responses[8].body["total_count"], json!(0));
    assert_eq!(responses[8].body["returned_count"], json!(0));

    assert_eq!(responses[9].body["returned_count"], json!(1));
    assert_eq!(responses[9].body["data"], json!([{"x": 1}]));

    assert_eq!(responses[10].status, 400);

    assert_eq!(responses[11].body["vector_connected"], json!(true));
    assert_eq!(responses[11].body["database_loaded"], json!(true));

    assert_eq!(responses[12].status, 200);
    assert_eq!(responses[13].status, 400);
}

#[tokio::test]
async fn malformed_lines_get_bad_request() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::default();
    config.server.scratch_dir = Some(temp_dir.path().join("scratch"));
    let service = Service::new(Arc::new(
        BackendRegistry::new(config).expect("should create registry"),
    ));

    let responses = run_session(
        &service,
        &[
            json!("just a string"),
            json!({"op": "scan_table"}),
            json!({"op": "teleport"}),
            json!({"op": "health"}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 4);
    for response in &responses[..3] {
        assert_eq!(response.status, 400);
        assert!(response.body["detail"].is_string());
    }
    assert_eq!(responses[3].status, 200);
}
