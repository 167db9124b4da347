#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// Integration tests for uploaded SQLite database files
use dbscope::ScopeError;
use dbscope::config::Config;
use dbscope::database::registry::BackendRegistry;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

async fn create_shop_database(dir: &Path) -> PathBuf {
    let path = dir.join("shop-export.bin");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("should create database");

    for statement in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, country TEXT DEFAULT 'NZ')",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER NOT NULL REFERENCES customers(id), total REAL, note BLOB)",
        "CREATE TABLE audit (id INTEGER PRIMARY KEY, entry TEXT)",
        "INSERT INTO customers (name, country) VALUES ('Aroha', 'NZ'), ('Ben', 'AU'), ('Chloe', NULL)",
        "INSERT INTO orders (customer_id, total, note) VALUES (1, 19.5, x'cafe'), (1, 5.25, NULL), (2, 100.0, NULL), (3, 42.0, NULL)",
    ] {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("should run fixture statement");
    }

    pool.close().await;
    path
}

fn create_registry(temp_dir: &TempDir) -> BackendRegistry {
    let mut config = Config::default();
    config.server.scratch_dir = Some(temp_dir.path().join("scratch"));
    BackendRegistry::new(config).expect("should create registry")
}

#[tokio::test]
async fn uploaded_image_exposes_its_catalog() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = create_shop_database(temp_dir.path()).await;
    let registry = create_registry(&temp_dir);

    let summary = registry
        .upload_database(&source, "shop.sqlite")
        .await
        .expect("should upload database");
    assert_eq!(summary.tables_count, 3);
    assert_eq!(
        summary.file_size,
        std::fs::metadata(&source).expect("source exists").len()
    );

    let session = registry.analytical().await.expect("database is loaded");
    let tables = session.list_tables().await.expect("should list tables");
    assert_eq!(tables, ["customers", "orders", "audit"]);

    let orders = session
        .describe_table("orders")
        .await
        .expect("should describe orders");
    assert_eq!(orders.row_count, 4);
    let customer_id = &orders.columns[1];
    assert_eq!(customer_id.name, "customer_id");
    assert_eq!(customer_id.null, "NO");

    let customers = session
        .describe_table("customers")
        .await
        .expect("should describe customers");
    assert_eq!(customers.columns[2].default.as_deref(), Some("'NZ'"));
}

#[tokio::test]
async fn aggregate_queries_return_normalized_rows() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = create_shop_database(temp_dir.path()).await;
    let registry = create_registry(&temp_dir);
    registry
        .upload_database(&source, "shop.db")
        .await
        .expect("should upload database");
    let session = registry.analytical().await.expect("database is loaded");

    let result = session
        .execute(
            "SELECT c.name, count(o.id) AS orders, sum(o.total) AS spent \
             FROM customers c JOIN orders o ON o.customer_id = c.id \
             GROUP BY c.id ORDER BY c.id",
        )
        .await
        .expect("should run aggregate");

    assert_eq!(result.returned_count, Some(3));
    assert_eq!(
        serde_json::to_value(&result.data).expect("rows serialize"),
        json!([
            {"name": "Aroha", "orders": 2, "spent": 24.75},
            {"name": "Ben", "orders": 1, "spent": 100.0},
            {"name": "Chloe", "orders": 1, "spent": 42.0}
        ])
    );

    let blobs = session
        .execute("SELECT note FROM orders WHERE note IS NOT NULL")
        .await
        .expect("should select blobs");
    assert_eq!(
        serde_json::to_value(&blobs.data).expect("rows serialize"),
        json!([{"note": "cafe"}])
    );
}

#[tokio::test]
async fn guarded_statements_never_reach_the_database() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = create_shop_database(temp_dir.path()).await;
    let registry = create_registry(&temp_dir);
    registry
        .upload_database(&source, "shop.db")
        .await
        .expect("should upload database");
    let session = registry.analytical().await.expect("database is loaded");

    for query in [
        "SELECT 1; DROP TABLE orders",
        "select 1; delete from orders",
        "SELECT 1;\n  TRUNCATE orders",
        "SELECT * FROM orders --",
        "SELECT /* hidden */ * FROM orders",
    ] {
        let result = session.execute(query).await;
        assert!(
            matches!(result, Err(ScopeError::Validation(_))),
            "{query} should be rejected"
        );
    }

    let count = session
        .scan_table("orders", 10)
        .await
        .expect("orders still readable");
    assert_eq!(count.total_count, 4);
}

#[tokio::test]
async fn mutations_then_scans_stay_consistent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = create_shop_database(temp_dir.path()).await;
    let registry = create_registry(&temp_dir);
    registry
        .upload_database(&source, "shop.db")
        .await
        .expect("should upload database");
    let session = registry.analytical().await.expect("database is loaded");

    let inserted = session
        .execute("INSERT INTO audit (entry) VALUES ('one'), ('two'), ('three')")
        .await
        .expect("should insert");
    assert_eq!(inserted.affected_rows, Some(3));

    let created = session
        .execute("CREATE TABLE notes (body TEXT)")
        .await
        .expect("should create table");
    assert!(created.affected_rows.is_some());
    assert!(created.data.is_empty());
    assert_eq!(
        session.list_tables().await.expect("should list tables"),
        ["customers", "orders", "audit", "notes"]
    );

    let page = session
        .scan_table("audit", 2)
        .await
        .expect("should scan audit");
    assert_eq!(page.total_count, 3);
    assert_eq!(page.returned_count, 2);

    // The source file is untouched; writes go to the scratch copy
    let (original, _) = dbscope::database::AnalyticalStoreSession::open(
        &source,
        &Config::default().analytical,
    )
    .await
    .expect("should open source");
    assert_eq!(
        original
            .scan_table("audit", 10)
            .await
            .expect("should scan source")
            .total_count,
        0
    );
    original.close().await;
}
