
use crate::config::AnalyticalConfig;
use crate::database::guard::{StatementKind, classify_statement, validate_identifier, validate_query};
use crate::database::models::{ColumnDescriptor, QueryResult, TableData, TableDescriptor};
use crate::database::normalize::sqlite_rows_to_rows;
use crate::{EntityKind, ScopeError, ValidationError};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Either, Executor, FromRow, Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

pub type DbPool = Pool<Sqlite>;

/// Upper bound for rows returned by a table scan
pub const MAX_SCAN_LIMIT: usize = 10_000;

/// One row of `PRAGMA table_info`
#[derive(Debug, Clone, FromRow)]
struct TableInfoRow {
    name: String,
    #[sqlx(rename = "type")]
    data_type: String,
    notnull: i64,
    dflt_value: Option<String>,
    pk: i64,
}

impl From<TableInfoRow> for ColumnDescriptor {
    #[inline]
    fn from(row: TableInfoRow) -> Self {
        Self {
            name: row.name,
            data_type: row.data_type,
            null: if row.notnull == 0 { "YES" } else { "NO" }.to_string(),
            key: (row.pk > 0).then(|| "PRI".to_string()),
            default: row.dflt_value,
        }
    }
}

/// A single open SQLite database file
#[derive(Debug)]
pub struct AnalyticalStoreSession {
    path: PathBuf,
    pool: DbPool,
    opened_at: DateTime<Utc>,
}

impl AnalyticalStoreSession {
    /// Open a database file and verify it by listing its tables
    ///
    /// # Returns
    /// * `Result<(Self, usize), ScopeError>` - The session and its table count
    pub async fn open<P: AsRef<Path>>(
        path: P,
        config: &AnalyticalConfig,
    ) -> Result<(Self, usize), ScopeError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ValidationError::InvalidDatabaseFile(format!(
                "{} does not exist",
                path.display()
            ))
            .into());
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                ValidationError::InvalidDatabaseFile(format!(
                    "failed to open {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let tables = match Self::query_table_names(&pool).await {
            Ok(tables) => tables,
            Err(e) => {
                pool.close().await;
                return Err(ValidationError::InvalidDatabaseFile(format!(
                    "{} is not a valid database image: {}",
                    path.display(),
                    e
                ))
                .into());
            }
        };

        info!(
            "Opened database file {}, found {} tables",
            path.display(),
            tables.len()
        );

        let session = Self {
            path: path.to_path_buf(),
            pool,
            opened_at: Utc::now(),
        };
        Ok((session, tables.len()))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        !self.pool.is_closed()
    }

    /// Close the pool. Later operations fail with `NoFileLoaded`.
    #[inline]
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("Closed database file {}", self.path.display());
        }
    }

    /// List user tables in catalog order
    #[inline]
    pub async fn list_tables(&self) -> Result<Vec<String>, ScopeError> {
        self.ensure_open()?;
        Self::query_table_names(&self.pool)
            .await
            .map_err(|e| backend_error("Failed to list tables", e))
    }

    async fn query_table_names(pool: &DbPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )
        .fetch_all(pool)
        .await
    }

    /// Describe a table's columns and row count
    #[inline]
    pub async fn describe_table(&self, name: &str) -> Result<TableDescriptor, ScopeError> {
        let name = self.existing_table(name).await?;
        debug!("Describing table {}", name);

        let columns: Vec<TableInfoRow> =
            sqlx::query_as(&format!("PRAGMA table_info({})", quote_identifier(name)))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| backend_error("Failed to describe table", e))?;

        let row_count = self.count_rows(name).await?;

        Ok(TableDescriptor {
            table_name: name.to_string(),
            row_count,
            columns: columns.into_iter().map(ColumnDescriptor::from).collect(),
        })
    }

    /// Return up to `limit` rows and the table's full row count
    ///
    /// `limit` is clamped to `1..=MAX_SCAN_LIMIT`. Column order follows the
    /// result's positional schema.
    #[inline]
    pub async fn scan_table(&self, name: &str, limit: usize) -> Result<TableData, ScopeError> {
        let name = self.existing_table(name).await?;
        let limit = limit.clamp(1, MAX_SCAN_LIMIT);
        debug!("Scanning table {} with limit: {}", name, limit);

        let rows = sqlx::query(&format!("SELECT * FROM {} LIMIT ?", quote_identifier(name)))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_error("Failed to read table", e))?;

        let data = sqlite_rows_to_rows(&rows)?;
        let total_count = self.count_rows(name).await?;

        Ok(TableData {
            table_name: name.to_string(),
            total_count,
            returned_count: data.len(),
            data,
        })
    }

    /// Execute guarded SQL
    ///
    /// The statement runs once and its output is inspected: anything that
    /// produced rows (including `... RETURNING`) reports them, as does any
    /// statement whose leading keyword is row-producing even when the row
    /// set is empty. Everything else reports the affected-row count.
    #[inline]
    pub async fn execute(&self, sql: &str) -> Result<QueryResult, ScopeError> {
        let sql = validate_query(sql)?;
        self.ensure_open()?;

        let kind = classify_statement(sql);
        debug!("Executing {:?} statement: {}", kind, sql);

        let started = Instant::now();
        let mut stream = Executor::fetch_many(&self.pool, sqlx::query(sql));
        let mut rows = Vec::new();
        let mut affected_rows = 0;
        while let Some(step) = stream
            .try_next()
            .await
            .map_err(|e| backend_error("Failed to execute query", e))?
        {
            match step {
                Either::Left(done) => affected_rows += done.rows_affected(),
                Either::Right(row) => rows.push(row),
            }
        }

        let result = if kind == StatementKind::Rows || !rows.is_empty() {
            let data = sqlite_rows_to_rows(&rows)?;
            QueryResult {
                query: sql.to_string(),
                returned_count: Some(data.len()),
                total_count: None,
                affected_rows: (kind == StatementKind::Mutation).then_some(affected_rows),
                data,
                execution_time: None,
                message: None,
            }
        } else {
            QueryResult {
                query: sql.to_string(),
                returned_count: None,
                total_count: None,
                affected_rows: Some(affected_rows),
                data: Vec::new(),
                execution_time: None,
                message: Some("Statement executed successfully".to_string()),
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        info!("Query completed in {:.3}s", elapsed);

        Ok(QueryResult {
            execution_time: Some(elapsed),
            ..result
        })
    }

    async fn existing_table<'a>(&self, name: &'a str) -> Result<&'a str, ScopeError> {
        let name = validate_identifier(name)?;
        self.ensure_open()?;

        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend_error("Failed to look up table", e))?;

        if exists.is_none() {
            return Err(ScopeError::not_found(EntityKind::Table, name));
        }
        Ok(name)
    }

    async fn count_rows(&self, name: &str) -> Result<u64, ScopeError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_identifier(name)))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| backend_error("Failed to count rows", e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn ensure_open(&self) -> Result<(), ScopeError> {
        if self.pool.is_closed() {
            return Err(ScopeError::NoFileLoaded);
        }
        Ok(())
    }
}

/// Double-quote an identifier that already passed the identifier guard
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

fn backend_error(context: &str, e: sqlx::Error) -> ScopeError {
    match e {
        sqlx::Error::PoolClosed => ScopeError::NoFileLoaded,
        e => ScopeError::Backend(format!("{}: {}", context, e)),
    }
}
