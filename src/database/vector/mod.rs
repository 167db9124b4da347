// LanceDB vector store session
// Collection listing, schema introspection, row scans and similarity search


use crate::config::VectorStoreConfig;
use crate::database::guard::validate_identifier;
use crate::database::models::{
    CollectionData, CollectionDescriptor, CollectionSchema, FieldDescriptor, Metric,
    SearchHit, SearchParams, SearchResponse, VectorEndpoint, VectorKind,
};
use crate::database::normalize::{record_batch_rows, record_batches_to_rows, schema_columns};
use crate::{EntityKind, ScopeError, ValidationError};
use arrow::array::{Array, Float32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Upper bound for rows returned by a collection scan
pub const MAX_SCAN_LIMIT: usize = 1000;
/// Upper bound for hits returned per query vector
pub const MAX_SEARCH_LIMIT: usize = 1000;

/// Field metadata key Lance uses to flag a primary key column
const PRIMARY_KEY_METADATA: &str = "lance-schema:unenforced-primary-key";
const DISTANCE_COLUMN: &str = "_distance";

/// A single connection to a LanceDB vector store
pub struct VectorStoreSession {
    endpoint: VectorEndpoint,
    connection: RwLock<Option<Connection>>,
    connected_at: DateTime<Utc>,
}

impl VectorStoreSession {
    /// Connect to the vector store and verify it by listing its collections
    ///
    /// # Arguments
    /// * `endpoint` - Remote server or local dataset directory
    /// * `config` - Vector store settings used for remote connections
    ///
    /// # Returns
    /// * `Result<(Self, usize), ScopeError>` - The session and its collection count
    #[inline]
    pub async fn connect(
        endpoint: VectorEndpoint,
        config: &VectorStoreConfig,
    ) -> Result<(Self, usize), ScopeError> {
        debug!("Connecting to vector store at {}", endpoint);

        let connection = Self::open_connection(&endpoint, config).await?;

        let collections = connection.table_names().execute().await.map_err(|e| {
            ScopeError::Connection(format!("Vector store at {} is unreachable: {}", endpoint, e))
        })?;

        info!(
            "Connected to vector store at {}, found {} collections",
            endpoint,
            collections.len()
        );

        let session = Self {
            endpoint,
            connection: RwLock::new(Some(connection)),
            connected_at: Utc::now(),
        };
        Ok((session, collections.len()))
    }

    async fn open_connection(
        endpoint: &VectorEndpoint,
        config: &VectorStoreConfig,
    ) -> Result<Connection, ScopeError> {
        let builder = match endpoint {
            VectorEndpoint::Remote { host, port } => {
                lancedb::connect(&format!("db://{}", config.database))
                    .api_key(config.api_key.as_deref().unwrap_or_default())
                    .region(&config.region)
                    .host_override(&format!("http://{}:{}", host, port))
            }
            VectorEndpoint::Local { path } => lancedb::connect(&path.to_string_lossy()),
        };

        builder.execute().await.map_err(|e| {
            ScopeError::Connection(format!("Failed to connect to {}: {}", endpoint, e))
        })
    }

    #[inline]
    pub fn endpoint(&self) -> &VectorEndpoint {
        &self.endpoint
    }

    #[inline]
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    #[inline]
    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Drop the connection. Calling this more than once is a no-op.
    #[inline]
    pub async fn disconnect(&self) {
        if self.connection.write().await.take().is_some() {
            info!("Disconnected from vector store at {}", self.endpoint);
        }
    }

    /// List the names of all collections
    #[inline]
    pub async fn list_collections(&self) -> Result<Vec<String>, ScopeError> {
        let guard = self.connection.read().await;
        let connection = guard.as_ref().ok_or(ScopeError::NotConnected)?;

        connection
            .table_names()
            .execute()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to list collections: {}", e)))
    }

    /// Describe a collection's schema and statistics
    ///
    /// The collection is refreshed to its latest version first so that
    /// counts reflect recent writes.
    #[inline]
    pub async fn describe_collection(&self, name: &str) -> Result<CollectionDescriptor, ScopeError> {
        debug!("Describing collection {}", name);

        let guard = self.connection.read().await;
        let connection = guard.as_ref().ok_or(ScopeError::NotConnected)?;
        let table = Self::open_collection(connection, name).await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to get collection schema: {}", e)))?;

        let num_entities = table
            .count_rows(None)
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to count rows: {}", e)))?
            as u64;

        let version = table
            .version()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to read collection version: {}", e)))?;

        Ok(CollectionDescriptor {
            name: table.name().to_string(),
            schema: CollectionSchema {
                description: schema.metadata().get("description").cloned().unwrap_or_default(),
                fields: describe_fields(&schema),
            },
            num_entities,
            is_empty: num_entities == 0,
            compaction_state: format!("version {}", version),
        })
    }

    /// Return up to `limit` rows holding every declared field
    ///
    /// `limit` is clamped to `1..=MAX_SCAN_LIMIT`.
    #[inline]
    pub async fn scan_collection(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<CollectionData, ScopeError> {
        let limit = limit.clamp(1, MAX_SCAN_LIMIT);
        debug!("Scanning collection {} with limit: {}", name, limit);

        let guard = self.connection.read().await;
        let connection = guard.as_ref().ok_or(ScopeError::NotConnected)?;
        let table = Self::open_collection(connection, name).await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to get collection schema: {}", e)))?;
        let columns = schema_columns(&schema);

        // No filter: the query matches every row
        let batches = table
            .query()
            .select(Select::Columns(columns.clone()))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to query collection: {}", e)))?
            .try_collect::<Vec<RecordBatch>>()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to read result stream: {}", e)))?;

        let data = record_batches_to_rows(&batches, &columns)?;

        let total_count = table
            .count_rows(None)
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to count rows: {}", e)))?
            as u64;

        Ok(CollectionData {
            collection_name: table.name().to_string(),
            total_count,
            returned_count: data.len(),
            data,
        })
    }

    /// Search for the nearest rows to each query vector
    ///
    /// # Arguments
    /// * `name` - Collection to search
    /// * `vectors` - Query vectors, all of the same dimension
    /// * `limit` - Hits per query vector, clamped to `1..=MAX_SEARCH_LIMIT`
    /// * `params` - Metric and probe settings; defaults to L2 with 10 probes
    ///
    /// # Returns
    /// * `Result<SearchResponse, ScopeError>` - One hit list per query vector, in input order
    #[inline]
    pub async fn search(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        limit: usize,
        params: Option<SearchParams>,
    ) -> Result<SearchResponse, ScopeError> {
        let dimension = validate_vectors(vectors)?;
        let params = params.unwrap_or_default();
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        debug!(
            "Searching collection {} with {} vectors, limit: {}, metric: {}",
            name,
            vectors.len(),
            limit,
            params.metric
        );

        let guard = self.connection.read().await;
        let connection = guard.as_ref().ok_or(ScopeError::NotConnected)?;
        let table = Self::open_collection(connection, name).await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to get collection schema: {}", e)))?;
        let fields = describe_fields(&schema);

        // The first vector field is the search target
        let target = fields
            .iter()
            .find(|f| f.is_vector())
            .ok_or_else(|| ValidationError::NoVectorField(name.to_string()))?;

        if let Some(expected) = target.dimension.filter(|d| *d != dimension) {
            return Err(ValidationError::DimensionMismatch {
                index: 0,
                expected,
                actual: dimension,
            }
            .into());
        }

        let output_columns: Vec<String> = fields
            .iter()
            .filter(|f| !f.is_vector())
            .map(|f| f.name.clone())
            .collect();

        let id_field = fields
            .iter()
            .find(|f| f.is_primary && !f.is_vector())
            .or_else(|| fields.iter().find(|f| f.name == "id" && !f.is_vector()))
            .map(|f| f.name.as_str());

        let mut search_results = Vec::with_capacity(vectors.len());
        for vector in vectors {
            let hits = Self::search_one(
                &table,
                vector,
                &target.name,
                &output_columns,
                id_field,
                limit,
                params,
            )
            .await?;
            search_results.push(hits);
        }

        info!(
            "Search on {} returned {} hit lists",
            name,
            search_results.len()
        );

        Ok(SearchResponse {
            collection_name: table.name().to_string(),
            search_results,
        })
    }

    async fn search_one(
        table: &Table,
        vector: &[f32],
        column: &str,
        output_columns: &[String],
        id_field: Option<&str>,
        limit: usize,
        params: SearchParams,
    ) -> Result<Vec<SearchHit>, ScopeError> {
        let mut query = table
            .vector_search(vector)
            .map_err(|e| ScopeError::Backend(format!("Failed to create vector search: {}", e)))?
            .column(column)
            .distance_type(distance_type(params.metric))
            .nprobes(params.nprobes)
            .select(Select::Columns(output_columns.to_vec()))
            .limit(limit);

        if let Some(factor) = params.refine_factor {
            query = query.refine_factor(factor);
        }

        let batches = query
            .execute()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<RecordBatch>>()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to read result stream: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            let distances = batch
                .column_by_name(DISTANCE_COLUMN)
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

            for (row, entity) in record_batch_rows(batch, output_columns)?
                .into_iter()
                .enumerate()
            {
                let distance =
                    distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
                let id = id_field
                    .and_then(|field| entity.get(field).cloned())
                    .unwrap_or_else(|| Value::from(hits.len()));

                hits.push(SearchHit {
                    id,
                    distance,
                    entity,
                });
            }
        }

        Ok(hits)
    }

    /// Open a collection, reporting absence as `NotFound`
    async fn open_collection(connection: &Connection, name: &str) -> Result<Table, ScopeError> {
        let name = validate_identifier(name)?;

        let names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to list collections: {}", e)))?;

        if !names.iter().any(|n| n == name) {
            return Err(ScopeError::not_found(EntityKind::Collection, name));
        }

        let table = connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to open collection: {}", e)))?;

        table
            .checkout_latest()
            .await
            .map_err(|e| ScopeError::Backend(format!("Failed to load collection: {}", e)))?;

        Ok(table)
    }
}

/// Check that the batch is non-empty and every vector shares one dimension
///
/// # Returns
/// * `Result<usize, ValidationError>` - The shared dimension
#[inline]
pub fn validate_vectors(vectors: &[Vec<f32>]) -> Result<usize, ValidationError> {
    let expected = vectors
        .first()
        .map(Vec::len)
        .filter(|len| *len > 0)
        .ok_or(ValidationError::EmptyVectors)?;

    for (index, vector) in vectors.iter().enumerate().skip(1) {
        if vector.len() != expected {
            return Err(ValidationError::DimensionMismatch {
                index,
                expected,
                actual: vector.len(),
            });
        }
    }

    Ok(expected)
}

/// Describe every field of a schema, in declared order
#[inline]
pub fn describe_fields(schema: &Schema) -> Vec<FieldDescriptor> {
    schema.fields().iter().map(|f| describe_field(f)).collect()
}

fn describe_field(field: &Field) -> FieldDescriptor {
    let (vector_kind, dimension) = match field.data_type() {
        DataType::FixedSizeList(item, size) => match item.data_type() {
            DataType::Float16 | DataType::Float32 | DataType::Float64 => {
                (Some(VectorKind::Float), usize::try_from(*size).ok())
            }
            DataType::UInt8 => (Some(VectorKind::Binary), usize::try_from(*size).ok()),
            _ => (None, None),
        },
        _ => (None, None),
    };

    FieldDescriptor {
        name: field.name().clone(),
        data_type: field.data_type().to_string(),
        is_primary: field
            .metadata()
            .get(PRIMARY_KEY_METADATA)
            .is_some_and(|v| v == "true"),
        // Lance never generates row values on insert
        auto_id: false,
        dimension,
        vector_kind,
    }
}

fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::L2 => DistanceType::L2,
        Metric::Cosine => DistanceType::Cosine,
        Metric::Dot => DistanceType::Dot,
    }
}
