#[cfg(test)]
mod tests;

use crate::ValidationError;
use crate::database::normalize::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use url::Url;

/// Where a vector store session connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorEndpoint {
    /// A LanceDB server reachable over the network
    Remote { host: String, port: u16 },
    /// A LanceDB dataset directory on the local filesystem
    Local { path: PathBuf },
}

impl VectorEndpoint {
    /// Validate a host/port pair.
    ///
    /// The port is taken wide so out-of-range input is reported rather than
    /// truncated.
    #[inline]
    pub fn remote(host: &str, port: u32) -> Result<Self, ValidationError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ValidationError::InvalidHost(host.to_string()));
        }

        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(ValidationError::InvalidPort(port))?;

        let url_str = format!("http://{}:{}", host, port);
        Url::parse(&url_str).map_err(|_| ValidationError::InvalidHost(host.to_string()))?;

        Ok(Self::Remote {
            host: host.to_string(),
            port,
        })
    }

    #[inline]
    pub fn local<P: AsRef<Path>>(path: P) -> Self {
        Self::Local {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl std::fmt::Display for VectorEndpoint {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorEndpoint::Remote { host, port } => write!(f, "{}:{}", host, port),
            VectorEndpoint::Local { path } => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorKind {
    Float,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub is_primary: bool,
    pub auto_id: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_kind: Option<VectorKind>,
}

impl FieldDescriptor {
    #[inline]
    pub fn is_vector(&self) -> bool {
        self.vector_kind.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub description: String,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    pub name: String,
    pub schema: CollectionSchema,
    pub num_entities: u64,
    pub is_empty: bool,
    pub compaction_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionData {
    pub collection_name: String,
    pub total_count: u64,
    pub returned_count: usize,
    pub data: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub null: String,
    pub key: Option<String>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_name: String,
    pub row_count: u64,
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub table_name: String,
    pub total_count: u64,
    pub returned_count: usize,
    pub data: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    pub data: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Metric {
    #[default]
    #[serde(rename = "L2", alias = "l2")]
    L2,
    #[serde(rename = "COSINE", alias = "cosine")]
    Cosine,
    #[serde(rename = "DOT", alias = "dot", alias = "IP", alias = "ip")]
    Dot,
}

impl std::fmt::Display for Metric {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Metric::L2 => write!(f, "L2"),
            Metric::Cosine => write!(f, "COSINE"),
            Metric::Dot => write!(f, "DOT"),
        }
    }
}

/// Distance metric and index tuning for a similarity search
///
/// Accepts both the flat form (`{"metric": "L2", "nprobes": 10}`) and the
/// nested index form (`{"metric_type": "L2", "params": {"nprobe": 10}}`).
/// Top-level values win over nested ones. Unknown keys are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SearchParamsInput")]
pub struct SearchParams {
    pub metric: Metric,
    pub nprobes: usize,
    pub refine_factor: Option<u32>,
}

impl Default for SearchParams {
    #[inline]
    fn default() -> Self {
        Self {
            metric: Metric::L2,
            nprobes: 10,
            refine_factor: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct IndexParamsInput {
    #[serde(alias = "nprobe")]
    nprobes: Option<usize>,
    refine_factor: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SearchParamsInput {
    #[serde(alias = "metric_type")]
    metric: Option<Metric>,
    #[serde(alias = "nprobe")]
    nprobes: Option<usize>,
    refine_factor: Option<u32>,
    params: IndexParamsInput,
}

impl From<SearchParamsInput> for SearchParams {
    #[inline]
    fn from(input: SearchParamsInput) -> Self {
        let defaults = Self::default();
        Self {
            metric: input.metric.unwrap_or(defaults.metric),
            nprobes: input
                .nprobes
                .or(input.params.nprobes)
                .unwrap_or(defaults.nprobes),
            refine_factor: input.refine_factor.or(input.params.refine_factor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Value,
    pub distance: f32,
    pub entity: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub collection_name: String,
    pub search_results: Vec<Vec<SearchHit>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectSummary {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub collections_count: usize,
}

impl ConnectSummary {
    #[inline]
    pub fn new(endpoint: &VectorEndpoint, collections_count: usize) -> Self {
        let (host, port, path) = match endpoint {
            VectorEndpoint::Remote { host, port } => (Some(host.clone()), Some(*port), None),
            VectorEndpoint::Local { path } => (None, None, Some(path.clone())),
        };

        Self {
            status: "success".to_string(),
            message: format!("Connected to vector store at {}", endpoint),
            host,
            port,
            path,
            collections_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub status: String,
    pub message: String,
    pub filename: String,
    pub file_size: u64,
    pub tables_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub vector_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_connected_at: Option<DateTime<Utc>>,
    pub database_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_opened_at: Option<DateTime<Utc>>,
    pub scratch_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
}
