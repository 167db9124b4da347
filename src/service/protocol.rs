//! Request/response types for the JSON-lines service
//!
//! Every input line is one [`Request`], tagged by its `op` field. Every output
//! line is one [`Response`] carrying an HTTP-style status code.

use crate::ScopeError;
use crate::database::models::SearchParams;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;

/// Rows returned by a scan when the caller gives no limit
pub const DEFAULT_SCAN_LIMIT: usize = 100;
/// Hits per query vector when the caller gives no limit
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

fn default_scan_limit() -> usize {
    DEFAULT_SCAN_LIMIT
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Connect to a remote server (`host`/`port`, config defaults when omitted)
    /// or to a local dataset directory (`path`)
    Connect {
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        port: Option<u32>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Disconnect,
    ListCollections,
    DescribeCollection {
        name: String,
    },
    ScanCollection {
        name: String,
        #[serde(default = "default_scan_limit")]
        limit: usize,
    },
    Search {
        #[serde(alias = "collection_name")]
        name: String,
        vectors: Vec<Vec<f32>>,
        #[serde(default = "default_search_limit")]
        limit: usize,
        #[serde(default)]
        search_params: Option<SearchParams>,
    },
    UploadDatabase {
        path: PathBuf,
        #[serde(default)]
        file_name: Option<String>,
    },
    ListTables,
    DescribeTable {
        name: String,
    },
    ScanTable {
        name: String,
        #[serde(default = "default_scan_limit")]
        limit: usize,
    },
    Execute {
        query: String,
    },
    Health,
}

impl Request {
    /// Operation name, for logging
    #[inline]
    pub fn op(&self) -> &'static str {
        match *self {
            Request::Connect { .. } => "connect",
            Request::Disconnect => "disconnect",
            Request::ListCollections => "list_collections",
            Request::DescribeCollection { .. } => "describe_collection",
            Request::ScanCollection { .. } => "scan_collection",
            Request::Search { .. } => "search",
            Request::UploadDatabase { .. } => "upload_database",
            Request::ListTables => "list_tables",
            Request::DescribeTable { .. } => "describe_table",
            Request::ScanTable { .. } => "scan_table",
            Request::Execute { .. } => "execute",
            Request::Health => "health",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionList {
    pub collections: Vec<String>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableList {
    pub tables: Vec<String>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    #[inline]
    pub fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(500, &format!("Failed to serialize response: {}", e)),
        }
    }

    #[inline]
    pub fn error(status: u16, detail: &str) -> Self {
        Self {
            status,
            body: json!({ "detail": detail }),
        }
    }

    /// Response for a line that is not a valid request
    #[inline]
    pub fn bad_request(detail: &str) -> Self {
        Self::error(400, detail)
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<&ScopeError> for Response {
    #[inline]
    fn from(error: &ScopeError) -> Self {
        Self::error(error.status_code(), &error.to_string())
    }
}
