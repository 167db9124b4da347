use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScopeError>;

/// The kind of named entity an operation was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Collection,
    Table,
}

impl std::fmt::Display for EntityKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            EntityKind::Collection => write!(f, "Collection"),
            EntityKind::Table => write!(f, "Table"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Vector store is not connected")]
    NotConnected,

    #[error("No database file loaded")]
    NoFileLoaded,

    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: EntityKind, name: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ScopeError {
    #[inline]
    pub fn not_found(kind: EntityKind, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Response status for this failure: client errors are 4xx, anything the
    /// backend raised on its own is a 500.
    #[inline]
    pub fn status_code(&self) -> u16 {
        match *self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) | Self::NotConnected | Self::NoFileLoaded => 400,
            _ => 500,
        }
    }
}

/// Malformed input, rejected before any backend call is made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("query text is empty")]
    EmptyQuery,

    #[error("potentially dangerous SQL detected ({0})")]
    DangerousPattern(PatternCategory),

    #[error("identifier is empty")]
    EmptyIdentifier,

    #[error("identifier '{0}' contains illegal characters")]
    IllegalIdentifier(String),

    #[error("at least one query vector is required")]
    EmptyVectors,

    #[error("vector {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("collection '{0}' has no vector field")]
    NoVectorField(String),

    #[error("invalid host: {0}")]
    InvalidHost(String),

    #[error("invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u32),

    #[error("invalid database file: {0}")]
    InvalidDatabaseFile(String),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}

/// Denylist categories reported by the query guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCategory {
    StackedDrop,
    StackedDelete,
    StackedTruncate,
    StackedAlter,
    StackedCreate,
    TrailingLineComment,
    BlockComment,
}

impl std::fmt::Display for PatternCategory {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            PatternCategory::StackedDrop => write!(f, "stacked DROP statement"),
            PatternCategory::StackedDelete => write!(f, "stacked DELETE statement"),
            PatternCategory::StackedTruncate => write!(f, "stacked TRUNCATE statement"),
            PatternCategory::StackedAlter => write!(f, "stacked ALTER statement"),
            PatternCategory::StackedCreate => write!(f, "stacked CREATE statement"),
            PatternCategory::TrailingLineComment => write!(f, "trailing line comment"),
            PatternCategory::BlockComment => write!(f, "block comment"),
        }
    }
}

pub mod config;
pub mod database;
pub mod service;
