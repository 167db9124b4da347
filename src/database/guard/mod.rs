//! Query safety guard
//!
//! A best-effort denylist applied to free-form SQL and to bare identifiers
//! before they reach a backend. Pattern blocking is inherently incomplete;
//! it does not replace parameterized statements or a read-only connection.


use crate::{PatternCategory, ValidationError};
use fancy_regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static DANGEROUS_PATTERNS: LazyLock<Vec<(Regex, PatternCategory)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i);\s*drop\s+").expect("valid regex"),
            PatternCategory::StackedDrop,
        ),
        (
            Regex::new(r"(?i);\s*delete\s+").expect("valid regex"),
            PatternCategory::StackedDelete,
        ),
        (
            Regex::new(r"(?i);\s*truncate\s+").expect("valid regex"),
            PatternCategory::StackedTruncate,
        ),
        (
            Regex::new(r"(?i);\s*alter\s+").expect("valid regex"),
            PatternCategory::StackedAlter,
        ),
        (
            Regex::new(r"(?i);\s*create\s+").expect("valid regex"),
            PatternCategory::StackedCreate,
        ),
        (
            Regex::new(r"--\s*$").expect("valid regex"),
            PatternCategory::TrailingLineComment,
        ),
        // `.` does not cross newlines, so only single-line block comments match
        (
            Regex::new(r"/\*.*\*/").expect("valid regex"),
            PatternCategory::BlockComment,
        ),
    ]
});

const ILLEGAL_IDENTIFIER_CHARS: [char; 4] = ['\'', '"', '\\', ';'];

/// Leading keywords of statements that produce a row set
const ROW_PRODUCING_KEYWORDS: [&str; 5] = ["SELECT", "WITH", "VALUES", "PRAGMA", "EXPLAIN"];

/// Whether a statement yields rows or only an affected-row count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Rows,
    Mutation,
}

/// Validate free-form SQL text, returning it trimmed.
///
/// # Errors
/// * `ValidationError::EmptyQuery` for empty or whitespace-only text
/// * `ValidationError::DangerousPattern` when a denylisted pattern matches
#[inline]
pub fn validate_query(sql: &str) -> Result<&str, ValidationError> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }

    for (pattern, category) in DANGEROUS_PATTERNS.iter() {
        // A matcher failure (backtrack limit) counts as a hit
        if pattern.is_match(sql).unwrap_or(true) {
            debug!("Rejected query: {}", category);
            return Err(ValidationError::DangerousPattern(*category));
        }
    }

    Ok(sql)
}

/// Validate a bare table or collection name, returning it trimmed.
///
/// # Errors
/// * `ValidationError::EmptyIdentifier` for blank names
/// * `ValidationError::IllegalIdentifier` for names containing quotes,
///   backslashes or semicolons
#[inline]
pub fn validate_identifier(name: &str) -> Result<&str, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyIdentifier);
    }

    if name.contains(ILLEGAL_IDENTIFIER_CHARS) {
        return Err(ValidationError::IllegalIdentifier(name.to_string()));
    }

    Ok(name)
}

/// Classify a statement by its leading keyword, skipping whitespace,
/// opening parentheses and leading comments.
#[inline]
pub fn classify_statement(sql: &str) -> StatementKind {
    let keyword = leading_keyword(sql).to_ascii_uppercase();
    if ROW_PRODUCING_KEYWORDS.contains(&keyword.as_str()) {
        StatementKind::Rows
    } else {
        StatementKind::Mutation
    }
}

fn leading_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }

    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    rest.split_at(end).0
}
