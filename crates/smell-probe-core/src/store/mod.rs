mod libsql_store;
mod settings;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::Report;

pub use libsql_store::{LibSqlConnector, LibSqlStore};
pub use settings::DatabaseSettings;

/// A stored code snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnippet {
    pub id: i64,
    pub code: String,
}

/// One persisted model answer for one snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRow<'a> {
    pub source_id: i64,
    /// Display name of the model that produced the reply.
    pub llm: &'a str,
    pub prompt: &'a str,
    pub response: &'a str,
    pub timestamp: String,
    pub report: &'a Report,
}

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to database: {0}")]
    Connect(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("database connection already closed")]
    Closed,

    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

/// An open connection to the result store: snippets are read from `Sources`
/// and one row per (snippet, model) pair is written to `Responses`.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Load every stored snippet, ordered by id.
    async fn fetch_sources(&self) -> Result<Vec<SourceSnippet>, StoreError>;

    /// Insert one response row.
    async fn save_response(&self, row: &ResponseRow<'_>) -> Result<(), StoreError>;

    /// Release the connection. Later calls on this store fail with [`StoreError::Closed`].
    async fn close(&mut self) -> Result<(), StoreError>;
}

/// Opens result-store connections.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ResultStore>, StoreError>;
}

/// Current UTC time formatted as `YYYY-MM-DD HH:MM:SS`.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_sql_datetime_shape() {
        let stamp = timestamp_now();
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
