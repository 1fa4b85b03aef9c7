use async_trait::async_trait;
use libsql::{Builder, Connection, Database, Value};
use tracing::{debug, info};

use super::{DatabaseSettings, ResponseRow, ResultStore, SourceSnippet, StoreConnector, StoreError};
use crate::schema::SmellSchema;

const CREATE_SOURCES: &str = "CREATE TABLE IF NOT EXISTS Sources (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    Code TEXT NOT NULL
)";

const RESPONSE_COLUMNS: [&str; 5] = ["SourceId", "LLM", "Prompt", "Response", "Timestamp"];

/// Opens libSQL-backed result stores for a fixed smell schema.
#[derive(Debug, Clone)]
pub struct LibSqlConnector {
    settings: DatabaseSettings,
    schema: SmellSchema,
}

impl LibSqlConnector {
    pub fn new(settings: DatabaseSettings, schema: SmellSchema) -> Self {
        Self { settings, schema }
    }

    /// Open the database and create the `Sources`/`Responses` tables when missing.
    pub async fn open(&self) -> Result<LibSqlStore, StoreError> {
        let db = match (&self.settings.url, &self.settings.auth_token) {
            (Some(url), token) => {
                Builder::new_remote(url.clone(), token.clone().unwrap_or_default())
                    .build()
                    .await
            }
            (None, _) => Builder::new_local(&self.settings.path).build().await,
        }
        .map_err(|e| StoreError::Connect(format!("{}: {e}", self.settings.describe())))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connect(format!("{}: {e}", self.settings.describe())))?;

        let store = LibSqlStore {
            handle: Some((db, conn)),
            insert_sql: insert_statement(&self.schema),
            schema: self.schema.clone(),
        };
        store.run_migrations().await?;
        info!(database = self.settings.describe(), "connected to result database");
        Ok(store)
    }
}

#[async_trait]
impl StoreConnector for LibSqlConnector {
    async fn connect(&self) -> Result<Box<dyn ResultStore>, StoreError> {
        Ok(Box::new(self.open().await?))
    }
}

/// Result store backed by a single libSQL connection.
pub struct LibSqlStore {
    handle: Option<(Database, Connection)>,
    insert_sql: String,
    schema: SmellSchema,
}

impl LibSqlStore {
    fn conn(&self) -> Result<&Connection, StoreError> {
        self.handle
            .as_ref()
            .map(|(_, conn)| conn)
            .ok_or(StoreError::Closed)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(CREATE_SOURCES, ())
            .await
            .map_err(|e| StoreError::Migration(format!("Sources: {e}")))?;
        conn.execute(&responses_table(&self.schema), ())
            .await
            .map_err(|e| StoreError::Migration(format!("Responses: {e}")))?;
        Ok(())
    }

    /// Store a new snippet and return its id.
    pub async fn insert_source(&self, code: &str) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO Sources (Code) VALUES (?1)", [code])
            .await?;
        Ok(conn.last_insert_rowid())
    }

    /// Number of rows in `Responses`.
    pub async fn count_responses(&self) -> Result<i64, StoreError> {
        let mut rows = self
            .conn()?
            .query("SELECT COUNT(*) FROM Responses", ())
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::Query("COUNT(*) returned no row".into()))?;
        Ok(row.get::<i64>(0)?)
    }
}

#[async_trait]
impl ResultStore for LibSqlStore {
    async fn fetch_sources(&self) -> Result<Vec<SourceSnippet>, StoreError> {
        let mut rows = self
            .conn()?
            .query("SELECT Id, Code FROM Sources ORDER BY Id", ())
            .await?;
        let mut sources = Vec::new();
        while let Some(row) = rows.next().await? {
            sources.push(SourceSnippet {
                id: row.get::<i64>(0)?,
                code: row.get::<String>(1)?,
            });
        }
        debug!(count = sources.len(), "loaded sources");
        Ok(sources)
    }

    async fn save_response(&self, row: &ResponseRow<'_>) -> Result<(), StoreError> {
        let mut values: Vec<Value> = Vec::with_capacity(RESPONSE_COLUMNS.len() + self.schema.len());
        values.push(Value::Integer(row.source_id));
        values.push(Value::Text(row.llm.to_string()));
        values.push(Value::Text(row.prompt.to_string()));
        values.push(Value::Text(row.response.to_string()));
        values.push(Value::Text(row.timestamp.clone()));
        for key in self.schema.iter() {
            let flag = row.report.get(key).unwrap_or(false);
            values.push(Value::Integer(i64::from(flag)));
        }
        self.conn()?.execute(&self.insert_sql, values).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        let (db, conn) = self.handle.take().ok_or(StoreError::Closed)?;
        drop(conn);
        drop(db);
        info!("database connection closed");
        Ok(())
    }
}

fn responses_table(schema: &SmellSchema) -> String {
    let smell_columns: String = schema
        .iter()
        .map(|key| format!(",\n    {key} INTEGER NOT NULL DEFAULT 0"))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS Responses (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    SourceId INTEGER NOT NULL,
    LLM TEXT NOT NULL,
    Prompt TEXT NOT NULL,
    Response TEXT NOT NULL,
    Timestamp TEXT NOT NULL{smell_columns}
)"
    )
}

// Keys are validated identifiers, so they can be spliced in as column names;
// every value is bound positionally.
fn insert_statement(schema: &SmellSchema) -> String {
    let columns: Vec<&str> = RESPONSE_COLUMNS
        .iter()
        .copied()
        .chain(schema.iter())
        .collect();
    let placeholders = (1..=columns.len())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO Responses ({}) VALUES ({placeholders})",
        columns.join(", ")
    )
}
