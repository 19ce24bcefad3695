//! Database executor for askdb.
//!
//! Owns at most one PostgreSQL connection. Query execution connects lazily
//! and always disconnects afterwards, so the executor is back in the
//! disconnected state after every `execute_query`. Execution and schema
//! failures are logged and returned as [`Outcome::Failed`] rather than
//! aborting the session.

use crate::config::DatabaseConfig;
use crate::error::{AskError, AskResult};
use crate::result::{Outcome, ResultSet};
use crate::schema::{SCHEMA_QUERY, SchemaColumn, SchemaDescriptor, SchemaInfo};

use futures::TryStreamExt;
use serde_json::Value;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgConnection, PgHasArrayType, PgRow};
use sqlx::{Column, Connection, Decode, Either, Executor, Postgres, Row, Type, TypeInfo, ValueRef};

/// Runs generated SQL and catalog queries against one database.
pub struct DatabaseExecutor {
    config: DatabaseConfig,
    connection: Option<PgConnection>,
}

impl DatabaseExecutor {
    /// Create a disconnected executor. Nothing is opened until first use.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Open the connection. Does nothing when already connected.
    pub async fn connect(&mut self) -> AskResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        tracing::debug!(db = %self.config.display_target(), "connecting");
        let conn = PgConnection::connect_with(&self.config.connect_options())
            .await
            .map_err(|e| AskError::Connection(e.to_string()))?;
        self.connection = Some(conn);
        Ok(())
    }

    /// Close the connection if one is open.
    pub async fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "error while closing connection");
            }
            tracing::debug!("disconnected");
        }
    }

    /// Execute a statement and materialize every row.
    ///
    /// Connects if needed and disconnects afterwards whatever the result.
    pub async fn execute_query(&mut self, sql: &str) -> Outcome<ResultSet> {
        let result = self.run_query(sql).await;
        self.disconnect().await;

        if let Err(e) = &result {
            tracing::error!(error = %e, "Error executing query");
        }
        result.into()
    }

    /// Read the catalog for every user-table column.
    ///
    /// The connection is left open on success.
    pub async fn get_schema_info(&mut self) -> Outcome<SchemaInfo> {
        match self.fetch_schema().await {
            Ok(descriptor) => Outcome::Success(SchemaInfo::from(descriptor)),
            Err(e) => {
                tracing::error!(error = %e, "Error retrieving schema");
                if !e.is_connection() {
                    self.disconnect().await;
                }
                Outcome::Failed(e)
            }
        }
    }

    async fn connection(&mut self) -> AskResult<&mut PgConnection> {
        self.connect().await?;
        self.connection
            .as_mut()
            .ok_or_else(|| AskError::Connection("no connection after connect".to_string()))
    }

    async fn run_query(&mut self, sql: &str) -> AskResult<ResultSet> {
        let conn = self.connection().await?;
        tracing::debug!(sql, "executing");

        // A plain &str goes over the simple-query protocol: several statements
        // may be sent at once and every value arrives in its text form. The
        // rows of the last statement are kept.
        let mut rows: Vec<PgRow> = Vec::new();
        {
            let mut current = Vec::new();
            let mut stream = (&mut *conn).fetch_many(sql);
            while let Some(step) = stream
                .try_next()
                .await
                .map_err(|e| AskError::Execution(e.to_string()))?
            {
                match step {
                    Either::Left(_) => rows = std::mem::take(&mut current),
                    Either::Right(row) => current.push(row),
                }
            }
            if !current.is_empty() {
                rows = current;
            }
        }

        let columns = match rows.first() {
            Some(row) => column_names(row),
            // No rows to read the description from; ask the server instead.
            // `describe` is hidden from sqlx's docs but is the only way to get
            // a row description without rows. It prepares the statement, so a
            // multi-statement batch ends up with no column names here.
            None => match (&mut *conn).describe(sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(e) => {
                    tracing::debug!(error = %e, "could not describe statement");
                    Vec::new()
                }
            },
        };

        let rows = rows.iter().map(row_values).collect::<AskResult<_>>()?;
        Ok(ResultSet::new(columns, rows))
    }

    async fn fetch_schema(&mut self) -> AskResult<SchemaDescriptor> {
        let conn = self.connection().await?;

        let rows: Vec<(String, String, String)> = sqlx::query_as(SCHEMA_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AskError::Schema(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(table, column, data_type)| SchemaColumn::new(table, column, data_type))
            .collect())
    }
}

fn column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn row_values(row: &PgRow) -> AskResult<Vec<Value>> {
    (0..row.columns().len()).map(|i| decode_value(row, i)).collect()
}

/// Decode one cell into JSON by its Postgres type.
///
/// Integers, floats, booleans, JSON and one-dimensional arrays of those map
/// to native JSON values. Everything else, exact numerics included, is kept
/// as the text the server sent.
fn decode_value(row: &PgRow, idx: usize) -> AskResult<Value> {
    let column = &row.columns()[idx];
    let raw = row
        .try_get_raw(idx)
        .map_err(|e| unreadable(column.name(), e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match column.type_info().name() {
        "BOOL" => row.try_get::<bool, _>(idx).ok().map(Value::Bool),
        "INT2" => row.try_get::<i16, _>(idx).ok().map(Value::from),
        "INT4" => row.try_get::<i32, _>(idx).ok().map(Value::from),
        "INT8" => row.try_get::<i64, _>(idx).ok().map(Value::from),
        "OID" => row.try_get::<Oid, _>(idx).ok().map(|oid| Value::from(oid.0)),
        "FLOAT4" => row
            .try_get::<f32, _>(idx)
            .ok()
            .and_then(|v| serde_json::Number::from_f64(v as f64))
            .map(Value::Number),
        "FLOAT8" => row
            .try_get::<f64, _>(idx)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .ok()
            .map(|d| Value::String(d.to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(idx)
            .ok()
            .map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .ok()
            .map(|t| Value::String(t.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .ok()
            .map(|t| Value::String(t.to_rfc3339())),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(idx)
            .ok()
            .map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx).ok(),
        "BOOL[]" => array::<bool>(row, idx),
        "INT2[]" => array::<i16>(row, idx),
        "INT4[]" => array::<i32>(row, idx),
        "INT8[]" => array::<i64>(row, idx),
        "FLOAT8[]" => array::<f64>(row, idx),
        "TEXT[]" | "VARCHAR[]" => array::<String>(row, idx),
        _ => None,
    };

    match value {
        Some(value) => Ok(value),
        None => row
            .try_get_unchecked::<String, _>(idx)
            .map(Value::String)
            .map_err(|e| unreadable(column.name(), e)),
    }
}

/// A one-dimensional array as a JSON array; NULL elements become null.
fn array<T>(row: &PgRow, idx: usize) -> Option<Value>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres> + PgHasArrayType,
    Value: From<T>,
{
    let items = row.try_get::<Vec<Option<T>>, _>(idx).ok()?;
    Some(Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, Value::from))
            .collect(),
    ))
}

fn unreadable(column: &str, e: sqlx::Error) -> AskError {
    AskError::Execution(format!("cannot read column '{}': {}", column, e))
}
