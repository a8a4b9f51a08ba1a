use crate::{ConnectionPool, Database, Filter, Page, PooledConnection};

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{marker::PhantomData, sync::Arc, time::Duration};
use surrealdb::{Surreal, engine::any::Any};
use tokio::{sync::Semaphore, time::timeout};

use app_error::{AppError, AppErrorExt, AppResult, with_context};

lazy_static! {
    // SurrealDB identifier rules
    static ref IDENTIFIER: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}

/// Table holding one counter record per entity table
pub const SEQUENCE_TABLE: &str = "sequences";

// Optimistic transactions touching the same record lose to each other; the
// datastore marks those failures as retryable
const CONFLICT_RETRIES: u32 = 32;

fn is_retryable_conflict(error: &AppError) -> bool {
    match error {
        AppError::DatabaseError(err) => {
            let message = format!("{:#}", err);
            message.contains("read or write conflict") || message.contains("can be retried")
        }
        _ => false,
    }
}

/// Run `operation` again while it fails on a retryable write conflict
pub async fn retry_on_conflict<F, Fut, R>(mut operation: F) -> AppResult<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<R>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(error) if attempt < CONFLICT_RETRIES && is_retryable_conflict(&error) => {
                attempt += 1;
                tracing::debug!("Retrying after write conflict (attempt {})", attempt);
                tokio::time::sleep(Duration::from_millis(u64::from(attempt.min(10)))).await;
            }
            result => return result,
        }
    }
}

impl ConnectionPool {
    pub fn new(
        connection_url: &str,
        client: Surreal<Any>,
        max_size: usize,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            connection_url: connection_url.to_string(),
            client,
            permits: Arc::new(Semaphore::new(max_size)),
            acquire_timeout,
            max_size,
        }
    }

    /// Check out a handle, waiting at most `acquire_timeout` for a free slot
    pub async fn get_connection(&self) -> AppResult<PooledConnection> {
        let permit = match timeout(
            self.acquire_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        {
            Ok(permit) => permit.context("Connection pool closed").db_err()?,
            Err(_) => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Timed out after {:?} waiting for a connection to {}",
                    self.acquire_timeout,
                    self.connection_url
                )));
            }
        };

        Ok(PooledConnection {
            conn: self.client.clone(),
            _permit: permit,
        })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Database {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub async fn get_connection(&self) -> AppResult<PooledConnection> {
        self.pool.get_connection().await
    }

    /// Round-trip to the datastore
    pub async fn health(&self) -> AppResult<()> {
        let conn = self.get_connection().await?;
        conn.get_ref()
            .health()
            .await
            .context("Database health check failed")
            .db_err()
    }

    /// Run schema definition statements, failing on the first rejected one
    pub async fn apply_schema(&self, statements: &str) -> AppResult<()> {
        let response = self.query(statements).r#await().await?;
        response.check()?;
        tracing::debug!("Database schema applied");
        Ok(())
    }

    pub fn query(&self, sql: impl Into<String>) -> QueryBuilder<'_> {
        QueryBuilder {
            pool: &self.pool,
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }
}

pub struct QueryBuilder<'a> {
    pool: &'a ConnectionPool,
    sql: String,
    bindings: Vec<(String, serde_json::Value)>,
}

impl<'a> QueryBuilder<'a> {
    pub fn bind(mut self, binding: (impl Into<String>, impl Into<serde_json::Value>)) -> Self {
        self.bindings.push((binding.0.into(), binding.1.into()));
        self
    }

    pub fn bind_all(mut self, bindings: &[(String, serde_json::Value)]) -> Self {
        self.bindings.extend(bindings.iter().cloned());
        self
    }

    pub async fn r#await(self) -> AppResult<QueryResponse> {
        let conn = self.pool.get_connection().await?;
        let mut query = conn.get_ref().query(self.sql);

        for (name, value) in self.bindings {
            query = query.bind((name, value));
        }

        let response = query.await.context("Failed to execute query").db_err()?;
        Ok(QueryResponse(response))
    }
}

pub struct QueryResponse(surrealdb::Response);

impl QueryResponse {
    /// Fails if any statement in the batch failed
    pub fn check(self) -> AppResult<Self> {
        self.0.check().map(QueryResponse).map_err(classify)
    }

    pub fn take<T>(&mut self, index: usize) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.0.take(index).map_err(classify)
    }
}

// Unique index violations are surfaced separately so callers can turn them
// into friendly conflict errors
fn classify(error: surrealdb::Error) -> AppError {
    let message = error.to_string();
    if message.contains("already contains") {
        AppError::ResourceExistsError(message)
    } else {
        AppError::DatabaseError(anyhow::anyhow!("Query failed: {}", message))
    }
}

#[derive(Debug, Deserialize)]
struct SequenceRow {
    seq: i64,
}

/// Typed access to one table whose records carry integer keys.
///
/// Records are read back with `record::id(id) AS id`, so `T` sees the key as
/// a plain integer `id` field.
pub struct DbService<T> {
    db: Arc<Database>,
    table_name: String,
    _phantom: PhantomData<T>,
}

impl<T> Clone for DbService<T> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            table_name: self.table_name.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> DbService<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(db: Arc<Database>, table_name: impl Into<String>) -> Self {
        Self {
            db,
            table_name: table_name.into(),
            _phantom: PhantomData,
        }
    }

    // Generic DB operation wrapper with consistent error handling and logging
    async fn execute_db_operation<F, R>(&self, operation: &str, execute: F) -> AppResult<R>
    where
        F: Future<Output = AppResult<R>>,
    {
        execute.await.map_err(|e| {
            if let AppError::DatabaseError(err) = e {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to {} {} record: {:#}",
                    operation,
                    self.table_name,
                    err
                ))
            } else {
                e
            }
        })
    }

    // Validate identifier for injection prevention
    fn validate_identifier(&self, identifier: &str) -> AppResult<()> {
        if !IDENTIFIER.is_match(identifier) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Invalid identifier '{}': must start with a letter or underscore and contain only alphanumeric characters and underscores",
                identifier
            )));
        }

        Ok(())
    }

    fn select_sql(&self) -> String {
        format!("SELECT *, record::id(id) AS id FROM {}", self.table_name)
    }

    /// Allocate the next integer key for this table
    pub async fn next_id(&self) -> AppResult<i64> {
        self.execute_db_operation(
            "allocate id for",
            retry_on_conflict(|| async {
                let mut response = self
                    .db
                    .query("UPSERT type::thing($seq_table, $tb) SET seq = (seq OR 0) + 1 RETURN AFTER")
                    .bind(("seq_table", SEQUENCE_TABLE))
                    .bind(("tb", self.table_name.as_str()))
                    .r#await()
                    .await?;

                let rows: Vec<SequenceRow> = response.take(0)?;
                rows.first().map(|row| row.seq).ok_or_else(|| {
                    AppError::database_operation_failed("sequence", &self.table_name)
                })
            }),
        )
        .await
    }

    /// Create a record under `record_id` and read it back
    pub async fn create_record<C>(&self, record_id: i64, content: C) -> AppResult<T>
    where
        C: Serialize,
    {
        self.validate_identifier(&self.table_name)?;
        let content = with_context!(
            serde_json::to_value(content),
            ServerError,
            "Failed to serialize record content"
        )?;
        let sql = format!(
            "CREATE type::thing($tb, $rid) CONTENT $data RETURN NONE; {} WHERE id = type::thing($tb, $rid);",
            self.select_sql()
        );

        self.execute_db_operation(
            "create",
            retry_on_conflict(|| async {
                let response = self
                    .db
                    .query(sql.as_str())
                    .bind(("tb", self.table_name.as_str()))
                    .bind(("rid", record_id))
                    .bind(("data", content.clone()))
                    .r#await()
                    .await?;

                let mut response = response.check()?;
                let mut rows: Vec<T> = response.take(1)?;
                if rows.is_empty() {
                    return Err(AppError::database_operation_failed(
                        "create",
                        &self.table_name,
                    ));
                }
                Ok(rows.remove(0))
            }),
        )
        .await
    }

    /// Get a record by its key
    pub async fn get_record_by_id(&self, record_id: i64) -> AppResult<Option<T>> {
        self.validate_identifier(&self.table_name)?;
        let sql = format!("{} WHERE id = type::thing($tb, $rid)", self.select_sql());

        self.execute_db_operation("fetch", async {
            let mut response = self
                .db
                .query(sql)
                .bind(("tb", self.table_name.as_str()))
                .bind(("rid", record_id))
                .r#await()
                .await?;

            let rows: Vec<T> = response.take(0)?;
            Ok(rows.into_iter().next())
        })
        .await
    }

    /// Get records by a field and value
    pub async fn get_records_by_field<V>(&self, field: &str, value: V) -> AppResult<Vec<T>>
    where
        V: Serialize,
    {
        self.find(Filter::new().eq(field, value), Page::default())
            .await
    }

    /// Records matching every predicate of `filter`, in key order
    pub async fn find(&self, filter: Filter, page: Page) -> AppResult<Vec<T>> {
        self.validate_identifier(&self.table_name)?;
        for field in filter.fields() {
            self.validate_identifier(field)?;
        }

        let sql = format!(
            "{}{} ORDER BY id ASC{}",
            self.select_sql(),
            filter.where_clause(),
            page.render()
        );
        tracing::debug!("Executing query on {}: {}", self.table_name, sql);

        self.execute_db_operation("query", async {
            let mut response = self
                .db
                .query(sql)
                .bind_all(filter.bindings())
                .r#await()
                .await?;

            response.take(0)
        })
        .await
    }

    /// Merge `changes` into an existing record and read it back.
    /// Returns `None` when no record has that key.
    pub async fn merge_record<C>(&self, record_id: i64, changes: C) -> AppResult<Option<T>>
    where
        C: Serialize,
    {
        self.validate_identifier(&self.table_name)?;
        let changes = with_context!(
            serde_json::to_value(changes),
            ServerError,
            "Failed to serialize record changes"
        )?;
        let sql = format!(
            "UPDATE type::thing($tb, $rid) MERGE $data RETURN NONE; {} WHERE id = type::thing($tb, $rid);",
            self.select_sql()
        );

        self.execute_db_operation("update", async {
            let response = self
                .db
                .query(sql)
                .bind(("tb", self.table_name.as_str()))
                .bind(("rid", record_id))
                .bind(("data", changes))
                .r#await()
                .await?;

            let mut response = response.check()?;
            let rows: Vec<T> = response.take(1)?;
            Ok(rows.into_iter().next())
        })
        .await
    }

    /// Delete a record by its key
    pub async fn delete_record(&self, record_id: i64) -> AppResult<()> {
        self.execute_db_operation("delete", async {
            let response = self
                .db
                .query("DELETE type::thing($tb, $rid)")
                .bind(("tb", self.table_name.as_str()))
                .bind(("rid", record_id))
                .r#await()
                .await?;

            response.check()?;
            Ok(())
        })
        .await
    }

    /// Delete a record and every `dependent_table` row whose `foreign_key`
    /// holds its key. Both deletes commit together or not at all.
    pub async fn delete_cascade(
        &self,
        record_id: i64,
        dependent_table: &str,
        foreign_key: &str,
    ) -> AppResult<()> {
        self.validate_identifier(&self.table_name)?;
        self.validate_identifier(dependent_table)?;
        self.validate_identifier(foreign_key)?;
        let sql = format!(
            "BEGIN TRANSACTION; DELETE {} WHERE {} = $rid; DELETE type::thing($tb, $rid); COMMIT TRANSACTION;",
            dependent_table, foreign_key
        );

        self.execute_db_operation(
            "cascade delete",
            retry_on_conflict(|| async {
                let response = self
                    .db
                    .query(sql.as_str())
                    .bind(("tb", self.table_name.as_str()))
                    .bind(("rid", record_id))
                    .r#await()
                    .await?;

                response.check()?;
                Ok(())
            }),
        )
        .await
    }
}
