use app_config::SurrealDbConfig;
use app_error::{AppResult, with_context};
use std::{sync::Arc, time::Duration};
use surrealdb::{engine::any::connect, opt::auth::Root};

use crate::{ConnectionPool, Database};

const MEMORY_POOL_SIZE: usize = 10;
const MEMORY_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn is_embedded(endpoint: &str) -> bool {
    endpoint == "memory" || endpoint.starts_with("mem://")
}

/// Connect to the configured SurrealDB endpoint and wrap it in a pool
pub async fn initialize_db(db_config: &SurrealDbConfig) -> AppResult<Arc<Database>> {
    tracing::debug!("Connecting to SurrealDB: {}", db_config.endpoint);

    if db_config.endpoint.starts_with("wss://") {
        tracing::info!("Using secure TLS connection to database");
    } else if !is_embedded(&db_config.endpoint) {
        tracing::warn!("Using non-secure database connection");
    }

    let client = with_context!(
        connect(db_config.endpoint.as_str()).await,
        "Failed to connect to database"
    )?;

    // Embedded engines have no users to sign in as
    if !is_embedded(&db_config.endpoint) {
        with_context!(
            client
                .signin(Root {
                    username: &db_config.username,
                    password: &db_config.password,
                })
                .await,
            "Failed to authenticate with database"
        )?;
    }

    with_context!(
        client
            .use_ns(db_config.namespace.as_str())
            .use_db(db_config.database.as_str())
            .await,
        "Failed to select namespace and database"
    )?;

    tracing::info!(
        "Initializing database connection pool with {} connections",
        db_config.pool.size
    );

    let pool = ConnectionPool::new(
        &db_config.endpoint,
        client,
        db_config.pool.size,
        Duration::from_millis(db_config.pool.connection_timeout),
    );

    tracing::info!("Successfully connected to SurrealDB at {}", db_config.endpoint);
    Ok(Arc::new(Database::new(pool)))
}

/// A fresh, isolated in-memory database
pub async fn initialize_memory_db(namespace: &str, database: &str) -> AppResult<Arc<Database>> {
    let client = with_context!(
        connect("memory").await,
        "Failed to start in-memory database"
    )?;

    with_context!(
        client.use_ns(namespace).use_db(database).await,
        "Failed to select namespace and database"
    )?;

    let pool = ConnectionPool::new("memory", client, MEMORY_POOL_SIZE, MEMORY_ACQUIRE_TIMEOUT);
    tracing::debug!("In-memory SurrealDB ready ({}/{})", namespace, database);

    Ok(Arc::new(Database::new(pool)))
}
