pub mod db_connect;
pub mod filter;
pub mod service;

use std::{sync::Arc, time::Duration};
use surrealdb::{Surreal, engine::any::Any};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub use filter::{Filter, Page};
pub use service::DbService;

/// Bounds how many operations may hold a database handle at once.
///
/// SurrealDB clients multiplex over one router, so a checked-out handle is a
/// clone of the shared client paired with a pool permit.
pub struct ConnectionPool {
    connection_url: String,
    client: Surreal<Any>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    pub max_size: usize,
}

pub struct Database {
    pub pool: ConnectionPool,
}

// A checked-out handle; the permit goes back to the pool when dropped
pub struct PooledConnection {
    conn: Surreal<Any>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn get_ref(&self) -> &Surreal<Any> {
        &self.conn
    }
}
