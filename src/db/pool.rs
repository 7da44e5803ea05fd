//! Connection pooling.
//!
//! Connections are checked out as a [`PooledConnection`] guard. Dropping the
//! guard hands the connection back, so every exit path of a query (normal
//! return, `?`, panic, cancelled future) releases it.

use deadpool::managed::{self, Metrics, PoolError, RecycleResult};

use super::{Connection, Driver};
use crate::error::Error;

pub(crate) type Pool = managed::Pool<Manager>;

pub(crate) type PooledConnection = managed::Object<Manager>;

/// Sizing for a [`Database`](super::Database) pool.
#[derive(Clone, Copy, Debug)]
pub struct PoolOptions {
    pub max_size: usize,
    /// Connections opened eagerly when the pool is created.
    pub min_size: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self { max_size: 10, min_size: 1 }
    }
}

/// Snapshot of pool occupancy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolStatus {
    pub max_size: usize,
    /// Connections currently open.
    pub size: usize,
    /// Open connections not checked out.
    pub available: usize,
}

#[derive(Debug)]
pub(crate) struct Manager {
    pub(crate) driver: Box<dyn Driver>,
}

impl managed::Manager for Manager {
    type Type = Box<dyn Connection>;
    type Error = Error;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.driver.connect().await
    }

    async fn recycle(&self, _conn: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Self::Error> {
        Ok(())
    }
}

pub(crate) fn pool_error(err: PoolError<Error>) -> Error {
    match err {
        PoolError::Backend(e) => e,
        other => Error::Pool(other.to_string()),
    }
}
