//! Database gateway.
//!
//! A [`Database`] owns a bounded pool of connections to one backend and
//! exposes the two primitives the ORM is built on: [`select`](Database::select)
//! and [`execute`](Database::execute). It is cheap to clone; clones share the
//! pool. Create it once at startup and hand it to whatever needs it.
//!
//! Every call borrows one connection for exactly one logical operation and
//! returns it before resolving, on success and on error alike.

mod driver;
mod flavor;
mod pool;

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "sqlite")]
mod sqlite;

use indexmap::IndexMap;
use tracing::{info, warn};

pub use driver::{Connection, Driver};
pub use flavor::Flavor;
pub use pool::{PoolOptions, PoolStatus};

#[cfg(feature = "mysql")]
pub use mysql::MySql;
#[cfg(feature = "sqlite")]
pub use sqlite::Sqlite;

use crate::config::{Backend, DbConfig};
use crate::error::{Error, Result};
use crate::orm::Value;
use pool::{Manager, Pool, PooledConnection, pool_error};

/// One result row, keyed by column name in select-list order.
pub type Row = IndexMap<String, Value>;

/// Handle to the connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Pool,
    flavor: Flavor,
}

impl Database {
    /// Builds the driver named by `config.backend` and opens the pool.
    ///
    /// Fails with [`Error::Config`] when `user`, `password` or `database`
    /// is missing.
    pub async fn create_pool(config: &DbConfig) -> Result<Self> {
        info!(backend = ?config.backend, host = %config.host, "create database connection pool");
        config.validate()?;

        let options = PoolOptions {
            max_size: config.max_size,
            min_size: config.min_size,
        };

        match config.backend {
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => Self::with_driver(Sqlite::from_config(config), options).await,
            #[cfg(feature = "mysql")]
            Backend::Mysql => Self::with_driver(MySql::from_config(config), options).await,
            #[allow(unreachable_patterns)]
            other => Err(Error::Config(format!(
                "backend `{other:?}` is not compiled in; enable its cargo feature"
            ))),
        }
    }

    /// Opens a pool over any [`Driver`].
    pub async fn with_driver(driver: impl Driver, options: PoolOptions) -> Result<Self> {
        let flavor = driver.flavor();
        let max_size = driver
            .max_connections()
            .map_or(options.max_size, |cap| cap.min(options.max_size))
            .max(1);

        let pool = Pool::builder(Manager { driver: Box::new(driver) })
            .max_size(max_size)
            .build()
            .map_err(|e| Error::Pool(e.to_string()))?;

        let mut warm = Vec::new();
        for _ in 0..options.min_size.min(max_size) {
            warm.push(pool.get().await.map_err(pool_error)?);
        }
        drop(warm);

        Ok(Self { pool, flavor })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Runs a query and returns its rows; at most `size` of them when given.
    pub async fn select(&self, sql: &str, args: &[Value], size: Option<usize>) -> Result<Vec<Row>> {
        info!(sql, "SQL");
        let sql = self.flavor.translate(sql);
        let mut conn = self.acquire().await?;
        let rows = conn.query(&sql, args, size).await?;
        info!(rows = rows.len(), "rows returned");
        Ok(rows)
    }

    /// Runs an insert, update or delete and returns the affected-row count.
    ///
    /// With `autocommit == false` the statement runs inside an explicit
    /// transaction: committed on success, rolled back before the error is
    /// returned otherwise.
    pub async fn execute(&self, sql: &str, args: &[Value], autocommit: bool) -> Result<u64> {
        info!(sql, "SQL");
        let sql = self.flavor.translate(sql);
        let mut conn = self.acquire().await?;

        if autocommit {
            return conn.execute(&sql, args).await;
        }

        conn.begin().await?;
        let outcome = match conn.execute(&sql, args).await {
            Ok(affected) => conn.commit().await.map(|()| affected),
            Err(e) => Err(e),
        };
        if outcome.is_err() {
            if let Err(e) = conn.rollback().await {
                warn!(error = %e, "rollback failed");
            }
        }
        outcome
    }

    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
        }
    }

    /// Closes the pool. Checked-out connections are dropped when returned.
    pub fn close(&self) {
        info!("closing database connection pool");
        self.pool.close();
    }

    async fn acquire(&self) -> Result<PooledConnection> {
        self.pool.get().await.map_err(pool_error)
    }
}
