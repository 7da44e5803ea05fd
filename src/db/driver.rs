use std::fmt::Debug;

use async_trait::async_trait;

use super::{Flavor, Row};
use crate::error::Result;
use crate::orm::Value;

/// A database backend: knows how to open connections and which placeholder
/// syntax its statements use.
#[async_trait]
pub trait Driver: Debug + Send + Sync + 'static {
    fn flavor(&self) -> Flavor;

    async fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Upper bound on simultaneous connections, if the backend has one.
    fn max_connections(&self) -> Option<usize> {
        None
    }
}

/// One open connection. Statements arrive already translated to the
/// driver's native placeholders.
#[async_trait]
pub trait Connection: Debug + Send {
    /// Runs a query and returns at most `limit` rows, keyed by column name.
    async fn query(&mut self, sql: &str, args: &[Value], limit: Option<usize>) -> Result<Vec<Row>>;

    /// Runs a statement and returns the number of affected rows.
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}
