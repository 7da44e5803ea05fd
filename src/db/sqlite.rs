use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection as RusqliteConnection, ToSql, params_from_iter};

use super::{Connection, Driver, Flavor, Row};
use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::orm::Value;

/// SQLite backend. `database` in the config is a file path, or `:memory:`.
#[derive(Debug)]
pub enum Sqlite {
    File(PathBuf),
    InMemory,
}

impl Sqlite {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    pub(crate) fn from_config(config: &DbConfig) -> Self {
        match config.database.as_deref() {
            None | Some(":memory:") => Self::InMemory,
            Some(path) => Self::open(path),
        }
    }
}

#[async_trait]
impl Driver for Sqlite {
    fn flavor(&self) -> Flavor {
        Flavor::Sqlite
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = match self {
            Self::File(path) => RusqliteConnection::open(path),
            Self::InMemory => RusqliteConnection::open_in_memory(),
        }
        .map_err(Error::driver)?;
        Ok(Box::new(SqliteConnection { conn }))
    }

    /// Every in-memory connection is a separate database.
    fn max_connections(&self) -> Option<usize> {
        matches!(self, Self::InMemory).then_some(1)
    }
}

#[derive(Debug)]
struct SqliteConnection {
    conn: RusqliteConnection,
}

impl SqliteConnection {
    fn fetch(&self, sql: &str, args: &[Value], limit: Option<usize>) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
        let mut rows = stmt.query(params_from_iter(args.iter()))?;

        let mut out = Vec::new();
        while limit.is_none_or(|n| out.len() < n) {
            let Some(row) = rows.next()? else { break };
            let mut record = Row::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                record.insert(name.clone(), from_sql(row.get_ref(i)?));
            }
            out.push(record);
        }
        Ok(out)
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn query(&mut self, sql: &str, args: &[Value], limit: Option<usize>) -> Result<Vec<Row>> {
        self.fetch(sql, args, limit).map_err(Error::driver)
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        let affected = self
            .conn
            .execute(sql, params_from_iter(args.iter()))
            .map_err(Error::driver)?;
        Ok(affected as u64)
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN").map_err(Error::driver)
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(Error::driver)
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(Error::driver)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Int(n) => ToSqlOutput::Borrowed(ValueRef::Integer(*n)),
            Value::Float(n) => ToSqlOutput::Borrowed(ValueRef::Real(*n)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(n) => Value::Float(n),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}
