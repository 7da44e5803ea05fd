use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Params};

use super::{Connection, Driver, Flavor, Row};
use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::orm::Value;

/// MySQL / MariaDB backend.
#[derive(Debug)]
pub struct MySql {
    opts: OptsBuilder,
}

impl MySql {
    pub(crate) fn from_config(config: &DbConfig) -> Self {
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(config.user.clone())
            .pass(config.password.clone())
            .db_name(config.database.clone())
            .client_found_rows(true)
            .init(vec![
                format!("SET NAMES {}", config.charset),
                format!("SET autocommit={}", u8::from(config.autocommit)),
            ]);
        Self { opts }
    }
}

#[async_trait]
impl Driver for MySql {
    fn flavor(&self) -> Flavor {
        Flavor::Mysql
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = Conn::new(self.opts.clone()).await.map_err(Error::driver)?;
        Ok(Box::new(MySqlConnection { conn }))
    }
}

#[derive(Debug)]
struct MySqlConnection {
    conn: Conn,
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn query(&mut self, sql: &str, args: &[Value], limit: Option<usize>) -> Result<Vec<Row>> {
        let mut result = self
            .conn
            .exec_iter(sql, params(args))
            .await
            .map_err(Error::driver)?;

        let mut out = Vec::new();
        while limit.is_none_or(|n| out.len() < n) {
            let Some(row) = result.next().await.map_err(Error::driver)? else { break };
            out.push(into_row(row));
        }
        // Unread rows must be drained before the connection is reused.
        result.drop_result().await.map_err(Error::driver)?;
        Ok(out)
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        self.conn
            .exec_drop(sql, params(args))
            .await
            .map_err(Error::driver)?;
        Ok(self.conn.affected_rows())
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn.query_drop("START TRANSACTION").await.map_err(Error::driver)
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT").await.map_err(Error::driver)
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK").await.map_err(Error::driver)
    }
}

fn into_row(row: mysql_async::Row) -> Row {
    let columns = row.columns();
    columns
        .iter()
        .map(|c| c.name_str().into_owned())
        .zip(row.unwrap().into_iter().map(from_mysql))
        .collect()
}

fn params(args: &[Value]) -> Params {
    if args.is_empty() {
        return Params::Empty;
    }
    Params::Positional(args.iter().map(to_mysql).collect())
}

fn to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(i64::from(*b)),
        Value::Int(n) => mysql_async::Value::Int(*n),
        Value::Float(n) => mysql_async::Value::Double(*n),
        Value::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => mysql_async::Value::Bytes(b.clone()),
    }
}

fn from_mysql(value: mysql_async::Value) -> Value {
    use mysql_async::Value as My;

    match value {
        My::NULL => Value::Null,
        My::Int(n) => Value::Int(n),
        My::UInt(n) => i64::try_from(n).map_or(Value::Float(n as f64), Value::Int),
        My::Float(n) => Value::Float(n.into()),
        My::Double(n) => Value::Float(n),
        My::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        My::Date(y, mo, d, h, mi, s, _) => {
            Value::Text(format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}"))
        }
        My::Time(neg, days, h, mi, s, _) => {
            let sign = if neg { "-" } else { "" };
            let hours = u32::from(h) + days * 24;
            Value::Text(format!("{sign}{hours:02}:{mi:02}:{s:02}"))
        }
    }
}
