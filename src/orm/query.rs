//! Finders: statements built on a mapping's select template.

use std::sync::Arc;

use serde::Serialize;

use super::mapping::quote;
use super::{Mapping, Record, Value};
use crate::db::Database;
use crate::error::{Error, Result};

/// Optional clauses for [`Mapping::find_all`].
///
/// ```rust
/// use quill::orm::Query;
///
/// let q = Query::new()
///     .filter("user_id=?")
///     .arg("0015")
///     .order_by("created_at desc")
///     .limit((10, 5));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Query {
    filter: Option<String>,
    args: Vec<Value>,
    order_by: Option<String>,
    limit: Option<serde_json::Value>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `WHERE` condition using `?` placeholders.
    pub fn filter(mut self, condition: impl Into<String>) -> Self {
        self.filter = Some(condition.into());
        self
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    /// Either a row count (`5`) or an `(offset, count)` pair (`(10, 5)`).
    /// Anything else is rejected when the query runs.
    pub fn limit(mut self, limit: impl Serialize) -> Self {
        self.limit = Some(serde_json::to_value(limit).unwrap_or(serde_json::Value::Null));
        self
    }
}

impl Mapping {
    /// Fetches the record whose primary key equals `key`.
    pub async fn find(
        self: &Arc<Self>,
        db: &Database,
        key: impl Into<Value>,
    ) -> Result<Option<Record>> {
        let sql = format!("{} WHERE {}=?", self.sql_select(), quote(self.key_column()));
        let rows = db.select(&sql, &[key.into()], Some(1)).await?;
        Ok(rows.into_iter().next().map(|row| Record::from_row(self, row)))
    }

    /// Fetches every record matching `query`, in one eager batch.
    pub async fn find_all(self: &Arc<Self>, db: &Database, query: Query) -> Result<Vec<Record>> {
        let mut sql = vec![self.sql_select().to_owned()];
        let mut args = query.args;

        if let Some(filter) = query.filter {
            sql.push("WHERE".to_owned());
            sql.push(filter);
        }
        if let Some(order) = query.order_by {
            sql.push("ORDER BY".to_owned());
            sql.push(order);
        }
        if let Some(limit) = query.limit {
            sql.push("LIMIT".to_owned());
            match limit_args(&limit) {
                Some(LimitArgs::Count(n)) => {
                    sql.push("?".to_owned());
                    args.push(Value::Int(n));
                }
                Some(LimitArgs::Range(offset, count)) => {
                    sql.push("?, ?".to_owned());
                    args.extend([Value::Int(offset), Value::Int(count)]);
                }
                None => {
                    return Err(Error::InvalidArgument(format!("invalid limit value: {limit}")));
                }
            }
        }

        let rows = db.select(&sql.join(" "), &args, None).await?;
        Ok(rows.into_iter().map(|row| Record::from_row(self, row)).collect())
    }

    /// Runs a single-value aggregate such as `count(id)`.
    pub async fn find_number(
        &self,
        db: &Database,
        select: &str,
        filter: Option<&str>,
        args: &[Value],
    ) -> Result<Option<Value>> {
        let mut sql = format!("SELECT {select} _num_ FROM {}", quote(self.table()));
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        let rows = db.select(&sql, args, Some(1)).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.shift_remove("_num_")))
    }
}

enum LimitArgs {
    Count(i64),
    Range(i64, i64),
}

fn limit_args(limit: &serde_json::Value) -> Option<LimitArgs> {
    match limit {
        serde_json::Value::Number(n) => n.as_i64().map(LimitArgs::Count),
        serde_json::Value::Array(pair) => match pair.as_slice() {
            [offset, count] => Some(LimitArgs::Range(offset.as_i64()?, count.as_i64()?)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_count_and_pair() {
        assert!(matches!(limit_args(&serde_json::json!(5)), Some(LimitArgs::Count(5))));
        assert!(matches!(
            limit_args(&serde_json::json!([10, 5])),
            Some(LimitArgs::Range(10, 5))
        ));
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(limit_args(&serde_json::json!("5")).is_none());
        assert!(limit_args(&serde_json::json!([1, 2, 3])).is_none());
        assert!(limit_args(&serde_json::json!(2.5)).is_none());
        assert!(limit_args(&serde_json::Value::Null).is_none());
    }

    #[test]
    fn tuples_serialize_as_pairs() {
        let q = Query::new().limit((10, 5));
        assert_eq!(q.limit, Some(serde_json::json!([10, 5])));
    }
}
