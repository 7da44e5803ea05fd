//! In-memory entity instances.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use super::{Mapping, Value};
use crate::db::{Database, Row};
use crate::error::Result;

/// One entity: a mutable map from attribute name to value, tagged with the
/// [`Mapping`] of its type.
///
/// Records exist without a database row. [`save`](Record::save) inserts,
/// [`update`](Record::update) and [`remove`](Record::remove) address the row
/// by primary key.
#[derive(Clone, Debug)]
pub struct Record {
    mapping: Arc<Mapping>,
    values: IndexMap<String, Value>,
}

impl Record {
    pub fn new(mapping: &Arc<Mapping>) -> Self {
        Self {
            mapping: Arc::clone(mapping),
            values: IndexMap::new(),
        }
    }

    /// Builder-style [`set`](Record::set).
    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(attr, value);
        self
    }

    pub(crate) fn from_row(mapping: &Arc<Mapping>, row: Row) -> Self {
        let values = row
            .into_iter()
            .map(|(column, value)| (mapping.attr_for_column(&column).to_owned(), value))
            .collect();
        Self {
            mapping: Arc::clone(mapping),
            values,
        }
    }

    pub fn mapping(&self) -> &Arc<Mapping> {
        &self.mapping
    }

    pub fn set(&mut self, attr: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(attr.into(), value.into());
    }

    /// The stored value, without default resolution.
    pub fn get_value(&self, attr: &str) -> Option<&Value> {
        self.values.get(attr)
    }

    /// The stored value, or the field's default when nothing (or null) is
    /// stored. A resolved default is written back to the record, so a
    /// producer such as a clock runs at most once per record.
    pub fn get_value_or_default(&mut self, attr: &str) -> Value {
        if let Some(value) = self.values.get(attr).filter(|v| !v.is_null()) {
            return value.clone();
        }
        let Some(value) = self
            .mapping
            .field(attr)
            .and_then(|field| field.default_value().resolve())
        else {
            return Value::Null;
        };
        debug!(%attr, %value, "using default value");
        self.values.insert(attr.to_owned(), value.clone());
        value
    }

    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Inserts this record. Non-key values come first in declaration order,
    /// the primary key last, all resolved through defaults.
    ///
    /// Returns the affected-row count; anything other than 1 is logged.
    pub async fn save(&mut self, db: &Database) -> Result<u64> {
        let mapping = Arc::clone(&self.mapping);
        let mut args: Vec<Value> = mapping
            .fields()
            .map(|attr| self.get_value_or_default(attr))
            .collect();
        args.push(self.get_value_or_default(mapping.primary_key()));

        let rows = db.execute(mapping.sql_insert(), &args, true).await?;
        if rows != 1 {
            warn!(table = mapping.table(), affected = rows, "failed to insert record");
        }
        Ok(rows)
    }

    /// Writes the stored values back by primary key. Defaults are not
    /// consulted: volatile defaults were fixed by the initial insert.
    pub async fn update(&self, db: &Database) -> Result<u64> {
        let mut args: Vec<Value> = self.mapping.fields().map(|attr| self.stored(attr)).collect();
        args.push(self.stored(self.mapping.primary_key()));

        let rows = db.execute(self.mapping.sql_update(), &args, true).await?;
        if rows != 1 {
            warn!(table = self.mapping.table(), affected = rows, "failed to update by primary key");
        }
        Ok(rows)
    }

    pub async fn remove(&self, db: &Database) -> Result<u64> {
        let args = [self.stored(self.mapping.primary_key())];

        let rows = db.execute(self.mapping.sql_delete(), &args, true).await?;
        if rows != 1 {
            warn!(table = self.mapping.table(), affected = rows, "failed to remove by primary key");
        }
        Ok(rows)
    }

    fn stored(&self, attr: &str) -> Value {
        self.values.get(attr).cloned().unwrap_or(Value::Null)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::orm::Field;

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counted() -> Value {
        Value::Int(CALLS.fetch_add(1, Ordering::SeqCst) as i64 + 100)
    }

    fn mapping() -> Arc<Mapping> {
        Mapping::define("Comment")
            .field("id", Field::integer().primary_key().default_with(counted))
            .field("content", Field::text())
            .field("votes", Field::integer().default(7))
            .register()
            .unwrap()
    }

    #[test]
    fn plain_default_materializes_once() {
        let mut r = Record::new(&mapping());
        assert!(r.get_value("votes").is_none());
        assert_eq!(r.get_value_or_default("votes"), Value::Int(7));
        assert_eq!(r.get_value("votes"), Some(&Value::Int(7)));
        assert_eq!(r.get_value_or_default("votes"), Value::Int(7));
    }

    #[test]
    fn producer_runs_once_per_record() {
        let m = mapping();
        let before = CALLS.load(Ordering::SeqCst);

        let mut a = Record::new(&m);
        let first = a.get_value_or_default("id");
        assert_eq!(a.get_value_or_default("id"), first);
        assert_eq!(CALLS.load(Ordering::SeqCst), before + 1);

        let mut b = Record::new(&m);
        b.get_value_or_default("id");
        assert_eq!(CALLS.load(Ordering::SeqCst), before + 2);
    }

    #[test]
    fn missing_default_stays_absent() {
        let mut r = Record::new(&mapping());
        assert_eq!(r.get_value_or_default("content"), Value::Null);
        assert!(r.get_value("content").is_none());
    }

    #[test]
    fn stored_null_falls_back_to_default() {
        let mut r = Record::new(&mapping()).with("votes", Value::Null);
        assert_eq!(r.get_value_or_default("votes"), Value::Int(7));
    }

    #[test]
    fn serializes_as_object() {
        let r = Record::new(&mapping()).with("id", 1).with("content", "hi");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "content": "hi"}));
    }
}
