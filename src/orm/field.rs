//! Field descriptors.
//!
//! A [`Field`] says how one attribute of a mapped entity is stored: its
//! column type, whether it is the primary key, and what value to use when a
//! record is saved without one.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::Value;

/// What a field falls back to when a record has no value for it.
#[derive(Clone)]
pub enum DefaultValue {
    None,
    Value(Value),
    /// Called once per record, the first time the default is needed.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub(crate) fn resolve(&self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Value(v) => Some(v.clone()),
            Self::Producer(f) => Some(f()),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Describes one mapped attribute. Immutable once attached to a mapping.
#[derive(Clone, Debug)]
pub struct Field {
    kind: &'static str,
    name: Option<String>,
    storage_type: String,
    primary_key: bool,
    default: DefaultValue,
}

impl Field {
    fn new(kind: &'static str, storage_type: &str, default: DefaultValue) -> Self {
        Self {
            kind,
            name: None,
            storage_type: storage_type.to_owned(),
            primary_key: false,
            default,
        }
    }

    /// `varchar(100)`, no default.
    pub fn string() -> Self {
        Self::new("StringField", "varchar(100)", DefaultValue::None)
    }

    /// `boolean`, defaults to `false`.
    pub fn boolean() -> Self {
        Self::new("BooleanField", "boolean", DefaultValue::Value(Value::Bool(false)))
    }

    /// `bigint`, defaults to `0`.
    pub fn integer() -> Self {
        Self::new("IntegerField", "bigint", DefaultValue::Value(Value::Int(0)))
    }

    /// `real`, defaults to `0.0`.
    pub fn float() -> Self {
        Self::new("FloatField", "real", DefaultValue::Value(Value::Float(0.0)))
    }

    /// `text`, no default.
    pub fn text() -> Self {
        Self::new("TextField", "text", DefaultValue::None)
    }

    /// Stores the attribute under a different column name.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the storage type, e.g. `varchar(50)`.
    pub fn ddl(mut self, storage_type: impl Into<String>) -> Self {
        self.storage_type = storage_type.into();
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultValue::Value(value.into());
        self
    }

    /// Uses a zero-argument producer (a clock, an id generator) as default.
    pub fn default_with(mut self, producer: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = DefaultValue::Producer(Arc::new(producer));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn storage_type(&self) -> &str {
        &self.storage_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default_value(&self) -> &DefaultValue {
        &self.default
    }

    /// Column the attribute `attr` is stored in.
    pub(crate) fn column_for<'a>(&'a self, attr: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(attr)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}:{}>", self.kind, self.storage_type, self.name.as_deref().unwrap_or(""))
    }
}

/// Unique, roughly time-ordered id: 15-digit millisecond timestamp, a random
/// uuid in hex, and a `000` suffix. Fits a `varchar(50)` key.
pub fn next_id() -> Value {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    Value::Text(format!("{millis:015}{}000", uuid::Uuid::new_v4().simple()))
}

/// Current time as float seconds since the epoch.
pub fn now() -> Value {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    Value::Float(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_carry_their_storage_defaults() {
        assert_eq!(Field::string().storage_type(), "varchar(100)");
        assert_eq!(Field::text().storage_type(), "text");
        assert!(Field::string().default_value().resolve().is_none());
        assert_eq!(Field::integer().default_value().resolve(), Some(Value::Int(0)));
        assert_eq!(Field::boolean().default_value().resolve(), Some(Value::Bool(false)));
        assert_eq!(Field::float().default_value().resolve(), Some(Value::Float(0.0)));
    }

    #[test]
    fn next_id_is_fifty_chars() {
        let id = next_id();
        let id = id.as_str().unwrap();
        assert_eq!(id.len(), 50);
        assert!(id.ends_with("000"));
        assert_ne!(next_id(), next_id());
    }

    #[test]
    fn display_names_the_variant() {
        let f = Field::string().column("email").ddl("varchar(50)");
        assert_eq!(f.to_string(), "<StringField, varchar(50):email>");
    }
}
