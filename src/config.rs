//! Application configuration.
//!
//! Configuration is layered: a defaults document suited to local
//! development, and an optional override document carrying only the keys a
//! deployment changes. Both are JSON; the override is merged into the
//! defaults key by key (objects recursively, everything else replaced)
//! before the result is deserialized.
//!
//! ```rust
//! use quill::config::Config;
//! use serde_json::json;
//!
//! let config = Config::from_layers(
//!     json!({"db": {"user": "www-data", "password": "www-data", "database": "awesome"}}),
//!     Some(json!({"db": {"host": "10.0.0.7"}})),
//! ).unwrap();
//!
//! assert_eq!(config.db.host, "10.0.0.7");
//! assert_eq!(config.db.user.as_deref(), Some("www-data"));
//! assert_eq!(config.server.port, 9000);
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which driver [`Database::create_pool`](crate::db::Database::create_pool)
/// builds.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Mysql,
}

/// Connection-pool settings. `user`, `password` and `database` have no
/// defaults and must be supplied.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub backend: Backend,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub charset: String,
    pub autocommit: bool,
    pub max_size: usize,
    pub min_size: usize,
}

impl Config {
    /// Merges `overrides` into `defaults` and deserializes the result.
    pub fn from_layers(mut defaults: Value, overrides: Option<Value>) -> Result<Self> {
        if let Some(overrides) = overrides {
            merge(&mut defaults, overrides);
        }
        Ok(serde_json::from_value(defaults)?)
    }

    /// Reads the defaults file and, if given and present, the override file.
    pub fn load(defaults: impl AsRef<Path>, overrides: Option<&Path>) -> Result<Self> {
        let base = read_json(defaults.as_ref())?;
        let overrides = match overrides {
            Some(path) if path.exists() => Some(read_json(path)?),
            _ => None,
        };
        Self::from_layers(base, overrides)
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid server address: {e}")))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_owned(), port: 9000 }
    }
}

impl DbConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("user", &self.user),
            ("password", &self.password),
            ("database", &self.database),
        ] {
            if value.is_none() {
                return Err(Error::Config(format!("missing required database setting `{key}`")));
            }
        }
        if self.max_size == 0 {
            return Err(Error::Config("max_size must be at least 1".to_owned()));
        }
        Ok(())
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            host: "localhost".to_owned(),
            port: 3306,
            user: None,
            password: None,
            database: None,
            charset: "utf8".to_owned(),
            autocommit: true,
            max_size: 10,
            min_size: 1,
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn override_replaces_only_named_keys() {
        let mut base = json!({"db": {"host": "127.0.0.1", "port": 3306}, "session": {"secret": "x"}});
        merge(&mut base, json!({"db": {"host": "db.internal"}}));
        assert_eq!(
            base,
            json!({"db": {"host": "db.internal", "port": 3306}, "session": {"secret": "x"}})
        );
    }

    #[test]
    fn defaults_fill_missing_settings() {
        let config = Config::from_layers(json!({}), None).unwrap();
        assert_eq!(config.db.backend, Backend::Sqlite);
        assert_eq!(config.db.charset, "utf8");
        assert!(config.db.autocommit);
        assert_eq!((config.db.max_size, config.db.min_size), (10, 1));
        assert_eq!(config.server.addr().unwrap().to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn credentials_are_mandatory() {
        let mut db = DbConfig {
            user: Some("www".into()),
            database: Some("awesome".into()),
            ..DbConfig::default()
        };
        let err = db.validate().unwrap_err();
        assert!(err.to_string().contains("password"));

        db.password = Some("www".into());
        assert!(db.validate().is_ok());
    }

    #[test]
    fn backend_names_are_lowercase() {
        let config = Config::from_layers(json!({"db": {"backend": "mysql"}}), None).unwrap();
        assert_eq!(config.db.backend, Backend::Mysql);
    }
}
