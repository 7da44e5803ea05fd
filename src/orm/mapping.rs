//! Schema registration.
//!
//! Each entity type is registered exactly once, at program start, by handing
//! its declared fields to [`Mapping::define`]. Registration validates the key
//! and generates the four canonical statements; the resulting [`Mapping`] is
//! immutable and shared by every record of that type.
//!
//! ```rust
//! use quill::orm::{Field, Mapping};
//!
//! let users = Mapping::define("User")
//!     .table("users")
//!     .field("id", Field::string().primary_key().ddl("varchar(50)"))
//!     .field("email", Field::string())
//!     .field("admin", Field::boolean())
//!     .register()
//!     .unwrap();
//!
//! assert_eq!(users.sql_select(), "SELECT `id`, `email`, `admin` FROM `users`");
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::info;

use super::Field;
use crate::error::{Error, Result};

/// The generated schema for one entity type.
#[derive(Debug)]
pub struct Mapping {
    type_name: String,
    table: String,
    primary_key: String,
    primary_field: Field,
    /// Non-key fields in declaration order.
    fields: IndexMap<String, Field>,
    sql_select: String,
    sql_insert: String,
    sql_update: String,
    sql_delete: String,
}

/// Collects field declarations until [`register`](MappingBuilder::register).
pub struct MappingBuilder {
    type_name: String,
    table: Option<String>,
    fields: IndexMap<String, Field>,
}

impl Mapping {
    /// Starts declaring the entity named `type_name`. The table name defaults
    /// to the type name.
    pub fn define(type_name: impl Into<String>) -> MappingBuilder {
        MappingBuilder {
            type_name: type_name.into(),
            table: None,
            fields: IndexMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Non-key attribute names in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Looks up a declared field, primary key included.
    pub fn field(&self, attr: &str) -> Option<&Field> {
        if attr == self.primary_key {
            Some(&self.primary_field)
        } else {
            self.fields.get(attr)
        }
    }

    pub fn sql_select(&self) -> &str {
        &self.sql_select
    }

    pub fn sql_insert(&self) -> &str {
        &self.sql_insert
    }

    pub fn sql_update(&self) -> &str {
        &self.sql_update
    }

    pub fn sql_delete(&self) -> &str {
        &self.sql_delete
    }

    pub(crate) fn key_column(&self) -> &str {
        self.primary_field.column_for(&self.primary_key)
    }

    /// Maps a result column back to the attribute it stores.
    pub(crate) fn attr_for_column<'a>(&'a self, column: &'a str) -> &'a str {
        if self.key_column() == column {
            return &self.primary_key;
        }
        self.fields
            .iter()
            .find(|(attr, f)| f.column_for(attr) == column)
            .map_or(column, |(attr, _)| attr.as_str())
    }
}

impl MappingBuilder {
    /// Overrides the table name.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    /// Declares an attribute. Declaring the same attribute twice replaces the
    /// earlier field but keeps its position.
    pub fn field(mut self, attr: impl Into<String>, field: Field) -> Self {
        self.fields.insert(attr.into(), field);
        self
    }

    /// Validates the declaration and generates the statement templates.
    ///
    /// Fails with [`Error::DuplicateKey`] when more than one field is marked
    /// as primary key and [`Error::MissingKey`] when none is.
    pub fn register(self) -> Result<Arc<Mapping>> {
        let table = self.table.unwrap_or_else(|| self.type_name.clone());
        info!(model = %self.type_name, %table, "found model");

        let mut primary: Option<(String, Field)> = None;
        let mut fields = IndexMap::new();

        for (attr, field) in self.fields {
            info!(%attr, %field, "found mapping");
            if field.is_primary_key() {
                if primary.is_some() {
                    return Err(Error::DuplicateKey { table, field: attr });
                }
                primary = Some((attr, field));
            } else {
                fields.insert(attr, field);
            }
        }

        let Some((primary_key, primary_field)) = primary else {
            return Err(Error::MissingKey { table });
        };

        let key = quote(primary_field.column_for(&primary_key));
        let columns: Vec<String> = fields
            .iter()
            .map(|(attr, f)| quote(f.column_for(attr)))
            .collect();
        let quoted_table = quote(&table);

        let select_list = std::iter::once(key.clone())
            .chain(columns.iter().cloned())
            .collect::<Vec<_>>()
            .join(", ");
        let insert_list = columns
            .iter()
            .cloned()
            .chain(std::iter::once(key.clone()))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = columns
            .iter()
            .map(|c| format!("{c}=?"))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Arc::new(Mapping {
            sql_select: format!("SELECT {select_list} FROM {quoted_table}"),
            sql_insert: format!(
                "INSERT INTO {quoted_table} ({insert_list}) VALUES ({})",
                placeholders(columns.len() + 1)
            ),
            sql_update: format!("UPDATE {quoted_table} SET {assignments} WHERE {key}=?"),
            sql_delete: format!("DELETE FROM {quoted_table} WHERE {key}=?"),
            type_name: self.type_name,
            table,
            primary_key,
            primary_field,
            fields,
        }))
    }
}

pub(crate) fn quote(ident: &str) -> String {
    format!("`{ident}`")
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blog() -> MappingBuilder {
        Mapping::define("Blog")
            .table("blogs")
            .field("id", Field::string().primary_key())
            .field("name", Field::string())
            .field("summary", Field::string().column("blurb"))
            .field("created_at", Field::float())
    }

    #[test]
    fn generates_canonical_statements() {
        let m = blog().register().unwrap();

        assert_eq!(m.table(), "blogs");
        assert_eq!(m.primary_key(), "id");
        assert_eq!(m.fields().collect::<Vec<_>>(), ["name", "summary", "created_at"]);
        assert_eq!(
            m.sql_select(),
            "SELECT `id`, `name`, `blurb`, `created_at` FROM `blogs`"
        );
        assert_eq!(
            m.sql_insert(),
            "INSERT INTO `blogs` (`name`, `blurb`, `created_at`, `id`) VALUES (?, ?, ?, ?)"
        );
        assert_eq!(
            m.sql_update(),
            "UPDATE `blogs` SET `name`=?, `blurb`=?, `created_at`=? WHERE `id`=?"
        );
        assert_eq!(m.sql_delete(), "DELETE FROM `blogs` WHERE `id`=?");
    }

    #[test]
    fn table_defaults_to_type_name() {
        let m = Mapping::define("Tag")
            .field("id", Field::integer().primary_key())
            .register()
            .unwrap();
        assert_eq!(m.table(), "Tag");
        assert_eq!(m.sql_select(), "SELECT `id` FROM `Tag`");
    }

    #[test]
    fn second_primary_key_is_rejected() {
        let err = blog()
            .field("slug", Field::string().primary_key())
            .register()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { ref field, .. } if field == "slug"));
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let err = Mapping::define("Note")
            .field("body", Field::text())
            .register()
            .unwrap_err();
        assert!(matches!(err, Error::MissingKey { ref table } if table == "Note"));
    }

    #[test]
    fn columns_map_back_to_attributes() {
        let m = blog().register().unwrap();
        assert_eq!(m.attr_for_column("blurb"), "summary");
        assert_eq!(m.attr_for_column("id"), "id");
        assert_eq!(m.attr_for_column("_num_"), "_num_");
        assert!(m.field("id").unwrap().is_primary_key());
    }
}
