//! Declarative object-relational mapping.
//!
//! Declare an entity's fields once with [`Mapping::define`], then build
//! [`Record`]s against the registered [`Mapping`]. Records carry their values
//! in a plain map; the mapping supplies the SQL.
//!
//! ```rust,no_run
//! use quill::db::Database;
//! use quill::orm::{Field, Mapping, Query, Record, next_id, now};
//!
//! # async fn demo(db: Database) -> quill::Result<()> {
//! let blogs = Mapping::define("Blog")
//!     .table("blogs")
//!     .field("id", Field::string().primary_key().ddl("varchar(50)").default_with(next_id))
//!     .field("name", Field::string().ddl("varchar(50)"))
//!     .field("created_at", Field::float().default_with(now))
//!     .register()?;
//!
//! let mut blog = Record::new(&blogs).with("name", "Learn Rust");
//! blog.save(&db).await?;
//!
//! let _recent = blogs.find_all(&db, Query::new().order_by("created_at desc").limit(10)).await?;
//! # Ok(())
//! # }
//! ```

mod field;
mod mapping;
mod query;
mod record;
mod value;

pub use field::{DefaultValue, Field, next_id, now};
pub use mapping::{Mapping, MappingBuilder};
pub use query::Query;
pub use record::Record;
pub use value::Value;
