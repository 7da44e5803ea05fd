//! Unified error type.

use std::fmt;

/// Shorthand for results carrying a quill [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by quill's fallible operations.
///
/// Client mistakes (a missing argument, a bad content type) are not `Error`s;
/// the dispatcher turns those into 4xx responses directly. This type covers
/// definition-time faults (schema and handler contracts), configuration,
/// and infrastructure failures: sockets, drivers and the connection pool.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Missing or malformed configuration.
    Config(String),
    /// A mapping declared a second primary key.
    DuplicateKey { table: String, field: String },
    /// A mapping declared no primary key at all.
    MissingKey { table: String },
    /// A handler signature has a positional parameter after `request`.
    RequestNotLast { handler: String },
    InvalidArgument(String),
    /// Error reported by the database backend.
    Driver(Box<dyn std::error::Error + Send + Sync>),
    /// The pool could not hand out a connection.
    Pool(String),
}

impl Error {
    pub(crate) fn driver(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Driver(Box::new(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::DuplicateKey { table, field } => {
                write!(f, "duplicate primary key for field `{field}` in `{table}`")
            }
            Self::MissingKey { table } => write!(f, "primary key not found in `{table}`"),
            Self::RequestNotLast { handler } => write!(
                f,
                "request parameter must be the last named parameter in handler `{handler}`"
            ),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Driver(e) => write!(f, "driver: {e}"),
            Self::Pool(msg) => write!(f, "pool: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Driver(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}
