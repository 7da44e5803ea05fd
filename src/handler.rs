//! Handler trait and type erasure.
//!
//! The router holds handlers of different concrete types in one table, so
//! each is boxed behind [`ErasedHandler`]:
//!
//! ```text
//! async fn index(args: Args) -> Result<Reply, HandlerError> { … }   ← user writes this
//!        ↓ router.get("/", Signature::new("index"), index)
//! Arc::new(FnHandler(index))                                        ← stored as BoxedHandler
//!        ↓
//! handler.call(args)  at request time                               ← one vtable dispatch
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::api::ApiError;
use crate::db::Database;
use crate::error::Error;
use crate::reply::Reply;
use crate::request::Request;

/// The arguments assembled for one handler call.
///
/// Keyword values come from the JSON body, the form fields or the query
/// string; path parameters arrive as strings. When the handler declared a
/// `request` parameter, the request rides along in its own slot. The app's
/// pool, once created, is available through [`Args::database`].
#[derive(Debug, Default)]
pub struct Args {
    pub(crate) kw: Map<String, Value>,
    pub(crate) request: Option<Request>,
    pub(crate) database: Option<Database>,
}

impl Args {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kw.get(name)
    }

    /// String value of `name`; numbers and booleans are rendered as text.
    pub fn str(&self, name: &str) -> Option<String> {
        match self.kw.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Integer value of `name`, accepting numeric strings from forms.
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.kw.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Deserializes every keyword argument into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(Value::Object(self.kw.clone()))
            .map_err(|e| ApiError::value_error("", e.to_string()))
    }

    pub fn keywords(&self) -> &Map<String, Value> {
        &self.kw
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    /// The pool opened by [`App::create_pool`](crate::App::create_pool).
    pub fn database(&self) -> Result<&Database, Error> {
        self.database
            .as_ref()
            .ok_or_else(|| Error::Config("no database pool has been created".to_owned()))
    }
}

/// Why a handler gave up.
#[derive(Debug)]
pub enum HandlerError {
    /// A business-rule failure the client should see.
    Api(ApiError),
    /// Anything else; logged and answered with `500`.
    Internal(Error),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => e.fmt(f),
            Self::Internal(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<ApiError> for HandlerError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<Error> for HandlerError {
    fn from(e: Error) -> Self {
        Self::Internal(e)
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, args: Args) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Satisfied by any function or closure of the shape
///
/// ```text
/// Fn(Args) -> impl Future<Output = Result<impl Into<Reply>, HandlerError>>
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Into<Reply> + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Into<Reply> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Into<Reply> + Send + 'static,
{
    fn call(&self, args: Args) -> BoxFuture {
        let fut = (self.0)(args);
        Box::pin(async move { fut.await.map(Into::into) })
    }
}
