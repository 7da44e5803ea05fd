//! # quill
//!
//! A small async web framework with a matching micro-ORM.
//!
//! ## Web
//!
//! - Radix-tree routing via [`matchit`], one tree per method
//! - Handlers declare a [`Signature`](signature::Signature); the dispatcher
//!   fills their arguments from the JSON body, the form fields, the query
//!   string or the path
//! - Handlers return whatever [`Reply`] shape fits: a string, a JSON map, a
//!   status code, a `(status, message)` pair or a full [`Response`]
//! - HTTP/1.1 and HTTP/2 through hyper, graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## ORM
//!
//! - [`orm::Mapping`] describes a table once; [`orm::Record`] saves, updates
//!   and removes rows by primary key
//! - [`db::Database`] is a bounded connection pool over SQLite or MySQL
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use quill::signature::Signature;
//! use quill::{ApiError, App, Args, HandlerError, Reply, Router, Server};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> quill::Result<()> {
//!     let router = Router::new()
//!         .get("/", Signature::new("index"), index)
//!         .post(
//!             "/api/users",
//!             Signature::new("register").keyword("email").keyword("name"),
//!             register,
//!         );
//!
//!     Server::bind(([127, 0, 0, 1], 9000).into()).serve(App::new(router)).await
//! }
//!
//! async fn index(_: Args) -> Result<&'static str, HandlerError> {
//!     Ok("<h1>Awesome</h1>")
//! }
//!
//! async fn register(args: Args) -> Result<Reply, HandlerError> {
//!     let email = args.str("email").unwrap_or_default();
//!     if !email.contains('@') {
//!         return Err(ApiError::value_error("email", "Invalid email.").into());
//!     }
//!     Ok(Reply::json(json!({ "email": email })))
//! }
//! ```

mod api;
mod dispatch;
mod error;
mod handler;
mod method;
mod reply;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod db;
pub mod orm;
pub mod signature;
pub mod template;

pub use api::ApiError;
pub use dispatch::ClientError;
pub use error::{Error, Result};
pub use handler::{Args, Handler, HandlerError};
pub use method::Method;
pub use reply::Reply;
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, Response, ResponseBuilder};
pub use router::Router;
pub use server::{App, Server};
