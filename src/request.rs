//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::BodyExt;

use crate::method::Method;

/// An incoming HTTP request with its body fully read.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    /// Starts a request by hand, for driving an [`App`](crate::App) in tests.
    ///
    /// ```rust
    /// use quill::{Method, Request};
    ///
    /// let req = Request::builder(Method::Post, "/api/users")
    ///     .header("content-type", "application/json")
    ///     .body(r#"{"email":"a@b.c"}"#);
    /// assert_eq!(req.content_type(), Some("application/json"));
    /// ```
    pub fn builder(method: Method, target: &str) -> RequestBuilder {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        RequestBuilder {
            req: Self {
                method,
                path: path.to_owned(),
                query: query.to_owned(),
                headers: Vec::new(),
                body: Bytes::new(),
                params: HashMap::new(),
            },
        }
    }

    /// Reads the whole body of a hyper request. Path parameters are filled in
    /// after routing.
    pub(crate) async fn from_hyper(
        method: Method,
        req: hyper::Request<hyper::body::Incoming>,
    ) -> Result<Self, hyper::Error> {
        let (parts, body) = req.into_parts();
        let headers = parts
            .headers
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        let body = body.collect().await?.to_bytes();

        Ok(Self {
            method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().unwrap_or_default().to_owned(),
            headers,
            body,
            params: HashMap::new(),
        })
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query_string(&self) -> &str { &self.query }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `content-type` header, parameters included.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type").filter(|ct| !ct.is_empty())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/blog/{id}`, `req.param("id")` on `/blog/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

/// Hand-built [`Request`]; see [`Request::builder`].
pub struct RequestBuilder {
    req: Request,
}

impl RequestBuilder {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.req.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Finishes the request with a body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Request {
        self.req.body = body.into();
        self.req
    }

    /// Finishes the request without a body.
    pub fn build(self) -> Request {
        self.req
    }
}
