//! Radix-tree request router.
//!
//! One tree per HTTP method. Each route stores the handler together with its
//! [`Classification`], computed once when the route is added.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;
use tracing::info;

use crate::dispatch::RequestHandler;
use crate::handler::Handler;
use crate::method::Method;
use crate::signature::{Classification, Signature};

/// The application router.
///
/// Build it once at startup and hand it to [`App::new`](crate::App::new).
/// Every registration returns `self` so calls chain.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<RequestHandler>>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers `handler` for `method` and `path`.
    ///
    /// Path parameters use `{name}` syntax and reach the handler as string
    /// keyword arguments:
    ///
    /// ```rust,no_run
    /// # use quill::{Args, HandlerError, Method, Reply, Router};
    /// # use quill::signature::Signature;
    /// async fn get_blog(args: Args) -> Result<Reply, HandlerError> {
    ///     Ok(format!("blog {}", args.str("id").unwrap_or_default()).into())
    /// }
    ///
    /// Router::new()
    ///     .route(Method::Get, "/blog/{id}", Signature::new("get_blog").positional("id"), get_blog);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid route pattern, collides with an
    /// existing route, or the signature declares a positional parameter
    /// after `request`. These are definition-time errors.
    pub fn route(mut self, method: Method, path: &str, sig: Signature, handler: impl Handler) -> Self {
        let classification = Classification::inspect(&sig)
            .unwrap_or_else(|e| panic!("invalid handler for `{method} {path}`: {e}"));
        info!(
            %method,
            path,
            handler = sig.handler(),
            params = ?sig.params().iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "add route"
        );
        let entry = RequestHandler::new(sig.handler().to_owned(), classification, handler.into_boxed_handler());
        self.routes
            .entry(method)
            .or_default()
            .insert(path, Arc::new(entry))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, sig: Signature, handler: impl Handler) -> Self {
        self.route(Method::Get, path, sig, handler)
    }

    pub fn post(self, path: &str, sig: Signature, handler: impl Handler) -> Self {
        self.route(Method::Post, path, sig, handler)
    }

    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(Arc<RequestHandler>, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Args, HandlerError};

    async fn noop(_: Args) -> Result<&'static str, HandlerError> {
        Ok("")
    }

    #[test]
    fn lookup_is_per_method_and_extracts_params() {
        let router = Router::new()
            .get("/blog/{id}", Signature::new("get_blog").positional("id"), noop)
            .post("/api/users", Signature::new("register").keyword("email"), noop);

        let (handler, params) = router.lookup(Method::Get, "/blog/42").unwrap();
        assert_eq!(handler.name(), "get_blog");
        assert_eq!(params["id"], "42");

        assert!(router.lookup(Method::Post, "/blog/42").is_none());
        assert!(router.lookup(Method::Get, "/api/users").is_none());
    }

    #[test]
    #[should_panic(expected = "invalid handler")]
    fn positional_after_request_panics() {
        let _ = Router::new().get("/x/{id}", Signature::new("x").positional("request").positional("id"), noop);
    }
}
